//! Configuration types for extraction, compression and question answering.
//!
//! All pipeline behaviour is controlled through [`TraceConfig`], built via
//! its [`TraceConfigBuilder`]. One struct for every knob means a config can
//! be cloned into each request handler and logged as a whole.
//!
//! # Design choice: builder over constructor
//! Most callers set one or two fields (a model, a provider) and rely on the
//! defaults for everything else. The builder lets them do exactly that.

use crate::error::TraceError;
use crate::pipeline::llm::Completion;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a document pipeline run.
///
/// # Example
/// ```rust
/// use tracecite::TraceConfig;
///
/// let config = TraceConfig::builder()
///     .provider_name("gemini")
///     .model("gemini-2.5-flash")
///     .max_attempts(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TraceConfig {
    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider` and `client`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed completion client. Takes precedence over everything.
    ///
    /// The seam tests and embedders use to put their own model (or a
    /// scripted fake) behind the pipeline.
    pub client: Option<Arc<dyn Completion>>,

    /// Sampling temperature for the compression call. Default: 0.5.
    ///
    /// Summaries benefit from some freedom of phrasing; the source
    /// identifiers are protected by the prompt, not by a low temperature.
    pub compression_temperature: f32,

    /// Sampling temperature for question answering. Default: 0.2.
    pub qa_temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    ///
    /// The compression answer is one JSON object for the whole document.
    /// Truncating it mid-object turns a good summary into a format error.
    pub max_tokens: usize,

    /// Attempt budget for a rate-limited call, first attempt included.
    /// Default: 3.
    pub max_attempts: u32,

    /// Base backoff for compression retries in milliseconds. Default: 5000.
    ///
    /// Doubles after each rate-limited attempt: 5 s → 10 s.
    pub compression_backoff_ms: u64,

    /// Base backoff for Q&A retries in milliseconds. Default: 10000.
    pub qa_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Largest upload the HTTP adapter accepts, in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            client: None,
            compression_temperature: 0.5,
            qa_temperature: 0.2,
            max_tokens: 8192,
            max_attempts: 3,
            compression_backoff_ms: 5_000,
            qa_backoff_ms: 10_000,
            api_timeout_secs: 180,
            download_timeout_secs: 120,
            password: None,
            max_upload_bytes: 50 * 1024 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TraceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("client", &self.client.as_ref().map(|_| "<dyn Completion>"))
            .field("compression_temperature", &self.compression_temperature)
            .field("qa_temperature", &self.qa_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("compression_backoff_ms", &self.compression_backoff_ms)
            .field("qa_backoff_ms", &self.qa_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl TraceConfig {
    /// Create a new builder for `TraceConfig`.
    pub fn builder() -> TraceConfigBuilder {
        TraceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn compression_backoff(&self) -> Duration {
        Duration::from_millis(self.compression_backoff_ms)
    }

    pub fn qa_backoff(&self) -> Duration {
        Duration::from_millis(self.qa_backoff_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`TraceConfig`].
#[derive(Debug)]
pub struct TraceConfigBuilder {
    config: TraceConfig,
}

impl TraceConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn client(mut self, client: Arc<dyn Completion>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn compression_temperature(mut self, t: f32) -> Self {
        self.config.compression_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn qa_temperature(mut self, t: f32) -> Self {
        self.config.qa_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn compression_backoff_ms(mut self, ms: u64) -> Self {
        self.config.compression_backoff_ms = ms;
        self
    }

    pub fn qa_backoff_ms(mut self, ms: u64) -> Self {
        self.config.qa_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TraceConfig, TraceError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(TraceError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(TraceError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(TraceError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if let Some(name) = &c.provider_name {
            if name.trim().is_empty() {
                return Err(TraceError::InvalidConfig(
                    "provider_name must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
