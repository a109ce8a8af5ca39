//! LLM interaction: the completion seam, retry policy and provider resolution.
//!
//! The pipeline never talks to an LLM SDK directly. It goes through the
//! [`Completion`] trait: one prompt in, one text out, or a classified
//! [`UpstreamFailure`]. [`ProviderClient`] is the production implementation
//! over an `edgequake_llm` provider; tests substitute a scripted fake.
//!
//! ## Retry Strategy
//!
//! Only rate-limit / quota failures are retried. Everything else (bad key,
//! bad request, server error, timeout) surfaces at once as
//! [`TraceError::UpstreamError`], because waiting would not change the
//! answer. The wait after attempt `n` (0-based) is `base_delay * 2^n`: with
//! the compression base of 5 s and three attempts the pipeline waits
//! 5 s → 10 s before giving up with [`TraceError::RateLimited`].

use crate::config::TraceConfig;
use crate::error::{TraceError, UpstreamFailure};
use crate::progress::{NoopProgressCallback, TraceProgressCallback};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Model used when Gemini is picked from `GEMINI_API_KEY` without a model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Model used for a named provider when no model is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// One prompt-to-text request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Anything that can turn a prompt into text.
///
/// Implementations perform exactly one upstream call per `complete` and no
/// retries of their own.
pub trait Completion: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<String, UpstreamFailure>>;
}

/// [`Completion`] over an `edgequake_llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

impl Completion for ProviderClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<String, UpstreamFailure>> {
        Box::pin(async move {
            let messages = vec![ChatMessage::user(request.prompt.as_str())];
            let options = build_options(request);
            let start = Instant::now();
            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "LLM call: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    Ok(response.content)
                }
                Err(e) => Err(UpstreamFailure::classify(e.to_string())),
            }
        })
    }
}

/// Build `CompletionOptions` from a request.
fn build_options(request: &CompletionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

// ── Retry ────────────────────────────────────────────────────────────────

/// Bounded exponential backoff for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Always ≥ 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Wait after the 0-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn compression(config: &TraceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.compression_backoff(),
            timeout: config.api_timeout(),
        }
    }

    pub fn question(config: &TraceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.qa_backoff(),
            timeout: config.api_timeout(),
        }
    }
}

/// Run `request` through `client`, retrying rate-limited attempts.
pub async fn complete_with_retry(
    client: &dyn Completion,
    request: &CompletionRequest,
    policy: RetryPolicy,
    progress: Option<&dyn TraceProgressCallback>,
) -> Result<String, TraceError> {
    let progress = progress.unwrap_or(&NoopProgressCallback);
    let max_attempts = policy.max_attempts.max(1);
    let mut last_err = String::new();

    for attempt in 0..max_attempts {
        let outcome = match timeout(policy.timeout, client.complete(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(TraceError::UpstreamError {
                    message: format!("LLM call timed out after {:?}", policy.timeout),
                })
            }
        };

        match outcome {
            Ok(text) => {
                debug!("LLM response: {} chars after {} attempt(s)", text.len(), attempt + 1);
                return Ok(text);
            }
            Err(UpstreamFailure::RateLimited(msg)) => {
                last_err = msg;
                if attempt + 1 < max_attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Quota exceeded (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        max_attempts,
                        delay,
                        last_err
                    );
                    progress.on_rate_limited(attempt + 1, max_attempts, delay);
                    sleep(delay).await;
                }
            }
            Err(UpstreamFailure::Other(msg)) => {
                warn!("LLM call failed (not retried): {}", msg);
                return Err(TraceError::UpstreamError { message: msg });
            }
        }
    }

    Err(TraceError::RateLimited {
        attempts: max_attempts,
        detail: last_err,
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, TraceError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TraceError::MissingCredential {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Environment variable naming the provider, shared with the CLI flags.
pub const PROVIDER_ENV: &str = "TRACECITE_PROVIDER";

/// Environment variable naming the model, shared with the CLI flags.
pub const MODEL_ENV: &str = "TRACECITE_MODEL";

fn default_model_for(provider_name: &str) -> &'static str {
    match provider_name {
        "gemini" => DEFAULT_GEMINI_MODEL,
        _ => DEFAULT_MODEL,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the completion client, from most-specific to least-specific.
///
/// 1. **Injected client** (`config.client`).
/// 2. **Pre-built provider** (`config.provider`).
/// 3. **Named provider + model** (`config.provider_name`).
/// 4. **Environment provider** (`TRACECITE_PROVIDER`, model from the config,
///    then `TRACECITE_MODEL`, then the provider default).
/// 5. **Gemini key** (`GEMINI_API_KEY` or `GOOGLE_API_KEY`).
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Failure at every level is [`TraceError::MissingCredential`]. Callers
/// resolve before building any prompt, so a missing key never costs an
/// LLM call.
pub fn resolve_client(config: &TraceConfig) -> Result<Arc<dyn Completion>, TraceError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderClient::new(provider)))
}

fn resolve_provider(config: &TraceConfig) -> Result<Arc<dyn LLMProvider>, TraceError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        info!("Using LLM provider '{}' with model '{}'", name, model);
        return create_provider(name, model);
    }

    if let Some(prov) = non_empty_env(PROVIDER_ENV) {
        let model = config
            .model
            .clone()
            .or_else(|| non_empty_env(MODEL_ENV))
            .unwrap_or_else(|| default_model_for(&prov).to_string());
        info!("Using LLM provider '{}' with model '{}' from environment", prov, model);
        return create_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() || non_empty_env("GOOGLE_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        info!("Using Gemini ({}) from GEMINI_API_KEY", model);
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TraceError::MissingCredential {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
