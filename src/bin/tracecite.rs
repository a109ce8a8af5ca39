//! CLI binary for tracecite.
//!
//! A thin shim over the library crate that maps CLI flags to `TraceConfig`
//! and renders results in the terminal.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracecite::{
    resolve_input, Citation, CitationReport, DocumentSession, KeyPoint, LoadedInput,
    ProgressCallback, QaAnswer, RequestKind, TraceConfig, TraceProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

static RE_ANSI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// Drop colour codes for output that is not going to a terminal.
fn strip_ansi(s: &str) -> String {
    RE_ANSI.replace_all(s, "").into_owned()
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the model works, and a
/// warning line for every rate-limit wait.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl TraceProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, page_count: usize, block_count: usize) {
        self.bar.println(format!(
            "{} Extracted {} tagged blocks from {} pages",
            green("✔"),
            bold(&block_count.to_string()),
            page_count
        ));
        self.bar.set_message("");
    }

    fn on_request_start(&self, kind: RequestKind) {
        self.bar.reset_elapsed();
        match kind {
            RequestKind::Compression => {
                self.bar.set_prefix("Compressing");
                self.bar.set_message("Extracting key points and mapping sources…");
            }
            RequestKind::Question => {
                self.bar.set_prefix("Thinking");
                self.bar.set_message("Searching the document…");
            }
        }
    }

    fn on_rate_limited(&self, attempt: u32, max_attempts: u32, delay: Duration) {
        self.bar.println(format!(
            "{} Quota exceeded. Retrying in {}s… (attempt {}/{})",
            yellow("⚠"),
            delay.as_secs(),
            attempt,
            max_attempts
        ));
    }

    fn on_request_complete(&self, _kind: RequestKind, _success: bool) {
        self.bar.set_prefix("");
        self.bar.set_message("");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show the tagged text the model will see (no API key needed)
  tracecite extract contract.pdf

  # Compress into a cited summary dashboard
  tracecite summarize contract.pdf

  # Save the structured summary as JSON
  tracecite summarize contract.pdf --json -o contract.summary.json

  # One question, with proofs
  tracecite ask contract.pdf "What is the termination notice period?"

  # Interactive Q&A over one document
  tracecite chat https://example.com/annual-report.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY           Google Gemini API key (preferred provider)
  OPENAI_API_KEY           OpenAI API key
  ANTHROPIC_API_KEY        Anthropic API key
  TRACECITE_PROVIDER       Override provider (gemini, openai, anthropic, ollama)
  TRACECITE_MODEL          Override model ID
  PDFIUM_LIB_PATH          Path to libpdfium, or the directory containing it
"#;

/// Summarise PDFs with an LLM and trace every claim back to its source.
#[derive(Parser, Debug)]
#[command(
    name = "tracecite",
    version,
    about = "Traceable PDF summaries and Q&A: every claim cites its source block",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract and tag text blocks. Does not call the LLM.
    Extract {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// Print the extraction (blocks, source map, tagged text) as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compress a document into a cited summary.
    Summarize {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// Output the summary, citations and metrics as JSON.
        #[arg(long, env = "TRACECITE_JSON")]
        json: bool,
        /// Write output to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask one question about a document.
    Ask {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// The question.
        question: String,
    },
    /// Interactive Q&A over one document.
    Chat {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, global = true, env = "TRACECITE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "TRACECITE_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "TRACECITE_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, global = true, env = "TRACECITE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Attempts per LLM call when rate limited (first attempt included).
    #[arg(long, global = true, env = "TRACECITE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, global = true, env = "TRACECITE_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "TRACECITE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "TRACECITE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TRACECITE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "TRACECITE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the feedback that matters; library INFO logs
    // would only tear it.
    let json_out = matches!(
        cli.command,
        Command::Extract { json: true, .. } | Command::Summarize { json: true, .. }
    );
    let show_progress = !common.quiet && !common.no_progress && !json_out;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        common,
        progress.clone().map(|p| p as ProgressCallback),
    )?;

    let result = match &cli.command {
        Command::Extract { input, json } => run_extract(input, *json, &config).await,
        Command::Summarize {
            input,
            json,
            output,
        } => run_summarize(input, *json, output.as_deref(), config.clone()).await,
        Command::Ask { input, question } => run_ask(input, question, config.clone()).await,
        Command::Chat { input } => run_chat(input, config.clone()).await,
    };

    if let Some(p) = progress {
        p.bar.finish_and_clear();
    }
    result
}

/// Map CLI args to `TraceConfig`.
fn build_config(common: &CommonArgs, progress: Option<ProgressCallback>) -> Result<TraceConfig> {
    let mut builder = TraceConfig::builder()
        .max_tokens(common.max_tokens)
        .max_attempts(common.max_attempts)
        .api_timeout_secs(common.api_timeout)
        .download_timeout_secs(common.download_timeout);

    if let Some(ref model) = common.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = common.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = common.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn load(input: &str, config: &TraceConfig) -> Result<LoadedInput> {
    resolve_input(input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load '{input}'"))
}

// ── Subcommands ──────────────────────────────────────────────────────────────

async fn run_extract(input: &str, json: bool, config: &TraceConfig) -> Result<()> {
    let loaded = load(input, config).await?;
    let extraction = tracecite::extract_document(loaded.bytes, config)
        .await
        .context("Extraction failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction)?);
    } else {
        print!("{}", extraction.tagged_text);
    }
    Ok(())
}

async fn run_summarize(
    input: &str,
    json: bool,
    output: Option<&std::path::Path>,
    config: TraceConfig,
) -> Result<()> {
    let loaded = load(input, &config).await?;
    let mut session = DocumentSession::ingest(loaded.bytes, loaded.filename, config)
        .await
        .context("Failed to open document")?;
    session.summarize().await.context("Summarisation failed")?;

    let plain = output.is_some() || !io::stdout().is_terminal();
    let rendered = if json {
        serde_json::to_string_pretty(&serde_json::json!({
            "filename": session.filename(),
            "page_count": session.extraction().page_count,
            "data": session.report(),
            "citations": session.citations(),
            "metrics": session.metrics(),
        }))?
    } else if plain {
        strip_ansi(&render_dashboard(&session))
    } else {
        render_dashboard(&session)
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, rendered.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", green("✔"), path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn run_ask(input: &str, question: &str, config: TraceConfig) -> Result<()> {
    let loaded = load(input, &config).await?;
    let mut session = DocumentSession::ingest(loaded.bytes, loaded.filename, config)
        .await
        .context("Failed to open document")?;
    let turn = session.ask(question).await.context("Question failed")?;
    println!("{}", render_answer(&turn.answer));
    Ok(())
}

async fn run_chat(input: &str, config: TraceConfig) -> Result<()> {
    let loaded = load(input, &config).await?;
    let mut session = DocumentSession::ingest(loaded.bytes, loaded.filename, config)
        .await
        .context("Failed to open document")?;

    eprintln!(
        "{} Chatting with {}. Type {} to leave.",
        cyan("◆"),
        bold(session.filename()),
        dim("exit")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\n? ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        match session.ask(question).await {
            Ok(turn) => println!("{}", render_answer(&turn.answer)),
            Err(e) if e.is_retryable() => eprintln!("{} {}", yellow("⚠"), e),
            Err(e) => eprintln!("{} {}", red("✘"), e),
        }
    }

    eprintln!("{} {} questions asked", dim("◆"), session.history().len());
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────────────

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}

fn render_citation(c: &Citation) -> String {
    match &c.text {
        Some(text) => format!("    {} {} {}", green("✔"), cyan(&c.id), dim(&excerpt(text, 140))),
        None => format!("    {} {} {}", red("✘"), red(&c.id), red("not found in document")),
    }
}

fn render_answer(answer: &QaAnswer) -> String {
    let mut out = String::new();
    out.push_str(&answer.answer);
    out.push_str("\n\n");
    out.push_str(&bold("Evidence:"));
    out.push('\n');
    if answer.citations.is_empty() {
        out.push_str(&format!("    {}\n", dim(&answer.evidence_label())));
    }
    for c in &answer.citations {
        out.push_str(&render_citation(c));
        out.push('\n');
    }
    out
}

fn render_key_point(point: &KeyPoint, citations: &[Citation]) -> String {
    let mut out = format!("  • {}\n", point.statement);
    if !point.details.trim().is_empty() {
        out.push_str(&format!("    {}\n", point.details.trim()));
    }
    if !point.rationale.trim().is_empty() {
        out.push_str(&format!(
            "    {} {}\n",
            dim("Retention strategy:"),
            dim(point.rationale.trim())
        ));
    }
    if citations.is_empty() {
        out.push_str(&format!("    {}\n", yellow("no sources cited")));
    }
    for c in citations {
        out.push_str(&render_citation(c));
        out.push('\n');
    }
    out
}

fn render_dashboard(session: &DocumentSession) -> String {
    let mut out = String::new();
    let Some(report) = session.report() else {
        return out;
    };
    let extraction = session.extraction();

    // Header + metrics
    out.push_str(&format!(
        "{} {}\n",
        cyan("◆"),
        bold(extraction.title.as_deref().unwrap_or(session.filename()))
    ));
    if let Some(m) = session.metrics() {
        out.push_str(&format!(
            "  {} pages  ·  {} source blocks  ·  {} risks  ·  {:.1}x compression\n\n",
            extraction.page_count, m.source_coverage, m.risk_count, m.compression_ratio
        ));
    }

    // Brief
    out.push_str(&format!("{}\n", bold("Executive brief")));
    out.push_str(&format!("  {}\n\n", report.summary.high_level_summary));

    // Alerts
    let critical = report.critical_points();
    if !critical.is_empty() {
        out.push_str(&format!("{}\n", bold(&red("Critical risk alerts"))));
        for (section, point) in critical {
            out.push_str(&format!(
                "  {} {} {}\n",
                red("▲"),
                point.statement,
                dim(&format!("({section}, {})", point.risk_type))
            ));
        }
        out.push('\n');
    }

    // Sections (citations come back in key-point order)
    let cites = session.citations();
    let mut cites = cites.iter();
    for section in &report.summary.sections {
        out.push_str(&format!("{}\n", bold(&section.title)));
        for (point, pc) in section.key_points.iter().zip(cites.by_ref()) {
            out.push_str(&render_key_point(point, &pc.citations));
        }
        out.push('\n');
    }

    // Omitted themes
    let omitted = &report.meta_analysis.omitted_themes;
    if !omitted.is_empty() {
        out.push_str(&format!("{}\n", bold("Omitted themes")));
        for t in omitted {
            out.push_str(&format!(
                "  - {} {} {}\n",
                t.theme,
                dim(&format!("[{}]", t.impact_score)),
                dim(&t.reason_for_omission)
            ));
        }
        if !report.meta_analysis.global_retention_rationale.is_empty() {
            out.push_str(&format!(
                "  {}\n",
                dim(&report.meta_analysis.global_retention_rationale)
            ));
        }
        out.push('\n');
    }

    out.push_str(&render_integrity(&session.citation_report()));
    out
}

fn render_integrity(report: &CitationReport) -> String {
    let mut out = format!("{}\n", bold("Integrity report"));
    out.push_str(&format!(
        "  {} {} cited sources resolved\n",
        green("✔"),
        report.valid.len()
    ));
    if !report.invalid.is_empty() {
        out.push_str(&format!(
            "  {} {} unknown identifiers: {}\n",
            red("✘"),
            report.invalid.len(),
            report.invalid.join(", ")
        ));
    }
    if report.uncited_points > 0 {
        out.push_str(&format!(
            "  {} {} key points without a valid source\n",
            yellow("⚠"),
            report.uncited_points
        ));
    }
    out
}
