//! CLI binary for pdf-anonymizer.
//!
//! A thin shim over the library crate: `serve` runs the `/process` API,
//! `ui` runs the browser front end against a backend, and `submit` posts a
//! local file to a running backend.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_anonymizer::client::{ProcessClient, DEFAULT_BACKEND_URL};
use pdf_anonymizer::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use pdf_anonymizer::pipeline::upload::PDF_CONTENT_TYPE;
use pdf_anonymizer::ui::{self, UiState};
use pdf_anonymizer::{
    server, Anonymizer, GatewayConfig, GroqGateway, InferenceError, PdfiumExtractor, ServiceConfig,
};
use pdfium_auto::FetchPolicy;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &'static str, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix);
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the API on 0.0.0.0:5000 (reads GROQ_API_KEY, also from .env)
  pdf-anonymizer serve

  # Run the web UI on :8501 against a local API
  pdf-anonymizer ui --backend http://127.0.0.1:5000

  # Anonymize one file through a running API
  pdf-anonymizer submit resume.pdf -o resume.txt

  # Same endpoint with curl
  curl -F "file=@resume.pdf;type=application/pdf" http://127.0.0.1:5000/process

ENVIRONMENT VARIABLES:
  GROQ_API_KEY            Groq API key (required by `serve`)
  GROQ_MODEL              Chat model ID
  GROQ_BASE_URL           OpenAI-compatible API root
  ANONYMIZER_BIND         Listen address for `serve`
  ANONYMIZER_UPLOAD_DIR   Directory for staged uploads
  ANONYMIZER_BACKEND      Backend URL for `ui` and `submit`
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Strip personal data from PDF documents with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-anonymizer",
    version,
    about = "Strip personal data from PDF documents with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ANONYMIZER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ANONYMIZER_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the `/process` HTTP API.
    Serve(ServeArgs),
    /// Run the browser front end.
    Ui(UiArgs),
    /// Send a local PDF to a running API and print the anonymized text.
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = "ANONYMIZER_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Groq API key.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat model ID.
    #[arg(long, env = "GROQ_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible API root.
    #[arg(long, env = "GROQ_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Sampling temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "GROQ_TEMPERATURE")]
    temperature: Option<f32>,

    /// Completion token cap. Provider default when unset.
    #[arg(long, env = "GROQ_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Per-attempt inference timeout in seconds.
    #[arg(long, env = "GROQ_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Retries after the first inference attempt.
    #[arg(long, env = "GROQ_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Directory for staged uploads (system temp dir when unset).
    #[arg(long, env = "ANONYMIZER_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "ANONYMIZER_MAX_UPLOAD_MB", default_value_t = 25)]
    max_upload_mb: usize,

    /// Results cached by upload fingerprint; 0 disables the cache.
    #[arg(long, env = "ANONYMIZER_CACHE_SIZE", default_value_t = 0)]
    cache_size: usize,

    /// Never download pdfium; fail if no local copy is found.
    #[arg(long, env = "ANONYMIZER_OFFLINE")]
    offline: bool,
}

#[derive(Args, Debug)]
struct UiArgs {
    /// Listen address.
    #[arg(long, env = "ANONYMIZER_UI_BIND", default_value = "0.0.0.0:8501")]
    bind: SocketAddr,

    /// Backend root URL.
    #[arg(long, env = "ANONYMIZER_BACKEND", default_value = DEFAULT_BACKEND_URL)]
    backend: String,

    /// Backend request timeout in seconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Largest accepted upload in MiB.
    #[arg(long, default_value_t = 25)]
    max_upload_mb: usize,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// Local PDF file.
    input: PathBuf,

    /// Backend root URL.
    #[arg(long, env = "ANONYMIZER_BACKEND", default_value = DEFAULT_BACKEND_URL)]
    backend: String,

    /// Write the anonymized text to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the raw JSON response instead of the text.
    #[arg(long)]
    json: bool,

    /// Content type declared for the upload.
    #[arg(long, default_value = PDF_CONTENT_TYPE)]
    content_type: String,

    /// Backend request timeout in seconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's `env =` fallbacks see its values.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
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

    match cli.command {
        Command::Serve(args) => run_serve(args, cli.quiet).await,
        Command::Ui(args) => run_ui(args).await,
        Command::Submit(args) => run_submit(args, cli.quiet).await,
    }
}

async fn run_serve(args: ServeArgs, quiet: bool) -> Result<()> {
    // ── Gateway ──────────────────────────────────────────────────────────
    let api_key = args
        .api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or(InferenceError::MissingApiKey)?;
    let mut builder = GatewayConfig::builder(api_key.trim())
        .model(args.model)
        .base_url(args.base_url)
        .request_timeout_secs(args.api_timeout)
        .max_retries(args.max_retries);
    if let Some(t) = args.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = args.max_tokens {
        builder = builder.max_tokens(n);
    }
    let gateway_config = builder.build().context("Invalid gateway configuration")?;
    tracing::info!("Model {} at {}", gateway_config.model, gateway_config.base_url);
    let gateway = GroqGateway::new(gateway_config).context("Failed to build Groq client")?;

    // ── Service ──────────────────────────────────────────────────────────
    let mut builder = ServiceConfig::builder()
        .bind_addr(args.bind)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024))
        .cache_capacity(args.cache_size);
    if let Some(dir) = args.upload_dir {
        builder = builder.upload_dir(dir);
    }
    let service_config = builder.build().context("Invalid service configuration")?;

    // ── PDF engine ───────────────────────────────────────────────────────
    // First run without a local pdfium downloads it (~30 MB) into the cache.
    let policy = if args.offline {
        FetchPolicy::Offline
    } else {
        FetchPolicy::Download
    };
    let bar = (!quiet && !args.offline && pdfium_auto::installed_library().is_none())
        .then(|| spinner("PDF engine", "Downloading…"));
    let pdfium = tokio::task::block_in_place(|| pdfium_auto::shared(policy))
        .context("Failed to load the PDFium engine")?;
    if let Some(bar) = bar {
        bar.finish_with_message("ready ✓");
    }

    let anonymizer = Anonymizer::new(Arc::new(PdfiumExtractor::new(pdfium)), Arc::new(gateway))
        .with_service_config(&service_config);

    server::serve(service_config, anonymizer)
        .await
        .context("HTTP server failed")
}

async fn run_ui(args: UiArgs) -> Result<()> {
    let client = ProcessClient::new(&args.backend, Duration::from_secs(args.timeout))
        .context("Failed to build backend client")?;
    tracing::info!("Forwarding uploads to {}", client.endpoint());
    ui::serve(
        args.bind,
        UiState::new(client),
        args.max_upload_mb.saturating_mul(1024 * 1024),
    )
    .await
    .context("UI server failed")
}

async fn run_submit(args: SubmitArgs, quiet: bool) -> Result<()> {
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let file_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.pdf".to_string());

    let client = ProcessClient::new(&args.backend, Duration::from_secs(args.timeout))
        .context("Failed to build backend client")?;

    let bar = (!quiet && !args.no_progress)
        .then(|| spinner("Anonymizing", "Processing your document…"));

    if args.json {
        let raw = client
            .process_raw(&file_name, &args.content_type, bytes)
            .await;
        if let Some(ref bar) = bar {
            bar.finish_and_clear();
        }
        let raw = raw.context("Request failed")?;
        println!("{}", raw.body);
        if !(200..300).contains(&raw.status) {
            anyhow::bail!("Backend answered HTTP {}", raw.status);
        }
        return Ok(());
    }

    let result = client
        .process(&file_name, &args.content_type, bytes)
        .await;
    if let Some(ref bar) = bar {
        bar.finish_and_clear();
    }
    let cleaned_text = result.context("Anonymization failed")?;

    if let Some(ref path) = args.output {
        tokio::fs::write(path, cleaned_text.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            eprintln!(
                "{} {}  {}",
                green("✔"),
                bold(&path.display().to_string()),
                dim(&format!("{} chars", cleaned_text.chars().count()))
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(cleaned_text.as_bytes())
            .context("Failed to write to stdout")?;
        if !cleaned_text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }
    Ok(())
}
