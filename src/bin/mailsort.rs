//! CLI binary for mailsort.
//!
//! A thin shim over the library crate: `serve` runs the HTTP API,
//! `classify` runs one local file through the same pipeline and prints the
//! verdict as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailsort::{Analyzer, Environment, MailsortConfig};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP API on port 8000
  mailsort serve

  # Classify a local e-mail export
  mailsort classify message.pdf

  # Try it against a running server
  curl -F "file=@message.txt;type=text/plain" http://localhost:8000/api/analyze

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (required)
  GEMINI_MODEL            Model ID, e.g. gemini-2.0-flash (required)
  MAILSORT_LLM_PROVIDER   Any edgequake-llm provider name (default: gemini)
  OCR_SPACE_API_KEY       Enables OCR for scanned PDFs (https://ocr.space/ocrapi)
  ENVIRONMENT             development | production (production requires OCR)
  MAILSORT_HOST           Bind address for `serve` (default: 0.0.0.0)
  MAILSORT_PORT           Bind port for `serve` (default: 8000)
  RUST_LOG                Overrides the log filter
"#;

/// Classify e-mails (PDF or TXT) with an LLM and suggest a reply.
#[derive(Parser, Debug)]
#[command(
    name = "mailsort",
    version,
    about = "Classify e-mails (PDF or TXT) with an LLM and suggest a reply",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key of the LLM provider.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// LLM model ID (e.g. gemini-2.0-flash).
    #[arg(long, env = "GEMINI_MODEL", global = true)]
    model: Option<String>,

    /// edgequake-llm provider name.
    #[arg(long, env = "MAILSORT_LLM_PROVIDER", default_value = "gemini", global = true)]
    provider: String,

    /// OCR.space API key; enables OCR for PDFs without a text layer.
    #[arg(long, env = "OCR_SPACE_API_KEY", hide_env_values = true, global = true)]
    ocr_api_key: Option<String>,

    /// Deployment environment: development or production.
    #[arg(long, env = "ENVIRONMENT", default_value = "development", global = true)]
    environment: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MAILSORT_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "MAILSORT_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Bind address.
        #[arg(long, env = "MAILSORT_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Bind port.
        #[arg(short, long, env = "MAILSORT_PORT", default_value_t = 8000)]
        port: u16,
    },

    /// Classify a local .pdf or .txt file and print the result as JSON.
    Classify {
        /// File to classify.
        file: PathBuf,

        /// Print compact single-line JSON.
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    match cli.command {
        Command::Serve { .. } => {
            mailsort::serve(config).await.context("Server failed")?;
        }
        Command::Classify { ref file, compact } => {
            let analyzer = Analyzer::from_config(&config).context("Failed to set up the LLM provider")?;
            let result = analyzer
                .analyze_file(file)
                .await
                .with_context(|| format!("Failed to classify {}", file.display()))?;

            let json = if compact {
                serde_json::to_string(&result)
            } else {
                serde_json::to_string_pretty(&result)
            }
            .context("Failed to serialise result")?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Map CLI args to `MailsortConfig`.
fn build_config(cli: &Cli) -> Result<MailsortConfig> {
    let api_key = cli
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .context("GEMINI_API_KEY is required (set the variable or pass --api-key)")?;
    let model = cli
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .context("GEMINI_MODEL is required (set the variable or pass --model)")?;
    let environment: Environment = cli.environment.parse()?;

    let mut builder = MailsortConfig::builder()
        .provider_name(&cli.provider)
        .model(model)
        .ai_api_key(api_key)
        .environment(environment);

    if let Some(ref key) = cli.ocr_api_key {
        if !key.trim().is_empty() {
            builder = builder.ocr_api_key(key);
        }
    }
    if let Command::Serve { ref host, port } = cli.command {
        builder = builder.host(host).port(port);
    }

    builder.build().context("Invalid configuration")
}
