//! mail-dispatch command line.
//!
//! # Architecture Overview
//!
//! ```text
//!   send_email ─▶ ┌──────────────┐   ┌────────────────┐   ┌──────────────┐   ┌──────────┐
//!                 │ RetryPolicy  │──▶│ CircuitBreaker │──▶│   timeout    │──▶│ provider │──▶ vendor API
//!                 └──────────────┘   └───────┬────────┘   └──────────────┘   └──────────┘
//!                        │                   │ transitions
//!                        ▼                   ▼
//!                 ┌──────────────────────────────────┐
//!                 │ logging (tracing) + metrics      │──▶ GET /metrics
//!                 └──────────────────────────────────┘
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use mail_dispatch::config::loader::load_with_env;
use mail_dispatch::lifecycle::start_service;
use mail_dispatch::observability::{init_logging, init_metrics};
use mail_dispatch::{Attachment, ProviderRegistry};

#[derive(Parser)]
#[command(name = "mail-dispatch")]
#[command(about = "Send transactional email through a resilient provider pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it.
    #[arg(short, long, default_value = "mail-dispatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and build the provider
    Check,
    /// Send one email through retry and circuit breaker
    Send {
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: String,

        /// Plain-text body
        #[arg(long, default_value = "")]
        text: String,

        /// File holding the HTML body
        #[arg(long)]
        html: Option<PathBuf>,

        /// File to attach; repeat for several
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = load_with_env(Some(&cli.config))?;
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        provider = %config.provider.name,
        "mail-dispatch starting"
    );

    // Recorder must exist before the service resolves its metric handles.
    let metrics = if config.observability.metrics_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    let registry = ProviderRegistry::with_builtin();
    let (service, _metrics_server) = start_service(&config, &registry, metrics).await?;

    match cli.command {
        Commands::Check => {
            println!(
                "Configuration OK: provider {}, from {}",
                service.provider(),
                config.from_address
            );
        }
        Commands::Send {
            to,
            subject,
            text,
            html,
            attachments,
        } => {
            let html = match html {
                Some(path) => tokio::fs::read_to_string(&path).await?,
                None => String::new(),
            };
            let mut files = Vec::with_capacity(attachments.len());
            for path in &attachments {
                files.push(read_attachment(path).await?);
            }

            let receipt = service.send_email(&to, &subject, &html, &text, files).await?;
            println!(
                "Sent message {} via {} in {} attempt(s)",
                receipt.message_id, receipt.provider, receipt.attempts
            );
        }
    }

    Ok(())
}

async fn read_attachment(path: &Path) -> std::io::Result<Attachment> {
    let content = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(Attachment::new(filename, content, content_type_for(path)))
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}
