//! Notifier - storage object notification relay
//!
//! Receives object-created events over HTTP and emails a link to the new
//! object.

use clap::{Parser, Subcommand};
use notifier_api::NotifierServer;
use notifier_core::config::{LoggingConfig, NotifierConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "notifier")]
#[command(author = "Notifier Team")]
#[command(version = notifier_core::VERSION)]
#[command(about = "Emails a link for every object created in a storage bucket", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Bind address
    #[arg(long, env = "NOTIFIER_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port number, overriding `PORT`
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "NOTIFIER_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the notifier server
    Server,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        NotifierConfig::from_file(config_path)?
    } else {
        NotifierConfig::from_env()?
    };

    // Override with CLI args
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("notifier {}", notifier_core::VERSION);
        }
        Some(Commands::Server) | None => {
            init_logging(&config.logging);
            run_server(config).await?;
        }
    }

    Ok(())
}

/// Install the process subscriber; `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn run_server(config: NotifierConfig) -> anyhow::Result<()> {
    info!("Starting notifier {}...", notifier_core::VERSION);

    let server = NotifierServer::new(config);
    server.run().await?;

    Ok(())
}
