//! Cancela CLI - a captive-portal session and consent gateway

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cancela::{Config, GatewayServer};

#[derive(Parser)]
#[command(name = "cancela")]
#[command(about = "A captive-portal consent gateway for lab networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway server
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,

        /// Log level (error, warn, info, debug, trace)
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            bind,
            log_level,
        } => {
            // Load config
            let mut cfg = if let Some(ref config_path) = config {
                Config::from_file(config_path)?
            } else {
                Config::default()
            };

            // Apply CLI overrides
            if let Some(addr) = bind {
                cfg.gateway.bind_address = addr;
            }
            if let Some(level) = log_level {
                cfg.logging.level = level;
            }

            // Initialize logging
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();

            if let Some(ref config_path) = config {
                tracing::info!(path = %config_path.display(), "Loaded configuration");
            } else {
                tracing::info!("Using default configuration");
            }

            let server = GatewayServer::new(cfg)?;

            tracing::info!("Starting gateway...");

            // Handle Ctrl+C
            let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                tracing::info!("Shutting down...");
                let _ = shutdown_tx.send(());
            });

            server.run_until_shutdown(shutdown_rx).await?;
        }

        Commands::ValidateConfig { config } => {
            println!("Validating configuration: {}", config.display());

            let cfg = Config::from_file(&config)?;

            println!("Configuration is valid!");
            println!();
            println!("  Bind address: {}", cfg.gateway.bind_address);
            println!(
                "  Portal page: {}",
                cfg.portal.page_path.as_deref().unwrap_or("(embedded)")
            );
            println!("  Connections log: {}", cfg.audit.connections_log);
            println!("  Acceptances log: {}", cfg.audit.acceptances_log);
            if cfg.resolver.enabled {
                println!(
                    "  MAC resolution: enabled (timeout {} ms)",
                    cfg.resolver.timeout_ms
                );
            } else {
                println!("  MAC resolution: disabled");
            }
            println!("  Log level: {}", cfg.logging.level);

            // Surface missing custom page files now rather than at startup
            let page = cfg.load_portal_page()?;
            println!("  Portal page loads ({} bytes)", page.len());
        }
    }

    Ok(())
}
