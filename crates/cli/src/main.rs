use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pilot_mem_core::DaemonConfig;

mod commands;
mod pid_file;
mod supervisor;

use commands::hook::HookCommands;

#[derive(Parser)]
#[command(name = "pilot-mem")]
#[command(about = "Local memory and context daemon for the pilot editor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker daemon in the foreground.
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short = 'H', long)]
        host: Option<String>,
    },
    /// Ensure a compatible worker is listening, spawning one if needed.
    Ensure,
    /// Editor hook entry points (fast, tolerant callers).
    #[command(subcommand)]
    Hook(HookCommands),
    /// Print worker health as JSON.
    Status,
}

fn init_tracing() {
    let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = DaemonConfig::from_env();

    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = config;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.bind = host;
            }
            commands::serve::run(config).await
        }
        Commands::Ensure => {
            let control = supervisor::RealWorkerControl::new(config.clone());
            let outcome = supervisor::ensure_worker(&control, config.port).await;
            println!("{}", serde_json::to_string(&outcome)?);
            if outcome.ready {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        Commands::Hook(cmd) => commands::hook::run(cmd, &config).await,
        Commands::Status => {
            let url = format!("{}/api/health", config.endpoint());
            let body: serde_json::Value = reqwest::get(&url).await?.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}
