//! Crowdsourcer form client CLI
//!
//! # Usage
//!
//! ```bash
//! crowdsourcer-client config init
//! crowdsourcer-client replay --page page.json --events events.json
//! crowdsourcer-client --base-url https://marking.example.org replay -p page.json -e events.json
//! ```

use clap::{Parser, Subcommand};
use crowdsourcer_client::{ClientConfig, ClientError, FormClient, Page, PageEvent};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "crowdsourcer-client")]
#[command(version)]
#[command(about = "Replay form interactions against a marking site", long_about = None)]
struct Cli {
    /// Config file
    #[arg(long, short, env = "CROWDSOURCER_CONFIG")]
    config: Option<String>,

    /// Override the configured site URL
    #[arg(long, env = "CROWDSOURCER_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch scripted events against a page snapshot and print the result
    Replay {
        /// Page snapshot (JSON)
        #[arg(long, short)]
        page: String,
        /// Event script (JSON array)
        #[arg(long, short)]
        events: String,
        /// Keep going after a failed event
        #[arg(long)]
        keep_going: bool,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    let mut config = match ClientConfig::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", path, e);
            std::process::exit(1);
        }
    };
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Replay {
            page,
            events,
            keep_going,
        } => replay(config, &page, &events, keep_going).await,
        Commands::Config { action } => handle_config(action, &config, &path),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn replay(
    config: ClientConfig,
    page: &str,
    events: &str,
    keep_going: bool,
) -> Result<(), ClientError> {
    let page: Page = serde_json::from_str(&std::fs::read_to_string(page)?)?;
    let events: Vec<PageEvent> = serde_json::from_str(&std::fs::read_to_string(events)?)?;

    tracing::info!("Replaying {} events against {}", events.len(), config.base_url);
    let client = FormClient::new(config, page)?;

    for event in events {
        match client.dispatch(event).await {
            Ok(outcome) => tracing::info!("{:?}", outcome),
            Err(e) if keep_going => tracing::warn!("event failed: {}", e),
            Err(e) => return Err(e),
        }
    }

    println!("{}", serde_json::to_string_pretty(&client.page())?);
    Ok(())
}

fn handle_config(
    action: ConfigCommands,
    config: &ClientConfig,
    path: &str,
) -> Result<(), ClientError> {
    match action {
        ConfigCommands::Init => {
            ClientConfig::default().save(path)?;
            println!("Wrote {}", path);
        }
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}
