use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use chaplaincy::gateway::Gateway;
use chaplaincy::gemini::GeminiClient;
use chaplaincy::{chat, constants, scenarios, web_server};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Gemini API key (falls back to API_KEY).
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model used for both chat turns and quote search.
    #[arg(long, global = true, env = "CHAPLAINCY_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web server.
    Serve {
        #[arg(long, default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
    },
    /// Engage in a text-based chat session.
    Chat {
        #[arg(long, help = "Scenario id or catalog number; prompts when omitted.")]
        scenario: Option<String>,
    },
    /// Search Ellen G. White's writings for quotes.
    Search {
        #[arg(help = "Free-text search query.")]
        query: String,
    },
    /// List the available ministry scenarios.
    Scenarios,
}

fn build_gateway(cli: &Cli) -> Result<Gateway> {
    let api_key = cli
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| constants::GEMINI_API_KEY.clone());
    if api_key.trim().is_empty() {
        bail!("No API key configured. Set GEMINI_API_KEY (or API_KEY) or pass --api-key.");
    }
    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| constants::GEMINI_MODEL.clone());

    let client = GeminiClient::new(api_key, model).context("Failed to build Gemini client")?;
    info!(model = client.model(), "Gemini client ready");
    Ok(Gateway::new(Arc::new(client)))
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,chaplaincy=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    info!("Chaplaincy starting with command: {:?}", cli.command);

    match &cli.command {
        Commands::Serve { port } => {
            let gateway = build_gateway(&cli)?;
            info!("Starting web server on port {}...", port);
            if let Err(e) = web_server::start_web_server(*port, gateway).await {
                error!("Web server failed: {:?}", e);
                return Err(e);
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { scenario } => {
            let gateway = build_gateway(&cli)?;
            chat::run_chat(gateway, scenario.clone())
                .await
                .context("Chat session failed")?;
        }
        Commands::Search { query } => {
            let gateway = build_gateway(&cli)?;
            let quotes = gateway
                .search_quotes(query)
                .await
                .context("Quote search failed")?;
            if quotes.is_empty() {
                println!("{}", constants::NO_QUOTES_FOUND);
            }
            for quote in quotes {
                println!("\"{}\" - {}", quote.text, quote.source);
            }
        }
        Commands::Scenarios => {
            for scenario in scenarios::all() {
                println!("{:<22} {} - {}", scenario.id, scenario.title, scenario.description);
            }
        }
    }

    Ok(())
}
