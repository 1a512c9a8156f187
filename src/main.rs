// SpaceTraders Fleet - Main Entry Point
// Registers an agent, reports fleet status, or runs the autonomous control loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spacetraders_fleet::registration::{self, DEFAULT_FACTION};
use spacetraders_fleet::storage::TokenStore;
use spacetraders_fleet::{AGENT_TOKEN_FILE, Admiral, ConfigManager, FleetConfig, GameApi, RateGate, SpaceTradersClient};

#[derive(Parser)]
#[command(name = "spacetraders_fleet")]
#[command(about = "Autonomous fleet manager for SpaceTraders")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "fleet.toml", global = true)]
    config: PathBuf,

    /// Path to the agent token file
    #[arg(long, default_value = AGENT_TOKEN_FILE, global = true)]
    token_file: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fleet control loop
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Register a new agent and save its token
    Register {
        /// Agent symbol (generated when omitted)
        #[arg(long)]
        symbol: Option<String>,

        #[arg(long, default_value = DEFAULT_FACTION)]
        faction: String,
    },
    /// Print agent, fleet and contract status
    Status,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn connect(config: &FleetConfig, tokens: &TokenStore) -> Result<Arc<dyn GameApi>, Box<dyn std::error::Error>> {
    let token = tokens.load_required()?;
    let gate = RateGate::shared(&config.rate_limit);
    let client = SpaceTradersClient::new(
        &token,
        &config.api.base_url,
        Duration::from_secs(config.api.request_timeout_seconds),
        gate,
    )?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let tokens = TokenStore::new(&cli.token_file);

    match cli.command {
        Commands::Register { symbol, faction } => {
            let config = FleetConfig::load_or_create(&cli.config)?;
            if tokens.load()?.is_some() {
                info!("⚠️ Overwriting existing token at {}", tokens.path().display());
            }
            let symbol = symbol.unwrap_or_else(|| registration::generate_agent_symbol(&mut rand::thread_rng()));
            let registered = registration::register_agent(&config.api.base_url, &symbol, &faction).await?;
            tokens.save(&registered.token)?;

            println!("✅ Registered agent {}", registered.agent.symbol);
            println!("  Headquarters: {}", registered.agent.headquarters);
            println!("  Credits: {}", registered.agent.credits);
            println!("  Ships: {}", registered.ships.len());
        }
        Commands::Status => {
            let config = FleetConfig::load_or_create(&cli.config)?;
            let api = connect(&config, &tokens)?;
            Admiral::new(api, config).print_status().await?;
        }
        Commands::Run { cycles } => {
            let manager = ConfigManager::new(&cli.config)?;
            let api = connect(manager.config(), &tokens)?;
            let agent = api.get_agent().await?;
            info!("✅ Authenticated as {} with {} credits", agent.symbol, agent.credits);

            let mut admiral = Admiral::with_config_manager(api, manager);
            if let Err(e) = admiral.run(cycles).await {
                error!("❌ Fleet operations halted: {}", e);
                return Err(e.into());
            }
            let stats = admiral.stats();
            info!(
                "🏁 {} cycles, {} tasks completed, {} failed, {} net credits",
                stats.cycles, stats.tasks_completed, stats.tasks_failed, stats.net_credits
            );
        }
    }

    Ok(())
}
