//! Balloonfly command line
//!
//! `serve` runs the HTTP API; `commit` and `verify` are offline helpers for
//! operators and players checking a round, and `key-hash` prints the hash to
//! put in `api.credentials`.

use balloonfly::api::{hash_api_key, ApiServer};
use balloonfly::config::{BalloonflyConfig, ConfigLoader, StorageBackend};
use balloonfly::crash::{format_multiplier, Address, ClientSeed};
use balloonfly::engine::{CrashEngine, EngineContext};
use balloonfly::fairness::{self, SeedHash, ServerSeed, COMMITMENT_SCHEME};
use balloonfly::storage::open_store;
use balloonfly::transfer::LedgerTreasury;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "balloonfly")]
#[command(about = "Crash-game settlement engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Generate a server seed and its commitment
    Commit {
        /// Use this seed (hex) instead of a random one
        #[arg(long)]
        seed: Option<String>,
    },
    /// Check a revealed seed against a commitment
    Verify(VerifyArgs),
    /// Hash a bearer key for `api.credentials`
    KeyHash {
        /// Raw key handed to the client
        key: String,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Use the development preset when no file is given
    #[arg(long)]
    dev: bool,

    /// Admin identity; initializes a fresh ledger
    #[arg(long)]
    admin: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Database directory (implies the RocksDB backend)
    #[arg(long)]
    db_path: Option<String>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Revealed server seed (hex)
    #[arg(long)]
    seed: String,

    /// Published commitment (hex)
    #[arg(long)]
    hash: String,

    /// Client seeds in placement order (hex, repeatable)
    #[arg(long = "client-seed")]
    client_seeds: Vec<String>,

    #[arg(long, default_value = "300")]
    house_edge_bps: u32,

    #[arg(long, default_value = "10000")]
    max_multiplier: u64,
}

fn load_config(args: &ServeArgs) -> Result<BalloonflyConfig, Box<dyn std::error::Error>> {
    let mut config = match (&args.config, args.dev) {
        (Some(path), _) => ConfigLoader::new().with_path(path).load()?,
        (None, true) => BalloonflyConfig::development(),
        (None, false) => ConfigLoader::new().load()?,
    };

    if let Some(host) = &args.host {
        config.api.host = host.clone();
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(path) = &args.db_path {
        config.storage.backend = StorageBackend::RocksDb;
        config.storage.data_directory = path.clone();
    }
    if let Some(origins) = &args.cors_origins {
        config.api.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &BalloonflyConfig) {
    let default_filter = format!(
        "balloonfly={},tower_http=info",
        config.monitoring.log_level.as_filter()
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    init_tracing(&config);

    let store = open_store(&config.storage)?;
    // Balances live in the same store as the ledger; the bankroll only seeds
    // a house account that has no balance yet.
    let treasury = LedgerTreasury::new(Arc::clone(&store), config.treasury.demo_credit as i128);
    treasury.seed_balance(
        &Address::new(config.treasury.house_account.clone()),
        config.treasury.house_bankroll as i128,
    )?;
    let ctx = EngineContext::new(store, Arc::new(treasury));

    let engine = match args.admin {
        Some(admin) => CrashEngine::initialize(ctx, &config, Address::new(admin))?,
        None => CrashEngine::open(ctx, &config)?,
    };
    info!(admin = %engine.admin(), backend = ?config.storage.backend, "engine ready");

    ApiServer::new(config.api.clone(), Arc::new(engine))
        .with_metrics(config.monitoring.enable_metrics)
        .run()
        .await
}

fn commit(seed: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let seed = match seed {
        Some(hex) => hex.parse::<ServerSeed>()?,
        None => ServerSeed::generate(),
    };
    println!("scheme:      {:?}", COMMITMENT_SCHEME);
    println!("server_seed: {}", seed);
    println!("commitment:  {}", seed.commitment());
    Ok(())
}

fn verify(args: VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let seed: ServerSeed = args.seed.parse()?;
    let hash: SeedHash = args.hash.parse()?;
    let client_seeds = args
        .client_seeds
        .iter()
        .map(|s| hex::decode(s.trim_start_matches("0x")).map(ClientSeed::new))
        .collect::<Result<Vec<_>, _>>()?;

    fairness::verify_reveal(&seed, &hash)?;
    let derived = fairness::derive_crash_multiplier(
        &seed,
        &client_seeds,
        args.house_edge_bps,
        args.max_multiplier,
    );
    println!("commitment: valid");
    println!("client seeds: {}", client_seeds.len());
    println!("derived crash multiplier: {} ({})", derived, format_multiplier(derived));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Commit { seed } => commit(seed),
        Command::Verify(args) => verify(args),
        Command::KeyHash { key } => {
            println!("{}", hash_api_key(&key));
            Ok(())
        }
    }
}
