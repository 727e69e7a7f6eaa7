//! Configuration management with validation and defaults
//!
//! One TOML document configures the game rules, the treasury, the ledger store,
//! the HTTP API and logging. Environment variables override the file.

use crate::crash::types::{Amount, MIN_MULTIPLIER};
use crate::errors::{ConfigurationError, EngineResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalloonflyConfig {
    pub game: GameConfig,
    pub treasury: TreasuryConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub monitoring: MonitoringConfig,
}

/// Wagering rules
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// House edge in basis points (300 = 3%)
    pub house_edge_bps: u32,
    /// Smallest accepted stake, in the smallest currency unit
    pub min_bet: u64,
    /// Largest accepted stake, in the smallest currency unit
    pub max_bet: u64,
    /// Lowest crash multiplier accepted at round start (100 = 1.00x)
    pub min_crash_multiplier: u64,
    /// Ceiling for derived crash multipliers
    pub max_crash_multiplier: u64,
    /// Keep at most this many client seeds per round. `None` keeps all.
    pub max_client_seeds: Option<usize>,
    /// Require the revealed multiplier to equal the one derived from the seeds
    pub enforce_derived_multiplier: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            house_edge_bps: 300,
            min_bet: 10_000_000,           // 1 XLM in stroops
            max_bet: 1_000_000_000_000,    // 100,000 XLM
            min_crash_multiplier: MIN_MULTIPLIER,
            max_crash_multiplier: 10_000,  // 100.00x
            max_client_seeds: None,
            enforce_derived_multiplier: false,
        }
    }
}

impl GameConfig {
    pub fn min_bet_amount(&self) -> Amount {
        Amount::from(self.min_bet)
    }

    pub fn max_bet_amount(&self) -> Amount {
        Amount::from(self.max_bet)
    }
}

/// Custody accounts used by the built-in treasury
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasuryConfig {
    /// Account that receives stakes and pays out cash-outs
    pub house_account: String,
    /// Opening balance of the house account
    pub house_bankroll: u64,
    /// Balance granted to an account the first time it is seen (0 disables)
    pub demo_credit: u64,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            house_account: "house".to_string(),
            house_bankroll: 0,
            demo_credit: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    RocksDb,
}

/// Ledger storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    /// Whether to clear the database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            data_directory: "./DB/balloonfly_ledger".to_string(),
            write_buffer_size_mb: 64,
            clear_on_start: false,
        }
    }
}

/// HTTP API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. `*` allows all, empty allows none.
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Bearer keys accepted by mutating routes
    pub credentials: Vec<ApiCredential>,
}

/// Bearer key bound to the ledger identity it acts as
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiCredential {
    /// The admin address or a player address
    pub principal: String,
    /// Hex SHA-256 of the raw key
    pub key_hash: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            credentials: Vec::new(),
        }
    }
}

/// Logging and metrics configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
    pub enable_metrics: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            enable_metrics: true,
        }
    }
}

impl BalloonflyConfig {
    /// In-memory ledger with funded demo accounts
    pub fn development() -> Self {
        Self {
            treasury: TreasuryConfig {
                house_bankroll: 1_000_000_000_000_000,
                demo_credit: 10_000_000_000, // 1,000 XLM per new account
                ..Default::default()
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                clear_on_start: true,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Persistent RocksDB ledger, no cross-origin access until origins are listed
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::RocksDb,
                data_directory: "./DB/balloonfly_ledger".to_string(),
                write_buffer_size_mb: 128,
                clear_on_start: false, // Production: preserve ledger
            },
            api: ApiConfig {
                allowed_origins: vec![],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let game = &self.game;

        if game.house_edge_bps >= 10_000 {
            return Err(invalid("game.house_edge_bps", game.house_edge_bps, "must be below 10000"));
        }

        if game.min_bet == 0 {
            return Err(invalid("game.min_bet", game.min_bet, "must be > 0"));
        }

        if game.min_bet > game.max_bet {
            return Err(ConfigurationError::ValidationFailed(format!(
                "game.min_bet ({}) exceeds game.max_bet ({})",
                game.min_bet, game.max_bet
            )));
        }

        if game.min_crash_multiplier < MIN_MULTIPLIER {
            return Err(invalid(
                "game.min_crash_multiplier",
                game.min_crash_multiplier,
                "must represent at least 1.00x",
            ));
        }

        if game.max_crash_multiplier < game.min_crash_multiplier {
            return Err(ConfigurationError::ValidationFailed(
                "game.max_crash_multiplier is below game.min_crash_multiplier".to_string(),
            ));
        }

        if self.treasury.house_account.trim().is_empty() {
            return Err(invalid("treasury.house_account", "", "cannot be empty"));
        }

        if self.storage.backend == StorageBackend::RocksDb && self.storage.data_directory.is_empty() {
            return Err(invalid("storage.data_directory", "", "required for the RocksDb backend"));
        }

        if self.api.port == 0 {
            return Err(invalid("api.port", 0, "port cannot be zero"));
        }

        for credential in &self.api.credentials {
            if credential.principal.trim().is_empty() {
                return Err(invalid("api.credentials.principal", "", "cannot be empty"));
            }
            let hash = &credential.key_hash;
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid(
                    "api.credentials.key_hash",
                    hash,
                    "must be a hex SHA-256 digest",
                ));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> EngineResult<BalloonflyConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => BalloonflyConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> Result<BalloonflyConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<BalloonflyConfig, ConfigurationError> {
        toml::from_str(content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(config: &mut BalloonflyConfig) -> Result<(), ConfigurationError> {
        if let Ok(dir) = env::var("BALLOONFLY_DATA_DIR") {
            config.storage.data_directory = dir;
        }
        if let Ok(host) = env::var("BALLOONFLY_API_HOST") {
            config.api.host = host;
        }
        if let Some(port) = parse_env::<u16>("BALLOONFLY_API_PORT", "Invalid port number")? {
            config.api.port = port;
        }
        if let Some(edge) = parse_env::<u32>("BALLOONFLY_HOUSE_EDGE_BPS", "Invalid basis points")? {
            config.game.house_edge_bps = edge;
        }
        if let Ok(house) = env::var("BALLOONFLY_HOUSE_ACCOUNT") {
            config.treasury.house_account = house;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, reason: &str) -> Result<Option<T>, ConfigurationError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| ConfigurationError::InvalidValue {
            field: name.to_string(),
            value: raw,
            reason: reason.to_string(),
        }),
        Err(_) => Ok(None),
    }
}
