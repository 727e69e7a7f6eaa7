//! Error types for the Balloonfly settlement engine
//!
//! Business rejections live in [`GameError`], a closed enumeration whose numeric
//! codes are the persisted/wire representation. Infrastructure failures
//! (storage, configuration) are kept apart so callers can tell a rejected bet
//! from a broken ledger.

use std::fmt;

/// Expected business errors returned by engine operations.
///
/// Codes are stable across versions. Never renumber a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error)]
#[repr(u32)]
pub enum GameError {
    #[error("Round not found")]
    RoundNotFound = 1,

    #[error("Round already exists")]
    RoundAlreadyExists = 2,

    #[error("Invalid round status for this operation")]
    InvalidRoundStatus = 3,

    #[error("Server seed does not match the committed hash")]
    InvalidServerSeedHash = 4,

    #[error("Invalid multiplier value")]
    InvalidMultiplier = 5,

    #[error("Invalid bet amount")]
    InvalidBetAmount = 6,

    #[error("Bet already placed for this round")]
    BetAlreadyPlaced = 7,

    #[error("Bet not found")]
    BetNotFound = 8,

    #[error("Bet is not active")]
    BetNotActive = 9,

    #[error("Unauthorized operation")]
    Unauthorized = 10,

    #[error("Round already crashed")]
    AlreadyCrashed = 11,

    #[error("Transfer failed")]
    TransferFailed = 12,

    #[error("Admin not initialized")]
    AdminNotInitialized = 13,
}

impl GameError {
    pub const ALL: [GameError; 13] = [
        GameError::RoundNotFound,
        GameError::RoundAlreadyExists,
        GameError::InvalidRoundStatus,
        GameError::InvalidServerSeedHash,
        GameError::InvalidMultiplier,
        GameError::InvalidBetAmount,
        GameError::BetAlreadyPlaced,
        GameError::BetNotFound,
        GameError::BetNotActive,
        GameError::Unauthorized,
        GameError::AlreadyCrashed,
        GameError::TransferFailed,
        GameError::AdminNotInitialized,
    ];

    /// Stable numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    /// Variant name, used as the symbolic code on the wire.
    pub fn name(self) -> &'static str {
        match self {
            GameError::RoundNotFound => "RoundNotFound",
            GameError::RoundAlreadyExists => "RoundAlreadyExists",
            GameError::InvalidRoundStatus => "InvalidRoundStatus",
            GameError::InvalidServerSeedHash => "InvalidServerSeedHash",
            GameError::InvalidMultiplier => "InvalidMultiplier",
            GameError::InvalidBetAmount => "InvalidBetAmount",
            GameError::BetAlreadyPlaced => "BetAlreadyPlaced",
            GameError::BetNotFound => "BetNotFound",
            GameError::BetNotActive => "BetNotActive",
            GameError::Unauthorized => "Unauthorized",
            GameError::AlreadyCrashed => "AlreadyCrashed",
            GameError::TransferFailed => "TransferFailed",
            GameError::AdminNotInitialized => "AdminNotInitialized",
        }
    }
}

/// Root error type for all engine operations
#[derive(Debug)]
pub enum EngineError {
    /// Rejected by game rules
    Game(GameError),

    /// Ledger storage failures
    Storage(StorageError),

    /// Configuration related errors
    Configuration(ConfigurationError),

    /// Ledger was initialized with a different admin
    AlreadyInitialized { admin: String },
}

/// Storage system errors
#[derive(Debug)]
pub enum StorageError {
    DatabaseOpenFailed(String),
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    ValidationFailed(String),
    InvalidValue { field: String, value: String, reason: String },
    LoadFailed(String),
}

impl EngineError {
    /// The business error, if this is one.
    pub fn game_error(&self) -> Option<GameError> {
        match self {
            EngineError::Game(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Game(e) => write!(f, "Game error {}: {}", e.code(), e),
            EngineError::Storage(e) => write!(f, "Storage error: {}", e),
            EngineError::Configuration(e) => write!(f, "Configuration error: {}", e),
            EngineError::AlreadyInitialized { admin } => {
                write!(f, "Ledger already initialized with admin {}", admin)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DatabaseOpenFailed(msg) => write!(f, "Database open failed: {}", msg),
            StorageError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::ValidationFailed(msg) => write!(f, "Validation failed: {}", msg),
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Game(e) => Some(e),
            EngineError::Storage(e) => Some(e),
            EngineError::Configuration(e) => Some(e),
            EngineError::AlreadyInitialized { .. } => None,
        }
    }
}

impl std::error::Error for StorageError {}
impl std::error::Error for ConfigurationError {}

impl From<GameError> for EngineError {
    fn from(e: GameError) -> Self {
        EngineError::Game(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}

impl From<ConfigurationError> for EngineError {
    fn from(e: ConfigurationError) -> Self {
        EngineError::Configuration(e)
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::WriteFailed(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::CorruptedData(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
