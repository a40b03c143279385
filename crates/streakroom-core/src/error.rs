//! Core error types for streakroom-core.
//!
//! This module defines the error hierarchy using thiserror. [`ClaimError`] is
//! the business-facing taxonomy that request handlers map onto status codes;
//! the remaining enums describe storage and configuration failures.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for streakroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reward claim and grant errors
    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by reward operations (daily claims, tasks, referrals).
#[derive(Error, Debug)]
pub enum ClaimError {
    /// No authenticated user on the request
    #[error("Unauthorized")]
    Unauthorized,

    /// The user already claimed during the current calendar day
    #[error("Daily reward already claimed today")]
    AlreadyClaimed,

    /// Day index outside the 7-slot cycle
    #[error("Day index {day_index} is outside the reward cycle [0, 6]")]
    OutOfRange { day_index: i64 },

    /// Task id unknown to the catalog
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Task already rewarded for this user
    #[error("Task already completed: {0}")]
    TaskAlreadyCompleted(String),

    /// Referral code does not belong to any user
    #[error("Invalid referral code: {0}")]
    InvalidReferralCode(String),

    /// A user tried to apply their own referral code
    #[error("Cannot use your own referral code")]
    SelfReferral,

    /// The referee already has a referrer
    #[error("Referral already applied for this user")]
    AlreadyReferred,

    /// Validation failure on caller input
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    /// Storage failure; retryable by the caller
    #[error("Persistence failure: {0}")]
    Persistence(#[from] DatabaseError),
}

impl ClaimError {
    /// HTTP-style status code for this error.
    ///
    /// Business-rule rejections are 400, a missing session is 401, and
    /// everything else (storage failures, broken invariants) is 500.
    pub fn status_code(&self) -> u16 {
        match self {
            ClaimError::Unauthorized => 401,
            ClaimError::AlreadyClaimed
            | ClaimError::TaskNotFound(_)
            | ClaimError::TaskAlreadyCompleted(_)
            | ClaimError::InvalidReferralCode(_)
            | ClaimError::SelfReferral
            | ClaimError::AlreadyReferred
            | ClaimError::Invalid(_) => 400,
            ClaimError::OutOfRange { .. } | ClaimError::Persistence(_) => 500,
        }
    }

    /// Whether re-invoking the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClaimError::Persistence(_))
    }
}

impl From<rusqlite::Error> for ClaimError {
    fn from(err: rusqlite::Error) -> Self {
        ClaimError::Persistence(err.into())
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A uniqueness constraint rejected the write
    #[error("Constraint violation: {0}")]
    Conflict(String),

    /// A stored value could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty identifier or text field
    #[error("Empty value for '{0}'")]
    Empty(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Page numbers start at 1
    #[error("Invalid page {page}: pages start at 1")]
    InvalidPage { page: u32 },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => match code.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                rusqlite::ErrorCode::ConstraintViolation => DatabaseError::Conflict(
                    msg.clone().unwrap_or_else(|| code.to_string()),
                ),
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
