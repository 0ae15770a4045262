use thiserror::Error;

use crate::domain::error::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Debit attempted beyond the available balance.
    #[error("insufficient funds: have {available}, need {requested}")]
    InsufficientFunds {
        available: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },

    /// Quote inactive, or the event is no longer accepting stakes.
    #[error("market closed: {reason}")]
    MarketClosed { reason: String },

    /// Settlement attempted before the event is finished with an outcome.
    #[error("event is not final: {reason}")]
    EventNotFinal { reason: String },

    /// A decision was attempted on an already-decided profit approval.
    #[error("approval already decided as {status}")]
    AlreadyDecided { status: String },

    /// The reviewer of a profit approval is the bettor themselves.
    #[error("reviewer {reviewer_id} cannot approve their own winnings")]
    SelfApprovalForbidden { reviewer_id: String },

    /// The user already holds an open wager on this (event, market).
    #[error("duplicate wager: user already has an open wager on this market")]
    DuplicateWager,

    /// An illegal status transition was requested.
    #[error("invalid transition: {entity} cannot go from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An account was opened twice for the same user.
    #[error("account already exists for user {user_id}")]
    AccountExists { user_id: String },

    /// Storage contention persisted through every allowed retry.
    #[error("storage unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<diesel::result::Error> for Error {
    // A bare database error carries its own message. Call sites that can
    // attribute a constraint violation to a caller-visible condition (the
    // open-wager uniqueness index at placement) map it there instead.
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl Error {
    /// True when the underlying storage reported lock contention, which the
    /// operation boundary may retry.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        match self {
            Error::Database(msg) => msg.contains("database is locked"),
            _ => false,
        }
    }
}
