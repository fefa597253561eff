//! Typed error boundary shared by every subsystem.
//!
//! Internal functions propagate `anyhow::Result`; handlers at a subsystem
//! boundary (WS dispatch, HTTP handler, governor tick) classify into one of
//! these four kinds instead of letting a library error type escape.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    ClientInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Invariant(String),
}

impl CoreError {
    pub fn client_input(msg: impl Into<String>) -> Self {
        Self::ClientInput(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::ClientInput(m) | Self::Unauthorized(m) | Self::Transient(m) | Self::Invariant(m) => m,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::ClientInput("not found".to_string()),
            other => CoreError::Transient(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::ClientInput(err.to_string())
    }
}
