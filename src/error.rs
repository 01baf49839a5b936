//! Error types for cancela

use std::io;

/// Main error type for the gateway
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Audit log error: {0}")]
    Audit(String),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        Error::Gateway(msg.into())
    }

    pub fn audit(msg: impl Into<String>) -> Self {
        Error::Audit(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
