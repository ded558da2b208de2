//! # Application Errors
//!
//! Error types for the async side of Sensorwatch. Per-event problems never
//! show up here: the core reports those as `Rejection`s and the pump logs
//! them. These types cover the provider, the event source, connecting a
//! session, configuration and the CLI commands.

use sensorwatch_core::{BlockNumber, SensorError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the capability provider (JSON-RPC endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request failed below JSON-RPC (connection, HTTP status, decoding).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint returned a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The requested block does not exist (yet).
    #[error("Block {0} not found")]
    BlockNotFound(BlockNumber),

    /// The provider exposes no accounts.
    #[error("No accounts available")]
    NoAccounts,
}

/// Errors from the event source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Only `DataRecorded` can be subscribed to.
    #[error("Unsupported event: {0}")]
    UnsupportedEvent(String),

    /// The provider failed while resolving or fetching.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The consumer dropped the event channel.
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Errors while establishing a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Account access was refused or unavailable.
    #[error("Account request failed: {0}")]
    Accounts(ProviderError),

    /// No signer could be obtained for the account.
    #[error("Signer unavailable: {0}")]
    Signer(ProviderError),

    /// The subscription could not be established.
    #[error("Subscription failed: {0}")]
    Subscribe(SourceError),

    /// The lifecycle refused the transition.
    #[error(transparent)]
    Lifecycle(#[from] SensorError),
}

/// Configuration errors. These are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Config file {0:?} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    /// No contract address in the file or the environment.
    #[error(
        "Contract address not configured: set contract_address or SENSORWATCH_CONTRACT_ADDRESS"
    )]
    MissingContractAddress,

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error(transparent)]
    Core(#[from] SensorError),
}

/// Top-level error returned by CLI commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl AppError {
    /// True for errors that mean the process cannot run at all.
    #[must_use]
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
