use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or opening the tunnel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TunnelError {
    #[error("tunnel length must be greater than zero")]
    ZeroLength,

    #[error("batch quota must be greater than zero")]
    ZeroBatch,

    #[error("tunnel is already open")]
    AlreadyOpen,
}

/// Errors that can occur while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Fatal simulation errors. Any of these stops the whole process.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("error creating tunnel: {0}")]
    Tunnel(#[from] TunnelError),

    #[error("error opening trace file {path}: {source}")]
    Trace {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("vehicle worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
