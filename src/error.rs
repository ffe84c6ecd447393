use std::path::PathBuf;
use thiserror::Error;

use crate::store::RunPhase;

pub type Result<T> = std::result::Result<T, ReconError>;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to persist intel store at {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("intel store is locked by another run ({})", path.display())]
    Locked { path: PathBuf },

    #[error("failed to acquire run lock at {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize intel store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("run phase out of order: at {current:?}, attempted {attempted:?}")]
    Phase {
        current: RunPhase,
        attempted: RunPhase,
    },
}

impl ReconError {
    pub fn config(msg: impl Into<String>) -> Self {
        ReconError::Config(msg.into())
    }
}
