// [apps/agent/src/errors.rs]
//! Superficie de error del Agente: wrapea fallos de red/IO y expone el
//! vocabulario cerrado de `ErrorKind` a cada subsistema.

use neoscan_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("uplink request failed: {0}")]
    Uplink(#[from] reqwest::Error),

    #[error("master rejected request: {0}")]
    MasterRejection(String),

    #[error("unauthorized: token missing, expired or invalid")]
    Unauthorized,

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("{kind}: {detail}")]
    Kind { kind: ErrorKind, detail: String },
}

impl AgentError {
    pub fn kind(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Kind { kind, detail: detail.into() }
    }
}
