//! Application-wide error types.

use thiserror::Error;

use crate::collections::CollectionError;
use crate::sequencer::SessionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("collections error: {0}")]
    Collections(#[from] CollectionError),

    /// A bootstrap phase failed; `stage` names the phase for the operator.
    #[error("{stage}: {source}")]
    Setup {
        stage: &'static str,
        #[source]
        source: SessionError,
    },

    #[error("output error: {0}")]
    Output(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn setup(stage: &'static str, source: SessionError) -> Self {
        AppError::Setup { stage, source }
    }
}
