//! Error type shared by the flowsheet, the recycle solver and the configuration manager.
//!
//! The capture controller never produces an error once constructed: a capture limit that is
//! incompatible with the mass balance shows up as [`FlowsheetError::ConvergenceFailure`]
//! returned by the host recycle solver.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowsheetError {
    /// Recycle loop did not reach its tolerance within the iteration budget
    #[error(
        "recycle loop failed to converge after {iterations} iterations (max residual {residual:.3e})"
    )]
    ConvergenceFailure { iterations: usize, residual: f64 },
    /// A flow overflowed or became NaN while a loop was running away
    #[error("molar flow of {chemical} in stream '{stream}' is not finite")]
    NonFiniteFlow { stream: String, chemical: String },
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration format error: {0}")]
    ConfigFormat(#[from] serde_json::Error),
    #[error("logger initialisation failed: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl FlowsheetError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        FlowsheetError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type FlowsheetResult<T> = Result<T, FlowsheetError>;
