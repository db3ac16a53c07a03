//! Error types for sdcli
//!
//! Only the bounded model-check polling has non-fatal outcomes: a soft
//! timeout is reported through `PollResult::timed_out`, and chunk matching
//! problems are reported as `MatchDiagnostic`s. Everything else propagates
//! to the top of the invocation unmodified.

use std::path::PathBuf;
use thiserror::Error;

use crate::sdtf::SdtfError;

/// Error type for every backend-facing operation
#[derive(Debug, Error)]
pub enum CliError {
    /// Local file unreadable or with an unsupported extension
    #[error("Cannot use file {path}: {reason}")]
    FileAccess { path: PathBuf, reason: String },

    /// Model checking did not start within the upload-start budget
    #[error("Poll timeout: {0}")]
    PollTimeout(String),

    /// Backend rejected the request
    #[error("Backend rejected request ({status}): {message}")]
    RemoteValidation { status: u16, message: String },

    /// Backend reports the model does not exist (any more)
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Parameter value does not fit the session's declared parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Customization or export did not finish within the allowed time
    #[error("Computation did not finish within {0} ms")]
    CustomizationTimeout(u64),

    /// Structured data container could not be read or written
    #[error(transparent)]
    Sdtf(#[from] SdtfError),

    /// sdcli-common error
    #[error(transparent)]
    Common(#[from] sdcli_common::Error),
}

impl CliError {
    /// Map a non-success HTTP status to the error taxonomy
    ///
    /// A 404 stays a `RemoteValidation` here: only requests addressing a
    /// model resource may read it as "model not found", see
    /// [`CliError::into_model_not_found`].
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        CliError::RemoteValidation {
            status: status.as_u16(),
            message,
        }
    }

    /// Reinterpret a 404 from a model-resource request as a missing model
    pub fn into_model_not_found(self) -> Self {
        match self {
            CliError::RemoteValidation { status: 404, message } => CliError::ModelNotFound(message),
            other => other,
        }
    }

    /// True for the "model no longer exists" family of failures
    pub fn is_model_not_found(&self) -> bool {
        matches!(self, CliError::ModelNotFound(_))
    }
}

impl From<reqwest::Error> for CliError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CliError::Parse(err.to_string())
        } else {
            CliError::Network(err.to_string())
        }
    }
}

/// Result type for backend-facing operations
pub type CliResult<T> = Result<T, CliError>;
