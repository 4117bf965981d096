use exposure_api::ProblemDetails;
use thiserror::Error;

/// Outcome classification of a call to a remote service
#[derive(Error, Debug)]
pub enum SbiError {
    /// No response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote party answered with a problem description
    #[error("Remote error: {0}")]
    Remote(ProblemDetails),

    /// A successful response carried a body that could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// No access token could be obtained for the call
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl SbiError {
    /// Structured form of the error.
    ///
    /// Remote problem details pass through unchanged; everything else becomes
    /// a generic system failure carrying the raw error text.
    pub fn into_problem(self) -> ProblemDetails {
        match self {
            SbiError::Remote(problem) => problem,
            SbiError::Transport(detail)
            | SbiError::Decode(detail)
            | SbiError::Credential(detail)
            | SbiError::InvalidAddress(detail) => ProblemDetails::system_failure(detail),
        }
    }
}

impl From<reqwest::Error> for SbiError {
    fn from(err: reqwest::Error) -> Self {
        SbiError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SbiError {
    fn from(err: serde_json::Error) -> Self {
        SbiError::Decode(err.to_string())
    }
}
