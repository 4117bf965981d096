use exposure_api::ProblemDetails;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("No registered instance found for dependency: {0}")]
    DependencyNotFound(String),

    #[error("Discovery for {dependency} failed: {problem}")]
    DiscoveryFailed {
        dependency: String,
        problem: ProblemDetails,
    },

    #[error("Registration cancelled before it succeeded")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Problem detail reported to a caller of the service-based interface
    pub fn to_problem(&self) -> ProblemDetails {
        match self {
            CoreError::InvalidSubscription(detail) => {
                ProblemDetails::data_not_found(detail.clone())
            }
            CoreError::SubscriptionNotFound(_) | CoreError::DependencyNotFound(_) => {
                ProblemDetails::data_not_found(self.to_string())
            }
            CoreError::DiscoveryFailed { problem, .. } => problem.clone(),
            other => ProblemDetails::system_failure(other.to_string()),
        }
    }
}
