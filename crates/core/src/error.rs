use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was invoked with an entity it does not accept.
    #[error("Method not allowed, expected one of: {}", .allowed.join(", "))]
    MethodNotAllowed { allowed: Vec<String> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Listener for '{event}' failed: {message}")]
    Listener { event: String, message: String },

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    pub fn method_not_allowed<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CampaignError::MethodNotAllowed {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<config::ConfigError> for CampaignError {
    fn from(err: config::ConfigError) -> Self {
        CampaignError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_allowed_lists_allowed_kinds() {
        let err = CampaignError::method_not_allowed(["Dynamic Content"]);
        assert_eq!(
            err.to_string(),
            "Method not allowed, expected one of: Dynamic Content"
        );
    }

    #[test]
    fn test_listener_error_message() {
        let err = CampaignError::Listener {
            event: "dynamic_content.pre_save".into(),
            message: "boom".into(),
        };
        assert!(err.to_string().contains("dynamic_content.pre_save"));
        assert!(err.to_string().ends_with("boom"));
    }
}
