use thiserror::Error;

pub type Result<T> = std::result::Result<T, ElasticError>;

#[derive(Debug, Error)]
pub enum ElasticError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error (status {status}, {error_type}): {reason}")]
    Api {
        status: u16,
        error_type: String,
        reason: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ElasticError {
    /// True when a create lost the race against another writer.
    pub fn is_index_already_exists(&self) -> bool {
        matches!(
            self,
            ElasticError::Api { error_type, .. } if error_type == "resource_already_exists_exception"
        )
    }
}

impl From<reqwest::Error> for ElasticError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ElasticError::Timeout(err.to_string())
        } else {
            ElasticError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ElasticError {
    fn from(err: serde_json::Error) -> Self {
        ElasticError::Parse(err.to_string())
    }
}
