use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid crawler item: {0}")]
    Input(String),
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Input(e.to_string())
    }
}
