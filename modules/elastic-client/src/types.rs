use serde::Deserialize;

/// Response body of `PUT /{index}/_doc/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", default)]
    pub version: u64,
    /// "created" or "updated".
    pub result: String,
}

impl IndexResponse {
    pub fn created(&self) -> bool {
        self.result == "created"
    }
}

/// Response body of `PUT /{index}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIndexResponse {
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub index: String,
}

/// Error envelope Elasticsearch returns on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorCause,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorCause {
    Detailed {
        #[serde(rename = "type")]
        error_type: String,
        #[serde(default)]
        reason: String,
    },
    Plain(String),
}
