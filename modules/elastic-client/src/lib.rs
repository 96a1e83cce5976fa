pub mod error;
pub mod types;

pub use error::{ElasticError, Result};
pub use types::{CreateIndexResponse, IndexResponse};

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use types::{ErrorCause, ErrorEnvelope};

#[derive(Clone)]
pub struct ElasticClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: Option<(String, String)>,
}

impl ElasticClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ElasticError::Parse(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ElasticError::Parse(format!(
                "base url {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            credentials: None,
        })
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Check whether `index` exists (`HEAD /{index}`).
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let resp = self.request(Method::HEAD, &[index]).send().await?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ElasticError::Api {
                status: status.as_u16(),
                error_type: "unexpected_status".to_string(),
                reason: format!("HEAD /{index} returned {status}"),
            }),
        }
    }

    /// Create `index` with the given settings/mappings body (`PUT /{index}`).
    pub async fn create_index(
        &self,
        index: &str,
        body: &serde_json::Value,
    ) -> Result<CreateIndexResponse> {
        tracing::debug!(index, "Creating index");

        let resp = self.request(Method::PUT, &[index]).json(body).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        Ok(resp.json().await?)
    }

    /// Write `document` under `id`, replacing any previous version
    /// (`PUT /{index}/_doc/{id}`). `timeout` bounds both the HTTP exchange and
    /// the server-side wait for the primary shard.
    pub async fn index_document<T: Serialize + ?Sized>(
        &self,
        index: &str,
        id: &str,
        document: &T,
        timeout: Duration,
    ) -> Result<IndexResponse> {
        let resp = self
            .request(Method::PUT, &[index, "_doc", id])
            .query(&[("timeout", format!("{}s", timeout.as_secs().max(1)))])
            .timeout(timeout)
            .json(document)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let body: IndexResponse = resp.json().await?;
        tracing::debug!(index, id, result = %body.result, version = body.version, "Indexed document");
        Ok(body)
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }

        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }
}

async fn api_error(resp: Response) -> ElasticError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(ErrorEnvelope {
            error: ErrorCause::Detailed { error_type, reason },
        }) => ElasticError::Api {
            status,
            error_type,
            reason,
        },
        Ok(ErrorEnvelope {
            error: ErrorCause::Plain(reason),
        }) => ElasticError::Api {
            status,
            error_type: "unknown".to_string(),
            reason,
        },
        Err(_) => ElasticError::Api {
            status,
            error_type: "unknown".to_string(),
            reason: body,
        },
    }
}
