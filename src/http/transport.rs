use crate::http::error::HttpError;
use log::warn;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Upper bound for a single request; a hung endpoint stalls the batch for at most this long.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// A GET request against a JSON API.
///
/// The URL never carries the query string so it can be logged without leaking
/// API keys passed as query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A single-attempt JSON GET. Retrying lives in [`crate::http::RetryingClient`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get_json(&self, request: &ApiRequest) -> Result<Value, HttpError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("aq_etl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HttpError::ClientBuild)?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn get_json(&self, request: &ApiRequest) -> Result<Value, HttpError> {
        let mut builder = self.client.get(&request.url).query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::NetworkRequest(request.url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", request.url, e.status());
                return Err(if let Some(status) = e.status() {
                    HttpError::HttpStatus {
                        url: request.url.clone(),
                        status,
                        source: Some(e),
                    }
                } else {
                    HttpError::NetworkRequest(request.url.clone(), e)
                });
            }
        };

        response
            .json::<Value>()
            .await
            .map_err(|e| HttpError::JsonBody(request.url.clone(), e))
    }
}
