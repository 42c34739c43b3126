use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Failed to parse JSON body from {0}")]
    JsonBody(String, #[source] reqwest::Error),
}

impl HttpError {
    /// The HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::HttpStatus { status, .. } => Some(*status),
            HttpError::NetworkRequest(_, e) | HttpError::JsonBody(_, e) => e.status(),
            HttpError::ClientBuild(_) => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_helpers_follow_the_carried_status() {
        let limited = HttpError::HttpStatus {
            url: "https://api.openaq.org/v3/locations".to_string(),
            status: StatusCode::TOO_MANY_REQUESTS,
            source: None,
        };
        assert!(limited.is_rate_limited());
        assert!(!limited.is_not_found());

        let missing = HttpError::HttpStatus {
            url: "https://api.openaq.org/v3/measurements".to_string(),
            status: StatusCode::NOT_FOUND,
            source: None,
        };
        assert!(missing.is_not_found());
        assert_eq!(missing.status(), Some(StatusCode::NOT_FOUND));
    }
}
