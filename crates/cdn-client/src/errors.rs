use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdnError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Request failed ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error("Failed to parse JSON: {source}. Body: {body}")]
    Parse {
        source: serde_json::Error,
        body: String,
    },
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}
