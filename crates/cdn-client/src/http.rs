use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use super::errors::CdnError;

static CLIENT: OnceLock<Client> = OnceLock::new();

pub fn shared_client() -> &'static Client {
    CLIENT.get_or_init(|| Client::new())
}

/// GET a JSON document. The raw body rides along in the Parse error so a
/// malformed payload can be reported verbatim.
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, CdnError> {
    let response = client.get(url).send().await.map_err(CdnError::Request)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CdnError::Status { status, body });
    }

    let body = response.text().await.map_err(CdnError::Request)?;
    serde_json::from_str::<T>(&body).map_err(|err| CdnError::Parse { source: err, body })
}
