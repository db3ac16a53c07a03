//! Shared request/response handling for both backend clients

use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{CliError, CliResult};

const USER_AGENT: &str = concat!("sdcli/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Build the HTTP client shared by every backend adapter of one invocation
pub fn build_http_client() -> CliResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| CliError::Network(e.to_string()))
}

/// Send a request and decode a JSON response body
pub(crate) async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> CliResult<T> {
    let response = check_status(request.send().await?).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| CliError::Parse(e.to_string()))
}

/// Like [`send_json`] for requests addressing a single model, where a 404
/// means the model does not exist
pub(crate) async fn send_model_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> CliResult<T> {
    send_json(request).await.map_err(CliError::into_model_not_found)
}

/// Send a request, ignoring any response body
pub(crate) async fn send_empty(request: reqwest::RequestBuilder) -> CliResult<()> {
    check_status(request.send().await?).await?;
    Ok(())
}

async fn check_status(response: reqwest::Response) -> CliResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), url = %url, "Backend request failed");
    Err(CliError::from_status(status, message))
}
