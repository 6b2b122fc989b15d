use std::time::Duration;

use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{MauiChannelError, Result};

const USER_AGENT: &str = concat!("maui-channel/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by every provider for the whole process.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| MauiChannelError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Validates a configured API base URL and strips its trailing slash.
pub(super) fn normalize_base_url(base_url: &str) -> Result<String> {
    Url::parse(base_url).map_err(|e| MauiChannelError::Config(format!("Invalid base URL: {e}")))?;
    Ok(base_url.trim_end_matches('/').to_string())
}

/// Sends a request and decodes a JSON body, giving up as soon as `cancel` fires.
///
/// Transport failures and non-success statuses are `Unavailable`; a success
/// response whose body does not fit `T` is `Parse`. No retries are made.
pub(super) async fn send_json<T>(
    request: RequestBuilder,
    endpoint: &str,
    cancel: &CancellationToken,
) -> Result<T>
where
    T: DeserializeOwned,
{
    debug!("GET {endpoint}");

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(MauiChannelError::Cancelled),
        response = request.send() => response.map_err(|e| unavailable(endpoint, &e))?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(MauiChannelError::Unavailable {
            endpoint: endpoint.to_string(),
            reason: format!("HTTP {status}"),
        });
    }

    let body = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(MauiChannelError::Cancelled),
        body = response.text() => body.map_err(|e| unavailable(endpoint, &e))?,
    };

    serde_json::from_str(&body).map_err(|source| MauiChannelError::Parse {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn unavailable(endpoint: &str, error: &reqwest::Error) -> MauiChannelError {
    let reason = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    };

    MauiChannelError::Unavailable {
        endpoint: endpoint.to_string(),
        reason,
    }
}
