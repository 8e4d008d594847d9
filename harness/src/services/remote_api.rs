//! Request-scoped bridge onto a dev server's internal remote API
//!
//! The remote API bypasses the public webapp endpoint for privileged
//! operations such as seeding datastore state. Constructing a context is
//! pure address composition; no network I/O happens until a request is
//! issued.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::{HarnessError, HarnessResult};
use crate::services::join_url;

const REMOTE_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle bound to one instance's internal remote API endpoint
#[derive(Debug, Clone)]
pub struct RemoteApiContext {
    endpoint: Url,
    client: reqwest::Client,
}

impl RemoteApiContext {
    pub(crate) fn new(host: &str, api_port: u16) -> HarnessResult<Self> {
        let raw = format!("http://{host}:{api_port}/");
        // A parse failure here means malformed internal instance state.
        let endpoint = Url::parse(&raw).map_err(|source| HarnessError::UrlParse {
            url: raw,
            source,
        })?;
        let client = reqwest::Client::builder()
            .timeout(REMOTE_API_TIMEOUT)
            .build()?;
        Ok(Self { endpoint, client })
    }

    /// The remote API endpoint this context is bound to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Absolute URL for a path under the remote API endpoint
    pub fn api_url(&self, path: &str) -> String {
        join_url(self.endpoint.as_str(), path)
    }

    /// Issues a privileged GET against the remote API
    pub async fn get(&self, path: &str) -> HarnessResult<reqwest::Response> {
        let response = self.client.get(self.api_url(path)).send().await?;
        check_status(response)
    }

    /// Issues a privileged JSON POST against the remote API
    pub async fn post_json<T>(&self, path: &str, body: &T) -> HarnessResult<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.api_url(path))
            .json(body)
            .send()
            .await?;
        check_status(response)
    }
}

fn check_status(response: reqwest::Response) -> HarnessResult<reqwest::Response> {
    if !response.status().is_success() {
        return Err(HarnessError::RemoteApiStatus {
            status: response.status(),
        });
    }
    Ok(response)
}
