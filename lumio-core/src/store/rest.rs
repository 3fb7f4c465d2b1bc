//! REST-backed progress store.
//!
//! Thin client for the storage service's watch-progress endpoints. All
//! requests run under a bounded timeout; a timeout or connection failure is
//! reported as [`StoreError::Transient`] so the session's next autosave tick
//! retries naturally instead of an immediate retry storm.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;
use url::Url;

use lumio_model::{ProgressRecord, UserId, VideoId};

use super::{ProgressStore, StoreError};

/// Connection settings for the storage service.
#[derive(Debug, Clone)]
pub struct RestStoreOptions {
    pub base_url: Url,
    /// Bearer token minted by the identity collaborator, if any.
    pub bearer_token: Option<String>,
    /// Per-request timeout. Order of seconds; on expiry the call maps to a
    /// transient failure.
    pub timeout: Duration,
}

impl RestStoreOptions {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            bearer_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Progress store speaking to the storage service over HTTP.
#[derive(Debug, Clone)]
pub struct RestProgressStore {
    client: Client,
    options: RestStoreOptions,
    api_version: String,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl RestProgressStore {
    pub fn new(options: RestStoreOptions) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| {
                StoreError::Rejected(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            options,
            api_version: "v1".to_string(),
        })
    }

    /// Build a versioned API URL.
    fn build_url(&self, path: &str) -> String {
        let base = self.options.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/api/{}/{}", base, self.api_version, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.options.bearer_token {
            builder.header("Authorization", format!("Bearer {token}"))
        } else {
            builder
        }
    }

    /// Map a wire-level failure into the store taxonomy.
    fn map_request_error(err: reqwest::Error) -> StoreError {
        if err.is_timeout() || err.is_connect() {
            StoreError::Transient(err.to_string())
        } else if err.is_builder() || err.is_decode() {
            StoreError::Rejected(err.to_string())
        } else {
            StoreError::Transient(err.to_string())
        }
    }

    /// Map a non-success status into the store taxonomy. Server-side and
    /// throttling statuses are retryable; the remaining client errors mean
    /// the service refused the write (e.g. the video or user row is gone).
    async fn map_status_error(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let detail = response
            .text()
            .await
            .ok()
            .and_then(|text| {
                serde_json::from_str::<ErrorBody>(&text)
                    .ok()
                    .and_then(|body| body.error.or(body.message))
                    .or(Some(text))
            })
            .unwrap_or_default();

        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            StoreError::Transient(format!("{status}: {detail}"))
        } else {
            StoreError::Rejected(format!("{status}: {detail}"))
        }
    }
}

#[async_trait]
impl ProgressStore for RestProgressStore {
    async fn load(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        let url =
            self.build_url(&format!("watch/progress/{user_id}/{video_id}"));
        debug!(%url, "loading watch progress");

        let request = self.authorize(self.client.get(&url));
        let response =
            request.send().await.map_err(Self::map_request_error)?;

        match response.status() {
            StatusCode::OK => {
                let record = response
                    .json::<ProgressRecord>()
                    .await
                    .map_err(Self::map_request_error)?;
                Ok(Some(record))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::map_status_error(response).await),
        }
    }

    async fn upsert(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        let url = self.build_url("watch/progress");
        let request = self.authorize(self.client.put(&url).json(record));
        let response =
            request.send().await.map_err(Self::map_request_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            _ => Err(Self::map_status_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestProgressStore {
        RestProgressStore::new(RestStoreOptions::new(
            Url::parse("https://progress.lumio.test/").unwrap(),
        ))
        .unwrap()
    }

    #[test]
    fn urls_are_versioned_without_double_slashes() {
        let store = store();
        assert_eq!(
            store.build_url("watch/progress"),
            "https://progress.lumio.test/api/v1/watch/progress"
        );
        assert_eq!(
            store.build_url("/watch/progress"),
            "https://progress.lumio.test/api/v1/watch/progress"
        );
    }
}
