//! Microsoft Graph client for tenant-wide drive enumeration.
//!
//! `GraphClient` is an immutable request context: base URL, token provider,
//! retry policy, a shared request semaphore and the job's cancellation token.
//! It is cheap to clone and safe to share between concurrent walkers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::auth::TokenProvider;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::models::{ApiErrorResponse, Drive, DriveItem, Page, Site, User};

/// Longest `Retry-After` we are willing to honour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Client for the Graph endpoints the export walks.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: Arc<str>,
    auth: TokenProvider,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GraphClient {
    /// Create a new GraphClient.
    ///
    /// # Arguments
    /// * `config` - Base URL, retry policy and concurrency bound
    /// * `auth` - Token provider used for every request
    /// * `http` - Shared HTTP client
    /// * `cancel` - Token that aborts in-flight requests when cancelled
    pub fn new(
        config: &ExportConfig,
        auth: TokenProvider,
        http: Client,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            base_url: Arc::from(config.graph_base_url.trim_end_matches('/')),
            auth,
            permits: Arc::new(Semaphore::new(config.workers())),
            cancel,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        }
    }

    pub fn auth(&self) -> &TokenProvider {
        &self.auth
    }

    /// Full URL for a Graph path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// List every site in the tenant.
    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        self.list_all(self.url("sites?search=*")).await
    }

    /// List the document libraries of a site.
    pub async fn list_site_drives(&self, site_id: &str) -> Result<Vec<Drive>> {
        self.list_all(self.url(&format!("sites/{}/drives", site_id)))
            .await
    }

    /// Get the root item of a drive.
    pub async fn drive_root(&self, drive_id: &str) -> Result<DriveItem> {
        self.get_json(&self.url(&format!("drives/{}/root", drive_id)))
            .await
    }

    /// List all children of a drive item, following continuation links.
    pub async fn list_children(&self, drive_id: &str, item_id: &str) -> Result<Vec<DriveItem>> {
        self.list_all(self.url(&format!("drives/{}/items/{}/children", drive_id, item_id)))
            .await
    }

    /// List every user in the directory.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.list_all(self.url("users")).await
    }

    /// Get the root item of a user's personal drive.
    pub async fn user_drive_root(&self, user_id: &str) -> Result<DriveItem> {
        self.get_json(&self.url(&format!("users/{}/drive/root", user_id)))
            .await
    }

    /// Resolve an item by path relative to a user's drive root.
    pub async fn user_item_by_path(&self, user_id: &str, path: &str) -> Result<DriveItem> {
        let path = path.trim_matches('/');
        self.get_json(&self.url(&format!("users/{}/drive/root:/{}", user_id, path)))
            .await
    }

    /// Collect every page of a collection.
    async fn list_all<T: DeserializeOwned>(&self, first: String) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            all_items.extend(page.value);
            if let Some(link) = &page.next_link {
                visited.insert(url);
                if visited.contains(link) {
                    return Err(ExportError::ListingError {
                        url: link.clone(),
                        status: 200,
                        message: "continuation link repeats an earlier page".to_string(),
                    });
                }
            }
            next = page.next_link;
        }

        Ok(all_items)
    }

    /// GET a JSON document with auth, retry and cancellation.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ExportError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| ExportError::Cancelled)?,
        };

        let mut attempt: u32 = 0;
        let mut reauthenticated = false;

        loop {
            let header = self.auth.authorization_header().await?;
            let request = self.http.get(url).header(AUTHORIZATION, &header).send();

            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ExportError::Cancelled),
                response = request => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!("GET {} failed ({}), retry {}/{} in {:?}", url, e, attempt, self.max_retries, delay);
                    self.sleep(delay).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                warn!("GET {} rejected the access token, re-authenticating", url);
                self.auth.invalidate(&header).await;
                reauthenticated = true;
                continue;
            }

            if is_retryable(status) && attempt < self.max_retries {
                attempt += 1;
                let delay = retry_after(response.headers()).unwrap_or_else(|| self.backoff(attempt));
                warn!("GET {} returned {}, retry {}/{} in {:?}", url, status, attempt, self.max_retries, delay);
                self.sleep(delay).await?;
                continue;
            }

            let body = response.text().await?;

            if !status.is_success() {
                let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                    Ok(api_error) if !api_error.error.code.is_empty() => {
                        format!("{}: {}", api_error.error.code, api_error.error.message)
                    }
                    Ok(api_error) => api_error.error.message,
                    Err(_) => body,
                };
                return Err(ExportError::ListingError {
                    url: url.to_string(),
                    status: status.as_u16(),
                    message,
                });
            }

            return serde_json::from_str(&body).map_err(|source| ExportError::MalformedResponse {
                url: url.to_string(),
                source,
            });
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    async fn sleep(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ExportError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Delay requested by a `Retry-After: <seconds>` header.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}
