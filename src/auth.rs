//! Client-credentials authentication against Azure AD.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use log::debug;
use reqwest::Client;
use tokio::sync::RwLock;

use crate::config::Credentials;
use crate::error::{ExportError, Result};
use crate::models::{TokenErrorResponse, TokenResponse};

/// Scope requesting every application permission granted to the app.
const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Refresh this long before the token actually expires.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// A token issued by the token endpoint.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token_type: String,
    pub access_token: String,
    /// Lifetime in seconds from issuance.
    pub expires_in: u64,
}

impl Credential {
    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Cached header value with expiration.
#[derive(Clone)]
struct CachedToken {
    header: String,
    expires_at: SystemTime,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > SystemTime::now() + EXPIRY_BUFFER
    }
}

/// Exchanges app credentials for bearer tokens and caches the result.
#[derive(Clone)]
pub struct TokenProvider {
    credentials: Arc<Credentials>,
    token_url: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenProvider {
    /// Create a provider for the tenant's token endpoint under `login_base_url`.
    pub fn new(credentials: Credentials, login_base_url: &str, client: Client) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            login_base_url.trim_end_matches('/'),
            credentials.tenant_id
        );
        Self {
            credentials: Arc::new(credentials),
            token_url,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Perform the token exchange and install the result in the cache.
    pub async fn acquire(&self) -> Result<Credential> {
        let mut cached = self.cached_token.write().await;
        let credential = self.request_token().await?;
        *cached = Some(cache_entry(&credential));
        Ok(credential)
    }

    /// Get a valid `Authorization` header value, refreshing if necessary.
    pub async fn authorization_header(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.header.clone());
            }
        }

        let mut cached = self.cached_token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.header.clone());
        }

        debug!("access token missing or about to expire, refreshing");
        let credential = self.request_token().await?;
        let entry = cache_entry(&credential);
        let header = entry.header.clone();
        *cached = Some(entry);
        Ok(header)
    }

    /// Drop the cached token if it still carries `rejected`.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached_token.write().await;
        if cached.as_ref().is_some_and(|t| t.header == rejected) {
            *cached = None;
        }
    }

    async fn request_token(&self) -> Result<Credential> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", GRAPH_DEFAULT_SCOPE),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ExportError::AuthError(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(ExportError::AuthError(format!("Status {}: {}", status, detail)));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ExportError::AuthError(format!("unparsable token response: {}", e)))?;

        if token.access_token.is_empty() {
            return Err(ExportError::AuthError(
                "token response carried an empty access token".to_string(),
            ));
        }

        debug!("acquired {} token, expires in {}s", token.token_type, token.expires_in);

        Ok(Credential {
            token_type: token.token_type,
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

fn cache_entry(credential: &Credential) -> CachedToken {
    CachedToken {
        header: credential.header_value(),
        expires_at: SystemTime::now() + Duration::from_secs(credential.expires_in),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new(
            Some("cid".to_string()),
            Some("contoso-tenant".to_string()),
            Some("secret".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_token_url() {
        let provider = TokenProvider::new(
            credentials(),
            "https://login.microsoftonline.com/",
            Client::new(),
        );
        assert_eq!(
            provider.token_url(),
            "https://login.microsoftonline.com/contoso-tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_header_value() {
        let credential = Credential {
            token_type: "Bearer".to_string(),
            access_token: "abc".to_string(),
            expires_in: 3599,
        };
        assert_eq!(credential.header_value(), "Bearer abc");
    }

    #[test]
    fn test_short_lived_token_is_stale() {
        let credential = Credential {
            token_type: "Bearer".to_string(),
            access_token: "abc".to_string(),
            expires_in: 30,
        };
        assert!(!cache_entry(&credential).is_fresh());

        let credential = Credential {
            expires_in: 3599,
            ..credential
        };
        assert!(cache_entry(&credential).is_fresh());
    }
}
