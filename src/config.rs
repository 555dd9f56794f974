//! Credentials and runtime options for an export job.

use std::time::Duration;

use crate::error::{ExportError, Result};

/// Microsoft Graph v1.0 endpoint.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Azure AD login endpoint; the tenant id is appended to it.
pub const LOGIN_BASE: &str = "https://login.microsoftonline.com";

pub const CLIENT_ID_VAR: &str = "EXPORT_TOOL.CLIENT_ID";
pub const TENANT_ID_VAR: &str = "EXPORT_TOOL.TENANT_ID";
pub const CLIENT_SECRET_VAR: &str = "EXPORT_TOOL.CLIENT_SECRET";

/// App registration credentials for the client-credentials grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub tenant_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Build credentials, rejecting missing or empty values.
    pub fn new(
        client_id: Option<String>,
        tenant_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            client_id: require(client_id, CLIENT_ID_VAR)?,
            tenant_id: require(tenant_id, TENANT_ID_VAR)?,
            client_secret: require(client_secret, CLIENT_SECRET_VAR)?,
        })
    }

    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary variable lookup.
    ///
    /// The dotted names are tried first; `EXPORT_TOOL_CLIENT_ID` style names
    /// are accepted for shells that cannot export dots.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(&key.replace('.', "_")))
        };
        Self::new(get(CLIENT_ID_VAR), get(TENANT_ID_VAR), get(CLIENT_SECRET_VAR))
    }
}

fn require(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ExportError::ConfigurationError(format!(
            "{} environment variable not set",
            name
        ))),
    }
}

/// Runtime options shared by every component of a job.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub graph_base_url: String,
    pub login_base_url: String,
    /// Walk every user's whole drive instead of probing well-known folders.
    pub full: bool,
    /// Upper bound on concurrent Graph requests and walker fan-out.
    pub concurrency: usize,
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt.
    pub retry_backoff: Duration,
    pub timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            graph_base_url: GRAPH_API_BASE.to_string(),
            login_base_url: LOGIN_BASE.to_string(),
            full: false,
            concurrency: 4,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ExportConfig {
    /// Concurrency clamped to at least one worker.
    pub fn workers(&self) -> usize {
        self.concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_credentials_from_dotted_names() {
        let creds = Credentials::from_lookup(lookup(&[
            ("EXPORT_TOOL.CLIENT_ID", "cid"),
            ("EXPORT_TOOL.TENANT_ID", "tid"),
            ("EXPORT_TOOL.CLIENT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(creds.client_id, "cid");
        assert_eq!(creds.tenant_id, "tid");
        assert_eq!(creds.client_secret, "secret");
    }

    #[test]
    fn test_credentials_underscore_fallback() {
        let creds = Credentials::from_lookup(lookup(&[
            ("EXPORT_TOOL_CLIENT_ID", "cid"),
            ("EXPORT_TOOL.TENANT_ID", "tid"),
            ("EXPORT_TOOL_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(creds.client_id, "cid");
        assert_eq!(creds.client_secret, "secret");
    }

    #[test]
    fn test_missing_tenant_is_configuration_error() {
        let err = Credentials::from_lookup(lookup(&[
            ("EXPORT_TOOL.CLIENT_ID", "cid"),
            ("EXPORT_TOOL.CLIENT_SECRET", "secret"),
        ]))
        .unwrap_err();

        match err {
            ExportError::ConfigurationError(msg) => assert!(msg.contains("TENANT_ID")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_secret_rejected() {
        let err = Credentials::new(
            Some("cid".to_string()),
            Some("tid".to_string()),
            Some("  ".to_string()),
        )
        .unwrap_err();

        assert!(matches!(err, ExportError::ConfigurationError(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new(
            Some("cid".to_string()),
            Some("tid".to_string()),
            Some("hunter2".to_string()),
        )
        .unwrap();

        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_workers_never_zero() {
        let config = ExportConfig {
            concurrency: 0,
            ..ExportConfig::default()
        };
        assert_eq!(config.workers(), 1);
    }
}
