use std::time::Duration;

use serde::Deserialize;

use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::jwt::{Credential, PrivateKey};

/// Connection settings for a Snowflake account.
///
/// Exactly one of `private_key` (PEM text) or `private_key_path` must be set.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// e.g. `https://xy12345.snowflakecomputing.com`
    pub account_url: String,
    pub account_identifier: String,
    pub user_identifier: String,
    /// Computed from the private key when not given
    pub public_key_fingerprint: Option<String>,
    pub private_key: Option<String>,
    pub private_key_path: Option<String>,
    pub database: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    /// Server-side statement timeout; the HTTP timeout is 15 seconds longer
    pub timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<usize>,
    /// Whether secrets and user key material are synced as child resources
    pub sync_secrets: bool,
}

pub(crate) const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_MAX_POLLS: usize = 20;

impl ClientConfig {
    /// Read the configuration from `SNOWFLAKE_*` environment variables
    pub fn from_env() -> SnowflakeResult<ClientConfig> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let parse = |name: &str| -> SnowflakeResult<Option<u64>> {
            var(name)
                .map(|v| {
                    v.parse()
                        .map_err(|_| SnowflakeError::Config(format!("{name} must be a number")))
                })
                .transpose()
        };
        let config = ClientConfig {
            account_url: var("SNOWFLAKE_ACCOUNT_URL").unwrap_or_default(),
            account_identifier: var("SNOWFLAKE_ACCOUNT").unwrap_or_default(),
            user_identifier: var("SNOWFLAKE_USER").unwrap_or_default(),
            public_key_fingerprint: var("SNOWFLAKE_PUBLIC_KEY_FINGERPRINT"),
            private_key: var("SNOWFLAKE_PRIVATE_KEY"),
            private_key_path: var("SNOWFLAKE_PRIVATE_KEY_PATH"),
            database: var("SNOWFLAKE_DATABASE"),
            warehouse: var("SNOWFLAKE_WAREHOUSE"),
            role: var("SNOWFLAKE_ROLE"),
            timeout_seconds: parse("SNOWFLAKE_TIMEOUT_SECONDS")?,
            poll_interval_ms: parse("SNOWFLAKE_POLL_INTERVAL_MS")?,
            max_polls: parse("SNOWFLAKE_MAX_POLLS")?.map(|n| n as usize),
            sync_secrets: var("SNOWFLAKE_SYNC_SECRETS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SnowflakeResult<()> {
        for (name, value) in [
            ("account_url", &self.account_url),
            ("account_identifier", &self.account_identifier),
            ("user_identifier", &self.user_identifier),
        ] {
            if value.trim().is_empty() {
                return Err(SnowflakeError::Config(format!("{name} is required")));
            }
        }
        match (&self.private_key, &self.private_key_path) {
            (None, None) => Err(SnowflakeError::Config(
                "private_key or private_key_path is required".into(),
            )),
            (Some(_), Some(_)) => Err(SnowflakeError::Config(
                "only one of private_key or private_key_path can be provided".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Load the private key and build the signing credential
    pub fn credential(&self) -> SnowflakeResult<Credential> {
        self.validate()?;
        let pem = match (&self.private_key, &self.private_key_path) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|err| {
                SnowflakeError::Config(format!("failed to read private key {path}: {err}"))
            })?,
            (None, None) => return Err(SnowflakeError::Config("no private key".into())),
        };
        Ok(Credential::new(
            &self.account_identifier,
            &self.user_identifier,
            PrivateKey::from_pem(&pem)?,
            self.public_key_fingerprint.as_deref(),
        ))
    }

    pub fn timeout(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn max_polls(&self) -> usize {
        self.max_polls.unwrap_or(DEFAULT_MAX_POLLS).max(1)
    }
}
