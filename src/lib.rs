//! Identity-governance sync for Snowflake.
//!
//! This crate reads users, account roles, databases, tables and secrets from a
//! Snowflake account through the SQL statements REST API and turns them into a
//! generic resource / entitlement / grant model for a governance host.
//!
//! The `lib.rs` file contains the `SnowflakeClient`, the HTTP implementation of
//! [`StatementApi`]. Everything above the transport is generic over that trait:
//! the per-entity query functions in [`role`], [`database`], [`user`], [`table`]
//! and [`secret`], the paged listings in [`listing`] and the grant resolution
//! in [`grants`].
//!
//! Example usage:
//!
//! ```rust,no_run
//! use light_snowflake_governance::{ClientConfig, Connector, SnowflakeClient, SnowflakeError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SnowflakeError> {
//!     let config = ClientConfig::from_env()?;
//!     let connector = Connector::new(SnowflakeClient::new(&config)?);
//!
//!     // Walk every page of account roles
//!     let mut token = String::new();
//!     loop {
//!         let page = connector.list_roles(&token).await?;
//!         for role in &page.items {
//!             let grants = connector.role_grants(&role.name, "").await?;
//!             println!("{}: {} grantees on the first page", role.name, grants.items.len());
//!         }
//!         if page.next_token.is_empty() {
//!             break;
//!         }
//!         token = page.next_token;
//!     }
//!     Ok(())
//! }
//! ```
use std::time::Duration;

mod cells;
mod config;
pub mod database;
pub mod decode;
mod errors;
pub mod grants;
pub mod identifiers;
mod jwt;
pub mod listing;
pub mod pagination;
pub mod provisioning;
pub mod resources;
mod response;
pub mod role;
pub mod secret;
mod statement;
pub mod table;
#[cfg(test)]
mod testing;
pub mod user;

pub use cells::ColumnKind;
pub use config::ClientConfig;
pub use errors::{SnowflakeError, SnowflakeResult, INSUFFICIENT_PRIVILEGES};
pub use jwt::{Credential, PrivateKey};
pub use jwt_simple;
pub use listing::Connector;
pub use pagination::{Page, PageToken};
pub use response::{ResultSetMetadata, RowType, StatementResponse};
pub use statement::{execute, fetch, query, StatementApi};

/// Header naming the flavour of bearer token Snowflake should expect
pub const AUTH_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
pub const AUTH_TYPE_KEYPAIR_JWT: &str = "KEYPAIR_JWT";

/// HTTP client for one Snowflake account.
///
/// The bearer token is signed once, when the client is built, and baked into
/// the default headers; the client is immutable afterwards and cheap to clone.
#[derive(Debug, Clone)]
pub struct SnowflakeClient {
    http: reqwest::Client,
    account_url: String,
    database: Option<String>,
    warehouse: Option<String>,
    role: Option<String>,
    timeout_seconds: u64,
    poll_interval: Duration,
    max_polls: usize,
}

impl SnowflakeClient {
    pub fn new(config: &ClientConfig) -> SnowflakeResult<SnowflakeClient> {
        let credential = config.credential()?;
        let token = credential.issue_token()?;
        let http = Self::http_client(&token, config.timeout())?;
        Ok(SnowflakeClient {
            http,
            account_url: config.account_url.trim_end_matches('/').to_owned(),
            database: config.database.as_ref().map(|x| x.to_ascii_uppercase()),
            warehouse: config.warehouse.as_ref().map(|x| x.to_ascii_uppercase()),
            role: config.role.as_ref().map(|x| x.to_ascii_uppercase()),
            timeout_seconds: config.timeout(),
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls(),
        })
    }

    pub fn account_url(&self) -> &str {
        &self.account_url
    }

    fn http_client(token: &str, timeout_seconds: u64) -> SnowflakeResult<reqwest::Client> {
        use reqwest::header::*;

        let mut headers = HeaderMap::with_capacity(5);
        headers.append(CONTENT_TYPE, "application/json".parse()?);
        headers.append(AUTHORIZATION, format!("Bearer {}", token).parse()?);
        headers.append(AUTH_TYPE_HEADER, AUTH_TYPE_KEYPAIR_JWT.parse()?);
        headers.append(ACCEPT, "application/json".parse()?);
        headers.append(
            USER_AGENT,
            concat!(env!("CARGO_PKG_NAME"), '/', env!("CARGO_PKG_VERSION")).parse()?,
        );

        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_seconds + 15))
            .build()?)
    }
}
