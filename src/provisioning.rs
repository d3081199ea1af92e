//! User lifecycle through the `/api/v2/users` REST endpoints.
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::identifiers::{quote, unquote};
use crate::listing::Connector;
use crate::resources::{ResourceId, ResourceType};
use crate::statement::StatementApi;
use crate::user::{get_user, User};
use crate::SnowflakeClient;

/// Header asking Snowflake to run the call under another role
pub const ROLE_HEADER: &str = "X-Snowflake-Role";
pub const USER_ADMIN_ROLE: &str = "USERADMIN";

const FETCH_RETRIES: u32 = 5;
const FETCH_BASE_DELAY: Duration = Duration::from_millis(500);

/// Body of `POST /api/v2/users`. Empty fields are left out.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Already quoted, so the user keeps its exact case
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub login_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub must_change_password: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_warehouse: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_role: String,
    /// ALL or NONE
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_secondary_roles: String,
}

impl CreateUserRequest {
    pub fn new(name: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: quote(name),
            ..CreateUserRequest::default()
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct CreateUserResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

fn users_url(account_url: &str) -> SnowflakeResult<Url> {
    Url::parse(&format!("{account_url}/api/v2/users"))
        .map_err(|err| SnowflakeError::Config(format!("account_url {account_url:?}: {err}")))
}

/// `<account>/api/v2/users/<quoted name>?ifExists=true`
fn user_url(account_url: &str, name: &str) -> SnowflakeResult<Url> {
    let mut url = users_url(account_url)?;
    url.path_segments_mut()
        .map_err(|_| SnowflakeError::Config(format!("account_url {account_url:?} cannot be a base")))?
        .push(&quote(name));
    url.query_pairs_mut().append_pair("ifExists", "true");
    Ok(url)
}

impl SnowflakeClient {
    /// `POST /api/v2/users`; `true` when the user exists on return, `false`
    /// when Snowflake only accepted the request
    pub async fn create_user(&self, request: &CreateUserRequest) -> SnowflakeResult<bool> {
        let builder = self
            .http
            .post(users_url(self.account_url())?)
            .header(ROLE_HEADER, USER_ADMIN_ROLE)
            .json(request);
        let (status, body) = self.send(builder).await?;
        let response: CreateUserResponse = serde_json::from_slice(&body).unwrap_or_default();
        let completed = status == StatusCode::OK;
        log::debug!(
            "User creation for {}: {} completed={completed} {} {}",
            request.name,
            status.as_u16(),
            response.status,
            response.message
        );
        Ok(completed)
    }

    /// `DELETE /api/v2/users/<name>?ifExists=true`
    pub async fn delete_user(&self, name: &str) -> SnowflakeResult<()> {
        let builder = self
            .http
            .delete(user_url(self.account_url(), name)?)
            .header(ROLE_HEADER, USER_ADMIN_ROLE);
        self.send(builder).await?;
        log::debug!("User {name} deleted");
        Ok(())
    }
}

/// Describe a user that was just created.
///
/// A new user can take a moment to become visible to SQL, during which
/// `DESCRIBE USER` answers 422. Only that is retried, up to five times with
/// the delay doubling from 500 ms. Dropping the future cancels the wait.
pub async fn fetch_user_with_retry<A: StatementApi>(api: &A, name: &str) -> SnowflakeResult<User> {
    let mut delay = FETCH_BASE_DELAY;
    let mut attempt = 0;
    loop {
        match get_user(api, name).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {
                return Err(SnowflakeError::NotFound {
                    kind: "user",
                    name: name.to_owned(),
                })
            }
            Err(err) if err.is_authorization_gap() && attempt < FETCH_RETRIES => {
                attempt += 1;
                log::debug!(
                    "User {name} not visible yet, retry {attempt}/{FETCH_RETRIES} in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

impl Connector<SnowflakeClient> {
    /// Create a user and return it as Snowflake describes it
    pub async fn create_account(&self, request: &CreateUserRequest) -> SnowflakeResult<User> {
        let name = unquote(&request.name);
        if name.is_empty() {
            return Err(SnowflakeError::Config("user name is required".into()));
        }
        if let Err(err) = self.api().create_user(request).await {
            log::error!("Failed to create user {name}: {err}");
            return Err(err);
        }
        let user = fetch_user_with_retry(self.api(), &name).await.map_err(|err| {
            log::error!("Failed to fetch user {name} after creation: {err}");
            err
        })?;
        log::debug!("User {} created", user.name);
        Ok(user)
    }

    /// Delete a user; deleting a user that is already gone succeeds
    pub async fn delete_account(&self, id: &ResourceId) -> SnowflakeResult<()> {
        if id.resource_type != ResourceType::User || id.resource.is_empty() {
            return Err(SnowflakeError::InvalidResourceId(id.to_string()));
        }
        self.api().delete_user(&id.resource).await.map_err(|err| {
            log::error!("Failed to delete user {}: {err}", id.resource);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{describe_user, FakeWarehouse};

    const DESCRIBE: &str = "DESCRIBE USER \"New.User\";";

    #[test]
    fn request_omits_empty_fields() -> SnowflakeResult<()> {
        let request = CreateUserRequest {
            email: "new@example.com".into(),
            must_change_password: true,
            ..CreateUserRequest::new("New.User")
        };
        let json = serde_json::to_value(&request)?;
        assert_eq!(
            json,
            serde_json::json!({
                "name": "\"New.User\"",
                "email": "new@example.com",
                "mustChangePassword": true
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn names_keep_their_own_quotes() -> SnowflakeResult<()> {
        let request = CreateUserRequest::new("\"edge\"");
        assert_eq!(request.name, "\"\"\"edge\"\"\"");
        let fake = FakeWarehouse::new().on(
            "DESCRIBE USER \"\"\"edge\"\"\";",
            describe_user("\"edge\"", &[]),
        );
        let user = fetch_user_with_retry(&fake, &unquote(&request.name)).await?;
        assert_eq!(user.name, "\"edge\"");
        Ok(())
    }

    #[test]
    fn delete_url_quotes_and_encodes_the_name() -> SnowflakeResult<()> {
        let url = user_url("https://acct.snowflakecomputing.com", "a b/c")?;
        assert_eq!(
            url.as_str(),
            "https://acct.snowflakecomputing.com/api/v2/users/%22a%20b%2Fc%22?ifExists=true"
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn retries_while_not_visible() -> SnowflakeResult<()> {
        let fake = FakeWarehouse::new()
            .on_gap(DESCRIBE)
            .on_gap(DESCRIBE)
            .on(DESCRIBE, describe_user("New.User", &[]));
        let started = tokio::time::Instant::now();
        let user = fetch_user_with_retry(&fake, "New.User").await?;
        assert_eq!(user.name, "New.User");
        assert_eq!(fake.submitted().len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(1_500));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_five_retries() {
        let fake = FakeWarehouse::new().on_gap(DESCRIBE);
        let started = tokio::time::Instant::now();
        let err = fetch_user_with_retry(&fake, "New.User").await.unwrap_err();
        assert!(err.is_authorization_gap());
        assert_eq!(fake.submitted().len(), 6);
        assert!(started.elapsed() >= Duration::from_millis(15_500));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let fake = FakeWarehouse::new().on_error(DESCRIBE, 403);
        assert!(fetch_user_with_retry(&fake, "New.User").await.is_err());
        assert_eq!(fake.submitted().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_by_timeout() {
        let fake = FakeWarehouse::new().on_gap(DESCRIBE);
        let result = tokio::time::timeout(
            Duration::from_millis(600),
            fetch_user_with_retry(&fake, "New.User"),
        )
        .await;
        assert!(result.is_err());
        assert!(fake.submitted().len() <= 2);
    }
}
