use chrono::{DateTime, Utc};

use crate::decode::{decode_properties, decode_rows};
use crate::errors::SnowflakeResult;
use crate::identifiers::{escape_literal, quote};
use crate::statement::{query, StatementApi};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub login_name: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub disabled: bool,
    pub locked: bool,
    pub default_role: String,
    pub has_rsa_public_key: bool,
    pub has_password: bool,
    pub last_success_login: Option<DateTime<Utc>>,
    /// PERSON, SERVICE, LEGACY_SERVICE, or empty
    pub kind: String,
    pub has_mfa: bool,
    pub comment: String,
}

// `DESCRIBE USER` does not print the two `has_*` columns
crate::impl_record!(User {
    name: Text => "name",
    login_name: Text => "login_name",
    display_name: Text => "display_name",
    first_name: Text => "first_name",
    last_name: Text => "last_name",
    email: Text => "email",
    disabled: Bool => "disabled",
    locked: Bool => "snowflake_lock",
    default_role: Text => "default_role",
    has_rsa_public_key: Bool => "has_rsa_public_key",
    has_password: Bool => "has_password",
    last_success_login: Timestamp => "last_success_login",
    kind: Text => "type",
    has_mfa: Bool => "has_mfa",
    comment: Text => "comment",
} optional ["has_rsa_public_key", "has_password"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Human,
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Enabled,
    Disabled,
}

impl User {
    pub fn account_type(&self) -> AccountType {
        match self.kind.as_str() {
            "SERVICE" | "LEGACY_SERVICE" => AccountType::Service,
            _ => AccountType::Human,
        }
    }

    /// Disabled and locked users both count as disabled
    pub fn status(&self) -> UserStatus {
        if self.disabled || self.locked {
            UserStatus::Disabled
        } else {
            UserStatus::Enabled
        }
    }

    /// Why the user is disabled, empty when enabled
    pub fn detailed_status(&self) -> &'static str {
        if self.disabled {
            "disabled"
        } else if self.locked {
            "locked"
        } else {
            ""
        }
    }

    /// Display name, else "first last", else the login name
    pub fn display(&self) -> String {
        if !self.display_name.is_empty() {
            return self.display_name.clone();
        }
        let full = format!("{} {}", self.first_name, self.last_name);
        if full == " " {
            self.login_name.clone()
        } else {
            full
        }
    }
}

/// `SHOW USERS LIMIT n [FROM '<cursor>']`
pub async fn list_users<A: StatementApi>(
    api: &A,
    cursor: Option<&str>,
    limit: usize,
) -> SnowflakeResult<Vec<User>> {
    let sql = match cursor {
        Some(cursor) => format!("SHOW USERS LIMIT {limit} FROM '{}';", escape_literal(cursor)),
        None => format!("SHOW USERS LIMIT {limit};"),
    };
    decode_rows(&query(api, sql).await?)
}

/// `DESCRIBE USER "<name>"`, pivoted from one row per property into one user.
///
/// Snowflake answers an unknown user with an error rather than zero rows, so
/// an empty description is `Ok(None)` and anything else is the caller's to judge.
pub async fn get_user<A: StatementApi>(api: &A, name: &str) -> SnowflakeResult<Option<User>> {
    let response = query(api, format!("DESCRIBE USER {};", quote(name))).await?;
    if response.data.is_empty() {
        return Ok(None);
    }
    decode_properties(&response).map(Some)
}
