use chrono::{DateTime, Utc};

use crate::cells::display_timestamp;
use crate::decode::decode_rows;
use crate::errors::SnowflakeResult;
use crate::identifiers::quote;
use crate::statement::{query, StatementApi};

/// A secret object, as listed by `SHOW SECRETS IN DATABASE`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secret {
    pub created_on: Option<DateTime<Utc>>,
    pub name: String,
    pub schema_name: String,
    pub database_name: String,
    pub owner: String,
    pub comment: String,
    pub secret_type: String,
    pub oauth_scopes: String,
    pub owner_role_type: String,
}

crate::impl_record!(Secret {
    created_on: Timestamp => "created_on",
    name: Text => "name",
    schema_name: Text => "schema_name",
    database_name: Text => "database_name",
    owner: Text => "owner",
    comment: Text => "comment",
    secret_type: Text => "secret_type",
    oauth_scopes: Text => "oauth_scopes",
    owner_role_type: Text => "owner_role_type",
});

/// Secrets of one database.
///
/// A role that may not look inside the database gets an empty list; the gap
/// is logged.
pub async fn list_secrets<A: StatementApi>(
    api: &A,
    database: &str,
) -> SnowflakeResult<Vec<Secret>> {
    let sql = format!("SHOW SECRETS IN DATABASE {};", quote(database));
    match query(api, sql).await {
        Ok(response) => decode_rows(&response),
        Err(err) if err.is_authorization_gap() => {
            err.log_gap(log::Level::Warn, &format!("SHOW SECRETS, database = {database}"));
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

/// One row of `DESCRIBE USER`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDescriptionProperty {
    pub property: String,
    pub value: String,
    pub default: String,
    pub description: String,
}

crate::impl_record!(UserDescriptionProperty {
    property: Text => "property",
    value: Text => "value",
    default: Text => "default",
    description: Text => "description",
});

pub const RSA_PUBLIC_KEY_LAST_SET_TIME: &str = "RSA_PUBLIC_KEY_LAST_SET_TIME";
pub const RSA_PUBLIC_KEY_2_LAST_SET_TIME: &str = "RSA_PUBLIC_KEY_2_LAST_SET_TIME";

/// When each of a user's two key-pair slots was last set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserKeyMaterial {
    pub user: String,
    pub rsa_public_key_last_set: Option<DateTime<Utc>>,
    pub rsa_public_key_2_last_set: Option<DateTime<Utc>>,
}

impl UserKeyMaterial {
    fn from_properties(properties: &[UserDescriptionProperty]) -> SnowflakeResult<Self> {
        let find = |name: &str| {
            properties
                .iter()
                .find(|property| property.property == name)
                .map(|property| property.value.as_str())
                .unwrap_or_default()
        };
        Ok(UserKeyMaterial {
            user: find("NAME").to_owned(),
            rsa_public_key_last_set: display_timestamp(
                RSA_PUBLIC_KEY_LAST_SET_TIME,
                find(RSA_PUBLIC_KEY_LAST_SET_TIME),
            )?,
            rsa_public_key_2_last_set: display_timestamp(
                RSA_PUBLIC_KEY_2_LAST_SET_TIME,
                find(RSA_PUBLIC_KEY_2_LAST_SET_TIME),
            )?,
        })
    }

    /// The slots that hold a key, numbered 1 and 2
    pub fn slots(&self) -> impl Iterator<Item = (u8, DateTime<Utc>)> + '_ {
        [self.rsa_public_key_last_set, self.rsa_public_key_2_last_set]
            .into_iter()
            .zip(1u8..)
            .filter_map(|(set_at, slot)| set_at.map(|at| (slot, at)))
    }
}

/// Key-pair slot timestamps of one user, from `DESCRIBE USER`
pub async fn user_key_material<A: StatementApi>(
    api: &A,
    user: &str,
) -> SnowflakeResult<UserKeyMaterial> {
    let response = query(api, format!("DESCRIBE USER {};", quote(user))).await?;
    let properties: Vec<UserDescriptionProperty> = decode_rows(&response)?;
    UserKeyMaterial::from_properties(&properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SnowflakeError;
    use crate::testing::{describe_user, secret_rows, FakeWarehouse};

    #[tokio::test]
    async fn lists_secrets() -> SnowflakeResult<()> {
        let fake = FakeWarehouse::new().on(
            "SHOW SECRETS IN DATABASE \"Vault\";",
            secret_rows("Vault", &[("API_KEY", "SYSADMIN")]),
        );
        let secrets = list_secrets(&fake, "Vault").await?;
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].database_name, "Vault");
        assert_eq!(secrets[0].created_on.map(|at| at.timestamp()), Some(1_700_000_000));
        Ok(())
    }

    #[tokio::test]
    async fn secrets_gap_is_empty() -> SnowflakeResult<()> {
        let fake = FakeWarehouse::new().on_gap("SHOW SECRETS IN DATABASE \"LOCKED\";");
        assert!(list_secrets(&fake, "LOCKED").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn secrets_hard_error_propagates() {
        let fake = FakeWarehouse::new().on_error("SHOW SECRETS IN DATABASE \"X\";", 500);
        assert!(list_secrets(&fake, "X").await.is_err());
    }

    #[tokio::test]
    async fn key_material_reads_both_slots() -> SnowflakeResult<()> {
        let fake = FakeWarehouse::new().on(
            "DESCRIBE USER \"alice\";",
            describe_user(
                "alice",
                &[(RSA_PUBLIC_KEY_2_LAST_SET_TIME, "2024-03-04 05:06:07.890")],
            ),
        );
        let material = user_key_material(&fake, "alice").await?;
        assert_eq!(material.user, "alice");
        assert_eq!(material.rsa_public_key_last_set, None);
        let slots: Vec<u8> = material.slots().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![2]);
        assert_eq!(
            material.rsa_public_key_2_last_set.map(|at| at.timestamp_subsec_millis()),
            Some(890)
        );
        Ok(())
    }

    #[tokio::test]
    async fn key_material_rejects_garbage() {
        let fake = FakeWarehouse::new().on(
            "DESCRIBE USER \"bob\";",
            describe_user("bob", &[(RSA_PUBLIC_KEY_LAST_SET_TIME, "yesterday")]),
        );
        assert!(matches!(
            user_key_material(&fake, "bob").await,
            Err(SnowflakeError::InvalidTimestamp { .. })
        ));
    }
}
