use crate::decode::decode_rows;
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::identifiers::{escape_like_pattern, escape_literal, quote};
use crate::statement::{execute, fetch, query, StatementApi};

/// An account role, as listed by `SHOW ROLES`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Role {
    pub name: String,
}

crate::impl_record!(Role {
    name: Text => "name",
});

/// One row of `SHOW GRANTS OF ROLE`: who holds the role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGrantee {
    pub role: String,
    pub granted_to: String,
    pub grantee_name: String,
}

crate::impl_record!(RoleGrantee {
    role: Text => "role",
    granted_to: Text => "granted_to",
    grantee_name: Text => "grantee_name",
});

/// `SHOW ROLES LIMIT n [FROM '<cursor>']`
pub async fn list_roles<A: StatementApi>(
    api: &A,
    cursor: Option<&str>,
    limit: usize,
) -> SnowflakeResult<Vec<Role>> {
    let sql = match cursor {
        Some(cursor) => format!("SHOW ROLES LIMIT {limit} FROM '{}';", escape_literal(cursor)),
        None => format!("SHOW ROLES LIMIT {limit};"),
    };
    decode_rows(&query(api, sql).await?)
}

/// Look up one role by its exact name.
///
/// `LIKE` ignores case, so rows naming a different role are dropped. No
/// match is `Ok(None)`. A 422 is returned as an authorization gap so the
/// caller can decide what a role it may not see means.
pub async fn get_role<A: StatementApi>(api: &A, name: &str) -> SnowflakeResult<Option<Role>> {
    let sql = format!("SHOW ROLES LIKE '{}';", escape_like_pattern(name));
    let roles: Vec<Role> = decode_rows(&query(api, sql).await?)?;
    single("role", name, roles.into_iter().filter(|role| role.name == name).collect())
}

/// One page of the principals holding a role.
///
/// `SHOW` output cannot be limited with an offset, so the listing is re-read
/// through `RESULT_SCAN` in the same batch and the second statement is polled.
pub async fn list_role_grantees<A: StatementApi>(
    api: &A,
    role: &str,
    offset: usize,
    limit: usize,
) -> SnowflakeResult<Vec<RoleGrantee>> {
    let statements = [
        format!("SHOW GRANTS OF ROLE {};", quote(role)),
        format!("SELECT * FROM table(RESULT_SCAN(LAST_QUERY_ID())) LIMIT {limit} OFFSET {offset};"),
    ];
    decode_rows(&fetch(api, &statements, 1).await?)
}

/// `GRANT ROLE "<role>" TO USER "<user>"`
pub async fn grant_role<A: StatementApi>(api: &A, role: &str, user: &str) -> SnowflakeResult<()> {
    execute(api, format!("GRANT ROLE {} TO USER {};", quote(role), quote(user))).await
}

/// `REVOKE ROLE "<role>" FROM USER "<user>"`
pub async fn revoke_role<A: StatementApi>(api: &A, role: &str, user: &str) -> SnowflakeResult<()> {
    execute(api, format!("REVOKE ROLE {} FROM USER {};", quote(role), quote(user))).await
}

/// Zero records is `None`, more than one is ambiguous
pub(crate) fn single<T>(
    kind: &'static str,
    name: &str,
    mut records: Vec<T>,
) -> SnowflakeResult<Option<T>> {
    match records.len() {
        0 => Ok(None),
        1 => Ok(records.pop()),
        count => Err(SnowflakeError::Ambiguous {
            kind,
            name: name.to_owned(),
            count,
        }),
    }
}
