use chrono::{DateTime, Utc};

use crate::decode::decode_rows;
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::identifiers::{escape_like_pattern, escape_literal, qualified, quote};
use crate::statement::{query, StatementApi};

/// Built-in metadata schema present in every database; it carries no grants worth syncing
pub const INFORMATION_SCHEMA: &str = "INFORMATION_SCHEMA";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    pub database_name: String,
}

crate::impl_record!(Schema {
    name: Text => "name",
    database_name: Text => "database_name",
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub created_on: Option<DateTime<Utc>>,
    pub name: String,
    pub schema_name: String,
    pub database_name: String,
    /// TABLE, VIEW, TRANSIENT, ...
    pub kind: String,
    pub comment: String,
    pub owner: String,
}

crate::impl_record!(Table {
    created_on: Timestamp => "created_on",
    name: Text => "name",
    schema_name: Text => "schema_name",
    database_name: Text => "database_name",
    kind: Text => "kind",
    comment: Text => "comment",
    owner: Text => "owner",
});

/// One row of `SHOW GRANTS ON TABLE|VIEW`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableGrant {
    pub created_on: Option<DateTime<Utc>>,
    pub privilege: String,
    pub granted_on: String,
    pub name: String,
    /// ROLE, USER, SHARE, ...
    pub granted_to: String,
    pub grantee_name: String,
    pub grant_option: String,
    pub granted_by: String,
}

crate::impl_record!(TableGrant {
    created_on: Timestamp => "created_on",
    privilege: Text => "privilege",
    granted_on: Text => "granted_on",
    name: Text => "name",
    granted_to: Text => "granted_to",
    grantee_name: Text => "grantee_name",
    grant_option: Text => "grant_option",
    granted_by: Text => "granted_by",
});

/// `SHOW SCHEMAS IN DATABASE "<db>"`
pub async fn list_schemas_in_database<A: StatementApi>(
    api: &A,
    database: &str,
) -> SnowflakeResult<Vec<Schema>> {
    let sql = format!("SHOW SCHEMAS IN DATABASE {};", quote(database));
    decode_rows(&query(api, sql).await?)
}

/// One page of tables in a schema, and the cursor of the next page.
///
/// The cursor is the last table name when the page came back full, `None`
/// otherwise. A 422 becomes [`SnowflakeError::PermissionDenied`].
pub async fn list_tables_in_schema<A: StatementApi>(
    api: &A,
    database: &str,
    schema: &str,
    cursor: Option<&str>,
    limit: usize,
) -> SnowflakeResult<(Vec<Table>, Option<String>)> {
    let scope = qualified(&[database, schema]);
    let sql = match cursor {
        Some(cursor) => format!(
            "SHOW TABLES IN SCHEMA {scope} LIMIT {limit} FROM '{}';",
            escape_literal(cursor)
        ),
        None => format!("SHOW TABLES IN SCHEMA {scope} LIMIT {limit};"),
    };
    let response = match query(api, sql).await {
        Ok(response) => response,
        Err(err) if err.is_authorization_gap() => {
            log::debug!("Insufficient privileges for SHOW TABLES IN SCHEMA {database}.{schema}");
            return Err(denied(&format!("{database}.{schema}"), err));
        }
        Err(err) => return Err(err),
    };
    let tables: Vec<Table> = decode_rows(&response)?;
    let next = if limit > 0 && tables.len() >= limit {
        tables.last().map(|table| table.name.clone())
    } else {
        None
    };
    Ok((tables, next))
}

/// Look up one table by exact (database, schema, name).
///
/// A 422 and no match are both `Ok(None)`.
pub async fn get_table<A: StatementApi>(
    api: &A,
    database: &str,
    schema: &str,
    name: &str,
) -> SnowflakeResult<Option<Table>> {
    let sql = format!(
        "SHOW TABLES LIKE '{}' ESCAPE '\\' IN SCHEMA {};",
        escape_like_pattern(name),
        qualified(&[database, schema])
    );
    let response = match query(api, sql).await {
        Ok(response) => response,
        Err(err) if err.is_authorization_gap() => return Ok(None),
        Err(err) => return Err(err),
    };
    let tables: Vec<Table> = decode_rows(&response)?;
    Ok(tables.into_iter().find(|table| {
        table.database_name == database && table.schema_name == schema && table.name == name
    }))
}

/// `SHOW GRANTS ON TABLE|VIEW "<db>"."<schema>"."<table>"`.
///
/// Views must be addressed as views, so `kind` picks the object type. A 422
/// becomes [`SnowflakeError::PermissionDenied`] so grant resolution can fall
/// back to the owner instead of reporting no access at all.
pub async fn list_table_grants<A: StatementApi>(
    api: &A,
    database: &str,
    schema: &str,
    table: &str,
    kind: &str,
) -> SnowflakeResult<Vec<TableGrant>> {
    let object_type = if kind.eq_ignore_ascii_case("VIEW") {
        "VIEW"
    } else {
        "TABLE"
    };
    let sql = format!(
        "SHOW GRANTS ON {object_type} {};",
        qualified(&[database, schema, table])
    );
    match query(api, sql).await {
        Ok(response) => decode_rows(&response),
        Err(err) if err.is_authorization_gap() => {
            let object = format!("{database}.{schema}.{table}");
            err.log_gap(log::Level::Debug, &format!("SHOW GRANTS, table = {object}"));
            Err(denied(&object, err))
        }
        Err(err) => Err(err),
    }
}

fn denied(object: &str, err: SnowflakeError) -> SnowflakeError {
    let message = match err {
        SnowflakeError::AuthorizationGap { message, .. } => message,
        other => other.to_string(),
    };
    SnowflakeError::PermissionDenied {
        object: object.to_owned(),
        message,
    }
}
