use crate::decode::decode_rows;
use crate::errors::SnowflakeResult;
use crate::identifiers::{escape_like_pattern, escape_literal};
use crate::role::single;
use crate::statement::{query, StatementApi};

/// The owner Snowflake reports for objects it manages itself
pub const SYSTEM_OWNER: &str = "SNOWFLAKE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    pub owner: String,
    /// STANDARD, SHARED, APPLICATION, IMPORTED DATABASE, ...
    pub kind: String,
    /// Empty for normal databases, `<account>.<share>` for databases created from a share
    pub origin: String,
}

crate::impl_record!(Database {
    name: Text => "name",
    owner: Text => "owner",
    kind: Text => "kind",
    origin: Text => "origin",
});

impl Database {
    /// Whether the database is shared, imported, or owned by Snowflake.
    ///
    /// Snowflake answers 422 to `SHOW GRANTS` on objects in these databases.
    pub fn is_shared_or_system(&self) -> bool {
        if !self.origin.is_empty() {
            return true;
        }
        if self.owner.is_empty() || self.owner.eq_ignore_ascii_case(SYSTEM_OWNER) {
            return true;
        }
        matches!(
            self.kind.trim().to_ascii_uppercase().as_str(),
            "SHARED" | "APPLICATION" | "IMPORTED" | "IMPORTED DATABASE"
        )
    }
}

/// `SHOW DATABASES LIMIT n [FROM '<cursor>']`
pub async fn list_databases<A: StatementApi>(
    api: &A,
    cursor: Option<&str>,
    limit: usize,
) -> SnowflakeResult<Vec<Database>> {
    let sql = match cursor {
        Some(cursor) => format!("SHOW DATABASES LIMIT {limit} FROM '{}';", escape_literal(cursor)),
        None => format!("SHOW DATABASES LIMIT {limit};"),
    };
    decode_rows(&query(api, sql).await?)
}

/// Look up one database by its exact name; no match is `Ok(None)`, a 422 is returned as a gap
pub async fn get_database<A: StatementApi>(
    api: &A,
    name: &str,
) -> SnowflakeResult<Option<Database>> {
    let sql = format!("SHOW DATABASES LIKE '{}';", escape_like_pattern(name));
    let databases: Vec<Database> = decode_rows(&query(api, sql).await?)?;
    single(
        "database",
        name,
        databases.into_iter().filter(|database| database.name == name).collect(),
    )
}
