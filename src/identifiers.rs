//! Escaping for names interpolated into generated SQL.
//!
//! Unquoted Snowflake identifiers are upper-cased by the warehouse, so every
//! name read back from a `SHOW` command is re-quoted to keep its exact case.

/// Double embedded double quotes, for use inside `"..."`
pub fn escape_identifier(name: &str) -> String {
    name.replace('"', "\"\"")
}

/// Wrap a name in double quotes: `o"brien` becomes `"o""brien"`
pub fn quote(name: &str) -> String {
    format!("\"{}\"", escape_identifier(name))
}

/// Undo [`quote`]: `"o""brien"` becomes `o"brien`; anything not wrapped in
/// double quotes is returned unchanged
pub fn unquote(quoted: &str) -> String {
    match quoted
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => quoted.to_owned(),
    }
}

/// Double embedded single quotes, for use inside `'...'`
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Escape a value for an exact-match `LIKE '...'` pattern with `\` as escape character
pub fn escape_like_pattern(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "''")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// `"db"."schema"."table"`
pub fn qualified(parts: &[&str]) -> String {
    parts.iter().map(|part| quote(part)).collect::<Vec<_>>().join(".")
}
