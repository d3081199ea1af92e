//! Turn untyped result rows into records.
//!
//! Each record type declares a static table of (field, column, setter) entries
//! with [`impl_record!`]; [`decode_row`] interprets that table against a result
//! set's column metadata. Columns are looked up by name, so column order and
//! extra columns in the result set do not matter, but a declared column that is
//! missing is an error unless the record lists it as optional.
use chrono::{DateTime, Utc};

use crate::cells;
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::response::{find_column, RowType, StatementResponse};

/// How a column's string is coerced and stored into the record
pub enum Setter<T> {
    Text(fn(&mut T, String)),
    Bool(fn(&mut T, bool)),
    Timestamp(fn(&mut T, Option<DateTime<Utc>>)),
}

/// One entry of a record's field-to-column dictionary
pub struct Column<T> {
    pub field: &'static str,
    pub column: &'static str,
    pub setter: Setter<T>,
}

/// A record that can be decoded from a result row
pub trait Record: Default + 'static {
    /// The field-to-column dictionary, in field declaration order
    fn columns() -> &'static [Column<Self>];

    /// Columns that only some of the statements sharing this record emit
    fn optional_columns() -> &'static [&'static str] {
        &[]
    }
}

/// Declare the field-to-column dictionary of a record type.
///
/// ```ignore
/// impl_record!(Role { name: Text => "name" });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ident { $($field:ident : $kind:ident => $column:literal),* $(,)? }) => {
        $crate::impl_record!($ty { $($field: $kind => $column),* } optional []);
    };
    ($ty:ident { $($field:ident : $kind:ident => $column:literal),* $(,)? } optional [$($optional:literal),* $(,)?]) => {
        impl $crate::decode::Record for $ty {
            fn columns() -> &'static [$crate::decode::Column<$ty>] {
                static COLUMNS: &[$crate::decode::Column<$ty>] = &[
                    $($crate::decode::Column {
                        field: stringify!($field),
                        column: $column,
                        setter: $crate::decode::Setter::$kind(|record: &mut $ty, value| record.$field = value),
                    }),*
                ];
                COLUMNS
            }

            fn optional_columns() -> &'static [&'static str] {
                &[$($optional),*]
            }
        }
    };
}

/// Decode one row against the result set's column metadata
pub fn decode_row<T: Record>(columns: &[RowType], row: &[Option<String>]) -> SnowflakeResult<T> {
    if row.len() < columns.len() {
        return Err(SnowflakeError::RowShape {
            expected: columns.len(),
            actual: row.len(),
        });
    }
    let mut record = T::default();
    for entry in T::columns() {
        let Some((index, row_type)) = find_column(columns, entry.column) else {
            if T::optional_columns().contains(&entry.column) {
                continue;
            }
            return Err(SnowflakeError::MissingColumn(entry.column.to_owned()));
        };
        let value = row[index].as_deref().unwrap_or_default();
        let kind = &row_type.data_type;
        match entry.setter {
            Setter::Text(set) => set(&mut record, cells::text(entry.column, kind, value)?),
            Setter::Bool(set) => set(&mut record, cells::boolean(entry.column, kind, value)?),
            Setter::Timestamp(set) => {
                set(&mut record, cells::timestamp_ltz(entry.column, kind, value)?)
            }
        }
    }
    Ok(record)
}

/// Decode every row of a response
pub fn decode_rows<T: Record>(response: &StatementResponse) -> SnowflakeResult<Vec<T>> {
    let columns = response.columns();
    response
        .data
        .iter()
        .map(|row| decode_row(columns, row))
        .collect()
}

/// Decode a property/value table (one row per attribute) into a single record.
///
/// `DESCRIBE` prints attribute names upper-cased, so they are matched
/// case-insensitively against the record's column names. Values are rendered
/// for display: `null` means absent and timestamps are formatted dates.
pub fn decode_properties<T: Record>(response: &StatementResponse) -> SnowflakeResult<T> {
    let columns = response.columns();
    let property = property_column(columns, "property")?;
    let value = property_column(columns, "value")?;

    let lookup = |name: &str| {
        response.data.iter().find_map(|row| {
            let key = row.get(property)?.as_deref()?;
            if key.eq_ignore_ascii_case(name) {
                Some(row.get(value).cloned().flatten().unwrap_or_default())
            } else {
                None
            }
        })
    };

    let mut record = T::default();
    for entry in T::columns() {
        let Some(raw) = lookup(entry.column) else {
            if T::optional_columns().contains(&entry.column) {
                continue;
            }
            return Err(SnowflakeError::MissingColumn(entry.column.to_ascii_uppercase()));
        };
        let raw = if raw == "null" { String::new() } else { raw };
        match entry.setter {
            Setter::Text(set) => set(&mut record, raw),
            Setter::Bool(set) => set(&mut record, cells::parse_bool(entry.column, &raw)?),
            Setter::Timestamp(set) => set(
                &mut record,
                cells::display_timestamp(&entry.column.to_ascii_uppercase(), &raw)?,
            ),
        }
    }
    Ok(record)
}

fn property_column(columns: &[RowType], name: &str) -> SnowflakeResult<usize> {
    find_column(columns, name)
        .map(|(index, _)| index)
        .ok_or_else(|| SnowflakeError::MissingColumn(name.to_owned()))
}
