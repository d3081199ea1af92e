use serde::Deserialize;

use crate::cells::ColumnKind;

/// Rows as Snowflake returns them: every cell a string, `None` for SQL NULL
pub type StringTable = Vec<Vec<Option<String>>>;

/// Snowflake's code for "statement accepted, still executing"
pub const IN_PROGRESS_CODE: &str = "333334";

/// The body of a submit or poll response from `/api/v2/statements`.
///
/// A single-statement submit that finished within the server timeout already
/// carries its rows; a multi-statement submit only carries one handle per statement.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub statement_handle: Option<String>,
    #[serde(default)]
    pub statement_handles: Vec<String>,
    #[serde(rename = "resultSetMetaData", alias = "resultSetMetadata", default)]
    pub result_set_meta_data: Option<ResultSetMetadata>,
    #[serde(default)]
    pub data: StringTable,
    /// Set from the HTTP status (202) rather than the body
    #[serde(skip)]
    pub in_progress: bool,
}

impl StatementResponse {
    /// Column metadata, empty when the response carries no result set
    pub fn columns(&self) -> &[RowType] {
        self.result_set_meta_data
            .as_ref()
            .map(|meta| meta.row_type.as_slice())
            .unwrap_or_default()
    }

    /// Whether this response already holds the result set, so no poll is needed
    pub fn has_inline_rows(&self) -> bool {
        !self.in_progress && self.code != IN_PROGRESS_CODE && !self.columns().is_empty()
    }

    /// The handle to poll for statement `index` of the submitted batch.
    ///
    /// A single-statement response only carries `statementHandle`.
    pub fn handle_for(&self, index: usize) -> Option<&str> {
        if self.statement_handles.is_empty() && index == 0 {
            return self.statement_handle.as_deref();
        }
        self.statement_handles.get(index).map(String::as_str)
    }

    pub fn num_rows(&self) -> usize {
        self.data.len()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub row_type: Vec<RowType>,
}

/// Name and declared type of one result column
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: ColumnKind,
}

impl RowType {
    pub fn new(name: &str, data_type: ColumnKind) -> RowType {
        RowType {
            name: name.to_owned(),
            data_type,
        }
    }
}

/// Find a column's position and declared type by name
pub fn find_column<'a>(columns: &'a [RowType], name: &str) -> Option<(usize, &'a RowType)> {
    columns.iter().enumerate().find(|(_, column)| column.name == name)
}
