//! In-memory warehouse and canned result sets for unit tests.
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::cells::ColumnKind;
use crate::errors::{SnowflakeError, SnowflakeResult, INSUFFICIENT_PRIVILEGES};
use crate::response::{ResultSetMetadata, RowType, StatementResponse, IN_PROGRESS_CODE};
use crate::statement::StatementApi;

const SUCCESS_CODE: &str = "090001";

pub fn row(cells: &[&str]) -> Vec<Option<String>> {
    cells.iter().map(|cell| Some(cell.to_string())).collect()
}

pub fn rows_response(columns: &[(&str, ColumnKind)], rows: &[&[&str]]) -> StatementResponse {
    let row_type: Vec<RowType> = columns
        .iter()
        .map(|(name, kind)| RowType::new(name, kind.clone()))
        .collect();
    StatementResponse {
        code: SUCCESS_CODE.into(),
        message: "Statement executed successfully.".into(),
        result_set_meta_data: Some(ResultSetMetadata { row_type }),
        data: rows.iter().map(|cells| row(cells)).collect(),
        ..StatementResponse::default()
    }
}

pub fn role_rows(names: &[&str]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = names
        .iter()
        .map(|name| vec!["1700000000.000000000", *name, "N", "SYSADMIN", ""])
        .collect();
    rows_response(
        &[
            ("created_on", ColumnKind::TimestampLtz),
            ("name", ColumnKind::Text),
            ("is_default", ColumnKind::Text),
            ("owner", ColumnKind::Text),
            ("comment", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

/// `(name, owner, kind, origin)`
pub fn database_rows(databases: &[(&str, &str, &str, &str)]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = databases
        .iter()
        .map(|(name, owner, kind, origin)| vec!["", *name, "N", *origin, *owner, "", *kind])
        .collect();
    rows_response(
        &[
            ("created_on", ColumnKind::TimestampLtz),
            ("name", ColumnKind::Text),
            ("is_default", ColumnKind::Text),
            ("origin", ColumnKind::Text),
            ("owner", ColumnKind::Text),
            ("comment", ColumnKind::Text),
            ("kind", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

pub fn schema_rows(database: &str, names: &[&str]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = names.iter().map(|name| vec!["", *name, database, "SYSADMIN"]).collect();
    rows_response(
        &[
            ("created_on", ColumnKind::TimestampLtz),
            ("name", ColumnKind::Text),
            ("database_name", ColumnKind::Text),
            ("owner", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

/// `(database, schema, name, kind, owner)`
pub fn table_rows(tables: &[(&str, &str, &str, &str, &str)]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = tables
        .iter()
        .map(|(database, schema, name, kind, owner)| {
            vec!["1700000000.000000000", *name, *database, *schema, *kind, "", *owner]
        })
        .collect();
    rows_response(
        &[
            ("created_on", ColumnKind::TimestampLtz),
            ("name", ColumnKind::Text),
            ("database_name", ColumnKind::Text),
            ("schema_name", ColumnKind::Text),
            ("kind", ColumnKind::Text),
            ("comment", ColumnKind::Text),
            ("owner", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

/// `(privilege, granted_to, grantee_name)`
pub fn table_grant_rows(grants: &[(&str, &str, &str)]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = grants
        .iter()
        .map(|(privilege, granted_to, grantee)| {
            vec!["", *privilege, "TABLE", "DB.S.T", *granted_to, *grantee, "false", "SYSADMIN"]
        })
        .collect();
    rows_response(
        &[
            ("created_on", ColumnKind::TimestampLtz),
            ("privilege", ColumnKind::Text),
            ("granted_on", ColumnKind::Text),
            ("name", ColumnKind::Text),
            ("granted_to", ColumnKind::Text),
            ("grantee_name", ColumnKind::Text),
            ("grant_option", ColumnKind::Text),
            ("granted_by", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

/// `(granted_to, grantee_name)` rows of `SHOW GRANTS OF ROLE <role>`
pub fn grantee_rows(role: &str, grantees: &[(&str, &str)]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = grantees
        .iter()
        .map(|(granted_to, grantee)| vec!["", role, *granted_to, *grantee, "SECURITYADMIN"])
        .collect();
    rows_response(
        &[
            ("created_on", ColumnKind::TimestampLtz),
            ("role", ColumnKind::Text),
            ("granted_to", ColumnKind::Text),
            ("grantee_name", ColumnKind::Text),
            ("granted_by", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

const USER_COLUMNS: [&str; 15] = [
    "name",
    "login_name",
    "display_name",
    "first_name",
    "last_name",
    "email",
    "disabled",
    "snowflake_lock",
    "default_role",
    "has_rsa_public_key",
    "has_password",
    "last_success_login",
    "type",
    "has_mfa",
    "comment",
];

/// `SHOW USERS` rows for plain enabled users named after their login
pub fn user_rows(names: &[&str]) -> StatementResponse {
    let columns: Vec<(&str, ColumnKind)> = USER_COLUMNS
        .iter()
        .map(|name| match *name {
            "last_success_login" => (*name, ColumnKind::TimestampLtz),
            _ => (*name, ColumnKind::Text),
        })
        .collect();
    let rows: Vec<Vec<&str>> = names
        .iter()
        .map(|name| {
            vec![
                *name, *name, "", "", "", "", "false", "false", "PUBLIC", "true", "false", "", "PERSON",
                "false", "",
            ]
        })
        .collect();
    rows_response(&columns, &as_slices(&rows))
}

/// `DESCRIBE USER` output: one `(property, value)` row per attribute
pub fn describe_rows(properties: &[(&str, &str)]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = properties
        .iter()
        .map(|(property, value)| vec![*property, *value, "null", ""])
        .collect();
    rows_response(
        &[
            ("property", ColumnKind::Text),
            ("value", ColumnKind::Text),
            ("default", ColumnKind::Text),
            ("description", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

/// A full `DESCRIBE USER` for `name`, with `overrides` replacing the defaults
pub fn describe_user(name: &str, overrides: &[(&str, &str)]) -> StatementResponse {
    let mut properties: Vec<(String, String)> = vec![
        ("NAME".into(), name.into()),
        ("LOGIN_NAME".into(), name.into()),
        ("DISPLAY_NAME".into(), "null".into()),
        ("FIRST_NAME".into(), "null".into()),
        ("LAST_NAME".into(), "null".into()),
        ("EMAIL".into(), "null".into()),
        ("DISABLED".into(), "false".into()),
        ("SNOWFLAKE_LOCK".into(), "false".into()),
        ("DEFAULT_ROLE".into(), "PUBLIC".into()),
        ("LAST_SUCCESS_LOGIN".into(), "null".into()),
        ("TYPE".into(), "PERSON".into()),
        ("HAS_MFA".into(), "false".into()),
        ("COMMENT".into(), "null".into()),
        ("RSA_PUBLIC_KEY_LAST_SET_TIME".into(), "null".into()),
        ("RSA_PUBLIC_KEY_2_LAST_SET_TIME".into(), "null".into()),
    ];
    for (key, value) in overrides {
        match properties.iter_mut().find(|(property, _)| property.as_str() == *key) {
            Some(entry) => entry.1 = value.to_string(),
            None => properties.push((key.to_string(), value.to_string())),
        }
    }
    let borrowed: Vec<(&str, &str)> = properties
        .iter()
        .map(|(property, value)| (property.as_str(), value.as_str()))
        .collect();
    describe_rows(&borrowed)
}

/// `(name, owner)` rows of `SHOW SECRETS IN DATABASE <database>`
pub fn secret_rows(database: &str, secrets: &[(&str, &str)]) -> StatementResponse {
    let rows: Vec<Vec<&str>> = secrets
        .iter()
        .map(|(name, owner)| {
            vec!["1700000000.000000000", *name, "PUBLIC", database, *owner, "", "PASSWORD", "", "ROLE"]
        })
        .collect();
    rows_response(
        &[
            ("created_on", ColumnKind::TimestampLtz),
            ("name", ColumnKind::Text),
            ("schema_name", ColumnKind::Text),
            ("database_name", ColumnKind::Text),
            ("owner", ColumnKind::Text),
            ("comment", ColumnKind::Text),
            ("secret_type", ColumnKind::Text),
            ("oauth_scopes", ColumnKind::Text),
            ("owner_role_type", ColumnKind::Text),
        ],
        &as_slices(&rows),
    )
}

fn as_slices<'a>(rows: &'a [Vec<&'a str>]) -> Vec<&'a [&'a str]> {
    rows.iter().map(Vec::as_slice).collect()
}

#[derive(Clone)]
enum Outcome {
    Rows(StatementResponse),
    Status { status: u16, code: String },
}

impl Outcome {
    fn into_result(self) -> SnowflakeResult<StatementResponse> {
        match self {
            Outcome::Rows(response) => Ok(response),
            Outcome::Status { status, code } => {
                let body = serde_json::json!({ "code": code, "message": "canned failure" });
                Err(SnowflakeError::from_status(status, body.to_string().as_bytes()))
            }
        }
    }
}

#[derive(Default)]
struct State {
    canned: HashMap<String, VecDeque<Outcome>>,
    submitted: Vec<String>,
    results: HashMap<usize, Outcome>,
    running: HashMap<usize, usize>,
    polled: Vec<String>,
}

/// A warehouse that answers canned results keyed by the submitted SQL text.
///
/// Multi-statement batches are keyed by their concatenated text. Each submit
/// `n` hands out handles `h{n}-{i}`; polling any of them returns the batch's
/// canned result. When several results are queued for the same SQL they are
/// served in order and the last one repeats.
pub struct FakeWarehouse {
    inline: bool,
    running_for: usize,
    state: Mutex<State>,
}

impl FakeWarehouse {
    /// Every submit answers "in progress" and the rows arrive on poll
    pub fn new() -> FakeWarehouse {
        FakeWarehouse {
            inline: false,
            running_for: 0,
            state: Mutex::new(State::default()),
        }
    }

    /// Single-statement submits answer with their rows
    pub fn inline() -> FakeWarehouse {
        FakeWarehouse {
            inline: true,
            ..FakeWarehouse::new()
        }
    }

    /// Polls answer "still running" this many times before the result
    pub fn running_for(mut self, polls: usize) -> FakeWarehouse {
        self.running_for = polls;
        self
    }

    pub fn on(self, sql: &str, response: StatementResponse) -> FakeWarehouse {
        self.push(sql, Outcome::Rows(response))
    }

    /// Answer with a 422 insufficient-privileges error
    pub fn on_gap(self, sql: &str) -> FakeWarehouse {
        self.push(
            sql,
            Outcome::Status {
                status: 422,
                code: INSUFFICIENT_PRIVILEGES.into(),
            },
        )
    }

    pub fn on_error(self, sql: &str, status: u16) -> FakeWarehouse {
        self.push(
            sql,
            Outcome::Status {
                status,
                code: "000000".into(),
            },
        )
    }

    fn push(self, sql: &str, outcome: Outcome) -> FakeWarehouse {
        self.state
            .lock()
            .unwrap()
            .canned
            .entry(sql.to_owned())
            .or_default()
            .push_back(outcome);
        self
    }

    /// Every submitted batch, as concatenated SQL
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn was_submitted(&self, sql: &str) -> bool {
        self.submitted().iter().any(|submitted| submitted == sql)
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polled.len()
    }

    pub fn polled_handles(&self) -> Vec<String> {
        self.state.lock().unwrap().polled.clone()
    }

    fn answer_submit(&self, statements: &[String]) -> SnowflakeResult<StatementResponse> {
        let sql = statements.concat();
        let mut state = self.state.lock().unwrap();
        state.submitted.push(sql.clone());
        let submit = state.submitted.len();

        let outcome = match state.canned.get_mut(&sql) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let Some(outcome) = outcome else {
            return Err(SnowflakeError::Http {
                status: 404,
                code: String::new(),
                message: format!("no canned result for {sql}"),
            });
        };
        let response = match outcome {
            Outcome::Rows(response) => response,
            failure => return failure.into_result(),
        };

        let handles: Vec<String> = (0..statements.len())
            .map(|index| format!("h{submit}-{index}"))
            .collect();
        state.results.insert(submit, Outcome::Rows(response.clone()));
        state.running.insert(submit, self.running_for);

        if statements.len() == 1 {
            if self.inline {
                return Ok(StatementResponse {
                    statement_handle: handles.first().cloned(),
                    ..response
                });
            }
            return Ok(StatementResponse {
                code: IN_PROGRESS_CODE.into(),
                message: "Asynchronous execution in progress.".into(),
                statement_handle: handles.first().cloned(),
                in_progress: true,
                ..StatementResponse::default()
            });
        }
        Ok(StatementResponse {
            code: SUCCESS_CODE.into(),
            message: "Multiple statements executed successfully.".into(),
            statement_handle: Some(format!("h{submit}")),
            statement_handles: handles,
            ..StatementResponse::default()
        })
    }

    fn answer_poll(&self, handle: &str) -> SnowflakeResult<StatementResponse> {
        let mut state = self.state.lock().unwrap();
        state.polled.push(handle.to_owned());
        let submit = handle
            .trim_start_matches('h')
            .split('-')
            .next()
            .and_then(|n| n.parse::<usize>().ok());
        let Some(outcome) = submit.and_then(|n| state.results.get(&n).cloned()) else {
            return Err(SnowflakeError::Http {
                status: 404,
                code: String::new(),
                message: format!("unknown handle {handle}"),
            });
        };
        if let Some(left) = submit.and_then(|n| state.running.get_mut(&n)) {
            if *left > 0 {
                *left -= 1;
                return Ok(StatementResponse {
                    code: IN_PROGRESS_CODE.into(),
                    statement_handle: Some(handle.to_owned()),
                    in_progress: true,
                    ..StatementResponse::default()
                });
            }
        }
        outcome.into_result()
    }
}

impl StatementApi for FakeWarehouse {
    async fn submit(&self, statements: &[String]) -> SnowflakeResult<StatementResponse> {
        self.answer_submit(statements)
    }

    async fn poll(&self, handle: &str) -> SnowflakeResult<StatementResponse> {
        self.answer_poll(handle)
    }
}
