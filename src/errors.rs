use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum SnowflakeError {
    #[error(transparent)]
    Token(#[from] jwt_simple::Error),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    JSONError(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    /// HTTP 422: the warehouse refused to describe the object for the current role.
    ///
    /// Read paths treat this as "no data" rather than a failure.
    #[error("Snowflake cannot process this statement (422): {code}: {message}")]
    AuthorizationGap { code: String, message: String },
    #[error("Snowflake HTTP error {status}: {code}: {message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Insufficient privileges on {object}: {message}")]
    PermissionDenied { object: String, message: String },

    #[error("Column {0} not found in result set")]
    MissingColumn(String),
    #[error("Column {column} is not a {expected} (row type is '{actual}')")]
    ColumnType {
        column: String,
        expected: &'static str,
        actual: String,
    },
    #[error("Column {column} holds an invalid boolean: {value:?}")]
    InvalidBool { column: String, value: String },
    #[error("Column {column} holds an invalid timestamp: {value:?}")]
    InvalidTimestamp { column: String, value: String },
    #[error("Row has {actual} cells but the result set declares {expected} columns")]
    RowShape { expected: usize, actual: usize },

    #[error("Expected one {kind} named {name}, got {count}")]
    Ambiguous {
        kind: &'static str,
        name: String,
        count: usize,
    },
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("Statement response carries no handle for statement {0}")]
    MissingHandle(usize),
    #[error("Statement {0} did not finish after polling")]
    StillRunning(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    #[error("Unsupported key algorithm for signing: {0}")]
    UnsupportedKeyAlgorithm(&'static str),
    #[error("Invalid page token: {0}")]
    InvalidPageToken(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),
    #[error("Invalid resource id: {0}")]
    InvalidResourceId(String),
}

pub type SnowflakeResult<T> = Result<T, SnowflakeError>;

/// Snowflake's error code for "SQL access control error: Insufficient privileges"
pub const INSUFFICIENT_PRIVILEGES: &str = "003001";

impl SnowflakeError {
    /// Whether the warehouse answered 422 for this call
    pub fn is_authorization_gap(&self) -> bool {
        matches!(self, SnowflakeError::AuthorizationGap { .. })
    }

    /// Build the error for a non-2xx response from its status and drained body.
    ///
    /// The body is parsed best-effort for Snowflake's `{code, message}` pair.
    pub(crate) fn from_status(status: u16, body: &[u8]) -> SnowflakeError {
        let wire = serde_json::from_slice::<WireError>(body).unwrap_or_default();
        let message = match wire.message {
            Some(message) if !message.is_empty() => message,
            _ => String::from_utf8_lossy(body).trim().to_owned(),
        };
        let code = wire.code.unwrap_or_default();
        if status == 422 {
            SnowflakeError::AuthorizationGap { code, message }
        } else {
            SnowflakeError::Http {
                status,
                code,
                message,
            }
        }
    }

    /// Log an authorization gap at the level its warehouse code deserves.
    ///
    /// `expected` is the level used for the plain insufficient-privileges code;
    /// any other code is logged as an error. Other variants are ignored.
    pub(crate) fn log_gap(&self, expected: log::Level, context: &str) {
        if let SnowflakeError::AuthorizationGap { code, message } = self {
            if code == INSUFFICIENT_PRIVILEGES {
                log::log!(expected, "Insufficient privileges: {context}");
            } else {
                log::error!("{context}: {code}: {message}");
            }
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct WireError {
    code: Option<String>,
    message: Option<String>,
}
