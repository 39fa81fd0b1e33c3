// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Classify database failures into actionable hints and map handler
// failures to JSON responses

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use sqlx::mysql::MySqlDatabaseError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// MySQL server error numbers we classify
const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
const ER_ACCESS_DENIED_ERROR: u16 = 1045;
const ER_BAD_DB_ERROR: u16 = 1049;

/// Coarse failure taxonomy used for hints and exit reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Database host unreachable or connection broken
    Connection,
    /// Credentials rejected
    Access,
    /// Named database missing or misconfigured
    Schema,
    /// Pool admission refused (saturated, queue full, closed)
    Pool,
    /// Anything else
    Other,
}

/// Database-layer errors
/// DOCUMENTATION: Every variant carries the raw driver message plus a
/// stable code and hint so administrative output can show both.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error ({code}): {message}")]
    Connection { code: &'static str, message: String },

    #[error("Access denied ({code}): {message}")]
    Access { code: &'static str, message: String },

    #[error("Unknown database: {message}")]
    BadDatabase { message: String },

    #[error("Connection pool saturated ({limit} connections checked out)")]
    PoolSaturated { limit: u32 },

    #[error("Connection pool queue is full ({limit} callers already waiting)")]
    QueueFull { limit: usize },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Failed to build connection pool: {0}")]
    PoolBuild(String),

    #[error("Failed to read schema document {}: {source}", .path.display())]
    SchemaSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Database error: {message}")]
    Query { number: Option<u16>, message: String },
}

impl DbError {
    /// Classify a MySQL server error by its error number
    pub fn from_server_error(number: u16, message: String) -> Self {
        match number {
            ER_ACCESS_DENIED_ERROR => DbError::Access {
                code: "ER_ACCESS_DENIED_ERROR",
                message,
            },
            ER_DBACCESS_DENIED_ERROR => DbError::Access {
                code: "ER_DBACCESS_DENIED_ERROR",
                message,
            },
            ER_BAD_DB_ERROR => DbError::BadDatabase { message },
            _ => DbError::Query {
                number: Some(number),
                message,
            },
        }
    }

    /// Classify a socket-level failure
    pub fn from_io(err: &io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
            io::ErrorKind::TimedOut => "ETIMEDOUT",
            io::ErrorKind::ConnectionReset => "ECONNRESET",
            io::ErrorKind::ConnectionAborted => "ECONNABORTED",
            io::ErrorKind::BrokenPipe => "EPIPE",
            io::ErrorKind::UnexpectedEof => "PROTOCOL_CONNECTION_LOST",
            _ => "ECONNECTION",
        };

        DbError::Connection {
            code,
            message: err.to_string(),
        }
    }

    /// Connect attempt exceeded the configured timeout
    pub fn connect_timeout(address: &str) -> Self {
        DbError::Connection {
            code: "ETIMEDOUT",
            message: format!("timed out connecting to {}", address),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DbError::Connection { .. } => ErrorClass::Connection,
            DbError::Access { .. } => ErrorClass::Access,
            DbError::BadDatabase { .. } => ErrorClass::Schema,
            DbError::PoolSaturated { .. }
            | DbError::QueueFull { .. }
            | DbError::PoolClosed
            | DbError::PoolBuild(_) => ErrorClass::Pool,
            DbError::SchemaSource { .. } | DbError::Query { .. } => ErrorClass::Other,
        }
    }

    /// Stable error code, MySQL-style where one exists
    pub fn code(&self) -> String {
        match self {
            DbError::Connection { code, .. } | DbError::Access { code, .. } => code.to_string(),
            DbError::BadDatabase { .. } => "ER_BAD_DB_ERROR".to_string(),
            DbError::PoolSaturated { .. } => "POOL_SATURATED".to_string(),
            DbError::QueueFull { .. } => "POOL_ENQUEUELIMIT".to_string(),
            DbError::PoolClosed => "POOL_CLOSED".to_string(),
            DbError::PoolBuild(_) => "POOL_CONFIG".to_string(),
            DbError::SchemaSource { .. } => "SCHEMA_UNREADABLE".to_string(),
            DbError::Query {
                number: Some(n), ..
            } => format!("ER_{}", n),
            DbError::Query { number: None, .. } => "QUERY_FAILED".to_string(),
        }
    }

    /// Short actionable hint for humans
    pub fn hint(&self) -> &'static str {
        match self {
            DbError::Connection {
                code: "ECONNREFUSED",
                ..
            } => "Connection refused: check that the MySQL server is running and that DB_HOST/DB_PORT point at it.",
            DbError::Connection { .. } => {
                "Could not reach the MySQL server: check DB_HOST/DB_PORT and network access."
            }
            DbError::Access { .. } => "Access denied: verify DB_USER and DB_PASSWORD.",
            DbError::BadDatabase { .. } => {
                "Unknown database: verify DB_NAME, or run init_db to create it."
            }
            DbError::PoolSaturated { .. } => {
                "All pooled connections are busy: raise DB_CONNECTION_LIMIT or enable DB_WAIT_FOR_CONNECTIONS."
            }
            DbError::QueueFull { .. } => {
                "Too many callers waiting for a connection: raise DB_QUEUE_LIMIT (0 = unbounded)."
            }
            DbError::PoolClosed => "The connection pool was closed before the query ran.",
            DbError::PoolBuild(_) => "Check DB_CONNECTION_LIMIT and the pool settings.",
            DbError::SchemaSource { .. } => {
                "Check that SCHEMA_PATH points at a readable SQL file."
            }
            DbError::Query { .. } => "Check the SQL statement and the server log for details.",
        }
    }

    /// Whether the connection that produced this error should be dropped
    pub fn is_connection_fault(&self) -> bool {
        self.class() == ErrorClass::Connection
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(ref io_err) => DbError::from_io(io_err),
            sqlx::Error::Database(db_err) => match db_err.try_downcast_ref::<MySqlDatabaseError>() {
                Some(mysql_err) => {
                    DbError::from_server_error(mysql_err.number(), mysql_err.message().to_string())
                }
                None => DbError::Query {
                    number: None,
                    message: db_err.message().to_string(),
                },
            },
            sqlx::Error::Tls(e) => DbError::Connection {
                code: "ETLS",
                message: e.to_string(),
            },
            sqlx::Error::Protocol(message) => DbError::Connection {
                code: "PROTOCOL_ERROR",
                message,
            },
            sqlx::Error::PoolTimedOut => DbError::Connection {
                code: "ETIMEDOUT",
                message: "timed out waiting for a connection".to_string(),
            },
            sqlx::Error::PoolClosed => DbError::PoolClosed,
            other => DbError::Query {
                number: None,
                message: other.to_string(),
            },
        }
    }
}

/// HTTP handler errors
/// DOCUMENTATION: Converted into `{ "error": <message> }` responses so a
/// failing request never takes the server down
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Internal(String),

    #[error("Not found")]
    NotFound,
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}
