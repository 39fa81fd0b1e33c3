// src/db/diagnostic.rs
// DOCUMENTATION: Single-shot connectivity check
// PURPOSE: Run SELECT 1 + 1 through the pool and turn any failure into a hint

use crate::db::pool::ConnectionPool;
use crate::errors::{DbError, ErrorClass};
use sqlx::Row;
use std::fmt;

const CHECK_SQL: &str = "SELECT 1 + 1 AS solution";

/// Outcome of a connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticResult {
    /// Query succeeded; carries the computed value (2 on a sane server)
    Success(i64),
    /// Query failed
    Failure {
        code: String,
        class: ErrorClass,
        hint: &'static str,
        message: String,
    },
}

impl DiagnosticResult {
    /// Process exit status for the diagnostic binary
    pub fn exit_code(&self) -> i32 {
        match self {
            DiagnosticResult::Success(_) => 0,
            DiagnosticResult::Failure { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DiagnosticResult::Success(_))
    }
}

impl From<DbError> for DiagnosticResult {
    fn from(err: DbError) -> Self {
        DiagnosticResult::Failure {
            code: err.code(),
            class: err.class(),
            hint: err.hint(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for DiagnosticResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticResult::Success(value) => {
                write!(f, "Database connection OK (1 + 1 = {})", value)
            }
            DiagnosticResult::Failure {
                code,
                hint,
                message,
                ..
            } => write!(f, "Database connection failed [{}]: {}\nHint: {}", code, message, hint),
        }
    }
}

/// Query the database once; no retry
pub async fn check_connection(pool: &ConnectionPool) -> DiagnosticResult {
    log::debug!("Checking {} with {:?}", pool.config().address(), CHECK_SQL);

    match run_check(pool).await {
        Ok(value) => DiagnosticResult::Success(value),
        Err(err) => err.into(),
    }
}

async fn run_check(pool: &ConnectionPool) -> Result<i64, DbError> {
    let rows = pool.query(CHECK_SQL, &[]).await?;

    let row = rows.first().ok_or_else(|| DbError::Query {
        number: None,
        message: "check query returned no rows".to_string(),
    })?;

    Ok(row.try_get::<i64, _>("solution")?)
}
