// src/db/bootstrap.rs
// DOCUMENTATION: One-shot database bootstrap
// PURPOSE: Create the database and its tables if absent, on a dedicated
// connection that never touches the shared pool

use crate::config::PoolConfig;
use crate::db::pool::open_connection;
use crate::db::schema::{quote_identifier, SchemaDocument};
use crate::errors::DbError;
use serde::Serialize;
use sqlx::mysql::MySqlConnection;
use sqlx::{Connection, Executor, Row};
use std::path::Path;

/// Outcome of a successful bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Database that was created or already existed
    pub database: String,
    /// Structural statements sent in the batch
    pub statements: usize,
    /// Tables present after the run, as reported by the server
    pub tables: Vec<String>,
}

/// Ensure the configured database and schema exist
/// DOCUMENTATION: Safe to run repeatedly. Opens one raw connection without
/// a selected database, creates and selects `config.database`, runs the
/// structural part of the schema document as a single batch and lists the
/// resulting tables. The connection is closed on every exit path.
pub async fn initialize_database(
    config: &PoolConfig,
    schema_path: &Path,
) -> Result<BootstrapReport, DbError> {
    log::info!(
        "Connecting to MySQL at {} as {} (no database selected)",
        config.address(),
        config.user
    );

    let mut conn = open_connection(config, &config.server_options())
        .await
        .map_err(log_failure)?;

    let outcome = provision(&mut conn, &config.database, schema_path).await;

    if let Err(e) = conn.close().await {
        log::warn!("Error closing bootstrap connection: {}", e);
    }

    outcome.map_err(log_failure)
}

async fn provision(
    conn: &mut MySqlConnection,
    database: &str,
    schema_path: &Path,
) -> Result<BootstrapReport, DbError> {
    let quoted = quote_identifier(database);

    (&mut *conn)
        .execute(format!("CREATE DATABASE IF NOT EXISTS {}", quoted).as_str())
        .await?;
    log::info!("Database {} is present", database);

    (&mut *conn).execute(format!("USE {}", quoted).as_str()).await?;

    let schema = SchemaDocument::load(schema_path).await?;
    if !schema.preamble.is_empty() {
        log::debug!(
            "Ignoring {} database-level statement(s) from {}",
            schema.preamble.len(),
            schema_path.display()
        );
    }

    if schema.structure.is_empty() {
        log::warn!("Schema {} has no structural statements", schema_path.display());
    } else {
        log::info!(
            "Applying {} statement(s) from {}",
            schema.structure.len(),
            schema_path.display()
        );
        (&mut *conn)
            .execute(schema.structure_batch().as_str())
            .await?;
    }

    let tables = list_tables(conn).await?;
    log::info!("Tables in {}: {}", database, tables.join(", "));

    Ok(BootstrapReport {
        database: database.to_string(),
        statements: schema.structure.len(),
        tables,
    })
}

/// Tables in the currently selected database
pub async fn list_tables(conn: &mut MySqlConnection) -> Result<Vec<String>, DbError> {
    let rows = (&mut *conn).fetch_all("SHOW TABLES").await?;

    rows.iter()
        .map(|row| row.try_get::<String, _>(0).map_err(DbError::from))
        .collect()
}

fn log_failure(err: DbError) -> DbError {
    log::error!("Database bootstrap failed [{}]: {}", err.code(), err);
    log::error!("Hint: {}", err.hint());
    err
}
