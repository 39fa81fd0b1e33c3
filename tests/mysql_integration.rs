//! Properties that need a live MySQL server.
//!
//! Run with `cargo test -- --ignored` against a disposable server; connection
//! settings come from the usual DB_* variables (or a local .env file).

use lahlah_os::config::{Config, PoolConfig};
use lahlah_os::db::pool::open_connection;
use lahlah_os::db::{
    check_connection, initialize_database, ConnectionPool, DiagnosticResult, SchemaDocument,
};
use sqlx::{Connection, Executor, Row};
use std::collections::BTreeSet;
use std::time::Duration;

fn env_config() -> Config {
    dotenv::dotenv().ok();
    Config::from_env().expect("valid DB_* configuration")
}

fn scratch_pool_config(suffix: &str) -> PoolConfig {
    let mut pool_config = PoolConfig::from(&env_config());
    pool_config.database = format!("lahlah_os_it_{}_{}", suffix, std::process::id());
    pool_config
}

async fn drop_database(pool_config: &PoolConfig) {
    let mut admin = pool_config.clone();
    admin.database = "mysql".to_string();
    let pool = ConnectionPool::new(admin).expect("admin pool");
    pool.query(&format!("DROP DATABASE IF EXISTS `{}`", pool_config.database), &[])
        .await
        .expect("drop scratch database");
    pool.close().await;
}

fn declared_tables(config: &Config) -> BTreeSet<String> {
    let sql = std::fs::read_to_string(&config.schema_path).expect("schema file");
    SchemaDocument::parse(&sql).declared_tables().into_iter().collect()
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn bootstrap_twice_leaves_same_tables() {
    let config = env_config();
    let pool_config = scratch_pool_config("idem");

    let first = initialize_database(&pool_config, &config.schema_path)
        .await
        .expect("first bootstrap");
    let second = initialize_database(&pool_config, &config.schema_path)
        .await
        .expect("second bootstrap");

    let first_tables: BTreeSet<_> = first.tables.into_iter().collect();
    let second_tables: BTreeSet<_> = second.tables.into_iter().collect();
    assert_eq!(first_tables, second_tables);
    assert_eq!(first_tables, declared_tables(&config));

    drop_database(&pool_config).await;
}

#[tokio::test]
#[ignore = "requires a running MySQL server; creates lahlah_os_db"]
async fn bootstrap_uses_default_database_name() {
    dotenv::dotenv().ok();
    let config = Config::from_lookup(|key| match key {
        "DB_NAME" => None,
        _ => std::env::var(key).ok(),
    })
    .expect("valid DB_* configuration");
    let pool_config = PoolConfig::from(&config);
    assert_eq!(pool_config.database, "lahlah_os_db");

    let report = initialize_database(&pool_config, &config.schema_path)
        .await
        .expect("bootstrap");
    assert_eq!(report.database, "lahlah_os_db");

    let pool = ConnectionPool::new(pool_config).expect("pool");
    let mut conn = pool.acquire().await.expect("pooled connection");
    let tables: BTreeSet<_> = lahlah_os::db::list_tables(&mut conn)
        .await
        .expect("list tables")
        .into_iter()
        .collect();
    drop(conn);
    pool.close().await;

    assert_eq!(tables, declared_tables(&config));
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn diagnostic_computes_two() {
    let config = env_config();
    let pool_config = scratch_pool_config("diag");
    initialize_database(&pool_config, &config.schema_path)
        .await
        .expect("bootstrap");

    let pool = ConnectionPool::new(pool_config.clone()).expect("pool");
    let result = check_connection(&pool).await;
    pool.close().await;

    assert_eq!(result, DiagnosticResult::Success(2));
    assert_eq!(result.exit_code(), 0);

    drop_database(&pool_config).await;
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn missing_database_is_schema_error() {
    let pool_config = scratch_pool_config("missing");
    let pool = ConnectionPool::new(pool_config).expect("pool");

    let result = check_connection(&pool).await;

    match result {
        DiagnosticResult::Failure { code, .. } => assert_eq!(code, "ER_BAD_DB_ERROR"),
        DiagnosticResult::Success(_) => panic!("database should not exist"),
    }
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn pool_never_exceeds_connection_limit() {
    let config = env_config();
    let mut pool_config = scratch_pool_config("limit");
    pool_config.connection_limit = 2;
    initialize_database(&pool_config, &config.schema_path)
        .await
        .expect("bootstrap");

    let pool = ConnectionPool::new(pool_config.clone()).expect("pool");
    let queries: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.query("SELECT SLEEP(0.05)", &[]).await.map(|_| ()) })
        })
        .collect();

    let mut peak = 0;
    while queries.iter().any(|q| !q.is_finished()) {
        peak = peak.max(pool.status().in_use);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for query in queries {
        query.await.expect("join").expect("query");
    }

    assert!(peak <= 2, "peak checkouts {}", peak);
    assert!(pool.status().idle <= 2);
    pool.close().await;

    drop_database(&pool_config).await;
}

async fn connection_id(pool: &ConnectionPool) -> u64 {
    let rows = pool
        .query("SELECT CONNECTION_ID() AS id", &[])
        .await
        .expect("connection id");
    rows[0].try_get::<u64, _>("id").expect("id column")
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn pool_reuses_idle_connection_and_replaces_dead_one() {
    let config = env_config();
    let pool_config = scratch_pool_config("reuse");
    initialize_database(&pool_config, &config.schema_path)
        .await
        .expect("bootstrap");

    let pool = ConnectionPool::new(pool_config.clone()).expect("pool");

    let first = connection_id(&pool).await;
    let second = connection_id(&pool).await;
    assert_eq!(first, second, "sequential queries should share one connection");

    let status = pool.status();
    assert_eq!(status.idle, 1);
    assert_eq!(status.in_use, 0);

    let mut admin = open_connection(&pool_config, &pool_config.server_options())
        .await
        .expect("admin connection");
    (&mut admin)
        .execute(format!("KILL {}", first).as_str())
        .await
        .expect("kill pooled connection");
    admin.close().await.expect("close admin connection");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let replacement = connection_id(&pool).await;
    assert_ne!(replacement, first, "killed connection was handed out again");

    let status = pool.status();
    assert_eq!(status.idle, 1);
    assert_eq!(status.in_use, 0);
    pool.close().await;

    drop_database(&pool_config).await;
}
