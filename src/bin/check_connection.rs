// src/bin/check_connection.rs
// DOCUMENTATION: Connectivity diagnostic command
// PURPOSE: Check the configured database once; exit 0 on success, 1 on failure

use dotenv::dotenv;
use lahlah_os::config::{Config, PoolConfig};
use lahlah_os::db::{check_connection, ConnectionPool};
use lahlah_os::init_logging;
use std::process;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    init_logging(&config);

    let pool = match ConnectionPool::new(PoolConfig::from(&config)) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{}\nHint: {}", e, e.hint());
            process::exit(1);
        }
    };
    let result = check_connection(&pool).await;

    log::debug!("Pool status after check: {:?}", pool.status());
    pool.close().await;

    if result.is_success() {
        println!("{}", result);
    } else {
        eprintln!("{}", result);
    }
    process::exit(result.exit_code());
}
