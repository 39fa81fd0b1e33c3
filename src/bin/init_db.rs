// src/bin/init_db.rs
// DOCUMENTATION: Database bootstrap command
// PURPOSE: Create DB_NAME and its tables from the schema document

use dotenv::dotenv;
use lahlah_os::config::{Config, PoolConfig};
use lahlah_os::db::initialize_database;
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

    let pool_config = PoolConfig::from(&config);

    match initialize_database(&pool_config, &config.schema_path).await {
        Ok(report) => {
            println!(
                "Database `{}` ready ({} statement(s) applied)",
                report.database, report.statements
            );
            println!("Tables ({}):", report.tables.len());
            for table in &report.tables {
                println!("  - {}", table);
            }
        }
        Err(e) => {
            eprintln!("Database initialization failed [{}]: {}", e.code(), e);
            eprintln!("Hint: {}", e.hint());
            process::exit(1);
        }
    }
}
