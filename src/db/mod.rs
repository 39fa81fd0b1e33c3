// src/db/mod.rs
// DOCUMENTATION: Database module organization
// PURPOSE: Re-export database components

pub mod bootstrap;
pub mod diagnostic;
pub mod pool;
pub mod schema;

pub use bootstrap::{initialize_database, list_tables, BootstrapReport};
pub use diagnostic::{check_connection, DiagnosticResult};
pub use pool::{
    CheckoutPolicy, ConnectionPool, MySqlManager, MySqlPool, PoolStatus, PooledConnection, SqlParam,
};
pub use schema::SchemaDocument;
