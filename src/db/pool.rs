// src/db/pool.rs
// DOCUMENTATION: Shared MySQL connection pool
// PURPOSE: deadpool-managed sqlx connections with wait / fail-fast / queue
// limit admission on top

use crate::config::PoolConfig;
use crate::errors::DbError;
use deadpool::managed::{
    Manager, Metrics, Object, Pool, PoolError, RecycleError, RecycleResult, TimeoutType, Timeouts,
};
use deadpool::Runtime;
use serde::Serialize;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Creates and health-checks MySQL connections for deadpool
/// DOCUMENTATION: `create` makes exactly one connect attempt so refused or
/// rejected connections keep their classification. `recycle` pings.
#[derive(Debug)]
pub struct MySqlManager {
    config: PoolConfig,
    options: MySqlConnectOptions,
}

impl MySqlManager {
    pub fn new(config: PoolConfig) -> Self {
        MySqlManager {
            options: config.database_options(),
            config,
        }
    }
}

impl Manager for MySqlManager {
    type Type = MySqlConnection;
    type Error = DbError;

    async fn create(&self) -> Result<MySqlConnection, DbError> {
        let conn = open_connection(&self.config, &self.options).await?;
        log::debug!("Opened pooled connection to {}", self.config.address());
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut MySqlConnection, _: &Metrics) -> RecycleResult<DbError> {
        conn.ping().await.map_err(|e| {
            log::debug!("Dropping stale pooled connection: {}", e);
            RecycleError::Backend(DbError::from(e))
        })
    }
}

/// deadpool pool over MySQL connections
pub type MySqlPool = Pool<MySqlManager>;

/// A checked-out connection; returned to the pool on drop
pub type PooledConnection = Object<MySqlManager>;

/// Open one connection with the configured timeout; no retry
pub async fn open_connection(
    config: &PoolConfig,
    options: &MySqlConnectOptions,
) -> Result<MySqlConnection, DbError> {
    match tokio::time::timeout(config.connect_timeout, MySqlConnection::connect_with(options)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(DbError::from(e)),
        Err(_) => Err(DbError::connect_timeout(&config.address())),
    }
}

/// Admission policy layered over a deadpool pool
/// DOCUMENTATION: deadpool bounds checkouts to `max_size` and queues FIFO.
/// This adds fail-fast when waiting is disabled and a cap on queued callers
/// (`queue_limit`, 0 means no cap).
#[derive(Debug)]
pub struct CheckoutPolicy {
    wait_for_connections: bool,
    queue_limit: usize,
    waiting: AtomicUsize,
}

impl CheckoutPolicy {
    pub fn new(wait_for_connections: bool, queue_limit: usize) -> Self {
        CheckoutPolicy {
            wait_for_connections,
            queue_limit,
            waiting: AtomicUsize::new(0),
        }
    }

    /// Check out an object, waiting only if the policy allows it
    pub async fn checkout<M>(&self, pool: &Pool<M>) -> Result<Object<M>, DbError>
    where
        M: Manager<Error = DbError>,
    {
        let limit = pool.status().max_size;

        let mut no_wait = Timeouts::default();
        no_wait.wait = Some(Duration::ZERO);

        match pool.timeout_get(&no_wait).await {
            Ok(object) => return Ok(object),
            Err(PoolError::Timeout(TimeoutType::Wait)) => {}
            Err(e) => return Err(pool_error(e)),
        }

        if !self.wait_for_connections {
            return Err(DbError::PoolSaturated {
                limit: limit as u32,
            });
        }

        let ahead = self.waiting.fetch_add(1, Ordering::SeqCst);
        let _slot = WaiterSlot(&self.waiting);
        if self.queue_limit > 0 && ahead >= self.queue_limit {
            return Err(DbError::QueueFull {
                limit: self.queue_limit,
            });
        }

        log::debug!("Pool saturated, queued behind {} waiter(s)", ahead);
        pool.get().await.map_err(pool_error)
    }

    /// Callers currently queued for a connection
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

/// Releases a queue slot however the waiting future ends
struct WaiterSlot<'a>(&'a AtomicUsize);

impl Drop for WaiterSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn pool_error(err: PoolError<DbError>) -> DbError {
    match err {
        PoolError::Backend(e) => e,
        PoolError::Closed => DbError::PoolClosed,
        PoolError::Timeout(kind) => DbError::Connection {
            code: "ETIMEDOUT",
            message: format!("pool timed out ({:?})", kind),
        },
        other => DbError::Query {
            number: None,
            message: other.to_string(),
        },
    }
}

/// Return a connection to the pool, or detach it after a connection-level
/// failure so it is never handed out again
pub fn release_after<M: Manager>(object: Object<M>, err: Option<&DbError>) {
    match err {
        Some(e) if e.is_connection_fault() => {
            log::warn!("Discarding pooled connection after error: {}", e);
            drop(Object::take(object));
        }
        _ => drop(object),
    }
}

/// Positional query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl SqlParam {
    fn bind_to<'q>(
        &'q self,
        query: Query<'q, MySql, MySqlArguments>,
    ) -> Query<'q, MySql, MySqlArguments> {
        match self {
            SqlParam::Null => query.bind(Option::<String>::None),
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::UInt(v) => query.bind(*v),
            SqlParam::Float(v) => query.bind(*v),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
        }
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<u64> for SqlParam {
    fn from(v: u64) -> Self {
        SqlParam::UInt(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlParam::Null, Into::into)
    }
}

/// Snapshot of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub limit: u32,
    pub in_use: usize,
    pub idle: usize,
    pub waiting: usize,
}

/// Shared connection pool handle
/// DOCUMENTATION: Build once at startup with ConnectionPool::new() and
/// clone the handle into every component that issues queries. Connections
/// are opened lazily, up to `connection_limit`.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pool: MySqlPool,
    policy: Arc<CheckoutPolicy>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Result<Self, DbError> {
        log::info!(
            "Initializing connection pool: {} / {} (limit {}, wait {}, queue limit {})",
            config.address(),
            config.database,
            config.connection_limit,
            config.wait_for_connections,
            config.queue_limit
        );

        let policy = CheckoutPolicy::new(config.wait_for_connections, config.queue_limit);
        let pool = Pool::builder(MySqlManager::new(config.clone()))
            .max_size(config.connection_limit.max(1) as usize)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DbError::PoolBuild(e.to_string()))?;

        Ok(ConnectionPool {
            pool,
            policy: Arc::new(policy),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.pool.manager().config
    }

    /// Check out a connection
    /// DOCUMENTATION: Waits, queues or fails according to PoolConfig. The
    /// connection goes back to the pool when the guard is dropped.
    pub async fn acquire(&self) -> Result<PooledConnection, DbError> {
        self.policy.checkout(&self.pool).await
    }

    /// Run one statement with positional parameters and collect the rows
    pub async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<MySqlRow>, DbError> {
        let mut conn = self.acquire().await?;

        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, param| param.bind_to(query));

        match query.fetch_all(&mut *conn).await {
            Ok(rows) => {
                release_after(conn, None);
                Ok(rows)
            }
            Err(e) => {
                let err = DbError::from(e);
                release_after(conn, Some(&err));
                Err(err)
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            limit: status.max_size as u32,
            in_use: status.size.saturating_sub(status.available),
            idle: status.available,
            waiting: self.policy.waiting(),
        }
    }

    /// Drop idle connections and refuse new checkouts
    pub async fn close(&self) {
        self.pool.close();
        log::debug!("Connection pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio_test::{assert_err, assert_ok};

    /// Hands out numbered objects, or refuses like a stopped server
    #[derive(Debug)]
    struct CountingManager {
        created: AtomicUsize,
        refuse: bool,
    }

    impl CountingManager {
        fn pool(max_size: usize, refuse: bool) -> Pool<CountingManager> {
            Pool::builder(CountingManager {
                created: AtomicUsize::new(0),
                refuse,
            })
            .max_size(max_size)
            .runtime(Runtime::Tokio1)
            .build()
            .unwrap()
        }
    }

    impl Manager for CountingManager {
        type Type = usize;
        type Error = DbError;

        async fn create(&self) -> Result<usize, DbError> {
            if self.refuse {
                return Err(DbError::from_io(&io::Error::from(
                    io::ErrorKind::ConnectionRefused,
                )));
            }
            Ok(self.created.fetch_add(1, Ordering::SeqCst))
        }

        async fn recycle(&self, _: &mut usize, _: &Metrics) -> RecycleResult<DbError> {
            Ok(())
        }
    }

    async fn wait_for_waiters(policy: &CheckoutPolicy, n: usize) {
        while policy.waiting() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_checkouts_never_exceed_limit() {
        let pool = CountingManager::pool(3, false);
        let policy = Arc::new(CheckoutPolicy::new(true, 0));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let pool = pool.clone();
                let policy = Arc::clone(&policy);
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _conn = policy.checkout(&pool).await.unwrap();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
        assert!(pool.manager().created.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.status().available, pool.status().size);
        assert_eq!(policy.waiting(), 0);
    }

    #[tokio::test]
    async fn test_released_object_is_reused() {
        let pool = CountingManager::pool(2, false);
        let policy = CheckoutPolicy::new(true, 0);

        let first = assert_ok!(policy.checkout(&pool).await);
        let id = *first;
        release_after(first, None);

        let second = assert_ok!(policy.checkout(&pool).await);
        assert_eq!(*second, id);
        assert_eq!(pool.manager().created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_fault_detaches_object() {
        let pool = CountingManager::pool(2, false);
        let policy = CheckoutPolicy::new(true, 0);

        let conn = assert_ok!(policy.checkout(&pool).await);
        let fault = DbError::from_io(&io::Error::from(io::ErrorKind::ConnectionReset));
        release_after(conn, Some(&fault));
        assert_eq!(pool.status().size, 0);

        let conn = assert_ok!(policy.checkout(&pool).await);
        let syntax = DbError::from_server_error(1064, "syntax error".to_string());
        release_after(conn, Some(&syntax));
        assert_eq!(pool.status().size, 1);
        assert_eq!(pool.status().available, 1);
    }

    #[tokio::test]
    async fn test_saturated_without_waiting_fails_immediately() {
        let pool = CountingManager::pool(1, false);
        let policy = CheckoutPolicy::new(false, 0);
        let _held = assert_ok!(policy.checkout(&pool).await);

        let err = assert_err!(policy.checkout(&pool).await);
        assert!(matches!(err, DbError::PoolSaturated { limit: 1 }));
        assert_eq!(policy.waiting(), 0);
    }

    #[tokio::test]
    async fn test_queue_limit_rejects_extra_waiters() {
        let pool = CountingManager::pool(1, false);
        let policy = Arc::new(CheckoutPolicy::new(true, 1));
        let held = assert_ok!(policy.checkout(&pool).await);

        let queued = {
            let pool = pool.clone();
            let policy = Arc::clone(&policy);
            tokio::spawn(async move { policy.checkout(&pool).await.map(|_| ()) })
        };
        wait_for_waiters(&policy, 1).await;

        let err = assert_err!(policy.checkout(&pool).await);
        assert!(matches!(err, DbError::QueueFull { limit: 1 }));
        assert_eq!(policy.waiting(), 1);

        drop(held);
        assert_ok!(queued.await.unwrap());
        assert_eq!(policy.waiting(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_frees_queue_slot() {
        let pool = CountingManager::pool(1, false);
        let policy = CheckoutPolicy::new(true, 1);
        let _held = assert_ok!(policy.checkout(&pool).await);

        let timed_out = tokio::time::timeout(Duration::from_millis(10), policy.checkout(&pool)).await;
        assert!(timed_out.is_err());
        assert_eq!(policy.waiting(), 0);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects() {
        let pool = CountingManager::pool(2, false);
        let policy = CheckoutPolicy::new(true, 0);
        pool.close();

        let err = assert_err!(policy.checkout(&pool).await);
        assert!(matches!(err, DbError::PoolClosed));
    }

    #[tokio::test]
    async fn test_create_failure_keeps_classification() {
        let pool = CountingManager::pool(1, true);
        let policy = CheckoutPolicy::new(true, 0);

        let err = assert_err!(policy.checkout(&pool).await);
        assert_eq!(err.code(), "ECONNREFUSED");
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test]
    async fn test_refused_connection_releases_slot() {
        let pool = ConnectionPool::new(PoolConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "root".to_string(),
            password: String::new(),
            database: "lahlah_os_db".to_string(),
            wait_for_connections: true,
            connection_limit: 2,
            queue_limit: 0,
            connect_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = pool
            .query("SELECT 1", &[])
            .await
            .err()
            .expect("nothing listens on port 1");
        assert_eq!(err.code(), "ECONNREFUSED");

        let status = pool.status();
        assert_eq!(status.in_use, 0);
        assert_eq!(status.idle, 0);
        assert_eq!(status.limit, 2);
    }

    #[test]
    fn test_param_conversions() {
        assert_eq!(SqlParam::from(7i64), SqlParam::Int(7));
        assert_eq!(SqlParam::from("x"), SqlParam::Text("x".to_string()));
        assert_eq!(SqlParam::from(None::<i64>), SqlParam::Null);
        assert_eq!(SqlParam::from(Some(true)), SqlParam::Bool(true));
    }
}
