#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Address the HTTP adapter binds to.
    pub bind_addr: String,

    // =========================
    // Core operation bounds
    // =========================
    /// Deadline applied to every externally visible operation
    /// (reserve, confirm, cancel, listings), in milliseconds.
    ///
    /// On expiry the in-flight future is dropped, which rolls back any
    /// open transaction; the caller receives a Timeout error. Nothing
    /// inside the core retries on its own.
    pub op_deadline_ms: u64,

    /// Maximum number of pooled database connections.
    ///
    /// The pool is the only in-process state shared between requests;
    /// oversell protection comes from transaction isolation, so this
    /// only bounds concurrency, never correctness.
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://stockpile_dev.db".to_string());

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let op_deadline_ms = std::env::var("OP_DEADLINE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(16);

        Self {
            database_url,
            bind_addr,
            op_deadline_ms,
            db_max_connections,
        }
    }
}
