use clap::Parser;

const DEFAULT_LOG: &str = "info";
const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Process-level bootstrap settings, shared by the `indexer` and `queryd`
/// binaries. Distinct from the `Configuration` component in
/// [`crate::core::settings`], which holds reloadable *product* settings
/// (provider credentials, AI model configuration) read from the database.
#[derive(Debug, Parser, Clone)]
pub struct StartArgs {
    /// Postgres connection string. Falls back to `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// `tracing_subscriber::EnvFilter` string. Falls back to `RAG_LOG`, then `info`.
    #[arg(long)]
    log: Option<String>,

    /// Bind address for the query service HTTP listener. Falls back to `RAG_ADDRESS`.
    #[arg(long)]
    address: Option<String>,

    /// Comma-separated list of allowed CORS origins. Falls back to `RAG_ALLOWED_ORIGINS`.
    #[arg(long)]
    allowed_origins: Option<String>,

    /// Max Postgres pool connections. Falls back to `RAG_DB_MAX_CONNECTIONS`.
    #[arg(long)]
    db_max_connections: Option<u32>,

    /// Timeout in seconds applied to outbound provider/model/database calls.
    #[arg(long)]
    request_timeout_secs: Option<u64>,
}

impl StartArgs {
    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .expect("DATABASE_URL must be set via --database-url or the environment")
    }

    pub fn log(&self) -> String {
        self.log
            .clone()
            .or_else(|| std::env::var("RAG_LOG").ok())
            .unwrap_or_else(|| DEFAULT_LOG.to_string())
    }

    pub fn address(&self) -> String {
        self.address
            .clone()
            .or_else(|| std::env::var("RAG_ADDRESS").ok())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string())
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .clone()
            .or_else(|| std::env::var("RAG_ALLOWED_ORIGINS").ok())
            .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
            .or_else(|| {
                std::env::var("RAG_DB_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .or_else(|| {
                std::env::var("RAG_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }
}

/// Initialize the global `tracing` subscriber from the resolved log filter.
/// Called once by each binary before any other I/O.
pub fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
