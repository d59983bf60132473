use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub gazetteer_path: PathBuf,
    pub analyzer_url: String,
    pub analyzer_api_key: Option<String>,
    pub analyzer_timeout_secs: u64,
    pub analyzer_max_retries: u32,
    pub analyzer_backoff_base_ms: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub process_batch_size: i64,
    pub process_max_retries: i32,
    pub process_concurrency: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("gazetteer_path", &self.gazetteer_path)
            .field("database_url", &"[redacted]")
            .field("analyzer_url", &self.analyzer_url)
            .field(
                "analyzer_api_key",
                &self.analyzer_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("analyzer_timeout_secs", &self.analyzer_timeout_secs)
            .field("analyzer_max_retries", &self.analyzer_max_retries)
            .field("analyzer_backoff_base_ms", &self.analyzer_backoff_base_ms)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("process_batch_size", &self.process_batch_size)
            .field("process_max_retries", &self.process_max_retries)
            .field("process_concurrency", &self.process_concurrency)
            .finish()
    }
}
