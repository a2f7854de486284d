//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `FATHOM_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CACHE_FILE_NAME, DEFAULT_COLLECTION_NAME, DEFAULT_GENERATION_MODEL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOP_K, DEFAULT_TOP_M,
};

/// Process configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `FATHOM_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Directory holding the result cache. Default: `./outputs`.
    pub data_dir: PathBuf,

    /// Explicit cache file. Default: `<data_dir>/search_cache.log`.
    pub cache_file: Option<PathBuf>,

    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// Vector collection holding catalogue documents.
    pub collection_name: String,

    /// Sentence-embedding model directory (BERT + tokenizer).
    pub embedder_path: Option<PathBuf>,

    /// Cross-encoder model directory (BERT + tokenizer).
    pub reranker_path: Option<PathBuf>,

    /// Default candidates fetched per search. Default: `20`.
    pub top_k: usize,

    /// Default hits returned per search. Default: `3`.
    pub top_m: usize,

    /// Request-level timeout wrapped around a whole search. Default: `30`.
    pub request_timeout_secs: u64,

    /// Max entries in the in-memory front cache. Default: `10_000`.
    pub l1_capacity: u64,

    /// Model used when a generation credential is present.
    pub generation_model: String,
}

/// Default Qdrant URL used when `FATHOM_QDRANT_URL` is not set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            data_dir: PathBuf::from("./outputs"),
            cache_file: None,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            embedder_path: None,
            reranker_path: None,
            top_k: DEFAULT_TOP_K,
            top_m: DEFAULT_TOP_M,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            l1_capacity: 10_000,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "FATHOM_PORT";
    const ENV_BIND_ADDR: &'static str = "FATHOM_BIND_ADDR";
    const ENV_DATA_DIR: &'static str = "FATHOM_DATA_DIR";
    const ENV_CACHE_FILE: &'static str = "FATHOM_CACHE_FILE";
    const ENV_QDRANT_URL: &'static str = "FATHOM_QDRANT_URL";
    const ENV_COLLECTION: &'static str = "FATHOM_COLLECTION";
    const ENV_EMBEDDER_PATH: &'static str = "FATHOM_EMBEDDER_PATH";
    const ENV_RERANKER_PATH: &'static str = "FATHOM_RERANKER_PATH";
    const ENV_TOP_K: &'static str = "FATHOM_TOP_K";
    const ENV_TOP_M: &'static str = "FATHOM_TOP_M";
    const ENV_REQUEST_TIMEOUT: &'static str = "FATHOM_REQUEST_TIMEOUT_SECS";
    const ENV_L1_CAPACITY: &'static str = "FATHOM_L1_CAPACITY";
    const ENV_GENERATION_MODEL: &'static str = "FATHOM_GENERATION_MODEL";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let data_dir = Self::parse_path_from_env(Self::ENV_DATA_DIR, defaults.data_dir);
        let cache_file = Self::parse_optional_path_from_env(Self::ENV_CACHE_FILE);
        let qdrant_url = Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url);
        let collection_name =
            Self::parse_string_from_env(Self::ENV_COLLECTION, defaults.collection_name);
        let embedder_path = Self::parse_optional_path_from_env(Self::ENV_EMBEDDER_PATH);
        let reranker_path = Self::parse_optional_path_from_env(Self::ENV_RERANKER_PATH);
        let top_k = Self::parse_count_from_env(Self::ENV_TOP_K, defaults.top_k)?;
        let top_m = Self::parse_count_from_env(Self::ENV_TOP_M, defaults.top_m)?;
        let request_timeout_secs =
            Self::parse_u64_from_env(Self::ENV_REQUEST_TIMEOUT, defaults.request_timeout_secs);
        let l1_capacity = Self::parse_u64_from_env(Self::ENV_L1_CAPACITY, defaults.l1_capacity);
        let generation_model =
            Self::parse_string_from_env(Self::ENV_GENERATION_MODEL, defaults.generation_model);

        Ok(Self {
            port,
            bind_addr,
            data_dir,
            cache_file,
            qdrant_url,
            collection_name,
            embedder_path,
            reranker_path,
            top_k,
            top_m,
            request_timeout_secs,
            l1_capacity,
            generation_model,
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.data_dir.clone(),
            });
        }

        for path in [&self.embedder_path, &self.reranker_path].into_iter().flatten() {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        self.search_config().validate()
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Resolved location of the durable result cache.
    pub fn cache_path(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_CACHE_FILE_NAME))
    }

    /// Search defaults handed to the retrieval pipeline.
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            top_k: self.top_k,
            top_m: self.top_m,
            request_timeout: Some(Duration::from_secs(self.request_timeout_secs))
                .filter(|d| !d.is_zero()),
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_count_from_env(var_name: &'static str, default: usize) -> Result<usize, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e| ConfigError::CountParseError {
                    name: var_name,
                    value: value.clone(),
                    source: e,
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Explicit search defaults owned by a [`RetrievalPipeline`](crate::pipeline::RetrievalPipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Candidates fetched from the vector index.
    pub top_k: usize,
    /// Hits kept after re-ranking.
    pub top_m: usize,
    /// Timeout wrapped around one whole search; `None` disables it.
    pub request_timeout: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            top_m: DEFAULT_TOP_M,
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        }
    }
}

impl SearchConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_top_m(mut self, top_m: usize) -> Self {
        self.top_m = top_m;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Fills unset per-request parameters from these defaults.
    ///
    /// An unset `top_m` never exceeds the effective `top_k`, so a request that
    /// only lowers `top_k` stays valid.
    pub fn resolve(&self, top_k: Option<usize>, top_m: Option<usize>) -> (usize, usize) {
        let top_k = top_k.unwrap_or(self.top_k);
        let top_m = top_m.unwrap_or_else(|| self.top_m.min(top_k));
        (top_k, top_m)
    }

    /// Checks `top_k > 0` and `0 < top_m <= top_k`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidSearchDefaults {
                top_k: self.top_k,
                top_m: self.top_m,
            });
        }
        if self.top_m == 0 || self.top_m > self.top_k {
            return Err(ConfigError::InvalidSearchDefaults {
                top_k: self.top_k,
                top_m: self.top_m,
            });
        }
        Ok(())
    }
}
