//! Backend selection resolved once at startup.

use std::sync::Arc;

use crate::{BackendError, MemoryBackend, QueueBackend, RedisBackend};

/// Default key namespace, shared with Resque.
pub const DEFAULT_NAMESPACE: &str = "resque";

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
    /// Prefix for every key.
    pub namespace: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Where the queues live.
#[derive(Clone)]
pub enum BackendConfig {
    /// Fresh in-process storage.
    Memory,
    /// A Redis server using the Resque key layout.
    Redis(RedisConfig),
    /// An already connected backend.
    Shared(Arc<dyn QueueBackend>),
}

impl BackendConfig {
    /// Config for a local Redis on the default port.
    pub fn local_redis() -> Self {
        Self::Redis(RedisConfig::new("redis://127.0.0.1:6379"))
    }

    /// Wrap an existing backend.
    pub fn shared(backend: Arc<dyn QueueBackend>) -> Self {
        Self::Shared(backend)
    }

    /// Parse a server description.
    ///
    /// Accepted forms:
    /// - `mem://`
    /// - `redis://host:port[/db]` (namespace `resque`)
    /// - `host:port[:db][/namespace]`
    pub fn parse(server: &str) -> Result<Self, BackendError> {
        let server = server.trim();
        if server.is_empty() {
            return Err(BackendError::InvalidConfig("empty server string".into()));
        }

        if server.starts_with("mem://") {
            return Ok(Self::Memory);
        }

        if server.starts_with("redis://") || server.starts_with("rediss://") {
            return Ok(Self::Redis(RedisConfig::new(server)));
        }

        let (address, namespace) = match server.split_once('/') {
            Some((address, namespace)) if !namespace.is_empty() => (address, namespace),
            Some((address, _)) => (address, DEFAULT_NAMESPACE),
            None => (server, DEFAULT_NAMESPACE),
        };

        let mut parts = address.split(':');
        let host = parts.next().filter(|h| !h.is_empty()).unwrap_or("127.0.0.1");
        let port = parts.next().filter(|p| !p.is_empty()).unwrap_or("6379");
        let db = parts.next().filter(|d| !d.is_empty());
        if parts.next().is_some() {
            return Err(BackendError::InvalidConfig(format!(
                "unrecognised server string: {}",
                server
            )));
        }

        port.parse::<u16>()
            .map_err(|_| BackendError::InvalidConfig(format!("invalid port: {}", port)))?;

        let url = match db {
            Some(db) => {
                db.parse::<u32>()
                    .map_err(|_| BackendError::InvalidConfig(format!("invalid db: {}", db)))?;
                format!("redis://{}:{}/{}", host, port, db)
            }
            None => format!("redis://{}:{}", host, port),
        };

        Ok(Self::Redis(RedisConfig::new(url).with_namespace(namespace)))
    }

    /// Resolve into a live backend.
    pub async fn connect(&self) -> Result<Arc<dyn QueueBackend>, BackendError> {
        match self {
            BackendConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
            BackendConfig::Redis(config) => Ok(Arc::new(RedisBackend::connect(config).await?)),
            BackendConfig::Shared(backend) => Ok(backend.clone()),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::local_redis()
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendConfig::Memory => write!(f, "Memory"),
            BackendConfig::Redis(config) => f.debug_tuple("Redis").field(config).finish(),
            BackendConfig::Shared(_) => write!(f, "Shared(..)"),
        }
    }
}

impl std::str::FromStr for BackendConfig {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
