//! Redis backend using the Resque key layout.
//!
//! Keys live under a namespace (default `resque`):
//!
//! - `queues`: set of known queue names
//! - `queue:<name>`: list of JSON payloads, pushed right, popped left
//! - `workers`: set of registered worker ids
//! - `worker:<id>`: JSON record of the job a worker is processing
//! - `worker:<id>:started`: registration timestamp
//! - `stat:<name>`: processed/failed counters
//! - `failed`: list of JSON failure records

use chrono::{DateTime, Utc};
use queue_core::{Failure, Job, Payload, QueueSet, WorkerId};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use crate::{BackendError, BackendFuture, QueueBackend, RedisConfig, is_dead_local_worker};

/// Key builder for a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisKeys {
    namespace: String,
}

impl RedisKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.namespace, suffix)
    }

    pub fn queues(&self) -> String {
        self.key("queues")
    }

    pub fn queue(&self, name: &str) -> String {
        self.key(&format!("queue:{}", name))
    }

    pub fn workers(&self) -> String {
        self.key("workers")
    }

    pub fn worker(&self, worker: &WorkerId) -> String {
        self.key(&format!("worker:{}", worker))
    }

    pub fn worker_started(&self, worker: &WorkerId) -> String {
        self.key(&format!("worker:{}:started", worker))
    }

    pub fn stat(&self, name: &str) -> String {
        self.key(&format!("stat:{}", name))
    }

    pub fn failed(&self) -> String {
        self.key("failed")
    }
}

/// What a worker is doing, stored at `worker:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WorkingRecord {
    queue: String,
    run_at: DateTime<Utc>,
    payload: Payload,
}

impl WorkingRecord {
    fn into_job(self) -> Job {
        Job {
            queue: self.queue,
            payload: self.payload,
        }
    }
}

/// Queue backend talking to Redis.
pub struct RedisBackend {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
    keys: RedisKeys,
}

impl RedisBackend {
    /// Connect to the configured server.
    pub async fn connect(config: &RedisConfig) -> Result<Self, BackendError> {
        tracing::info!("Connecting to redis: {} ({})", config.url, config.namespace);

        let client = redis::Client::open(config.url.as_str())?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self::from_connection(redis, &config.namespace))
    }

    /// Build a backend from an existing connection manager.
    pub fn from_connection(redis: ConnectionManager, namespace: &str) -> Self {
        Self {
            redis,
            keys: RedisKeys::new(namespace),
        }
    }

    pub fn keys(&self) -> &RedisKeys {
        &self.keys
    }

    async fn queue_names(&self, queues: &QueueSet) -> Result<Vec<String>, BackendError> {
        if !queues.is_wildcard() {
            return Ok(queues.names().to_vec());
        }

        let mut conn = self.redis.clone();
        let known: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.keys.queues())
            .query_async(&mut conn)
            .await?;
        Ok(queues.resolve(known))
    }

    async fn unregister(&self, worker: &WorkerId) -> Result<(), BackendError> {
        let mut conn = self.redis.clone();

        let working: Option<String> = redis::cmd("GET")
            .arg(self.keys.worker(worker))
            .query_async(&mut conn)
            .await?;
        if let Some(raw) = working {
            let record: WorkingRecord = serde_json::from_str(&raw)?;
            self.push_failure(&Failure::dirty_exit(worker, &record.into_job()))
                .await?;
        }

        let worker_key = worker.to_string();
        let _: () = redis::pipe()
            .atomic()
            .cmd("SREM")
            .arg(self.keys.workers())
            .arg(&worker_key)
            .ignore()
            .cmd("DEL")
            .arg(self.keys.worker(worker))
            .arg(self.keys.worker_started(worker))
            .arg(self.keys.stat(&format!("processed:{}", worker_key)))
            .arg(self.keys.stat(&format!("failed:{}", worker_key)))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn push_failure(&self, failure: &Failure) -> Result<(), BackendError> {
        let mut conn = self.redis.clone();
        let encoded = serde_json::to_string(failure)?;

        let _: () = redis::pipe()
            .atomic()
            .cmd("RPUSH")
            .arg(self.keys.failed())
            .arg(encoded)
            .ignore()
            .cmd("INCR")
            .arg(self.keys.stat("failed"))
            .ignore()
            .cmd("INCR")
            .arg(self.keys.stat(&format!("failed:{}", failure.worker)))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

impl QueueBackend for RedisBackend {
    fn enqueue(&self, job: Job) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.redis.clone();
            let encoded = serde_json::to_string(&job.payload)?;

            let _: () = redis::pipe()
                .atomic()
                .cmd("SADD")
                .arg(self.keys.queues())
                .arg(&job.queue)
                .ignore()
                .cmd("RPUSH")
                .arg(self.keys.queue(&job.queue))
                .arg(encoded)
                .ignore()
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
    }

    fn reserve<'a>(&'a self, queues: &'a QueueSet) -> BackendFuture<'a, Option<Job>> {
        Box::pin(async move {
            let mut conn = self.redis.clone();

            for name in self.queue_names(queues).await? {
                let popped: Option<String> = redis::cmd("LPOP")
                    .arg(self.keys.queue(&name))
                    .query_async(&mut conn)
                    .await?;

                if let Some(raw) = popped {
                    let payload: Payload = serde_json::from_str(&raw)?;
                    return Ok(Some(Job {
                        queue: name,
                        payload,
                    }));
                }
            }
            Ok(None)
        })
    }

    fn register_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.redis.clone();

            let _: () = redis::pipe()
                .atomic()
                .cmd("SADD")
                .arg(self.keys.workers())
                .arg(worker.to_string())
                .ignore()
                .cmd("SET")
                .arg(self.keys.worker_started(worker))
                .arg(Utc::now().to_rfc3339())
                .ignore()
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
    }

    fn deregister_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()> {
        Box::pin(self.unregister(worker))
    }

    fn prune_dead_workers(&self) -> BackendFuture<'_, Vec<WorkerId>> {
        Box::pin(async move {
            let mut conn = self.redis.clone();
            let registered: Vec<String> = redis::cmd("SMEMBERS")
                .arg(self.keys.workers())
                .query_async(&mut conn)
                .await?;

            let mut pruned = Vec::new();
            for raw in registered {
                let worker = match WorkerId::parse(&raw) {
                    Ok(worker) => worker,
                    Err(e) => {
                        tracing::debug!("Skipping unparseable worker entry: {}", e);
                        continue;
                    }
                };

                if is_dead_local_worker(&worker) {
                    tracing::info!("Pruning dead worker: {}", worker);
                    self.unregister(&worker).await?;
                    pruned.push(worker);
                }
            }
            Ok(pruned)
        })
    }

    fn mark_working<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.redis.clone();
            let record = WorkingRecord {
                queue: job.queue.clone(),
                run_at: Utc::now(),
                payload: job.payload.clone(),
            };

            let _: () = redis::cmd("SET")
                .arg(self.keys.worker(worker))
                .arg(serde_json::to_string(&record)?)
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
    }

    fn mark_done<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.redis.clone();

            let _: () = redis::pipe()
                .atomic()
                .cmd("INCR")
                .arg(self.keys.stat("processed"))
                .ignore()
                .cmd("INCR")
                .arg(self.keys.stat(&format!("processed:{}", worker)))
                .ignore()
                .cmd("INCR")
                .arg(self.keys.stat(&format!("processed_{}", job.queue)))
                .ignore()
                .cmd("DEL")
                .arg(self.keys.worker(worker))
                .ignore()
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
    }

    fn record_failure<'a>(
        &'a self,
        worker: &'a WorkerId,
        job: &'a Job,
        error: &'a str,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move { self.push_failure(&Failure::new(worker, job, error)).await })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_namespaced() {
        let keys = RedisKeys::new("resque");
        let worker = WorkerId::parse("box:42:jobs").unwrap();

        assert_eq!(keys.queues(), "resque:queues");
        assert_eq!(keys.queue("jobs"), "resque:queue:jobs");
        assert_eq!(keys.workers(), "resque:workers");
        assert_eq!(keys.worker(&worker), "resque:worker:box:42:jobs");
        assert_eq!(keys.worker_started(&worker), "resque:worker:box:42:jobs:started");
        assert_eq!(keys.stat("processed_jobs"), "resque:stat:processed_jobs");
        assert_eq!(keys.failed(), "resque:failed");
    }

    #[test]
    fn working_record_round_trips_to_job() {
        let raw = json!({
            "queue": "jobs",
            "run_at": "2024-01-01T00:00:00Z",
            "payload": {"class": "TestJob", "args": [420, "foo"]}
        });
        let record: WorkingRecord = serde_json::from_value(raw).unwrap();
        let job = record.into_job();
        assert_eq!(job, Job::new("jobs", "TestJob", vec![json!(420), json!("foo")]));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server (REDIS_URL)"]
    async fn reserve_against_live_redis() -> Result<(), BackendError> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let namespace = format!("test-{}", std::process::id());
        let backend = RedisBackend::connect(&RedisConfig::new(url).with_namespace(namespace)).await?;

        backend.enqueue(Job::new("jobs", "TestJob", vec![json!(1)])).await?;
        let queues = QueueSet::all();
        let job = backend.reserve(&queues).await?.expect("job");
        assert_eq!(job.class(), "TestJob");
        assert!(backend.reserve(&queues).await?.is_none());
        Ok(())
    }
}
