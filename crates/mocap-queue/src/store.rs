//! Job state store.
//!
//! Holds one `JobRecord` per accepted job. Every phase write goes through
//! `JobRecord::transition`, so a job's phase never moves backwards whichever
//! backend is in use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mocap_models::{JobId, JobPhase};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{QueueError, QueueResult};
use crate::job::JobRecord;

/// How long a record stays in Redis after its last write.
pub const JOB_RECORD_TTL_SECS: u64 = 24 * 60 * 60;

/// Where job records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis { url: String },
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Key prefix for Redis records
    pub key_prefix: String,
    /// How long a record outlives its last write. Redis expires records
    /// itself; the memory backend drops finished ones on the next create.
    pub record_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            key_prefix: "mocap:job".to_string(),
            record_ttl: Duration::from_secs(JOB_RECORD_TTL_SECS),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backend = match std::env::var("STORE_BACKEND")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            Ok("redis") => StoreBackend::Redis {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            _ => StoreBackend::Memory,
        };

        Self {
            backend,
            key_prefix: std::env::var("STORE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            record_ttl: std::env::var("STORE_RECORD_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.record_ttl),
        }
    }
}

/// Shared handle to the job records. Cloning is cheap.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<Backend>,
}

enum Backend {
    Memory {
        records: RwLock<HashMap<JobId, JobRecord>>,
        ttl: Duration,
    },
    Redis {
        client: redis::Client,
        key_prefix: String,
        ttl_secs: u64,
    },
}

impl JobStore {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> QueueResult<Self> {
        let backend = match config.backend {
            StoreBackend::Memory => Backend::Memory {
                records: RwLock::new(HashMap::new()),
                ttl: config.record_ttl,
            },
            StoreBackend::Redis { url } => {
                let client = redis::Client::open(url.as_str())
                    .map_err(|e| QueueError::connection_failed(format!("{}: {}", url, e)))?;
                info!("Job records stored in Redis at {}", url);
                Backend::Redis {
                    client,
                    key_prefix: config.key_prefix,
                    ttl_secs: config.record_ttl.as_secs().max(1),
                }
            }
        };

        Ok(Self {
            inner: Arc::new(backend),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    /// In-memory store, mostly for tests.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Backend::Memory {
                records: RwLock::new(HashMap::new()),
                ttl: Duration::from_secs(JOB_RECORD_TTL_SECS),
            }),
        }
    }

    /// Insert a new record, replacing any record with the same id.
    pub async fn create(&self, record: JobRecord) -> QueueResult<()> {
        debug!("Creating job record {}", record.id());
        self.put(&record).await
    }

    pub async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>> {
        match self.inner.as_ref() {
            Backend::Memory { records, .. } => Ok(records.read().await.get(job_id).cloned()),
            Backend::Redis {
                client, key_prefix, ..
            } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let raw: Option<String> = conn.get(record_key(key_prefix, job_id)).await?;
                raw.map(|s| serde_json::from_str(&s).map_err(QueueError::from))
                    .transpose()
            }
        }
    }

    /// Move a job to `phase`.
    pub async fn set_phase(&self, job_id: &JobId, phase: JobPhase) -> QueueResult<JobRecord> {
        self.update(job_id, |record| record.transition(phase)).await
    }

    /// Record render progress. Puts the job in RENDERING.
    pub async fn set_progress(
        &self,
        job_id: &JobId,
        frames_done: u64,
        frames_total: u64,
    ) -> QueueResult<JobRecord> {
        self.update(job_id, |record| {
            record.transition(JobPhase::Rendering)?;
            record.frames_total = frames_total;
            record.frames_done = frames_done.min(frames_total);
            Ok(())
        })
        .await
    }

    /// Mark a job successful with its artifact file names.
    pub async fn complete(&self, job_id: &JobId, files: Vec<String>) -> QueueResult<JobRecord> {
        self.update(job_id, |record| {
            record.transition(JobPhase::Success)?;
            record.files = files;
            Ok(())
        })
        .await
    }

    /// Mark a job failed.
    pub async fn fail(&self, job_id: &JobId, detail: impl Into<String>) -> QueueResult<JobRecord> {
        let detail = detail.into();
        self.update(job_id, |record| {
            record.transition(JobPhase::Failure)?;
            record.error_detail = Some(detail);
            Ok(())
        })
        .await
    }

    /// Apply `change` to a stored record and write it back. The record is
    /// left untouched when `change` fails.
    async fn update<F>(&self, job_id: &JobId, change: F) -> QueueResult<JobRecord>
    where
        F: FnOnce(&mut JobRecord) -> QueueResult<()>,
    {
        match self.inner.as_ref() {
            Backend::Memory { records, .. } => {
                let mut records = records.write().await;
                let record = records
                    .get_mut(job_id)
                    .ok_or_else(|| QueueError::not_found(job_id))?;
                let mut updated = record.clone();
                change(&mut updated)?;
                *record = updated.clone();
                Ok(updated)
            }
            Backend::Redis { .. } => {
                // A job's worker writes its record one call at a time, so
                // read-modify-write is safe.
                let mut record = self
                    .get(job_id)
                    .await?
                    .ok_or_else(|| QueueError::not_found(job_id))?;
                change(&mut record)?;
                self.put(&record).await?;
                Ok(record)
            }
        }
    }

    async fn put(&self, record: &JobRecord) -> QueueResult<()> {
        match self.inner.as_ref() {
            Backend::Memory { records, ttl } => {
                let mut records = records.write().await;
                let now = Utc::now();
                records.retain(|_, kept| !expired(kept, now, *ttl));
                records.insert(record.id().clone(), record.clone());
                Ok(())
            }
            Backend::Redis {
                client,
                key_prefix,
                ttl_secs,
            } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let payload = serde_json::to_string(record)?;
                conn.set_ex::<_, _, ()>(record_key(key_prefix, record.id()), payload, *ttl_secs)
                    .await?;
                Ok(())
            }
        }
    }
}

/// A finished record whose last write is older than `ttl`.
fn expired(record: &JobRecord, now: DateTime<Utc>, ttl: Duration) -> bool {
    record.phase.is_terminal()
        && (now - record.updated_at)
            .to_std()
            .map(|age| age > ttl)
            .unwrap_or(false)
}

fn record_key(prefix: &str, job_id: &JobId) -> String {
    format!("{}:{}", prefix, job_id)
}
