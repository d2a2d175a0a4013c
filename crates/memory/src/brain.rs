//! The persistent state ("brain") boundary consumed by plugins.
//!
//! The core never reads or writes the brain itself; it only guarantees the
//! contract: `checkout` hands back the current value plus a lock token,
//! `update` requires that token, `checkin` releases without writing.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use {async_trait::async_trait, serde_json::Value, tracing::warn};

use crate::error::{Error, Result};

/// A checked-out memory: the stored value (if the key exists) and the lock
/// token required for a subsequent `update`.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub value: Option<Value>,
    pub token: String,
}

#[async_trait]
pub trait Brain: Send + Sync {
    /// Check out a key for exclusive update.
    async fn checkout(&self, key: &str) -> Result<Checkout>;

    /// Store a new value for a checked-out key and release the lock.
    async fn update(&self, key: &str, token: &str, value: Value) -> Result<()>;

    /// Release a checkout without writing.
    async fn checkin(&self, key: &str, token: &str);
}

/// How long a checkout may sit idle before another caller can steal it.
/// Keeps an abandoned checkout (crashed plugin body) from wedging a key.
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct Record {
    value: Option<Value>,
    lock: Option<Lock>,
}

#[derive(Debug)]
struct Lock {
    token: String,
    taken_at: Instant,
}

/// In-memory brain backed by `HashMap`. No persistence across restarts.
#[derive(Default)]
pub struct InMemoryBrain {
    records: Mutex<HashMap<String, Record>>,
}

impl InMemoryBrain {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Brain for InMemoryBrain {
    async fn checkout(&self, key: &str) -> Result<Checkout> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records.entry(key.to_string()).or_default();
        if let Some(lock) = &record.lock {
            if lock.taken_at.elapsed() < LOCK_TIMEOUT {
                return Err(Error::Locked {
                    key: key.to_string(),
                });
            }
            warn!(key = %key, "stealing expired brain lock");
        }
        let token = uuid::Uuid::new_v4().to_string();
        record.lock = Some(Lock {
            token: token.clone(),
            taken_at: Instant::now(),
        });
        Ok(Checkout {
            value: record.value.clone(),
            token,
        })
    }

    async fn update(&self, key: &str, token: &str, value: Value) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records.entry(key.to_string()).or_default();
        match &record.lock {
            Some(lock) if lock.token == token => {
                record.value = Some(value);
                record.lock = None;
                Ok(())
            },
            _ => Err(Error::InvalidToken {
                key: key.to_string(),
            }),
        }
    }

    async fn checkin(&self, key: &str, token: &str) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = records.get_mut(key)
            && record.lock.as_ref().is_some_and(|l| l.token == token)
        {
            record.lock = None;
        }
    }
}
