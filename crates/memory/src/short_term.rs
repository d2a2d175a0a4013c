//! Short-term conversational memory.
//!
//! A small keyed map of recent values with timestamps. Two kinds of entry
//! share it: named context slots used for pronoun resolution ("it"), and a
//! reserved last-message slot per (user, channel) used to replay an
//! unmatched message when the user follows up with an empty directed one.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::trace;

/// The literal token that refers back to a remembered context value.
pub const PRONOUN: &str = "it";

/// How long an unmatched message stays eligible for empty-message replay.
pub const KEEP_LISTENING: Duration = Duration::from_secs(77);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Context(String),
    LastMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoryKey {
    slot: Slot,
    user: String,
    channel: Option<String>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    stored_at: Instant,
}

/// Outcome of resolving a matcher's context labels against memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextBinding {
    /// Every labeled argument resolved or was stored.
    Bound,
    /// A pronoun referenced a context with no remembered value.
    Missing { label: String },
}

/// The store itself: one map under one exclusive critical section.
/// Contention is low; correctness matters more than throughput here, since
/// resolve-then-update for a key must be atomic across a whole matcher pass.
pub struct ShortTermMemory {
    entries: Mutex<HashMap<MemoryKey, Entry>>,
    listen_window: Duration,
}

impl Default for ShortTermMemory {
    fn default() -> Self {
        Self::new(KEEP_LISTENING)
    }
}

impl ShortTermMemory {
    pub fn new(listen_window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            listen_window,
        }
    }

    /// Resolve or store context-labeled arguments in a single critical
    /// section. For each labeled position: a pronoun or empty argument is
    /// replaced by the remembered value (refreshing its timestamp), and any
    /// other value becomes the new remembered value. Stops at the first
    /// pronoun with nothing remembered.
    pub fn bind_contexts(
        &self,
        user: &str,
        channel: Option<&str>,
        contexts: &[String],
        args: &mut [String],
    ) -> ContextBinding {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (i, label) in contexts.iter().enumerate() {
            if label.is_empty() {
                continue;
            }
            let Some(arg) = args.get_mut(i) else {
                continue;
            };
            let key = MemoryKey {
                slot: Slot::Context(label.clone()),
                user: user.to_string(),
                channel: channel.map(str::to_string),
            };
            if arg == PRONOUN || arg.is_empty() {
                match entries.get_mut(&key) {
                    Some(entry) => {
                        trace!(label = %label, value = %entry.value, "resolved context");
                        *arg = entry.value.clone();
                        entry.stored_at = now;
                    },
                    None => {
                        return ContextBinding::Missing {
                            label: label.clone(),
                        };
                    },
                }
            } else {
                entries.insert(
                    key,
                    Entry {
                        value: arg.clone(),
                        stored_at: now,
                    },
                );
            }
        }
        ContextBinding::Bound
    }

    /// Remembered value for a context label, if any.
    pub fn get_context(&self, label: &str, user: &str, channel: Option<&str>) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&MemoryKey {
                slot: Slot::Context(label.to_string()),
                user: user.to_string(),
                channel: channel.map(str::to_string),
            })
            .map(|e| e.value.clone())
    }

    pub fn set_context(&self, label: &str, user: &str, channel: Option<&str>, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            MemoryKey {
                slot: Slot::Context(label.to_string()),
                user: user.to_string(),
                channel: channel.map(str::to_string),
            },
            Entry {
                value: value.to_string(),
                stored_at: Instant::now(),
            },
        );
    }

    pub fn delete_context(&self, label: &str, user: &str, channel: Option<&str>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&MemoryKey {
            slot: Slot::Context(label.to_string()),
            user: user.to_string(),
            channel: channel.map(str::to_string),
        });
    }

    /// The last unmatched message for (user, channel), honoring the listen
    /// window: entries older than the window are treated as absent even if
    /// still stored.
    pub fn recall_last_message(&self, user: &str, channel: Option<&str>) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(&last_message_key(user, channel))?;
        if entry.stored_at.elapsed() < self.listen_window {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn remember_last_message(&self, user: &str, channel: Option<&str>, text: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            last_message_key(user, channel),
            Entry {
                value: text.to_string(),
                stored_at: Instant::now(),
            },
        );
    }

    pub fn forget_last_message(&self, user: &str, channel: Option<&str>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&last_message_key(user, channel));
    }
}

fn last_message_key(user: &str, channel: Option<&str>) -> MemoryKey {
    MemoryKey {
        slot: Slot::LastMessage,
        user: user.to_string(),
        channel: channel.map(str::to_string),
    }
}
