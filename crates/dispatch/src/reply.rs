//! Reply-waiter rendezvous: at most one pending reply per (user, channel).
//!
//! A plugin body registers a one-shot waiter and blocks (its own task only)
//! until the dispatcher delivers the next message from that user, or the
//! timeout elapses. Delivery removes the registry entry first, so a reply
//! is delivered at most once.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    regex::Regex,
    tokio::sync::oneshot,
    tracing::{debug, trace, warn},
};

use crate::error::{Error, Result};

/// What a waiter receives when its user speaks again.
#[derive(Debug)]
enum Event {
    /// A command matched concurrently; the wait is aborted.
    Interrupted,
    /// The candidate reply text, plus whether it matched the waiter's
    /// own pattern. The caller decides how to proceed on a mismatch.
    Message { text: String, matched: bool },
}

/// A delivered reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub matched: bool,
}

struct Waiter {
    pattern: Regex,
    tx: oneshot::Sender<Event>,
    token: u64,
}

type Key = (String, Option<String>);

/// Registry of pending reply waiters.
///
/// A new registration for the same (user, channel) supersedes the previous
/// one; the superseded waiter resolves immediately with
/// [`Error::ReplySuperseded`] rather than silently running out its clock.
#[derive(Default)]
pub struct ReplyWaiters {
    inner: Mutex<HashMap<Key, Waiter>>,
    next_token: AtomicU64,
}

impl ReplyWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter and block until delivery or timeout. Only the
    /// calling task suspends; the dispatcher is never blocked by a wait.
    pub async fn wait(
        &self,
        user: &str,
        channel: Option<&str>,
        pattern: Regex,
        timeout: Duration,
    ) -> Result<Reply> {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let key = (user.to_string(), channel.map(str::to_string));
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner
                .insert(key.clone(), Waiter { pattern, tx, token })
                .is_some()
            {
                // Dropping the old sender resolves the old waiter at once.
                warn!(user = %user, channel = ?channel, "reply waiter superseded");
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Event::Message { text, matched })) => Ok(Reply { text, matched }),
            Ok(Ok(Event::Interrupted)) => Err(Error::ReplyInterrupted),
            Ok(Err(_)) => Err(Error::ReplySuperseded),
            Err(_) => {
                // Remove our own entry only; a newer waiter may have
                // replaced it while we slept.
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                if inner.get(&key).is_some_and(|w| w.token == token) {
                    inner.remove(&key);
                }
                Err(Error::ReplyTimeout {
                    user: user.to_string(),
                })
            },
        }
    }

    /// Dispatcher-side delivery. Removes the waiter (at-most-once) and
    /// hands it either an interruption (a command matched this message) or
    /// the candidate text. Returns whether a waiter consumed the message.
    pub fn deliver(
        &self,
        user: &str,
        channel: Option<&str>,
        text: &str,
        command_matched: bool,
    ) -> bool {
        let waiter = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.remove(&(user.to_string(), channel.map(str::to_string)))
        };
        let Some(waiter) = waiter else {
            trace!(user = %user, channel = ?channel, "no pending reply waiter");
            return false;
        };
        let event = if command_matched {
            debug!(user = %user, channel = ?channel, "waiter interrupted by a new command");
            Event::Interrupted
        } else {
            let matched = waiter.pattern.is_match(text);
            debug!(user = %user, channel = ?channel, matched, "delivering reply to waiter");
            Event::Message {
                text: text.to_string(),
                matched,
            }
        };
        // The waiter may have timed out in the gap; nothing to do then.
        let _ = waiter.tx.send(event);
        true
    }
}
