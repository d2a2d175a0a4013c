//! Bundled elevation provider: one-time codes over direct message.
//!
//! The provider DMs the user a fresh 6-digit code and waits for it to come
//! back through the reply-waiter registry. Successful elevations are cached
//! per user for a configured window unless the command demands immediate
//! re-challenge.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex},
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    clatter_common::Connector,
    rand::Rng,
    regex::Regex,
    tracing::{debug, info, warn},
};

use crate::{elevate::Elevator, reply::ReplyWaiters, respond::Responder};

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let pattern = Regex::new(r"^\d{6}$").expect("code pattern is valid");
    pattern
});

/// How a cached elevation ages out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElevationTimeout {
    /// Every allowed elevation refreshes the clock.
    #[default]
    Idle,
    /// The clock runs from the last code entry; cached hits do not
    /// refresh it.
    Absolute,
}

#[derive(Debug, Clone)]
pub struct CodeElevatorConfig {
    /// How long a successful code entry stays valid.
    pub timeout: Duration,
    pub timeout_type: ElevationTimeout,
    /// How long to wait for the user to send the code back.
    pub reply_timeout: Duration,
}

impl Default for CodeElevatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            timeout_type: ElevationTimeout::Idle,
            reply_timeout: Duration::from_secs(30),
        }
    }
}

pub struct CodeElevator {
    connector: Arc<dyn Connector>,
    waiters: Arc<ReplyWaiters>,
    config: CodeElevatorConfig,
    last_elevate: Mutex<HashMap<String, Instant>>,
}

impl CodeElevator {
    pub fn new(
        connector: Arc<dyn Connector>,
        waiters: Arc<ReplyWaiters>,
        config: CodeElevatorConfig,
    ) -> Self {
        Self {
            connector,
            waiters,
            config,
            last_elevate: Mutex::new(HashMap::new()),
        }
    }

    /// Challenge the user over DM and check the reply, with one retry.
    async fn challenge(&self, user: &str, channel: Option<&str>, immediate: bool) -> bool {
        let responder = Responder::new(Arc::clone(&self.connector), user, channel);
        let suffix = if channel.is_some() {
            " - I'll message you directly"
        } else {
            ""
        };
        if immediate {
            responder
                .say(&format!("This command requires immediate elevation{suffix}"))
                .await;
        } else {
            responder
                .say(&format!("This command requires elevation{suffix}"))
                .await;
        }

        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        responder
            .say_direct(&format!("Your one-time code is {code} - please send it back to me"))
            .await;

        let mut reply = self
            .waiters
            .wait(user, None, CODE_PATTERN.clone(), self.config.reply_timeout)
            .await;
        if !matches!(&reply, Ok(r) if r.matched) {
            responder
                .say_direct("Try again? I need the 6-digit code I just sent you")
                .await;
            reply = self
                .waiters
                .wait(user, None, CODE_PATTERN.clone(), self.config.reply_timeout)
                .await;
        }
        match reply {
            Ok(r) if r.matched && r.text == code => true,
            Ok(_) => {
                warn!(user, "elevation code mismatch");
                false
            },
            Err(error) => {
                debug!(user, %error, "no usable elevation reply");
                false
            },
        }
    }
}

#[async_trait]
impl Elevator for CodeElevator {
    async fn elevate(&self, user: &str, channel: Option<&str>, immediate: bool) -> bool {
        if !immediate {
            let cached = {
                let last = self.last_elevate.lock().unwrap_or_else(|e| e.into_inner());
                last.get(user)
                    .is_some_and(|at| at.elapsed() < self.config.timeout)
            };
            if cached {
                if self.config.timeout_type == ElevationTimeout::Idle {
                    let mut last = self.last_elevate.lock().unwrap_or_else(|e| e.into_inner());
                    last.insert(user.to_string(), Instant::now());
                }
                debug!(user, "elevation allowed from cache");
                return true;
            }
        }

        let allowed = self.challenge(user, channel, immediate).await;
        if allowed {
            info!(user, immediate, "elevation granted");
            let mut last = self.last_elevate.lock().unwrap_or_else(|e| e.into_inner());
            last.insert(user.to_string(), Instant::now());
        }
        allowed
    }
}
