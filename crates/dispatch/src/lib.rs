//! The dispatch core: command/ambient matching with pronoun resolution,
//! authorization and elevation gating, reply-waiter rendezvous, and
//! pause/shutdown-aware scheduling of plugin invocations.
//!
//! The [`Dispatcher`] owns no global state; every collaborator (registry,
//! memory, waiters, lifecycle, runner, connector) is an explicitly wired,
//! internally synchronized service object.

pub mod authorize;
pub mod code_elevator;
pub mod dispatcher;
pub mod elevate;
pub mod error;
pub mod lifecycle;
mod matcher;
pub mod reply;
pub mod respond;

pub use {
    code_elevator::{CodeElevator, CodeElevatorConfig, ElevationTimeout},
    dispatcher::{Dispatcher, DispatcherConfig},
    elevate::Elevator,
    error::{Error, Result},
    lifecycle::{Admission, Lifecycle, Refusal, RunningGuard},
    reply::{Reply, ReplyWaiters},
    respond::Responder,
};

/// Reserved command given to an authorizer plugin.
pub const AUTHORIZE_COMMAND: &str = "authorize";
/// Reserved command given to catch-all plugins with the raw text as its
/// single argument.
pub const CATCHALL_COMMAND: &str = "catchall";
/// Reserved command admitted even while paused or shutting down.
pub const ABORT_COMMAND: &str = "abort";
