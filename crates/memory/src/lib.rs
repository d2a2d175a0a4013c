//! Conversation memory: the short-term store backing pronoun resolution,
//! and the persistent "brain" boundary consumed by plugins.

pub mod brain;
pub mod error;
pub mod short_term;

pub use {
    brain::{Brain, Checkout, InMemoryBrain},
    error::{Error, Result},
    short_term::{ContextBinding, PRONOUN, ShortTermMemory},
};
