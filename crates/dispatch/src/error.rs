use thiserror::Error;

/// Crate-wide result type for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No reply arrived before the waiter's deadline.
    #[error("timed out waiting for a reply from \"{user}\"")]
    ReplyTimeout { user: String },

    /// A newer waiter registration for the same (user, channel) replaced
    /// this one.
    #[error("reply wait superseded by a newer registration")]
    ReplySuperseded,

    /// The user issued a command while this waiter was pending; the wait
    /// is aborted and the command runs instead.
    #[error("reply wait interrupted by a new command")]
    ReplyInterrupted,
}
