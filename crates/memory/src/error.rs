use thiserror::Error;

/// Crate-wide result type for brain operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Another holder has the key checked out.
    #[error("memory \"{key}\" is checked out elsewhere")]
    Locked { key: String },

    /// The supplied lock token does not match the current checkout.
    #[error("invalid lock token for memory \"{key}\"")]
    InvalidToken { key: String },
}
