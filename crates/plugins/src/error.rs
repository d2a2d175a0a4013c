use thiserror::Error;

/// Crate-wide result type for plugin configuration.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A matcher pattern failed to compile.
    #[error("plugin \"{plugin}\" command \"{command}\": invalid pattern: {source}")]
    InvalidPattern {
        plugin: String,
        command: String,
        #[source]
        source: regex::Error,
    },

    /// More context labels than capture groups in the pattern.
    #[error(
        "plugin \"{plugin}\" command \"{command}\": {contexts} context labels but pattern has {groups} capture groups"
    )]
    ContextArity {
        plugin: String,
        command: String,
        contexts: usize,
        groups: usize,
    },

    /// Two plugins share a name.
    #[error("duplicate plugin name: {name}")]
    DuplicatePlugin { name: String },

    /// A plugin definition is missing its name.
    #[error("plugin definition without a name")]
    UnnamedPlugin,

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    TomlParse(#[from] toml::de::Error),
}
