use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Toolchain not available: {0}")]
    ToolchainUnavailable(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors caused by the host environment or by a bug in this crate, as
    /// opposed to a property of the submitted code.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Io(_))
    }
}
