use std::time::Duration;

/// Base error type for git-utils operations.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error("path error: {0}")]
    Path(String),

    #[error("subprocess failed: {command}: {source}")]
    Subprocess {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("subprocess produced no output for {idle:?}: {command}")]
    SubprocessIdle { command: String, idle: Duration },

    #[error("subprocess output exceeded {limit} bytes: {command}")]
    OutputLimit { command: String, limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
