/// Errors that can occur while reading config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("parse error in {file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("invalid boolean value: {0}")]
    InvalidBool(String),
}
