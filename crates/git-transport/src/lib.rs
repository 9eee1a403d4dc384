//! Remote addressing for fetches.
//!
//! This crate holds the pieces of the transport boundary that the patch
//! builder needs to reason about: parsed remote URLs, ref specs and the
//! credentials handed to a fetcher. The wire protocol itself is out of scope.

pub mod auth;
pub mod refspec;
pub mod url;

pub use auth::{AuthMethod, AuthSettings};
pub use refspec::RefSpec;

/// Errors that can occur while talking to a remote.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid ref spec: {0}")]
    InvalidRefSpec(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed for {url}")]
    AuthenticationFailed { url: String },

    #[error("remote error: {0}")]
    ServerError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Authentication problems are reported apart from other transport failures.
    pub fn is_authentication(&self) -> bool {
        matches!(self, TransportError::AuthenticationFailed { .. })
    }
}

/// Git URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Ssh,
    Git,
    Http,
    Https,
    File,
    /// Local path without scheme prefix.
    Local,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Scheme::Ssh => "ssh",
            Scheme::Git => "git",
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::File => "file",
            Scheme::Local => "local",
        };
        f.write_str(name)
    }
}

/// Parsed git URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrl {
    pub scheme: Scheme,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub path: String,
}

impl std::fmt::Display for GitUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scheme {
            // scp-like form: [user@]host:path
            Scheme::Ssh if self.port.is_none() && !self.path.starts_with('/') => {
                if let Some(user) = &self.user {
                    write!(f, "{user}@")?;
                }
                write!(f, "{}:{}", self.host.as_deref().unwrap_or(""), self.path)
            }
            Scheme::Local => f.write_str(&self.path),
            Scheme::File => write!(f, "file://{}", self.path),
            _ => {
                write!(f, "{}://", self.scheme)?;
                if let Some(user) = &self.user {
                    write!(f, "{user}@")?;
                }
                if let Some(host) = &self.host {
                    f.write_str(host)?;
                }
                if let Some(port) = self.port {
                    write!(f, ":{port}")?;
                }
                f.write_str(&self.path)
            }
        }
    }
}
