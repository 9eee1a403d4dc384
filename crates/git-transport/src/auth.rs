//! Credentials handed to a fetcher.

use crate::GitUrl;

#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthMethod {
    #[default]
    Anonymous,
    Password(String),
    /// Private key material uploaded by the caller.
    PrivateKey {
        key: Vec<u8>,
        passphrase: Option<String>,
    },
}

/// User name plus the method used to authenticate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    pub username: Option<String>,
    pub method: AuthMethod,
}

impl AuthSettings {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    pub fn with_private_key(mut self, key: Vec<u8>) -> Self {
        self.method = AuthMethod::PrivateKey {
            key,
            passphrase: None,
        };
        self
    }

    /// URL actually used for a fetch: the configured user fills in a missing one.
    pub fn apply_to(&self, url: &GitUrl) -> GitUrl {
        match (&self.username, &url.user) {
            (Some(user), None) if url.requires_credentials() => url.with_user(Some(user.clone())),
            _ => url.clone(),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self.method {
            AuthMethod::Anonymous => "anonymous",
            AuthMethod::Password(_) => "password",
            AuthMethod::PrivateKey { .. } => "private-key",
        };
        f.debug_struct("AuthSettings")
            .field("username", &self.username)
            .field("method", &method)
            .finish()
    }
}
