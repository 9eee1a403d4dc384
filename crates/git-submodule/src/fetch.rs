//! Bringing submodule commits into local mirrors.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use git_repository::Repository;
use git_transport::{AuthSettings, GitUrl, RefSpec, Scheme, TransportError};
use tracing::info;

/// Fetches refs and objects from a remote into a local repository.
///
/// Authentication problems must be reported as
/// [`TransportError::AuthenticationFailed`].
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        target: &Repository,
        url: &str,
        ref_specs: &[RefSpec],
        auth: &AuthSettings,
    ) -> Result<(), TransportError>;
}

/// Fetches from repositories reachable without a network: ones registered
/// under a URL, or bare repositories at a local path.
#[derive(Default)]
pub struct LocalFetcher {
    remotes: RwLock<HashMap<String, Remote>>,
}

struct Remote {
    repository: Arc<Repository>,
    required_user: Option<String>,
}

impl LocalFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `repository` for fetches from `url`.
    pub fn add_remote(&self, url: impl Into<String>, repository: Arc<Repository>) {
        self.insert(url.into(), repository, None);
    }

    /// Like [`add_remote`](Self::add_remote), but fetches must authenticate as `user`.
    pub fn add_protected_remote(
        &self,
        url: impl Into<String>,
        repository: Arc<Repository>,
        user: impl Into<String>,
    ) {
        self.insert(url.into(), repository, Some(user.into()));
    }

    fn insert(&self, url: String, repository: Arc<Repository>, required_user: Option<String>) {
        self.remotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                url,
                Remote {
                    repository,
                    required_user,
                },
            );
    }

    fn source_for(&self, url: &str, auth: &AuthSettings) -> Result<Arc<Repository>, TransportError> {
        let remotes = self.remotes.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(remote) = remotes.get(url) {
            if let Some(required) = &remote.required_user {
                let parsed = GitUrl::parse(url)?;
                let user = parsed.user.as_ref().or(auth.username.as_ref());
                if user != Some(required) {
                    return Err(TransportError::AuthenticationFailed {
                        url: url.to_string(),
                    });
                }
            }
            return Ok(Arc::clone(&remote.repository));
        }
        drop(remotes);

        let parsed = GitUrl::parse(url)?;
        match parsed.scheme {
            Scheme::Local | Scheme::File => Repository::open(&parsed.path)
                .map(Arc::new)
                .map_err(|e| TransportError::ConnectionFailed(format!("{url}: {e}"))),
            other => Err(TransportError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl Fetcher for LocalFetcher {
    fn fetch(
        &self,
        target: &Repository,
        url: &str,
        ref_specs: &[RefSpec],
        auth: &AuthSettings,
    ) -> Result<(), TransportError> {
        let source = self.source_for(url, auth)?;
        let io = |e: git_odb::OdbError| TransportError::ServerError(e.to_string());

        let mut copied = 0usize;
        for oid in source.store().list().map_err(io)? {
            if target.has_object(&oid) {
                continue;
            }
            let Some(loader) = source.store().open(&oid).map_err(io)? else {
                continue;
            };
            let data = loader.read_all()?;
            target
                .store()
                .write_raw(loader.object_type(), &data)
                .map_err(io)?;
            copied += 1;
        }

        let mut updated = 0usize;
        for (name, oid) in source.refs() {
            for spec in ref_specs {
                if let Some(local) = spec.map(&name) {
                    target
                        .update_ref(&local, oid)
                        .map_err(|e| TransportError::ServerError(e.to_string()))?;
                    updated += 1;
                }
            }
        }
        info!(url, copied, updated, "fetched from local remote");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::ObjectType;

    fn remote_with_blob() -> (Arc<Repository>, git_hash::ObjectId) {
        let repo = Repository::in_memory("remote", None);
        let oid = repo.store().write_raw(ObjectType::Blob, b"payload").unwrap();
        repo.update_ref("refs/heads/main", oid).unwrap();
        (Arc::new(repo), oid)
    }

    #[test]
    fn copies_objects_and_refs() {
        let (remote, oid) = remote_with_blob();
        let fetcher = LocalFetcher::new();
        fetcher.add_remote("https://example.com/lib.git", remote);

        let target = Repository::in_memory("mirror", None);
        fetcher
            .fetch(
                &target,
                "https://example.com/lib.git",
                &[RefSpec::mirror_all()],
                &AuthSettings::anonymous(),
            )
            .unwrap();
        assert!(target.has_object(&oid));
        assert_eq!(target.find_ref("refs/heads/main"), Some(oid));
    }

    #[test]
    fn unknown_remote_fails() {
        let fetcher = LocalFetcher::new();
        let target = Repository::in_memory("mirror", None);
        let err = fetcher
            .fetch(&target, "https://nowhere.example.com/x.git", &[], &AuthSettings::anonymous())
            .unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme(_)));
    }

    #[test]
    fn protected_remote_requires_user() {
        let (remote, oid) = remote_with_blob();
        let fetcher = LocalFetcher::new();
        fetcher.add_protected_remote("https://example.com/lib.git", remote, "ci");
        let target = Repository::in_memory("mirror", None);
        let url = "https://example.com/lib.git";

        let err = fetcher
            .fetch(&target, url, &[], &AuthSettings::anonymous())
            .unwrap_err();
        assert!(err.is_authentication());

        let auth = AuthSettings::anonymous().with_username(Some("ci".into()));
        fetcher.fetch(&target, url, &[], &auth).unwrap();
        assert!(target.has_object(&oid));
    }
}
