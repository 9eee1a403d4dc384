//! Resolving gitlinks into submodule commits.

use std::cell::OnceCell;
use std::sync::{Arc, PoisonError};

use bstr::{BStr, BString, ByteSlice};
use git_config::ConfigFile;
use git_hash::ObjectId;
use git_object::Commit;
use git_odb::ObjectReader;
use git_repository::{Repository, RepositoryManager};
use git_transport::{AuthSettings, RefSpec};
use git_utils::path;
use tracing::{debug, error, info};

use crate::config::SubmodulesConfig;
use crate::fetch::Fetcher;
use crate::url::resolve_submodule_url;
use crate::SubmoduleError;

const GITMODULES: &str = ".gitmodules";

/// Services shared by every resolver of one build.
pub struct SubmoduleContext {
    pub manager: Arc<RepositoryManager>,
    pub fetcher: Arc<dyn Fetcher>,
    pub auth: AuthSettings,
    pub set_user_in_absolute_urls: bool,
}

impl SubmoduleContext {
    pub fn new(manager: Arc<RepositoryManager>, fetcher: Arc<dyn Fetcher>) -> Self {
        SubmoduleContext {
            manager,
            fetcher,
            auth: AuthSettings::anonymous(),
            set_user_in_absolute_urls: false,
        }
    }

    pub fn with_auth(mut self, auth: AuthSettings) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_user_in_absolute_urls(mut self, enabled: bool) -> Self {
        self.set_user_in_absolute_urls = enabled;
        self
    }
}

/// A submodule commit located in its mirror repository.
#[derive(Debug, Clone)]
pub struct ResolvedSubmodule {
    pub repository: Arc<Repository>,
    pub commit_id: ObjectId,
    pub commit: Commit,
}

/// Resolves the submodules of one commit of one repository.
///
/// The `.gitmodules` of the commit is read on first use. A resolver for a
/// nested submodule is obtained with [`child_resolver`](Self::child_resolver).
pub struct SubmoduleResolver {
    context: Arc<SubmoduleContext>,
    repository: Arc<Repository>,
    reader: ObjectReader,
    commit_id: ObjectId,
    commit: Commit,
    path_from_root: BString,
    config: OnceCell<Option<SubmodulesConfig>>,
}

impl SubmoduleResolver {
    /// Resolver for `commit` of `repository`, mounted at `path_from_root`
    /// (empty for the root repository).
    pub fn new(
        context: Arc<SubmoduleContext>,
        repository: Arc<Repository>,
        commit_id: ObjectId,
        commit: Commit,
        path_from_root: impl Into<BString>,
    ) -> Self {
        let reader = repository.reader("tree traversal");
        SubmoduleResolver {
            context,
            repository,
            reader,
            commit_id,
            commit,
            path_from_root: path_from_root.into(),
            config: OnceCell::new(),
        }
    }

    pub fn context(&self) -> &Arc<SubmoduleContext> {
        &self.context
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Reader used for walking trees of this repository.
    pub fn reader(&self) -> &ObjectReader {
        &self.reader
    }

    pub fn commit_id(&self) -> &ObjectId {
        &self.commit_id
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    /// Mount point of this repository relative to the root repository.
    pub fn path_from_root(&self) -> &BStr {
        self.path_from_root.as_bstr()
    }

    /// URL the repository was fetched from, or its directory when it has no remote.
    pub fn main_url(&self) -> String {
        self.repository
            .remote_url()
            .unwrap_or_else(|| self.repository.git_dir().display().to_string())
    }

    fn config(&self) -> Option<&SubmodulesConfig> {
        self.config.get_or_init(|| self.load_config()).as_ref()
    }

    fn load_config(&self) -> Option<SubmodulesConfig> {
        let bytes = match self.read_gitmodules() {
            Ok(bytes) => bytes?,
            Err(e) => {
                error!(commit = %self.commit_id, error = %e, "cannot read .gitmodules");
                return None;
            }
        };
        match ConfigFile::parse(&bytes, GITMODULES) {
            Ok(modules) => {
                let config = SubmodulesConfig::new(self.repository.config(), &modules);
                debug!(commit = %self.commit_id, submodules = config.len(), "loaded .gitmodules");
                Some(config)
            }
            Err(e) => {
                error!(commit = %self.commit_id, error = %e, "cannot parse .gitmodules");
                None
            }
        }
    }

    fn read_gitmodules(&self) -> Result<Option<Vec<u8>>, SubmoduleError> {
        let tree = self.reader.read_tree(&self.commit.tree)?;
        let Some(entry) = tree.find(BStr::new(GITMODULES)) else {
            return Ok(None);
        };
        if entry.mode.is_tree() || entry.mode.is_gitlink() {
            return Ok(None);
        }
        let Some(loader) = self.reader.open_blob(&entry.oid)? else {
            return Ok(None);
        };
        Ok(Some(loader.read_all().map_err(git_odb::OdbError::from)?))
    }

    /// True when the directory `path` (relative to this repository)
    /// directly contains a declared submodule.
    pub fn contains_submodule(&self, path: &BStr) -> bool {
        self.config().is_some_and(|c| c.is_mount_prefix(path))
    }

    /// Declared URL of the submodule at `path`, as written in the config.
    pub fn url_for(&self, path: &BStr) -> Option<&str> {
        self.config().and_then(|c| c.url_for(path))
    }

    /// Locate `commit` of the submodule at `path` (relative to this
    /// repository), fetching it into the submodule's mirror when missing.
    ///
    /// `parent_url` is only used in error messages.
    pub fn resolve(
        &self,
        parent_url: &str,
        path: &BStr,
        commit: &ObjectId,
    ) -> Result<ResolvedSubmodule, SubmoduleError> {
        let config = self.config().ok_or_else(|| SubmoduleError::MissingConfig {
            main_url: parent_url.to_string(),
            main_commit: self.commit_id,
            path: path.to_string(),
        })?;
        let descriptor = config.find(path).ok_or_else(|| SubmoduleError::MissingEntry {
            main_url: parent_url.to_string(),
            main_commit: self.commit_id,
            path: path.to_string(),
        })?;
        let url = self.resolve_url(&descriptor.url)?;

        let manager = &self.context.manager;
        let dir = manager.dir_for_url(&url);
        manager.run_with_disabled_remove(&dir, || {
            let repository = manager.get_or_create(&url)?;
            if !repository.has_object(commit) {
                self.fetch(&repository, parent_url, path, &url)?;
            }
            let missing = || SubmoduleError::MissingCommit {
                main_url: parent_url.to_string(),
                main_commit: self.commit_id,
                path: path.to_string(),
                url: url.clone(),
                commit: *commit,
            };
            let loaded = {
                let dir_lock = manager.lock_for(repository.git_dir());
                let _shared = dir_lock.read().unwrap_or_else(PoisonError::into_inner);
                repository.reader("submodule commit").read_commit(commit)
            };
            match loaded {
                Ok(Some(loaded)) => Ok(ResolvedSubmodule {
                    repository,
                    commit_id: *commit,
                    commit: loaded,
                }),
                Ok(None) => Err(missing()),
                Err(e) => {
                    debug!(commit = %commit, error = %e, "cannot load submodule commit");
                    Err(missing())
                }
            }
        })
    }

    fn resolve_url(&self, submodule_url: &str) -> Result<String, SubmoduleError> {
        resolve_submodule_url(
            &self.main_url(),
            submodule_url,
            self.context.set_user_in_absolute_urls,
        )
        .map_err(|source| SubmoduleError::InvalidUrl {
            url: submodule_url.to_string(),
            source,
        })
    }

    fn fetch(
        &self,
        repository: &Repository,
        parent_url: &str,
        path: &BStr,
        url: &str,
    ) -> Result<(), SubmoduleError> {
        let dir_lock = self.context.manager.lock_for(repository.git_dir());
        let _exclusive = dir_lock.write().unwrap_or_else(PoisonError::into_inner);
        let path_from_root = path::join(&self.path_from_root, path);
        info!(url, path = %path_from_root, "fetching submodule");
        self.context
            .fetcher
            .fetch(repository, url, &[RefSpec::mirror_all()], &self.context.auth)
            .map_err(|source| SubmoduleError::Fetch {
                main_url: parent_url.to_string(),
                path: path.to_string(),
                path_from_root: path_from_root.to_string(),
                url: url.to_string(),
                source,
            })
    }

    /// Resolver for the submodule at `path`, whose commit was resolved to
    /// `resolved`.
    pub fn child_resolver(&self, resolved: &ResolvedSubmodule, path: &BStr) -> SubmoduleResolver {
        SubmoduleResolver::new(
            Arc::clone(&self.context),
            Arc::clone(&resolved.repository),
            resolved.commit_id,
            resolved.commit.clone(),
            path::join(&self.path_from_root, path),
        )
    }
}
