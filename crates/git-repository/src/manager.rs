//! Mapping of remote URLs to local mirror repositories.
//!
//! Every mirror lives in its own directory under the caches dir. Work on a
//! mirror is serialized through a per-directory read/write lock. Fetches and
//! removal take it exclusively; commit lookups after a fetch share it. While
//! a mirror is in use it can be protected from cleanup with
//! [`RepositoryManager::run_with_disabled_remove`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use git_hash::hasher::Hasher;
use git_hash::HashAlgorithm;
use tracing::{debug, info};

use crate::{RepoError, Repository};

pub struct RepositoryManager {
    caches_dir: PathBuf,
    in_memory: bool,
    repositories: Mutex<HashMap<PathBuf, Arc<Repository>>>,
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
    remove_disabled: Mutex<HashMap<PathBuf, usize>>,
}

impl RepositoryManager {
    /// Mirrors are created as bare repositories under `caches_dir`.
    pub fn new(caches_dir: impl Into<PathBuf>) -> Self {
        Self::build(caches_dir.into(), false)
    }

    /// Mirrors are created in memory; directories are only keys.
    pub fn in_memory() -> Self {
        Self::build(PathBuf::from("mem"), true)
    }

    fn build(caches_dir: PathBuf, in_memory: bool) -> Self {
        RepositoryManager {
            caches_dir,
            in_memory,
            repositories: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            remove_disabled: Mutex::new(HashMap::new()),
        }
    }

    pub fn caches_dir(&self) -> &Path {
        &self.caches_dir
    }

    /// Mirror directory for `url`: `git-<first 8 hex digits of sha1(url)>.git`.
    pub fn dir_for_url(&self, url: &str) -> PathBuf {
        let name = match Hasher::digest(HashAlgorithm::Sha1, url.as_bytes()) {
            Ok(oid) => format!("git-{}.git", &oid.to_hex()[..8]),
            Err(_) => format!("git-{}.git", url.len()),
        };
        self.caches_dir.join(name)
    }

    /// Register an already opened repository as the mirror of `url`.
    pub fn register(&self, url: &str, repository: Arc<Repository>) {
        let dir = self.dir_for_url(url);
        debug!(url, dir = %dir.display(), "registered repository");
        lock(&self.repositories).insert(dir, repository);
    }

    /// The mirror of `url`, created empty when it does not exist yet.
    pub fn get_or_create(&self, url: &str) -> Result<Arc<Repository>, RepoError> {
        let dir = self.dir_for_url(url);
        let mut repositories = lock(&self.repositories);
        if let Some(repo) = repositories.get(&dir) {
            return Ok(Arc::clone(repo));
        }
        let repo = if self.in_memory {
            Repository::in_memory(dir.clone(), Some(url))
        } else {
            Repository::init_bare(&dir, Some(url))?
        };
        info!(url, dir = %dir.display(), "created mirror repository");
        let repo = Arc::new(repo);
        repositories.insert(dir, Arc::clone(&repo));
        Ok(repo)
    }

    /// Read/write lock guarding one mirror directory.
    pub fn lock_for(&self, dir: &Path) -> Arc<RwLock<()>> {
        Arc::clone(
            lock(&self.locks)
                .entry(dir.to_path_buf())
                .or_insert_with(|| Arc::new(RwLock::new(()))),
        )
    }

    /// Run `f` while the mirror in `dir` cannot be removed.
    pub fn run_with_disabled_remove<T>(&self, dir: &Path, f: impl FnOnce() -> T) -> T {
        let _guard = RemoveGuard::new(self, dir);
        f()
    }

    pub fn is_remove_disabled(&self, dir: &Path) -> bool {
        lock(&self.remove_disabled).get(dir).is_some_and(|n| *n > 0)
    }

    /// Forget the mirror of `url` and delete its directory.
    ///
    /// Returns `false` when there was nothing to remove.
    pub fn remove(&self, url: &str) -> Result<bool, RepoError> {
        let dir = self.dir_for_url(url);
        let dir_lock = self.lock_for(&dir);
        let _exclusive = dir_lock.write().unwrap_or_else(PoisonError::into_inner);
        // Held until the directory is gone so no guard slips in between.
        let disabled = lock(&self.remove_disabled);
        if disabled.get(&dir).is_some_and(|n| *n > 0) {
            return Err(RepoError::InUse(dir));
        }
        let known = lock(&self.repositories).remove(&dir).is_some();
        let on_disk = !self.in_memory && dir.is_dir();
        if on_disk {
            std::fs::remove_dir_all(&dir)?;
        }
        if known || on_disk {
            info!(url, dir = %dir.display(), "removed mirror repository");
        }
        Ok(known || on_disk)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a mirror directory from being removed while alive.
struct RemoveGuard<'a> {
    manager: &'a RepositoryManager,
    dir: PathBuf,
}

impl<'a> RemoveGuard<'a> {
    fn new(manager: &'a RepositoryManager, dir: &Path) -> Self {
        *lock(&manager.remove_disabled)
            .entry(dir.to_path_buf())
            .or_insert(0) += 1;
        RemoveGuard {
            manager,
            dir: dir.to_path_buf(),
        }
    }
}

impl Drop for RemoveGuard<'_> {
    fn drop(&mut self) {
        let mut counts = lock(&self.manager.remove_disabled);
        if let Some(n) = counts.get_mut(&self.dir) {
            *n -= 1;
            if *n == 0 {
                counts.remove(&self.dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_maps_to_stable_directory() {
        let manager = RepositoryManager::new("/caches");
        let a = manager.dir_for_url("https://example.com/a.git");
        assert_eq!(a, manager.dir_for_url("https://example.com/a.git"));
        assert_ne!(a, manager.dir_for_url("https://example.com/b.git"));
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("git-") && name.ends_with(".git"));
        assert_eq!(name.len(), "git-".len() + 8 + ".git".len());
    }

    #[test]
    fn get_or_create_reuses_repository() {
        let manager = RepositoryManager::in_memory();
        let first = manager.get_or_create("https://example.com/a.git").unwrap();
        let second = manager.get_or_create("https://example.com/a.git").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.remote_url().as_deref(), Some("https://example.com/a.git"));
    }

    #[test]
    fn disabled_remove_is_scoped() {
        let manager = RepositoryManager::in_memory();
        let url = "https://example.com/a.git";
        manager.get_or_create(url).unwrap();
        let dir = manager.dir_for_url(url);

        manager.run_with_disabled_remove(&dir, || {
            assert!(manager.is_remove_disabled(&dir));
            manager.run_with_disabled_remove(&dir, || {
                assert!(matches!(manager.remove(url), Err(RepoError::InUse(_))));
            });
            assert!(manager.is_remove_disabled(&dir));
        });
        assert!(!manager.is_remove_disabled(&dir));
        assert!(manager.remove(url).unwrap());
        assert!(!manager.remove(url).unwrap());
    }

    #[test]
    fn remove_waiting_for_a_fetch_respects_a_later_guard() {
        let manager = RepositoryManager::in_memory();
        let url = "https://example.com/a.git";
        manager.get_or_create(url).unwrap();
        let dir = manager.dir_for_url(url);
        let dir_lock = manager.lock_for(&dir);
        let fetching = dir_lock.write().unwrap();

        std::thread::scope(|s| {
            let remover = s.spawn(|| manager.remove(url));
            std::thread::sleep(std::time::Duration::from_millis(50));
            manager.run_with_disabled_remove(&dir, || {
                drop(fetching);
                assert!(matches!(remover.join().unwrap(), Err(RepoError::InUse(_))));
            });
        });
        assert!(manager.remove(url).unwrap());
    }

    #[test]
    fn on_disk_mirrors() {
        let caches = tempfile::tempdir().unwrap();
        let manager = RepositoryManager::new(caches.path());
        let url = "https://example.com/a.git";
        let repo = manager.get_or_create(url).unwrap();
        assert!(repo.git_dir().join("objects").is_dir());
        assert!(manager.remove(url).unwrap());
        assert!(!repo.git_dir().exists());
    }

    #[test]
    fn locks_are_per_directory() {
        let manager = RepositoryManager::in_memory();
        let a = manager.lock_for(Path::new("a"));
        let b = manager.lock_for(Path::new("b"));
        let _wa = a.write().unwrap();
        assert!(b.try_write().is_ok());
        assert!(manager.lock_for(Path::new("a")).try_read().is_err());
    }
}
