use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use git_config::ConfigFile;
use git_hash::ObjectId;
use git_odb::{LooseStore, MemoryStore, ObjectReader, ObjectStore};
use tracing::debug;

use crate::RepoError;

/// A bare repository: an object store, its config and its refs.
pub struct Repository {
    git_dir: PathBuf,
    in_memory: bool,
    store: Arc<dyn ObjectStore>,
    config: ConfigFile,
    refs: RwLock<BTreeMap<String, ObjectId>>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("in_memory", &self.in_memory)
            .field("remote_url", &self.remote_url())
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open an existing bare repository at `git_dir`.
    pub fn open(git_dir: impl AsRef<Path>) -> Result<Self, RepoError> {
        let git_dir = git_dir.as_ref().to_path_buf();
        if !git_dir.join("objects").is_dir() {
            return Err(RepoError::NotFound(git_dir));
        }
        let config = match fs::read(git_dir.join("config")) {
            Ok(bytes) => ConfigFile::parse(&bytes, &git_dir.join("config").to_string_lossy())?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::default(),
            Err(e) => return Err(e.into()),
        };
        let refs = read_refs(&git_dir)?;
        debug!(git_dir = %git_dir.display(), refs = refs.len(), "opened repository");
        Ok(Repository {
            store: Arc::new(LooseStore::open(git_dir.join("objects"))),
            git_dir,
            in_memory: false,
            config,
            refs: RwLock::new(refs),
        })
    }

    /// Create a bare repository whose `origin` points at `remote_url`,
    /// or open it when it already exists.
    pub fn init_bare(git_dir: impl AsRef<Path>, remote_url: Option<&str>) -> Result<Self, RepoError> {
        let git_dir = git_dir.as_ref();
        if git_dir.join("HEAD").is_file() {
            return Self::open(git_dir);
        }
        fs::create_dir_all(git_dir.join("objects").join("info"))?;
        fs::create_dir_all(git_dir.join("refs").join("heads"))?;
        fs::create_dir_all(git_dir.join("refs").join("tags"))?;
        fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n")?;

        let mut config = String::from("[core]\n\trepositoryformatversion = 0\n\tbare = true\n");
        if let Some(url) = remote_url {
            config.push_str("[remote \"origin\"]\n\turl = ");
            config.push_str(&quote_value(url));
            config.push('\n');
        }
        fs::write(git_dir.join("config"), config)?;
        debug!(git_dir = %git_dir.display(), "initialized bare repository");
        Self::open(git_dir)
    }

    /// A repository whose objects live only in memory. `git_dir` is a label.
    pub fn in_memory(git_dir: impl Into<PathBuf>, remote_url: Option<&str>) -> Self {
        Self::with_store(git_dir, Arc::new(MemoryStore::new()), remote_url)
    }

    /// A repository over an existing store, not backed by a directory.
    pub fn with_store(
        git_dir: impl Into<PathBuf>,
        store: Arc<dyn ObjectStore>,
        remote_url: Option<&str>,
    ) -> Self {
        let config = match remote_url {
            Some(url) => {
                let text = format!("[remote \"origin\"]\n\turl = {}\n", quote_value(url));
                ConfigFile::parse(text.as_bytes(), "config").unwrap_or_default()
            }
            None => ConfigFile::default(),
        };
        Repository {
            git_dir: git_dir.into(),
            in_memory: true,
            store,
            config,
            refs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Replace the repository config (in-memory repositories only keep it in memory).
    pub fn set_config(&mut self, config: ConfigFile) {
        self.config = config;
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// URL of the `origin` remote.
    pub fn remote_url(&self) -> Option<String> {
        self.config
            .get("remote", Some("origin"), "url")
            .map(|v| v.to_string())
    }

    /// Scoped reader over this repository's objects.
    pub fn reader(&self, purpose: &'static str) -> ObjectReader {
        ObjectReader::new(Arc::clone(&self.store), purpose)
    }

    pub fn has_object(&self, oid: &ObjectId) -> bool {
        self.store.contains(oid)
    }

    /// Every ref with its target, sorted by name.
    pub fn refs(&self) -> Vec<(String, ObjectId)> {
        self.refs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, oid)| (name.clone(), *oid))
            .collect()
    }

    pub fn find_ref(&self, name: &str) -> Option<ObjectId> {
        self.refs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Point `name` at `oid`, writing a loose ref for on-disk repositories.
    pub fn update_ref(&self, name: &str, oid: ObjectId) -> Result<(), RepoError> {
        if !name.starts_with("refs/") || name.split('/').any(|c| c.is_empty() || c == "..") {
            return Err(RepoError::InvalidRef {
                name: name.to_string(),
                reason: "must be a normalized name under refs/".into(),
            });
        }
        if !self.in_memory {
            let path = self.git_dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, format!("{}\n", oid.to_hex()))?;
        }
        self.refs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), oid);
        Ok(())
    }
}

fn quote_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Loose refs under `refs/` plus `packed-refs`; loose refs win.
fn read_refs(git_dir: &Path) -> Result<BTreeMap<String, ObjectId>, RepoError> {
    let mut refs = BTreeMap::new();
    match fs::read_to_string(git_dir.join("packed-refs")) {
        Ok(text) => {
            for line in text.lines() {
                if line.starts_with('#') || line.starts_with('^') {
                    continue;
                }
                if let Some((hex, name)) = line.split_once(' ') {
                    if let Ok(oid) = ObjectId::from_hex(hex) {
                        refs.insert(name.to_string(), oid);
                    }
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let mut pending = vec![git_dir.join("refs")];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let content = fs::read_to_string(&path)?;
            // Symbolic refs are not tracked.
            let Ok(oid) = ObjectId::from_hex(content.trim()) else {
                continue;
            };
            if let Ok(rel) = path.strip_prefix(git_dir) {
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                refs.insert(name, oid);
            }
        }
    }
    Ok(refs)
}
