//! The `.gitmodules` registry of one commit.

use std::collections::{HashMap, HashSet};

use bstr::{BStr, BString, ByteSlice};
use git_config::ConfigFile;
use git_utils::path;
use tracing::warn;

/// One `[submodule "<name>"]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleDescriptor {
    pub name: String,
    pub path: BString,
    pub url: String,
}

/// Submodules declared by a commit, keyed by path.
#[derive(Debug, Default)]
pub struct SubmodulesConfig {
    by_path: HashMap<BString, SubmoduleDescriptor>,
    direct_parents: HashSet<BString>,
}

impl SubmodulesConfig {
    /// Build from `.gitmodules`; a `submodule.<name>.url` in the repository
    /// config overrides the one in `.gitmodules`.
    pub fn new(repo_config: &ConfigFile, modules: &ConfigFile) -> Self {
        let mut config = SubmodulesConfig::default();
        for name in modules.subsections("submodule") {
            let name = name.to_str_lossy().into_owned();
            let sub = Some(name.as_str());
            let path = modules.get("submodule", sub, "path");
            let url = repo_config
                .get("submodule", sub, "url")
                .or_else(|| modules.get("submodule", sub, "url"));
            let (Some(path), Some(url)) = (path, url) else {
                // Leftover sections often lack one of the two.
                warn!(name = %name, ?path, ?url, "invalid submodule entry");
                continue;
            };
            config.insert(SubmoduleDescriptor {
                name,
                path: path.to_owned(),
                url: url.to_str_lossy().into_owned(),
            });
        }
        config
    }

    fn insert(&mut self, descriptor: SubmoduleDescriptor) {
        self.direct_parents
            .insert(path::parent(&descriptor.path).to_owned());
        self.by_path.insert(descriptor.path.clone(), descriptor);
    }

    pub fn find(&self, path: &BStr) -> Option<&SubmoduleDescriptor> {
        self.by_path.get(path)
    }

    /// True when `path` is the directory directly containing some submodule.
    pub fn is_mount_prefix(&self, path: &BStr) -> bool {
        self.direct_parents.contains(path)
    }

    pub fn url_for(&self, path: &BStr) -> Option<&str> {
        self.find(path).map(|d| d.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ConfigFile {
        ConfigFile::parse(text.as_bytes(), "test").unwrap()
    }

    const MODULES: &str = "\
[submodule \"lib\"]
\tpath = lib
\turl = ../lib.git
[submodule \"tools\"]
\tpath = vendor/tools
\turl = https://example.com/tools.git
[submodule \"stale\"]
\turl = https://example.com/stale.git
";

    #[test]
    fn paths_and_prefixes() {
        let config = SubmodulesConfig::new(&ConfigFile::default(), &parse(MODULES));
        assert_eq!(config.len(), 2);
        assert_eq!(config.url_for(BStr::new("lib")), Some("../lib.git"));
        assert_eq!(config.find(BStr::new("vendor/tools")).unwrap().name, "tools");
        assert!(config.is_mount_prefix(BStr::new("")));
        assert!(config.is_mount_prefix(BStr::new("vendor")));
        assert!(!config.is_mount_prefix(BStr::new("lib")));
        assert!(config.find(BStr::new("stale")).is_none());
    }

    #[test]
    fn repository_config_overrides_url() {
        let repo = parse("[submodule \"lib\"]\n\turl = https://mirror.example.com/lib.git\n");
        let config = SubmodulesConfig::new(&repo, &parse(MODULES));
        assert_eq!(
            config.url_for(BStr::new("lib")),
            Some("https://mirror.example.com/lib.git")
        );
    }
}
