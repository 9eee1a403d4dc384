//! Repository builders shared by the patch integration tests.
//!
//! Everything lives in memory: repositories are served to the submodule
//! resolver through a [`LocalFetcher`] under `https://example.com/<name>.git`.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use bstr::BStr;
use git_hash::ObjectId;
use git_object::{Commit, FileMode, ObjectType, Tree, TreeEntry};
use git_patch::{
    BuildSettings, CheckoutRules, FileAction, PatchAction, PatchBuilder, PatchError, RecordingSink,
};
use git_repository::{Repository, RepositoryManager};
use git_submodule::{LocalFetcher, SubmoduleContext, SubmodulePolicy};

/// One path of a commit.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    File(&'a str),
    Exec(&'a str),
    Mount(ObjectId),
}

pub fn url(name: &str) -> String {
    format!("https://example.com/{name}.git")
}

/// `.gitmodules` declaring each `(path, url)`.
pub fn gitmodules(mounts: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (path, url) in mounts {
        out.push_str(&format!("[submodule \"{path}\"]\n\tpath = {path}\n\turl = {url}\n"));
    }
    out
}

fn write_tree(repo: &Repository, entries: &[(&str, Entry<'_>)]) -> ObjectId {
    let mut tree = Tree::new();
    let mut dirs: BTreeMap<&str, Vec<(&str, Entry<'_>)>> = BTreeMap::new();
    for (path, entry) in entries {
        if let Some((dir, rest)) = path.split_once('/') {
            dirs.entry(dir).or_default().push((rest, *entry));
            continue;
        }
        let (mode, oid) = match entry {
            Entry::File(data) => (FileMode::Regular, blob(repo, data)),
            Entry::Exec(data) => (FileMode::Executable, blob(repo, data)),
            Entry::Mount(commit) => (FileMode::Gitlink, *commit),
        };
        tree.entries.push(TreeEntry::new(mode, *path, oid));
    }
    for (dir, sub) in dirs {
        let oid = write_tree(repo, &sub);
        tree.entries.push(TreeEntry::new(FileMode::Tree, dir, oid));
    }
    repo.store()
        .write_raw(ObjectType::Tree, &tree.serialize_content())
        .unwrap()
}

pub fn blob(repo: &Repository, data: &str) -> ObjectId {
    repo.store().write_raw(ObjectType::Blob, data.as_bytes()).unwrap()
}

/// Commit a tree holding exactly `entries`; `/` in a path makes directories.
pub fn commit(repo: &Repository, entries: &[(&str, Entry<'_>)]) -> ObjectId {
    let commit = Commit {
        tree: write_tree(repo, entries),
        parents: vec![],
        author: "A <a@example.com> 0 +0000".into(),
        committer: "A <a@example.com> 0 +0000".into(),
        message: "test\n".into(),
    };
    repo.store()
        .write_raw(ObjectType::Commit, &commit.serialize_content())
        .unwrap()
}

/// A main repository plus the remotes its submodules point at.
pub struct World {
    pub manager: Arc<RepositoryManager>,
    pub fetcher: Arc<LocalFetcher>,
    pub main: Arc<Repository>,
}

impl World {
    pub fn new() -> Self {
        World {
            manager: Arc::new(RepositoryManager::in_memory()),
            fetcher: Arc::new(LocalFetcher::new()),
            main: Arc::new(Repository::in_memory("main", Some(&url("main")))),
        }
    }

    /// An empty repository served as `https://example.com/<name>.git`.
    pub fn remote(&self, name: &str) -> Arc<Repository> {
        let repo = Arc::new(Repository::in_memory(name, Some(&url(name))));
        self.fetcher.add_remote(url(name), Arc::clone(&repo));
        repo
    }

    /// A repository nobody can fetch from.
    pub fn unreachable(&self, name: &str) -> Arc<Repository> {
        Arc::new(Repository::in_memory(name, Some(&url(name))))
    }

    pub fn context(&self) -> Arc<SubmoduleContext> {
        Arc::new(SubmoduleContext::new(
            Arc::clone(&self.manager),
            Arc::clone(&self.fetcher) as Arc<dyn git_submodule::Fetcher>,
        ))
    }

    pub fn builder(&self, policy: SubmodulePolicy, rules: &str) -> PatchBuilder {
        self.builder_for(&self.main, policy, rules)
    }

    pub fn builder_for(&self, root: &Arc<Repository>, policy: SubmodulePolicy, rules: &str) -> PatchBuilder {
        let settings = BuildSettings {
            policy,
            rules: CheckoutRules::parse(rules).unwrap(),
            ..BuildSettings::default()
        };
        PatchBuilder::new(self.context(), Arc::clone(root), settings)
    }
}

/// Sink actions and listener events of one build.
#[derive(Debug, Default)]
pub struct Outcome {
    pub actions: Vec<PatchAction>,
    pub events: Vec<(FileAction, String)>,
}

impl Outcome {
    pub fn paths(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.path().to_string()).collect()
    }

    pub fn content_of(&self, path: &str) -> Option<String> {
        self.actions.iter().find_map(|a| match a {
            PatchAction::CreateOrChange { path: p, content, .. } if p == path => {
                Some(String::from_utf8_lossy(content).into_owned())
            }
            _ => None,
        })
    }
}

pub fn run(builder: &PatchBuilder, from: Option<ObjectId>, to: ObjectId) -> Result<Outcome, PatchError> {
    let mut sink = RecordingSink::new();
    let mut events = Vec::new();
    let mut listener = |action: FileAction, path: &BStr| events.push((action, path.to_string()));
    builder.build(from, to, &mut sink, &mut listener)?;
    Ok(Outcome {
        actions: sink.actions,
        events,
    })
}

pub fn changed(path: &str, content: &str) -> PatchAction {
    PatchAction::CreateOrChange {
        path: path.into(),
        mode: None,
        content: content.as_bytes().to_vec(),
        content_hash: None,
    }
}
