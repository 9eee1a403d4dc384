//! On-disk repositories and a runner for the `gitpatch` binary.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use git_hash::ObjectId;
use git_object::{Commit, FileMode, ObjectType, Tree, TreeEntry};
use git_repository::Repository;

/// Captured output of one `gitpatch` run.
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub fn gitpatch(args: &[&str], stdin: Option<&str>) -> CommandResult {
    let mut child = Command::new(env!("CARGO_BIN_EXE_gitpatch"))
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run gitpatch");
    {
        let mut input = child.stdin.take().unwrap();
        if let Some(text) = stdin {
            input.write_all(text.as_bytes()).unwrap();
        }
    }
    let output = child.wait_with_output().unwrap();
    CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

pub enum Entry<'a> {
    File(&'a str),
    Mount(ObjectId),
}

/// Bare repositories side by side in a temporary directory, plus a caches
/// dir for mirrors.
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Fixture {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn caches_dir(&self) -> PathBuf {
        self.path("caches")
    }

    pub fn repo(&self, name: &str) -> Repository {
        Repository::init_bare(self.path(&format!("{name}.git")), None).unwrap()
    }
}

/// Commit a flat tree and point `refs/heads/main` at it.
pub fn commit(repo: &Repository, entries: &[(&str, Entry<'_>)]) -> ObjectId {
    let mut tree = Tree::new();
    for (name, entry) in entries {
        let (mode, oid) = match entry {
            Entry::File(data) => (
                FileMode::Regular,
                repo.store().write_raw(ObjectType::Blob, data.as_bytes()).unwrap(),
            ),
            Entry::Mount(commit) => (FileMode::Gitlink, *commit),
        };
        tree.entries.push(TreeEntry::new(mode, *name, oid));
    }
    let tree = repo
        .store()
        .write_raw(ObjectType::Tree, &tree.serialize_content())
        .unwrap();
    let commit = Commit {
        tree,
        parents: vec![],
        author: "A <a@example.com> 0 +0000".into(),
        committer: "A <a@example.com> 0 +0000".into(),
        message: "test\n".into(),
    };
    let oid = repo
        .store()
        .write_raw(ObjectType::Commit, &commit.serialize_content())
        .unwrap();
    repo.update_ref("refs/heads/main", oid).unwrap();
    oid
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
