//! Tree iteration that steps into submodules.
//!
//! [`SubmoduleAwareTreeIterator`] walks one tree level. Under a checkout
//! policy each gitlink is resolved and presented as a directory holding the
//! submodule commit's tree; entries are then visited in the order a
//! directory of that name would sort in.

use std::rc::Rc;
use std::sync::Arc;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_object::{FileMode, Tree};
use git_repository::Repository;
use git_utils::path;
use tracing::{trace, warn};

use crate::mapping::build_mapping;
use crate::resolver::{ResolvedSubmodule, SubmoduleResolver};
use crate::{SubmoduleError, SubmodulePolicy};

/// Decides whether a submodule mounted at a path (relative to the root
/// repository) is worth resolving.
pub trait MountScope {
    fn touches(&self, path_from_root: &BStr) -> bool;
}

/// Every mount is in scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllMounts;

impl MountScope for AllMounts {
    fn touches(&self, _path_from_root: &BStr) -> bool {
        true
    }
}

/// The entry under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterEntry {
    pub name: BString,
    /// Mode stored in the tree.
    pub raw_mode: FileMode,
    pub raw_oid: ObjectId,
    /// Mode after resolution: `Tree` for an expanded submodule.
    pub mode: FileMode,
    /// For an expanded submodule, the tree of its commit.
    pub oid: ObjectId,
    /// A gitlink whose submodule could not be resolved.
    pub broken: bool,
    /// Sort as a directory: expanded submodules and every gitlink of a
    /// level that mounts submodules under a checkout policy.
    pub sorts_as_tree: bool,
}

pub struct SubmoduleAwareTreeIterator {
    resolver: Rc<SubmoduleResolver>,
    scope: Rc<dyn MountScope>,
    policy: SubmodulePolicy,
    /// Directory of this level relative to the resolver's repository.
    dir: BString,
    tree: Arc<Tree>,
    /// `.gitmodules` declares a submodule directly in this level.
    mounts: bool,
    mapping: Option<Vec<usize>>,
    position: usize,
    current: Option<IterEntry>,
    submodule: Option<ResolvedSubmodule>,
}

impl SubmoduleAwareTreeIterator {
    /// Iterator over the root tree of the resolver's commit.
    pub fn for_commit(
        resolver: Rc<SubmoduleResolver>,
        scope: Rc<dyn MountScope>,
        policy: SubmodulePolicy,
    ) -> Result<Self, SubmoduleError> {
        let tree = resolver.reader().read_tree(&resolver.commit().tree)?;
        Self::level(resolver, scope, policy, BString::default(), tree)
    }

    /// Iterator with no entries, standing in for a missing side.
    pub fn empty(
        resolver: Rc<SubmoduleResolver>,
        scope: Rc<dyn MountScope>,
        policy: SubmodulePolicy,
    ) -> Self {
        SubmoduleAwareTreeIterator {
            resolver,
            scope,
            policy,
            dir: BString::default(),
            tree: Arc::new(Tree::new()),
            mounts: false,
            mapping: None,
            position: 0,
            current: None,
            submodule: None,
        }
    }

    fn level(
        resolver: Rc<SubmoduleResolver>,
        scope: Rc<dyn MountScope>,
        policy: SubmodulePolicy,
        dir: BString,
        tree: Arc<Tree>,
    ) -> Result<Self, SubmoduleError> {
        let mounts = policy.checks_out() && resolver.contains_submodule(dir.as_bstr());
        let mapping = if mounts {
            build_mapping(&tree.entries)
        } else {
            None
        };
        if mapping.is_some() {
            trace!(dir = %dir, "reordered submodules");
        }
        let mut it = SubmoduleAwareTreeIterator {
            resolver,
            scope,
            policy,
            dir,
            tree,
            mounts,
            mapping,
            position: 0,
            current: None,
            submodule: None,
        };
        it.moved_to_entry()?;
        Ok(it)
    }

    /// Index into the stored tree of the entry at `position`.
    fn translate(&self, position: usize) -> usize {
        match &self.mapping {
            Some(mapping) if position < mapping.len() => mapping[position],
            _ => position,
        }
    }

    pub fn first(&self) -> bool {
        self.position == 0
    }

    pub fn eof(&self) -> bool {
        self.position >= self.tree.len()
    }

    /// Advance by `delta` entries, stopping at the end.
    pub fn next(&mut self, delta: usize) -> Result<(), SubmoduleError> {
        self.position = self.position.saturating_add(delta).min(self.tree.len());
        self.moved_to_entry()
    }

    /// Step back by `delta` entries, stopping at the first.
    pub fn back(&mut self, delta: usize) -> Result<(), SubmoduleError> {
        self.position = self.position.saturating_sub(delta);
        self.moved_to_entry()
    }

    fn moved_to_entry(&mut self) -> Result<(), SubmoduleError> {
        self.submodule = None;
        if self.eof() {
            self.current = None;
            return Ok(());
        }
        let tree = Arc::clone(&self.tree);
        let raw = &tree.entries[self.translate(self.position)];
        let mut entry = IterEntry {
            name: raw.name.clone(),
            raw_mode: raw.mode,
            raw_oid: raw.oid,
            mode: raw.mode,
            oid: raw.oid,
            broken: false,
            sorts_as_tree: raw.mode.is_tree() || (raw.mode.is_gitlink() && self.mounts),
        };

        if raw.mode.is_gitlink() && self.policy.checks_out() {
            let repo_path = path::join(&self.dir, &raw.name);
            let path_from_root = path::join(self.resolver.path_from_root(), &repo_path);
            if self.scope.touches(path_from_root.as_bstr()) {
                let parent_url = self.resolver.main_url();
                match self.resolver.resolve(&parent_url, repo_path.as_bstr(), &raw.oid) {
                    Ok(resolved) => {
                        entry.mode = FileMode::Tree;
                        entry.oid = resolved.commit.tree;
                        self.submodule = Some(resolved);
                    }
                    Err(e) if self.policy.ignores_errors() && e.is_ignorable() => {
                        warn!(path = %path_from_root, error = %e, "ignoring broken submodule");
                        entry.broken = true;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                trace!(path = %path_from_root, "submodule outside of checkout rules");
            }
        }
        self.current = Some(entry);
        Ok(())
    }

    pub fn entry(&self) -> Option<&IterEntry> {
        self.current.as_ref()
    }

    /// The submodule under the cursor, when it was resolved.
    pub fn submodule(&self) -> Option<&ResolvedSubmodule> {
        self.submodule.as_ref()
    }

    /// Iterator with no entries at this level, for a side that has no
    /// directory where the other side has one.
    pub fn empty_sibling(&self) -> Self {
        Self::empty(Rc::clone(&self.resolver), Rc::clone(&self.scope), self.policy)
    }

    /// Iterator over the directory (or expanded submodule) under the cursor.
    ///
    /// Inside a submodule the policy becomes [`SubmodulePolicy::sub_policy`].
    pub fn create_subtree(&self) -> Result<Self, SubmoduleError> {
        let Some(entry) = &self.current else {
            return Ok(self.empty_sibling());
        };
        let repo_path = path::join(&self.dir, &entry.name);
        match &self.submodule {
            Some(resolved) => {
                let child = Rc::new(self.resolver.child_resolver(resolved, repo_path.as_bstr()));
                let tree = child.reader().read_tree(&resolved.commit.tree)?;
                Self::level(
                    child,
                    Rc::clone(&self.scope),
                    self.policy.sub_policy(),
                    BString::default(),
                    tree,
                )
            }
            None => {
                let tree = self.resolver.reader().read_tree(&entry.oid)?;
                Self::level(
                    Rc::clone(&self.resolver),
                    Rc::clone(&self.scope),
                    self.policy,
                    repo_path,
                    tree,
                )
            }
        }
    }

    /// Repository holding the objects of the current level.
    pub fn repository(&self) -> &Arc<Repository> {
        self.resolver.repository()
    }

    pub fn resolver(&self) -> &Rc<SubmoduleResolver> {
        &self.resolver
    }

    pub fn policy(&self) -> SubmodulePolicy {
        self.policy
    }

    /// Path of the current level relative to the root repository.
    pub fn path_from_root(&self) -> BString {
        path::join(self.resolver.path_from_root(), &self.dir)
    }
}

impl std::fmt::Debug for SubmoduleAwareTreeIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmoduleAwareTreeIterator")
            .field("path", &self.path_from_root())
            .field("policy", &self.policy)
            .field("position", &self.position)
            .field("entry", &self.current)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::LocalFetcher;
    use crate::resolver::SubmoduleContext;
    use git_object::{ObjectType, TreeEntry};
    use git_repository::RepositoryManager;

    fn write_tree(repo: &Repository, entries: Vec<TreeEntry>) -> ObjectId {
        let mut tree = Tree::new();
        tree.entries = entries;
        repo.store()
            .write_raw(ObjectType::Tree, &tree.serialize_content())
            .unwrap()
    }

    fn write_commit(repo: &Repository, tree: ObjectId) -> ObjectId {
        let text = format!("tree {tree}\nauthor A <a@x> 0 +0000\ncommitter A <a@x> 0 +0000\n\nm\n");
        repo.store().write_raw(ObjectType::Commit, text.as_bytes()).unwrap()
    }

    fn blob(repo: &Repository, data: &str) -> ObjectId {
        repo.store().write_raw(ObjectType::Blob, data.as_bytes()).unwrap()
    }

    /// Main repository with `a` (gitlink), `a.txt`, and `b/c.txt`.
    struct Fixture {
        context: Arc<SubmoduleContext>,
        main: Arc<Repository>,
        commit: ObjectId,
        sub_commit: ObjectId,
    }

    fn fixture(register_remote: bool) -> Fixture {
        let sub = Arc::new(Repository::in_memory("sub", None));
        let inner = write_tree(
            &sub,
            vec![TreeEntry::new(FileMode::Regular, "inner.txt", blob(&sub, "inner\n"))],
        );
        let sub_commit = write_commit(&sub, inner);

        let main = Arc::new(Repository::in_memory("main", Some("https://example.com/main.git")));
        let modules = "[submodule \"a\"]\n\tpath = a\n\turl = ../a.git\n";
        let b = write_tree(&main, vec![TreeEntry::new(FileMode::Regular, "c.txt", blob(&main, "c\n"))]);
        let root = write_tree(
            &main,
            vec![
                TreeEntry::new(FileMode::Regular, ".gitmodules", blob(&main, modules)),
                TreeEntry::new(FileMode::Gitlink, "a", sub_commit),
                TreeEntry::new(FileMode::Regular, "a.txt", blob(&main, "a\n")),
                TreeEntry::new(FileMode::Tree, "b", b),
            ],
        );
        let commit = write_commit(&main, root);

        let fetcher = Arc::new(LocalFetcher::new());
        if register_remote {
            fetcher.add_remote("https://example.com/a.git", sub);
        }
        let manager = Arc::new(RepositoryManager::in_memory());
        let context = Arc::new(SubmoduleContext::new(manager, fetcher));
        Fixture {
            context,
            main,
            commit,
            sub_commit,
        }
    }

    impl Fixture {
        fn iter(
            &self,
            policy: SubmodulePolicy,
            scope: Rc<dyn MountScope>,
        ) -> Result<SubmoduleAwareTreeIterator, SubmoduleError> {
            let commit = self.main.reader("test").read_commit(&self.commit).unwrap().unwrap();
            let resolver = Rc::new(SubmoduleResolver::new(
                Arc::clone(&self.context),
                Arc::clone(&self.main),
                self.commit,
                commit,
                "",
            ));
            SubmoduleAwareTreeIterator::for_commit(resolver, scope, policy)
        }
    }

    fn names(it: &mut SubmoduleAwareTreeIterator) -> Vec<(String, FileMode)> {
        let mut out = Vec::new();
        while let Some(e) = it.entry() {
            out.push((e.name.to_string(), e.mode));
            it.next(1).unwrap();
        }
        out
    }

    #[test]
    fn ignore_policy_keeps_gitlinks() {
        let f = fixture(true);
        let mut it = f.iter(SubmodulePolicy::IGNORE, Rc::new(AllMounts)).unwrap();
        assert!(it.first());
        let seen = names(&mut it);
        assert_eq!(seen[1], ("a".to_string(), FileMode::Gitlink));
        assert_eq!(seen[2].0, "a.txt");
        assert!(it.eof());
    }

    #[test]
    fn checkout_expands_and_reorders() {
        let f = fixture(true);
        let mut it = f.iter(SubmodulePolicy::CHECKOUT, Rc::new(AllMounts)).unwrap();
        let seen: Vec<String> = names(&mut it).into_iter().map(|(n, _)| n).collect();
        assert_eq!(seen, [".gitmodules", "a.txt", "a", "b"]);

        it.back(2).unwrap();
        let entry = it.entry().unwrap().clone();
        assert_eq!(entry.name, "a");
        assert_eq!(entry.mode, FileMode::Tree);
        assert_eq!(entry.raw_oid, f.sub_commit);

        let mut sub = it.create_subtree().unwrap();
        assert_eq!(sub.path_from_root(), "a");
        assert_eq!(sub.policy(), SubmodulePolicy::CHECKOUT);
        assert_eq!(sub.entry().unwrap().name, "inner.txt");
        assert!(sub.repository().has_object(&sub.entry().unwrap().oid));
        sub.next(5).unwrap();
        assert!(sub.eof());
    }

    #[test]
    fn plain_directory_keeps_resolver() {
        let f = fixture(true);
        let mut it = f.iter(SubmodulePolicy::CHECKOUT, Rc::new(AllMounts)).unwrap();
        it.next(3).unwrap();
        assert_eq!(it.entry().unwrap().name, "b");
        let sub = it.create_subtree().unwrap();
        assert_eq!(sub.path_from_root(), "b");
        assert!(Arc::ptr_eq(sub.repository(), &f.main));
    }

    #[test]
    fn unreachable_submodule_stops_or_breaks() {
        let f = fixture(false);
        let err = f.iter(SubmodulePolicy::CHECKOUT, Rc::new(AllMounts)).and_then(|mut it| {
            it.next(2)?;
            Ok(it)
        });
        assert!(matches!(err, Err(SubmoduleError::Fetch { .. })));

        let policy = SubmodulePolicy::CHECKOUT.with_errors_ignored(true);
        let mut it = f.iter(policy, Rc::new(AllMounts)).unwrap();
        it.next(2).unwrap();
        let entry = it.entry().unwrap();
        assert_eq!(entry.name, "a");
        assert!(entry.broken);
        assert_eq!(entry.mode, FileMode::Gitlink);
        assert!(entry.sorts_as_tree);
    }

    struct Nothing;
    impl MountScope for Nothing {
        fn touches(&self, _: &BStr) -> bool {
            false
        }
    }

    #[test]
    fn out_of_scope_mount_is_plain_gitlink() {
        let f = fixture(false);
        let mut it = f.iter(SubmodulePolicy::CHECKOUT, Rc::new(Nothing)).unwrap();
        it.next(2).unwrap();
        let entry = it.entry().unwrap();
        assert_eq!(entry.name, "a");
        assert_eq!(entry.mode, FileMode::Gitlink);
        assert!(!entry.broken);
    }

    #[test]
    fn undeclared_gitlink_keeps_tree_order() {
        let f = fixture(true);
        let main = &f.main;
        let b = write_tree(main, vec![TreeEntry::new(FileMode::Regular, "c.txt", blob(main, "c\n"))]);
        let root = write_tree(
            main,
            vec![
                TreeEntry::new(FileMode::Gitlink, "a", f.sub_commit),
                TreeEntry::new(FileMode::Regular, "a.txt", blob(main, "a\n")),
                TreeEntry::new(FileMode::Tree, "b", b),
            ],
        );
        let commit_id = write_commit(main, root);
        let commit = main.reader("test").read_commit(&commit_id).unwrap().unwrap();
        let resolver = Rc::new(SubmoduleResolver::new(
            Arc::clone(&f.context),
            Arc::clone(main),
            commit_id,
            commit,
            "",
        ));
        assert!(!resolver.contains_submodule(BStr::new("")));

        let mut it =
            SubmoduleAwareTreeIterator::for_commit(resolver, Rc::new(Nothing), SubmodulePolicy::CHECKOUT).unwrap();
        let entry = it.entry().unwrap().clone();
        assert_eq!(entry.name, "a");
        assert_eq!(entry.mode, FileMode::Gitlink);
        assert!(!entry.sorts_as_tree);
        let seen: Vec<String> = names(&mut it).into_iter().map(|(n, _)| n).collect();
        assert_eq!(seen, ["a", "a.txt", "b"]);
    }

    #[test]
    fn empty_iterator() {
        let f = fixture(true);
        let it = f.iter(SubmodulePolicy::IGNORE, Rc::new(AllMounts)).unwrap();
        let empty = SubmoduleAwareTreeIterator::empty(
            Rc::clone(it.resolver()),
            Rc::new(AllMounts),
            SubmodulePolicy::IGNORE,
        );
        assert!(empty.eof());
        assert!(empty.entry().is_none());
    }
}
