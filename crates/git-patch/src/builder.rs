//! Building a patch between two commits of a root repository.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bstr::{BStr, ByteSlice};
use git_hash::ObjectId;
use git_object::Commit;
use git_repository::Repository;
use git_submodule::{MountScope, SubmoduleAwareTreeIterator, SubmoduleContext, SubmodulePolicy, SubmoduleResolver};
use tracing::{debug, info};

use crate::change::ChangeType;
use crate::content::{ContentReaders, ContentSettings, LoadContentAction};
use crate::rules::CheckoutRules;
use crate::sink::{FileAction, FileActionListener, PatchSink};
use crate::walk::{TreeWalk, WalkEntry};
use crate::PatchError;

/// What a build needs besides the two commits.
#[derive(Debug, Clone, Default)]
pub struct BuildSettings {
    pub policy: SubmodulePolicy,
    pub rules: CheckoutRules,
    pub content: ContentSettings,
    /// Log every visited path.
    pub verbose_tree_walk: bool,
}

/// Resolve a revision of `repository`: a full hex id, a ref name, or a
/// branch name.
pub fn resolve_revision(repository: &Repository, revision: &str) -> Result<ObjectId, PatchError> {
    let revision = revision.trim();
    if revision.len() == 40 && revision.bytes().all(|b| b.is_ascii_hexdigit()) {
        return ObjectId::from_hex(revision).map_err(|_| PatchError::InvalidRevision(revision.to_string()));
    }
    repository
        .find_ref(revision)
        .or_else(|| repository.find_ref(&format!("refs/heads/{revision}")))
        .ok_or_else(|| PatchError::InvalidRevision(revision.to_string()))
}

/// Whether content loads run during the walk or after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Incremental,
}

pub struct PatchBuilder {
    context: Arc<SubmoduleContext>,
    repository: Arc<Repository>,
    settings: BuildSettings,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PatchBuilder {
    pub fn new(context: Arc<SubmoduleContext>, repository: Arc<Repository>, settings: BuildSettings) -> Self {
        PatchBuilder {
            context,
            repository,
            settings,
            interrupted: None,
        }
    }

    /// A set flag makes [`build`](Self::build) fail before walking.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    fn repository_name(&self) -> String {
        self.repository
            .remote_url()
            .unwrap_or_else(|| self.repository.git_dir().display().to_string())
    }

    fn read_commit(&self, oid: &ObjectId) -> Result<Option<Commit>, PatchError> {
        Ok(self.repository.reader("patch commits").read_commit(oid)?)
    }

    fn check_interrupted(&self) -> Result<(), PatchError> {
        if self.interrupted.as_ref().is_some_and(|f| f.load(Ordering::Relaxed)) {
            return Err(PatchError::Interrupted);
        }
        Ok(())
    }

    fn to_commit(&self, to: &ObjectId) -> Result<Commit, PatchError> {
        self.read_commit(to)?.ok_or_else(|| PatchError::CommitNotFound {
            revision: to.to_hex(),
            repository: self.repository_name(),
        })
    }

    /// Write the actions turning `from` into `to` into `sink`. Without
    /// `from` a clean patch is built; when `from` is not in the repository
    /// see [`build_over_unknown_base`](Self::build_over_unknown_base).
    pub fn build(
        &self,
        from: Option<ObjectId>,
        to: ObjectId,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        self.check_interrupted()?;
        let to_commit = self.to_commit(&to)?;
        let from_commit = match from {
            Some(from) => match self.read_commit(&from)? {
                Some(commit) => Some((from, commit)),
                None => return self.replace_unknown_base(&from.to_hex(), to, to_commit, sink, listener),
            },
            None => None,
        };
        self.build_commits(from_commit, to, to_commit, sink, listener)
    }

    /// Patch from a base revision the repository does not know: the root
    /// target directories are deleted and a clean patch of `to` follows.
    pub fn build_over_unknown_base(
        &self,
        base: &str,
        to: ObjectId,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        self.check_interrupted()?;
        let to_commit = self.to_commit(&to)?;
        self.replace_unknown_base(base, to, to_commit, sink, listener)
    }

    fn replace_unknown_base(
        &self,
        base: &str,
        to: ObjectId,
        to_commit: Commit,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        info!("The commit {base} is not available in the repository, build a full patch");
        for target in self.settings.rules.root_targets() {
            sink.delete_directory(target.as_bstr())?;
        }
        self.build_commits(None, to, to_commit, sink, listener)
    }

    /// One patch per revision, each applied on top of the previous
    /// revision. The first is based on `known_base`, or is a clean patch
    /// without one. Every patch is framed by `start_patch` and `end_patch`.
    pub fn build_bulk(
        &self,
        revisions: &[ObjectId],
        known_base: Option<ObjectId>,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        info!("Creating bulk patch of {} commits for {}", revisions.len(), self.repository_name());
        let mut base = known_base;
        for &revision in revisions {
            self.build_framed(base, revision, sink, listener)
                .map_err(|e| PatchError::BulkPatch {
                    revision: revision.to_hex(),
                    source: Box::new(e),
                })?;
            base = Some(revision);
        }
        Ok(())
    }

    fn build_framed(
        &self,
        base: Option<ObjectId>,
        revision: ObjectId,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        let base_hex = base.map(|b| b.to_hex());
        sink.start_patch(&revision.to_hex(), base_hex.as_deref())?;
        self.build(base, revision, sink, listener)?;
        sink.end_patch()
    }

    fn build_commits(
        &self,
        from_commit: Option<(ObjectId, Commit)>,
        to: ObjectId,
        to_commit: Commit,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        let repo = self.repository_name();
        match &from_commit {
            Some((from, _)) => info!("Creating patch {from}..{to} for {repo}"),
            None => info!("Creating clean patch {to} for {repo}"),
        }

        let scope: Rc<dyn MountScope> = Rc::new(self.settings.rules.clone());
        let to_iter = self.iterator(to, to_commit, Rc::clone(&scope))?;
        let (from_iter, mode) = match from_commit {
            Some((from, commit)) => (self.iterator(from, commit, scope)?, Mode::Incremental),
            None => (to_iter.empty_sibling(), Mode::Full),
        };

        // Released once the deferred loads are drained, or on the first error.
        let readers = ContentReaders::new();
        let walk = TreeWalk::new(to_iter, from_iter, &self.settings.rules);
        let queued = self.walk(walk, mode, &readers, sink, listener)?;
        for action in queued {
            action.run(self.settings.content, &readers, sink, listener)?;
        }
        Ok(())
    }

    fn iterator(
        &self,
        oid: ObjectId,
        commit: Commit,
        scope: Rc<dyn MountScope>,
    ) -> Result<SubmoduleAwareTreeIterator, PatchError> {
        let resolver = SubmoduleResolver::new(Arc::clone(&self.context), Arc::clone(&self.repository), oid, commit, "");
        Ok(SubmoduleAwareTreeIterator::for_commit(
            Rc::new(resolver),
            scope,
            self.settings.policy,
        )?)
    }

    /// Visit every differing path. Returns the content loads deferred until
    /// the walk is over.
    fn walk(
        &self,
        walk: TreeWalk<'_>,
        mode: Mode,
        readers: &ContentReaders,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<Vec<LoadContentAction>, PatchError> {
        let mut queued = Vec::new();
        for entry in walk {
            let entry = entry?;
            let Some(mapped) = self.settings.rules.map(entry.path.as_bstr()) else {
                debug!("Skip {}: excluded by checkout rules", entry.path);
                continue;
            };
            if self.settings.verbose_tree_walk {
                info!("Visit file {}", entry.info());
            }
            match entry.change_type() {
                ChangeType::Unchanged => {}
                ChangeType::Added | ChangeType::Modified | ChangeType::FileModeChanged => {
                    let Some(action) = self.load_action(&entry, mapped.as_bstr()) else {
                        continue;
                    };
                    match mode {
                        Mode::Full => action.run(self.settings.content, readers, sink, listener)?,
                        Mode::Incremental => {
                            listener.file_action(FileAction::Remove, mapped.as_bstr());
                            queued.push(action);
                        }
                    }
                }
                ChangeType::Deleted => {
                    if !entry.from_is_mount() {
                        listener.file_action(FileAction::Delete, mapped.as_bstr());
                        sink.delete_file(mapped.as_bstr())?;
                    }
                }
            }
        }
        Ok(queued)
    }

    fn load_action(&self, entry: &WalkEntry, mapped: &BStr) -> Option<LoadContentAction> {
        if !entry.is_content() {
            return None;
        }
        let to = entry.to.as_ref()?;
        let repository = entry.to_repository.as_ref()?;
        let mode = entry.mode_diff();
        if let Some(mode) = mode {
            info!("The mode change {mode} is detected for {}", entry.info());
        }
        Some(LoadContentAction {
            repository: Arc::clone(repository),
            oid: to.oid,
            path: entry.path.clone(),
            mapped_path: mapped.to_owned(),
            mode,
        })
    }
}
