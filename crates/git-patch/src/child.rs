//! Building a patch from [`PatchSettings`] inside the current process.
//!
//! This is what the patch child process runs; callers that do not need
//! isolation can use it directly.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::{Arc, PoisonError};

use bstr::BStr;
use git_hash::ObjectId;
use git_repository::{Repository, RepositoryManager};
use git_submodule::{Fetcher, SubmoduleContext};
use git_transport::RefSpec;
use tracing::info;

use crate::builder::{resolve_revision, PatchBuilder};
use crate::settings::PatchSettings;
use crate::sink::{FileAction, FileActionListener, PatchSink};
use crate::stream::PatchWriter;
use crate::PatchError;

/// Prints `ACTION PATH` lines, the child's progress report.
pub struct ActionPrinter<W: Write> {
    out: W,
}

impl<W: Write> ActionPrinter<W> {
    pub fn new(out: W) -> Self {
        ActionPrinter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FileActionListener for ActionPrinter<W> {
    fn file_action(&mut self, action: FileAction, path: &BStr) {
        // Progress only; a closed stdout must not fail the build.
        let _ = writeln!(self.out, "{action} {path}");
    }
}

/// Parse one `ACTION PATH` line.
pub fn parse_action_line(line: &str) -> Option<(FileAction, &str)> {
    let (action, path) = line.split_once(' ')?;
    Some((action.parse().ok()?, path))
}

fn open_root(manager: &RepositoryManager, settings: &PatchSettings) -> Result<Arc<Repository>, PatchError> {
    Ok(manager.get_or_create(&settings.root.url)?)
}

/// The to commit, fetching the root repository first when it is not there.
fn resolve_to(
    manager: &RepositoryManager,
    repository: &Repository,
    fetcher: &dyn Fetcher,
    settings: &PatchSettings,
) -> Result<ObjectId, PatchError> {
    let present = resolve_revision(repository, &settings.to_revision)
        .ok()
        .filter(|oid| repository.has_object(oid));
    if let Some(oid) = present {
        return Ok(oid);
    }
    info!("Fetching {} to find {}", settings.root.url, settings.to_revision);
    {
        let lock = manager.lock_for(repository.git_dir());
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);
        fetcher.fetch(repository, &settings.root.url, &[RefSpec::mirror_all()], &settings.auth())?;
    }
    let oid = resolve_revision(repository, &settings.to_revision)?;
    if !repository.has_object(&oid) {
        return Err(PatchError::CommitNotFound {
            revision: settings.to_revision.clone(),
            repository: settings.root.url.clone(),
        });
    }
    Ok(oid)
}

/// Build the patch described by `settings` into `sink`.
pub fn build_in_process(
    settings: &PatchSettings,
    fetcher: Arc<dyn Fetcher>,
    sink: &mut dyn PatchSink,
    listener: &mut dyn FileActionListener,
) -> Result<(), PatchError> {
    let manager = Arc::new(RepositoryManager::new(&settings.caches_dir));
    let repository = open_root(&manager, settings)?;
    let to = resolve_to(&manager, &repository, fetcher.as_ref(), settings)?;
    let context = SubmoduleContext::new(Arc::clone(&manager), fetcher)
        .with_auth(settings.auth())
        .with_user_in_absolute_urls(settings.root.set_user_in_absolute_urls);
    let dir = repository.git_dir().to_path_buf();
    manager.run_with_disabled_remove(&dir, || {
        let builder = PatchBuilder::new(Arc::new(context), Arc::clone(&repository), settings.build_settings());
        let from = match &settings.from_revision {
            Some(rev) => match resolve_revision(&repository, rev) {
                Ok(oid) => Some(oid),
                // A base branch that was deleted since.
                Err(PatchError::InvalidRevision(_)) => {
                    return builder.build_over_unknown_base(rev, to, sink, listener);
                }
                Err(e) => return Err(e),
            },
            None => None,
        };
        builder.build(from, to, sink, listener)
    })
}

/// Build the patch into `settings.patch_file`.
pub fn write_patch_file(
    settings: &PatchSettings,
    fetcher: Arc<dyn Fetcher>,
    listener: &mut dyn FileActionListener,
) -> Result<(), PatchError> {
    let file = File::create(&settings.patch_file)?;
    let mut writer = PatchWriter::new(BufWriter::new(file))?;
    build_in_process(settings, fetcher, &mut writer, listener)?;
    writer.finish()?;
    Ok(())
}
