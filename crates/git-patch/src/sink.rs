//! Where patch actions go.

use std::fmt;
use std::io::{self, Read};
use std::ops::Range;

use bstr::{BStr, BString};

use crate::PatchError;

/// File content handed to a sink: `size` bytes read from a stream that is
/// only opened on first read.
pub struct FileContent<'a> {
    size: u64,
    content_hash: Option<String>,
    reader: &'a mut dyn Read,
}

impl<'a> FileContent<'a> {
    pub fn new(reader: &'a mut dyn Read, size: u64) -> Self {
        FileContent {
            size,
            content_hash: None,
            reader,
        }
    }

    pub fn with_content_hash(mut self, hash: Option<String>) -> Self {
        self.content_hash = hash;
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Identifies the content without reading it, when the root asked for it.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }
}

impl Read for FileContent<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for FileContent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileContent")
            .field("size", &self.size)
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Receiver of patch actions, in the order they must be applied.
pub trait PatchSink {
    fn create_or_change_binary_file(
        &mut self,
        path: &BStr,
        mode: Option<&str>,
        content: FileContent<'_>,
    ) -> Result<(), PatchError>;

    fn delete_file(&mut self, path: &BStr) -> Result<(), PatchError>;

    fn delete_directory(&mut self, path: &BStr) -> Result<(), PatchError>;

    /// A bulk build is about to write the patch leading to `revision`,
    /// applied on top of `base` (a clean patch without one).
    fn start_patch(&mut self, _revision: &str, _base: Option<&str>) -> Result<(), PatchError> {
        Ok(())
    }

    /// The patch opened by the last [`start_patch`](Self::start_patch) is complete.
    fn end_patch(&mut self) -> Result<(), PatchError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Create,
    Delete,
    /// The file will be rewritten later in the same patch.
    Remove,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileAction::Create => "CREATE",
            FileAction::Delete => "DELETE",
            FileAction::Remove => "REMOVE",
        })
    }
}

impl std::str::FromStr for FileAction {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(FileAction::Create),
            "DELETE" => Ok(FileAction::Delete),
            "REMOVE" => Ok(FileAction::Remove),
            other => Err(PatchError::InvalidStream(format!("unknown file action {other}"))),
        }
    }
}

/// Observer of per-file progress, independent of the sink.
pub trait FileActionListener {
    fn file_action(&mut self, action: FileAction, path: &BStr);
}

impl<F: FnMut(FileAction, &BStr)> FileActionListener for F {
    fn file_action(&mut self, action: FileAction, path: &BStr) {
        self(action, path)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoListener;

impl FileActionListener for NoListener {
    fn file_action(&mut self, _action: FileAction, _path: &BStr) {}
}

/// A patch action with its content read out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchAction {
    CreateOrChange {
        path: BString,
        mode: Option<String>,
        content: Vec<u8>,
        content_hash: Option<String>,
    },
    DeleteFile(BString),
    DeleteDirectory(BString),
}

impl PatchAction {
    pub fn path(&self) -> &BStr {
        match self {
            PatchAction::CreateOrChange { path, .. }
            | PatchAction::DeleteFile(path)
            | PatchAction::DeleteDirectory(path) => BStr::new(path),
        }
    }
}

/// One patch of a bulk build, as seen by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPatch {
    pub revision: String,
    pub base: Option<String>,
    /// Indices into [`RecordingSink::actions`].
    pub actions: Range<usize>,
    pub ended: bool,
}

/// Keeps every action in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub actions: Vec<PatchAction>,
    pub patches: Vec<RecordedPatch>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatchSink for RecordingSink {
    fn create_or_change_binary_file(
        &mut self,
        path: &BStr,
        mode: Option<&str>,
        mut content: FileContent<'_>,
    ) -> Result<(), PatchError> {
        let mut data = Vec::with_capacity(content.size() as usize);
        content.read_to_end(&mut data)?;
        self.actions.push(PatchAction::CreateOrChange {
            path: path.to_owned(),
            mode: mode.map(str::to_string),
            content: data,
            content_hash: content.content_hash().map(str::to_string),
        });
        Ok(())
    }

    fn delete_file(&mut self, path: &BStr) -> Result<(), PatchError> {
        self.actions.push(PatchAction::DeleteFile(path.to_owned()));
        Ok(())
    }

    fn delete_directory(&mut self, path: &BStr) -> Result<(), PatchError> {
        self.actions.push(PatchAction::DeleteDirectory(path.to_owned()));
        Ok(())
    }

    fn start_patch(&mut self, revision: &str, base: Option<&str>) -> Result<(), PatchError> {
        let at = self.actions.len();
        self.patches.push(RecordedPatch {
            revision: revision.to_string(),
            base: base.map(str::to_string),
            actions: at..at,
            ended: false,
        });
        Ok(())
    }

    fn end_patch(&mut self) -> Result<(), PatchError> {
        let at = self.actions.len();
        match self.patches.last_mut() {
            Some(patch) if !patch.ended => {
                patch.actions.end = at;
                patch.ended = true;
                Ok(())
            }
            _ => Err(PatchError::InvalidStream("end of a patch that was never started".into())),
        }
    }
}
