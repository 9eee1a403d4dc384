//! Lazy blob content for patch actions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_odb::{ObjectLoader, ObjectReader};
use git_repository::Repository;
use tracing::{debug, error};

use crate::sink::{FileAction, FileActionListener, FileContent, PatchSink};
use crate::PatchError;

/// How much of a blob is inspected for a NUL byte before line endings are
/// touched.
const BINARY_SCAN_LEN: usize = 8000;
const CHUNK: usize = 8192;

/// How content is presented to the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentSettings {
    /// Convert LF line endings to CRLF.
    pub auto_crlf: bool,
    /// Report the blob id as the content hash. Sizes are then raw sizes.
    pub include_content_hashes: bool,
}

/// LF to CRLF conversion. Existing CRLF pairs stay as they are and content
/// with a NUL in its first 8000 bytes passes through untouched.
pub struct AutoCrlfReader<R> {
    inner: R,
    out: Vec<u8>,
    pos: usize,
    binary: Option<bool>,
    last_cr: bool,
}

impl<R: Read> AutoCrlfReader<R> {
    pub fn new(inner: R) -> Self {
        AutoCrlfReader {
            inner,
            out: Vec::with_capacity(CHUNK * 2),
            pos: 0,
            binary: None,
            last_cr: false,
        }
    }

    /// Refill `out`; false at end of input.
    fn fill(&mut self) -> io::Result<bool> {
        self.out.clear();
        self.pos = 0;
        let data = match self.binary {
            None => {
                let mut head = Vec::with_capacity(BINARY_SCAN_LEN);
                (&mut self.inner)
                    .take(BINARY_SCAN_LEN as u64)
                    .read_to_end(&mut head)?;
                self.binary = Some(head.contains(&0));
                head
            }
            Some(_) => {
                let mut chunk = vec![0u8; CHUNK];
                let n = self.inner.read(&mut chunk)?;
                chunk.truncate(n);
                chunk
            }
        };
        if data.is_empty() {
            return Ok(false);
        }
        if self.binary == Some(true) {
            self.out.extend_from_slice(&data);
        } else {
            for &b in &data {
                if b == b'\n' && !self.last_cr {
                    self.out.push(b'\r');
                }
                self.out.push(b);
                self.last_cr = b == b'\r';
            }
        }
        Ok(true)
    }
}

impl<R: Read> Read for AutoCrlfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.out.len() {
            if !self.fill()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.out.len() - self.pos);
        buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

type Opener = Box<dyn FnOnce() -> io::Result<Box<dyn Read + Send>> + Send>;

/// A stream opened on its first read, at most once.
pub struct LazyStream {
    open: Option<Opener>,
    inner: Option<Box<dyn Read + Send>>,
}

impl LazyStream {
    pub fn new<F>(open: F) -> Self
    where
        F: FnOnce() -> io::Result<Box<dyn Read + Send>> + Send + 'static,
    {
        LazyStream {
            open: Some(Box::new(open)),
            inner: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }
}

impl Read for LazyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            let open = self
                .open
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stream failed to open"))?;
            self.inner = Some(open()?);
        }
        match &mut self.inner {
            Some(inner) => inner.read(buf),
            None => Ok(0),
        }
    }
}

/// Blob content ready for a sink.
pub struct LoadedContent {
    pub size: u64,
    pub content_hash: Option<String>,
    pub stream: LazyStream,
}

/// The content-loading readers of one build, one per repository. They are
/// released together when this is dropped.
#[derive(Default)]
pub struct ContentReaders {
    readers: RefCell<HashMap<PathBuf, Rc<ObjectReader>>>,
}

impl ContentReaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// The reader for `repository`, acquired on first use.
    pub fn reader_for(&self, repository: &Repository) -> Rc<ObjectReader> {
        let mut readers = self.readers.borrow_mut();
        let reader = readers
            .entry(repository.git_dir().to_path_buf())
            .or_insert_with(|| Rc::new(repository.reader("content loading")));
        Rc::clone(reader)
    }

    pub fn len(&self) -> usize {
        self.readers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens blobs of one repository.
pub struct ContentLoader<'r> {
    repository: &'r Repository,
    reader: &'r ObjectReader,
    settings: ContentSettings,
}

impl<'r> ContentLoader<'r> {
    pub fn new(repository: &'r Repository, reader: &'r ObjectReader, settings: ContentSettings) -> Self {
        ContentLoader {
            repository,
            reader,
            settings,
        }
    }

    fn open_blob(&self, oid: &ObjectId, path: &BStr) -> Result<ObjectLoader, PatchError> {
        self.reader
            .open_blob(oid)?
            .ok_or_else(|| PatchError::ContentNotFound {
                oid: *oid,
                path: path.to_string(),
                repository: self.repository.git_dir().display().to_string(),
            })
    }

    pub fn load(&self, oid: &ObjectId, path: &BStr) -> Result<LoadedContent, PatchError> {
        let loader = self.open_blob(oid, path)?;
        if self.settings.include_content_hashes {
            return Ok(LoadedContent {
                size: loader.size(),
                content_hash: Some(oid.to_hex()),
                stream: LazyStream::new(move || loader.open_stream()),
            });
        }
        if !self.settings.auto_crlf {
            return Ok(LoadedContent {
                size: loader.size(),
                content_hash: None,
                stream: LazyStream::new(move || loader.open_stream()),
            });
        }
        let size = io::copy(&mut AutoCrlfReader::new(loader.open_stream()?), &mut io::sink())?;
        Ok(LoadedContent {
            size,
            content_hash: None,
            stream: LazyStream::new(move || {
                let converted: Box<dyn Read + Send> = Box::new(AutoCrlfReader::new(loader.open_stream()?));
                Ok(converted)
            }),
        })
    }
}

/// Writing one file's content into the sink.
#[derive(Debug, Clone)]
pub struct LoadContentAction {
    pub repository: Arc<Repository>,
    pub oid: ObjectId,
    /// Path in the repository tree (for diagnostics).
    pub path: BString,
    /// Path in the patch.
    pub mapped_path: BString,
    pub mode: Option<&'static str>,
}

impl LoadContentAction {
    pub fn run(
        &self,
        settings: ContentSettings,
        readers: &ContentReaders,
        sink: &mut dyn PatchSink,
        listener: &mut dyn FileActionListener,
    ) -> Result<(), PatchError> {
        listener.file_action(FileAction::Create, self.mapped_path.as_bstr());
        self.write_to(settings, readers, sink).map_err(|e| {
            error!(
                "Unable to load file: {}({}) from: {}",
                self.path,
                self.oid,
                self.repository.git_dir().display()
            );
            e
        })
    }

    fn write_to(
        &self,
        settings: ContentSettings,
        readers: &ContentReaders,
        sink: &mut dyn PatchSink,
    ) -> Result<(), PatchError> {
        let reader = readers.reader_for(&self.repository);
        let mut loaded =
            ContentLoader::new(&self.repository, &reader, settings).load(&self.oid, self.path.as_bstr())?;
        let content = FileContent::new(&mut loaded.stream, loaded.size).with_content_hash(loaded.content_hash);
        sink.create_or_change_binary_file(self.mapped_path.as_bstr(), self.mode, content)?;
        debug!("Add file {}, size {} bytes", self.mapped_path, loaded.size);
        Ok(())
    }
}
