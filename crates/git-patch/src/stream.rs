//! Self-describing binary patch stream.
//!
//! ```text
//! "GITPATCH" version:u8
//! 'C' path mode? hash? size:u64 bytes[size]    create or change a file
//! 'D' path                                     delete a file
//! 'R' path                                     delete a directory
//! 'S' revision base?                           start of one patch of a bulk build
//! 'F'                                          end of that patch
//! 'E'                                          end
//! ```
//!
//! Strings are a big-endian `u32` length followed by UTF-8 bytes; an
//! optional string is a presence byte (0 or 1) followed by the string.

use std::io::{self, Read, Write};

use bstr::{BStr, ByteSlice};

use crate::sink::{FileContent, PatchSink};
use crate::PatchError;

const MAGIC: &[u8; 8] = b"GITPATCH";
const VERSION: u8 = 1;

const TAG_CHANGE: u8 = b'C';
const TAG_DELETE_FILE: u8 = b'D';
const TAG_DELETE_DIRECTORY: u8 = b'R';
const TAG_START_PATCH: u8 = b'S';
const TAG_END_PATCH: u8 = b'F';
const TAG_END: u8 = b'E';

/// Writes sink calls as a patch stream.
pub struct PatchWriter<W: Write> {
    out: W,
}

impl<W: Write> PatchWriter<W> {
    pub fn new(mut out: W) -> Result<Self, PatchError> {
        out.write_all(MAGIC)?;
        out.write_all(&[VERSION])?;
        Ok(PatchWriter { out })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long for patch stream"))?;
        self.out.write_all(&len.to_be_bytes())?;
        self.out.write_all(bytes)
    }

    fn write_optional(&mut self, value: Option<&str>) -> io::Result<()> {
        match value {
            Some(s) => {
                self.out.write_all(&[1])?;
                self.write_bytes(s.as_bytes())
            }
            None => self.out.write_all(&[0]),
        }
    }

    /// Terminate the stream and hand back the writer.
    pub fn finish(mut self) -> Result<W, PatchError> {
        self.out.write_all(&[TAG_END])?;
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> PatchSink for PatchWriter<W> {
    fn create_or_change_binary_file(
        &mut self,
        path: &BStr,
        mode: Option<&str>,
        mut content: FileContent<'_>,
    ) -> Result<(), PatchError> {
        let size = content.size();
        self.out.write_all(&[TAG_CHANGE])?;
        self.write_bytes(path)?;
        self.write_optional(mode)?;
        self.write_optional(content.content_hash())?;
        self.out.write_all(&size.to_be_bytes())?;
        let copied = io::copy(&mut (&mut content).take(size), &mut self.out)?;
        if copied != size {
            return Err(PatchError::InvalidStream(format!(
                "content of {path} ended after {copied} of {size} bytes"
            )));
        }
        Ok(())
    }

    fn delete_file(&mut self, path: &BStr) -> Result<(), PatchError> {
        self.out.write_all(&[TAG_DELETE_FILE])?;
        Ok(self.write_bytes(path)?)
    }

    fn delete_directory(&mut self, path: &BStr) -> Result<(), PatchError> {
        self.out.write_all(&[TAG_DELETE_DIRECTORY])?;
        Ok(self.write_bytes(path)?)
    }

    fn start_patch(&mut self, revision: &str, base: Option<&str>) -> Result<(), PatchError> {
        self.out.write_all(&[TAG_START_PATCH])?;
        self.write_bytes(revision.as_bytes())?;
        Ok(self.write_optional(base)?)
    }

    fn end_patch(&mut self) -> Result<(), PatchError> {
        Ok(self.out.write_all(&[TAG_END_PATCH])?)
    }
}

/// Reads a patch stream back into sink calls.
pub struct PatchReader<R: Read> {
    input: R,
}

impl<R: Read> PatchReader<R> {
    pub fn new(mut input: R) -> Result<Self, PatchError> {
        let mut header = [0u8; 9];
        input
            .read_exact(&mut header)
            .map_err(|_| PatchError::InvalidStream("missing header".into()))?;
        if &header[..8] != MAGIC {
            return Err(PatchError::InvalidStream("bad magic".into()));
        }
        if header[8] != VERSION {
            return Err(PatchError::InvalidStream(format!("unsupported version {}", header[8])));
        }
        Ok(PatchReader { input })
    }

    fn read_u8(&mut self) -> Result<u8, PatchError> {
        let mut b = [0u8; 1];
        self.input.read_exact(&mut b).map_err(truncated)?;
        Ok(b[0])
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>, PatchError> {
        let mut len = [0u8; 4];
        self.input.read_exact(&mut len).map_err(truncated)?;
        let mut bytes = Vec::new();
        (&mut self.input)
            .take(u64::from(u32::from_be_bytes(len)))
            .read_to_end(&mut bytes)?;
        if bytes.len() != u32::from_be_bytes(len) as usize {
            return Err(truncated(io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(bytes)
    }

    fn read_optional(&mut self) -> Result<Option<String>, PatchError> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => String::from_utf8(self.read_bytes()?)
                .map(Some)
                .map_err(|_| PatchError::InvalidStream("string is not UTF-8".into())),
            other => Err(PatchError::InvalidStream(format!("bad presence byte {other}"))),
        }
    }

    /// Apply every record to `sink`, up to the end marker.
    pub fn replay(mut self, sink: &mut dyn PatchSink) -> Result<(), PatchError> {
        loop {
            match self.read_u8()? {
                TAG_CHANGE => {
                    let path = self.read_bytes()?;
                    let mode = self.read_optional()?;
                    let hash = self.read_optional()?;
                    let mut size = [0u8; 8];
                    self.input.read_exact(&mut size).map_err(truncated)?;
                    let size = u64::from_be_bytes(size);
                    let mut body = (&mut self.input).take(size);
                    let content = FileContent::new(&mut body, size).with_content_hash(hash);
                    sink.create_or_change_binary_file(path.as_bstr(), mode.as_deref(), content)?;
                    // Whatever the sink left unread belongs to this record.
                    io::copy(&mut body, &mut io::sink())?;
                    if body.limit() != 0 {
                        return Err(truncated(io::ErrorKind::UnexpectedEof.into()));
                    }
                }
                TAG_DELETE_FILE => {
                    let path = self.read_bytes()?;
                    sink.delete_file(path.as_bstr())?;
                }
                TAG_DELETE_DIRECTORY => {
                    let path = self.read_bytes()?;
                    sink.delete_directory(path.as_bstr())?;
                }
                TAG_START_PATCH => {
                    let revision = String::from_utf8(self.read_bytes()?)
                        .map_err(|_| PatchError::InvalidStream("revision is not UTF-8".into()))?;
                    let base = self.read_optional()?;
                    sink.start_patch(&revision, base.as_deref())?;
                }
                TAG_END_PATCH => sink.end_patch()?,
                TAG_END => return Ok(()),
                other => return Err(PatchError::InvalidStream(format!("unknown record tag {other:#04x}"))),
            }
        }
    }
}

fn truncated(_: io::Error) -> PatchError {
    PatchError::InvalidStream("unexpected end of stream".into())
}
