use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::{parse_header, write_header, ObjectType};

use crate::{ObjectLoader, ObjectStore, OdbError};

/// Objects above this size are handed out as streams.
pub const DEFAULT_STREAM_THRESHOLD: u64 = 1024 * 1024;

/// Zlib-compressed loose objects under an `objects/` directory.
pub struct LooseStore {
    objects_dir: PathBuf,
    stream_threshold: u64,
}

impl LooseStore {
    pub fn open(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects_dir: objects_dir.into(),
            stream_threshold: DEFAULT_STREAM_THRESHOLD,
        }
    }

    pub fn with_stream_threshold(mut self, threshold: u64) -> Self {
        self.stream_threshold = threshold;
        self
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }
}

/// Decompressing reader positioned after the object header.
struct LooseStream {
    decoder: ZlibDecoder<fs::File>,
    remaining: u64,
}

impl Read for LooseStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = (self.remaining.min(buf.len() as u64)) as usize;
        let n = self.decoder.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Open a loose object file and consume its header.
///
/// Returns the type, the declared size and a stream over the content.
fn open_loose(path: &Path) -> io::Result<Option<(ObjectType, u64, LooseStream)>> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut decoder = ZlibDecoder::new(file);
    let mut head = Vec::with_capacity(64);
    let mut byte = [0u8; 1];
    // Byte-wise so no content is consumed past the header.
    loop {
        if head.len() >= 64 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "object header too long"));
        }
        if decoder.read(&mut byte)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated object header"));
        }
        head.push(byte[0]);
        if byte[0] == 0 {
            break;
        }
    }
    let (obj_type, size, _) =
        parse_header(&head).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some((
        obj_type,
        size,
        LooseStream {
            decoder,
            remaining: size,
        },
    )))
}

impl ObjectStore for LooseStore {
    fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    fn open(&self, oid: &ObjectId) -> Result<Option<ObjectLoader>, OdbError> {
        let path = self.object_path(oid);
        let Some((obj_type, size, mut stream)) = open_loose(&path)? else {
            return Ok(None);
        };

        if size > self.stream_threshold {
            drop(stream);
            let loader = ObjectLoader::streaming(obj_type, size, move || {
                match open_loose(&path)? {
                    Some((_, _, stream)) => Ok(Box::new(stream) as Box<dyn Read + Send>),
                    None => Err(io::Error::new(io::ErrorKind::NotFound, "loose object vanished")),
                }
            });
            return Ok(Some(loader));
        }

        let mut data = Vec::with_capacity(size as usize);
        stream.read_to_end(&mut data)?;
        if data.len() as u64 != size {
            return Err(OdbError::Corrupt {
                oid: *oid,
                reason: format!("declared {size} bytes, found {}", data.len()),
            });
        }
        Ok(Some(ObjectLoader::cached(obj_type, Arc::from(data))))
    }

    fn write_raw(&self, obj_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        let header = write_header(obj_type, content.len() as u64);
        let mut hasher = Hasher::new(HashAlgorithm::Sha1);
        hasher.update(&header);
        hasher.update(content);
        let oid = hasher.finalize()?;

        let final_path = self.object_path(&oid);
        if final_path.is_file() {
            return Ok(oid);
        }
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self
            .objects_dir
            .join(format!("tmp_obj_{}_{}", std::process::id(), oid.to_hex()));
        {
            let file = fs::File::create(&tmp_path)?;
            let mut encoder = ZlibEncoder::new(file, Compression::default());
            encoder.write_all(&header)?;
            encoder.write_all(content)?;
            encoder.finish()?.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path) {
            let _ = fs::remove_file(&tmp_path);
            if !final_path.is_file() {
                return Err(e.into());
            }
        }
        Ok(oid)
    }

    fn list(&self) -> Result<Vec<ObjectId>, OdbError> {
        let mut out = Vec::new();
        let fanouts = match fs::read_dir(&self.objects_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for fanout in fanouts {
            let fanout = fanout?;
            let prefix = fanout.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 || !fanout.file_type()?.is_dir() {
                continue;
            }
            for object in fs::read_dir(fanout.path())? {
                let rest = object?.file_name().to_string_lossy().into_owned();
                if let Ok(oid) = ObjectId::from_hex(&format!("{prefix}{rest}")) {
                    out.push(oid);
                }
            }
        }
        Ok(out)
    }
}
