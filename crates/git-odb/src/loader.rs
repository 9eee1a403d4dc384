use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use git_object::ObjectType;

type StreamOpener = Box<dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync>;

enum Source {
    Cached(Arc<[u8]>),
    Stream(StreamOpener),
}

/// Handle on one stored object.
///
/// Small objects carry their bytes; large ones carry an opener that streams
/// the content each time it is called, so nothing is buffered up front.
pub struct ObjectLoader {
    obj_type: ObjectType,
    size: u64,
    source: Source,
}

impl ObjectLoader {
    pub fn cached(obj_type: ObjectType, data: Arc<[u8]>) -> Self {
        Self {
            obj_type,
            size: data.len() as u64,
            source: Source::Cached(data),
        }
    }

    pub fn streaming<F>(obj_type: ObjectType, size: u64, open: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        Self {
            obj_type,
            size,
            source: Source::Stream(Box::new(open)),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.obj_type
    }

    /// Content size in bytes, known without reading the content.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether content is only available as a stream.
    pub fn is_large(&self) -> bool {
        matches!(self.source, Source::Stream(_))
    }

    pub fn cached_bytes(&self) -> Option<&[u8]> {
        match &self.source {
            Source::Cached(data) => Some(data),
            Source::Stream(_) => None,
        }
    }

    /// Open a fresh reader over the content.
    pub fn open_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        match &self.source {
            Source::Cached(data) => Ok(Box::new(Cursor::new(Arc::clone(data)))),
            Source::Stream(open) => open(),
        }
    }

    /// Read the whole content. Meant for trees and commits.
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        if let Some(data) = self.cached_bytes() {
            return Ok(data.to_vec());
        }
        let mut out = Vec::with_capacity(self.size as usize);
        self.open_stream()?.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl fmt::Debug for ObjectLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectLoader")
            .field("obj_type", &self.obj_type)
            .field("size", &self.size)
            .field("large", &self.is_large())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_loader_streams_its_bytes() {
        let loader = ObjectLoader::cached(ObjectType::Blob, Arc::from(&b"abc"[..]));
        assert_eq!(loader.size(), 3);
        assert!(!loader.is_large());
        let mut out = String::new();
        loader.open_stream().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn streaming_loader_opens_on_demand() {
        let loader = ObjectLoader::streaming(ObjectType::Blob, 5, || {
            Ok(Box::new(Cursor::new(b"hello".to_vec())))
        });
        assert!(loader.is_large());
        assert!(loader.cached_bytes().is_none());
        assert_eq!(loader.read_all().unwrap(), b"hello");
    }
}
