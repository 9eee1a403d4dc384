use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Borrowed view over part of a byte buffer, ordered like raw tree entry
/// names (unsigned bytewise, shorter prefix first).
#[derive(Clone, Copy)]
pub struct ByteRange<'a> {
    data: &'a [u8],
    hash: u32,
}

impl<'a> ByteRange<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let hash = data
            .iter()
            .fold(0u32, |h, &b| h.wrapping_add(h.wrapping_mul(19).wrapping_add(u32::from(b))));
        ByteRange { data, hash }
    }

    /// `len` bytes of `data` starting at `start`; `None` when out of bounds.
    pub fn slice(data: &'a [u8], start: usize, len: usize) -> Option<Self> {
        data.get(start..start.checked_add(len)?).map(Self::new)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl PartialEq for ByteRange<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.data == other.data
    }
}

impl Eq for ByteRange<'_> {}

impl Hash for ByteRange<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}

impl PartialOrd for ByteRange<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteRange<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.cmp(other.data)
    }
}

impl std::fmt::Debug for ByteRange<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteRange({:?})", bstr::BStr::new(self.data))
    }
}
