//! Slash-separated repository paths.
//!
//! Paths inside a tree are byte strings with `/` separators and no leading
//! or trailing slash; the root is the empty string.

use bstr::{BStr, BString, ByteSlice, ByteVec};

/// `prefix/name`, or `name` when `prefix` is the root.
pub fn join(prefix: &[u8], name: &[u8]) -> BString {
    if prefix.is_empty() {
        return BString::from(name);
    }
    if name.is_empty() {
        return BString::from(prefix);
    }
    let mut out = BString::from(Vec::with_capacity(prefix.len() + 1 + name.len()));
    out.push_str(prefix);
    out.push_byte(b'/');
    out.push_str(name);
    out
}

/// Everything before the last `/`, or the root for a top-level name.
pub fn parent(path: &[u8]) -> &BStr {
    match path.rfind_byte(b'/') {
        Some(pos) => path[..pos].as_bstr(),
        None => b"".as_bstr(),
    }
}

/// Last component of `path`.
pub fn file_name(path: &[u8]) -> &BStr {
    match path.rfind_byte(b'/') {
        Some(pos) => path[pos + 1..].as_bstr(),
        None => path.as_bstr(),
    }
}

/// True when `path` equals `ancestor` or lies below it. The root contains everything.
pub fn is_at_or_below(path: &[u8], ancestor: &[u8]) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest[0] == b'/',
        None => false,
    }
}

/// Resolve `.` and `..` segments of a URL path.
///
/// Empty and `.` segments are dropped and `name/..` pairs fold away. A `..`
/// with nothing left to fold is kept, so such segments gather at the front
/// (`a/../../b` becomes `../b`). A leading `/` survives.
pub fn normalize(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return path.to_string();
    }
    let mut kept: Vec<&str> = Vec::new();
    let mut leading_up = 0usize;
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if kept.pop().is_none() {
                    leading_up += 1;
                }
            }
            other => kept.push(other),
        }
    }

    let mut out = String::with_capacity(path.len());
    if path.starts_with('/') {
        out.push('/');
    }
    let segments = std::iter::repeat("..").take(leading_up).chain(kept);
    for (i, segment) in segments.enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}
