//! Sort-order correction for expanded submodules.
//!
//! Tree objects order a gitlink by its bare name, but once a submodule is
//! expanded into a directory it must sort as `name/`. [`build_mapping`]
//! computes the visiting order that puts every gitlink where a directory of
//! the same name would be.

use bstr::ByteSlice;
use git_object::TreeEntry;

use crate::byte_range::ByteRange;

/// Permutation of `entries` (in stored order) that sorts gitlinks as
/// directories, or `None` when the stored order already does.
///
/// `result[i]` is the index into `entries` of the `i`-th entry to visit.
pub fn build_mapping(entries: &[TreeEntry]) -> Option<Vec<usize>> {
    if !entries.iter().any(|e| e.mode.is_gitlink()) {
        return None;
    }
    let mut order = Vec::with_capacity(entries.len());
    let mut reordered = false;
    // Pending gitlinks with their `name/` keys; the top has the smallest key.
    let mut stack: Vec<(Vec<u8>, usize)> = Vec::new();
    let mut key = Vec::new();

    for (actual, entry) in entries.iter().enumerate() {
        key.clear();
        key.extend_from_slice(entry.name.as_bytes());
        if entry.mode.is_tree() || entry.mode.is_gitlink() {
            key.push(b'/');
        }
        let current = ByteRange::new(&key);
        while let Some((pending, position)) = stack.last() {
            if ByteRange::new(pending) >= current {
                break;
            }
            reordered |= *position != order.len();
            order.push(*position);
            stack.pop();
        }
        if entry.mode.is_gitlink() {
            stack.push((key.clone(), actual));
        } else {
            order.push(actual);
        }
    }
    while let Some((_, position)) = stack.pop() {
        reordered |= position != order.len();
        order.push(position);
    }
    reordered.then_some(order)
}
