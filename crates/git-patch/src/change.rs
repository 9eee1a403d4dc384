//! Per-path change classification.

use std::fmt;

use git_hash::ObjectId;
use git_object::FileMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Unchanged,
    Added,
    Modified,
    Deleted,
    FileModeChanged,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Unchanged => "UNCHANGED",
            ChangeType::Added => "ADDED",
            ChangeType::Modified => "MODIFIED",
            ChangeType::Deleted => "DELETED",
            ChangeType::FileModeChanged => "FILE_MODE_CHANGED",
        })
    }
}

/// One side of a visited path: effective mode and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Side {
    pub mode: FileMode,
    pub oid: ObjectId,
}

/// Classify a path seen in `current` against its `parents`.
///
/// A change that some parent already has counts as unchanged, so with
/// several parents only paths differing from all of them are reported.
pub fn classify(current: Option<Side>, parents: &[Option<Side>]) -> ChangeType {
    let Some(current) = current else {
        return if parents.iter().any(Option::is_none) {
            ChangeType::Unchanged
        } else {
            ChangeType::Deleted
        };
    };
    if parents.iter().all(Option::is_none) {
        return ChangeType::Added;
    }
    if !parents.iter().flatten().any(|p| p.oid == current.oid) {
        return ChangeType::Modified;
    }
    if parents.iter().all(|p| p.map_or(0, |p| p.mode.raw()) != current.mode.raw()) {
        return ChangeType::FileModeChanged;
    }
    ChangeType::Unchanged
}

const EXECUTABLE_BIT: u32 = 0o100;

/// chmod argument for the executable bit going from `from` to `to`.
pub fn mode_diff(to: Option<FileMode>, from: Option<FileMode>) -> Option<&'static str> {
    let exec = |m: Option<FileMode>| m.is_some_and(|m| m.raw() & EXECUTABLE_BIT != 0);
    match (exec(to), exec(from)) {
        (true, false) => Some("a+x"),
        (false, true) => Some("a-x"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(mode: FileMode, hex_digit: char) -> Option<Side> {
        let oid = ObjectId::from_hex(&hex_digit.to_string().repeat(40)).unwrap();
        Some(Side { mode, oid })
    }

    #[test]
    fn two_sided() {
        use ChangeType::*;
        let a = side(FileMode::Regular, 'a');
        let b = side(FileMode::Regular, 'b');
        let a_exec = side(FileMode::Executable, 'a');
        assert_eq!(classify(a, &[None]), Added);
        assert_eq!(classify(None, &[a]), Deleted);
        assert_eq!(classify(a, &[b]), Modified);
        assert_eq!(classify(a_exec, &[a]), FileModeChanged);
        assert_eq!(classify(a, &[a]), Unchanged);
    }

    #[test]
    fn several_parents() {
        use ChangeType::*;
        let a = side(FileMode::Regular, 'a');
        let b = side(FileMode::Regular, 'b');
        assert_eq!(classify(None, &[a, None]), Unchanged);
        assert_eq!(classify(a, &[b, a]), Unchanged);
        assert_eq!(classify(a, &[b, None]), Modified);
    }

    #[test]
    fn executable_bit() {
        assert_eq!(mode_diff(Some(FileMode::Executable), Some(FileMode::Regular)), Some("a+x"));
        assert_eq!(mode_diff(Some(FileMode::Regular), Some(FileMode::Executable)), Some("a-x"));
        assert_eq!(mode_diff(Some(FileMode::Executable), None), Some("a+x"));
        assert_eq!(mode_diff(Some(FileMode::Regular), None), None);
        assert_eq!(mode_diff(Some(FileMode::Symlink), Some(FileMode::Regular)), None);
    }
}
