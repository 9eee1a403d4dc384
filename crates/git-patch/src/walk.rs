//! Lock-step recursive walk over the "to" and "from" trees.
//!
//! Both sides are [`SubmoduleAwareTreeIterator`]s, so resolved submodules
//! are walked as ordinary directories. Only leaves are yielded, and entries
//! equal on both sides are skipped without descending.

use std::cmp::Ordering;
use std::sync::Arc;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_object::{name_compare, FileMode};
use git_repository::Repository;
use git_submodule::{IterEntry, SubmoduleAwareTreeIterator};
use git_utils::path;

use crate::change::{self, ChangeType, Side};
use crate::rules::CheckoutRules;
use crate::PatchError;

/// One side of a visited path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkSide {
    /// Effective mode: `Tree` for an expanded submodule.
    pub mode: FileMode,
    pub oid: ObjectId,
    pub raw_mode: FileMode,
    pub broken: bool,
}

impl From<&IterEntry> for WalkSide {
    fn from(e: &IterEntry) -> Self {
        WalkSide {
            mode: e.mode,
            oid: e.oid,
            raw_mode: e.raw_mode,
            broken: e.broken,
        }
    }
}

impl WalkSide {
    fn side(&self) -> Side {
        Side {
            mode: self.mode,
            oid: self.oid,
        }
    }

    fn is_mount(&self) -> bool {
        self.mode.is_gitlink()
    }
}

/// A leaf path that differs between the two sides.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Path relative to the root repository.
    pub path: BString,
    pub to: Option<WalkSide>,
    pub from: Option<WalkSide>,
    /// Repository holding the "to" blob.
    pub to_repository: Option<Arc<Repository>>,
    /// The path lies at or below a mount that was broken on the "from" side.
    pub under_broken_from: bool,
}

impl WalkEntry {
    pub fn change_type(&self) -> ChangeType {
        let kind = change::classify(self.to.as_ref().map(WalkSide::side), &[self.from.as_ref().map(WalkSide::side)]);
        if kind == ChangeType::Deleted && self.under_broken_from {
            return ChangeType::Unchanged;
        }
        kind
    }

    pub fn mode_diff(&self) -> Option<&'static str> {
        change::mode_diff(self.to.as_ref().map(|s| s.mode), self.from.as_ref().map(|s| s.mode))
    }

    /// True when neither side is a mount.
    pub fn is_content(&self) -> bool {
        !self.to.as_ref().is_some_and(WalkSide::is_mount) && !self.from.as_ref().is_some_and(WalkSide::is_mount)
    }

    pub fn from_is_mount(&self) -> bool {
        self.from.as_ref().is_some_and(WalkSide::is_mount)
    }

    /// `path(to-id to-mode, from-id from-mode)` for logs.
    pub fn info(&self) -> String {
        let side = |s: &Option<WalkSide>| match s {
            Some(s) => format!("{} {:06o}", s.oid, s.mode.raw()),
            None => format!("{} {:06o}", ObjectId::NULL_SHA1, 0),
        };
        format!("{}({}, {})", self.path, side(&self.to), side(&self.from))
    }
}

/// Paths under broken mounts, seen so far in walk order.
#[derive(Debug, Default)]
struct BrokenMounts {
    in_to: Vec<BString>,
    in_from: Vec<BString>,
}

impl BrokenMounts {
    /// False when the path must not be walked at all.
    fn include(&mut self, path: &BStr, to: Option<&IterEntry>, from: Option<&IterEntry>) -> bool {
        if to.is_some_and(|t| t.mode.is_gitlink()) || self.in_to.iter().any(|p| path::is_at_or_below(path, p)) {
            self.in_to.push(path.to_owned());
            return false;
        }
        if from.is_some_and(|f| f.mode.is_gitlink()) && !self.under_from(path) {
            self.in_from.push(path.to_owned());
        }
        true
    }

    fn under_from(&self, path: &BStr) -> bool {
        self.in_from.iter().any(|p| path::is_at_or_below(path, p))
    }
}

struct Frame {
    prefix: BString,
    to: SubmoduleAwareTreeIterator,
    from: SubmoduleAwareTreeIterator,
}

pub struct TreeWalk<'r> {
    stack: Vec<Frame>,
    rules: &'r CheckoutRules,
    broken: Option<BrokenMounts>,
}

impl<'r> TreeWalk<'r> {
    /// Walk from the root levels of both sides. Broken mount attribution is
    /// active when the "to" side checks submodules out.
    pub fn new(to: SubmoduleAwareTreeIterator, from: SubmoduleAwareTreeIterator, rules: &'r CheckoutRules) -> Self {
        let broken = to.policy().checks_out().then(BrokenMounts::default);
        TreeWalk {
            stack: vec![Frame {
                prefix: BString::default(),
                to,
                from,
            }],
            rules,
            broken,
        }
    }

    /// Next differing leaf, or `None` when both sides are exhausted.
    pub fn next_entry(&mut self) -> Result<Option<WalkEntry>, PatchError> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            let to_entry = frame.to.entry().cloned();
            let from_entry = frame.from.entry().cloned();
            let order = match (&to_entry, &from_entry) {
                (None, None) => {
                    self.stack.pop();
                    continue;
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(t), Some(f)) => name_compare(&t.name, t.sorts_as_tree, &f.name, f.sorts_as_tree),
            };
            let to_here = if order != Ordering::Greater { to_entry } else { None };
            let from_here = if order != Ordering::Less { from_entry } else { None };
            let name = match (&to_here, &from_here) {
                (Some(e), _) | (None, Some(e)) => e.name.clone(),
                (None, None) => unreachable!("one side is always present"),
            };
            let entry_path = path::join(&frame.prefix, &name);

            let included = match &mut self.broken {
                Some(broken) => broken.include(entry_path.as_bstr(), to_here.as_ref(), from_here.as_ref()),
                None => true,
            };
            let equal = match (&to_here, &from_here) {
                (Some(t), Some(f)) => t.mode == f.mode && t.oid == f.oid,
                _ => false,
            };
            let to_tree = to_here.as_ref().is_some_and(|e| e.mode.is_tree());
            let from_tree = from_here.as_ref().is_some_and(|e| e.mode.is_tree());

            let mut subtree = None;
            if included && !equal && (to_tree || from_tree) && self.rules.touches(entry_path.as_bstr()) {
                let to = if to_tree { frame.to.create_subtree()? } else { frame.to.empty_sibling() };
                let from = if from_tree { frame.from.create_subtree()? } else { frame.from.empty_sibling() };
                subtree = Some(Frame {
                    prefix: entry_path.clone(),
                    to,
                    from,
                });
            }
            let to_repository = to_here.as_ref().map(|_| Arc::clone(frame.to.repository()));
            if to_here.is_some() {
                frame.to.next(1)?;
            }
            if from_here.is_some() {
                frame.from.next(1)?;
            }

            if let Some(sub) = subtree {
                self.stack.push(sub);
                continue;
            }
            if !included || equal || to_tree || from_tree {
                continue;
            }
            let under_broken_from = self
                .broken
                .as_ref()
                .is_some_and(|b| b.under_from(entry_path.as_bstr()));
            return Ok(Some(WalkEntry {
                path: entry_path,
                to: to_here.as_ref().map(WalkSide::from),
                from: from_here.as_ref().map(WalkSide::from),
                to_repository,
                under_broken_from,
            }));
        }
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = Result<WalkEntry, PatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
