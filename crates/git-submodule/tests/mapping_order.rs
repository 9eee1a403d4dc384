use std::cmp::Ordering;
use std::collections::BTreeMap;

use git_hash::ObjectId;
use git_object::{name_compare, FileMode, TreeEntry};
use git_submodule::build_mapping;
use proptest::prelude::*;

fn mode_strategy() -> impl Strategy<Value = FileMode> {
    prop_oneof![
        Just(FileMode::Regular),
        Just(FileMode::Executable),
        Just(FileMode::Tree),
        Just(FileMode::Gitlink),
    ]
}

/// Unique names over a small alphabet that sorts around '/'.
fn entries_strategy() -> impl Strategy<Value = Vec<TreeEntry>> {
    proptest::collection::btree_map("[a-c.0-]{1,4}", mode_strategy(), 0..16).prop_map(
        |named: BTreeMap<String, FileMode>| {
            let mut entries: Vec<TreeEntry> = named
                .into_iter()
                .map(|(name, mode)| TreeEntry::new(mode, name, ObjectId::NULL_SHA1))
                .collect();
            entries.sort_by(|a, b| name_compare(&a.name, a.mode.is_tree(), &b.name, b.mode.is_tree()));
            entries
        },
    )
}

fn sorts_as_dir(e: &TreeEntry) -> bool {
    e.mode.is_tree() || e.mode.is_gitlink()
}

proptest! {
    #[test]
    fn mapped_order_sorts_gitlinks_as_directories(entries in entries_strategy()) {
        let order: Vec<usize> = build_mapping(&entries).unwrap_or_else(|| (0..entries.len()).collect());

        let mut seen = order.clone();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..entries.len()).collect::<Vec<_>>());

        for pair in order.windows(2) {
            let (a, b) = (&entries[pair[0]], &entries[pair[1]]);
            prop_assert_eq!(
                name_compare(&a.name, sorts_as_dir(a), &b.name, sorts_as_dir(b)),
                Ordering::Less,
                "{} before {}", a.name, b.name
            );
        }
    }

    #[test]
    fn no_mapping_without_gitlinks(entries in entries_strategy()) {
        let files: Vec<TreeEntry> = entries.into_iter().filter(|e| !e.mode.is_gitlink()).collect();
        prop_assert!(build_mapping(&files).is_none());
    }
}
