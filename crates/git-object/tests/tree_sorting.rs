use std::cmp::Ordering;

use git_hash::ObjectId;
use git_object::{name_compare, FileMode, TreeEntry};
use proptest::prelude::*;

fn entry(name: &str, mode: FileMode) -> TreeEntry {
    TreeEntry::new(mode, name, ObjectId::NULL_SHA1)
}

#[test]
fn dir_sorts_after_dot_and_hyphen() {
    assert_eq!(
        entry("foo", FileMode::Tree).cmp(&entry("foo.c", FileMode::Regular)),
        Ordering::Greater
    );
    assert_eq!(
        entry("foo", FileMode::Tree).cmp(&entry("foo-bar", FileMode::Regular)),
        Ordering::Greater
    );
}

#[test]
fn gitlink_and_tree_of_same_name_differ() {
    // The same name flips position once a gitlink is treated as a directory.
    let dot = entry("a.c", FileMode::Regular);
    assert!(entry("a", FileMode::Gitlink) < dot);
    assert!(entry("a", FileMode::Tree) > dot);
}

#[test]
fn sorted_listing_matches_git() {
    let mut entries = vec![
        entry("foo0", FileMode::Regular),
        entry("foo", FileMode::Tree),
        entry("foo.c", FileMode::Regular),
        entry("foo-bar", FileMode::Regular),
        entry("bar", FileMode::Executable),
    ];
    entries.sort();
    let names: Vec<_> = entries.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(names, ["bar", "foo-bar", "foo.c", "foo", "foo0"]);
}

proptest! {
    #[test]
    fn compare_is_antisymmetric(
        a in "[a-c./0-]{1,4}",
        b in "[a-c./0-]{1,4}",
        ta in any::<bool>(),
        tb in any::<bool>(),
    ) {
        let ab = name_compare(a.as_bytes(), ta, b.as_bytes(), tb);
        let ba = name_compare(b.as_bytes(), tb, a.as_bytes(), ta);
        prop_assert_eq!(ab, ba.reverse());
    }
}
