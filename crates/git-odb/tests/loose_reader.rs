//! Reading trees, commits and blobs from a loose store on disk.

use std::io::Read;
use std::sync::Arc;

use git_hash::ObjectId;
use git_object::{Commit, FileMode, ObjectType, Tree, TreeEntry};
use git_odb::{LooseStore, ObjectReader, ObjectStore, OdbError};

fn write_commit(store: &dyn ObjectStore, files: &[(&str, &[u8])]) -> (ObjectId, ObjectId) {
    let entries = files
        .iter()
        .map(|(name, content)| {
            let oid = store.write_raw(ObjectType::Blob, content).unwrap();
            TreeEntry::new(FileMode::Regular, *name, oid)
        })
        .collect();
    let tree = store
        .write_raw(ObjectType::Tree, &Tree { entries }.serialize_content())
        .unwrap();
    let commit = Commit {
        tree,
        parents: vec![],
        author: "A <a@example.com> 0 +0000".into(),
        committer: "A <a@example.com> 0 +0000".into(),
        message: "init\n".into(),
    };
    let id = store
        .write_raw(ObjectType::Commit, &commit.serialize_content())
        .unwrap();
    (id, tree)
}

#[test]
fn commit_tree_blob_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LooseStore::open(dir.path().join("objects")));
    let (commit_id, tree_id) = write_commit(store.as_ref(), &[("a.txt", b"x"), ("b.txt", b"yy")]);

    let reader = ObjectReader::new(Arc::clone(&store), "test");
    let commit = reader.read_commit(&commit_id).unwrap().unwrap();
    assert_eq!(commit.tree, tree_id);

    let tree = reader.read_tree(&commit.tree).unwrap();
    let names: Vec<_> = tree.entries.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(names, ["a.txt", "b.txt"]);

    let blob = reader.open_blob(&tree.entries[1].oid).unwrap().unwrap();
    let mut content = Vec::new();
    blob.open_stream().unwrap().read_to_end(&mut content).unwrap();
    assert_eq!(content, b"yy");
}

#[test]
fn commit_read_as_tree_is_a_type_error() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LooseStore::open(dir.path()));
    let (commit_id, _) = write_commit(store.as_ref(), &[("a", b"1")]);
    let reader = ObjectReader::new(store, "test");
    assert!(matches!(
        reader.read_tree(&commit_id),
        Err(OdbError::UnexpectedType { expected: ObjectType::Tree, .. })
    ));
}
