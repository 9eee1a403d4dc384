use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::sync::Arc;

use git_hash::ObjectId;
use git_object::{Commit, ObjectType, Tree};
use lru::LruCache;
use tracing::trace;

use crate::{ObjectLoader, ObjectStore, OdbError};

const TREE_CACHE_CAPACITY: usize = 256;

/// Scoped, single-threaded access to one store.
///
/// A reader is acquired for one responsibility (tree traversal or content
/// loading) and released when dropped, which also drops every tree it
/// cached.
pub struct ObjectReader {
    store: Arc<dyn ObjectStore>,
    purpose: &'static str,
    trees: RefCell<LruCache<ObjectId, Arc<Tree>>>,
}

impl ObjectReader {
    pub fn new(store: Arc<dyn ObjectStore>, purpose: &'static str) -> Self {
        trace!(purpose, "acquired object reader");
        let capacity = NonZeroUsize::new(TREE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            purpose,
            trees: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.store.contains(oid)
    }

    /// Open an object of the expected type; a missing object is an error.
    fn open_typed(&self, oid: &ObjectId, expected: ObjectType) -> Result<ObjectLoader, OdbError> {
        let loader = self.store.open(oid)?.ok_or(OdbError::NotFound(*oid))?;
        if loader.object_type() != expected {
            return Err(OdbError::UnexpectedType {
                oid: *oid,
                expected,
                actual: loader.object_type(),
            });
        }
        Ok(loader)
    }

    pub fn read_tree(&self, oid: &ObjectId) -> Result<Arc<Tree>, OdbError> {
        if let Some(tree) = self.trees.borrow_mut().get(oid) {
            return Ok(Arc::clone(tree));
        }
        let data = self.open_typed(oid, ObjectType::Tree)?.read_all()?;
        let tree = Arc::new(Tree::parse(&data, self.store.hash_algo())?);
        self.trees.borrow_mut().put(*oid, Arc::clone(&tree));
        Ok(tree)
    }

    /// Read a commit; `Ok(None)` when the store lacks it.
    pub fn read_commit(&self, oid: &ObjectId) -> Result<Option<Commit>, OdbError> {
        if !self.store.contains(oid) {
            return Ok(None);
        }
        let data = self.open_typed(oid, ObjectType::Commit)?.read_all()?;
        Ok(Some(Commit::parse(&data)?))
    }

    /// Open a blob without reading it; `Ok(None)` when the store lacks it.
    pub fn open_blob(&self, oid: &ObjectId) -> Result<Option<ObjectLoader>, OdbError> {
        match self.store.open(oid)? {
            Some(loader) if loader.object_type() != ObjectType::Blob => Err(OdbError::UnexpectedType {
                oid: *oid,
                expected: ObjectType::Blob,
                actual: loader.object_type(),
            }),
            other => Ok(other),
        }
    }
}

impl Drop for ObjectReader {
    fn drop(&mut self) {
        let cached = self.trees.get_mut().len();
        self.trees.get_mut().clear();
        trace!(purpose = self.purpose, cached, "released object reader");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use git_object::{FileMode, TreeEntry};

    fn store_with_tree() -> (Arc<dyn ObjectStore>, ObjectId, ObjectId) {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let blob = store.write_raw(ObjectType::Blob, b"x").unwrap();
        let tree = Tree {
            entries: vec![TreeEntry::new(FileMode::Regular, "a.txt", blob)],
        };
        let tree_id = store
            .write_raw(ObjectType::Tree, &tree.serialize_content())
            .unwrap();
        (store, tree_id, blob)
    }

    #[test]
    fn reads_and_caches_trees() {
        let (store, tree_id, _) = store_with_tree();
        let reader = ObjectReader::new(store, "test");
        let first = reader.read_tree(&tree_id).unwrap();
        let second = reader.read_tree(&tree_id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.entries[0].name, "a.txt");
    }

    #[test]
    fn type_mismatch_is_reported() {
        let (store, _, blob) = store_with_tree();
        let reader = ObjectReader::new(store, "test");
        assert!(matches!(
            reader.read_tree(&blob),
            Err(OdbError::UnexpectedType { .. })
        ));
        assert!(reader.open_blob(&blob).unwrap().is_some());
    }

    #[test]
    fn missing_commit_is_none_missing_tree_is_error() {
        let (store, _, _) = store_with_tree();
        let reader = ObjectReader::new(store, "test");
        let absent = ObjectId::Sha1([7; 20]);
        assert!(reader.read_commit(&absent).unwrap().is_none());
        assert!(matches!(reader.read_tree(&absent), Err(OdbError::NotFound(_))));
    }
}
