use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::ObjectType;

use crate::{ObjectLoader, ObjectStore, OdbError};

/// Object store held entirely in memory.
///
/// Used for tests and for throwaway repositories.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectId, (ObjectType, Arc<[u8]>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop an object, simulating a damaged repository.
    pub fn remove(&self, oid: &ObjectId) -> bool {
        self.objects
            .write()
            .map(|mut m| m.remove(oid).is_some())
            .unwrap_or(false)
    }
}

impl ObjectStore for MemoryStore {
    fn contains(&self, oid: &ObjectId) -> bool {
        self.objects
            .read()
            .map(|m| m.contains_key(oid))
            .unwrap_or(false)
    }

    fn open(&self, oid: &ObjectId) -> Result<Option<ObjectLoader>, OdbError> {
        let objects = self.objects.read().map_err(|_| poisoned(oid))?;
        Ok(objects
            .get(oid)
            .map(|(ty, data)| ObjectLoader::cached(*ty, Arc::clone(data))))
    }

    fn write_raw(&self, obj_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        let oid = Hasher::hash_object(HashAlgorithm::Sha1, obj_type.as_str(), content)?;
        let mut objects = self.objects.write().map_err(|_| poisoned(&oid))?;
        objects
            .entry(oid)
            .or_insert_with(|| (obj_type, Arc::from(content)));
        Ok(oid)
    }

    fn list(&self) -> Result<Vec<ObjectId>, OdbError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| poisoned(&ObjectId::NULL_SHA1))?;
        Ok(objects.keys().copied().collect())
    }
}

fn poisoned(oid: &ObjectId) -> OdbError {
    OdbError::Corrupt {
        oid: *oid,
        reason: "object map lock poisoned".into(),
    }
}
