//! Object stores for the patch builder.
//!
//! An [`ObjectStore`] hands out [`ObjectLoader`]s, which know an object's
//! type and size up front and produce its content either from memory or as
//! a lazily opened stream. Tree and commit access goes through a scoped
//! [`ObjectReader`].

mod loader;
mod loose;
mod memory;
mod reader;

pub use loader::ObjectLoader;
pub use loose::LooseStore;
pub use memory::MemoryStore;
pub use reader::ObjectReader;

use git_hash::{HashAlgorithm, HashError, ObjectId};
use git_object::{ObjectError, ObjectType};

#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("object {oid} is a {actual}, expected a {expected}")]
    UnexpectedType {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Storage of git objects addressed by id.
pub trait ObjectStore: Send + Sync {
    fn hash_algo(&self) -> HashAlgorithm {
        HashAlgorithm::Sha1
    }

    fn contains(&self, oid: &ObjectId) -> bool;

    /// Open an object. `Ok(None)` means the store does not have it.
    fn open(&self, oid: &ObjectId) -> Result<Option<ObjectLoader>, OdbError>;

    /// Store an object, returning its id. Writing an existing object is a no-op.
    fn write_raw(&self, obj_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError>;

    /// Ids of every object in the store.
    fn list(&self) -> Result<Vec<ObjectId>, OdbError>;
}
