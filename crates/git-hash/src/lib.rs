//! Object identity for the gitpatch workspace.
//!
//! Provides [`ObjectId`], hex conversion, and the object hasher used when
//! writing objects into a store.

mod error;
pub mod hasher;
mod oid;

pub use error::HashError;
pub use oid::{HashAlgorithm, ObjectId};
