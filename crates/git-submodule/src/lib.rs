//! Submodule support for tree walks.
//!
//! A gitlink entry records a commit of another repository. Under a checkout
//! policy the [`SubmoduleAwareTreeIterator`] resolves such entries through a
//! [`SubmoduleResolver`] (reading `.gitmodules`, fetching the commit into a
//! local mirror when needed) and presents the submodule as a directory.

pub mod byte_range;
pub mod config;
mod error;
pub mod fetch;
pub mod iterator;
pub mod mapping;
pub mod policy;
pub mod resolver;
pub mod url;

pub use config::{SubmoduleDescriptor, SubmodulesConfig};
pub use error::SubmoduleError;
pub use fetch::{Fetcher, LocalFetcher};
pub use iterator::{AllMounts, IterEntry, MountScope, SubmoduleAwareTreeIterator};
pub use mapping::build_mapping;
pub use policy::{CheckoutMode, ErrorHandling, SubmodulePolicy, UnknownPolicy};
pub use resolver::{ResolvedSubmodule, SubmoduleContext, SubmoduleResolver};
pub use url::resolve_submodule_url;
