//! Repository handles and local mirrors of remote repositories.

mod error;
mod manager;
mod repository;

pub use error::RepoError;
pub use manager::RepositoryManager;
pub use repository::Repository;
