use git_hash::ObjectId;
use git_odb::OdbError;
use git_repository::RepoError;
use git_transport::TransportError;

/// Failures while resolving a submodule.
#[derive(Debug, thiserror::Error)]
pub enum SubmoduleError {
    #[error("The '{main_url}' repository has a submodule in the '{main_commit}' commit at the '{path}' path, but has no .gitmodules configuration in the root directory")]
    MissingConfig {
        main_url: String,
        main_commit: ObjectId,
        path: String,
    },

    #[error("The repository '{main_url}' has a submodule in the '{main_commit}' commit at the '{path}' path, but has no entry for this path in .gitmodules configuration")]
    MissingEntry {
        main_url: String,
        main_commit: ObjectId,
        path: String,
    },

    #[error("Cannot find the '{commit}' commit in the '{url}' repository used as a submodule by the '{main_url}' repository in the '{main_commit}' commit at the '{path}' path")]
    MissingCommit {
        main_url: String,
        main_commit: ObjectId,
        path: String,
        url: String,
        commit: ObjectId,
    },

    #[error("{}", fetch_message(.main_url, .path, .path_from_root))]
    Fetch {
        main_url: String,
        path: String,
        path_from_root: String,
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid submodule URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error(transparent)]
    Odb(#[from] OdbError),
}

impl SubmoduleError {
    /// Errors an error-ignoring policy may swallow: the submodule is then
    /// treated as broken instead of failing the whole operation.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, SubmoduleError::MissingCommit { .. } | SubmoduleError::Fetch { .. })
    }
}

fn fetch_message(main_url: &str, path: &str, path_from_root: &str) -> String {
    if path == path_from_root {
        format!("Cannot fetch submodule. Repository URL: '{main_url}', submodule path: '{path}'.")
    } else {
        format!(
            "Cannot fetch submodule. Repository URL: '{main_url}', submodule path: '{path}', submodule path from the root: '{path_from_root}'."
        )
    }
}
