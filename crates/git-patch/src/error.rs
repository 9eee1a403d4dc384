use git_hash::ObjectId;
use git_odb::OdbError;
use git_repository::RepoError;
use git_submodule::SubmoduleError;
use git_transport::TransportError;
use git_utils::UtilError;

/// Failures while building, transporting or replaying a patch.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Submodule(#[from] SubmoduleError),

    #[error(transparent)]
    Odb(#[from] OdbError),

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Unable to find blob {oid}({path}) in repository {repository}")]
    ContentNotFound {
        oid: ObjectId,
        path: String,
        repository: String,
    },

    #[error("Failed to complete bulk patch at revision {revision}: {source}")]
    BulkPatch {
        revision: String,
        source: Box<PatchError>,
    },

    #[error("patch building was interrupted")]
    Interrupted,

    #[error("invalid revision '{0}'")]
    InvalidRevision(String),

    #[error("commit {revision} is not found in {repository}")]
    CommitNotFound { revision: String, repository: String },

    #[error("invalid checkout rule '{0}'")]
    InvalidRule(String),

    #[error("missing property '{0}'")]
    MissingProperty(&'static str),

    #[error("invalid value '{value}' of property '{key}'")]
    InvalidProperty { key: String, value: String },

    #[error("malformed property line '{0}'")]
    MalformedProperties(String),

    #[error("invalid patch stream: {0}")]
    InvalidStream(String),

    #[error("git patch process failed ({status}): {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("git patch for root {root} was idle for more than {seconds} second(s)")]
    ProcessIdle { root: String, seconds: u64 },

    #[error("There is not enough memory for git patch (last attempted {last_attempted_mb}M). Please contact your system administrator")]
    OutOfMemory { last_attempted_mb: u32 },

    #[error(transparent)]
    Process(#[from] UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
