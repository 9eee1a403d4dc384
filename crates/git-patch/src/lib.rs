//! Patches between two commits of a repository, with submodules flattened
//! into the tree.
//!
//! [`PatchBuilder`] walks the "to" and "from" commits in lock-step and sends
//! file actions to a [`PatchSink`]. The patch can also be built in a child
//! process through [`PatchDispatcher`], which speaks the property protocol
//! in [`protocol`] and transfers the result as a [`stream`].

pub mod builder;
pub mod change;
pub mod child;
pub mod content;
pub mod dispatcher;
mod error;
pub mod protocol;
pub mod rules;
pub mod settings;
pub mod sink;
pub mod stream;
pub mod walk;

pub use builder::{resolve_revision, BuildSettings, PatchBuilder};
pub use change::ChangeType;
pub use child::{build_in_process, write_patch_file, ActionPrinter};
pub use content::{ContentReaders, ContentSettings, LoadContentAction};
pub use dispatcher::{DispatcherConfig, PatchDispatcher};
pub use error::PatchError;
pub use rules::CheckoutRules;
pub use settings::{PatchSettings, RootSettings};
pub use sink::{
    FileAction, FileActionListener, FileContent, NoListener, PatchAction, PatchSink, RecordedPatch, RecordingSink,
};
pub use stream::{PatchReader, PatchWriter};
pub use walk::{TreeWalk, WalkEntry};
