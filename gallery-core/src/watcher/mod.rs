//! Directory watching and listener fan-out
//!
//! One [`DirectoryWatcher`] per directory holds the OS subscription; any
//! number of consumers share it through keyed registrations in its
//! [`ListenerRegistry`].

pub mod directory;
pub mod registry;

pub use directory::{ChangeKind, DirectoryWatcher};
pub use registry::{Listener, ListenerRegistry};
