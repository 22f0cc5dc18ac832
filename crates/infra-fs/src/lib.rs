// dirqueue Infrastructure - Filesystem Adapters
// Implements: StateStore, JobWatcher

pub mod directory_store;
pub mod watcher;

pub use directory_store::DirectoryStateStore;
pub use watcher::NotifyWatcher;
