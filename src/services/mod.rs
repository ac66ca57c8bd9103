pub mod watcher;

pub use watcher::{watch_inbox, InboxWatcher, WatcherError};
