use crate::pipeline::BlobEvent;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// How long a file must be quiet before its create event is delivered
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Workbook formats the pipeline can open
const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Inbox is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to resolve inbox {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create watcher: {0}")]
    Create(notify::Error),

    #[error("Failed to watch path: {0}")]
    Watch(notify::Error),
}

/// Running inbox watcher. Watching stops when this is dropped.
pub struct InboxWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

/// Watch `inbox` (non-recursive) and send a [`BlobEvent`] for every new spreadsheet
pub fn watch_inbox(inbox: &Path, tx: UnboundedSender<BlobEvent>) -> Result<InboxWatcher, WatcherError> {
    if !inbox.is_dir() {
        return Err(WatcherError::NotADirectory(inbox.to_path_buf()));
    }

    let root = inbox.canonicalize().map_err(|source| WatcherError::Resolve {
        path: inbox.to_path_buf(),
        source,
    })?;
    let watched = root.clone();

    let mut debouncer = new_debouncer(
        DEBOUNCE_WINDOW,
        None,
        move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
            Ok(events) => {
                for event in events {
                    handle_file_event(&event, &watched, &tx);
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!(error = ?error, "Watcher error");
                }
            }
        },
    )
    .map_err(WatcherError::Create)?;

    debouncer
        .watch(&root, RecursiveMode::NonRecursive)
        .map_err(WatcherError::Watch)?;

    tracing::info!(inbox = %root.display(), "Watching inbox");

    Ok(InboxWatcher {
        _debouncer: debouncer,
    })
}

fn handle_file_event(event: &DebouncedEvent, inbox: &Path, tx: &UnboundedSender<BlobEvent>) {
    for path in landed_paths(&event.event) {
        let Some(blob) = read_new_file(path, inbox) else {
            continue;
        };
        if tx.send(blob).is_err() {
            tracing::warn!(path = %path.display(), "Event consumer has stopped, dropping file");
        }
    }
}

/// Paths that just appeared in the inbox: created files, and files renamed
/// or moved into place
fn landed_paths(event: &Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Create(_) => &event.paths,
        // Paths are [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .last()
            .map(std::slice::from_ref)
            .unwrap_or_default(),
        // Platforms that cannot pair both sides report each path on its own;
        // sources that no longer exist are dropped when read
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => &event.paths,
        _ => &[],
    }
}

/// Build an event for a newly created file, or `None` if it should be ignored
fn read_new_file(path: &Path, inbox: &Path) -> Option<BlobEvent> {
    let file_name = path.file_name()?.to_string_lossy().to_string();
    if is_ignored_name(&file_name) || !is_spreadsheet(path) {
        return None;
    }

    // symlink_metadata so links are never followed
    let metadata = std::fs::symlink_metadata(path).ok()?;
    if !metadata.file_type().is_file() {
        return None;
    }

    // Still being written
    if metadata.len() == 0 {
        return None;
    }

    let canonical = path.canonicalize().ok()?;
    let Ok(relative) = canonical.strip_prefix(inbox) else {
        tracing::warn!(path = %path.display(), "Skipping file outside inbox");
        return None;
    };
    let name = relative.to_string_lossy().replace('\\', "/");

    match std::fs::read(&canonical) {
        Ok(bytes) => Some(BlobEvent::new(name, bytes)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read new file");
            None
        }
    }
}

/// Hidden files, temp files, and partial downloads
fn is_ignored_name(file_name: &str) -> bool {
    file_name.starts_with('.')
        || file_name.starts_with("~$")
        || file_name.ends_with(".tmp")
        || file_name.ends_with(".crdownload")
        || file_name.ends_with(".part")
        || file_name.ends_with(".download")
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map_or(false, |ext| SPREADSHEET_EXTENSIONS.contains(&ext.as_str()))
}
