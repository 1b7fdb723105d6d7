//! Bridge from native file-change notifications to engine wakeups.
//!
//! One `notify::RecommendedWatcher` serves every tracked path; its callback
//! runs on the watcher's own thread and hands events to the service task
//! over a bounded channel. Registration failures degrade to timer-only
//! polling, they never fail an attach.

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::TailError;

pub(crate) struct ChangeNotifier {
    watcher: RecommendedWatcher,
}

impl ChangeNotifier {
    /// Create the platform watcher; events arrive on the returned channel.
    pub fn new() -> Result<(Self, mpsc::Receiver<notify::Result<Event>>), TailError> {
        let (tx, rx) = mpsc::channel(100);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok((Self { watcher }, rx))
    }

    /// Register a watch for one file. Returns whether registration took;
    /// on failure the poll timer still covers the path.
    pub fn watch_file(&mut self, path: &Path) -> bool {
        match self.watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => {
                crate::debug_event!("watch", "registered", "{}", path.display());
                true
            }
            Err(e) => {
                tracing::warn!(
                    "[watch] cannot watch {}, polling only: {e}",
                    path.display()
                );
                false
            }
        }
    }

    pub fn unwatch_file(&mut self, path: &Path) {
        if let Err(e) = self.watcher.unwatch(path) {
            tracing::warn!("[watch] failed to remove watch for {}: {e}", path.display());
        }
    }
}

/// Whether an event kind should wake the follow engine.
///
/// Only modifications carry new content. Removals are deliberately ignored:
/// the engine keeps reading its open handle, and teardown is driven by
/// detach alone. A spurious wake is harmless either way.
pub(crate) fn wakes_engine(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Any)
}
