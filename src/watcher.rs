//! File watching functionality using the notify crate.

use crate::error::{Error, Result};
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// What a notification means for the tailed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// New bytes may be readable through the current handle.
    Appended,
    /// The name may now point at a different file (rename, delete, create).
    Replaced,
}

/// A watch subscription for a single file.
///
/// The parent directory is watched non-recursively so that renames, deletes,
/// and re-creation of the file are all observed; events are filtered down to
/// the target file name.
pub(crate) struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    file_name: OsString,
}

impl ChangeWatcher {
    /// Subscribes to changes of `path`.
    pub(crate) fn watch(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::InvalidPath {
                message: format!("{} has no file name", path.display()),
            })?
            .to_os_string();

        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&watch_dir(path), RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            file_name,
        })
    }

    /// A subscription whose events come from the returned sender instead of
    /// the filesystem.
    #[cfg(test)]
    pub(crate) fn with_injected_events(
        path: &Path,
    ) -> Result<(Self, mpsc::UnboundedSender<notify::Result<Event>>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(|_: notify::Result<Event>| {}, Config::default())?;
        let file_name = path.file_name().unwrap_or_default().to_os_string();

        Ok((
            Self {
                _watcher: watcher,
                receiver: rx,
                file_name,
            },
            tx,
        ))
    }

    /// Waits for the next notification that concerns the watched file.
    ///
    /// Returns `None` once the notify backend has gone away. Cancel safe.
    pub(crate) async fn next_signal(&mut self) -> Option<Result<Signal>> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) => {
                    if !is_event_relevant_to_file(&event, &self.file_name) {
                        continue;
                    }
                    if let Some(signal) = classify(&event.kind) {
                        return Some(Ok(signal));
                    }
                }
                Err(e) => return Some(Err(Error::Watcher(e))),
            }
        }
    }
}

/// Directory to subscribe to for a file path. A bare file name lives in `.`.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Check if a notify event is relevant to a specific file
pub(crate) fn is_event_relevant_to_file(event: &Event, target_file_name: &OsStr) -> bool {
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(target_file_name))
}

fn classify(kind: &EventKind) -> Option<Signal> {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            Some(Signal::Replaced)
        }
        EventKind::Modify(_) => Some(Signal::Appended),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(Signal::Appended),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(Signal::Replaced),
    }
}
