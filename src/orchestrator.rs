//! The attach/retry state machine.
//!
//! The orchestrator owns the watch subscription and decides when the line
//! reader gets a new file handle. The previous handle and subscription are
//! always released before new ones are acquired, so at most one of each is
//! open at any time.

use crate::accessor::{FileAccessor, FileIdentity};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::reader::LineReader;
use crate::watcher::{ChangeWatcher, Signal};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// The result of comparing the path with the handle being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileChange {
    Unchanged,
    /// Same file, but shorter than what has already been read.
    Truncated,
    /// The path no longer refers to the file behind the handle.
    Rotated,
}

pub(crate) struct Orchestrator {
    path: PathBuf,
    config: Config,
    accessor: FileAccessor,
    watcher: Option<ChangeWatcher>,
    identity: Option<FileIdentity>,
}

impl Orchestrator {
    pub(crate) fn new(path: PathBuf, config: Config) -> Self {
        Self {
            accessor: FileAccessor::new(&path),
            path,
            config,
            watcher: None,
            identity: None,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    #[cfg(test)]
    pub(crate) fn replace_watcher(&mut self, watcher: ChangeWatcher) {
        self.watcher = Some(watcher);
    }

    /// Performs the initial attach under the configured timeout.
    ///
    /// With a zero timeout the first failure is returned as is. Otherwise
    /// attempts repeat every `retry_interval` until one succeeds or the
    /// window closes, in which case `Error::Timeout` carries the last
    /// failure. An attempt that has already completed when the deadline is
    /// checked wins over the timer.
    pub(crate) async fn attach(&mut self, lines: &mut LineReader) -> Result<()> {
        let mut fresh = false;
        if self.config.timeout.is_zero() {
            let result = self.attempt(lines, &mut fresh).await;
            if result.is_err() {
                self.release(lines);
            }
            return result;
        }

        let window = self.config.timeout;
        let retry_interval = self.config.retry_interval;
        let mut last_error = None;

        let attempts = async {
            loop {
                match self.attempt(lines, &mut fresh).await {
                    Ok(()) => return,
                    Err(e) => {
                        debug!(path = %self.path.display(), error = %e, "attach attempt failed");
                        last_error = Some(e);
                    }
                }
                tokio::time::sleep(retry_interval).await;
            }
        };
        let outcome = tokio::time::timeout(window, attempts).await;

        match outcome {
            Ok(()) => Ok(()),
            Err(_) => {
                self.release(lines);
                Err(Error::Timeout {
                    path: self.path.display().to_string(),
                    last: last_error.map(Box::new),
                })
            }
        }
    }

    /// Re-runs the open/watch cycle after the current attachment was lost.
    ///
    /// Retries without a deadline. Returns `false` if shutdown was requested
    /// before a new attachment was made.
    pub(crate) async fn reattach(
        &mut self,
        lines: &mut LineReader,
        fresh: bool,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> bool {
        let mut fresh = fresh;
        self.release(lines);

        loop {
            match self.attempt(lines, &mut fresh).await {
                Ok(()) => {
                    info!(path = %self.path.display(), position = lines.position(), "re-attached");
                    return true;
                }
                Err(e) if e.is_not_found() => {
                    trace!(path = %self.path.display(), "waiting for file to reappear");
                }
                Err(e) => {
                    debug!(path = %self.path.display(), error = %e, "re-attach attempt failed");
                }
            }

            tokio::select! {
                _ = shutdown.recv() => return false,
                _ = tokio::time::sleep(self.config.retry_interval) => {}
            }
        }
    }

    /// One open-then-watch attempt.
    async fn attempt(&mut self, lines: &mut LineReader, fresh: &mut bool) -> Result<()> {
        lines.release();
        let opened = match self.accessor.open(*fresh).await {
            Ok(opened) => opened,
            Err(e) => {
                if e.is_not_found() {
                    *fresh = true;
                }
                return Err(e);
            }
        };
        self.identity = opened.identity;
        lines.install(opened.reader, opened.position);

        self.watcher = None;
        self.watcher = Some(ChangeWatcher::watch(&self.path)?);
        *fresh = false;
        Ok(())
    }

    /// Waits for the next notification from the current subscription.
    pub(crate) async fn next_signal(&mut self) -> Option<Result<Signal>> {
        match self.watcher.as_mut() {
            Some(watcher) => watcher.next_signal().await,
            None => std::future::pending().await,
        }
    }

    /// Compares the path against the handle being read.
    ///
    /// `notified` means a rename/delete/create notification prompted the
    /// check; without file identities such a notification is trusted.
    pub(crate) async fn inspect(&mut self, position: u64, notified: bool) -> FileChange {
        let status = match self.accessor.status().await {
            Ok(Some(status)) => status,
            Ok(None) => return FileChange::Rotated,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "stat failed");
                return FileChange::Unchanged;
            }
        };

        match (self.identity, status.identity) {
            (Some(held), Some(current)) if held != current => return FileChange::Rotated,
            (None, _) | (_, None) if notified => return FileChange::Rotated,
            _ => {}
        }

        if status.len < position {
            FileChange::Truncated
        } else {
            FileChange::Unchanged
        }
    }

    /// Drops the file handle and the watch subscription.
    pub(crate) fn release(&mut self, lines: &mut LineReader) {
        lines.release();
        self.watcher = None;
        self.identity = None;
    }
}
