//! The tailing session and its background task.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::orchestrator::{FileChange, Orchestrator};
use crate::reader::LineReader;
use crate::watcher::Signal;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Upper bound on lines handed out per read so shutdown and back-pressure
/// are observed while working through a large backlog.
const MAX_BATCH: usize = 1024;

/// A live tailing session over one path.
///
/// Yields each completed line, without its terminator, in file order. A
/// terminal watch failure is yielded as a final `Err`, after which the
/// stream ends.
pub struct TailSession {
    path: PathBuf,
    receiver: LineReceiver,
    shutdown_tx: broadcast::Sender<()>,
    task_handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl TailSession {
    /// Attaches to `path`, blocking until the initial attach succeeds, fails,
    /// or times out.
    pub async fn attach<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        config.validate()?;
        if path.file_name().is_none() {
            return Err(Error::InvalidPath {
                message: format!("{} has no file name", path.display()),
            });
        }

        let mut orchestrator = Orchestrator::new(path.clone(), config.clone());
        let mut lines = LineReader::new();
        orchestrator.attach(&mut lines).await?;
        info!(path = %path.display(), position = lines.position(), "attached");

        let (sender, receiver) = line_channel(config.capacity);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task_handle = tokio::spawn(tail_task(
            orchestrator,
            lines,
            config,
            sender,
            shutdown_rx,
        ));

        Ok(TailSession {
            path,
            receiver,
            shutdown_tx,
            task_handle: Some(task_handle),
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next line. `None` once the session has ended.
    pub async fn next_line(&mut self) -> Option<Result<String>> {
        if self.closed {
            return None;
        }
        self.receiver.recv().await
    }

    /// Stops the background task and waits until the file handle and watch
    /// subscription are released. Safe to call more than once.
    pub async fn close(&mut self) {
        self.closed = true;
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                warn!(path = %self.path.display(), error = %e, "tail task did not stop cleanly");
            }
        }
    }

    /// True once the background task has stopped.
    pub fn is_closed(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for TailSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Stream for TailSession {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

/// Output queue, bounded or not depending on `Config::capacity`.
enum LineSender {
    Bounded(mpsc::Sender<Result<String>>),
    Unbounded(mpsc::UnboundedSender<Result<String>>),
}

enum LineReceiver {
    Bounded(mpsc::Receiver<Result<String>>),
    Unbounded(mpsc::UnboundedReceiver<Result<String>>),
}

fn line_channel(capacity: Option<usize>) -> (LineSender, LineReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (LineSender::Bounded(tx), LineReceiver::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (LineSender::Unbounded(tx), LineReceiver::Unbounded(rx))
        }
    }
}

impl LineSender {
    /// Hands one item to the consumer. Returns false if the session should stop.
    async fn deliver(
        &self,
        item: Result<String>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> bool {
        match self {
            LineSender::Bounded(tx) => tokio::select! {
                _ = shutdown_rx.recv() => false,
                sent = tx.send(item) => sent.is_ok(),
            },
            LineSender::Unbounded(tx) => {
                // Sending never waits here, so shutdown has to be checked explicitly.
                if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                    return false;
                }
                tx.send(item).is_ok()
            }
        }
    }
}

impl LineReceiver {
    async fn recv(&mut self) -> Option<Result<String>> {
        match self {
            LineReceiver::Bounded(rx) => rx.recv().await,
            LineReceiver::Unbounded(rx) => rx.recv().await,
        }
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<String>>> {
        match self {
            LineReceiver::Bounded(rx) => rx.poll_recv(cx),
            LineReceiver::Unbounded(rx) => rx.poll_recv(cx),
        }
    }
}

/// What woke the session task.
enum Wake {
    Shutdown,
    Notified(Option<Result<Signal>>),
    Tick,
}

/// What the task should do with the file after a wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Read,
    Inspect { notified: bool },
}

/// Background task that owns the orchestrator and the line reader.
///
/// Every mutation of the file handle and watch subscription happens here,
/// so no other task ever observes them mid-swap.
async fn tail_task(
    mut orchestrator: Orchestrator,
    mut lines: LineReader,
    config: Config,
    tx: LineSender,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Lines may have been appended between the open and the spawn.
    let mut step = Some(Step::Read);

    loop {
        if let Some(current) = step.take() {
            if !run_step(current, &mut orchestrator, &mut lines, &tx, &mut shutdown_rx).await {
                break;
            }
        }

        let wake = tokio::select! {
            _ = shutdown_rx.recv() => Wake::Shutdown,
            signal = orchestrator.next_signal() => Wake::Notified(signal),
            _ = poll.tick() => Wake::Tick,
        };

        step = match wake {
            Wake::Shutdown => break,
            Wake::Tick => Some(Step::Inspect { notified: false }),
            // Appends also get the length check so a truncation is seen early.
            Wake::Notified(Some(Ok(Signal::Appended))) => Some(Step::Inspect { notified: false }),
            Wake::Notified(Some(Ok(Signal::Replaced))) => Some(Step::Inspect { notified: true }),
            Wake::Notified(Some(Err(e))) => {
                warn!(path = %orchestrator.path().display(), error = %e, "watch failed, ending session");
                let _ = tx.deliver(Err(e), &mut shutdown_rx).await;
                break;
            }
            Wake::Notified(None) => {
                let path = orchestrator.path().display().to_string();
                warn!(path = %path, "watch stopped, ending session");
                let _ = tx.deliver(Err(Error::WatcherStopped { path }), &mut shutdown_rx).await;
                break;
            }
        };
    }

    orchestrator.release(&mut lines);
    info!(path = %orchestrator.path().display(), "tail session stopped");
}

/// Runs one step. Returns false when the session should stop.
async fn run_step(
    step: Step,
    orchestrator: &mut Orchestrator,
    lines: &mut LineReader,
    tx: &LineSender,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> bool {
    if let Step::Inspect { notified } = step {
        match orchestrator.inspect(lines.position(), notified).await {
            FileChange::Unchanged => {}
            FileChange::Truncated => {
                debug!(path = %orchestrator.path().display(), "file truncated, reading from start");
                if let Err(e) = lines.rewind().await {
                    debug!(error = %e, "rewind failed");
                    if !orchestrator.reattach(lines, false, shutdown_rx).await {
                        return false;
                    }
                }
            }
            FileChange::Rotated => {
                debug!(path = %orchestrator.path().display(), "file rotated");
                // Finish the old generation before switching.
                if !drain(orchestrator, lines, tx, shutdown_rx).await {
                    return false;
                }
                if !orchestrator.reattach(lines, true, shutdown_rx).await {
                    return false;
                }
            }
        }
    }

    drain(orchestrator, lines, tx, shutdown_rx).await
}

/// Delivers every complete line currently readable.
///
/// A read failure releases the handle and re-attaches. Returns false when
/// the session should stop.
async fn drain(
    orchestrator: &mut Orchestrator,
    lines: &mut LineReader,
    tx: &LineSender,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> bool {
    loop {
        let batch = match lines.read_lines(MAX_BATCH).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(path = %orchestrator.path().display(), error = %e, "read failed, re-attaching");
                if !orchestrator.reattach(lines, false, shutdown_rx).await {
                    return false;
                }
                continue;
            }
        };

        let full = batch.len() == MAX_BATCH;
        for line in batch {
            if !tx.deliver(Ok(line), shutdown_rx).await {
                return false;
            }
        }
        if !full {
            return true;
        }
    }
}
