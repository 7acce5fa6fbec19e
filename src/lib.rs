//! A rotation-aware `tail -f` library.
//!
//! A [`TailSession`] follows one growing file and yields every line appended
//! after it attached. When the file is renamed or deleted and a new one is
//! created at the same path, the session switches to the new file and reads
//! it from its beginning. A truncated file is re-read from the start.
//!
//! # Example
//!
//! ```rust,no_run
//! use rotail::{Config, attach};
//! use std::time::Duration;
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default().with_timeout(Duration::from_secs(10));
//!     let mut session = attach("app.log", config).await?;
//!
//!     while let Some(line) = session.next().await {
//!         match line {
//!             Ok(line) => println!("{}", line),
//!             Err(e) => eprintln!("Session ended: {}", e),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

// Internal modules - not part of public API
mod accessor;
mod config;
mod error;
mod orchestrator;
mod reader;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use config::Config;
pub use error::{Error, Result};
pub use stream::TailSession;

use std::path::Path;

/// Starts tailing `path`.
///
/// Waits until the file is open and watched. With a zero `timeout` a missing
/// file fails immediately with [`Error::NotFound`]; otherwise the attach is
/// retried until it succeeds or [`Error::Timeout`] is returned.
///
/// # Example
///
/// ```rust,no_run
/// use rotail::{Config, attach};
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut session = attach("app.log", Config::default()).await?;
///
///     if let Some(line) = session.next().await {
///         println!("First new line: {}", line?);
///     }
///
///     session.close().await;
///     Ok(())
/// }
/// ```
pub async fn attach<P: AsRef<Path>>(path: P, config: Config) -> Result<TailSession> {
    TailSession::attach(path, config).await
}
