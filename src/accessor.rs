//! Opening and positioning the tailed file.

use crate::error::{Error, Result};
use std::fs::Metadata;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, BufReader};

/// Identifies one file generation behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub(crate) fn of(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub(crate) fn of(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// What the path currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileStatus {
    pub identity: Option<FileIdentity>,
    pub len: u64,
}

/// A freshly opened handle, positioned according to the open policy.
#[derive(Debug)]
pub(crate) struct OpenedFile {
    pub reader: BufReader<File>,
    pub position: u64,
    pub identity: Option<FileIdentity>,
}

/// Opens the target path on behalf of the orchestrator.
pub(crate) struct FileAccessor {
    path: PathBuf,
}

impl FileAccessor {
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Opens the file for reading.
    ///
    /// A file being attached normally is positioned at its end so only future
    /// appends are read. A `fresh` file (one that reappeared after being
    /// missing) is read from the start, since its writer may already have
    /// produced lines before the watch was re-armed.
    pub(crate) async fn open(&self, fresh: bool) -> Result<OpenedFile> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|e| self.map_open_error(e))?;
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Err(Error::InvalidPath {
                message: format!("{} is a directory", self.path.display()),
            });
        }

        let position = if fresh {
            0
        } else {
            file.seek(SeekFrom::End(0)).await?
        };

        Ok(OpenedFile {
            reader: BufReader::new(file),
            position,
            identity: FileIdentity::of(&metadata),
        })
    }

    /// Stats the path without opening it. `None` means it does not exist.
    pub(crate) async fn status(&self) -> Result<Option<FileStatus>> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => Ok(Some(FileStatus {
                identity: FileIdentity::of(&metadata),
                len: metadata.len(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn map_open_error(&self, error: std::io::Error) -> Error {
        if error.kind() == ErrorKind::NotFound {
            Error::NotFound {
                path: self.path.display().to_string(),
            }
        } else {
            Error::Io(error)
        }
    }
}
