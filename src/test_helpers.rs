//! Test utilities for creating, growing, and rotating temporary log files.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new, empty temporary log file
    pub fn new() -> std::io::Result<Self> {
        let temp_file = Self::missing()?;
        File::create(&temp_file.path)?;
        Ok(temp_file)
    }

    /// Reserve a log path inside a temporary directory without creating the file
    pub fn missing() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file with one initial line
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_content(content)?;
        Ok(temp_file)
    }

    /// Append a newline-terminated line
    pub fn append_content(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;

        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(())
    }

    /// Append raw bytes, without adding a terminator
    pub fn append_raw(&self, content: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(content)?;
        file.flush()?;
        Ok(())
    }

    /// Truncate the file in place (copytruncate rotation)
    pub fn truncate(&self) -> std::io::Result<()> {
        File::create(&self.path)?;
        Ok(())
    }

    /// Move the file to `<name>.1`, leaving the path empty
    pub fn rename_away(&self) -> std::io::Result<PathBuf> {
        let rotated = self.rotated_path();
        fs::rename(&self.path, &rotated)?;
        Ok(rotated)
    }

    /// Create a new file generation at the path with the given raw content
    pub fn recreate(&self, content: &str) -> std::io::Result<()> {
        fs::write(&self.path, content)
    }

    pub fn remove(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }

    pub fn rotated_path(&self) -> PathBuf {
        self.path.with_extension("log.1")
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
    }

    #[tokio::test]
    async fn test_missing_temp_log_file() {
        let temp_file = TempLogFile::missing().unwrap();
        assert!(!temp_file.path().exists());
        assert!(temp_file.path().parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_append_content_and_raw() {
        let temp_file = TempLogFile::new().unwrap();
        temp_file.append_content("line 1").unwrap();
        temp_file.append_raw(b"part").unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\npart");
    }

    #[tokio::test]
    async fn test_rename_and_recreate() {
        let temp_file = TempLogFile::with_content("old").unwrap();
        let rotated = temp_file.rename_away().unwrap();

        assert!(!temp_file.path().exists());
        assert_eq!(fs::read_to_string(&rotated).unwrap(), "old\n");

        temp_file.recreate("new\n").unwrap();
        assert_eq!(fs::read_to_string(temp_file.path()).unwrap(), "new\n");
    }

    #[tokio::test]
    async fn test_truncate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        temp_file.truncate().unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }
}
