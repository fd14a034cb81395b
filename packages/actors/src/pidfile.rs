//! Pidfile lifecycle: written once at startup, removed at shutdown.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// A pidfile holding the current process id.
#[derive(Debug)]
pub struct Pidfile {
    path: PathBuf,
    removed: AtomicBool,
}

impl Pidfile {
    /// Write the current process id to `path`.
    pub fn write(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Write to temp file first, then rename for atomicity
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        let mut file = fs::File::create(&temp_path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!("Wrote pidfile {:?}", path);
        Ok(Self {
            path,
            removed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Only the first call touches the filesystem.
    pub fn remove(&self) -> std::io::Result<bool> {
        if self.removed.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Deleted pidfile {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn writes_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.pid");

        let pidfile = Pidfile::write(&path).unwrap();
        let contents = fs::read_to_string(pidfile.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.pid");

        let pidfile = Pidfile::write(&path).unwrap();
        assert!(pidfile.remove().unwrap());
        assert!(!path.exists());
        assert!(!pidfile.remove().unwrap());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("worker.pid");
        assert!(Pidfile::write(path).is_err());
    }
}
