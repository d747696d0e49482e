//! Exclusive per-working-copy run lock

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// Lock file kept in an archive download directory.
pub const DOWNLOAD_LOCK_FILE_NAME: &str = ".git-mirror-download.lock";

/// Held for the duration of a run against one working copy.
///
/// The lock lives in `<workdir>.lock`, next to the working copy, so it can be
/// taken before the working copy exists. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Path of the lock file guarding `workdir`.
    pub fn lock_path(workdir: &Path) -> PathBuf {
        let mut name = workdir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "workdir".into());
        name.push(".lock");
        workdir.with_file_name(name)
    }

    /// Take the lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another run holds it, or an I/O error if
    /// the lock file cannot be created.
    pub fn acquire(workdir: &Path) -> Result<Self> {
        Self::acquire_file(Self::lock_path(workdir))
    }

    /// Lock a whole archive download directory, extraction target included.
    ///
    /// Uses `<download_dir>/.git-mirror-download.lock`, which never collides
    /// with the lock of a working copy extracted below it.
    ///
    /// # Errors
    ///
    /// Same as [`RunLock::acquire`].
    pub fn acquire_download_dir(download_dir: &Path) -> Result<Self> {
        Self::acquire_file(download_dir.join(DOWNLOAD_LOCK_FILE_NAME))
    }

    fn acquire_file(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(Error::Locked { path });
            }
            return Err(e.into());
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "Acquired run lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}
