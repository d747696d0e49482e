//! Repository archives: download, extraction and dated backups
//!
//! Some upstreams are only published as a tarball of a working copy that
//! already tracks the upstream remote. [`ArchiveFetcher`] turns such a URI into
//! a directory that [`MirrorPlan::archive_mode`](crate::MirrorPlan::archive_mode)
//! can open.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use reqwest::blocking::Client;

use crate::{Error, Result, RunLock};

/// Directory under the download directory that archives are extracted into.
pub const EXTRACT_DIR_NAME: &str = "repo";

const DEFAULT_DOWNLOAD_NAME: &str = "repository.tar.gz";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Turns an archive URI into a working directory.
pub trait ArchiveFetcher {
    /// Make the archive at `uri` available locally and return its path.
    fn fetch(&self, uri: &str) -> Result<PathBuf>;

    /// Extract `archive` and return the working copy directory inside it.
    fn extract(&self, archive: &Path) -> Result<PathBuf>;
}

/// Downloads over HTTP(S), copies local files, and extracts with the system `tar`.
#[derive(Debug)]
pub struct HttpArchiveFetcher {
    download_dir: PathBuf,
    http: Client,
}

impl HttpArchiveFetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(download_dir: impl Into<PathBuf>) -> Result<Self> {
        let http = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| Error::archive("HTTP client", e))?;
        Ok(Self {
            download_dir: download_dir.into(),
            http,
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Hold the download directory for the rest of a run.
    ///
    /// Take this before [`fetch`](ArchiveFetcher::fetch): extraction wipes
    /// `<download_dir>/repo`, which another run may still be using.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another run holds the directory.
    pub fn lock(&self) -> Result<RunLock> {
        RunLock::acquire_download_dir(&self.download_dir)
    }

    fn download(&self, uri: &str, dest: &Path) -> Result<()> {
        tracing::debug!(uri, dest = %dest.display(), "Downloading archive");
        let mut response = self
            .http
            .get(uri)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::archive(redact_query(uri), e.without_url()))?;
        let mut file = File::create(dest)?;
        response
            .copy_to(&mut file)
            .map_err(|e| Error::archive(redact_query(uri), e.without_url()))?;
        Ok(())
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&self, uri: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.download_dir)?;
        let dest = self.download_dir.join(file_name_from_uri(uri));

        if is_http(uri) {
            self.download(uri, &dest)?;
        } else {
            let source = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
            if !source.is_file() {
                return Err(Error::archive(uri, "no such file"));
            }
            let same_file = dest.exists() && fs::canonicalize(source)? == fs::canonicalize(&dest)?;
            if !same_file {
                tracing::debug!(source = %source.display(), dest = %dest.display(), "Copying archive");
                fs::copy(source, &dest)?;
            }
        }
        Ok(dest)
    }

    fn extract(&self, archive: &Path) -> Result<PathBuf> {
        let location = archive.display();
        let tar = which::which("tar").map_err(|e| Error::archive(&location, format!("tar not found: {e}")))?;

        let dest = self.download_dir.join(EXTRACT_DIR_NAME);
        if dest.exists() {
            fs::remove_dir_all(&dest)?;
        }
        fs::create_dir_all(&dest)?;

        tracing::debug!(archive = %location, dest = %dest.display(), "Extracting archive");
        let output = Command::new(tar).arg("-xf").arg(archive).arg("-C").arg(&dest).output()?;
        if !output.status.success() {
            return Err(Error::archive(
                &location,
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        working_copy_root(&dest).ok_or_else(|| {
            Error::archive(
                &location,
                "archive must contain a working copy at its root or in a single top-level directory",
            )
        })
    }
}

/// Copy `archive` to `<dir>/<repository>-<YYYY-MM-DD>.tar.gz`.
///
/// # Errors
///
/// Returns an I/O error if the copy fails.
pub fn backup(archive: &Path, repository: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let dest = dir.join(backup_file_name(repository, Local::now().date_naive()));
    fs::copy(archive, &dest)?;
    tracing::info!(backup = %dest.display(), "Saved archive backup");
    Ok(dest)
}

pub fn backup_file_name(repository: &str, date: NaiveDate) -> String {
    format!("{repository}-{}.tar.gz", date.format("%Y-%m-%d"))
}

/// The extracted working copy: `dir` itself if it is one, else its only subdirectory.
fn working_copy_root(dir: &Path) -> Option<PathBuf> {
    if dir.join(".git").exists() {
        return Some(dir.to_path_buf());
    }
    let mut entries = fs::read_dir(dir).ok()?.filter_map(|e| e.ok());
    let only = entries.next()?;
    if entries.next().is_some() {
        return None;
    }
    let path = only.path();
    (path.is_dir() && path.join(".git").exists()).then_some(path)
}

fn is_http(uri: &str) -> bool {
    uri.starts_with("https://") || uri.starts_with("http://")
}

/// Last path segment of `uri` without query or fragment.
fn file_name_from_uri(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_DOWNLOAD_NAME)
        .to_string()
}

/// Blob URIs carry access signatures in the query string.
fn redact_query(uri: &str) -> String {
    match uri.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => uri.to_string(),
    }
}
