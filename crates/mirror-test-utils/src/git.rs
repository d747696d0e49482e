//! Git repository fixtures.
//!
//! Remotes are bare repositories on local disk so that clone, fetch and push
//! run through the real transport code without a network.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run `git` in `dir` and return trimmed stdout.
///
/// # Panics
/// Panics if git cannot be spawned or exits non-zero.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "`git {args:?}` failed in {}:\n{}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// A bare "remote" repository plus a scratch clone used to author commits.
///
/// ```text
/// {root}/
/// ├── {name}.git/     # bare remote, HEAD -> main
/// └── {name}-work/    # scratch clone for writing commits
/// ```
pub struct RemoteFixture {
    bare: PathBuf,
    work: PathBuf,
}

impl RemoteFixture {
    /// Create a bare remote whose `main` branch holds one commit adding `README.md`.
    pub fn new(root: &Path, name: &str) -> Self {
        let bare = root.join(format!("{name}.git"));
        let work = root.join(format!("{name}-work"));
        fs::create_dir_all(&bare).unwrap();
        fs::create_dir_all(&work).unwrap();

        git(&bare, &["init", "--bare"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        git(&work, &["init"]);
        configure_identity(&work);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&work, &["remote", "add", "origin", bare.to_str().unwrap()]);

        let fixture = Self { bare, work };
        fixture.commit_file("main", "README.md", "# Mirror fixture\n", "Initial commit");
        fixture
    }

    /// Create a second bare remote sharing this one's full history.
    pub fn fork(&self, root: &Path, name: &str) -> Self {
        let bare = root.join(format!("{name}.git"));
        let work = root.join(format!("{name}-work"));
        git(
            root,
            &["clone", "--bare", self.bare.to_str().unwrap(), bare.to_str().unwrap()],
        );
        git(
            root,
            &["clone", bare.to_str().unwrap(), work.to_str().unwrap()],
        );
        configure_identity(&work);
        Self { bare, work }
    }

    /// Path of the bare repository.
    pub fn path(&self) -> &Path {
        &self.bare
    }

    /// URL usable as a clone/remote URI.
    pub fn url(&self) -> String {
        self.bare.to_string_lossy().into_owned()
    }

    /// Write `file` on `branch`, commit, push to the bare remote and return
    /// the new full commit id. `branch` is created from the current scratch
    /// HEAD if the remote does not have it yet.
    pub fn commit_file(&self, branch: &str, file: &str, content: &str, message: &str) -> String {
        self.switch_to(branch);
        let path = self.work.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        git(&self.work, &["add", "--all"]);
        git(&self.work, &["commit", "-m", message]);
        git(&self.work, &["push", "origin", &format!("HEAD:refs/heads/{branch}")]);
        git(&self.work, &["rev-parse", "HEAD"])
    }

    /// Delete `file` on `branch`, commit, push and return the new commit id.
    pub fn remove_file(&self, branch: &str, file: &str, message: &str) -> String {
        self.switch_to(branch);
        git(&self.work, &["rm", "-q", file]);
        git(&self.work, &["commit", "-m", message]);
        git(&self.work, &["push", "origin", &format!("HEAD:refs/heads/{branch}")]);
        git(&self.work, &["rev-parse", "HEAD"])
    }

    /// Create a lightweight tag at the tip of `branch` and push it to the remote.
    pub fn tag(&self, branch: &str, tag: &str) {
        self.switch_to(branch);
        git(&self.work, &["tag", tag]);
        git(&self.work, &["push", "origin", &format!("refs/tags/{tag}")]);
    }

    fn switch_to(&self, branch: &str) {
        if self.has_remote_branches() {
            git(&self.work, &["fetch", "origin"]);
        }
        if self.has_branch(branch) {
            git(
                &self.work,
                &["checkout", "-B", branch, &format!("origin/{branch}")],
            );
        } else if self.has_commits() {
            git(&self.work, &["checkout", "-B", branch]);
        }
    }

    fn has_commits(&self) -> bool {
        Command::new("git")
            .args(["rev-parse", "--verify", "HEAD"])
            .current_dir(&self.work)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn has_remote_branches(&self) -> bool {
        !git(&self.bare, &["for-each-ref", "refs/heads"]).is_empty()
    }

    /// Whether the bare remote has `branch`.
    pub fn has_branch(&self, branch: &str) -> bool {
        Command::new("git")
            .args(["rev-parse", "--verify", &format!("refs/heads/{branch}")])
            .current_dir(&self.bare)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Full commit id of `branch` on the bare remote.
    ///
    /// # Panics
    /// Panics if the branch does not exist.
    pub fn head(&self, branch: &str) -> String {
        git(&self.bare, &["rev-parse", &format!("refs/heads/{branch}")])
    }

    /// Names of all branches on the bare remote.
    pub fn branches(&self) -> Vec<String> {
        git(&self.bare, &["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Whether `tag` exists on the bare remote.
    pub fn has_tag(&self, tag: &str) -> bool {
        Command::new("git")
            .args(["rev-parse", "--verify", &format!("refs/tags/{tag}")])
            .current_dir(&self.bare)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Content of `file` at the tip of `branch` on the bare remote.
    pub fn show(&self, branch: &str, file: &str) -> String {
        git(&self.bare, &["show", &format!("refs/heads/{branch}:{file}")])
    }

    /// Parent ids of the tip commit of `branch`.
    pub fn parents(&self, branch: &str) -> Vec<String> {
        git(&self.bare, &["rev-list", "--parents", "-n", "1", &format!("refs/heads/{branch}")])
            .split_whitespace()
            .skip(1)
            .map(str::to_string)
            .collect()
    }
}

/// The first eight characters of a full commit id.
pub fn short(sha: &str) -> String {
    sha[..8].to_string()
}

/// Set up the classic mirror topology: a source remote and an upstream
/// remote forked from it, so both share the initial commit.
pub fn source_and_upstream(root: &Path) -> (RemoteFixture, RemoteFixture) {
    let source = RemoteFixture::new(root, "source");
    let upstream = source.fork(root, "upstream");
    (source, upstream)
}

/// A temporary directory holding a source remote, an upstream remote forked
/// from it, and room for the working copy under test.
pub struct Sandbox {
    temp: TempDir,
    pub source: RemoteFixture,
    pub upstream: RemoteFixture,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let (source, upstream) = source_and_upstream(temp.path());
        Self {
            temp,
            source,
            upstream,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Where the working copy under test should live (not created).
    pub fn workdir(&self) -> PathBuf {
        self.temp.path().join("checkout")
    }
}
