pub mod cli;
pub mod discovery;
pub mod git;
pub mod parser;
pub mod scan;
pub mod table;

use std::path::{Path, PathBuf};
use std::time::Duration;

use git::SyncCounts;
use parser::StatusCounts;

/// Branch name shown when HEAD is not on a named branch.
pub const DETACHED_BRANCH: &str = "HEAD detached";

/// Width used by `-c` when no number is given.
pub const DEFAULT_CONDENSED_WIDTH: usize = 40;

/// Width used by `-C`.
pub const SUPER_CONDENSED_WIDTH: usize = 25;

/// Per-command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Working-tree and sync state of one repository, assembled once per scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    path: PathBuf,
    branch: String,
    sync: SyncCounts,
    counts: StatusCounts,
}

impl RepoStatus {
    pub fn new(path: PathBuf, branch: String, sync: SyncCounts, counts: StatusCounts) -> Self {
        RepoStatus {
            path,
            branch,
            sync,
            counts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn ahead(&self) -> u32 {
        self.sync.ahead
    }

    pub fn behind(&self) -> u32 {
        self.sync.behind
    }

    pub fn staged(&self) -> u32 {
        self.counts.staged
    }

    pub fn unstaged(&self) -> u32 {
        self.counts.unstaged
    }

    pub fn untracked(&self) -> u32 {
        self.counts.untracked
    }

    /// Any staged, unstaged or untracked entries.
    pub fn is_dirty(&self) -> bool {
        self.counts.is_dirty()
    }
}

/// Settings for one scan. Not changed once the scan starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub dirty_only: bool,
    /// Truncate repository and branch columns to this many characters.
    pub truncate_width: Option<usize>,
    pub timeout: Duration,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ScanConfig {
            root: root.into(),
            dirty_only: false,
            truncate_width: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
