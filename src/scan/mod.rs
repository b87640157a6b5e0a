use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::git::{RepoReadError, StatusSource, read_sync};
use crate::parser::parse_status;
use crate::{RepoStatus, ScanConfig};

/// Outcome for one discovered repository.
#[derive(Debug)]
pub enum RepoRecord {
    Read(RepoStatus),
    /// The repository could not be read; shown without counts.
    Failed { path: PathBuf, error: RepoReadError },
}

impl RepoRecord {
    pub fn path(&self) -> &Path {
        match self {
            RepoRecord::Read(status) => status.path(),
            RepoRecord::Failed { path, .. } => path,
        }
    }

    pub fn status(&self) -> Option<&RepoStatus> {
        match self {
            RepoRecord::Read(status) => Some(status),
            RepoRecord::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&RepoReadError> {
        match self {
            RepoRecord::Read(_) => None,
            RepoRecord::Failed { error, .. } => Some(error),
        }
    }

    /// `Some(false)` for clean repos, `None` when the read failed.
    pub fn is_dirty(&self) -> Option<bool> {
        self.status().map(RepoStatus::is_dirty)
    }
}

/// Everything a scan produced, in discovery order.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<RepoRecord>,
    /// Repositories found before filtering.
    pub discovered: usize,
    pub interrupted: bool,
}

impl ScanReport {
    /// The walk finished without finding a single repository.
    pub fn found_nothing(&self) -> bool {
        self.discovered == 0 && !self.interrupted
    }
}

/// Read status and sync state for one repository.
pub fn read_repo(source: &dyn StatusSource, repo: &Path) -> Result<RepoStatus, RepoReadError> {
    let text = source.status_report(repo)?;
    let report = parse_status(&text);
    let sync = read_sync(source, repo, &report.header)?;

    Ok(RepoStatus::new(
        repo.to_path_buf(),
        report.header.branch,
        sync,
        report.counts,
    ))
}

/// Yields one record per repository in `repos`, stopping early once `cancel` is set.
///
/// Failures are isolated to their own record. When `dirty_only` is set, clean
/// repositories are dropped after they have been fully read; failed reads are
/// always kept.
pub struct Scanner<'a, I> {
    source: &'a dyn StatusSource,
    repos: I,
    dirty_only: bool,
    cancel: Option<Arc<AtomicBool>>,
    discovered: usize,
    interrupted: bool,
}

impl<'a, I> Scanner<'a, I>
where
    I: Iterator<Item = PathBuf>,
{
    pub fn new(source: &'a dyn StatusSource, repos: I, dirty_only: bool) -> Self {
        Scanner {
            source,
            repos,
            dirty_only,
            cancel: None,
            discovered: 0,
            interrupted: false,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn discovered(&self) -> usize {
        self.discovered
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

impl<I> Iterator for Scanner<'_, I>
where
    I: Iterator<Item = PathBuf>,
{
    type Item = RepoRecord;

    fn next(&mut self) -> Option<RepoRecord> {
        loop {
            if self.interrupted || self.cancelled() {
                self.interrupted = true;
                return None;
            }

            let path = self.repos.next()?;
            self.discovered += 1;

            let record = match read_repo(self.source, &path) {
                Ok(status) => {
                    debug!(
                        repo = %path.display(),
                        branch = status.branch(),
                        dirty = status.is_dirty(),
                        "read repository"
                    );
                    if self.dirty_only && !status.is_dirty() {
                        continue;
                    }
                    RepoRecord::Read(status)
                }
                Err(error) => {
                    warn!(repo = %path.display(), error = %error, "failed to read repository");
                    RepoRecord::Failed { path, error }
                }
            };

            return Some(record);
        }
    }
}

/// Scan every repository under `config.root`.
///
/// The root must already have been checked with
/// [`validate_root`](crate::discovery::validate_root).
pub fn scan(
    config: &ScanConfig,
    source: &dyn StatusSource,
    cancel: Option<Arc<AtomicBool>>,
) -> ScanReport {
    let repos = crate::discovery::discover(&config.root);
    let mut scanner = Scanner::new(source, repos, config.dirty_only);
    if let Some(cancel) = cancel {
        scanner = scanner.with_cancel(cancel);
    }

    let records: Vec<RepoRecord> = scanner.by_ref().collect();
    info!(
        root = %config.root.display(),
        discovered = scanner.discovered(),
        shown = records.len(),
        "scan finished"
    );

    ScanReport {
        discovered: scanner.discovered(),
        interrupted: scanner.interrupted(),
        records,
    }
}
