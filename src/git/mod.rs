use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

use crate::parser::BranchHeader;

/// Failure reading a single repository. Recovered by the scan.
#[derive(Debug, Error)]
pub enum RepoReadError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
    #[error("git output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("branch '{0}' has no commits yet")]
    UnbornBranch(String),
    #[error("unexpected rev-list output: {0:?}")]
    BadCount(String),
}

pub type Result<T> = std::result::Result<T, RepoReadError>;

/// Commits on each side of the upstream comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub ahead: u32,
    pub behind: u32,
}

/// Read-only queries the scanner needs from a repository.
pub trait StatusSource {
    /// Raw `git status --porcelain=v1 -b` text.
    fn status_report(&self, repo: &Path) -> Result<String>;

    /// Upstream of the checked-out branch, `None` when not configured.
    fn upstream(&self, repo: &Path) -> Result<Option<String>>;

    /// Commits in HEAD not in upstream, and in upstream not in HEAD.
    fn ahead_behind(&self, repo: &Path) -> Result<SyncCounts>;
}

/// Ahead/behind against the upstream, `(0, 0)` when there is none.
///
/// Uses only what is already known locally; nothing is fetched.
pub fn read_sync(
    source: &dyn StatusSource,
    repo: &Path,
    header: &BranchHeader,
) -> Result<SyncCounts> {
    if header.unborn {
        return Err(RepoReadError::UnbornBranch(header.branch.clone()));
    }
    if header.detached || header.tracking().is_none() {
        return Ok(SyncCounts::default());
    }

    match source.upstream(repo)? {
        Some(upstream) => {
            trace!(repo = %repo.display(), %upstream, "comparing against upstream");
            source.ahead_behind(repo)
        }
        None => Ok(SyncCounts::default()),
    }
}

/// `StatusSource` backed by the local `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        GitCli {
            program: PathBuf::from("git"),
            timeout,
        }
    }

    /// Use a specific git executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Run git in `repo`, returning stdout on success.
    ///
    /// Repository discovery stops at `repo`: a broken `.git` there is an
    /// error, never a fallback to an enclosing work tree. The child is
    /// killed if it outlives the timeout.
    fn run(&self, repo: &Path, args: &[&str]) -> Result<Output> {
        let command = format!("git {}", args.join(" "));
        debug!(repo = %repo.display(), %command, "running git");

        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(repo);
        if let Some(parent) = repo.parent() {
            cmd.env("GIT_CEILING_DIRECTORIES", parent);
        }

        let mut child = cmd
            .env("GIT_OPTIONAL_LOCKS", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(RepoReadError::Spawn)?;

        // Drain pipes on separate threads so a chatty child never blocks on a full pipe
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            let polled = child.try_wait().map_err(|source| RepoReadError::Wait {
                command: command.clone(),
                source,
            })?;
            match polled {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RepoReadError::Timeout {
                        command,
                        secs: self.timeout.as_secs(),
                    });
                }
                None => thread::sleep(Duration::from_millis(5)),
            }
        };

        let stdout = stdout.map(join_drain).unwrap_or_default();
        let stderr = stderr.map(join_drain).unwrap_or_default();

        Ok(Output {
            command,
            success: status.success(),
            stdout,
            stderr,
        })
    }
}

impl Default for GitCli {
    fn default() -> Self {
        GitCli::new(Duration::from_secs(crate::DEFAULT_TIMEOUT_SECS))
    }
}

struct Output {
    command: String,
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Output {
    fn into_stdout(self) -> Result<String> {
        if !self.success {
            return Err(RepoReadError::CommandFailed {
                command: self.command,
                stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
            });
        }
        String::from_utf8(self.stdout).map_err(RepoReadError::from)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

impl StatusSource for GitCli {
    fn status_report(&self, repo: &Path) -> Result<String> {
        self.run(repo, &["status", "--porcelain=v1", "-b"])?
            .into_stdout()
    }

    fn upstream(&self, repo: &Path) -> Result<Option<String>> {
        let output = self.run(
            repo,
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{upstream}"],
        )?;

        // rev-parse exits non-zero when no upstream is configured or it is gone
        if !output.success {
            trace!(
                repo = %repo.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "no upstream"
            );
            return Ok(None);
        }

        let name = String::from_utf8(output.stdout)?.trim().to_string();
        Ok(if name.is_empty() { None } else { Some(name) })
    }

    fn ahead_behind(&self, repo: &Path) -> Result<SyncCounts> {
        let stdout = self
            .run(
                repo,
                &["rev-list", "--left-right", "--count", "HEAD...@{upstream}"],
            )?
            .into_stdout()?;
        parse_left_right(&stdout)
    }
}

/// Parse `rev-list --left-right --count` output: `<left>\t<right>`.
pub fn parse_left_right(output: &str) -> Result<SyncCounts> {
    let mut parts = output.split_whitespace();
    let (Some(left), Some(right), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(RepoReadError::BadCount(output.to_string()));
    };

    let ahead = left
        .parse::<u32>()
        .map_err(|_| RepoReadError::BadCount(output.to_string()))?;
    let behind = right
        .parse::<u32>()
        .map_err(|_| RepoReadError::BadCount(output.to_string()))?;

    Ok(SyncCounts { ahead, behind })
}

/// In-memory `StatusSource` with canned answers per repository path.
#[derive(Debug, Default, Clone)]
pub struct CannedSource {
    repos: HashMap<PathBuf, CannedRepo>,
}

/// Canned answers for one repository.
#[derive(Debug, Clone, Default)]
pub struct CannedRepo {
    pub report: Option<String>,
    pub upstream: Option<String>,
    pub sync: SyncCounts,
    /// Make every query for this repository fail with this message.
    pub fail: Option<String>,
}

impl CannedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository answering with `report`.
    pub fn with_report(mut self, repo: impl Into<PathBuf>, report: &str) -> Self {
        self.repos.insert(
            repo.into(),
            CannedRepo {
                report: Some(report.to_string()),
                ..CannedRepo::default()
            },
        );
        self
    }

    pub fn with_repo(mut self, repo: impl Into<PathBuf>, canned: CannedRepo) -> Self {
        self.repos.insert(repo.into(), canned);
        self
    }

    fn lookup(&self, repo: &Path, command: &str) -> Result<&CannedRepo> {
        let canned = self
            .repos
            .get(repo)
            .ok_or_else(|| RepoReadError::CommandFailed {
                command: command.to_string(),
                stderr: format!("not a git repository: {}", repo.display()),
            })?;

        if let Some(message) = &canned.fail {
            return Err(RepoReadError::CommandFailed {
                command: command.to_string(),
                stderr: message.clone(),
            });
        }
        Ok(canned)
    }
}

impl StatusSource for CannedSource {
    fn status_report(&self, repo: &Path) -> Result<String> {
        let canned = self.lookup(repo, "git status")?;
        Ok(canned.report.clone().unwrap_or_default())
    }

    fn upstream(&self, repo: &Path) -> Result<Option<String>> {
        Ok(self.lookup(repo, "git rev-parse")?.upstream.clone())
    }

    fn ahead_behind(&self, repo: &Path) -> Result<SyncCounts> {
        Ok(self.lookup(repo, "git rev-list")?.sync)
    }
}
