use crate::DETACHED_BRANCH;
use thiserror::Error;
use tracing::warn;

/// Per-line failure while reading a porcelain report. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("line too short for a status code: {0:?}")]
    TooShort(String),
    #[error("unknown status code {code:?} in line {line:?}")]
    UnknownCode { code: String, line: String },
    #[error("missing separator after status code: {0:?}")]
    MissingSeparator(String),
}

/// Change counts for one working tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub staged: u32,
    pub unstaged: u32,
    pub untracked: u32,
}

impl StatusCounts {
    pub fn total(&self) -> u32 {
        self.staged + self.unstaged + self.untracked
    }

    pub fn is_dirty(&self) -> bool {
        self.total() > 0
    }
}

/// The `## ...` line emitted by `git status -b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHeader {
    pub branch: String,
    pub upstream: Option<String>,
    /// No commits exist yet on `branch`.
    pub unborn: bool,
    pub detached: bool,
    /// Upstream is configured but its tracking ref no longer exists.
    pub gone: bool,
}

impl BranchHeader {
    pub fn detached() -> Self {
        BranchHeader {
            branch: DETACHED_BRANCH.to_string(),
            upstream: None,
            unborn: false,
            detached: true,
            gone: false,
        }
    }

    /// Upstream worth comparing against, if any.
    pub fn tracking(&self) -> Option<&str> {
        if self.gone || self.unborn {
            return None;
        }
        self.upstream.as_deref()
    }
}

/// A fully parsed `git status --porcelain=v1 -b` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub header: BranchHeader,
    pub counts: StatusCounts,
    /// Lines that were skipped because they could not be read.
    pub skipped: usize,
}

/// Parse porcelain v1 status output.
///
/// Entry lines are counted by character position: a non-blank, non-`?`
/// index column counts as staged, the same in the worktree column counts as
/// unstaged, and `??` counts as untracked. Renames keep `orig -> new` on one
/// line, so they are counted once. Malformed lines are logged and skipped.
/// When no `## ` header is present the branch is reported as detached.
pub fn parse_status(input: &str) -> StatusReport {
    let mut header = None;
    let mut counts = StatusCounts::default();
    let mut skipped = 0;

    for line in input.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("## ") {
            if header.is_none() {
                header = Some(parse_branch_header(rest));
            }
            continue;
        }

        match classify_line(line) {
            Ok(Entry::Untracked) => counts.untracked += 1,
            Ok(Entry::Ignored) => {}
            Ok(Entry::Tracked { staged, unstaged }) => {
                if staged {
                    counts.staged += 1;
                }
                if unstaged {
                    counts.unstaged += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, "skipping unreadable status line");
                skipped += 1;
            }
        }
    }

    StatusReport {
        header: header.unwrap_or_else(BranchHeader::detached),
        counts,
        skipped,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Untracked,
    Ignored,
    Tracked { staged: bool, unstaged: bool },
}

fn classify_line(line: &str) -> Result<Entry, LineError> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 {
        return Err(LineError::TooShort(line.to_string()));
    }

    let (x, y) = (bytes[0], bytes[1]);
    if !is_status_char(x) || !is_status_char(y) {
        return Err(LineError::UnknownCode {
            code: String::from_utf8_lossy(&bytes[..2]).into_owned(),
            line: line.to_string(),
        });
    }
    if bytes[2] != b' ' {
        return Err(LineError::MissingSeparator(line.to_string()));
    }

    match (x, y) {
        (b'?', b'?') => Ok(Entry::Untracked),
        (b'!', b'!') => Ok(Entry::Ignored),
        _ => Ok(Entry::Tracked {
            staged: x != b' ' && x != b'?',
            unstaged: y != b' ' && y != b'?',
        }),
    }
}

/// Characters that can appear in either porcelain v1 status column.
fn is_status_char(c: u8) -> bool {
    matches!(
        c,
        b' ' | b'M' | b'T' | b'A' | b'D' | b'R' | b'C' | b'U' | b'?' | b'!'
    )
}

/// Parse the text after `## `.
///
/// Shapes handled:
/// `main`, `main...origin/main`, `main...origin/main [ahead 1, behind 2]`,
/// `main...origin/main [gone]`, `No commits yet on main`,
/// `Initial commit on main`, `HEAD (no branch)`.
pub fn parse_branch_header(rest: &str) -> BranchHeader {
    let rest = rest.trim();

    for prefix in ["No commits yet on ", "Initial commit on "] {
        if let Some(name) = rest.strip_prefix(prefix) {
            let (branch, upstream) = split_upstream(name);
            return BranchHeader {
                branch: branch.to_string(),
                upstream: upstream.map(str::to_string),
                unborn: true,
                detached: false,
                gone: false,
            };
        }
    }

    if rest.starts_with("HEAD (no branch)") {
        return BranchHeader::detached();
    }

    // Strip the trailing "[ahead N, behind M]" / "[gone]" bracket
    let (refs, bracket) = match rest.find(" [") {
        Some(idx) => (&rest[..idx], Some(rest[idx + 2..].trim_end_matches(']'))),
        None => (rest, None),
    };
    let (branch, upstream) = split_upstream(refs);

    BranchHeader {
        branch: branch.to_string(),
        upstream: upstream.map(str::to_string),
        unborn: false,
        detached: false,
        gone: bracket == Some("gone"),
    }
}

fn split_upstream(refs: &str) -> (&str, Option<&str>) {
    match refs.split_once("...") {
        Some((branch, upstream)) if !upstream.is_empty() => (branch, Some(upstream)),
        Some((branch, _)) => (branch, None),
        None => (refs, None),
    }
}
