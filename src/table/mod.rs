use std::borrow::Cow;
use std::path::Path;

use crate::scan::RepoRecord;

const TRUNCATION_MARKER: &str = "...";
const ERROR_CELL: &str = "-";
const ERROR_BRANCH: &str = "(error)";

const REPO_HEADER: &str = "Repository";
const BRANCH_HEADER: &str = "Branch";
const COUNT_HEADERS: [&str; 5] = ["Ahead", "Behind", "Staged", "Unstaged", "Untracked"];

/// How a row should be highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Clean,
    Dirty,
    Failed,
}

/// One rendered table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub text: String,
    pub kind: RowKind,
}

/// Rendered table, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: String,
    pub rule: String,
    pub rows: Vec<Row>,
}

/// Cut `text` to at most `width` characters, ending in `...` when shortened.
pub fn truncate(text: &str, width: usize) -> Cow<'_, str> {
    if text.chars().count() <= width {
        return Cow::Borrowed(text);
    }
    if width <= TRUNCATION_MARKER.len() {
        return Cow::Owned(TRUNCATION_MARKER[..width].to_string());
    }

    let keep = width - TRUNCATION_MARKER.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}

/// Name shown in the repository column: path relative to the scan root,
/// or the root's own directory name when the root is the repository.
pub fn display_path(root: &Path, repo: &Path) -> String {
    match repo.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string()),
        Ok(rel) => rel.display().to_string(),
        Err(_) => repo.display().to_string(),
    }
}

struct Cells {
    repo: String,
    branch: String,
    counts: [String; 5],
    kind: RowKind,
}

fn cells(root: &Path, record: &RepoRecord) -> Cells {
    let repo = display_path(root, record.path());
    match record {
        RepoRecord::Read(status) => Cells {
            repo,
            branch: status.branch().to_string(),
            counts: [
                status.ahead().to_string(),
                status.behind().to_string(),
                status.staged().to_string(),
                status.unstaged().to_string(),
                status.untracked().to_string(),
            ],
            kind: if status.is_dirty() {
                RowKind::Dirty
            } else {
                RowKind::Clean
            },
        },
        RepoRecord::Failed { .. } => Cells {
            repo,
            branch: ERROR_BRANCH.to_string(),
            counts: std::array::from_fn(|_| ERROR_CELL.to_string()),
            kind: RowKind::Failed,
        },
    }
}

/// Lay out records as an aligned table.
///
/// With `truncate_width` both name columns are exactly that wide and longer
/// names are cut; otherwise they fit the longest name plus two spaces.
pub fn render(root: &Path, records: &[RepoRecord], truncate_width: Option<usize>) -> Table {
    let rows: Vec<Cells> = records.iter().map(|r| cells(root, r)).collect();

    let (repo_width, branch_width) = match truncate_width {
        Some(width) => (width, width),
        None => {
            let repo = rows
                .iter()
                .map(|c| c.repo.chars().count())
                .chain([REPO_HEADER.len()])
                .max()
                .unwrap_or(0);
            let branch = rows
                .iter()
                .map(|c| c.branch.chars().count())
                .chain([BRANCH_HEADER.len()])
                .max()
                .unwrap_or(0);
            (repo + 2, branch + 2)
        }
    };

    let line = |repo: &str, branch: &str, counts: [&str; 5]| {
        let mut text = format!("{:<repo_width$} {:<branch_width$}", repo, branch);
        for (value, header) in counts.iter().zip(COUNT_HEADERS) {
            text.push_str(&format!(" {:>width$}", value, width = header.len()));
        }
        text
    };

    let header = line(REPO_HEADER, BRANCH_HEADER, COUNT_HEADERS);
    let rule = "-".repeat(header.chars().count());

    let rows = rows
        .iter()
        .map(|c| {
            let (repo, branch) = match truncate_width {
                Some(width) => (truncate(&c.repo, width), truncate(&c.branch, width)),
                None => (Cow::Borrowed(c.repo.as_str()), Cow::Borrowed(c.branch.as_str())),
            };
            let counts = [
                c.counts[0].as_str(),
                c.counts[1].as_str(),
                c.counts[2].as_str(),
                c.counts[3].as_str(),
                c.counts[4].as_str(),
            ];
            Row {
                text: line(&repo, &branch, counts),
                kind: c.kind,
            }
        })
        .collect();

    Table { header, rule, rows }
}
