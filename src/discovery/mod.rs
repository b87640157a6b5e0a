use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

/// Name of the metadata entry that marks a repository root.
pub const GIT_MARKER: &str = ".git";

/// Fatal problems with the scan root.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("directory not found: '{0}'")]
    NotFound(PathBuf),
    #[error("not a directory: '{0}'")]
    NotADirectory(PathBuf),
    #[error("cannot resolve '{path}': {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Check that `root` is an existing directory and return its canonical form.
pub fn validate_root(root: &Path) -> Result<PathBuf, DiscoveryError> {
    let metadata = match std::fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(DiscoveryError::NotFound(root.to_path_buf()));
        }
        Err(source) => {
            return Err(DiscoveryError::Resolve {
                path: root.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    root.canonicalize().map_err(|source| DiscoveryError::Resolve {
        path: root.to_path_buf(),
        source,
    })
}

/// True if `dir` directly contains a `.git` directory or gitdir file.
pub fn is_repo_root(dir: &Path) -> bool {
    // symlink_metadata so a dangling or looping `.git` link is not followed
    std::fs::symlink_metadata(dir.join(GIT_MARKER))
        .map(|m| m.is_dir() || m.is_file())
        .unwrap_or(false)
}

/// Lazy depth-first walk yielding repository roots under a directory.
///
/// Entries are visited in file-name order, symlinks are not followed, and a
/// repository root is never descended into, so no yielded path is nested
/// inside another. Unreadable directories are logged and skipped.
pub struct RepoWalker {
    inner: walkdir::IntoIter,
}

impl RepoWalker {
    pub fn new(root: &Path) -> Self {
        let inner = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        RepoWalker { inner }
    }
}

impl Iterator for RepoWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    warn!(path = %path, error = %e, "skipping unreadable directory");
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if is_repo_root(entry.path()) {
                self.inner.skip_current_dir();
                return Some(entry.into_path());
            }
        }
    }
}

/// Repository roots under `root`, in traversal order.
pub fn discover(root: &Path) -> RepoWalker {
    RepoWalker::new(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_repo(path: &Path) {
        fs::create_dir_all(path.join(GIT_MARKER)).unwrap();
    }

    #[test]
    fn test_empty_tree_yields_nothing() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();
        assert_eq!(discover(temp.path()).count(), 0);
    }

    #[test]
    fn test_root_repo_yields_only_root() {
        let temp = tempfile::tempdir().unwrap();
        make_repo(temp.path());
        make_repo(&temp.path().join("vendor/nested"));

        let found: Vec<_> = discover(temp.path()).collect();
        assert_eq!(found, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn test_nested_repos_are_not_reported() {
        let temp = tempfile::tempdir().unwrap();
        make_repo(&temp.path().join("outer"));
        make_repo(&temp.path().join("outer/inner"));
        make_repo(&temp.path().join("sibling"));

        let found: Vec<_> = discover(temp.path()).collect();
        assert_eq!(
            found,
            vec![temp.path().join("outer"), temp.path().join("sibling")]
        );
    }

    #[test]
    fn test_order_is_lexicographic() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["zeta", "alpha", "mid/beta", "mid/aardvark"] {
            make_repo(&temp.path().join(name));
        }

        let found: Vec<_> = discover(temp.path()).collect();
        assert_eq!(
            found,
            vec![
                temp.path().join("alpha"),
                temp.path().join("mid/aardvark"),
                temp.path().join("mid/beta"),
                temp.path().join("zeta"),
            ]
        );
        let again: Vec<_> = discover(temp.path()).collect();
        assert_eq!(found, again);
    }

    #[test]
    fn test_gitdir_file_marks_a_repo() {
        let temp = tempfile::tempdir().unwrap();
        let worktree = temp.path().join("wt");
        fs::create_dir_all(&worktree).unwrap();
        fs::write(worktree.join(GIT_MARKER), "gitdir: /elsewhere/.git/worktrees/wt\n").unwrap();

        let found: Vec<_> = discover(temp.path()).collect();
        assert_eq!(found, vec![worktree]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_not_followed() {
        let temp = tempfile::tempdir().unwrap();
        make_repo(&temp.path().join("real"));
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link")).unwrap();
        // A loop back to the root must not hang the walk
        std::os::unix::fs::symlink(temp.path(), temp.path().join("real-loop")).unwrap();

        let found: Vec<_> = discover(temp.path()).collect();
        assert_eq!(found, vec![temp.path().join("real")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        make_repo(&temp.path().join("a"));
        make_repo(&temp.path().join("b-locked/hidden"));
        make_repo(&temp.path().join("c"));

        let locked = temp.path().join("b-locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits do not apply to root
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            eprintln!("directory still readable, skipping");
            return;
        }

        let found: Vec<_> = discover(temp.path()).collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(found, vec![temp.path().join("a"), temp.path().join("c")]);
    }

    #[test]
    fn test_validate_root_rejects_missing_and_files() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(
            validate_root(&missing),
            Err(DiscoveryError::NotFound(_))
        ));

        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            validate_root(&file),
            Err(DiscoveryError::NotADirectory(_))
        ));

        assert!(validate_root(temp.path()).unwrap().is_absolute());
    }
}
