use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::{DEFAULT_CONDENSED_WIDTH, SUPER_CONDENSED_WIDTH, ScanConfig};

#[derive(Parser, Debug)]
#[command(
    name = "git-scan",
    version,
    about = "List the status of all Git repositories under a directory"
)]
pub struct Cli {
    /// Root directory to search from.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Only show repositories with staged, unstaged or untracked changes.
    #[arg(short, long, visible_alias = "dirty-only")]
    pub dirty: bool,

    /// Truncate repository and branch names to WIDTH characters (default 40).
    #[arg(
        short = 'c',
        long,
        value_name = "WIDTH",
        num_args = 0..=1,
        value_parser = clap::value_parser!(u16).range(1..),
        conflicts_with = "super_condensed"
    )]
    pub condensed: Option<Option<u16>>,

    /// Narrower condensed view, same as -c25.
    #[arg(short = 'C', long)]
    pub super_condensed: bool,

    /// Seconds to wait for each git command before giving up on a repository.
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = crate::DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Column width requested by `-c` / `-C`, if any.
    pub fn truncate_width(&self) -> Option<usize> {
        if self.super_condensed {
            Some(SUPER_CONDENSED_WIDTH)
        } else {
            self.condensed
                .map(|width| width.map_or(DEFAULT_CONDENSED_WIDTH, usize::from))
        }
    }

    /// Default log filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn scan_config(&self, root: PathBuf) -> ScanConfig {
        ScanConfig {
            root,
            dirty_only: self.dirty,
            truncate_width: self.truncate_width(),
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("git-scan").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(!cli.dirty);
        assert_eq!(cli.truncate_width(), None);
        assert_eq!(cli.timeout, crate::DEFAULT_TIMEOUT_SECS);
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn test_condensed_without_value_uses_default_width() {
        let cli = parse(&["-c"]).unwrap();
        assert_eq!(cli.condensed, Some(None));
        assert_eq!(cli.truncate_width(), Some(DEFAULT_CONDENSED_WIDTH));
        assert_eq!(
            parse(&["-d", "--condensed"]).unwrap().truncate_width(),
            Some(DEFAULT_CONDENSED_WIDTH)
        );

        // The optional value is greedy, so a path right after -c is read as a width
        assert!(parse(&["--condensed", "/tmp"]).is_err());
    }

    #[test]
    fn test_condensed_with_value() {
        assert_eq!(parse(&["-c10"]).unwrap().truncate_width(), Some(10));
        assert_eq!(
            parse(&["--condensed", "12", "src"]).unwrap().truncate_width(),
            Some(12)
        );
        assert_eq!(
            parse(&["--condensed=8"]).unwrap().truncate_width(),
            Some(8)
        );
    }

    #[test]
    fn test_super_condensed() {
        let cli = parse(&["-C"]).unwrap();
        assert_eq!(cli.truncate_width(), Some(SUPER_CONDENSED_WIDTH));
    }

    #[test]
    fn test_condensed_flags_conflict() {
        assert!(parse(&["-c", "10", "-C"]).is_err());
    }

    #[test]
    fn test_zero_width_is_rejected() {
        assert!(parse(&["-c0"]).is_err());
        assert!(parse(&["--timeout", "0"]).is_err());
    }

    #[test]
    fn test_dirty_flag_and_alias() {
        assert!(parse(&["-d"]).unwrap().dirty);
        assert!(parse(&["--dirty"]).unwrap().dirty);
        assert!(parse(&["--dirty-only"]).unwrap().dirty);
    }

    #[test]
    fn test_positional_path_and_config() {
        let cli = parse(&["-d", "-C", "--timeout", "3", "work"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("work"));
        let config = cli.scan_config(PathBuf::from("/abs/work"));
        assert_eq!(config.root, PathBuf::from("/abs/work"));
        assert!(config.dirty_only);
        assert_eq!(config.truncate_width, Some(SUPER_CONDENSED_WIDTH));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(parse(&["-v"]).unwrap().log_level(), "debug");
        assert_eq!(parse(&["-vv"]).unwrap().log_level(), "trace");
        assert_eq!(parse(&["-q"]).unwrap().log_level(), "error");
        assert!(parse(&["-q", "-v"]).is_err());
    }
}
