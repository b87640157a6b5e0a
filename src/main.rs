use anyhow::{Context, Result};
use crossterm::style::{Stylize, style};
use crossterm::tty::IsTty;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use git_scan::cli::{self, Cli};
use git_scan::discovery::validate_root;
use git_scan::git::GitCli;
use git_scan::scan::{ScanReport, scan};
use git_scan::table::{RowKind, Table, render};

/// Exit code after Ctrl+C, as shells report for SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let args = cli::parse_args();
    init_tracing(&args);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Log to stderr so warnings never mix with the table on stdout.
///
/// `RUST_LOG` takes precedence over `-v` / `-q`.
fn init_tracing(args: &Cli) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .without_time()
                .with_writer(io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level())))
        .init();
}

fn run(args: &Cli) -> Result<ExitCode> {
    let root = validate_root(&args.path)?;
    let config = args.scan_config(root);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
            warn!(error = %e, "could not install Ctrl+C handler");
        }
    }

    let git = GitCli::new(config.timeout);
    let report = scan(&config, &git, Some(cancel));

    print_report(&config.root, &report, config.truncate_width)
        .context("Failed to write table")?;

    if report.interrupted {
        eprintln!("Interrupted; showing repositories scanned so far");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(
    root: &std::path::Path,
    report: &ScanReport,
    truncate_width: Option<usize>,
) -> io::Result<()> {
    let stdout = io::stdout();
    let color = stdout.is_tty();
    let mut out = stdout.lock();

    if report.found_nothing() {
        writeln!(out, "No git repositories found under '{}'.", root.display())?;
        return Ok(());
    }

    let table = render(root, &report.records, truncate_width);
    write_table(&mut out, &table, color)
}

fn write_table(out: &mut impl Write, table: &Table, color: bool) -> io::Result<()> {
    writeln!(out, "{}", table.header)?;
    writeln!(out, "{}", table.rule)?;

    for row in &table.rows {
        match (color, row.kind) {
            (true, RowKind::Dirty) => writeln!(out, "{}", style(&row.text).yellow())?,
            (true, RowKind::Failed) => writeln!(out, "{}", style(&row.text).red())?,
            _ => writeln!(out, "{}", row.text)?,
        }
    }

    out.flush()
}
