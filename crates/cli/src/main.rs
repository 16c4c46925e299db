//! Demonstration file tool built on the argot parsing library.
//!
//! Declares a small subcommand tree (`copy`, `move`, `sum`) with a couple
//! of top-level options, then maps parse outcomes to process exit codes:
//! 0 for a clean parse or printed help, 1 for any failure. Parse
//! diagnostics are printed by the library's default reporter.

use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{Context, Result};
use argot::{Arg, Outcome, Parser, Subcommand, ValueKind, Values};
use tracing_subscriber::{EnvFilter, fmt};

type SharedFailure = Rc<RefCell<Option<anyhow::Error>>>;

fn main() -> ExitCode {
    init_tracing();

    // Handlers run inside the parse epilogue and cannot return a Result,
    // so command failures are parked here and picked up afterwards.
    let failure: SharedFailure = Rc::default();
    let args = declare(failure.clone());
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let parser = Parser::new("argot-demo").description("Copy and move files, or sum numbers");
    match parser.parse(&args, &argv) {
        Ok(Outcome::Parsed(values)) => {
            if values.get_bool("verbose") == Some(true) {
                tracing::info!("parse finished cleanly");
            }
            match failure.borrow_mut().take() {
                Some(err) => {
                    eprintln!("argot-demo: error: {err:#}");
                    ExitCode::FAILURE
                }
                None => ExitCode::SUCCESS,
            }
        }
        Ok(Outcome::Help(text)) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        // Diagnostics were already printed by the default reporter.
        Err(_) => ExitCode::FAILURE,
    }
}

fn declare(failure: SharedFailure) -> Vec<Arg> {
    let copy_failure = failure.clone();
    let move_failure = failure;
    vec![
        Arg::group(
            "command",
            vec![
                Subcommand::new("copy")
                    .help("Copy a file")
                    .arg(Arg::positional("file", ValueKind::Str { cap: 0 }).help("Source path"))
                    .arg(Arg::positional("dest", ValueKind::Str { cap: 0 }).help("Destination path"))
                    .handler(move |payload| {
                        if let Err(err) = copy_file(payload) {
                            *copy_failure.borrow_mut() = Some(err);
                        }
                    }),
                Subcommand::new("move")
                    .help("Move a file")
                    .arg(Arg::positional("file", ValueKind::Str { cap: 0 }).help("Source path"))
                    .arg(Arg::positional("dest", ValueKind::Str { cap: 0 }).help("Destination path"))
                    .handler(move |payload| {
                        if let Err(err) = move_file(payload) {
                            *move_failure.borrow_mut() = Some(err);
                        }
                    }),
                Subcommand::new("sum")
                    .help("Sum unsigned integers")
                    .arg(
                        Arg::positional(
                            "values",
                            ValueKind::Array {
                                elem: Box::new(ValueKind::UInt { width: 4 }),
                                count: 0,
                            },
                        )
                        .help("Zero or more integers (decimal, hex, octal, or binary)"),
                    )
                    .handler(|payload| {
                        let total: u64 = payload
                            .get_array("values")
                            .unwrap_or_default()
                            .iter()
                            .filter_map(|v| v.as_uint())
                            .sum();
                        println!("sum: {total}");
                    }),
            ],
        )
        .help("What to do"),
        Arg::flag("verbose").short("v").help("Chatty output"),
        Arg::option("jobs", ValueKind::UInt { width: 2 })
            .short("j")
            .help("Worker count hint"),
    ]
}

fn copy_file(payload: &Values<'_>) -> Result<()> {
    let file = payload.get_str("file").unwrap_or_default();
    let dest = payload.get_str("dest").unwrap_or_default();
    tracing::debug!("executing copy command");
    std::fs::copy(file, dest)
        .with_context(|| format!("failed to copy `{file}` to `{dest}`"))?;
    println!("copied {file} -> {dest}");
    Ok(())
}

fn move_file(payload: &Values<'_>) -> Result<()> {
    let file = payload.get_str("file").unwrap_or_default();
    let dest = payload.get_str("dest").unwrap_or_default();
    tracing::debug!("executing move command");
    std::fs::rename(file, dest)
        .with_context(|| format!("failed to move `{file}` to `{dest}`"))?;
    println!("moved {file} -> {dest}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
