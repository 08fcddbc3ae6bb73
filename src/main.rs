use std::collections::VecDeque;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use time::macros::format_description;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Level, error, warn};
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;

use bendecode::metadata::bencode::{DEFAULT_MAX_DEPTH, stack_size_for_depth};
use bendecode::util::fs::{Candidate, collect_candidates};
use bendecode::{DEFAULT_MAX_SIZE, DecodeOptions, InspectError, InspectOptions, OutputFormat, inspect_path};

#[derive(Parser, Debug)]
#[command(name="bendecode", version, about="Decode and inspect .torrent files")]
struct Args {
    #[arg(short, long, help="Reject non-canonical bencode: unsorted or duplicate keys, trailing data")]
    strict: bool,

    #[arg(short, long, help="List the files inside multi-file torrents")]
    list_files: bool,

    #[arg(short, long, help="Print the decoded torrent file as JSON")]
    json: bool,

    #[arg(long, help="Number of files to decode in parallel [default: available cores]")]
    jobs: Option<NonZeroUsize>,

    #[arg(long, default_value_t=DEFAULT_MAX_SIZE, help="Largest accepted input file in bytes")]
    max_size: u64,

    #[arg(long, default_value_t=DEFAULT_MAX_DEPTH, help="Deepest accepted nesting of lists and dictionaries")]
    max_depth: usize,

    #[arg(long, help="Write logs to this file instead of stderr")]
    log_file: Option<PathBuf>,

    #[arg(short, long, action=clap::ArgAction::Count, help="Increase log verbosity")]
    verbose: u8,

    #[arg(required=true, help="Torrent files, or directories containing them")]
    paths: Vec<PathBuf>,
}

enum Pending {
    Report(PathBuf, JoinHandle<Result<String, InspectError>>),
    Skipped(PathBuf),
    Failed(PathBuf, String),
}

fn init_logging(args: &Args) -> Option<WorkerGuard> {
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let timer = LocalTime::new(
        format_description!("[month]/[day]/[year] [hour repr:24]:[minute]:[second].[subsecond digits:4]"));

    match &args.log_file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("bendecode.log"));
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = non_blocking(file_appender);
            tracing_subscriber::fmt().with_writer(writer).with_ansi(false).with_timer(timer).with_max_level(level).init();
            Some(guard)
        },
        None => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).with_timer(timer).with_max_level(level).init();
            None
        },
    }
}

fn render(path: &Path, options: &InspectOptions, format: OutputFormat, list_files: bool) -> Result<String, InspectError> {
    let report = inspect_path(path, options)?;
    Ok(report.render(format, list_files)?)
}

/// Prints one finished item; returns whether it counts as a failure.
async fn emit(item: Pending) -> bool {
    let failure = match item {
        Pending::Report(path, task) => match task.await {
            Ok(Ok(report)) => {
                // one locked write per report keeps concurrent output whole
                let mut stdout = std::io::stdout().lock();
                match stdout.write_all(report.as_bytes()).and_then(|()| stdout.flush()) {
                    Ok(()) => None,
                    Err(e) => Some((path, e.to_string())),
                }
            },
            Ok(Err(e)) => Some((path, e.to_string())),
            Err(e) => Some((path, e.to_string())),
        },
        Pending::Skipped(path) => {
            warn!(path = %path.display(), "not a .torrent file");
            eprintln!("Skipping invalid file: {}", path.display());
            None
        },
        Pending::Failed(path, reason) => Some((path, reason)),
    };
    match failure {
        Some((path, reason)) => {
            error!(path = %path.display(), %reason, "failed to process torrent");
            eprintln!("Error processing {}: {}", path.display(), reason);
            true
        },
        None => false,
    }
}

async fn run(args: Args) -> ExitCode {
    let options = InspectOptions {
        decode: DecodeOptions { strict: args.strict, max_depth: args.max_depth },
        max_size: args.max_size,
    };
    let format = if args.json { OutputFormat::Json } else { OutputFormat::Text };
    let list_files = args.list_files;
    let jobs = args.jobs
        .or_else(|| std::thread::available_parallelism().ok())
        .map_or(1, NonZeroUsize::get);
    let limiter = Arc::new(Semaphore::new(jobs));

    // input order is kept by printing from the front; at most `jobs` reports wait there
    let mut pending: VecDeque<Pending> = VecDeque::new();
    let mut failures = 0;
    for candidate in collect_candidates(&args.paths) {
        match candidate {
            Candidate::Torrent(path) => {
                let permit = match Arc::clone(&limiter).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        pending.push_back(Pending::Failed(path, e.to_string()));
                        continue;
                    }
                };
                let task_path = path.clone();
                let task = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    render(&task_path, &options, format, list_files)
                });
                pending.push_back(Pending::Report(path, task));
            },
            Candidate::NotATorrent(path) => pending.push_back(Pending::Skipped(path)),
            Candidate::Unreadable(path, e) => pending.push_back(Pending::Failed(path, e.to_string())),
        }
        while pending.len() > jobs {
            if let Some(item) = pending.pop_front() {
                failures += usize::from(emit(item).await);
            }
        }
    }
    for item in pending {
        failures += usize::from(emit(item).await);
    }

    if failures > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_logging(&args);

    // decoding recurses once per nesting level, on blocking pool threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(stack_size_for_depth(args.max_depth))
        .build();
    match runtime {
        Ok(runtime) => runtime.block_on(run(args)),
        Err(e) => {
            error!(error = %e, "failed to start the runtime");
            eprintln!("Error starting runtime: {}", e);
            ExitCode::FAILURE
        },
    }
}
