//! epub2cbz - Convert image-based EPUBs to CBZ comic archives

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use epub2cbz::{BatchOptions, ConvertOptions, PageCompression, convert, plan_jobs, run_batch};

#[derive(Parser)]
#[command(name = "epub2cbz")]
#[command(version, about = "Convert image-based EPUBs to CBZ comic archives", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub2cbz book.epub                 Write book.cbz next to book.epub
    epub2cbz book.epub comics/         Write comics/book.cbz
    epub2cbz -r library/ out/          Convert a directory tree into out/")]
struct Cli {
    /// EPUB file or directory of EPUB files
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file or directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Descend into subdirectories when INPUT is a directory
    #[arg(short, long)]
    recursive: bool,

    /// Number of files converted at once (default: available CPUs)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Do not write ComicInfo.xml
    #[arg(long)]
    no_comic_info: bool,

    /// Store page images without compression
    #[arg(long)]
    store: bool,

    /// Show debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let convert_options = ConvertOptions {
        comic_info: !cli.no_comic_info,
        compression: if cli.store {
            PageCompression::Stored
        } else {
            PageCompression::Deflated
        },
    };
    let batch_options = BatchOptions {
        recursive: cli.recursive,
        jobs: cli.jobs,
    };

    let jobs = match plan_jobs(&cli.input, cli.output.as_deref(), &batch_options) {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.input.is_dir() {
        info!(files = jobs.len(), input = %cli.input.display(), "converting directory");
        let summary = run_batch(&jobs, &convert_options, &batch_options);
        return if summary.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let Some(job) = jobs.first() else {
        return ExitCode::FAILURE;
    };
    match convert(&job.input, &job.output, &convert_options) {
        Ok(report) => {
            info!(
                "wrote {} ({} pages{})",
                job.output.display(),
                report.page_count(),
                if report.comic_info { ", ComicInfo.xml" } else { "" }
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            if e.may_leave_partial_output() {
                warn!("{} may be partially written", job.output.display());
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("epub2cbz={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
