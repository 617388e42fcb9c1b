//! Planning and running conversions for a file or a directory of EPUBs.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::convert::{ConversionReport, ConvertOptions, convert};
use crate::error::{Error, Result};

/// Options for directory conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Descend into subdirectories, mirroring them under the output directory.
    pub recursive: bool,
    /// Maximum concurrent conversions. `None` uses the available parallelism.
    pub jobs: Option<usize>,
}

/// One input/output pair to convert.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of converting one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: Job,
    pub result: Result<ConversionReport>,
}

/// Outcomes of a batch, in job order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Work out the conversions requested by an input path and optional output.
///
/// A file input must have an `.epub` extension (any case). Its output is
/// `output` itself, `<stem>.cbz` inside `output` when that is an existing
/// directory, or the input path with a `.cbz` extension.
///
/// A directory input converts every `.epub` directly inside it (or below
/// it, when recursive). Outputs go next to their inputs, or into `output`
/// with subdirectories mirrored in recursive mode. Output directories are
/// created as needed.
pub fn plan_jobs(
    input: &Path,
    output: Option<&Path>,
    options: &BatchOptions,
) -> Result<Vec<Job>> {
    let metadata = fs::metadata(input)
        .map_err(|e| Error::InvalidInput(format!("cannot access {}: {e}", input.display())))?;

    if metadata.is_dir() {
        plan_directory(input, output, options)
    } else {
        plan_file(input, output).map(|job| vec![job])
    }
}

fn plan_file(input: &Path, output: Option<&Path>) -> Result<Job> {
    if !has_epub_extension(input) {
        return Err(Error::InvalidInput(format!(
            "{} does not have an .epub extension",
            input.display()
        )));
    }

    let output = match output {
        Some(dir) if dir.is_dir() => dir.join(cbz_file_name(input)),
        Some(file) => file.to_path_buf(),
        None => input.with_extension("cbz"),
    };

    Ok(Job {
        input: input.to_path_buf(),
        output,
    })
}

fn plan_directory(
    input: &Path,
    output: Option<&Path>,
    options: &BatchOptions,
) -> Result<Vec<Job>> {
    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(input)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name();

    let mut jobs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_epub_extension(entry.path()) {
            continue;
        }

        let epub = entry.path();
        let out_dir = match output {
            Some(root) if options.recursive => {
                let relative = epub
                    .parent()
                    .and_then(|p| p.strip_prefix(input).ok())
                    .unwrap_or(Path::new(""));
                root.join(relative)
            }
            Some(root) => root.to_path_buf(),
            None => epub.parent().unwrap_or(input).to_path_buf(),
        };

        fs::create_dir_all(&out_dir).map_err(|source| Error::OutputWrite {
            path: out_dir.clone(),
            source,
        })?;

        jobs.push(Job {
            input: epub.to_path_buf(),
            output: out_dir.join(cbz_file_name(epub)),
        });
    }

    if jobs.is_empty() {
        let scope = if options.recursive {
            " or its subdirectories"
        } else {
            ""
        };
        return Err(Error::InvalidInput(format!(
            "no .epub files found in {}{scope}",
            input.display()
        )));
    }

    jobs.sort();
    Ok(jobs)
}

fn has_epub_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("epub"))
}

fn cbz_file_name(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let mut name = stem.to_os_string();
    name.push(".cbz");
    PathBuf::from(name)
}

/// Number of conversions to run at once.
pub fn concurrency_limit(jobs: Option<usize>) -> usize {
    match jobs {
        Some(n) if n > 0 => n,
        _ => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|e| {
                warn!(error = %e, "cannot detect available parallelism, using 1");
                1
            }),
    }
}

/// Convert every job, at most `jobs` at a time. A failed job never stops
/// the others.
pub fn run_batch(
    jobs: &[Job],
    convert_options: &ConvertOptions,
    options: &BatchOptions,
) -> BatchSummary {
    let threads = concurrency_limit(options.jobs).min(jobs.len().max(1));

    let run = || -> Vec<JobOutcome> {
        jobs.par_iter()
            .map(|job| run_job(job, convert_options))
            .collect()
    };

    let outcomes = match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("epub2cbz-{i}"))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!(error = %e, "cannot start worker pool, converting sequentially");
            jobs.iter().map(|job| run_job(job, convert_options)).collect()
        }
    };

    let summary = BatchSummary { outcomes };
    info!(
        converted = summary.succeeded(),
        failed = summary.failed(),
        total = jobs.len(),
        "batch finished"
    );
    summary
}

fn run_job(job: &Job, options: &ConvertOptions) -> JobOutcome {
    let result = convert(&job.input, &job.output, options);
    match &result {
        Ok(report) => info!(
            input = %job.input.display(),
            output = %job.output.display(),
            pages = report.page_count(),
            "done"
        ),
        Err(e) => {
            error!(input = %job.input.display(), error = %e, "conversion failed");
            if e.may_leave_partial_output() {
                warn!(output = %job.output.display(), "output may be partially written");
            }
        }
    }
    JobOutcome {
        job: job.clone(),
        result,
    }
}
