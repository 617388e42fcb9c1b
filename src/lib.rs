//! # epub2cbz
//!
//! Convert image-based EPUB books (comics, manga) into CBZ archives.
//!
//! Pages are taken from the EPUB spine in reading order; the first image of
//! each page becomes one entry in the CBZ, named `pageNN.ext` so that a
//! lexicographic sort gives the reading order. When the package document
//! carries bibliographic metadata, a `ComicInfo.xml` entry is added.
//!
//! ## Quick Start
//!
//! ```no_run
//! use epub2cbz::{ConvertOptions, convert};
//!
//! let report = convert("book.epub", "book.cbz", &ConvertOptions::default()).unwrap();
//! println!("{} pages", report.page_count());
//! ```
//!
//! ## Converting a directory
//!
//! ```no_run
//! use std::path::Path;
//! use epub2cbz::{BatchOptions, ConvertOptions, plan_jobs, run_batch};
//!
//! let options = BatchOptions { recursive: true, jobs: Some(4) };
//! let jobs = plan_jobs(Path::new("library"), Some(Path::new("out")), &options).unwrap();
//! let summary = run_batch(&jobs, &ConvertOptions::default(), &options);
//! assert!(summary.is_success());
//! ```

pub mod archive;
pub mod batch;
pub mod comic;
pub mod convert;
pub mod dom;
pub mod epub;
pub mod error;
pub(crate) mod util;

pub use archive::EpubArchive;
pub use batch::{BatchOptions, BatchSummary, Job, JobOutcome, plan_jobs, run_batch};
pub use comic::{ComicInfo, PageCompression};
pub use convert::{
    ConversionReport, ConvertOptions, PageRecord, SkipReason, Skipped, convert, convert_reader,
};
pub use epub::{Metadata, Package};
pub use error::{Error, Result};
