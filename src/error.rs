//! Error types for epub2cbz operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while converting an EPUB into a CBZ.
///
/// Structural errors abort the conversion of one file. `PageRead` and
/// `ImageMissing` are per-page / per-image and only ever logged and skipped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open archive {}: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("META-INF/container.xml not found")]
    ContainerMissing,

    #[error("container.xml does not reference a package document")]
    PackageReferenceMissing,

    #[error("no pages found in spine of {0}")]
    EmptySpine(String),

    #[error("cannot read page {path}: {source}")]
    PageRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("image not found in archive: {0}")]
    ImageMissing(String),

    #[error("cannot write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("XML parsing error in {entry}: {source}")]
    Xml {
        entry: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("cannot serialize ComicInfo.xml: {0}")]
    ComicInfo(#[from] quick_xml::se::SeError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Errors scoped to one page or image; the conversion carries on without it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::PageRead { .. } | Error::ImageMissing(_))
    }

    /// Whether the output file may exist in a partially written state.
    pub fn may_leave_partial_output(&self) -> bool {
        matches!(self, Error::OutputWrite { .. })
    }

    pub(crate) fn xml(entry: &str, source: quick_xml::Error) -> Self {
        Error::Xml {
            entry: entry.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
