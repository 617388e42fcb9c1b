//! Random-access reading of EPUB (ZIP) containers.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, percent_decoded, strip_bom};

/// An open EPUB archive.
///
/// Entries are looked up by their exact stored name: callers hand in paths
/// that are already forward-slashed and free of a leading slash. The
/// underlying handle is released when the archive is dropped.
pub struct EpubArchive<R> {
    archive: ZipArchive<R>,
    origin: PathBuf,
}

impl EpubArchive<File> {
    /// Open an EPUB file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::ArchiveOpen {
            path: path.to_path_buf(),
            source: ZipError::Io(e),
        })?;
        Self::with_origin(file, path.to_path_buf())
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    /// Open an EPUB from any [`Read`] + [`Seek`] source.
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::with_origin(reader, PathBuf::from("<memory>"))
    }

    fn with_origin(reader: R, origin: PathBuf) -> Result<Self> {
        let archive = ZipArchive::new(reader).map_err(|source| Error::ArchiveOpen {
            path: origin.clone(),
            source,
        })?;
        Ok(Self { archive, origin })
    }

    /// Where the archive was opened from (`<memory>` for readers).
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Number of entries in the archive.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Entry names in central-directory order.
    ///
    /// The order is whatever the producer wrote and says nothing about
    /// reading order.
    pub fn entry_names(&self) -> Vec<&str> {
        (0..self.archive.len())
            .filter_map(|i| self.archive.name_for_index(i))
            .collect()
    }

    /// Whether an entry with exactly this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Find the stored name for a resolved href.
    ///
    /// Tries the exact name first, then its percent-decoded form, since
    /// some producers percent-encode hrefs but store the raw file name.
    pub fn resolve_entry(&self, path: &str) -> Option<String> {
        if self.contains(path) {
            return Some(path.to_string());
        }
        percent_decoded(path).filter(|decoded| self.contains(decoded))
    }

    /// Read an entry's raw bytes.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(Error::EntryNotFound(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        let mut contents = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut contents)?;
        Ok(contents)
    }

    /// Read an XML entry as text, honouring a BOM or an encoding declaration.
    pub fn read_text(&mut self, name: &str) -> Result<String> {
        let bytes = self.read_entry(name)?;
        let bytes = strip_bom(&bytes);
        Ok(decode_text(bytes, extract_xml_encoding(bytes)).into_owned())
    }
}
