//! CBZ archive writer.

use std::io::{self, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::util::file_extension;

use super::info::COMIC_INFO_NAME;

/// How page images are stored in the output archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageCompression {
    /// Deflate each page. Already-compressed formats barely shrink, but
    /// the archive stays readable everywhere.
    #[default]
    Deflated,
    /// Store pages uncompressed.
    Stored,
}

impl PageCompression {
    fn method(self) -> CompressionMethod {
        match self {
            PageCompression::Deflated => CompressionMethod::Deflated,
            PageCompression::Stored => CompressionMethod::Stored,
        }
    }
}

/// Archive entry name for the page at `index` out of `total`.
///
/// Indices are zero-padded to the digit count of `total`, so names sort
/// lexicographically in page order. The extension is the source's, as is.
pub fn page_name(index: usize, total: usize, source: &str) -> String {
    let width = total.max(1).to_string().len();
    format!("page{index:0width$}{}", file_extension(source))
}

/// Writes a flat CBZ: page images followed by an optional `ComicInfo.xml`.
///
/// Every entry carries the same fixed timestamp, so converting the same
/// input twice yields byte-identical archives.
pub struct CbzWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    page_options: SimpleFileOptions,
}

impl<W: Write + Seek> CbzWriter<W> {
    pub fn new(writer: W, compression: PageCompression) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            page_options: entry_options(compression.method()),
        }
    }

    /// Add one page image, copying its bytes verbatim.
    pub fn add_page(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        self.zip.start_file(name, self.page_options)?;
        self.zip.write_all(data)
    }

    /// Add the serialized `ComicInfo.xml` entry.
    pub fn add_comic_info(&mut self, xml: &str) -> io::Result<()> {
        self.zip
            .start_file(COMIC_INFO_NAME, entry_options(CompressionMethod::Deflated))?;
        self.zip.write_all(xml.as_bytes())
    }

    /// Write the central directory and return the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        Ok(self.zip.finish()?)
    }
}

fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}
