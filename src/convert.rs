//! The EPUB to CBZ conversion pipeline.
//!
//! ```text
//! container.xml -> package document -> spine pages -> first image of each
//!              \-> metadata -> ComicInfo.xml
//! ```
//!
//! Structural problems (no container, no package, empty spine) abort the
//! conversion before the output file is created. Unreadable pages and
//! missing images are logged and skipped.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::archive::EpubArchive;
use crate::comic::{CbzWriter, ComicInfo, PageCompression, comic_info_from, page_name};
use crate::epub::{Package, extract_page_image, find_package_path};
use crate::error::{Error, Result};

/// Options for a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Write `ComicInfo.xml` when the book has metadata.
    pub comic_info: bool,
    pub compression: PageCompression,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            comic_info: true,
            compression: PageCompression::Deflated,
        }
    }
}

/// A page image written to the output archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Entry name in the CBZ, e.g. `page07.jpg`.
    pub name: String,
    /// Entry name of the image in the EPUB.
    pub source: String,
    pub size: u64,
}

/// Why a page or image was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The page document could not be read.
    PageUnreadable,
    /// The page document shows no image.
    NoImage,
    /// The page references an image that is not in the archive.
    ImageMissing,
    /// The image entry exists but could not be read.
    ImageUnreadable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Page document or image path, depending on the reason.
    pub path: String,
    pub reason: SkipReason,
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Pages in archive order.
    pub pages: Vec<PageRecord>,
    pub skipped: Vec<Skipped>,
    /// Whether `ComicInfo.xml` was written.
    pub comic_info: bool,
}

impl ConversionReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Convert the EPUB at `input` into a CBZ at `output`.
///
/// The output file is only created once the package document and spine
/// have been resolved, so structural failures leave nothing behind.
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let output = output.as_ref();
    let mut archive = EpubArchive::open(input.as_ref())?;
    let plan = plan_pages(&mut archive, options)?;

    let output_error = |source: io::Error| Error::OutputWrite {
        path: output.to_path_buf(),
        source,
    };

    let file = File::create(output).map_err(output_error)?;
    let mut writer = BufWriter::new(file);
    let report = write_archive(&mut archive, plan, &mut writer, options, output)?;
    writer.flush().map_err(output_error)?;

    info!(
        input = %archive.origin().display(),
        output = %output.display(),
        pages = report.pages.len(),
        skipped = report.skipped.len(),
        "converted"
    );
    Ok(report)
}

/// Convert an EPUB read from `reader`, writing the CBZ to `writer`.
pub fn convert_reader<R, W>(
    reader: R,
    writer: &mut W,
    options: &ConvertOptions,
) -> Result<ConversionReport>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut archive = EpubArchive::from_reader(reader)?;
    let plan = plan_pages(&mut archive, options)?;
    write_archive(&mut archive, plan, writer, options, Path::new("<memory>"))
}

/// Everything resolved before the output is touched.
struct PagePlan {
    /// Image references in reading order, one per page that has one.
    images: Vec<String>,
    comic_info: Option<ComicInfo>,
    skipped: Vec<Skipped>,
}

fn plan_pages<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    options: &ConvertOptions,
) -> Result<PagePlan> {
    let package_path = find_package_path(archive)?;
    debug!(package = %package_path, "found package document");

    let package = Package::read(archive, &package_path)?;
    let pages = package.resolve_pages()?;
    debug!(
        pages = pages.len(),
        manifest = package.manifest.len(),
        "resolved spine"
    );

    let mut images = Vec::with_capacity(pages.len());
    let mut skipped = Vec::new();
    for page in pages {
        match extract_page_image(archive, &page) {
            Ok(Some(image)) => images.push(image),
            Ok(None) => {
                debug!(page = %page, "page has no image");
                skipped.push(Skipped {
                    path: page,
                    reason: SkipReason::NoImage,
                });
            }
            Err(e) => {
                warn!(page = %page, error = %e, "skipping unreadable page");
                skipped.push(Skipped {
                    path: page,
                    reason: SkipReason::PageUnreadable,
                });
            }
        }
    }

    let comic_info = if options.comic_info {
        comic_info_from(&package.metadata)
    } else {
        None
    };

    Ok(PagePlan {
        images,
        comic_info,
        skipped,
    })
}

fn write_archive<R, W>(
    archive: &mut EpubArchive<R>,
    plan: PagePlan,
    writer: W,
    options: &ConvertOptions,
    output: &Path,
) -> Result<ConversionReport>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let PagePlan {
        images,
        comic_info,
        mut skipped,
    } = plan;

    // Numbering covers only images that were actually read.
    let mut loaded = Vec::with_capacity(images.len());
    for image in images {
        let Some(source) = archive.resolve_entry(&image) else {
            warn!(error = %Error::ImageMissing(image.clone()), "skipping image");
            skipped.push(Skipped {
                path: image,
                reason: SkipReason::ImageMissing,
            });
            continue;
        };
        match archive.read_entry(&source) {
            Ok(data) => loaded.push((source, data)),
            Err(e) => {
                warn!(image = %source, error = %e, "skipping unreadable image");
                skipped.push(Skipped {
                    path: source,
                    reason: SkipReason::ImageUnreadable,
                });
            }
        }
    }

    if loaded.is_empty() {
        warn!(input = %archive.origin().display(), "no images found");
    }

    let output_error = |source: io::Error| Error::OutputWrite {
        path: output.to_path_buf(),
        source,
    };

    let mut cbz = CbzWriter::new(writer, options.compression);
    let total = loaded.len();
    let mut pages = Vec::with_capacity(total);

    for (index, (source, data)) in loaded.into_iter().enumerate() {
        let name = page_name(index, total, &source);
        cbz.add_page(&name, &data).map_err(output_error)?;
        debug!(page = %name, source = %source, bytes = data.len(), "added page");
        pages.push(PageRecord {
            name,
            source,
            size: data.len() as u64,
        });
    }

    let wrote_comic_info = match comic_info {
        Some(info) => add_comic_info(&mut cbz, &info),
        None => false,
    };

    cbz.finish().map_err(output_error)?;

    Ok(ConversionReport {
        pages,
        skipped,
        comic_info: wrote_comic_info,
    })
}

/// Serialize and add `ComicInfo.xml`. Failures are logged and the entry is
/// left out; the pages are already written.
fn add_comic_info<W: Write + Seek>(cbz: &mut CbzWriter<W>, info: &ComicInfo) -> bool {
    let xml = match info.to_xml() {
        Ok(xml) => xml,
        Err(e) => {
            warn!(error = %e, "omitting ComicInfo.xml");
            return false;
        }
    };
    match cbz.add_comic_info(&xml) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "cannot write ComicInfo.xml, omitting it");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::ZipArchive;
    use zip::write::SimpleFileOptions;

    fn epub(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const CONTAINER: &[u8] = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    fn entry_names(cbz: Vec<u8>) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(cbz)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_single_page_without_metadata() {
        let opf = br#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
<metadata/>
<manifest><item id="p" href="p.xhtml" media-type="application/xhtml+xml"/></manifest>
<spine><itemref idref="p"/></spine>
</package>"#;
        let input = epub(&[
            ("META-INF/container.xml", CONTAINER),
            ("content.opf", opf),
            ("p.xhtml", br#"<html><body><img src="a.png"/></body></html>"#),
            ("a.png", b"png bytes"),
        ]);

        let mut out = Cursor::new(Vec::new());
        let report =
            convert_reader(Cursor::new(input), &mut out, &ConvertOptions::default()).unwrap();

        assert_eq!(report.page_count(), 1);
        assert!(!report.comic_info);
        assert_eq!(entry_names(out.into_inner()), ["page0.png"]);
    }

    #[test]
    fn test_comic_info_disabled() {
        let opf = br#"<package xmlns="http://www.idpf.org/2007/opf">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></metadata>
<manifest><item id="p" href="p.xhtml"/></manifest>
<spine><itemref idref="p"/></spine>
</package>"#;
        let input = epub(&[
            ("META-INF/container.xml", CONTAINER),
            ("content.opf", opf),
            ("p.xhtml", br#"<img src="a.jpg">"#),
            ("a.jpg", b"jpg"),
        ]);

        let options = ConvertOptions {
            comic_info: false,
            ..Default::default()
        };
        let mut out = Cursor::new(Vec::new());
        let report = convert_reader(Cursor::new(input), &mut out, &options).unwrap();

        assert!(!report.comic_info);
        assert_eq!(entry_names(out.into_inner()), ["page0.jpg"]);
    }

    #[test]
    fn test_missing_container_aborts() {
        let input = epub(&[("mimetype", b"application/epub+zip")]);
        let mut out = Cursor::new(Vec::new());
        let err =
            convert_reader(Cursor::new(input), &mut out, &ConvertOptions::default()).unwrap_err();

        assert!(matches!(err, Error::ContainerMissing));
        assert!(out.into_inner().is_empty());
    }

    #[test]
    fn test_structural_failure_creates_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.epub");
        let output = dir.path().join("broken.cbz");
        std::fs::write(&input, epub(&[("mimetype", b"application/epub+zip")])).unwrap();

        let err = convert(&input, &output, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ContainerMissing));
        assert!(!output.exists());
    }

    /// Accepts writes until `fail` is set.
    struct Switchable {
        inner: Cursor<Vec<u8>>,
        fail: std::rc::Rc<std::cell::Cell<bool>>,
    }

    impl Write for Switchable {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail.get() {
                return Err(io::Error::other("disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for Switchable {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_comic_info_write_failure_is_not_fatal() {
        let fail = std::rc::Rc::new(std::cell::Cell::new(false));
        let writer = Switchable {
            inner: Cursor::new(Vec::new()),
            fail: fail.clone(),
        };
        let mut cbz = CbzWriter::new(writer, PageCompression::Stored);
        cbz.add_page("page0.jpg", b"jpg").unwrap();

        fail.set(true);
        let info = ComicInfo {
            title: "T".into(),
            ..Default::default()
        };
        assert!(!add_comic_info(&mut cbz, &info));
    }

    #[test]
    fn test_comic_info_added() {
        let mut cbz = CbzWriter::new(Cursor::new(Vec::new()), PageCompression::Stored);
        let info = ComicInfo {
            title: "T".into(),
            ..Default::default()
        };
        assert!(add_comic_info(&mut cbz, &info));
        let names = entry_names(cbz.finish().unwrap().into_inner());
        assert_eq!(names, ["ComicInfo.xml"]);
    }
}
