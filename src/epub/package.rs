//! OPF package document parsing: metadata, manifest and spine.

use std::collections::HashMap;
use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::archive::EpubArchive;
use crate::error::{Error, Result};
use crate::util::{local_name, parent_dir, resolve_entity, resolve_href};

/// Dublin Core fields recognised inside `<metadata>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Identifier,
    Title,
    Language,
    Creator,
    Publisher,
    Date,
    Rights,
    Series,
    SeriesId,
    Number,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"identifier" => Field::Identifier,
            b"title" => Field::Title,
            b"language" => Field::Language,
            b"creator" => Field::Creator,
            b"publisher" => Field::Publisher,
            b"date" => Field::Date,
            b"rights" => Field::Rights,
            b"series" => Field::Series,
            b"seriesid" | b"series-id" => Field::SeriesId,
            b"number" => Field::Number,
            _ => return None,
        })
    }
}

/// Bibliographic metadata from the package document.
///
/// Every occurrence of each field is kept in document order; consumers
/// generally only look at the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub identifier: Vec<String>,
    pub title: Vec<String>,
    pub language: Vec<String>,
    pub creator: Vec<String>,
    pub publisher: Vec<String>,
    pub date: Vec<String>,
    pub rights: Vec<String>,
    pub series: Vec<String>,
    pub series_id: Vec<String>,
    pub number: Vec<String>,
}

impl Metadata {
    pub fn values(&self, field: Field) -> &[String] {
        match field {
            Field::Identifier => &self.identifier,
            Field::Title => &self.title,
            Field::Language => &self.language,
            Field::Creator => &self.creator,
            Field::Publisher => &self.publisher,
            Field::Date => &self.date,
            Field::Rights => &self.rights,
            Field::Series => &self.series,
            Field::SeriesId => &self.series_id,
            Field::Number => &self.number,
        }
    }

    fn values_mut(&mut self, field: Field) -> &mut Vec<String> {
        match field {
            Field::Identifier => &mut self.identifier,
            Field::Title => &mut self.title,
            Field::Language => &mut self.language,
            Field::Creator => &mut self.creator,
            Field::Publisher => &mut self.publisher,
            Field::Date => &mut self.date,
            Field::Rights => &mut self.rights,
            Field::Series => &mut self.series,
            Field::SeriesId => &mut self.series_id,
            Field::Number => &mut self.number,
        }
    }

    /// First occurrence of a field, or `""` when absent.
    pub fn first(&self, field: Field) -> &str {
        self.values(field).first().map(String::as_str).unwrap_or("")
    }

    pub fn push(&mut self, field: Field, value: impl Into<String>) {
        self.values_mut(field).push(value.into());
    }
}

/// Manifest: id -> href. A later declaration of the same id replaces the
/// earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    items: HashMap<String, String>,
}

impl Manifest {
    pub fn insert(&mut self, id: impl Into<String>, href: impl Into<String>) {
        self.items.insert(id.into(), href.into());
    }

    pub fn href(&self, id: &str) -> Option<&str> {
        self.items.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Parsed OPF package document.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// In-archive path of the package document itself.
    pub path: String,
    pub metadata: Metadata,
    pub manifest: Manifest,
    /// Manifest ids in reading order; duplicates are kept.
    pub spine: Vec<String>,
}

impl Package {
    /// Read and parse the package document at `path`.
    pub fn read<R: Read + Seek>(archive: &mut EpubArchive<R>, path: &str) -> Result<Self> {
        let content = archive.read_text(path)?;
        parse_opf(&content, path)
    }

    /// Directory the package document lives in; hrefs are relative to it.
    pub fn base_dir(&self) -> &str {
        parent_dir(&self.path)
    }

    /// Resolve the spine to in-archive page paths, in reading order.
    ///
    /// Spine ids without a manifest entry are skipped. Fails only if no
    /// page survives.
    pub fn resolve_pages(&self) -> Result<Vec<String>> {
        let base = self.base_dir();
        let pages: Vec<String> = self
            .spine
            .iter()
            .filter_map(|idref| match self.manifest.href(idref) {
                Some(href) => Some(resolve_href(base, href)),
                None => {
                    debug!(idref = %idref, "spine item has no manifest entry, skipping");
                    None
                }
            })
            .collect();

        if pages.is_empty() {
            return Err(Error::EmptySpine(self.path.clone()));
        }
        Ok(pages)
    }
}

/// Parse an OPF package document located at `path`.
pub fn parse_opf(content: &str, path: &str) -> Result<Package> {
    // Text is split around entity references, so trimming happens once the
    // whole value has been collected.
    let mut reader = Reader::from_str(content);

    let mut metadata = Metadata::default();
    let mut manifest = Manifest::default();
    let mut spine: Vec<String> = Vec::new();

    let mut in_metadata = false;
    let mut capture: Option<Field> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"metadata" => in_metadata = true,
                    b"item" => read_item(&e, &mut manifest),
                    b"itemref" => read_itemref(&e, &mut spine),
                    _ if in_metadata => {
                        if let Some(field) = Field::from_local_name(local) {
                            capture = Some(field);
                            buf_text.clear();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"item" => read_item(&e, &mut manifest),
                    b"itemref" => read_itemref(&e, &mut spine),
                    _ if in_metadata => {
                        if let Some(field) = Field::from_local_name(local) {
                            metadata.push(field, String::new());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if capture.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::CData(e)) => {
                if capture.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if capture.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if let Some(field) = capture.take() {
                    let text = std::mem::take(&mut buf_text).trim().to_string();
                    metadata.push(field, text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::xml(path, e)),
            _ => {}
        }
    }

    Ok(Package {
        path: path.to_string(),
        metadata,
        manifest,
        spine,
    })
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn read_item(e: &BytesStart<'_>, manifest: &mut Manifest) {
    let id = attr(e, b"id").unwrap_or_default();
    if id.is_empty() {
        return;
    }
    let href = attr(e, b"href").unwrap_or_default();
    manifest.insert(id, href);
}

fn read_itemref(e: &BytesStart<'_>, spine: &mut Vec<String>) {
    if let Some(idref) = attr(e, b"idref") {
        spine.push(idref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Vol. 1</dc:title>
    <dc:title>Alternate Title</dc:title>
    <dc:creator>Author One</dc:creator>
    <dc:creator>Author Two</dc:creator>
    <dc:language>ja</dc:language>
    <dc:identifier>urn:isbn:9780000000000</dc:identifier>
    <dc:publisher>Kodansha &amp; Co</dc:publisher>
    <dc:date>2010-03-17</dc:date>
    <dc:series>Series Name</dc:series>
    <dc:seriesid>s-001</dc:seriesid>
    <dc:number>1</dc:number>
  </metadata>
  <manifest>
    <item id="p1" href="text/p1.xhtml" media-type="application/xhtml+xml"/>
    <item id="p2" href="text/p2.xhtml" media-type="application/xhtml+xml"/>
    <item id="img1" href="images/p1.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine>
    <itemref idref="p1"/>
    <itemref idref="p2"/>
    <itemref idref="p1"/>
  </spine>
</package>"#;

    #[test]
    fn test_parse_opf_metadata() {
        let package = parse_opf(OPF, "OEBPS/content.opf").unwrap();
        let meta = &package.metadata;

        assert_eq!(meta.title, vec!["Vol. 1", "Alternate Title"]);
        assert_eq!(meta.first(Field::Title), "Vol. 1");
        assert_eq!(meta.creator, vec!["Author One", "Author Two"]);
        assert_eq!(meta.first(Field::Language), "ja");
        assert_eq!(meta.first(Field::Identifier), "urn:isbn:9780000000000");
        assert_eq!(meta.first(Field::Publisher), "Kodansha & Co");
        assert_eq!(meta.first(Field::Date), "2010-03-17");
        assert_eq!(meta.first(Field::Series), "Series Name");
        assert_eq!(meta.first(Field::SeriesId), "s-001");
        assert_eq!(meta.first(Field::Number), "1");
        assert!(meta.rights.is_empty());
        assert_eq!(meta.first(Field::Rights), "");
    }

    #[test]
    fn test_parse_opf_manifest_and_spine() {
        let package = parse_opf(OPF, "OEBPS/content.opf").unwrap();

        assert_eq!(package.manifest.len(), 3);
        assert_eq!(package.manifest.href("img1"), Some("images/p1.jpg"));
        assert_eq!(package.spine, vec!["p1", "p2", "p1"]);
    }

    #[test]
    fn test_resolve_pages_relative_to_package() {
        let package = parse_opf(OPF, "OEBPS/content.opf").unwrap();
        assert_eq!(
            package.resolve_pages().unwrap(),
            vec!["OEBPS/text/p1.xhtml", "OEBPS/text/p2.xhtml", "OEBPS/text/p1.xhtml"]
        );

        let package = parse_opf(OPF, "content.opf").unwrap();
        assert_eq!(package.resolve_pages().unwrap()[0], "text/p1.xhtml");
    }

    #[test]
    fn test_dangling_spine_reference_skipped() {
        let opf = r#"<package><manifest>
    <item id="a" href="a.xhtml"/>
    <item id="c" href="c.xhtml"/>
</manifest><spine>
    <itemref idref="a"/><itemref idref="b"/><itemref idref="c"/>
</spine></package>"#;

        let package = parse_opf(opf, "item/standard.opf").unwrap();
        assert_eq!(
            package.resolve_pages().unwrap(),
            vec!["item/a.xhtml", "item/c.xhtml"]
        );
    }

    #[test]
    fn test_empty_spine_fails() {
        let opf = r#"<package><manifest><item id="a" href="a.xhtml"/></manifest>
<spine><itemref idref="missing"/></spine></package>"#;

        let package = parse_opf(opf, "content.opf").unwrap();
        assert!(matches!(
            package.resolve_pages(),
            Err(Error::EmptySpine(path)) if path == "content.opf"
        ));
    }

    #[test]
    fn test_duplicate_manifest_id_last_wins() {
        let opf = r#"<package><manifest>
    <item id="a" href="first.xhtml"/>
    <item id="a" href="second.xhtml"/>
</manifest><spine><itemref idref="a"/></spine></package>"#;

        let package = parse_opf(opf, "content.opf").unwrap();
        assert_eq!(package.manifest.href("a"), Some("second.xhtml"));
    }

    #[test]
    fn test_non_dublin_core_series_ignored() {
        let opf = r##"<package><metadata>
    <meta name="calibre:series" content="Calibre Series"/>
    <meta name="calibre:series_index" content="4.0"/>
    <meta property="belongs-to-collection" id="c01">Collection Name</meta>
    <meta refines="#c01" property="group-position">7</meta>
</metadata><manifest/><spine/></package>"##;

        let package = parse_opf(opf, "content.opf").unwrap();
        assert_eq!(package.metadata, Metadata::default());
    }

    #[test]
    fn test_fields_outside_metadata_ignored() {
        let opf = r#"<package><title>Not Metadata</title><manifest/><spine/></package>"#;
        let package = parse_opf(opf, "content.opf").unwrap();
        assert_eq!(package.metadata, Metadata::default());
    }

    #[test]
    fn test_malformed_opf() {
        let opf = r#"<package><manifest></package>"#;
        assert!(matches!(
            parse_opf(opf, "content.opf"),
            Err(Error::Xml { entry, .. }) if entry == "content.opf"
        ));
    }
}
