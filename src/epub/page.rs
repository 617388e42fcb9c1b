//! Finding the image that makes up a page document.

use std::io::{self, Read, Seek};

use crate::archive::EpubArchive;
use crate::dom::{ArenaDom, ArenaNodeId, parse_html};
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, parent_dir, resolve_href, strip_bom};

/// Read a page document and return the in-archive path of its image.
///
/// `Ok(None)` means the page was read but shows no image. Any failure to
/// read the page is a [`Error::PageRead`].
pub fn extract_page_image<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    page_path: &str,
) -> Result<Option<String>> {
    let page_read = |source: io::Error| Error::PageRead {
        path: page_path.to_string(),
        source,
    };

    let entry = archive.resolve_entry(page_path).ok_or_else(|| {
        page_read(io::Error::new(
            io::ErrorKind::NotFound,
            "page document not in archive",
        ))
    })?;

    let bytes = match archive.read_entry(&entry) {
        Ok(bytes) => bytes,
        Err(Error::Io(e)) => return Err(page_read(e)),
        Err(e) => return Err(page_read(io::Error::other(e))),
    };

    let bytes = strip_bom(&bytes);
    let html = decode_text(bytes, extract_xml_encoding(bytes));
    Ok(first_image_reference(&html, page_path))
}

/// Resolve the first image of a page, relative to the page's own directory.
pub fn first_image_reference(html: &str, page_path: &str) -> Option<String> {
    let dom = parse_html(html);
    let src = dom
        .descendants()
        .find_map(|id| image_source(&dom, id))?;
    Some(resolve_href(parent_dir(page_path), strip_fragment(src)))
}

/// Non-empty source of an `<img>` or SVG `<image>`.
///
/// The value is taken as written: a `data:` URI or a remote URL is still
/// the page's image, it just never names an archive entry.
fn image_source(dom: &ArenaDom, id: ArenaNodeId) -> Option<&str> {
    let raw = match dom.element_name(id)?.as_ref() {
        "img" => dom.get_attr(id, "src")?,
        // Matches both `href` and `xlink:href`
        "image" => dom.get_attr(id, "href")?,
        _ => return None,
    };

    let src = raw.trim();
    if src.is_empty() {
        return None;
    }
    Some(src)
}

fn strip_fragment(src: &str) -> &str {
    src.find(['#', '?']).map(|i| &src[..i]).unwrap_or(src)
}
