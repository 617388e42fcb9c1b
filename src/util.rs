//! Path and text helpers shared by the pipeline stages.

use std::borrow::Cow;

// ============================================================================
// Archive Paths
// ============================================================================

/// Directory component of an in-archive path, without a trailing slash.
///
/// `"OEBPS/content.opf"` -> `"OEBPS"`, `"content.opf"` -> `""`.
pub fn parent_dir(path: &str) -> &str {
    memchr::memrchr(b'/', path.as_bytes())
        .map(|i| &path[..i])
        .unwrap_or("")
}

/// Resolve an href against a base directory inside the archive.
///
/// The result uses forward slashes, has no leading slash, and has `.` and
/// `..` segments folded away. Backslashes written by Windows tooling are
/// treated as separators. An absolute href is taken from the archive root,
/// and `..` never climbs above the root.
///
/// ```ignore
/// assert_eq!(resolve_href("OEBPS/text", "../images/p1.jpg"), "OEBPS/images/p1.jpg");
/// ```
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.replace('\\', "/");

    let base = if href.starts_with('/') { "" } else { base_dir };

    let mut parts: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(href.split('/')) {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            s => parts.push(s),
        }
    }

    parts.join("/")
}

/// Extension of the final path segment, including the dot, verbatim.
///
/// `"OEBPS/images/p01.JPG"` -> `".JPG"`, `"OEBPS/images/p01"` -> `""`.
pub fn file_extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    memchr::memrchr(b'.', name.as_bytes())
        .map(|i| &name[i..])
        .unwrap_or("")
}

/// Percent-decode an href, returning `None` when decoding changes nothing
/// or yields invalid UTF-8.
pub fn percent_decoded(path: &str) -> Option<String> {
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .ok()?;
    if decoded == path {
        None
    } else {
        Some(decoded.into_owned())
    }
}

// ============================================================================
// XML Helpers
// ============================================================================

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
pub fn local_name(name: &[u8]) -> &[u8] {
    memchr::memrchr(b':', name)
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

// ============================================================================
// Encoding Detection
// ============================================================================

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in old ebooks)
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract encoding from XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` within the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = memchr::memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = memchr::memchr(quote, &after_enc[1..])? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("OEBPS/content.opf"), "OEBPS");
        assert_eq!(parent_dir("a/b/c.xhtml"), "a/b");
        assert_eq!(parent_dir("content.opf"), "");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS", "text/p1.xhtml"), "OEBPS/text/p1.xhtml");
        assert_eq!(resolve_href("", "p1.xhtml"), "p1.xhtml");
        assert_eq!(
            resolve_href("OEBPS/text", "../images/p1.jpg"),
            "OEBPS/images/p1.jpg"
        );
        assert_eq!(resolve_href("OEBPS/text", "./p1.jpg"), "OEBPS/text/p1.jpg");
        assert_eq!(resolve_href("OEBPS", "/images/p1.jpg"), "images/p1.jpg");
        assert_eq!(resolve_href("OEBPS", "../../p1.jpg"), "p1.jpg");
        assert_eq!(resolve_href("OEBPS", "images\\p1.jpg"), "OEBPS/images/p1.jpg");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("OEBPS/images/p01.jpg"), ".jpg");
        assert_eq!(file_extension("p01.JPEG"), ".JPEG");
        assert_eq!(file_extension("OEBPS/images/p01"), "");
        assert_eq!(file_extension("dir.d/p01"), "");
        assert_eq!(file_extension("a/b.tar.png"), ".png");
    }

    #[test]
    fn test_percent_decoded() {
        assert_eq!(percent_decoded("page%201.xhtml"), Some("page 1.xhtml".to_string()));
        assert_eq!(percent_decoded("page1.xhtml"), None);
    }

    #[test]
    fn test_strip_bom() {
        let with_bom = &[0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(strip_bom(with_bom), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");
        assert_eq!(strip_bom(&[]), &[]);

        // Partial BOM (not stripped)
        let partial = &[0xEF, 0xBB, b'x'];
        assert_eq!(strip_bom(partial), partial);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"title"), b"title");
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"opf:meta"), b"meta");
        assert_eq!(local_name(b""), b"");
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("apos"), Some("'".to_string()));
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x2019"), Some("\u{2019}".to_string()));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    #[test]
    fn test_decode_text_fallbacks() {
        assert_eq!(decode_text("héllo".as_bytes(), None), "héllo");
        // 0xE9 is "é" in Windows-1252 and invalid as a lone UTF-8 byte
        assert_eq!(decode_text(b"caf\xE9", None), "café");
        assert_eq!(decode_text(b"caf\xE9", Some("iso-8859-1")), "café");
    }

    #[test]
    fn test_extract_xml_encoding() {
        let decl = br#"<?xml version="1.0" encoding="Shift_JIS"?><html/>"#;
        assert_eq!(extract_xml_encoding(decl), Some("Shift_JIS"));
        assert_eq!(extract_xml_encoding(b"<html/>"), None);
    }

    proptest! {
        #[test]
        fn prop_resolve_href_is_normalized(
            base in prop::collection::vec("[a-z]{1,4}|\\.\\.|\\.", 0..4),
            href in prop::collection::vec("[a-z]{1,4}|\\.\\.|\\.", 1..5),
        ) {
            let resolved = resolve_href(&base.join("/"), &href.join("/"));
            prop_assert!(!resolved.starts_with('/'));
            prop_assert!(!resolved.contains('\\'));
            prop_assert!(!resolved.contains("//"));
            prop_assert!(resolved.split('/').all(|s| s != "." && s != ".."));
        }
    }
}
