//! `META-INF/container.xml` resolution.

use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::archive::EpubArchive;
use crate::error::{Error, Result};
use crate::util::local_name;

/// Fixed location of the container descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Locate the package document through the container descriptor.
pub fn find_package_path<R: Read + Seek>(archive: &mut EpubArchive<R>) -> Result<String> {
    if !archive.contains(CONTAINER_PATH) {
        return Err(Error::ContainerMissing);
    }
    let content = archive.read_text(CONTAINER_PATH)?;
    parse_container_xml(&content)
}

/// Parse container.xml and return the first rootfile's `full-path`.
///
/// Only the first `rootfile` is considered; if it has no usable path the
/// package reference is missing, even when later rootfiles declare one.
pub fn parse_container_xml(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                let full_path = e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"full-path")
                    .map(|attr| String::from_utf8_lossy(&attr.value).trim().to_string())
                    .unwrap_or_default();

                if full_path.is_empty() {
                    return Err(Error::PackageReferenceMissing);
                }
                return Ok(full_path.trim_start_matches('/').to_string());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::xml(CONTAINER_PATH, e)),
            _ => {}
        }
    }

    Err(Error::PackageReferenceMissing)
}
