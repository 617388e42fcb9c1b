//! EPUB structure: container lookup, package document, page documents.

mod container;
mod package;
mod page;

pub use container::{CONTAINER_PATH, find_package_path, parse_container_xml};
pub use package::{Field, Manifest, Metadata, Package, parse_opf};
pub use page::{extract_page_image, first_image_reference};
