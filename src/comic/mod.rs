//! Comic archive output: the ComicInfo record and the CBZ writer.

mod info;
mod mapping;
mod writer;

pub use info::{COMIC_INFO_NAME, ComicInfo, GENERATED_NOTE, Manga, YesNo};
pub use mapping::{comic_info_from, contains_japanese, has_comic_metadata, parse_year};
pub use writer::{CbzWriter, PageCompression, page_name};
