//! `ComicInfo.xml` record and its serialization.
//!
//! Field order and names follow the ComicInfo v2 schema read by comic
//! readers (ComicRack, Kavita, Komga, ...). Empty strings and zero numbers
//! are left out of the output entirely.

use serde::{Serialize, Serializer};

use crate::error::Result;

/// Name of the metadata entry inside a CBZ.
pub const COMIC_INFO_NAME: &str = "ComicInfo.xml";

/// Free-text note attached to every generated record.
pub const GENERATED_NOTE: &str = "Generated from EPUB metadata";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Three-valued schema flag. `Unknown` is written out explicitly: readers
/// treat a missing element and `Unknown` differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YesNo {
    #[default]
    Unknown,
    No,
    Yes,
}

impl YesNo {
    pub fn as_str(self) -> &'static str {
        match self {
            YesNo::Unknown => "Unknown",
            YesNo::No => "No",
            YesNo::Yes => "Yes",
        }
    }
}

impl Serialize for YesNo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Manga {
    #[default]
    Unknown,
    No,
    Yes,
}

impl Manga {
    pub fn as_str(self) -> &'static str {
        match self {
            Manga::Unknown => "Unknown",
            Manga::No => "No",
            Manga::Yes => "Yes",
        }
    }
}

impl Serialize for Manga {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A ComicInfo record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename = "ComicInfo", rename_all = "PascalCase")]
pub struct ComicInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub series: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub number: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub count: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub volume: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alternate_series: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alternate_number: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub alternate_count: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub month: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub day: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub writer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub penciller: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub inker: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub colorist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub letterer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cover_artist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub editor: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub publisher: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub imprint: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub genre: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub web: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_count: usize,
    #[serde(rename = "LanguageISO", skip_serializing_if = "String::is_empty")]
    pub language_iso: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,
    pub black_and_white: YesNo,
    pub manga: Manga,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub characters: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub teams: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub locations: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scan_information: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub story_arc: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub series_group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub age_rating: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub community_rating: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub main_character_or_team: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub review: String,
}

impl ComicInfo {
    /// Serialize to the XML text stored as `ComicInfo.xml`: a declaration
    /// line followed by the record indented by two spaces.
    pub fn to_xml(&self) -> Result<String> {
        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut body);
        serializer.indent(' ', 2);
        self.serialize(serializer)?;
        Ok(format!("{XML_DECLARATION}{body}"))
    }
}

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}
