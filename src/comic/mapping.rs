//! Mapping EPUB package metadata onto a ComicInfo record.

use crate::epub::{Field, Metadata};

use super::info::{ComicInfo, GENERATED_NOTE, Manga, YesNo};

/// Fields whose presence means the book carries usable metadata.
const TRIGGER_FIELDS: [Field; 8] = [
    Field::Title,
    Field::Creator,
    Field::Publisher,
    Field::Series,
    Field::Date,
    Field::Language,
    Field::Identifier,
    Field::Number,
];

/// Build a ComicInfo record from package metadata.
///
/// Returns `None` when none of the trigger fields has a non-empty value;
/// no metadata entry is written for such books.
pub fn comic_info_from(metadata: &Metadata) -> Option<ComicInfo> {
    if !has_comic_metadata(metadata) {
        return None;
    }

    let first = |field| metadata.first(field).to_string();
    let series = first(Field::Series);
    let creator = first(Field::Creator);

    Some(ComicInfo {
        title: first(Field::Title),
        manga: manga_flag(&series),
        series,
        number: first(Field::Number),
        publisher: first(Field::Publisher),
        language_iso: first(Field::Language),
        year: parse_year(metadata.first(Field::Date)).unwrap_or(0),
        writer: creator.clone(),
        penciller: creator,
        notes: GENERATED_NOTE.to_string(),
        black_and_white: YesNo::Unknown,
        age_rating: "Unknown".to_string(),
        ..Default::default()
    })
}

pub fn has_comic_metadata(metadata: &Metadata) -> bool {
    TRIGGER_FIELDS
        .iter()
        .any(|&field| metadata.values(field).iter().any(|v| !v.is_empty()))
}

/// Year from the leading four characters of a date like `2010-03-17`.
pub fn parse_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}

fn manga_flag(series: &str) -> Manga {
    if series.is_empty() {
        Manga::Unknown
    } else if contains_japanese(series) {
        Manga::Yes
    } else {
        Manga::No
    }
}

/// Hiragana, katakana or CJK unified ideographs.
pub fn contains_japanese(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{4E00}'..='\u{9FBF}')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(fields: &[(Field, &str)]) -> Metadata {
        let mut metadata = Metadata::default();
        for &(field, value) in fields {
            metadata.push(field, value);
        }
        metadata
    }

    #[test]
    fn test_no_trigger_fields() {
        assert_eq!(comic_info_from(&Metadata::default()), None);

        // Rights alone is not enough
        let meta = metadata(&[(Field::Rights, "All rights reserved")]);
        assert_eq!(comic_info_from(&meta), None);

        let meta = metadata(&[(Field::Title, "")]);
        assert_eq!(comic_info_from(&meta), None);
    }

    #[test]
    fn test_full_mapping() {
        let meta = metadata(&[
            (Field::Title, "Vol. 1"),
            (Field::Creator, "A. Author"),
            (Field::Creator, "B. Second"),
            (Field::Publisher, "Pub"),
            (Field::Language, "en"),
            (Field::Date, "2010-03-17"),
            (Field::Series, "Some Series"),
            (Field::Number, "1"),
        ]);
        let info = comic_info_from(&meta).unwrap();

        assert_eq!(info.title, "Vol. 1");
        assert_eq!(info.series, "Some Series");
        assert_eq!(info.number, "1");
        assert_eq!(info.writer, "A. Author");
        assert_eq!(info.penciller, "A. Author");
        assert_eq!(info.publisher, "Pub");
        assert_eq!(info.language_iso, "en");
        assert_eq!(info.year, 2010);
        assert_eq!(info.manga, Manga::No);
        assert_eq!(info.black_and_white, YesNo::Unknown);
        assert_eq!(info.age_rating, "Unknown");
        assert_eq!(info.notes, GENERATED_NOTE);
    }

    #[test]
    fn test_identifier_alone_triggers() {
        let meta = metadata(&[(Field::Identifier, "urn:uuid:1234")]);
        let info = comic_info_from(&meta).unwrap();

        assert!(info.title.is_empty());
        assert_eq!(info.manga, Manga::Unknown);
        assert_eq!(info.year, 0);
    }

    #[test]
    fn test_japanese_series_is_manga() {
        let meta = metadata(&[(Field::Series, "進撃の巨人")]);
        assert_eq!(comic_info_from(&meta).unwrap().manga, Manga::Yes);

        let meta = metadata(&[(Field::Series, "ワンピース")]);
        assert_eq!(comic_info_from(&meta).unwrap().manga, Manga::Yes);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2010-03-17"), Some(2010));
        assert_eq!(parse_year("1999"), Some(1999));
        assert_eq!(parse_year("199"), None);
        assert_eq!(parse_year("circa 2001"), None);
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("二〇一〇年"), None);
    }

    #[test]
    fn test_contains_japanese() {
        assert!(contains_japanese("ひらがな"));
        assert!(contains_japanese("Mixed 漢字 text"));
        assert!(!contains_japanese("Plain ASCII"));
        assert!(!contains_japanese("한국어"));
    }
}
