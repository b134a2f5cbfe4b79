//! The reference catalog of games.
//!
//! The catalog is read from a CSV export of Wikipedia's list of roguelike
//! games with the columns `First, Last, Title, Developer, Setting, Platform,
//! Notes`. The first row is a header and is discarded. Titles go through a
//! fixed sequence of cosmetic fixes (see [`normalize_title`]) so they make
//! good search queries and stable cache keys.
//!
//! A copy of the dataset is compiled into the binary; a different file can be
//! supplied through the configuration.

use crate::error::CatalogError;
use crate::models::EntityRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Number of columns every catalog row must have.
const FIELD_COUNT: usize = 7;

static BUNDLED_CATALOG: &str = include_str!("../data/roguelike-games.csv");

/// Wikipedia footnote markers such as `[6]`.
static FOOTNOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());

/// Titles that appear under more than one name in the source.
const ALIASES: &[(&str, &str)] = &[("Dark Chronicle / Dark Cloud 2", "Dark Cloud 2")];

/// Apply the cosmetic title fixes, in order.
///
/// ```ignore
/// assert_eq!(normalize_title("Foo (video game)"), "Foo");
/// assert_eq!(normalize_title("Bar, The"), "Bar");
/// ```
pub fn normalize_title(raw: &str) -> String {
    let mut title = FOOTNOTE.replace_all(raw, "").into_owned();
    title = title
        .replace('*', " ")
        .replace(", The", "")
        .replace("(video game)", "")
        .replace("(Beta)", "");
    for (alias, canonical) in ALIASES {
        title = title.replace(alias, canonical);
    }
    title.trim_matches(|c| c == ' ' || c == '*').to_string()
}

/// Ordered mapping from title to [`EntityRecord`].
///
/// Iteration follows the order of the source rows. A title that appears twice
/// keeps the position of its first row and the fields of its last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<EntityRecord>,
}

impl Catalog {
    /// Load the catalog from a CSV file.
    ///
    /// # Arguments
    ///
    /// * `path` - The CSV file to read, or `None` for the bundled dataset
    ///
    /// # Returns
    ///
    /// The normalized catalog in source row order.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The header row is missing
    /// - Any row is not valid CSV or does not have exactly seven fields
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub async fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let catalog = match path {
            Some(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| CatalogError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Self::from_reader(text.as_bytes())?
            }
            None => Self::from_reader(BUNDLED_CATALOG.as_bytes())?,
        };
        if catalog.is_empty() {
            warn!("Catalog has no entries");
        }
        info!(count = catalog.len(), "Loaded catalog");
        Ok(catalog)
    }

    /// Parse CSV rows. Any row without exactly seven fields is fatal.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header = reader
            .headers()
            .map_err(|source| CatalogError::Row { row: 1, source })?;
        if header.is_empty() {
            return Err(CatalogError::MissingHeader);
        }

        let mut catalog = Catalog::default();
        for (index, row) in reader.records().enumerate() {
            // Line 1 is the header.
            let line = index as u64 + 2;
            let row = row.map_err(|source| CatalogError::Row { row: line, source })?;
            if row.len() != FIELD_COUNT {
                return Err(CatalogError::FieldCount {
                    row: line,
                    found: row.len(),
                    expected: FIELD_COUNT,
                });
            }

            let field = |i: usize| row.get(i).unwrap_or_default().to_string();
            let title = normalize_title(&row[2]);
            if title != &row[2] {
                debug!(raw = &row[2], %title, "Normalized title");
            }
            catalog.insert(EntityRecord {
                first: field(0),
                last: field(1),
                title,
                developer: field(3),
                setting: field(4),
                platform: field(5),
                notes: field(6),
            });
        }
        Ok(catalog)
    }

    fn insert(&mut self, record: EntityRecord) {
        match self.records.iter_mut().find(|r| r.title == record.title) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn get(&self, title: &str) -> Option<&EntityRecord> {
        self.records.iter().find(|r| r.title == title)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<EntityRecord> for Catalog {
    fn from_iter<I: IntoIterator<Item = EntityRecord>>(iter: I) -> Self {
        let mut catalog = Catalog::default();
        for record in iter {
            catalog.insert(record);
        }
        catalog
    }
}

/// Serializes as a JSON object keyed by title, in catalog order.
impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.title, record)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "First,Last,Title,Developer,Setting,Platform,Notes\n";

    #[test]
    fn test_normalize_parenthetical_qualifiers() {
        assert_eq!(normalize_title("Foo (video game)"), "Foo");
        assert_eq!(normalize_title("Dwarf Fortress (Beta)"), "Dwarf Fortress");
    }

    #[test]
    fn test_normalize_trailing_article() {
        assert_eq!(normalize_title("Bar, The"), "Bar");
        assert_eq!(normalize_title("Binding of Isaac, The"), "Binding of Isaac");
    }

    #[test]
    fn test_normalize_alias() {
        assert_eq!(normalize_title("Dark Chronicle / Dark Cloud 2"), "Dark Cloud 2");
    }

    #[test]
    fn test_normalize_footnotes_and_stars() {
        assert_eq!(normalize_title("Sunless Sea[6]"), "Sunless Sea");
        assert_eq!(normalize_title("Spelunky*"), "Spelunky");
        assert_eq!(normalize_title("*Brogue*"), "Brogue");
        assert_eq!(normalize_title("Rogue"), "Rogue");
    }

    #[test]
    fn test_header_is_discarded() {
        let csv = format!("{HEADER}1980,1980,Rogue,Michael Toy,Fantasy,Unix,\n");
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);
        let rogue = catalog.get("Rogue").unwrap();
        assert_eq!(rogue.developer, "Michael Toy");
        assert_eq!(rogue.first, "1980");
        assert_eq!(rogue.notes, "");
    }

    #[test]
    fn test_quoted_titles_are_normalized() {
        let csv = format!(
            "{HEADER}2011,2011,\"Binding of Isaac, The\",Edmund McMillen,Horror,Windows,\n"
        );
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        assert!(catalog.get("Binding of Isaac").is_some());
    }

    #[test]
    fn test_malformed_row_is_fatal() {
        let csv = format!(
            "{HEADER}1980,1980,Rogue,Michael Toy,Fantasy,Unix,\n1982,Hack,Jay Fenlason\n"
        );
        match Catalog::from_reader(csv.as_bytes()) {
            Err(CatalogError::FieldCount { row, found, expected }) => {
                assert_eq!(row, 3);
                assert_eq!(found, 3);
                assert_eq!(expected, FIELD_COUNT);
            }
            other => panic!("expected a field count error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_source_has_no_header() {
        assert!(matches!(
            Catalog::from_reader("".as_bytes()),
            Err(CatalogError::MissingHeader)
        ));
    }

    #[test]
    fn test_duplicate_title_keeps_first_position() {
        let csv = format!(
            "{HEADER}2000,2000,Dark Cloud 2,Level-5,,,first\n\
             1980,1980,Rogue,Michael Toy,,,\n\
             2002,2002,Dark Chronicle / Dark Cloud 2,Level-5,,,second\n"
        );
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        let titles: Vec<_> = catalog.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Dark Cloud 2", "Rogue"]);
        assert_eq!(catalog.get("Dark Cloud 2").unwrap().notes, "second");
    }

    #[test]
    fn test_serializes_in_catalog_order() {
        let csv = format!("{HEADER}1990,2025,Angband,DevTeam,,,\n1980,1980,Rogue,Toy,,,\n");
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        let json = serde_json::to_string(&catalog).unwrap();
        let angband = json.find("\"Angband\":").unwrap();
        let rogue = json.find("\"Rogue\":").unwrap();
        assert!(angband < rogue);
    }

    #[tokio::test]
    async fn test_bundled_catalog_loads() {
        let catalog = Catalog::load(None).await.unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog.get("Dark Cloud 2").is_some());
        assert!(catalog.get("Hades").is_some());
        assert!(catalog.get("Binding of Isaac").is_some());
        assert!(catalog.iter().all(|r| !r.title.ends_with(' ')));
    }
}
