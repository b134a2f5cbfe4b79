//! Data models shared by the catalog, the two stages, and the cache store.
//!
//! - [`EntityRecord`]: one game from the reference catalog
//! - [`LinkEntry`]: an entity record plus its discovered links, one value of
//!   the link cache
//! - [`LinkCache`] / [`ContentCache`]: the two persisted documents
//!
//! Field names are PascalCase on the wire to stay compatible with cache files
//! produced by earlier runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered list of candidate URLs for one entity, in discovery order.
pub type LinkSet = Vec<String>;

/// Raw response bodies keyed by the exact URL that was requested.
pub type ArchivedContent = BTreeMap<String, String>;

/// The persisted link cache: title -> record and links.
pub type LinkCache = BTreeMap<String, LinkEntry>;

/// The persisted content cache: title -> archived pages.
pub type ContentCache = BTreeMap<String, ArchivedContent>;

/// A single game from the reference catalog.
///
/// `first` and `last` are the era bounds as they appear in the source (years,
/// kept as text). The descriptive fields are empty when the source has no
/// value for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityRecord {
    #[serde(default)]
    pub first: String,
    #[serde(default)]
    pub last: String,
    /// Normalized title; the unique key of the entity.
    pub title: String,
    pub developer: String,
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub notes: String,
}

/// One value of the link cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkEntry {
    #[serde(flatten)]
    pub record: EntityRecord,
    #[serde(rename = "Links", default)]
    pub links: LinkSet,
}

impl LinkEntry {
    /// A fresh entry with no links yet.
    pub fn new(record: EntityRecord) -> Self {
        Self {
            record,
            links: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EntityRecord {
        EntityRecord {
            first: "1980".to_string(),
            last: "1980".to_string(),
            title: "Rogue".to_string(),
            developer: "Michael Toy and Glenn Wichman".to_string(),
            setting: "Fantasy".to_string(),
            platform: "Unix".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_link_entry_wire_format() {
        let mut entry = LinkEntry::new(record());
        entry.links.push("https://example.com/rogue".to_string());

        let value = serde_json::to_value(&entry).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "First",
            "Last",
            "Title",
            "Developer",
            "Setting",
            "Platform",
            "Notes",
            "Links",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 8);
        assert_eq!(value["Links"][0], "https://example.com/rogue");
    }

    #[test]
    fn test_link_entry_without_links_deserializes() {
        let json = r#"{
            "First": "1987",
            "Last": "2019",
            "Title": "NetHack",
            "Developer": "The NetHack DevTeam",
            "Setting": "Fantasy",
            "Platform": "Cross-platform",
            "Notes": ""
        }"#;

        let entry: LinkEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.record.title, "NetHack");
        assert!(entry.links.is_empty());
    }

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let mut cache = ContentCache::new();
        let mut pages = ArchivedContent::new();
        pages.insert(
            "https://example.jp/torneko".to_string(),
            "トルネコの大冒険".to_string(),
        );
        cache.insert("Torneko no Daibōken".to_string(), pages);

        let json = serde_json::to_string_pretty(&cache).unwrap();
        assert!(json.contains("トルネコの大冒険"));
        assert!(json.contains("Daibōken"));
    }
}
