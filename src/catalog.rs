//! Static banks of candidate CSS selectors, one file per site category

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::models::{Field, SelectorCandidateSet, SiteCategory};

/// Keys that must be present as arrays for each catalog to be usable.
pub fn required_keys(category: SiteCategory) -> &'static [Field] {
    match category {
        SiteCategory::Theatre => &[Field::EventCard, Field::Title, Field::Date, Field::Link],
        SiteCategory::Show => &[Field::EventCard, Field::Date, Field::Location, Field::Link],
    }
}

/// Loads the candidate selectors for `category` from `path`.
///
/// A missing file, unparseable JSON, or a required key that is not an array
/// all yield the empty catalog, so the run proceeds and every site simply
/// fails detection.
pub fn load_candidates(path: &Path, category: SiteCategory) -> SelectorCandidateSet {
    match try_load(path, category) {
        Ok(set) => {
            info!(
                "Loaded {} event card candidates from {}",
                set.event_card.len(),
                path.display()
            );
            set
        }
        Err(e) => {
            error!("Error loading potential selectors: {:#}", e);
            SelectorCandidateSet::default()
        }
    }
}

fn try_load(path: &Path, category: SiteCategory) -> Result<SelectorCandidateSet> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("File {} could not be read", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("File {} is not valid JSON", path.display()))?;

    for field in required_keys(category) {
        if !value.get(field.key()).is_some_and(serde_json::Value::is_array) {
            anyhow::bail!("Invalid selectors format: {} should be an array", field.key());
        }
    }

    serde_json::from_value(value)
        .with_context(|| format!("File {} has non-string selectors", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("selectors.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_a_show_catalog_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"{"eventCard": [".tour", ".event"], "date": [".d"], "location": [".l"], "link": ["a"]}"#,
        );
        let set = load_candidates(&path, SiteCategory::Show);
        assert_eq!(set.event_card, vec![".tour", ".event"]);
        assert!(set.title.is_empty());
    }

    #[test]
    fn missing_file_gives_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let set = load_candidates(&dir.path().join("absent.json"), SiteCategory::Theatre);
        assert_eq!(set, SelectorCandidateSet::default());
    }

    #[test]
    fn non_array_key_gives_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"{"eventCard": ".card", "title": [], "date": [], "link": []}"#,
        );
        assert_eq!(
            load_candidates(&path, SiteCategory::Theatre),
            SelectorCandidateSet::default()
        );
    }

    #[test]
    fn theatre_catalog_does_not_need_locations() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"{"eventCard": [".card"], "title": ["h3"], "date": [".date"], "link": ["a"]}"#,
        );
        let set = load_candidates(&path, SiteCategory::Theatre);
        assert_eq!(set.title, vec!["h3"]);
        assert!(set.location.is_empty());
    }
}
