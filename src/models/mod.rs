//! Data models for site records, selectors, scraped events and run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder written into every field of a vendor-exempt selector set.
pub const VENDOR_EXEMPT_MARKER: &str = "A concord link, no values necessary";

/// Which family of site a record belongs to. Decides the selector catalog,
/// whether detection is scoped to the event card, and which fields must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteCategory {
    Theatre,
    Show,
}

/// A semantic field a selector can identify on a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    EventCard,
    Title,
    Date,
    Location,
    Link,
}

impl Field {
    /// Key used for the field in the JSON selector files.
    pub fn key(self) -> &'static str {
        match self {
            Self::EventCard => "eventCard",
            Self::Title => "title",
            Self::Date => "date",
            Self::Location => "location",
            Self::Link => "link",
        }
    }
}

/// One site to discover or scrape.
///
/// Input lists carry `id`, `name`, `url` and optionally `location`; once
/// detection succeeds the same shape is persisted with `selectors` filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// "City, Country" for theatres, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<DetectedSelectors>,
}

impl SiteRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url,
            location: None,
            selectors: None,
        }
    }

    /// The usable website URL, ignoring blanks and the `N/A` placeholder.
    pub fn website(&self) -> Option<&str> {
        let url = self.url.as_deref()?.trim();
        if url.is_empty() || url.eq_ignore_ascii_case("n/a") {
            None
        } else {
            Some(url)
        }
    }
}

/// Ids arrive as numbers or strings depending on who produced the list.
fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// Candidate CSS selectors per field, tried in the order listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorCandidateSet {
    pub event_card: Vec<String>,
    pub title: Vec<String>,
    pub date: Vec<String>,
    pub location: Vec<String>,
    pub link: Vec<String>,
}

impl SelectorCandidateSet {
    pub fn candidates(&self, field: Field) -> &[String] {
        match field {
            Field::EventCard => &self.event_card,
            Field::Title => &self.title,
            Field::Date => &self.date,
            Field::Location => &self.location,
            Field::Link => &self.link,
        }
    }
}

/// The confirmed selector for each field of one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedSelectors {
    pub event_card: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub link: String,
}

impl DetectedSelectors {
    /// Selector set for vendor pages, whose content is only reachable through
    /// the browser pagination engine.
    pub fn vendor_exempt() -> Self {
        Self {
            event_card: VENDOR_EXEMPT_MARKER.to_string(),
            title: Some(VENDOR_EXEMPT_MARKER.to_string()),
            date: VENDOR_EXEMPT_MARKER.to_string(),
            location: Some(VENDOR_EXEMPT_MARKER.to_string()),
            link: VENDOR_EXEMPT_MARKER.to_string(),
        }
    }

    pub fn is_vendor_exempt(&self) -> bool {
        self.event_card.trim() == VENDOR_EXEMPT_MARKER
    }
}

/// One event listing scraped from a page. `date` is kept as free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: String,
    pub date: String,
    pub location: String,
    pub link: String,
}

/// Everything scraped from one site in a single pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedSite {
    pub theatre_name: String,
    pub shows: Vec<EventRecord>,
}

/// A site's events normalized for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSite {
    pub theatre: Option<String>,
    pub show_name: String,
    pub shows: Vec<EventRecord>,
}

/// One data row of the vendor's listings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorTableRow {
    pub producer: String,
    pub city: String,
    pub state: String,
    pub opening: String,
    pub closing: String,
}

impl VendorTableRow {
    /// Builds a row from table cells. Rows with fewer than five cells are
    /// not data rows.
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        match cells {
            [producer, city, state, opening, closing, ..] => Some(Self {
                producer: producer.clone(),
                city: city.clone(),
                state: state.clone(),
                opening: opening.clone(),
                closing: closing.clone(),
            }),
            _ => None,
        }
    }
}

/// A vendor listing as persisted in the vendor data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorRecord {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub opening: String,
    #[serde(default)]
    pub closing: String,
}

/// A browser automation attempt that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAttempt {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl FailedAttempt {
    pub fn new(url: impl Into<String>, error: impl Into<String>, retries: u32) -> Self {
        Self {
            url: url.into(),
            error: error.into(),
            retries,
            timestamp: Some(Utc::now()),
        }
    }
}

/// A theatre that produced no usable structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedStructure {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    Theatre,
    Show,
    #[serde(rename = "Concord")]
    Vendor,
}

/// Outcome of one scrape job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub site: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub events_saved: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub part1: String,
    pub part2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheatreReport {
    pub message: String,
    pub total_theatres: usize,
    pub successful_scrapes: usize,
    pub failed_structures: Vec<FailedStructure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowReport {
    pub message: String,
    pub total_websites: usize,
    pub successful_scrapes: usize,
    pub failed_scrapes: usize,
    pub failed_websites: Vec<String>,
    pub saved_structures: Vec<SiteRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeReport {
    pub message: String,
    pub results: Vec<JobResult>,
    pub output_files: OutputFiles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_record_accepts_numeric_ids() {
        let record: SiteRecord =
            serde_json::from_str(r#"{"id": 42, "name": "Palace", "url": "https://palace.test"}"#)
                .unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.website(), Some("https://palace.test"));
    }

    #[test]
    fn website_ignores_placeholder_urls() {
        let record = SiteRecord::new("1", "Nowhere", Some(" n/a ".to_string()));
        assert_eq!(record.website(), None);
        let record = SiteRecord::new("2", "Blank", Some(String::new()));
        assert_eq!(record.website(), None);
    }

    #[test]
    fn vendor_exempt_selectors_are_recognised_after_a_round_trip() {
        let json = serde_json::to_string(&DetectedSelectors::vendor_exempt()).unwrap();
        let parsed: DetectedSelectors = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_vendor_exempt());
        assert_eq!(parsed.date, VENDOR_EXEMPT_MARKER);
    }

    #[test]
    fn short_rows_are_not_vendor_rows() {
        let cells: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        assert!(VendorTableRow::from_cells(&cells).is_none());

        let cells: Vec<String> = ["Co", "Leeds", "UK", "1 May", "9 May", "extra"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = VendorTableRow::from_cells(&cells).unwrap();
        assert_eq!(row.state, "UK");
        assert_eq!(row.closing, "9 May");
    }

    #[test]
    fn job_result_serializes_vendor_kind_as_concord() {
        let result = JobResult {
            site: "42nd Street".to_string(),
            kind: JobKind::Vendor,
            events_saved: 1,
            message: "Scraped successfully".to_string(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "Concord");
        assert_eq!(value["eventsSaved"], 1);
    }

    #[test]
    fn show_reports_compare_with_their_saved_structures() {
        fn assert_eq_type<T: Eq>(_: &T) {}

        let mut saved = SiteRecord::new("7", "Wicked", Some("https://wicked.test".to_string()));
        saved.selectors = Some(DetectedSelectors::vendor_exempt());
        let report = ShowReport {
            message: "done".to_string(),
            total_websites: 1,
            successful_scrapes: 1,
            failed_scrapes: 0,
            failed_websites: Vec::new(),
            saved_structures: vec![saved],
        };
        assert_eq_type(&report);
        assert_eq!(report.clone(), report);
    }
}
