//! Structure detection: works out which catalog selectors identify the event
//! cards and their fields on one site's listing page

use tracing::{debug, info};
use url::Url;

use crate::models::{DetectedSelectors, Field, SelectorCandidateSet, SiteCategory};
use crate::traits::QueryableDocument;

/// Infers a site's selectors from a bank of candidates.
#[derive(Debug, Clone)]
pub struct StructureDetector {
    vendor_domain: String,
}

impl StructureDetector {
    pub fn new(vendor_domain: impl Into<String>) -> Self {
        Self {
            vendor_domain: vendor_domain.into().to_lowercase(),
        }
    }

    pub fn vendor_domain(&self) -> &str {
        &self.vendor_domain
    }

    pub fn is_vendor_url(&self, url: &str) -> bool {
        host_matches(url, &self.vendor_domain)
    }

    /// Returns the selectors of the first event-card candidate (in catalog
    /// order) for which every required field resolves, the vendor-exempt set
    /// when nothing resolves on a vendor page, or `None`.
    ///
    /// Show pages look for fields inside the matched card; theatre pages look
    /// across the whole document.
    pub fn detect<D>(
        &self,
        document: &D,
        candidates: &SelectorCandidateSet,
        page_url: &str,
        category: SiteCategory,
    ) -> Option<DetectedSelectors>
    where
        D: QueryableDocument + ?Sized,
    {
        let scoped = category == SiteCategory::Show;

        for card in &candidates.event_card {
            if document.match_count(card) == 0 {
                continue;
            }

            let find = |field: Field| -> Option<String> {
                candidates
                    .candidates(field)
                    .iter()
                    .find(|selector| {
                        if scoped {
                            document.scoped_match_count(card, selector) > 0
                        } else {
                            document.match_count(selector) > 0
                        }
                    })
                    .cloned()
            };

            let title = find(Field::Title);
            let location = find(Field::Location);
            let (Some(date), Some(link)) = (find(Field::Date), find(Field::Link)) else {
                debug!("Event card {} is missing a date or link on {}", card, page_url);
                continue;
            };

            // Stricter than accepting the first matching card: a theatre
            // card with no title would produce a config that scrapes nothing.
            let complete = match category {
                SiteCategory::Theatre => title.is_some(),
                SiteCategory::Show => location.is_some(),
            };
            if !complete {
                debug!("Event card {} is missing required fields on {}", card, page_url);
                continue;
            }

            info!("Found valid structure for event card: {}", card);
            return Some(DetectedSelectors {
                event_card: card.clone(),
                title,
                date,
                location,
                link,
            });
        }

        if self.is_vendor_url(page_url) {
            info!("Vendor page {} needs no selectors", page_url);
            return Some(DetectedSelectors::vendor_exempt());
        }

        None
    }
}

/// Whether `url`'s host is `domain` or one of its subdomains. URLs without a
/// scheme are read as https.
pub fn host_matches(url: &str, domain: &str) -> bool {
    let url = url.trim();
    let parsed = Url::parse(url).or_else(|_| Url::parse(&format!("https://{url}")));
    let Ok(parsed) = parsed else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    let domain = domain.to_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}
