use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::models::{DetectedSelectors, EventRecord, ScrapedSite, SiteCategory};
use crate::scrapers::default_profiles;
use crate::traits::SiteProfile;

/// Paths probed, in order, for a theatre's listings page.
const LISTING_PATHS: [&str; 2] = ["/whats-on/", "/events/"];

/// Fetches listing pages and pulls event records out of them with a
/// confirmed selector set.
#[derive(Clone)]
pub struct SiteScraper {
    client: Client,
    profiles: Arc<Vec<Box<dyn SiteProfile>>>,
}

impl SiteScraper {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            profiles: Arc::new(default_profiles()?),
        })
    }

    /// Fetches `url` and returns its body, failing on non-success statuses.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch {}: {}",
                url,
                response.status()
            ));
        }

        Ok(response.text().await?)
    }

    /// The page to analyse for a theatre: the first of its known listing
    /// paths that answers a `HEAD` request, else the base URL itself.
    pub async fn best_listing_url(&self, base_url: &str) -> Result<String> {
        let base = Url::parse(base_url).with_context(|| format!("Invalid URL: {base_url}"))?;

        for path in LISTING_PATHS {
            let Ok(candidate) = base.join(path) else {
                continue;
            };
            match self.client.head(candidate.as_str()).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Using listing page {}", candidate);
                    return Ok(candidate.to_string());
                }
                _ => {}
            }
        }

        Ok(base_url.to_string())
    }

    /// Scrapes every event card on `url`.
    pub async fn scrape(
        &self,
        name: &str,
        url: &str,
        selectors: &DetectedSelectors,
        category: SiteCategory,
    ) -> Result<ScrapedSite> {
        if selectors.is_vendor_exempt() {
            anyhow::bail!("{url} is a vendor page and cannot be scraped with selectors");
        }

        let html = self.fetch(url).await?;
        let site = self.extract(name, url, &html, selectors, category)?;

        info!("Found {} events on {}", site.shows.len(), url);
        Ok(site)
    }

    /// Pulls event records out of an already fetched page.
    ///
    /// Cards missing a required field are skipped. Theatre cards need a
    /// title, date and link; show cards need a date and link and take the
    /// site name as their title.
    pub fn extract(
        &self,
        name: &str,
        url: &str,
        html: &str,
        selectors: &DetectedSelectors,
        category: SiteCategory,
    ) -> Result<ScrapedSite> {
        let profile = self.profiles.iter().find(|p| p.matches(url));
        let theatre_name = profile.map_or_else(
            || name.to_string(),
            |p| p.display_name(url, name),
        );

        let card_selector = parse_selector(&selectors.event_card, "event card")?;
        let date_selector = parse_selector(&selectors.date, "date")?;
        let link_selector = parse_selector(&selectors.link, "link")?;
        let title_selector = selectors
            .title
            .as_deref()
            .map(|s| parse_selector(s, "title"))
            .transpose()?;
        let location_selector = selectors
            .location
            .as_deref()
            .map(|s| parse_selector(s, "location"))
            .transpose()?;

        let base = Url::parse(url).ok();
        let document = Html::parse_document(html);
        let mut shows = Vec::new();

        for card in document.select(&card_selector) {
            let date = text_of(card, &date_selector);
            let Some(link) = card
                .select(&link_selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| resolve_link(base.as_ref(), href))
            else {
                continue;
            };
            if date.is_empty() {
                continue;
            }

            let title = match category {
                SiteCategory::Theatre => match &title_selector {
                    Some(sel) => text_of(card, sel),
                    None => String::new(),
                },
                SiteCategory::Show => name.to_string(),
            };
            if title.is_empty() {
                continue;
            }

            let default_location = match category {
                SiteCategory::Theatre => theatre_name.clone(),
                SiteCategory::Show => "Unknown Location".to_string(),
            };
            let location = profile
                .and_then(|p| p.card_location(card))
                .or_else(|| location_selector.as_ref().map(|sel| text_of(card, sel)))
                .unwrap_or(default_location);

            shows.push(EventRecord {
                title,
                date,
                location,
                link,
            });
        }

        Ok(ScrapedSite {
            theatre_name,
            shows,
        })
    }
}

fn parse_selector(selector: &str, what: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| anyhow::anyhow!("Failed to parse {} selector {:?}: {:?}", what, selector, e))
}

/// Text of every element matching `selector` inside `card`, joined and
/// trimmed.
fn text_of(card: ElementRef<'_>, selector: &Selector) -> String {
    card.select(selector)
        .flat_map(|el| el.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    base?.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> SiteScraper {
        SiteScraper::new("show-finder-test/0.1", Duration::from_secs(5)).unwrap()
    }

    fn theatre_selectors() -> DetectedSelectors {
        DetectedSelectors {
            event_card: ".show".to_string(),
            title: Some("h3".to_string()),
            date: ".dates".to_string(),
            location: None,
            link: "a".to_string(),
        }
    }

    const LISTING: &str = r#"
        <div class="show"><h3>Hamlet</h3><p class="dates">1 May - 9 May</p><a href="/hamlet">Book</a></div>
        <div class="show"><h3>Cats</h3><p class="dates">Until Sun 26 Oct 2025</p><a href="https://tickets.test/cats">Book</a></div>
        <div class="show"><h3>No Link</h3><p class="dates">TBC</p></div>
        <div class="show"><h3></h3><p class="dates">2 June</p><a href="/untitled">Book</a></div>
    "#;

    #[test]
    fn extracts_complete_cards_and_resolves_links() {
        let site = scraper()
            .extract(
                "Grand",
                "https://grand.test/whats-on/",
                LISTING,
                &theatre_selectors(),
                SiteCategory::Theatre,
            )
            .unwrap();

        assert_eq!(site.theatre_name, "Grand");
        assert_eq!(site.shows.len(), 2);
        assert_eq!(site.shows[0].title, "Hamlet");
        assert_eq!(site.shows[0].link, "https://grand.test/hamlet");
        assert_eq!(site.shows[0].location, "Grand");
        assert_eq!(site.shows[1].link, "https://tickets.test/cats");
    }

    #[test]
    fn venue_profiles_rename_the_theatre() {
        let site = scraper()
            .extract(
                "LW",
                "https://lwtheatres.co.uk/theatres/gillian-lynne-theatre/whats-on/",
                LISTING,
                &theatre_selectors(),
                SiteCategory::Theatre,
            )
            .unwrap();
        assert_eq!(site.theatre_name, "GILLIAN LYNNE THEATRE");
        assert_eq!(site.shows[0].location, "GILLIAN LYNNE THEATRE");
    }

    #[test]
    fn show_cards_take_the_site_name_as_title() {
        let html = r#"
            <li class="tour"><span class="when">3 June</span><span class="where">Leeds</span><a href="book">Tickets</a></li>
            <li class="tour"><span class="when"></span><span class="where">York</span><a href="book">Tickets</a></li>
        "#;
        let selectors = DetectedSelectors {
            event_card: ".tour".to_string(),
            title: None,
            date: ".when".to_string(),
            location: Some(".where".to_string()),
            link: "a".to_string(),
        };
        let site = scraper()
            .extract(
                "Wicked",
                "https://wicked.test/tour/",
                html,
                &selectors,
                SiteCategory::Show,
            )
            .unwrap();
        assert_eq!(site.shows.len(), 1);
        assert_eq!(site.shows[0].title, "Wicked");
        assert_eq!(site.shows[0].location, "Leeds");
        assert_eq!(site.shows[0].link, "https://wicked.test/tour/book");
    }

    #[test]
    fn invalid_confirmed_selectors_are_an_error() {
        let selectors = DetectedSelectors {
            event_card: "div[[".to_string(),
            ..theatre_selectors()
        };
        assert!(
            scraper()
                .extract("X", "https://x.test", LISTING, &selectors, SiteCategory::Theatre)
                .is_err()
        );
    }
}
