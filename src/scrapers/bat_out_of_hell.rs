//! Bat Out Of Hell tour pages split the venue over an `h3` and the `h4` that
//! follows it

use scraper::{ElementRef, Selector};

use crate::traits::SiteProfile;

pub struct BatOutOfHell {
    heading: Selector,
}

impl BatOutOfHell {
    pub fn new() -> anyhow::Result<Self> {
        let heading = Selector::parse("h3.text-cream")
            .map_err(|e| anyhow::anyhow!("Failed to parse venue heading selector: {:?}", e))?;
        Ok(Self { heading })
    }
}

impl SiteProfile for BatOutOfHell {
    fn matches(&self, url: &str) -> bool {
        url.contains("batoutofhellmusical")
    }

    fn card_location(&self, card: ElementRef<'_>) -> Option<String> {
        let h3 = card.select(&self.heading).next()?;
        let h3_text = h3.text().collect::<String>().trim().to_string();
        let h4 = h3
            .next_siblings()
            .find_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "h4")?;
        let h4_text = h4.text().collect::<String>().trim().to_string();

        if h3_text.is_empty() || h4_text.is_empty() {
            None
        } else {
            Some(format!("{h3_text} - {h4_text}"))
        }
    }
}
