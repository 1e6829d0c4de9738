//! Traits at the seams of the pipeline: queryable documents for structure
//! detection, and browser capabilities for the vendor pagination engine

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

/// A parsed page that can answer "how many elements match this selector".
///
/// Selectors that fail to parse match nothing.
pub trait QueryableDocument {
    /// Number of elements matching `selector` anywhere in the document.
    fn match_count(&self, selector: &str) -> usize;

    /// Number of elements matching `selector` inside any element matching
    /// `scope`.
    fn scoped_match_count(&self, scope: &str, selector: &str) -> usize;
}

impl QueryableDocument for Html {
    fn match_count(&self, selector: &str) -> usize {
        match Selector::parse(selector) {
            Ok(sel) => self.select(&sel).count(),
            Err(_) => 0,
        }
    }

    fn scoped_match_count(&self, scope: &str, selector: &str) -> usize {
        let (Ok(scope), Ok(inner)) = (Selector::parse(scope), Selector::parse(selector)) else {
            return 0;
        };
        self.select(&scope)
            .map(|element| element.select(&inner).count())
            .sum()
    }
}

/// Site-specific tweaks applied by the generic scraper, chosen by URL.
///
/// Extraction itself is identical for every site; a profile only changes how
/// the venue name is derived or how a card's location reads.
pub trait SiteProfile: Send + Sync {
    fn matches(&self, url: &str) -> bool;

    /// Display name for the site, given the name it was listed under.
    fn display_name(&self, _url: &str, fallback: &str) -> String {
        fallback.to_string()
    }

    /// Replacement location text for one event card.
    fn card_location(&self, _card: ElementRef<'_>) -> Option<String> {
        None
    }
}

/// Whether an iframe and its content document could be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Missing,
    NoDocument,
    Ready,
}

/// Viewport a browser is launched with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Starts browser sessions. One session is used per vendor URL.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, viewport: Viewport) -> Result<Box<dyn BrowserSession>>;
}

/// The browser operations the vendor pagination engine relies on.
///
/// Frame operations address the iframe by CSS selector and run inside its
/// content document.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url`, failing if the page does not finish loading in `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Total scrollable height of the top-level page, in pixels.
    async fn scroll_height(&mut self) -> Result<u64>;

    /// Scrolls the top-level page vertically by `delta` pixels.
    async fn scroll_by(&mut self, delta: i64) -> Result<()>;

    /// Clicks the centre of the viewport and presses `key` `presses` times.
    async fn press_key_at_centre(&mut self, key: &str, presses: u32) -> Result<()>;

    async fn frame_status(&mut self, frame: &str) -> Result<FrameStatus>;

    /// Text of every `td` in every `tr` under `table`, or `None` when the
    /// table is not rendered.
    async fn frame_table_rows(&mut self, frame: &str, table: &str)
    -> Result<Option<Vec<Vec<String>>>>;

    /// Trimmed text of each element matching `items`, or `None` when nothing
    /// matches the enclosing list.
    async fn frame_texts(&mut self, frame: &str, items: &str) -> Result<Option<Vec<String>>>;

    /// Clicks the first element matching `selector` whose trimmed text equals
    /// `label` ignoring case. Returns whether anything was clicked.
    async fn frame_click_labelled(&mut self, frame: &str, selector: &str, label: &str)
    -> Result<bool>;

    /// Trimmed text of the first element matching `selector`, if any.
    async fn frame_text(&mut self, frame: &str, selector: &str) -> Result<Option<String>>;

    async fn close(self: Box<Self>) -> Result<()>;
}
