use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use scraper::Html;
use tracing::{error, info, warn};
use url::Url;

use crate::catalog::load_candidates;
use crate::config::Config;
use crate::detector::StructureDetector;
use crate::export::save_to_csv;
use crate::ledger::RetryLedger;
use crate::models::{
    DetectedSelectors, EventRecord, ExportSite, FailedAttempt, FailedStructure, JobKind,
    JobResult, ScrapeReport, SelectorCandidateSet, ShowReport, SiteCategory, SiteRecord,
    TheatreReport, VendorRecord,
};
use crate::scheduler::run_bounded;
use crate::scraper::SiteScraper;
use crate::store::{SharedArrayFile, read_array, read_array_strict, write_array_logged};
use crate::traits::BrowserLauncher;
use crate::vendor::{PaginationEngine, PaginationPolicy};

pub const THEATRE_LIST: &str = "theatres.json";
pub const SHOW_LIST: &str = "shows.json";
pub const THEATRE_CATALOG: &str = "potentialSelectors.json";
pub const SHOW_CATALOG: &str = "showPotentialSelectors.json";
pub const THEATRE_CONFIGS: &str = "websiteConfigs.json";
pub const SHOW_CONFIGS: &str = "showConfigs.json";
pub const VENDOR_DATA: &str = "concordeData.json";
pub const FAILED_STRUCTURES: &str = "failedStructures.json";
pub const FAILED_ATTEMPTS: &str = "failedAttempts.json";

const UNKNOWN_SHOW: &str = "Unknown Show";
const UNKNOWN_DATE: &str = "TBA";
const UNKNOWN_VENUE: &str = "Unknown Venue";

/// What came of analysing one show site.
enum ShowAnalysis {
    Saved(SiteRecord),
    Undetected,
    VendorFailed(Vec<FailedAttempt>),
}

/// Runs the discovery and scrape pipelines over the site lists in the data
/// directory.
#[derive(Clone)]
pub struct ShowFinder {
    config: Arc<Config>,
    scraper: SiteScraper,
    detector: StructureDetector,
    engine: PaginationEngine,
    ledger: Arc<RetryLedger>,
}

impl ShowFinder {
    pub fn new(config: Config, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
        let policy = config.pagination_policy();
        Self::with_policy(config, launcher, policy)
    }

    /// Like [`ShowFinder::new`] with an explicit browser policy.
    pub fn with_policy(
        config: Config,
        launcher: Arc<dyn BrowserLauncher>,
        policy: PaginationPolicy,
    ) -> Result<Self> {
        let scraper = SiteScraper::new(&config.user_agent, config.request_timeout)?;
        let detector = StructureDetector::new(config.vendor_domain.clone());
        let vendor_data = Arc::new(SharedArrayFile::new(config.data_file(VENDOR_DATA)));
        let engine = PaginationEngine::new(launcher, policy, vendor_data);
        let ledger = Arc::new(RetryLedger::new(
            config.data_file(FAILED_ATTEMPTS),
            config.max_retries,
            config.vendor_domain.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            scraper,
            detector,
            engine,
            ledger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Detects the listing structure of every theatre site and saves the
    /// confirmed configs and the failures.
    pub async fn process_theatre_sites(&self) -> TheatreReport {
        let list_path = self.config.data_file(THEATRE_LIST);
        let theatres: Vec<SiteRecord> = match read_array_strict(&list_path) {
            Ok(theatres) => theatres,
            Err(e) => {
                error!("Error reading theatre data: {:#}", e);
                return TheatreReport {
                    message: format!("Error processing theatres: {e:#}"),
                    total_theatres: 0,
                    successful_scrapes: 0,
                    failed_structures: Vec::new(),
                    error: Some(format!("{e:#}")),
                };
            }
        };
        let candidates = load_candidates(
            &self.config.data_file(THEATRE_CATALOG),
            SiteCategory::Theatre,
        );

        let total_theatres = theatres.len();
        let mut failed_structures = Vec::new();
        let mut jobs = Vec::new();
        for theatre in theatres {
            if theatre.website().is_some() {
                jobs.push(theatre);
            } else {
                failed_structures.push(FailedStructure {
                    id: theatre.id,
                    name: theatre.name,
                    url: None,
                    reason: "No website provided".to_string(),
                });
            }
        }
        let without_website = failed_structures.len();

        let candidates = &candidates;
        let settled = run_bounded(jobs, self.config.concurrency, move |theatre| async move {
            self.analyse_theatre(&theatre, candidates).await
        })
        .await;

        let mut configs = Vec::new();
        let mut network_error = None;
        for job in settled {
            let theatre = job.item;
            match job.result {
                Ok(Some(config)) => configs.push(config),
                Ok(None) => failed_structures.push(FailedStructure {
                    id: theatre.id,
                    name: theatre.name,
                    url: theatre.url,
                    reason: "No valid structure detected".to_string(),
                }),
                Err(e) => {
                    if is_network_error(&e) {
                        network_error = Some(format!("{e:#}"));
                    }
                    failed_structures.push(FailedStructure {
                        id: theatre.id,
                        name: theatre.name,
                        url: theatre.url,
                        reason: format!("Error: {e:#}"),
                    });
                }
            }
        }

        write_array_logged(
            &self.config.data_file(THEATRE_CONFIGS),
            &configs,
            "Website configurations",
        );
        write_array_logged(
            &self.config.data_file(FAILED_STRUCTURES),
            &failed_structures,
            "Failed structures",
        );

        info!("{} theatres processed successfully.", configs.len());
        info!("{} theatres without a website.", without_website);
        info!(
            "{} theatres failed to scrape.",
            failed_structures.len() - without_website
        );

        TheatreReport {
            message: "Theatre website structures processed successfully.".to_string(),
            total_theatres,
            successful_scrapes: configs.len(),
            failed_structures,
            error: network_error.map(|e| format!("Network error: {e}")),
        }
    }

    /// `Ok(None)` when the site answered but no structure was found; `Err`
    /// only for connection failures.
    async fn analyse_theatre(
        &self,
        theatre: &SiteRecord,
        candidates: &SelectorCandidateSet,
    ) -> Result<Option<SiteRecord>> {
        let Some(base) = theatre.website() else {
            return Ok(None);
        };
        let hostname = match Url::parse(base) {
            Ok(url) => url.host_str().unwrap_or(base).to_string(),
            Err(e) => {
                warn!("Invalid URL for {}: {} ({})", theatre.name, base, e);
                return Ok(None);
            }
        };

        let url = self.scraper.best_listing_url(base).await?;
        let html = match self.scraper.fetch(&url).await {
            Ok(html) => html,
            Err(e) if is_network_error(&e) => return Err(e),
            Err(e) => {
                warn!("Error analysing {}: {:#}", url, e);
                return Ok(None);
            }
        };

        let selectors = {
            let document = Html::parse_document(&html);
            self.detector
                .detect(&document, candidates, &url, SiteCategory::Theatre)
        };

        Ok(selectors.map(|selectors| SiteRecord {
            id: theatre.id.clone(),
            name: hostname,
            url: Some(url),
            location: Some(
                theatre
                    .location
                    .clone()
                    .unwrap_or_else(|| theatre.name.clone()),
            ),
            selectors: Some(selectors),
        }))
    }

    /// Detects the structure of every show site, sending vendor pages
    /// through the browser engine instead, then replays the retry ledger.
    pub async fn process_show_sites(&self) -> ShowReport {
        let list_path = self.config.data_file(SHOW_LIST);
        // An absent or empty list still runs the ledger replay below.
        let shows: Vec<SiteRecord> = match read_array_strict(&list_path) {
            Ok(shows) => {
                if shows.is_empty() {
                    warn!("No shows listed in {}", list_path.display());
                }
                shows
            }
            Err(e) => {
                error!("Error in show discovery: {:#}", e);
                return ShowReport::failed(format!("{e:#}"));
            }
        };
        let candidates = load_candidates(&self.config.data_file(SHOW_CATALOG), SiteCategory::Show);

        let total_websites = shows.len();
        let mut failed_websites = Vec::new();
        let mut jobs = Vec::new();
        for show in shows {
            if show.website().is_some() {
                jobs.push(show);
            } else {
                failed_websites.push(format!("No valid URL found for show: {}", show.name));
            }
        }

        let candidates = &candidates;
        let settled = run_bounded(jobs, self.config.concurrency, move |show| async move {
            self.analyse_show(&show, candidates).await
        })
        .await;
        info!("All jobs completed.");

        let mut saved_structures = Vec::new();
        let mut vendor_failures = Vec::new();
        for job in settled {
            let url = job.item.website().unwrap_or_default().to_string();
            match job.result {
                Ok(ShowAnalysis::Saved(config)) => saved_structures.push(config),
                Ok(ShowAnalysis::Undetected) => failed_websites.push(url),
                Ok(ShowAnalysis::VendorFailed(failures)) => {
                    vendor_failures.extend(failures);
                    failed_websites.push(url);
                }
                Err(e) => {
                    error!("Error in job for {}: {:#}", url, e);
                    failed_websites.push(url);
                }
            }
        }

        write_array_logged(
            &self.config.data_file(SHOW_CONFIGS),
            &saved_structures,
            "Show configurations",
        );
        info!("{} show websites processed successfully.", saved_structures.len());
        if !failed_websites.is_empty() {
            info!("{} websites failed to process:", failed_websites.len());
            for website in &failed_websites {
                info!("- {}", website);
            }
        }

        if let Err(e) = self.ledger.merge(&vendor_failures) {
            error!("Error saving failed attempts: {:#}", e);
        }
        let engine = &self.engine;
        if let Err(e) = self
            .ledger
            .replay(self.config.concurrency, move |url| async move {
                engine.retry(&url).await
            })
            .await
        {
            error!("Error retrying vendor failures: {:#}", e);
        }

        ShowReport {
            message: "Show website structures processed successfully.".to_string(),
            total_websites,
            successful_scrapes: saved_structures.len(),
            failed_scrapes: failed_websites.len(),
            failed_websites,
            saved_structures,
        }
    }

    async fn analyse_show(
        &self,
        show: &SiteRecord,
        candidates: &SelectorCandidateSet,
    ) -> Result<ShowAnalysis> {
        let url = show
            .website()
            .with_context(|| format!("No valid URL found for show: {}", show.name))?;

        let saved = |selectors| {
            ShowAnalysis::Saved(SiteRecord {
                id: show.id.clone(),
                name: show.name.clone(),
                url: Some(url.to_string()),
                location: None,
                selectors: Some(selectors),
            })
        };

        if self.detector.is_vendor_url(url) {
            let run = self.engine.analyse(url).await;
            return Ok(if run.succeeded() {
                saved(DetectedSelectors::vendor_exempt())
            } else {
                ShowAnalysis::VendorFailed(run.failures)
            });
        }

        info!("Analyzing show website: {}...", url);
        let html = match self.scraper.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                error!("Error analyzing {}: {:#}", url, e);
                return Ok(ShowAnalysis::Undetected);
            }
        };

        let selectors = {
            let document = Html::parse_document(&html);
            self.detector
                .detect(&document, candidates, url, SiteCategory::Show)
        };
        Ok(match selectors {
            Some(selectors) => saved(selectors),
            None => {
                warn!("No valid structure found for {}", url);
                ShowAnalysis::Undetected
            }
        })
    }

    /// Scrapes every confirmed config, resolves vendor shows against the
    /// vendor data file and exports the lot to CSV.
    pub async fn run_scrape(&self) -> Result<ScrapeReport> {
        let theatre_configs: Vec<SiteRecord> = read_array(&self.config.data_file(THEATRE_CONFIGS));
        let show_configs: Vec<SiteRecord> = read_array(&self.config.data_file(SHOW_CONFIGS));
        let vendor_data: Vec<VendorRecord> = read_array(&self.config.data_file(VENDOR_DATA));
        info!(
            "Loaded {} theatre configs, {} show configs, {} vendor rows",
            theatre_configs.len(),
            show_configs.len(),
            vendor_data.len()
        );

        let vendor_urls: HashSet<String> = vendor_data
            .iter()
            .map(|row| normalise_url(&row.url))
            .filter(|url| !url.is_empty())
            .collect();
        let generic = |config: &SiteRecord| {
            let url = config.url.as_deref().unwrap_or_default();
            let vendor =
                self.detector.is_vendor_url(url) || vendor_urls.contains(&normalise_url(url));
            if vendor {
                info!("Skipping vendor site: {}", config.name);
            }
            !vendor
        };

        let jobs: Vec<(usize, SiteCategory, SiteRecord)> = theatre_configs
            .into_iter()
            .filter(|c| generic(c))
            .map(|c| (SiteCategory::Theatre, c))
            .chain(
                show_configs
                    .iter()
                    .filter(|c| generic(c))
                    .cloned()
                    .map(|c| (SiteCategory::Show, c)),
            )
            .enumerate()
            .map(|(index, (category, config))| (index, category, config))
            .collect();

        let mut settled = run_bounded(
            jobs,
            self.config.concurrency,
            move |(_, category, config)| async move { self.scrape_config(&config, category).await },
        )
        .await;
        settled.sort_by_key(|job| job.item.0);

        let mut results = Vec::new();
        let mut sites = Vec::new();
        for job in settled {
            let (_, category, config) = job.item;
            let kind = match category {
                SiteCategory::Theatre => JobKind::Theatre,
                SiteCategory::Show => JobKind::Show,
            };
            match job.result {
                Ok(site) => {
                    info!("Scraped {} events for {}", site.shows.len(), config.name);
                    results.push(JobResult {
                        site: config.name,
                        kind,
                        events_saved: site.shows.len(),
                        message: "Scraped successfully".to_string(),
                    });
                    sites.push(site);
                }
                Err(e) => {
                    error!("Error scraping {}: {:#}", config.name, e);
                    results.push(JobResult {
                        site: config.name,
                        kind,
                        events_saved: 0,
                        message: format!("Error scraping: {e:#}"),
                    });
                }
            }
        }

        for config in show_configs
            .iter()
            .filter(|c| self.detector.is_vendor_url(c.url.as_deref().unwrap_or_default()))
        {
            let (vendor_sites, vendor_results) = vendor_matches(config, &vendor_data);
            sites.extend(vendor_sites);
            results.extend(vendor_results);
        }

        let output_files = save_to_csv(&sites, self.config.output_dir())?;
        info!(
            "Scraping completed. Data saved to {} and {}",
            output_files.part1, output_files.part2
        );

        Ok(ScrapeReport {
            message: "Scraping completed successfully.".to_string(),
            results,
            output_files,
        })
    }

    async fn scrape_config(&self, config: &SiteRecord, category: SiteCategory) -> Result<ExportSite> {
        let url = config
            .url
            .as_deref()
            .with_context(|| format!("{} has no URL", config.name))?;
        let selectors = config
            .selectors
            .as_ref()
            .with_context(|| format!("{} has no selectors", config.name))?;

        let scraped = self
            .scraper
            .scrape(&config.name, url, selectors, category)
            .await?;

        let shows = scraped
            .shows
            .into_iter()
            .map(|show| EventRecord {
                title: non_empty(show.title, UNKNOWN_SHOW),
                date: non_empty(show.date, UNKNOWN_DATE),
                location: non_empty(show.location, UNKNOWN_VENUE),
                link: show.link,
            })
            .collect();

        Ok(match category {
            SiteCategory::Theatre => ExportSite {
                theatre: Some(scraped.theatre_name),
                show_name: String::new(),
                shows,
            },
            SiteCategory::Show => ExportSite {
                theatre: None,
                show_name: config.name.clone(),
                shows,
            },
        })
    }
}

impl ShowReport {
    fn failed(reason: String) -> Self {
        Self {
            message: format!("Error processing show websites: {reason}"),
            total_websites: 0,
            successful_scrapes: 0,
            failed_scrapes: 0,
            failed_websites: Vec::new(),
            saved_structures: Vec::new(),
        }
    }
}

/// One export site and job result per vendor row stored for this config's
/// URL, or a single "no match" result.
fn vendor_matches(
    config: &SiteRecord,
    vendor_data: &[VendorRecord],
) -> (Vec<ExportSite>, Vec<JobResult>) {
    let url = config.url.clone().unwrap_or_default();
    let wanted = normalise_url(&url);
    let rows: Vec<&VendorRecord> = vendor_data
        .iter()
        .filter(|row| !row.url.is_empty() && normalise_url(&row.url) == wanted)
        .collect();

    if rows.is_empty() {
        info!("No match found for {} in vendor data", config.name);
        let result = JobResult {
            site: config.name.clone(),
            kind: JobKind::Vendor,
            events_saved: 0,
            message: "No matching data found".to_string(),
        };
        return (Vec::new(), vec![result]);
    }

    rows.into_iter()
        .map(|row| {
            let name = non_empty(row.name.clone(), "Unknown Name");
            let site = ExportSite {
                theatre: None,
                show_name: name.clone(),
                shows: vec![EventRecord {
                    title: name,
                    date: format!(
                        "{} - {}",
                        non_empty(row.opening.clone(), "Unknown Date"),
                        non_empty(row.closing.clone(), "Unknown Date")
                    ),
                    location: format!(
                        "{}, {}",
                        non_empty(row.city.clone(), "Unknown City"),
                        non_empty(row.state.clone(), "Unknown State")
                    ),
                    link: url.clone(),
                }],
            };
            let result = JobResult {
                site: config.name.clone(),
                kind: JobKind::Vendor,
                events_saved: 1,
                message: "Scraped successfully".to_string(),
            };
            (site, result)
        })
        .unzip()
}

fn non_empty(value: String, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}

/// Lower-cased URL without query, fragment or a trailing slash. Text that
/// does not parse as a URL is only lower-cased.
pub fn normalise_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url.trim()) else {
        return url.trim().to_lowercase();
    };
    parsed.set_query(None);
    parsed.set_fragment(None);
    let text = parsed.to_string();
    text.strip_suffix('/').unwrap_or(&text).to_lowercase()
}

fn is_network_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_connect)
    })
}
