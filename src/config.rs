//! # Runtime Configuration
//!
//! Every setting comes from `SHOW_FINDER_*` environment variables (a `.env`
//! file is loaded first by `main`). Unset variables fall back to defaults
//! that match the layout the site lists and outputs have always used.
//!
//! ## Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `SHOW_FINDER_DATA_DIR` | `docs` |
//! | `SHOW_FINDER_OUTPUT_DIR` | `dataOutput` |
//! | `SHOW_FINDER_CONCURRENCY` | `7` |
//! | `SHOW_FINDER_VENDOR_DOMAIN` | `concordtheatricals.co.uk` |
//! | `SHOW_FINDER_PAGE_CAP` | `10` |
//! | `SHOW_FINDER_ZOOM_OUT_PRESSES` | `0` |
//! | `SHOW_FINDER_MAX_RETRIES` | `5` |
//! | `SHOW_FINDER_REQUEST_TIMEOUT_SECS` | `30` |
//! | `SHOW_FINDER_SCHEDULE` | `0 0 3 * * *` |
//! | `SHOW_FINDER_USER_AGENT` | desktop Chrome |
//!
//! ## Data Directory Layout
//!
//! The data directory holds one JSON array per file:
//!
//! - `theatres.json`, `shows.json`: site lists to discover
//! - `potentialSelectors.json`, `showPotentialSelectors.json`: selector catalogs
//! - `websiteConfigs.json`, `showConfigs.json`: confirmed selector configs
//! - `concordeData.json`: rows scraped from the vendor table
//! - `failedStructures.json`: theatre sites with no usable structure
//! - `failedAttempts.json`: the vendor retry ledger

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::scheduler::DEFAULT_CONCURRENCY;
use crate::vendor::PaginationPolicy;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub vendor_domain: String,
    pub page_cap: u32,
    /// `-` presses before reading vendor tables; the all-listings page
    /// only loads every row once zoomed out (11 presses).
    pub zoom_out_presses: u32,
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Cron expression (with seconds) for `watch` runs.
    pub schedule: String,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("dataOutput"),
            concurrency: DEFAULT_CONCURRENCY,
            vendor_domain: "concordtheatricals.co.uk".to_string(),
            page_cap: 10,
            zoom_out_presses: 0,
            max_retries: 5,
            request_timeout: Duration::from_secs(30),
            schedule: "0 0 3 * * *".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any variable source. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            data_dir: get("SHOW_FINDER_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            output_dir: get("SHOW_FINDER_OUTPUT_DIR").map_or(defaults.output_dir, PathBuf::from),
            concurrency: parse_or(&get, "SHOW_FINDER_CONCURRENCY", defaults.concurrency)?,
            vendor_domain: get("SHOW_FINDER_VENDOR_DOMAIN").unwrap_or(defaults.vendor_domain),
            page_cap: parse_or(&get, "SHOW_FINDER_PAGE_CAP", defaults.page_cap)?,
            zoom_out_presses: parse_or(
                &get,
                "SHOW_FINDER_ZOOM_OUT_PRESSES",
                defaults.zoom_out_presses,
            )?,
            max_retries: parse_or(&get, "SHOW_FINDER_MAX_RETRIES", defaults.max_retries)?,
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "SHOW_FINDER_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            schedule: get("SHOW_FINDER_SCHEDULE").unwrap_or(defaults.schedule),
            user_agent: get("SHOW_FINDER_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Browser policy for vendor runs, with this config's page cap and zoom.
    pub fn pagination_policy(&self) -> PaginationPolicy {
        PaginationPolicy {
            page_cap: self.page_cap,
            zoom_out_presses: self.zoom_out_presses,
            ..PaginationPolicy::default()
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("docs"));
        assert_eq!(config.concurrency, 7);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.pagination_policy().page_cap, 10);
        assert_eq!(config.pagination_policy().zoom_out_presses, 0);
        assert_eq!(config.data_file("shows.json"), PathBuf::from("docs/shows.json"));
    }

    #[test]
    fn variables_override_defaults() {
        let config = config(&[
            ("SHOW_FINDER_DATA_DIR", "/srv/data"),
            ("SHOW_FINDER_CONCURRENCY", " 3 "),
            ("SHOW_FINDER_PAGE_CAP", "4"),
            ("SHOW_FINDER_ZOOM_OUT_PRESSES", "11"),
            ("SHOW_FINDER_VENDOR_DOMAIN", ""),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.pagination_policy().page_cap, 4);
        assert_eq!(config.pagination_policy().zoom_out_presses, 11);
        assert_eq!(config.vendor_domain, "concordtheatricals.co.uk");
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let err = config(&[("SHOW_FINDER_MAX_RETRIES", "lots")]).unwrap_err();
        assert!(err.to_string().contains("SHOW_FINDER_MAX_RETRIES"));
    }
}
