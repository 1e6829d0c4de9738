//! CSV export of scraped shows: a list of production names (Part-1) and a
//! detailed sheet with split dates (Part-2).

pub mod dates;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::models::{ExportSite, OutputFiles};

pub use dates::start_end_date;

const PART1_HEADER: [&str; 1] = ["Show Name"];
const PART2_HEADER: [&str; 5] = ["Show Name", "Theatre Name", "Start Date", "End Date", "Link"];

/// Writes both CSV files into `dir`, creating it if needed, and returns
/// their paths. Files are named after the local time of the call.
pub fn save_to_csv(sites: &[ExportSite], dir: &Path) -> Result<OutputFiles> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S").to_string();
    let part1 = dir.join(format!("{stamp}-Part-1.csv"));
    let part2 = dir.join(format!("{stamp}-Part-2.csv"));

    let mut names = csv::Writer::from_path(&part1)
        .with_context(|| format!("creating {}", part1.display()))?;
    names.write_record(PART1_HEADER)?;
    for show in sites.iter().flat_map(|site| &site.shows) {
        names.write_record([show.title.as_str()])?;
    }
    names.flush()?;

    let mut details = csv::Writer::from_path(&part2)
        .with_context(|| format!("creating {}", part2.display()))?;
    details.write_record(PART2_HEADER)?;
    for site in sites {
        for show in &site.shows {
            let (start, end) = start_end_date(&show.date);
            let theatre = site
                .theatre
                .as_deref()
                .filter(|t| !t.is_empty())
                .or(Some(show.location.as_str()).filter(|l| !l.is_empty()))
                .unwrap_or("Unknown Theatre");
            details.write_record([
                show.title.as_str(),
                theatre,
                start.as_str(),
                end.as_str(),
                show.link.as_str(),
            ])?;
        }
    }
    details.flush()?;

    info!("CSV files written to {}", dir.display());
    Ok(OutputFiles {
        part1: part1.display().to_string(),
        part2: part2.display().to_string(),
    })
}
