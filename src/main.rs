use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use show_finder::traits::BrowserLauncher;
use show_finder::{Config, ShowFinder};

#[derive(Debug, Parser)]
#[command(name = "show-finder")]
#[command(about = "Finds theatre and show listings and exports them to CSV")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect listing structures for every theatre site
    Theatres,
    /// Detect listing structures for every show site, vendor pages included
    Shows,
    /// Scrape every confirmed site and write the CSV exports
    Scrape,
    /// Run a full cycle now, then again on the configured schedule
    Watch,
}

#[cfg(feature = "chromium")]
fn browser(config: &Config) -> Arc<dyn BrowserLauncher> {
    Arc::new(show_finder::vendor::ChromiumLauncher::new(config.user_agent.clone()))
}

#[cfg(not(feature = "chromium"))]
fn browser(_config: &Config) -> Arc<dyn BrowserLauncher> {
    Arc::new(show_finder::vendor::NoBrowser)
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Theatre discovery, show discovery, then a scrape. The pipelines share
/// output files, so they run one after another.
async fn full_cycle(finder: &ShowFinder) -> Result<()> {
    let theatres = finder.process_theatre_sites().await;
    info!(
        "Theatres: {}/{} structures found",
        theatres.successful_scrapes, theatres.total_theatres
    );
    let shows = finder.process_show_sites().await;
    info!(
        "Shows: {}/{} structures found",
        shows.successful_scrapes, shows.total_websites
    );
    let scrape = finder.run_scrape().await?;
    info!("Scrape: {} jobs, exported to {}", scrape.results.len(), scrape.output_files.part2);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let finder = ShowFinder::new(config.clone(), browser(&config))?;

    match cli.command {
        Commands::Theatres => print_report(&finder.process_theatre_sites().await)?,
        Commands::Shows => print_report(&finder.process_show_sites().await)?,
        Commands::Scrape => print_report(&finder.run_scrape().await?)?,
        Commands::Watch => {
            info!("Starting show finder");

            if let Err(e) = full_cycle(&finder).await {
                error!("Error during initial run: {:#}", e);
            }

            let schedule = finder.config().schedule.clone();
            let sched = JobScheduler::new().await?;

            let job_finder = finder.clone();
            sched
                .add(Job::new_async(schedule.as_str(), move |_uuid, _l| {
                    let finder = job_finder.clone();
                    Box::pin(async move {
                        if let Err(e) = full_cycle(&finder).await {
                            error!("Error during scheduled run: {:#}", e);
                        }
                    })
                })?)
                .await?;

            info!("Scheduler started with schedule {}", schedule);
            sched.start().await?;

            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
            }
        }
    }

    Ok(())
}
