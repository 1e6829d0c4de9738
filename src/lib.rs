pub mod catalog;
pub mod config;
pub mod detector;
pub mod export;
pub mod ledger;
pub mod models;
pub mod scheduler;
pub mod scraper;
pub mod scrapers;
pub mod show_finder;
pub mod store;
pub mod traits;
pub mod vendor;

pub use config::Config;
pub use show_finder::ShowFinder;
