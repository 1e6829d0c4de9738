//! Site-specific profiles for the generic scraper

mod bat_out_of_hell;
mod venues;

pub use bat_out_of_hell::BatOutOfHell;
pub use venues::SlugVenue;

use anyhow::Result;

use crate::traits::SiteProfile;

/// Every known site profile, checked in order; the first match applies.
pub fn default_profiles() -> Result<Vec<Box<dyn SiteProfile>>> {
    Ok(vec![
        Box::new(SlugVenue::lw_theatres()?),
        Box::new(SlugVenue::nederlander()?),
        Box::new(SlugVenue::atg()?),
        Box::new(BatOutOfHell::new()?),
    ])
}
