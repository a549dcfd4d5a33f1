//! File-backed listing source.
//!
//! Reads a JSON file of listings (a bare array or `{"listings": [...]}`)
//! on every search and returns those matching the buyer's location,
//! price, bedroom, and property-type constraints. Useful for demos,
//! offline runs, and tests.
//!
//! ```toml
//! [sources.fixture.sample]
//! path = "./fixtures/listings.json"
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::FixtureSourceConfig;
use crate::heuristics::{location_matches, property_type_matches};
use crate::models::{Listing, Preferences};
use crate::remote::ListingsPayload;
use crate::traits::SourceAdapter;

pub struct FixtureSource {
    name: String,
    config: FixtureSourceConfig,
}

impl FixtureSource {
    pub fn new(name: String, config: FixtureSourceConfig) -> Self {
        Self { name, config }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.config.path
    }

    /// Load every listing in the file, unfiltered.
    pub async fn load(&self) -> Result<Vec<Listing>> {
        let raw = tokio::fs::read_to_string(&self.config.path)
            .await
            .with_context(|| format!("Failed to read fixture file: {}", self.config.path.display()))?;
        let payload: ListingsPayload = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid fixture file: {}", self.config.path.display()))?;

        let label = self.source_label();
        let mut listings = payload.into_listings();
        for listing in &mut listings {
            listing.source = label.clone();
        }
        Ok(listings)
    }
}

/// Whether a listing satisfies the hard filters a source applies.
pub fn matches_criteria(listing: &Listing, criteria: &Preferences) -> bool {
    if let Some(location) = criteria.location.as_deref() {
        if !location_matches(listing, location) {
            return false;
        }
    }
    if criteria.price_min.is_some_and(|min| listing.price < min)
        || criteria.price_max.is_some_and(|max| listing.price > max)
    {
        return false;
    }
    if criteria.bedrooms_min.is_some_and(|min| listing.bedrooms < min)
        || criteria.bedrooms_max.is_some_and(|max| listing.bedrooms > max)
    {
        return false;
    }
    property_type_matches(listing, &criteria.property_types)
}

#[async_trait]
impl SourceAdapter for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &str {
        "fixture"
    }

    async fn search(&self, criteria: &Preferences) -> Result<Vec<Listing>> {
        let listings = self.load().await?;
        Ok(listings
            .into_iter()
            .filter(|l| matches_criteria(l, criteria))
            .collect())
    }
}
