//! Candidate collection across all configured listing sources.
//!
//! Every [`SourceAdapter`] is queried concurrently on its own task. A
//! source that errors, panics, or returns a malformed listing contributes
//! nothing and is reported as a non-fatal [`SourceFailure`]. Surviving
//! results are capped per source, concatenated in registration order, and
//! deduplicated by normalized address (first occurrence wins).

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;

use crate::models::{Listing, Preferences};
use crate::traits::{SourceAdapter, SourceRegistry};

/// Default per-source cap applied before merging.
pub const DEFAULT_MAX_RESULTS_PER_SOURCE: usize = 20;

/// A source that contributed nothing to a collection run.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// Outcome of one collection run.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Deduplicated listings in merge order.
    pub listings: Vec<Listing>,
    /// Listings received before deduplication (after per-source caps).
    pub merged_count: usize,
    pub failures: Vec<SourceFailure>,
}

/// Fans a search out to every registered source and merges the results.
#[derive(Clone)]
pub struct CandidateCollector {
    sources: Vec<Arc<dyn SourceAdapter>>,
    max_per_source: usize,
}

impl CandidateCollector {
    pub fn new(registry: &SourceRegistry, max_per_source: usize) -> Self {
        Self {
            sources: registry.sources().to_vec(),
            max_per_source: max_per_source.max(1),
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Query every source concurrently and return the deduplicated merge.
    ///
    /// Never fails because of a source; an empty result is a valid outcome.
    pub async fn collect(&self, criteria: &Preferences) -> Collection {
        let handles = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let criteria = criteria.clone();
            let label = source.source_label();
            let handle = tokio::spawn(async move { source.search(&criteria).await });
            async move { (label, handle.await) }
        });

        let mut merged = Vec::new();
        let mut failures = Vec::new();

        for (label, joined) in join_all(handles).await {
            let outcome = match joined {
                Ok(result) => result.and_then(|mut listings| {
                    listings.truncate(self.max_per_source);
                    check_listings(&label, listings)
                }),
                Err(e) if e.is_panic() => Err(anyhow::anyhow!("source task panicked")),
                Err(e) => Err(anyhow::anyhow!("source task failed: {}", e)),
            };

            match outcome {
                Ok(listings) => {
                    tracing::info!(source = %label, count = listings.len(), "source returned listings");
                    merged.extend(listings);
                }
                Err(e) => {
                    tracing::warn!(source = %label, error = %e, "source failed, treating as empty");
                    failures.push(SourceFailure {
                        source: label,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let merged_count = merged.len();
        let listings = dedup_listings(merged);
        tracing::info!(
            total = merged_count,
            unique = listings.len(),
            failed_sources = failures.len(),
            "candidate collection finished"
        );

        Collection {
            listings,
            merged_count,
            failures,
        }
    }
}

/// A source's capped output is all-or-nothing: one malformed listing rejects the batch.
fn check_listings(label: &str, listings: Vec<Listing>) -> Result<Vec<Listing>> {
    for listing in &listings {
        listing
            .validate()
            .map_err(|e| anyhow::anyhow!("malformed result from {}: {}", label, e))?;
    }
    Ok(listings)
}

/// Drop listings whose normalized address (or id) has already been seen.
///
/// Keeps the first occurrence in input order. Idempotent.
pub fn dedup_listings(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen_addresses = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut unique = Vec::with_capacity(listings.len());

    for listing in listings {
        let key = normalize_address(&listing.address);
        if seen_addresses.contains(&key) || seen_ids.contains(&listing.id) {
            continue;
        }
        seen_addresses.insert(key);
        seen_ids.insert(listing.id.clone());
        unique.push(listing);
    }

    unique
}

/// Canonical form of an address for exact-match deduplication.
///
/// Lower-cases, strips punctuation, collapses whitespace, and shortens the
/// common street types (street, avenue, boulevard, drive, road).
pub fn normalize_address(address: &str) -> String {
    let lowered = address.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    stripped
        .split_whitespace()
        .map(|word| match word {
            "street" => "st",
            "avenue" => "ave",
            "boulevard" => "blvd",
            "drive" => "dr",
            "road" => "rd",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}
