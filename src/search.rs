//! Inline search for the `scout search` command.
//!
//! Runs one full pipeline in the foreground against the configured
//! sources and enrichment provider, streaming progress to stderr and
//! printing the final reports to stdout.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::collect::CandidateCollector;
use crate::config::Config;
use crate::models::{FinalReport, SearchSession, SearchStatus};
use crate::pipeline::PipelineCoordinator;
use crate::preferences::{load_preferences, PreferenceBook};
use crate::progress::ProgressMode;
use crate::store::open_store;
use crate::traits::{Enrichment, SourceRegistry};

const CLI_CRITERIA_REF: &str = "cli";

/// Run a search with the preferences in `preferences_path`.
pub async fn run_search(
    config: &Config,
    preferences_path: &Path,
    progress: ProgressMode,
    json: bool,
    limit: Option<usize>,
) -> Result<()> {
    let preferences = load_preferences(preferences_path)?;
    let book = Arc::new(PreferenceBook::new());
    book.insert(CLI_CRITERIA_REF, preferences)?;

    let registry = SourceRegistry::from_config(config)?;
    if registry.is_empty() {
        anyhow::bail!("No sources configured. Add [sources.fixture.<name>] or [sources.http.<name>] to the config.");
    }

    let store = open_store(config).await?;
    let coordinator = PipelineCoordinator::new(
        Arc::clone(&store),
        book,
        CandidateCollector::new(&registry, config.pipeline.max_results_per_source),
        Enrichment::from_config(config)?,
    )
    .with_reporter(Arc::from(progress.reporter()));

    let session = SearchSession::new(CLI_CRITERIA_REF);
    store.put_session(&session).await?;
    let session = coordinator.run(&session.id).await?;

    if session.status == SearchStatus::Error {
        anyhow::bail!("Search failed: {}", session.message);
    }

    let mut reports = session.final_reports;
    if let Some(limit) = limit {
        reports.truncate(limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports, session.listings.len());
    }
    Ok(())
}

fn print_reports(reports: &[FinalReport], found: usize) {
    if reports.is_empty() {
        println!("No results.");
        return;
    }

    println!("{} report(s) from {} listing(s)\n", reports.len(), found);
    for (i, report) in reports.iter().enumerate() {
        let l = &report.listing;
        let recommendation = serde_json::to_value(report.recommendation)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!(
            "{}. [{:.1}] {} ({})",
            i + 1,
            report.final_score,
            l.address,
            recommendation
        );
        println!(
            "    ${}  {} bd / {} ba  {} sqft  {}",
            l.price, l.bedrooms, l.bathrooms, l.sqft, l.property_type
        );
        println!("    source: {}", l.source);
        if !l.url.is_empty() {
            println!("    url: {}", l.url);
        }
        if !report.executive_summary.is_empty() {
            println!("    summary: {}", report.executive_summary);
        }
        println!("    id: {}", l.id);
        println!();
    }
}
