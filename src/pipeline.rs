//! Pipeline coordinator: drives one search session from `pending` to
//! `complete` (or `error`).
//!
//! ```text
//! resolve preferences ─► collect ─► evaluate ─► argue ─► compile ─► sort
//!        │ (none)         20%      50→70%     70→85%    85→95%     100%
//!        ▼
//!      error
//! ```
//!
//! Each enrichment stage walks its inputs sequentially in arrival order.
//! A failing (or panicking) item becomes an [`ItemOutcome::Failed`] and is
//! dropped; it never aborts the session. Anything else that goes wrong
//! moves the session to `error` with whatever collections were already
//! committed left intact.
//!
//! The coordinator is the only writer of a session's pipeline fields and
//! persists the session after every milestone so pollers can follow along.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::collect::CandidateCollector;
use crate::models::{
    ArguedListing, EvaluatedListing, FinalReport, Listing, SearchSession, SearchStatus,
};
use crate::progress::{
    NoProgress, ProgressEvent, ProgressReporter, Stage, COMPLETE_PROGRESS, SCRAPING_PROGRESS,
};
use crate::store::SessionStore;
use crate::traits::{Enrichment, PreferenceResolver};

/// Result of one item passing through one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    Ok(T),
    Failed(String),
}

impl<T> ItemOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ItemOutcome::Ok(v) => Some(v),
            ItemOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed(_))
    }
}

/// Run one item's future, turning errors and panics into `Failed`.
pub async fn isolate<T, Fut>(fut: Fut) -> ItemOutcome<T>
where
    Fut: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => ItemOutcome::Ok(value),
        Ok(Err(e)) => ItemOutcome::Failed(format!("{:#}", e)),
        Err(payload) => ItemOutcome::Failed(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Anything that flows through an enrichment stage carries its listing.
pub trait StageItem {
    fn listing(&self) -> &Listing;
}

impl StageItem for Listing {
    fn listing(&self) -> &Listing {
        self
    }
}

impl StageItem for EvaluatedListing {
    fn listing(&self) -> &Listing {
        &self.listing
    }
}

impl StageItem for ArguedListing {
    fn listing(&self) -> &Listing {
        &self.listing
    }
}

/// Fire-and-forget job submission.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: BoxFuture<'static, ()>);
}

/// Runs each job as a detached tokio task.
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, job: BoxFuture<'static, ()>) {
        tokio::spawn(job);
    }
}

#[derive(Clone)]
pub struct PipelineCoordinator {
    store: Arc<dyn SessionStore>,
    resolver: Arc<dyn PreferenceResolver>,
    collector: CandidateCollector,
    enrichment: Enrichment,
    reporter: Arc<dyn ProgressReporter>,
}

impl PipelineCoordinator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        resolver: Arc<dyn PreferenceResolver>,
        collector: CandidateCollector,
        enrichment: Enrichment,
    ) -> Self {
        Self {
            store,
            resolver,
            collector,
            enrichment,
            reporter: Arc::new(NoProgress),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Submit a background run for `session_id` and return immediately.
    pub fn submit(&self, spawner: &dyn Spawner, session_id: String) {
        let this = self.clone();
        spawner.spawn(Box::pin(async move {
            if let Err(e) = this.run(&session_id).await {
                tracing::error!(session_id = %session_id, error = %e, "search pipeline could not record its outcome");
            }
        }));
    }

    /// Run the whole pipeline for a `pending` session.
    ///
    /// Pipeline failures land in the session as `error`; the returned
    /// `Err` is reserved for sessions that cannot be loaded or written.
    pub async fn run(&self, session_id: &str) -> Result<SearchSession> {
        let mut session = self
            .store
            .get_session(session_id)
            .await?
            .with_context(|| format!("search session not found: {}", session_id))?;

        if session.status != SearchStatus::Pending {
            bail!(
                "search session {} already {}",
                session_id,
                session.status.as_str()
            );
        }

        if let Err(e) = self.execute(&mut session).await {
            let message = format!("{:#}", e);
            tracing::error!(session_id, error = %message, "search pipeline failed");
            self.fail(&mut session, message).await?;
        }

        Ok(session)
    }

    async fn execute(&self, session: &mut SearchSession) -> Result<()> {
        let criteria = match self.resolver.resolve(&session.criteria_ref).await? {
            Some(criteria) => criteria,
            None => bail!("No preferences found for '{}'", session.criteria_ref),
        };

        self.advance(
            session,
            SearchStatus::Scraping,
            SCRAPING_PROGRESS,
            "Searching listing sources...",
            None,
        )
        .await?;

        let collection = self.collector.collect(&criteria).await;
        session.listings = collection.listings;
        let found = session.listings.len();
        tracing::info!(session_id = %session.id, listings = found, "scraping finished");
        self.advance(
            session,
            SearchStatus::Scraping,
            SCRAPING_PROGRESS,
            &format!("Found {} listings", found),
            None,
        )
        .await?;

        // Evaluate
        let evaluator = Arc::clone(&self.enrichment.evaluator);
        let stage_criteria = criteria.clone();
        let listings = session.listings.clone();
        let evaluated = self
            .run_stage(session, Stage::Evaluate, listings, |listing: Listing| {
                let evaluator = Arc::clone(&evaluator);
                let criteria = stage_criteria.clone();
                async move {
                    let mut evaluation = evaluator.evaluate(&listing, &criteria).await?;
                    evaluation.listing_id = listing.id.clone();
                    evaluation.validate()?;
                    Ok(EvaluatedListing { listing, evaluation })
                }
            })
            .await?;
        session.evaluated = evaluated;
        self.save(session).await?;

        // Argue
        let arguer = Arc::clone(&self.enrichment.arguer);
        let stage_criteria = criteria.clone();
        let evaluated = session.evaluated.clone();
        let argued = self
            .run_stage(session, Stage::Argue, evaluated, |item: EvaluatedListing| {
                let arguer = Arc::clone(&arguer);
                let criteria = stage_criteria.clone();
                async move {
                    let mut arguments = arguer
                        .argue(&item.listing, &item.evaluation, &criteria)
                        .await?;
                    arguments.listing_id = item.listing.id.clone();
                    Ok(ArguedListing {
                        listing: item.listing,
                        evaluation: item.evaluation,
                        arguments,
                    })
                }
            })
            .await?;
        session.argued = argued;
        self.save(session).await?;

        // Compile
        let compiler = Arc::clone(&self.enrichment.compiler);
        let stage_criteria = criteria.clone();
        let argued = session.argued.clone();
        let mut reports: Vec<FinalReport> = self
            .run_stage(session, Stage::Compile, argued, |item: ArguedListing| {
                let compiler = Arc::clone(&compiler);
                let criteria = stage_criteria.clone();
                async move {
                    let mut report = compiler
                        .compile(&item.listing, &item.evaluation, &item.arguments, &criteria)
                        .await?;
                    // The compiler only contributes the verdict.
                    report.listing = item.listing;
                    report.evaluation = item.evaluation;
                    report.arguments = item.arguments;
                    report.validate()?;
                    Ok(report)
                }
            })
            .await?;

        reports.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        session.final_reports = reports;

        self.advance(
            session,
            SearchStatus::Complete,
            COMPLETE_PROGRESS,
            "Analysis complete",
            None,
        )
        .await?;
        tracing::info!(
            session_id = %session.id,
            reports = session.final_reports.len(),
            "search pipeline complete"
        );
        Ok(())
    }

    /// Feed `items` through `f` one at a time, keeping the successes.
    async fn run_stage<I, O, F, Fut>(
        &self,
        session: &mut SearchSession,
        stage: Stage,
        items: Vec<I>,
        mut f: F,
    ) -> Result<Vec<O>>
    where
        I: StageItem,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        let total = items.len();
        self.advance(
            session,
            SearchStatus::Evaluating,
            stage.range().0,
            stage.message(),
            Some((0, total)),
        )
        .await?;

        let mut kept = Vec::with_capacity(total);
        let mut failed = 0usize;

        for (i, item) in items.into_iter().enumerate() {
            let listing_id = item.listing().id.clone();
            match isolate(f(item)).await {
                ItemOutcome::Ok(value) => kept.push(value),
                ItemOutcome::Failed(reason) => {
                    failed += 1;
                    tracing::warn!(
                        session_id = %session.id,
                        stage = stage.as_str(),
                        listing_id = %listing_id,
                        reason = %reason,
                        "item dropped"
                    );
                }
            }

            self.advance(
                session,
                SearchStatus::Evaluating,
                stage.progress(i + 1, total),
                stage.message(),
                Some((i + 1, total)),
            )
            .await?;
        }

        tracing::info!(
            session_id = %session.id,
            stage = stage.as_str(),
            kept = kept.len(),
            failed,
            "stage finished"
        );
        Ok(kept)
    }

    /// Move the session forward and persist it. Progress never decreases.
    async fn advance(
        &self,
        session: &mut SearchSession,
        status: SearchStatus,
        progress: f64,
        message: &str,
        items: Option<(usize, usize)>,
    ) -> Result<()> {
        if session.status != status && !session.status.can_transition_to(status) {
            bail!(
                "invalid status transition {} -> {}",
                session.status.as_str(),
                status.as_str()
            );
        }
        if session.status != status {
            tracing::info!(
                session_id = %session.id,
                from = session.status.as_str(),
                to = status.as_str(),
                "status transition"
            );
        }
        session.status = status;
        session.progress = session.progress.max(progress.clamp(0.0, COMPLETE_PROGRESS));
        session.message = message.to_string();
        self.save(session).await?;

        self.reporter.report(&ProgressEvent {
            session_id: session.id.clone(),
            status: session.status,
            progress: session.progress,
            message: session.message.clone(),
            items,
        });
        Ok(())
    }

    async fn fail(&self, session: &mut SearchSession, message: String) -> Result<()> {
        if session.status.is_terminal() {
            return Ok(());
        }
        session.status = SearchStatus::Error;
        session.message = message;
        self.save(session).await?;
        self.reporter.report(&ProgressEvent {
            session_id: session.id.clone(),
            status: session.status,
            progress: session.progress,
            message: session.message.clone(),
            items: None,
        });
        Ok(())
    }

    async fn save(&self, session: &mut SearchSession) -> Result<()> {
        session.updated_at = Utc::now();
        self.store.put_session(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn isolate_captures_errors_and_panics() {
        let ok: ItemOutcome<u32> = isolate(async { Ok(7) }).await;
        assert_eq!(ok, ItemOutcome::Ok(7));

        let err: ItemOutcome<u32> = isolate(async { anyhow::bail!("evaluator timed out") }).await;
        assert_eq!(err, ItemOutcome::Failed("evaluator timed out".to_string()));

        let boom: ItemOutcome<u32> = isolate(async {
            if true {
                panic!("bad json");
            }
            Ok(1)
        })
        .await;
        assert!(boom.is_failed());
        assert!(matches!(boom, ItemOutcome::Failed(ref m) if m.contains("bad json")));
    }

    #[test]
    fn item_outcome_ok_extracts_value() {
        assert_eq!(ItemOutcome::Ok(3).ok(), Some(3));
        assert_eq!(ItemOutcome::<i32>::Failed("x".into()).ok(), None);
    }
}
