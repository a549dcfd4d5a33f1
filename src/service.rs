//! Caller-facing search surface.
//!
//! [`SearchService`] wires the store, preference book, pipeline
//! coordinator, and feedback learner together and exposes the operations
//! a client drives a search with. Transport-agnostic: the HTTP server and
//! the tests call it directly.
//!
//! All operations reject unknown session ids with [`ServiceError::NotFound`]
//! and reject result and ranking queries on sessions that have not reached
//! `complete` with [`ServiceError::NotReady`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collect::CandidateCollector;
use crate::config::Config;
use crate::learner::{FeedbackLearner, FeedbackRecord, LearningInsights};
use crate::models::{
    EvaluatedListing, FeedbackAction, FinalReport, Listing, Preferences, SearchSession,
    SearchStatus, StatusView,
};
use crate::pipeline::{PipelineCoordinator, Spawner, TokioSpawner};
use crate::preferences::PreferenceBook;
use crate::store::{open_store, SessionStore};
use crate::traits::{Enrichment, SourceRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NotReady(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedSearch {
    pub search_session_id: String,
    pub status: SearchStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub listing_id: String,
    pub action: FeedbackAction,
}

#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn SessionStore>,
    preferences: Arc<PreferenceBook>,
    coordinator: PipelineCoordinator,
    learner: FeedbackLearner,
    spawner: Arc<dyn Spawner>,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        preferences: Arc<PreferenceBook>,
        collector: CandidateCollector,
        enrichment: Enrichment,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        let coordinator = PipelineCoordinator::new(
            Arc::clone(&store),
            preferences.clone(),
            collector,
            enrichment,
        );
        Self {
            learner: FeedbackLearner::new(Arc::clone(&store)),
            store,
            preferences,
            coordinator,
            spawner,
        }
    }

    /// Build the service described by `config`, running pipelines on tokio.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = open_store(config).await?;
        let registry = SourceRegistry::from_config(config)?;
        let collector = CandidateCollector::new(&registry, config.pipeline.max_results_per_source);
        let enrichment = Enrichment::from_config(config)?;
        Ok(Self::new(
            store,
            Arc::new(PreferenceBook::new()),
            collector,
            enrichment,
            Arc::new(TokioSpawner),
        ))
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn put_preferences(&self, criteria_ref: &str, preferences: Preferences) -> ServiceResult<()> {
        if criteria_ref.trim().is_empty() {
            return Err(ServiceError::BadRequest("criteria_ref must not be empty".into()));
        }
        self.preferences.insert(criteria_ref, preferences)?;
        Ok(())
    }

    pub fn get_preferences(&self, criteria_ref: &str) -> ServiceResult<Preferences> {
        self.preferences
            .get(criteria_ref)?
            .ok_or_else(|| ServiceError::NotFound(format!("No preferences for '{}'", criteria_ref)))
    }

    /// Create a `pending` session and submit its pipeline in the background.
    pub async fn start_search(&self, criteria_ref: &str) -> ServiceResult<StartedSearch> {
        if criteria_ref.trim().is_empty() {
            return Err(ServiceError::BadRequest("criteria_ref must not be empty".into()));
        }
        let session = SearchSession::new(criteria_ref);
        self.store.put_session(&session).await?;
        tracing::info!(session_id = %session.id, criteria_ref, "search started");

        self.coordinator
            .submit(self.spawner.as_ref(), session.id.clone());

        Ok(StartedSearch {
            search_session_id: session.id,
            status: session.status,
        })
    }

    pub async fn status(&self, session_id: &str) -> ServiceResult<StatusView> {
        Ok(self.session(session_id).await?.status_view())
    }

    /// Deduplicated listings as collected.
    pub async fn results(&self, session_id: &str) -> ServiceResult<Vec<Listing>> {
        Ok(self.completed(session_id).await?.listings)
    }

    pub async fn evaluated_results(&self, session_id: &str) -> ServiceResult<Vec<EvaluatedListing>> {
        Ok(self.completed(session_id).await?.evaluated)
    }

    /// Final reports in compiled-score order.
    pub async fn final_results(&self, session_id: &str) -> ServiceResult<Vec<FinalReport>> {
        Ok(self.completed(session_id).await?.final_reports)
    }

    /// Record a swipe, mark the listing seen, and return updated insights.
    pub async fn submit_feedback(&self, request: &FeedbackRequest) -> ServiceResult<LearningInsights> {
        let session = self.completed(&request.session_id).await?;
        let report = session.find_report(&request.listing_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Listing {} not found in session {}",
                request.listing_id, request.session_id
            ))
        })?;

        self.learner
            .record_feedback(
                &request.session_id,
                &request.listing_id,
                request.action,
                &report.listing,
                report,
            )
            .await?;
        self.store
            .mark_seen(&request.session_id, &request.listing_id)
            .await?;

        Ok(self.learner.learning_insights(&request.session_id).await?)
    }

    /// Best unseen report, or `None` once everything has been seen.
    pub async fn next(&self, session_id: &str) -> ServiceResult<Option<FinalReport>> {
        let session = self.completed(session_id).await?;
        let seen = self.store.seen_ids(session_id).await?;
        Ok(self
            .learner
            .next_listing(session_id, session.final_reports, &seen)
            .await?)
    }

    pub async fn insights(&self, session_id: &str) -> ServiceResult<LearningInsights> {
        self.session(session_id).await?;
        Ok(self.learner.learning_insights(session_id).await?)
    }

    pub async fn feedback_history(&self, session_id: &str) -> ServiceResult<Vec<FeedbackRecord>> {
        self.session(session_id).await?;
        Ok(self.learner.feedback_history(session_id).await?)
    }

    pub async fn ranked_results(&self, session_id: &str) -> ServiceResult<Vec<FinalReport>> {
        let session = self.completed(session_id).await?;
        Ok(self
            .learner
            .ranked_listings(session_id, session.final_reports)
            .await?)
    }

    async fn session(&self, session_id: &str) -> ServiceResult<SearchSession> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Search session not found: {}", session_id)))
    }

    async fn completed(&self, session_id: &str) -> ServiceResult<SearchSession> {
        let session = self.session(session_id).await?;
        if session.status != SearchStatus::Complete {
            return Err(ServiceError::NotReady(format!(
                "Search {} is not complete yet (status: {})",
                session_id,
                session.status.as_str()
            )));
        }
        Ok(session)
    }
}
