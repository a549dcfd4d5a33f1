//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;

use scout_harness::models::{
    ArgumentReport, EvaluationReport, FeedbackEvent, FinalReport, Listing, PreferenceWeights,
    Preferences, Recommendation, SearchSession, SearchStatus,
};
use scout_harness::pipeline::Spawner;
use scout_harness::store::{MemoryStore, SessionStore};
use scout_harness::traits::{Arguer, Compiler, Enrichment, Evaluator, SourceAdapter};

pub fn listing(id: &str, address: &str) -> Listing {
    Listing {
        id: id.to_string(),
        source: String::new(),
        url: format!("https://listings.test/{}", id),
        address: address.to_string(),
        city: "Boise".to_string(),
        state: "ID".to_string(),
        zip_code: "83702".to_string(),
        price: 420_000,
        bedrooms: 3,
        bathrooms: 2.0,
        sqft: 1_700,
        property_type: "house".to_string(),
        description: String::new(),
        images: vec![],
        listing_date: None,
        days_on_market: Some(20),
    }
}

pub fn numbered(n: usize) -> Vec<Listing> {
    (1..=n)
        .map(|i| listing(&format!("L{}", i), &format!("{} Test Street", i)))
        .collect()
}

pub struct StaticSource {
    pub name: String,
    pub listings: Vec<Listing>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(name: &str, listings: Vec<Listing>) -> Self {
        Self {
            name: name.to_string(),
            listings,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _criteria: &Preferences) -> Result<Vec<Listing>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let label = self.source_label();
        Ok(self
            .listings
            .iter()
            .cloned()
            .map(|mut l| {
                l.source = label.clone();
                l
            })
            .collect())
    }
}

pub struct FailingSource;

#[async_trait]
impl SourceAdapter for FailingSource {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _criteria: &Preferences) -> Result<Vec<Listing>> {
        anyhow::bail!("connection refused")
    }
}

/// Evaluator that fails for the listed ids and counts every call.
#[derive(Default)]
pub struct ScriptedEvaluator {
    pub fail_ids: Vec<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, listing: &Listing, _criteria: &Preferences) -> Result<EvaluationReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ids.contains(&listing.id) {
            anyhow::bail!("evaluator timed out for {}", listing.id);
        }
        Ok(EvaluationReport {
            listing_id: listing.id.clone(),
            preference_match_score: 7.0,
            crime_score: Some(6.0),
            school_score: None,
            walkability_score: None,
            affordability_score: None,
            strengths: vec!["Good light".to_string()],
            concerns: vec![],
            additional_notes: None,
        })
    }
}

#[derive(Default)]
pub struct CountingArguer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Arguer for CountingArguer {
    async fn argue(
        &self,
        listing: &Listing,
        _evaluation: &EvaluationReport,
        _criteria: &Preferences,
    ) -> Result<ArgumentReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ArgumentReport {
            listing_id: listing.id.clone(),
            pro_arguments: vec!["Spacious".to_string()],
            con_arguments: vec!["Busy road".to_string()],
        })
    }
}

/// Compiler with a fixed score per listing id (default 5.0); panics on `panic_id`.
#[derive(Default)]
pub struct ScoredCompiler {
    pub scores: HashMap<String, f64>,
    pub panic_id: Option<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Compiler for ScoredCompiler {
    async fn compile(
        &self,
        listing: &Listing,
        evaluation: &EvaluationReport,
        arguments: &ArgumentReport,
        _criteria: &Preferences,
    ) -> Result<FinalReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_id.as_deref() == Some(listing.id.as_str()) {
            panic!("malformed compiler response");
        }
        let final_score = self.scores.get(&listing.id).copied().unwrap_or(5.0);
        Ok(FinalReport {
            listing: listing.clone(),
            evaluation: evaluation.clone(),
            arguments: arguments.clone(),
            final_score,
            executive_summary: format!("{} scores {}", listing.id, final_score),
            recommendation: Recommendation::from_score(final_score),
        })
    }
}

pub struct Stages {
    pub evaluator: Arc<ScriptedEvaluator>,
    pub arguer: Arc<CountingArguer>,
    pub compiler: Arc<ScoredCompiler>,
}

impl Stages {
    pub fn new(evaluator: ScriptedEvaluator, compiler: ScoredCompiler) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            arguer: Arc::new(CountingArguer::default()),
            compiler: Arc::new(compiler),
        }
    }

    pub fn enrichment(&self) -> Enrichment {
        Enrichment {
            evaluator: self.evaluator.clone(),
            arguer: self.arguer.clone(),
            compiler: self.compiler.clone(),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.evaluator.calls.load(Ordering::SeqCst)
            + self.arguer.calls.load(Ordering::SeqCst)
            + self.compiler.calls.load(Ordering::SeqCst)
    }
}

/// Memory store that records every session write.
///
/// Optionally rejects the first write whose message matches `fail_once_on`.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    pub writes: Mutex<Vec<(SearchStatus, f64)>>,
    fail_once_on: Mutex<Option<String>>,
}

impl RecordingStore {
    pub fn failing_once_on(message: &str) -> Self {
        Self {
            fail_once_on: Mutex::new(Some(message.to_string())),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<(SearchStatus, f64)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn get_session(&self, id: &str) -> Result<Option<SearchSession>> {
        self.inner.get_session(id).await
    }

    async fn put_session(&self, session: &SearchSession) -> Result<()> {
        {
            let mut trigger = self.fail_once_on.lock().unwrap();
            if trigger.as_deref() == Some(session.message.as_str()) {
                *trigger = None;
                anyhow::bail!("disk full");
            }
        }
        self.writes
            .lock()
            .unwrap()
            .push((session.status, session.progress));
        self.inner.put_session(session).await
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        self.inner.delete_session(id).await
    }

    async fn upsert_feedback(&self, event: &FeedbackEvent) -> Result<()> {
        self.inner.upsert_feedback(event).await
    }

    async fn list_feedback(&self, session_id: &str) -> Result<Vec<FeedbackEvent>> {
        self.inner.list_feedback(session_id).await
    }

    async fn get_weights(&self, session_id: &str) -> Result<Option<PreferenceWeights>> {
        self.inner.get_weights(session_id).await
    }

    async fn put_weights(&self, weights: &PreferenceWeights) -> Result<()> {
        self.inner.put_weights(weights).await
    }

    async fn mark_seen(&self, session_id: &str, listing_id: &str) -> Result<()> {
        self.inner.mark_seen(session_id, listing_id).await
    }

    async fn seen_ids(&self, session_id: &str) -> Result<Vec<String>> {
        self.inner.seen_ids(session_id).await
    }
}

/// Holds submitted jobs until the test drains them.
#[derive(Default)]
pub struct QueuedSpawner {
    jobs: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl QueuedSpawner {
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub async fn run_all(&self) {
        let jobs: Vec<_> = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job.await;
        }
    }
}

impl Spawner for QueuedSpawner {
    fn spawn(&self, job: BoxFuture<'static, ()>) {
        self.jobs.lock().unwrap().push(job);
    }
}
