//! Core data models used throughout the search harness.
//!
//! These types represent the listings, enrichment reports, sessions, and
//! feedback records that flow through the collection, enrichment, and
//! re-ranking stages.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Buyer preferences resolved by the conversational collaborator.
///
/// Every field is optional; an absent bound means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub price_min: Option<u64>,
    #[serde(default)]
    pub price_max: Option<u64>,
    #[serde(default)]
    pub bedrooms_min: Option<u32>,
    #[serde(default)]
    pub bedrooms_max: Option<u32>,
    #[serde(default)]
    pub bathrooms_min: Option<f64>,
    #[serde(default)]
    pub bathrooms_max: Option<f64>,
    #[serde(default)]
    pub sqft_min: Option<u64>,
    #[serde(default)]
    pub sqft_max: Option<u64>,
    /// City, zip code, or neighborhood.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub property_types: Vec<String>,
    #[serde(default)]
    pub must_have_features: Vec<String>,
    #[serde(default)]
    pub deal_breakers: Vec<String>,
    #[serde(default)]
    pub lifestyle_priorities: Vec<String>,
}

/// A single property candidate produced by a source adapter.
///
/// Immutable once produced. `id` is unique within a session's result set
/// after deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    /// Source label of the adapter that produced the listing. Adapters
    /// stamp this themselves.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    pub price: u64,
    pub bedrooms: u32,
    /// Half-step granularity (1.0, 1.5, 2.0, ...).
    pub bathrooms: f64,
    pub sqft: u64,
    pub property_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub listing_date: Option<String>,
    #[serde(default)]
    pub days_on_market: Option<u32>,
}

impl Listing {
    /// Check the structural invariants a source adapter must honor.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("listing id must not be empty");
        }
        if self.address.trim().is_empty() {
            bail!("listing {} has an empty address", self.id);
        }
        if !self.bathrooms.is_finite() || self.bathrooms < 0.0 {
            bail!("listing {} has invalid bathrooms: {}", self.id, self.bathrooms);
        }
        if (self.bathrooms * 2.0).fract() != 0.0 {
            bail!(
                "listing {} bathrooms must be a half-step value, got {}",
                self.id,
                self.bathrooms
            );
        }
        Ok(())
    }
}

/// Preference-fit evaluation of one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Stamped by the caller; collaborators may omit it.
    #[serde(default)]
    pub listing_id: String,
    pub preference_match_score: f64,
    #[serde(default)]
    pub crime_score: Option<f64>,
    #[serde(default)]
    pub school_score: Option<f64>,
    #[serde(default)]
    pub walkability_score: Option<f64>,
    #[serde(default)]
    pub affordability_score: Option<f64>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl EvaluationReport {
    /// The four auxiliary scores in schema order.
    pub fn auxiliary_scores(&self) -> [Option<f64>; 4] {
        [
            self.crime_score,
            self.school_score,
            self.walkability_score,
            self.affordability_score,
        ]
    }

    /// Every present score must lie in `[0, 10]`.
    pub fn validate(&self) -> Result<()> {
        check_score("preference_match_score", self.preference_match_score)?;
        let names = ["crime_score", "school_score", "walkability_score", "affordability_score"];
        for (name, score) in names.iter().zip(self.auxiliary_scores()) {
            if let Some(s) = score {
                check_score(name, s)?;
            }
        }
        Ok(())
    }
}

fn check_score(name: &str, value: f64) -> Result<()> {
    if !(0.0..=10.0).contains(&value) {
        bail!("{} must be in [0, 10], got {}", name, value);
    }
    Ok(())
}

/// Pro/con arguments for one listing. Cardinality is expected to be 3–5
/// each but any length is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentReport {
    #[serde(default)]
    pub listing_id: String,
    #[serde(default)]
    pub pro_arguments: Vec<String>,
    #[serde(default)]
    pub con_arguments: Vec<String>,
}

/// Categorical verdict attached to a [`FinalReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    Consider,
    Pass,
}

impl Recommendation {
    /// Map a final score onto the verdict thresholds (8 and 5).
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Recommendation::StrongBuy
        } else if score >= 5.0 {
            Recommendation::Consider
        } else {
            Recommendation::Pass
        }
    }
}

/// Terminal artifact of the pipeline for one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub listing: Listing,
    pub evaluation: EvaluationReport,
    pub arguments: ArgumentReport,
    pub final_score: f64,
    pub executive_summary: String,
    pub recommendation: Recommendation,
}

impl FinalReport {
    /// Score in range and every part refers to the same listing.
    pub fn validate(&self) -> Result<()> {
        check_score("final_score", self.final_score)?;
        let id = &self.listing.id;
        if self.evaluation.listing_id != *id || self.arguments.listing_id != *id {
            bail!(
                "report for {} mixes in evaluation {} and arguments {}",
                id,
                self.evaluation.listing_id,
                self.arguments.listing_id
            );
        }
        Ok(())
    }
}

/// A listing paired with its evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedListing {
    pub listing: Listing,
    pub evaluation: EvaluationReport,
}

/// A listing paired with its evaluation and arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArguedListing {
    pub listing: Listing,
    pub evaluation: EvaluationReport,
    pub arguments: ArgumentReport,
}

/// Lifecycle of a [`SearchSession`].
///
/// Transitions move forward only (`Pending → Scraping → Evaluating →
/// Complete`); `Error` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Pending,
    Scraping,
    Evaluating,
    Complete,
    Error,
}

impl SearchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SearchStatus::Complete | SearchStatus::Error)
    }

    /// Whether moving from `self` to `next` respects the forward-only rule.
    pub fn can_transition_to(self, next: SearchStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == SearchStatus::Error || next >= self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchStatus::Pending => "pending",
            SearchStatus::Scraping => "scraping",
            SearchStatus::Evaluating => "evaluating",
            SearchStatus::Complete => "complete",
            SearchStatus::Error => "error",
        }
    }
}

/// The unit of orchestration for one search request.
///
/// Written only by the pipeline coordinator for that session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSession {
    pub id: String,
    /// Reference to the conversation whose resolved preferences drive this search.
    pub criteria_ref: String,
    pub status: SearchStatus,
    /// Percent complete in `[0, 100]`.
    pub progress: f64,
    pub message: String,
    pub listings: Vec<Listing>,
    pub evaluated: Vec<EvaluatedListing>,
    pub argued: Vec<ArguedListing>,
    pub final_reports: Vec<FinalReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchSession {
    pub fn new(criteria_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            criteria_ref: criteria_ref.into(),
            status: SearchStatus::Pending,
            progress: 0.0,
            message: "Initializing search...".to_string(),
            listings: Vec::new(),
            evaluated: Vec::new(),
            argued: Vec::new(),
            final_reports: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Project the caller-visible status view.
    pub fn status_view(&self) -> StatusView {
        StatusView {
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            listings_found: self.listings.len(),
            listings_evaluated: self.evaluated.len(),
        }
    }

    /// Look up a final report by listing id.
    pub fn find_report(&self, listing_id: &str) -> Option<&FinalReport> {
        self.final_reports.iter().find(|r| r.listing.id == listing_id)
    }
}

/// Read-only projection of a [`SearchSession`] for polling callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: SearchStatus,
    pub progress: f64,
    pub message: String,
    pub listings_found: usize,
    pub listings_evaluated: usize,
}

/// Like/dislike signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Like,
    Dislike,
}

impl FeedbackAction {
    /// Training label: `+1` for like, `-1` for dislike.
    pub fn label(self) -> f64 {
        match self {
            FeedbackAction::Like => 1.0,
            FeedbackAction::Dislike => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackAction::Like => "like",
            FeedbackAction::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "like" => Ok(FeedbackAction::Like),
            "dislike" => Ok(FeedbackAction::Dislike),
            other => bail!("invalid feedback action: '{}'. Use like or dislike.", other),
        }
    }
}

/// Feature name → value, in the fixed learner schema.
pub type FeatureVector = BTreeMap<String, f64>;

/// One recorded swipe. Identity is `(session_id, listing_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub session_id: String,
    pub listing_id: String,
    pub action: FeedbackAction,
    pub features: FeatureVector,
    pub recorded_at: DateTime<Utc>,
}

/// Learned per-session feature weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceWeights {
    pub session_id: String,
    pub weights: BTreeMap<String, f64>,
    pub sample_size: usize,
}
