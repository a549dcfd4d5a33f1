//! Feedback learner: turns like/dislike swipes into per-session feature
//! weights and re-ranks final reports with them.
//!
//! Weights are the Pearson correlation between each feature and the swipe
//! label (+1 like, -1 dislike), recomputed in full from the session's
//! feedback history on every swipe. With fewer than two swipes there are
//! no weights and ranking falls back to `final_score`.
//!
//! The personalized score blends the compiled score with a bounded
//! learned adjustment centered on 5:
//!
//! ```text
//! score = clamp(0.7 * final_score + 0.3 * clamp(5 + Σ w[f]·v[f], 0, 10), 0, 10)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::models::{
    FeatureVector, FeedbackAction, FeedbackEvent, FinalReport, Listing, PreferenceWeights,
};
use crate::store::SessionStore;

/// The fixed feature schema, in extraction order.
pub const FEATURE_NAMES: [&str; 17] = [
    "price",
    "bedrooms",
    "bathrooms",
    "sqft",
    "days_on_market",
    "preference_match",
    "crime_score",
    "school_score",
    "walkability_score",
    "affordability_score",
    "final_score",
    "pro_count",
    "con_count",
    "argument_balance",
    "is_house",
    "is_condo",
    "is_townhouse",
];

/// Minimum swipes before any weights are learned.
pub const MIN_EVENTS_FOR_WEIGHTS: usize = 2;

const BASE_WEIGHT: f64 = 0.7;
const LEARNED_WEIGHT: f64 = 0.3;
const NEUTRAL_SCORE: f64 = 5.0;
const DEFAULT_DAYS_ON_MARKET: u32 = 30;
const TOP_FEATURES: usize = 5;

/// Derive the fixed-schema feature vector for a listing and its report.
pub fn extract_features(listing: &Listing, report: &FinalReport) -> FeatureVector {
    let eval = &report.evaluation;
    let pros = report.arguments.pro_arguments.len() as f64;
    let cons = report.arguments.con_arguments.len() as f64;
    let kind = listing.property_type.to_lowercase();
    let indicator = |t: &str| if kind == t { 1.0 } else { 0.0 };

    let values = [
        listing.price as f64 / 1_000_000.0,
        listing.bedrooms as f64,
        listing.bathrooms,
        listing.sqft as f64 / 1000.0,
        listing.days_on_market.unwrap_or(DEFAULT_DAYS_ON_MARKET) as f64 / 100.0,
        eval.preference_match_score,
        eval.crime_score.unwrap_or(NEUTRAL_SCORE),
        eval.school_score.unwrap_or(NEUTRAL_SCORE),
        eval.walkability_score.unwrap_or(NEUTRAL_SCORE),
        eval.affordability_score.unwrap_or(NEUTRAL_SCORE),
        report.final_score,
        pros,
        cons,
        pros - cons,
        indicator("house"),
        indicator("condo"),
        indicator("townhouse"),
    ];

    FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Pearson correlation coefficient. Degenerate input yields 0.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

/// Correlate every schema feature with the swipe labels.
///
/// Returns `None` below [`MIN_EVENTS_FOR_WEIGHTS`].
pub fn compute_weights(events: &[FeedbackEvent]) -> Option<BTreeMap<String, f64>> {
    if events.len() < MIN_EVENTS_FOR_WEIGHTS {
        return None;
    }
    let labels: Vec<f64> = events.iter().map(|e| e.action.label()).collect();

    let weights = FEATURE_NAMES
        .iter()
        .map(|name| {
            let values: Vec<f64> = events
                .iter()
                .map(|e| e.features.get(*name).copied().unwrap_or(0.0))
                .collect();
            (name.to_string(), pearson(&values, &labels))
        })
        .collect();

    Some(weights)
}

/// Blend the compiled score with the learned adjustment. Always in `[0, 10]`.
pub fn personalized_score(features: &FeatureVector, weights: &BTreeMap<String, f64>) -> f64 {
    let base = features.get("final_score").copied().unwrap_or(NEUTRAL_SCORE);
    let mut sum: f64 = features
        .iter()
        .filter_map(|(name, value)| weights.get(name).map(|w| w * value))
        .sum();
    if !sum.is_finite() {
        sum = 0.0;
    }
    let learned = (NEUTRAL_SCORE + sum).clamp(0.0, 10.0);
    let score = BASE_WEIGHT * base + LEARNED_WEIGHT * learned;
    if score.is_finite() {
        score.clamp(0.0, 10.0)
    } else {
        NEUTRAL_SCORE
    }
}

/// Order reports best first. Stable on ties.
///
/// Without weights this is a plain `final_score` sort.
pub fn rank(reports: Vec<FinalReport>, weights: Option<&BTreeMap<String, f64>>) -> Vec<FinalReport> {
    match weights {
        None => {
            let mut reports = reports;
            reports.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
            reports
        }
        Some(weights) => {
            let mut scored: Vec<(f64, FinalReport)> = reports
                .into_iter()
                .map(|r| (personalized_score(&extract_features(&r.listing, &r), weights), r))
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored.into_iter().map(|(_, r)| r).collect()
        }
    }
}

/// A feature with its learned direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedFeature {
    pub feature: String,
    pub weight: f64,
    pub preference: String,
}

/// Summary of what the learner has picked up for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningInsights {
    pub total_swipes: usize,
    pub likes: usize,
    pub dislikes: usize,
    pub like_rate: f64,
    /// Up to five strongest non-zero weights, strongest first.
    pub top_weighted_features: Vec<WeightedFeature>,
    pub weights: BTreeMap<String, f64>,
}

/// One swipe as shown in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub listing_id: String,
    pub action: FeedbackAction,
    pub price: f64,
    pub bedrooms: f64,
    pub final_score: f64,
    pub features: FeatureVector,
}

/// Session-scoped learner backed by a [`SessionStore`].
///
/// Sole writer of a session's feedback and weight key spaces.
#[derive(Clone)]
pub struct FeedbackLearner {
    store: Arc<dyn SessionStore>,
}

impl FeedbackLearner {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Upsert the swipe for `(session_id, listing_id)` and recompute weights.
    ///
    /// Returns the session's weights after recomputation, if any.
    pub async fn record_feedback(
        &self,
        session_id: &str,
        listing_id: &str,
        action: FeedbackAction,
        listing: &Listing,
        report: &FinalReport,
    ) -> Result<Option<PreferenceWeights>> {
        let event = FeedbackEvent {
            session_id: session_id.to_string(),
            listing_id: listing_id.to_string(),
            action,
            features: extract_features(listing, report),
            recorded_at: Utc::now(),
        };
        self.store.upsert_feedback(&event).await?;

        let events = self.store.list_feedback(session_id).await?;
        let weights = match compute_weights(&events) {
            Some(weights) => {
                let weights = PreferenceWeights {
                    session_id: session_id.to_string(),
                    weights,
                    sample_size: events.len(),
                };
                self.store.put_weights(&weights).await?;
                tracing::debug!(session_id, sample_size = events.len(), "preference weights updated");
                Some(weights)
            }
            None => None,
        };

        tracing::info!(session_id, listing_id, action = action.as_str(), "feedback recorded");
        Ok(weights)
    }

    /// Reports ordered by personalized score, or by `final_score` when the
    /// session has no weights yet.
    pub async fn ranked_listings(
        &self,
        session_id: &str,
        reports: Vec<FinalReport>,
    ) -> Result<Vec<FinalReport>> {
        let weights = self.store.get_weights(session_id).await?;
        Ok(rank(reports, weights.as_ref().map(|w| &w.weights)))
    }

    /// Best-ranked report whose listing id is not in `seen_ids`.
    pub async fn next_listing(
        &self,
        session_id: &str,
        reports: Vec<FinalReport>,
        seen_ids: &[String],
    ) -> Result<Option<FinalReport>> {
        let unseen: Vec<FinalReport> = reports
            .into_iter()
            .filter(|r| !seen_ids.iter().any(|id| *id == r.listing.id))
            .collect();
        if unseen.is_empty() {
            return Ok(None);
        }
        Ok(self.ranked_listings(session_id, unseen).await?.into_iter().next())
    }

    pub async fn learning_insights(&self, session_id: &str) -> Result<LearningInsights> {
        let events = self.store.list_feedback(session_id).await?;
        let likes = events
            .iter()
            .filter(|e| e.action == FeedbackAction::Like)
            .count();
        let total = events.len();
        let dislikes = total - likes;

        let weights = self
            .store
            .get_weights(session_id)
            .await?
            .map(|w| w.weights)
            .unwrap_or_default();

        let mut strongest: Vec<(&String, f64)> = weights
            .iter()
            .filter(|(_, w)| **w != 0.0)
            .map(|(name, w)| (name, *w))
            .collect();
        strongest.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

        let top_weighted_features = strongest
            .into_iter()
            .take(TOP_FEATURES)
            .map(|(name, weight)| WeightedFeature {
                feature: name.clone(),
                weight,
                preference: format!(
                    "Prefers {} {}",
                    if weight > 0.0 { "higher" } else { "lower" },
                    name
                ),
            })
            .collect();

        Ok(LearningInsights {
            total_swipes: total,
            likes,
            dislikes,
            like_rate: if total > 0 {
                likes as f64 / total as f64
            } else {
                0.0
            },
            top_weighted_features,
            weights,
        })
    }

    /// Every recorded swipe for the session, in first-recorded order.
    pub async fn feedback_history(&self, session_id: &str) -> Result<Vec<FeedbackRecord>> {
        let events = self.store.list_feedback(session_id).await?;
        Ok(events
            .into_iter()
            .map(|e| {
                let get = |name: &str| e.features.get(name).copied().unwrap_or(0.0);
                FeedbackRecord {
                    listing_id: e.listing_id.clone(),
                    action: e.action,
                    price: get("price"),
                    bedrooms: get("bedrooms"),
                    final_score: get("final_score"),
                    features: e.features.clone(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArgumentReport, EvaluationReport, Recommendation};
    use crate::store::MemoryStore;

    fn report(id: &str, price: u64, bedrooms: u32, final_score: f64) -> FinalReport {
        FinalReport {
            listing: Listing {
                id: id.to_string(),
                source: "fixture:test".to_string(),
                url: String::new(),
                address: format!("{} Test St", id),
                city: String::new(),
                state: String::new(),
                zip_code: String::new(),
                price,
                bedrooms,
                bathrooms: 2.0,
                sqft: 1500,
                property_type: "House".to_string(),
                description: String::new(),
                images: vec![],
                listing_date: None,
                days_on_market: None,
            },
            evaluation: EvaluationReport {
                listing_id: id.to_string(),
                preference_match_score: 7.0,
                crime_score: None,
                school_score: Some(8.0),
                walkability_score: None,
                affordability_score: None,
                strengths: vec![],
                concerns: vec![],
                additional_notes: None,
            },
            arguments: ArgumentReport {
                listing_id: id.to_string(),
                pro_arguments: vec!["a".into(), "b".into(), "c".into()],
                con_arguments: vec!["x".into()],
            },
            final_score,
            executive_summary: String::new(),
            recommendation: Recommendation::from_score(final_score),
        }
    }

    fn learner() -> FeedbackLearner {
        FeedbackLearner::new(Arc::new(MemoryStore::new()))
    }

    async fn swipe(l: &FeedbackLearner, session: &str, r: &FinalReport, action: FeedbackAction) {
        l.record_feedback(session, &r.listing.id, action, &r.listing, r)
            .await
            .unwrap();
    }

    fn ids(reports: &[FinalReport]) -> Vec<&str> {
        reports.iter().map(|r| r.listing.id.as_str()).collect()
    }

    #[test]
    fn features_follow_fixed_schema_with_defaults() {
        let r = report("a", 450_000, 3, 7.5);
        let f = extract_features(&r.listing, &r);
        assert_eq!(f.len(), FEATURE_NAMES.len());
        assert_eq!(f["price"], 0.45);
        assert_eq!(f["sqft"], 1.5);
        assert_eq!(f["days_on_market"], 0.3);
        assert_eq!(f["crime_score"], 5.0);
        assert_eq!(f["school_score"], 8.0);
        assert_eq!(f["pro_count"], 3.0);
        assert_eq!(f["argument_balance"], 2.0);
        assert_eq!(f["is_house"], 1.0);
        assert_eq!(f["is_condo"] + f["is_townhouse"], 0.0);
    }

    #[test]
    fn pearson_handles_degenerate_inputs() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[1.0, 1.0, -1.0]) + 0.866).abs() < 1e-3);
        assert_eq!(pearson(&[4.0, 4.0], &[1.0, -1.0]), 0.0);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0, 1.0]), 0.0);
        assert_eq!(pearson(&[1.0], &[1.0]), 0.0);
        assert_eq!(pearson(&[f64::NAN, 1.0], &[1.0, -1.0]), 0.0);
    }

    #[test]
    fn personalized_score_is_clamped() {
        let r = report("a", 100_000_000, 40, 10.0);
        let features = extract_features(&r.listing, &r);
        let huge: BTreeMap<String, f64> =
            FEATURE_NAMES.iter().map(|n| (n.to_string(), 1e9)).collect();
        let tiny: BTreeMap<String, f64> =
            FEATURE_NAMES.iter().map(|n| (n.to_string(), -1e9)).collect();
        let nan: BTreeMap<String, f64> =
            FEATURE_NAMES.iter().map(|n| (n.to_string(), f64::NAN)).collect();

        for weights in [&huge, &tiny, &nan] {
            let s = personalized_score(&features, weights);
            assert!((0.0..=10.0).contains(&s), "{}", s);
        }
        assert_eq!(personalized_score(&features, &huge), 10.0);
        assert!((personalized_score(&features, &tiny) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn rank_without_weights_is_stable_by_final_score() {
        let reports = vec![
            report("a", 1, 1, 6.0),
            report("b", 1, 1, 9.0),
            report("c", 1, 1, 6.0),
            report("d", 1, 1, 7.0),
        ];
        let ranked = rank(reports, None);
        assert_eq!(ids(&ranked), vec!["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn one_event_produces_no_weights() {
        let l = learner();
        let r = report("a", 300_000, 2, 6.0);
        let weights = l
            .record_feedback("s", "a", FeedbackAction::Like, &r.listing, &r)
            .await
            .unwrap();
        assert!(weights.is_none());

        let ranked = l
            .ranked_listings("s", vec![report("x", 1, 1, 5.0), report("y", 1, 1, 8.0)])
            .await
            .unwrap();
        assert_eq!(ids(&ranked), vec!["y", "x"]);
    }

    #[tokio::test]
    async fn opposite_swipes_learn_non_empty_weights() {
        let l = learner();
        let cheap = report("cheap", 300_000, 2, 6.0);
        let pricey = report("pricey", 900_000, 4, 6.0);
        swipe(&l, "s", &cheap, FeedbackAction::Like).await;
        swipe(&l, "s", &pricey, FeedbackAction::Dislike).await;

        let insights = l.learning_insights("s").await.unwrap();
        assert_eq!(insights.total_swipes, 2);
        assert_eq!(insights.likes, 1);
        assert_eq!(insights.like_rate, 0.5);
        assert!(insights.weights["price"] < 0.0);
        assert_eq!(insights.weights["final_score"], 0.0);
        assert!(insights
            .top_weighted_features
            .iter()
            .any(|f| f.preference == "Prefers lower price"));
        assert!(insights.top_weighted_features.iter().all(|f| f.weight != 0.0));
        assert!(insights.top_weighted_features.len() <= 5);

        let ranked = l
            .ranked_listings(
                "s",
                vec![report("big", 1_200_000, 5, 7.0), report("small", 250_000, 2, 7.0)],
            )
            .await
            .unwrap();
        assert_eq!(ids(&ranked), vec!["small", "big"]);
    }

    #[tokio::test]
    async fn repeated_swipe_is_last_write_wins() {
        let l = learner();
        let r = report("a", 300_000, 2, 6.0);
        swipe(&l, "s", &r, FeedbackAction::Like).await;
        swipe(&l, "s", &r, FeedbackAction::Dislike).await;

        let history = l.feedback_history("s").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, FeedbackAction::Dislike);
        assert_eq!(history[0].price, 0.3);

        let insights = l.learning_insights("s").await.unwrap();
        assert_eq!(insights.total_swipes, 1);
        assert_eq!(insights.dislikes, 1);
        assert!(insights.weights.is_empty());
    }

    #[tokio::test]
    async fn next_listing_skips_seen_ids() {
        let l = learner();
        let reports = vec![
            report("a", 1, 1, 9.0),
            report("b", 1, 1, 8.0),
            report("c", 1, 1, 7.0),
        ];

        let next = l
            .next_listing("s", reports.clone(), &["a".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.listing.id, "b");

        let all: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert!(l.next_listing("s", reports, &all).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insights_for_unknown_session_are_empty() {
        let insights = learner().learning_insights("nobody").await.unwrap();
        assert_eq!(insights.total_swipes, 0);
        assert_eq!(insights.like_rate, 0.0);
        assert!(insights.top_weighted_features.is_empty());
    }
}
