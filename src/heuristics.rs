//! Built-in deterministic enrichment stages.
//!
//! These let the harness run end to end without any external service.
//! The evaluator scores preference fit from listing fields alone, the
//! arguer derives pros and cons from that evaluation, and the compiler
//! applies the weighted final-score formula:
//!
//! ```text
//! final = 0.4·match + 0.3·mean(aux scores, default 5) + 0.2·pro/con balance + 0.1·5
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ArgumentReport, EvaluationReport, FinalReport, Listing, Preferences, Recommendation,
};
use crate::traits::{Arguer, Compiler, Evaluator};

const NEUTRAL: f64 = 5.0;
const MAX_ARGUMENTS: usize = 5;
const DEAL_BREAKER_PENALTY: f64 = 2.0;
const STALE_DAYS: u32 = 60;

/// Case-insensitive match of a location filter against city, state, zip, or address.
///
/// Only the part before the first comma is matched, so "Portland, OR"
/// matches on "portland".
pub fn location_matches(listing: &Listing, location: &str) -> bool {
    let needle = location
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [&listing.city, &listing.state, &listing.zip_code, &listing.address]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Case-insensitive membership test; an empty list accepts every type.
pub fn property_type_matches(listing: &Listing, types: &[String]) -> bool {
    types.is_empty()
        || types
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(listing.property_type.trim()))
}

fn within<T: PartialOrd + Copy>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

fn mentions(listing: &Listing, phrase: &str) -> bool {
    let phrase = phrase.trim().to_lowercase();
    !phrase.is_empty() && listing.description.to_lowercase().contains(&phrase)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn money(v: u64) -> String {
    let s = v.to_string();
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("${}", out)
}

/// Scores preference fit from the listing's own fields.
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn assess(listing: &Listing, criteria: &Preferences) -> EvaluationReport {
        let mut checks = 0u32;
        let mut met = 0u32;
        let mut strengths = Vec::new();
        let mut concerns = Vec::new();

        let mut check = |ok: bool, strength: String, concern: String| {
            checks += 1;
            if ok {
                met += 1;
                strengths.push(strength);
            } else {
                concerns.push(concern);
            }
        };

        if criteria.price_min.is_some() || criteria.price_max.is_some() {
            check(
                within(listing.price, criteria.price_min, criteria.price_max),
                format!("Priced at {}, within budget", money(listing.price)),
                format!("Priced at {}, outside budget", money(listing.price)),
            );
        }
        if criteria.bedrooms_min.is_some() || criteria.bedrooms_max.is_some() {
            check(
                within(listing.bedrooms, criteria.bedrooms_min, criteria.bedrooms_max),
                format!("{} bedrooms as requested", listing.bedrooms),
                format!("{} bedrooms does not fit the requested range", listing.bedrooms),
            );
        }
        if criteria.bathrooms_min.is_some() || criteria.bathrooms_max.is_some() {
            check(
                within(listing.bathrooms, criteria.bathrooms_min, criteria.bathrooms_max),
                format!("{} bathrooms as requested", listing.bathrooms),
                format!("{} bathrooms does not fit the requested range", listing.bathrooms),
            );
        }
        if criteria.sqft_min.is_some() || criteria.sqft_max.is_some() {
            check(
                within(listing.sqft, criteria.sqft_min, criteria.sqft_max),
                format!("{} sqft of living space", listing.sqft),
                format!("{} sqft is outside the preferred size", listing.sqft),
            );
        }
        if let Some(location) = criteria.location.as_deref() {
            check(
                location_matches(listing, location),
                format!("Located in {}", location),
                format!("Not in {}", location),
            );
        }
        if !criteria.property_types.is_empty() {
            check(
                property_type_matches(listing, &criteria.property_types),
                format!("Property type {} matches", listing.property_type),
                format!("Property type {} was not requested", listing.property_type),
            );
        }
        for feature in &criteria.must_have_features {
            check(
                mentions(listing, feature),
                format!("Has {}", feature),
                format!("No mention of {}", feature),
            );
        }

        let mut score = if checks == 0 {
            NEUTRAL
        } else {
            10.0 * met as f64 / checks as f64
        };

        for breaker in &criteria.deal_breakers {
            if mentions(listing, breaker) {
                score -= DEAL_BREAKER_PENALTY;
                concerns.push(format!("Mentions deal-breaker: {}", breaker));
            }
        }

        let affordability_score = criteria.price_max.filter(|max| *max > 0).map(|max| {
            let ratio = listing.price as f64 / max as f64;
            round1((10.0 - (ratio - 0.5) * 10.0).clamp(0.0, 10.0))
        });

        EvaluationReport {
            listing_id: listing.id.clone(),
            preference_match_score: round1(score.clamp(0.0, 10.0)),
            crime_score: None,
            school_score: None,
            walkability_score: None,
            affordability_score,
            strengths,
            concerns,
            additional_notes: None,
        }
    }
}

#[async_trait]
impl Evaluator for HeuristicEvaluator {
    async fn evaluate(&self, listing: &Listing, criteria: &Preferences) -> Result<EvaluationReport> {
        Ok(Self::assess(listing, criteria))
    }
}

/// Derives pros and cons from an evaluation.
pub struct HeuristicArguer;

impl HeuristicArguer {
    pub fn debate(listing: &Listing, evaluation: &EvaluationReport, criteria: &Preferences) -> ArgumentReport {
        let mut pros: Vec<String> = evaluation.strengths.clone();
        let mut cons: Vec<String> = evaluation.concerns.clone();

        if let Some(max) = criteria.price_max {
            if listing.price < max {
                pros.push(format!("{} under your maximum budget", money(max - listing.price)));
            }
        }
        if let Some(score) = evaluation.affordability_score {
            if score < NEUTRAL {
                cons.push(format!("Affordability scores only {:.1}/10", score));
            }
        }
        match listing.days_on_market {
            Some(days) if days > STALE_DAYS => {
                cons.push(format!("On the market for {} days", days));
                pros.push("Long time on market may leave room to negotiate".to_string());
            }
            Some(days) if days <= 7 => {
                cons.push("Newly listed, expect competition".to_string());
            }
            _ => {}
        }
        if listing.sqft > 0 && listing.price > 0 {
            pros.push(format!(
                "{} per sqft",
                money(listing.price / listing.sqft.max(1))
            ));
        }

        pros.truncate(MAX_ARGUMENTS);
        cons.truncate(MAX_ARGUMENTS);

        ArgumentReport {
            listing_id: listing.id.clone(),
            pro_arguments: pros,
            con_arguments: cons,
        }
    }
}

#[async_trait]
impl Arguer for HeuristicArguer {
    async fn argue(
        &self,
        listing: &Listing,
        evaluation: &EvaluationReport,
        criteria: &Preferences,
    ) -> Result<ArgumentReport> {
        Ok(Self::debate(listing, evaluation, criteria))
    }
}

/// Mean of the present auxiliary scores, 5 when none are present.
pub fn auxiliary_mean(evaluation: &EvaluationReport) -> f64 {
    let present: Vec<f64> = evaluation.auxiliary_scores().into_iter().flatten().collect();
    if present.is_empty() {
        NEUTRAL
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    }
}

/// Share of pros among all arguments, scaled to `[0, 10]`; 5 with no arguments.
pub fn procon_balance(arguments: &ArgumentReport) -> f64 {
    let pros = arguments.pro_arguments.len();
    let cons = arguments.con_arguments.len();
    if pros + cons == 0 {
        return NEUTRAL;
    }
    pros as f64 / (pros + cons) as f64 * 10.0
}

/// Weighted final score. Always in `[0, 10]`.
pub fn weighted_score(evaluation: &EvaluationReport, arguments: &ArgumentReport) -> f64 {
    let score = 0.4 * evaluation.preference_match_score
        + 0.3 * auxiliary_mean(evaluation)
        + 0.2 * procon_balance(arguments)
        + 0.1 * NEUTRAL;
    score.clamp(0.0, 10.0)
}

/// Applies [`weighted_score`] and the recommendation thresholds.
pub struct HeuristicCompiler;

#[async_trait]
impl Compiler for HeuristicCompiler {
    async fn compile(
        &self,
        listing: &Listing,
        evaluation: &EvaluationReport,
        arguments: &ArgumentReport,
        _criteria: &Preferences,
    ) -> Result<FinalReport> {
        let final_score = round1(weighted_score(evaluation, arguments));
        let strengths: Vec<&str> = evaluation.strengths.iter().take(2).map(String::as_str).collect();
        let mut executive_summary = format!(
            "Property scores {:.1}/10 overall. Preference match: {:.1}/10.",
            final_score, evaluation.preference_match_score
        );
        if !strengths.is_empty() {
            executive_summary.push_str(&format!(" Key strengths: {}.", strengths.join(", ")));
        }

        Ok(FinalReport {
            listing: listing.clone(),
            evaluation: evaluation.clone(),
            arguments: arguments.clone(),
            final_score,
            executive_summary,
            recommendation: Recommendation::from_score(final_score),
        })
    }
}
