//! HTTP JSON collaborators.
//!
//! Every remote collaborator is a `POST` of a JSON body to a configured
//! URL, sharing one request policy:
//!
//! - client-side timeout from config (the collaborator's latency bound)
//! - HTTP 429 or 5xx → retry with exponential backoff (1s, 2s, 4s, ...)
//! - HTTP 4xx (not 429) → fail immediately
//! - network error → retry
//!
//! | Type | Body | Response |
//! |------|------|----------|
//! | [`HttpSource`] | `{criteria}` | `[Listing]` or `{listings: [Listing]}` |
//! | [`RemoteEvaluator`] | `{listing, criteria}` | `EvaluationReport` |
//! | [`RemoteArguer`] | `{listing, evaluation, criteria}` | `ArgumentReport` |
//! | [`RemoteCompiler`] | `{listing, evaluation, arguments, criteria}` | `{final_score, executive_summary, recommendation?}` |

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::{EnrichmentConfig, HttpSourceConfig};
use crate::models::{
    ArgumentReport, EvaluationReport, FinalReport, Listing, Preferences, Recommendation,
};
use crate::traits::{Arguer, Compiler, Evaluator, SourceAdapter};

/// A JSON endpoint with timeout and retry policy.
#[derive(Clone)]
struct JsonEndpoint {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl JsonEndpoint {
    fn new(url: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            max_retries,
        })
    }

    async fn post<T: DeserializeOwned>(&self, body: &serde_json::Value) -> Result<T> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.client.post(&self.url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .with_context(|| format!("invalid response from {}", self.url));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!(url = %self.url, %status, attempt, "retryable collaborator error");
                        last_err = Some(anyhow::anyhow!("{} returned {}: {}", self.url, status, body_text));
                        continue;
                    }

                    bail!("{} returned {}: {}", self.url, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::Error::new(e).context(format!("request to {} failed", self.url)));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed after retries", self.url)))
    }
}

fn required_url<'a>(url: &'a Option<String>, key: &str) -> Result<&'a str> {
    url.as_deref()
        .filter(|u| !u.trim().is_empty())
        .with_context(|| format!("enrichment.{} must be set when provider is 'http'", key))
}

// ═══════════════════════════════════════════════════════════════════════
// Source
// ═══════════════════════════════════════════════════════════════════════

/// A list of listings, either bare or under a `listings` key.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ListingsPayload {
    Bare(Vec<Listing>),
    Wrapped { listings: Vec<Listing> },
}

impl ListingsPayload {
    pub(crate) fn into_listings(self) -> Vec<Listing> {
        match self {
            ListingsPayload::Bare(l) => l,
            ListingsPayload::Wrapped { listings } => listings,
        }
    }
}

/// Listing source backed by a remote search endpoint.
pub struct HttpSource {
    name: String,
    endpoint: JsonEndpoint,
}

impl HttpSource {
    pub fn new(name: String, config: HttpSourceConfig) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new(&config.url, config.timeout_secs, config.max_retries)?,
            name,
        })
    }

    pub fn url(&self) -> &str {
        &self.endpoint.url
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &str {
        "http"
    }

    async fn search(&self, criteria: &Preferences) -> Result<Vec<Listing>> {
        let payload: ListingsPayload = self
            .endpoint
            .post(&serde_json::json!({ "criteria": criteria }))
            .await?;
        let mut listings = payload.into_listings();
        let label = self.source_label();
        for listing in &mut listings {
            listing.source = label.clone();
        }
        Ok(listings)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Enrichment
// ═══════════════════════════════════════════════════════════════════════

pub struct RemoteEvaluator {
    endpoint: JsonEndpoint,
}

impl RemoteEvaluator {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let url = required_url(&config.evaluator_url, "evaluator_url")?;
        Ok(Self {
            endpoint: JsonEndpoint::new(url, config.timeout_secs, config.max_retries)?,
        })
    }
}

#[async_trait]
impl Evaluator for RemoteEvaluator {
    async fn evaluate(&self, listing: &Listing, criteria: &Preferences) -> Result<EvaluationReport> {
        let mut report: EvaluationReport = self
            .endpoint
            .post(&serde_json::json!({ "listing": listing, "criteria": criteria }))
            .await?;
        report.listing_id = listing.id.clone();
        Ok(report)
    }
}

pub struct RemoteArguer {
    endpoint: JsonEndpoint,
}

impl RemoteArguer {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let url = required_url(&config.arguer_url, "arguer_url")?;
        Ok(Self {
            endpoint: JsonEndpoint::new(url, config.timeout_secs, config.max_retries)?,
        })
    }
}

#[async_trait]
impl Arguer for RemoteArguer {
    async fn argue(
        &self,
        listing: &Listing,
        evaluation: &EvaluationReport,
        criteria: &Preferences,
    ) -> Result<ArgumentReport> {
        let mut report: ArgumentReport = self
            .endpoint
            .post(&serde_json::json!({
                "listing": listing,
                "evaluation": evaluation,
                "criteria": criteria,
            }))
            .await?;
        report.listing_id = listing.id.clone();
        Ok(report)
    }
}

#[derive(Deserialize)]
struct CompiledVerdict {
    final_score: f64,
    #[serde(default)]
    executive_summary: String,
    #[serde(default)]
    recommendation: Option<Recommendation>,
}

pub struct RemoteCompiler {
    endpoint: JsonEndpoint,
}

impl RemoteCompiler {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let url = required_url(&config.compiler_url, "compiler_url")?;
        Ok(Self {
            endpoint: JsonEndpoint::new(url, config.timeout_secs, config.max_retries)?,
        })
    }
}

#[async_trait]
impl Compiler for RemoteCompiler {
    async fn compile(
        &self,
        listing: &Listing,
        evaluation: &EvaluationReport,
        arguments: &ArgumentReport,
        criteria: &Preferences,
    ) -> Result<FinalReport> {
        let verdict: CompiledVerdict = self
            .endpoint
            .post(&serde_json::json!({
                "listing": listing,
                "evaluation": evaluation,
                "arguments": arguments,
                "criteria": criteria,
            }))
            .await?;

        if !verdict.final_score.is_finite() {
            bail!("compiler returned a non-numeric final_score");
        }
        let final_score = verdict.final_score.clamp(0.0, 10.0);

        Ok(FinalReport {
            listing: listing.clone(),
            evaluation: evaluation.clone(),
            arguments: arguments.clone(),
            final_score,
            executive_summary: verdict.executive_summary,
            recommendation: verdict
                .recommendation
                .unwrap_or_else(|| Recommendation::from_score(final_score)),
        })
    }
}
