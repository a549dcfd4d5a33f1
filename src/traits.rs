//! Collaborator traits and registries.
//!
//! The search core only knows its collaborators through the traits in this
//! module. Listing retrieval, evaluation, argument generation, report
//! compilation, and preference resolution are each a narrow async contract
//! with defined inputs, outputs, and failure modes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             SourceRegistry               │
//! │  ┌─────────┐ ┌─────────┐ ┌────────────┐ │
//! │  │ Fixture │ │  HTTP   │ │  Custom    │ │
//! │  │ (file)  │ │ (JSON)  │ │ (Rust)     │ │
//! │  └─────────┘ └─────────┘ └────────────┘ │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!        collect() → dedup → pipeline
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!          Evaluator  →     Arguer    →    Compiler
//! ```
//!
//! # Usage
//!
//! ```rust
//! use scout_harness::traits::SourceRegistry;
//!
//! let mut sources = SourceRegistry::new();
//! // sources.register(Arc::new(MySource::new()));
//! assert!(sources.is_empty());
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{ArgumentReport, EvaluationReport, FinalReport, Listing, Preferences};

// ═══════════════════════════════════════════════════════════════════════
// Source Adapter
// ═══════════════════════════════════════════════════════════════════════

/// A listing source that turns search criteria into raw listings.
///
/// Each adapter is called once per search, concurrently with every other
/// registered adapter. An adapter that errors (or panics) is treated as
/// having returned nothing; it never fails the search as a whole.
///
/// Implementations are responsible for bounding their own latency, e.g.
/// with an HTTP client timeout.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use scout_harness::models::{Listing, Preferences};
/// use scout_harness::traits::SourceAdapter;
///
/// pub struct OpenHouseFeed;
///
/// #[async_trait]
/// impl SourceAdapter for OpenHouseFeed {
///     fn name(&self) -> &str { "openhouse" }
///
///     async fn search(&self, _criteria: &Preferences) -> Result<Vec<Listing>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Instance name (e.g. `"bay-area"`).
    fn name(&self) -> &str;

    /// Adapter type identifier (e.g. `"fixture"`, `"http"`, `"custom"`).
    fn source_type(&self) -> &str {
        "custom"
    }

    /// Label used to tag listings and log events: `"{type}:{name}"`.
    fn source_label(&self) -> String {
        format!("{}:{}", self.source_type(), self.name())
    }

    /// Retrieve listings matching `criteria`.
    async fn search(&self, criteria: &Preferences) -> Result<Vec<Listing>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Enrichment collaborators
// ═══════════════════════════════════════════════════════════════════════

/// Scores a listing against the buyer's preferences.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, listing: &Listing, criteria: &Preferences)
        -> Result<EvaluationReport>;
}

/// Produces pro and con arguments for an evaluated listing.
#[async_trait]
pub trait Arguer: Send + Sync {
    async fn argue(
        &self,
        listing: &Listing,
        evaluation: &EvaluationReport,
        criteria: &Preferences,
    ) -> Result<ArgumentReport>;
}

/// Compiles the evaluation and arguments into a final verdict.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(
        &self,
        listing: &Listing,
        evaluation: &EvaluationReport,
        arguments: &ArgumentReport,
        criteria: &Preferences,
    ) -> Result<FinalReport>;
}

/// Resolves the buyer preferences behind a criteria reference.
///
/// `Ok(None)` means the reference exists (or not) but no preferences have
/// been resolved for it yet, which the pipeline treats as a structural error.
#[async_trait]
pub trait PreferenceResolver: Send + Sync {
    async fn resolve(&self, criteria_ref: &str) -> Result<Option<Preferences>>;
}

/// The three per-listing enrichment stages.
#[derive(Clone)]
pub struct Enrichment {
    pub evaluator: Arc<dyn Evaluator>,
    pub arguer: Arc<dyn Arguer>,
    pub compiler: Arc<dyn Compiler>,
}

impl Enrichment {
    /// Build the enrichment stages selected by `[enrichment].provider`.
    pub fn from_config(config: &Config) -> Result<Self> {
        use crate::remote::{RemoteArguer, RemoteCompiler, RemoteEvaluator};

        match config.enrichment.provider.as_str() {
            "http" => Ok(Self {
                evaluator: Arc::new(RemoteEvaluator::new(&config.enrichment)?),
                arguer: Arc::new(RemoteArguer::new(&config.enrichment)?),
                compiler: Arc::new(RemoteCompiler::new(&config.enrichment)?),
            }),
            "heuristic" => Ok(Self::heuristic()),
            other => anyhow::bail!("Unknown enrichment provider: {}", other),
        }
    }

    /// Built-in deterministic stages that need no external service.
    pub fn heuristic() -> Self {
        use crate::heuristics::{HeuristicArguer, HeuristicCompiler, HeuristicEvaluator};

        Self {
            evaluator: Arc::new(HeuristicEvaluator),
            arguer: Arc::new(HeuristicArguer),
            compiler: Arc::new(HeuristicCompiler),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of source adapters (built-in and custom).
///
/// Use [`SourceRegistry::from_config`] to load every configured fixture
/// and HTTP source, then optionally [`register`](SourceRegistry::register)
/// custom ones. Registration order is the merge order used by
/// deduplication.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Create an empty source registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Create a registry pre-loaded with all sources from the config.
    pub fn from_config(config: &Config) -> Result<Self> {
        use crate::fixture::FixtureSource;
        use crate::remote::HttpSource;

        let mut registry = Self::new();

        for (name, cfg) in &config.sources.fixture {
            registry.register(Arc::new(FixtureSource::new(name.clone(), cfg.clone())));
        }
        for (name, cfg) in &config.sources.http {
            registry.register(Arc::new(HttpSource::new(name.clone(), cfg.clone())?));
        }

        Ok(registry)
    }

    /// Register a source adapter.
    pub fn register(&mut self, source: Arc<dyn SourceAdapter>) {
        self.sources.push(source);
    }

    /// All registered sources, in registration order.
    pub fn sources(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.sources
    }

    /// Find a source by its `"{type}:{name}"` label.
    pub fn find(&self, label: &str) -> Option<&Arc<dyn SourceAdapter>> {
        self.sources.iter().find(|s| s.source_label() == label)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
