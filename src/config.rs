use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}

impl StoreConfig {
    pub fn is_sqlite(&self) -> bool {
        self.backend == "sqlite"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_max_results")]
    pub max_results_per_source: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_results_per_source: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub evaluator_url: Option<String>,
    #[serde(default)]
    pub arguer_url: Option<String>,
    #[serde(default)]
    pub compiler_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            evaluator_url: None,
            arguer_url: None,
            compiler_url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "heuristic".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Named source adapter instances, keyed by type then name.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub fixture: BTreeMap<String, FixtureSourceConfig>,
    #[serde(default)]
    pub http: BTreeMap<String, HttpSourceConfig>,
}

impl SourcesConfig {
    pub fn is_empty(&self) -> bool {
        self.fixture.is_empty() && self.http.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FixtureSourceConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSourceConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Config {
    /// In-memory store, heuristic enrichment, no sources.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig::default(),
            pipeline: PipelineConfig::default(),
            enrichment: EnrichmentConfig::default(),
            server: ServerConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "memory" => {}
        "sqlite" => {
            if config.store.path.is_none() {
                anyhow::bail!("store.path must be set when store.backend is 'sqlite'");
            }
        }
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be memory or sqlite.",
            other
        ),
    }

    if config.pipeline.max_results_per_source == 0 {
        anyhow::bail!("pipeline.max_results_per_source must be >= 1");
    }

    if config.enrichment.timeout_secs == 0 {
        anyhow::bail!("enrichment.timeout_secs must be >= 1");
    }

    match config.enrichment.provider.as_str() {
        "heuristic" => {}
        "http" => {
            let e = &config.enrichment;
            for (key, url) in [
                ("evaluator_url", &e.evaluator_url),
                ("arguer_url", &e.arguer_url),
                ("compiler_url", &e.compiler_url),
            ] {
                if url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                    anyhow::bail!("enrichment.{} must be set when provider is 'http'", key);
                }
            }
        }
        other => anyhow::bail!(
            "Unknown enrichment provider: '{}'. Must be heuristic or http.",
            other
        ),
    }

    for (name, http) in &config.sources.http {
        if http.timeout_secs == 0 {
            anyhow::bail!("sources.http.{}.timeout_secs must be >= 1", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.pipeline.max_results_per_source, 20);
        assert_eq!(config.enrichment.provider, "heuristic");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert!(config.sources.is_empty());
    }

    #[test]
    fn parses_named_sources() {
        let config: Config = toml::from_str(
            r#"
[sources.fixture.bay]
path = "./listings/bay.json"

[sources.http.mls]
url = "http://localhost:9000/search"
timeout_secs = 5
"#,
        )
        .unwrap();
        validate(&config).unwrap();
        assert_eq!(
            config.sources.fixture["bay"].path,
            PathBuf::from("./listings/bay.json")
        );
        assert_eq!(config.sources.http["mls"].timeout_secs, 5);
        assert_eq!(config.sources.http["mls"].max_retries, 2);
    }

    #[test]
    fn sqlite_requires_path() {
        let config: Config = toml::from_str("[store]\nbackend = \"sqlite\"\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn http_enrichment_requires_urls() {
        let config: Config = toml::from_str(
            "[enrichment]\nprovider = \"http\"\nevaluator_url = \"http://e\"\n",
        )
        .unwrap();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("arguer_url"), "{}", err);
    }

    #[test]
    fn zero_cap_is_rejected() {
        let config: Config =
            toml::from_str("[pipeline]\nmax_results_per_source = 0\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let config: Config = toml::from_str("[store]\nbackend = \"redis\"\n").unwrap();
        assert!(validate(&config).is_err());
    }
}
