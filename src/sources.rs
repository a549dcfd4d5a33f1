//! Listing source health and status.
//!
//! Reports which sources are configured and whether they look usable.
//! Used by both the `scout sources` CLI command and `GET /sources`.
//!
//! | Source type | Healthy when |
//! |-------------|--------------|
//! | `fixture` | the listings file exists |
//! | `http` | the URL is an `http(s)://` URL (reachability is checked at search time) |

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;

/// Health and configuration status of a single source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    /// `"{type}:{name}"`, e.g. `"fixture:sample"`.
    pub name: String,
    pub configured: bool,
    pub healthy: bool,
    pub notes: Option<String>,
}

/// Configuration and health status of every configured source.
pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    let mut sources = Vec::new();

    for (name, fixture) in &config.sources.fixture {
        let exists = fixture.path.exists();
        sources.push(SourceStatus {
            name: format!("fixture:{}", name),
            configured: true,
            healthy: exists,
            notes: Some(if exists {
                format!("path: {}", fixture.path.display())
            } else {
                format!("file not found: {}", fixture.path.display())
            }),
        });
    }

    for (name, http) in &config.sources.http {
        let valid = http.url.starts_with("http://") || http.url.starts_with("https://");
        sources.push(SourceStatus {
            name: format!("http:{}", name),
            configured: true,
            healthy: valid,
            notes: Some(if valid {
                format!("url: {}", http.url)
            } else {
                format!("not an http(s) url: {}", http.url)
            }),
        });
    }

    sources
}

/// CLI entry point for `scout sources`.
pub fn list_sources(config: &Config) -> Result<()> {
    let sources = get_sources(config);

    if sources.is_empty() {
        println!("No sources configured. Add [sources.fixture.<name>] or [sources.http.<name>] to the config.");
        return Ok(());
    }

    println!("{:<24} {:<8} NOTES", "SOURCE", "HEALTHY");
    for s in &sources {
        println!(
            "{:<24} {:<8} {}",
            s.name,
            s.healthy,
            s.notes.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixtureSourceConfig, HttpSourceConfig};

    #[test]
    fn reports_fixture_and_http_health() {
        let tmp = tempfile::TempDir::new().unwrap();
        let present = tmp.path().join("listings.json");
        std::fs::write(&present, "[]").unwrap();

        let mut config = Config::minimal();
        config.sources.fixture.insert(
            "here".into(),
            FixtureSourceConfig { path: present },
        );
        config.sources.fixture.insert(
            "missing".into(),
            FixtureSourceConfig {
                path: tmp.path().join("nope.json"),
            },
        );
        config.sources.http.insert(
            "mls".into(),
            HttpSourceConfig {
                url: "ftp://example".into(),
                timeout_secs: 5,
                max_retries: 0,
            },
        );

        let sources = get_sources(&config);
        assert_eq!(sources.len(), 3);
        assert!(sources.iter().any(|s| s.name == "fixture:here" && s.healthy));
        assert!(sources.iter().any(|s| s.name == "fixture:missing" && !s.healthy));
        assert!(sources.iter().any(|s| s.name == "http:mls" && !s.healthy));
    }
}
