use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn scout_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("scout");
    path
}

const LISTINGS: &str = r#"[
  {
    "id": "a-1",
    "url": "https://listings.test/a-1",
    "address": "12 Harbor Street",
    "city": "Portland",
    "state": "ME",
    "zip_code": "04101",
    "price": 410000,
    "bedrooms": 3,
    "bathrooms": 2.0,
    "sqft": 1500,
    "property_type": "house",
    "description": "Renovated house with a garage near the waterfront.",
    "days_on_market": 12
  },
  {
    "id": "a-2",
    "address": "12 Harbor St.",
    "city": "Portland",
    "state": "ME",
    "zip_code": "04101",
    "price": 410000,
    "bedrooms": 3,
    "bathrooms": 2.0,
    "sqft": 1500,
    "property_type": "house"
  },
  {
    "id": "a-3",
    "address": "88 Forest Avenue",
    "city": "Portland",
    "state": "ME",
    "zip_code": "04102",
    "price": 295000,
    "bedrooms": 2,
    "bathrooms": 1.5,
    "sqft": 1100,
    "property_type": "condo",
    "description": "Top floor condo. HOA includes heat.",
    "days_on_market": 75
  },
  {
    "id": "b-1",
    "address": "5 Main Road",
    "city": "Bangor",
    "state": "ME",
    "zip_code": "04401",
    "price": 200000,
    "bedrooms": 3,
    "bathrooms": 1.0,
    "sqft": 1300,
    "property_type": "house"
  }
]"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(root.join("listings.json"), LISTINGS).unwrap();
    fs::write(
        root.join("preferences.json"),
        r#"{ "location": "Portland, ME", "price_max": 450000, "bedrooms_min": 2, "deal_breakers": ["hoa"] }"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
backend = "sqlite"
path = "{}/data/scout.sqlite"

[pipeline]
max_results_per_source = 20

[server]
bind = "127.0.0.1:7441"

[sources.fixture.sample]
path = "{}/listings.json"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("scout.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_scout(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = scout_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run scout binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn preferences_arg(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("preferences.json")
        .display()
        .to_string()
}

fn search_json(config_path: &Path, extra: &[&str]) -> Vec<serde_json::Value> {
    let prefs = preferences_arg(config_path);
    let mut args = vec!["search", "--preferences", prefs.as_str(), "--json", "--progress", "off"];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run_scout(config_path, &args);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("bad JSON ({}): {}", e, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_scout(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/scout.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_scout(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_scout(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_init_memory_backend_is_noop() {
    let (tmp, _) = setup_test_env();
    let config_path = tmp.path().join("memory.toml");
    fs::write(&config_path, "[store]\nbackend = \"memory\"\n").unwrap();

    let (stdout, _, success) = run_scout(&config_path, &["init"]);
    assert!(success);
    assert!(stdout.contains("nothing to initialize"));
}

#[test]
fn test_sources() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_scout(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("fixture:sample"));
    assert!(stdout.contains("true"));
}

#[test]
fn test_search_filters_and_dedups() {
    let (_tmp, config_path) = setup_test_env();

    let reports = search_json(&config_path, &[]);
    let ids: Vec<&str> = reports
        .iter()
        .map(|r| r["listing"]["id"].as_str().unwrap())
        .collect();

    // b-1 is in Bangor; a-2 repeats a-1's address.
    assert_eq!(reports.len(), 2, "got {:?}", ids);
    assert!(ids.contains(&"a-1"));
    assert!(ids.contains(&"a-3"));
    assert!(reports
        .iter()
        .all(|r| r["listing"]["source"] == "fixture:sample"));
}

#[test]
fn test_search_sorted_by_final_score() {
    let (_tmp, config_path) = setup_test_env();

    let reports = search_json(&config_path, &[]);
    let scores: Vec<f64> = reports
        .iter()
        .map(|r| r["final_score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{:?}", scores);
    assert!(scores.iter().all(|s| (0.0..=10.0).contains(s)));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    let first = search_json(&config_path, &[]);
    let second = search_json(&config_path, &[]);
    assert_eq!(first, second);
}

#[test]
fn test_search_with_limit() {
    let (_tmp, config_path) = setup_test_env();

    let reports = search_json(&config_path, &["--limit", "1"]);
    assert_eq!(reports.len(), 1);
}

#[test]
fn test_search_table_output() {
    let (_tmp, config_path) = setup_test_env();
    let prefs = preferences_arg(&config_path);

    let (stdout, _, success) = run_scout(
        &config_path,
        &["search", "--preferences", &prefs, "--progress", "off"],
    );
    assert!(success);
    assert!(stdout.contains("2 report(s) from 2 listing(s)"), "{}", stdout);
    assert!(stdout.contains("12 Harbor Street"));
}

#[test]
fn test_search_json_progress() {
    let (_tmp, config_path) = setup_test_env();
    let prefs = preferences_arg(&config_path);

    let (_, stderr, success) = run_scout(
        &config_path,
        &["search", "--preferences", &prefs, "--json", "--progress", "json"],
    );
    assert!(success);

    let events: Vec<serde_json::Value> = stderr
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(!events.is_empty(), "no progress events in: {}", stderr);
    assert!(events.iter().all(|e| e["event"] == "progress"));
    let last = events.last().unwrap();
    assert_eq!(last["status"], "complete");
    assert_eq!(last["progress"], 100.0);
}

#[test]
fn test_search_no_results() {
    let (tmp, config_path) = setup_test_env();
    let prefs = tmp.path().join("nowhere.json");
    fs::write(&prefs, r#"{ "location": "Honolulu" }"#).unwrap();

    let (stdout, _, success) = run_scout(
        &config_path,
        &["search", "--preferences", prefs.to_str().unwrap(), "--progress", "off"],
    );
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_without_sources_errors() {
    let (tmp, _) = setup_test_env();
    let config_path = tmp.path().join("empty.toml");
    fs::write(&config_path, "").unwrap();
    let prefs = tmp.path().join("preferences.json");

    let (_, stderr, success) = run_scout(
        &config_path,
        &["search", "--preferences", prefs.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("No sources configured"), "{}", stderr);
}

#[test]
fn test_search_missing_preferences_file() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_scout(
        &config_path,
        &["search", "--preferences", "/nonexistent/prefs.json", "--progress", "off"],
    );
    assert!(!success);
}

#[test]
fn test_search_unknown_progress_mode_errors() {
    let (_tmp, config_path) = setup_test_env();
    let prefs = preferences_arg(&config_path);

    let (_, stderr, success) = run_scout(
        &config_path,
        &["search", "--preferences", &prefs, "--progress", "loud"],
    );
    assert!(!success);
    assert!(stderr.contains("invalid --progress value"), "{}", stderr);
}

#[test]
fn test_invalid_config_errors() {
    let (tmp, _) = setup_test_env();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[store]\nbackend = \"sqlite\"\n").unwrap();

    let (_, stderr, success) = run_scout(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("store.path"), "{}", stderr);
}
