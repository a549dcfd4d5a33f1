//! Search pipeline progress.
//!
//! Two concerns live here: the progress arithmetic that maps stage
//! completion onto the session's `[0, 100]` progress value, and the
//! reporters that echo progress to a terminal during `scout search`.
//! Reporters write to **stderr** so stdout stays parseable for scripts.
//!
//! | Milestone | Progress |
//! |-----------|----------|
//! | scraping | 20 |
//! | evaluate | 50 → 70 |
//! | argue | 70 → 85 |
//! | compile | 85 → 95 |
//! | complete | 100 |

use std::io::Write;

use crate::models::SearchStatus;

pub const SCRAPING_PROGRESS: f64 = 20.0;
pub const COMPLETE_PROGRESS: f64 = 100.0;

/// One per-listing enrichment stage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Evaluate,
    Argue,
    Compile,
}

impl Stage {
    /// Progress at the start and end of the stage.
    pub fn range(self) -> (f64, f64) {
        match self {
            Stage::Evaluate => (50.0, 70.0),
            Stage::Argue => (70.0, 85.0),
            Stage::Compile => (85.0, 95.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Evaluate => "evaluate",
            Stage::Argue => "argue",
            Stage::Compile => "compile",
        }
    }

    /// Session message shown while the stage runs.
    pub fn message(self) -> &'static str {
        match self {
            Stage::Evaluate => "Evaluating listings...",
            Stage::Argue => "Generating pro/con arguments...",
            Stage::Compile => "Compiling final reports...",
        }
    }

    /// Linear progress after `done` of `total` items have been attempted.
    ///
    /// An empty stage jumps straight to its end.
    pub fn progress(self, done: usize, total: usize) -> f64 {
        let (start, end) = self.range();
        if total == 0 {
            return end;
        }
        let fraction = done.min(total) as f64 / total as f64;
        start + (end - start) * fraction
    }
}

/// A single progress observation for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub session_id: String,
    pub status: SearchStatus,
    pub progress: f64,
    pub message: String,
    /// Items attempted and total in the current stage, if inside one.
    pub items: Option<(usize, usize)>,
}

/// Receives progress events from the pipeline coordinator.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Human-friendly progress on stderr: "search 1a2b3c4d  evaluating   62.0%  Evaluating listings... (3 / 5)".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: &ProgressEvent) {
        let short_id: String = event.session_id.chars().take(8).collect();
        let items = match event.items {
            Some((n, total)) => format!(" ({} / {})", format_number(n as u64), format_number(total as u64)),
            None => String::new(),
        };
        let line = format!(
            "search {}  {:<10} {:>5.1}%  {}{}\n",
            short_id,
            event.status.as_str(),
            event.progress,
            event.message,
            items
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: &ProgressEvent) {
        let mut obj = serde_json::json!({
            "event": "progress",
            "session_id": event.session_id,
            "status": event.status,
            "progress": event.progress,
            "message": event.message,
        });
        if let Some((n, total)) = event.items {
            obj["n"] = serde_json::json!(n);
            obj["total"] = serde_json::json!(total);
        }
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!("invalid --progress value '{}'. Use off, human, or json.", other),
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
