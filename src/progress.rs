//! Ingest progress reporting.
//!
//! Reports how many records `annot ingest` has handled so far. Input is a
//! stream, so no total is known. Progress goes to **stderr** so the
//! summary on stdout stays parseable for scripts.

use std::io::Write;

/// Human progress is printed once per this many records.
pub const HUMAN_REPORT_EVERY: u64 = 100;

/// A single progress event for an ingest run.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// `n` records handled so far.
    Ingesting { source: String, n: u64 },
    /// The run finished after `n` records.
    Finished { source: String, n: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest kindle  1,200 records".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Ingesting { source, n } => {
                if n % HUMAN_REPORT_EVERY != 0 {
                    return;
                }
                format!("ingest {}  {} records\n", source, format_number(*n))
            }
            IngestProgressEvent::Finished { source, n } => {
                format!("ingest {}  done  {} records\n", source, format_number(*n))
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per record on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Ingesting { source, n } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "ingesting",
                "n": n
            }),
            IngestProgressEvent::Finished { source, n } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "finished",
                "n": n
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
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
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
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

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn off_mode_is_silent() {
        // Smoke test: must not panic or write.
        ProgressMode::Off.reporter().report(IngestProgressEvent::Ingesting {
            source: "kindle".to_string(),
            n: 100,
        });
    }
}
