//! Tracing setup for the `annot` binary.
//!
//! Logs go to stderr. `RUST_LOG` overrides the default filter unless
//! `--debug` is given, which always enables debug output for both crates.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const INFO_FILTER: &str = "annotation_harness=info,annotation_harness_core=info";
const DEBUG_FILTER: &str = "annotation_harness=debug,annotation_harness_core=debug";

/// Filter directives used when `RUST_LOG` does not apply.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        DEBUG_FILTER
    } else {
        INFO_FILTER
    }
}

/// Build the filter from `--debug` and the value of `RUST_LOG`, if set.
/// An unparseable `RUST_LOG` falls back to the default.
pub fn build_filter(debug: bool, rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(directives) if !debug => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new(default_filter(false))),
        _ => EnvFilter::new(default_filter(debug)),
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init(debug: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(build_filter(debug, rust_log.as_deref()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_raises_both_crates() {
        assert!(default_filter(true).contains("annotation_harness=debug"));
        assert!(default_filter(true).contains("annotation_harness_core=debug"));
        assert!(default_filter(false).contains("annotation_harness_core=info"));
    }

    #[test]
    fn debug_flag_overrides_rust_log() {
        let filter = build_filter(true, Some("warn")).to_string();
        assert!(filter.contains("annotation_harness=debug"));
        assert!(filter.contains("annotation_harness_core=debug"));
        assert!(!filter.contains("warn"));
    }

    #[test]
    fn rust_log_applies_without_debug() {
        let filter = build_filter(false, Some("annotation_harness_core=trace")).to_string();
        assert!(filter.contains("annotation_harness_core=trace"));
        assert!(!filter.contains("annotation_harness=info"));
    }

    #[test]
    fn default_filter_without_rust_log() {
        let filter = build_filter(false, None).to_string();
        assert!(filter.contains("annotation_harness=info"));
        assert!(filter.contains("annotation_harness_core=info"));
    }
}
