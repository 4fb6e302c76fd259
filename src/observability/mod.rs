//! Observability subsystem
//!
//! Structured logging through `tracing`, plus the named lifecycle events
//! emitted at boot, migration and serve time.
//!
//! # Usage
//!
//! ```ignore
//! use retailpos::observability::{init_tracing, log_event, Event};
//!
//! init_tracing("info");
//! log_event(Event::BootStart);
//! ```

mod events;

pub use events::Event;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. Returns false when a
/// subscriber was already installed (repeated calls in tests).
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    if event.is_fatal() {
        error!(event = event.as_str());
    } else {
        info!(event = event.as_str());
    }
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let rendered = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" ");
    if event.is_fatal() {
        error!(event = event.as_str(), "{}", rendered);
    } else {
        info!(event = event.as_str(), "{}", rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_repeatable() {
        init_tracing("debug");
        assert!(!init_tracing("debug"));
    }

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::BootStart);
        log_event(Event::BootFailed);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("database_path", "/tmp/test.db")]);
    }
}
