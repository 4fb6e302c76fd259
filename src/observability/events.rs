//! Lifecycle events
//!
//! Milestones are logged with a stable `event` field so log pipelines can
//! match on them regardless of the surrounding message.

use std::fmt;

/// Observable lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Startup begins
    BootStart,
    /// Startup complete, ready to serve
    BootComplete,
    /// Startup aborted (FATAL)
    BootFailed,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,

    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,

    // Storage
    /// Database file opened
    DatabaseOpened,
    /// Entity tables created or verified
    SchemaMigrated,

    // Server
    /// Resource routes registered
    RoutesRegistered,
    /// Listener bound, serving requests
    ServerListening,

    // Identity
    /// Bearer token minted from the command line
    TokenIssued,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "RETAILPOS_STARTUP_BEGIN",
            Event::BootComplete => "RETAILPOS_STARTUP_COMPLETE",
            Event::BootFailed => "RETAILPOS_STARTUP_FAILED",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::DatabaseOpened => "DATABASE_OPENED",
            Event::SchemaMigrated => "SCHEMA_MIGRATED",

            Event::RoutesRegistered => "ROUTES_REGISTERED",
            Event::ServerListening => "SERVER_LISTENING",

            Event::TokenIssued => "TOKEN_ISSUED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::BootFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::BootStart,
            Event::BootComplete,
            Event::BootFailed,
            Event::ShutdownStart,
            Event::ShutdownComplete,
            Event::ConfigLoaded,
            Event::DatabaseOpened,
            Event::SchemaMigrated,
            Event::RoutesRegistered,
            Event::ServerListening,
            Event::TokenIssued,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::BootFailed.is_fatal());
        assert!(!Event::BootStart.is_fatal());
        assert!(!Event::SchemaMigrated.is_fatal());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::BootStart), "RETAILPOS_STARTUP_BEGIN");
        assert_eq!(format!("{}", Event::SchemaMigrated), "SCHEMA_MIGRATED");
    }
}
