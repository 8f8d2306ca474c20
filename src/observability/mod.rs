//! Observability for the SDK
//!
//! Structured JSON log lines for session and transaction lifecycle events.
//! Logging is read-only: it never alters control flow, and key material is
//! never logged.
//!
//! ```ignore
//! use aerodb_sdk::observability::{Logger, Severity};
//!
//! Logger::enable(Severity::Info);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
