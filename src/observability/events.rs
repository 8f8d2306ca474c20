//! Observable SDK events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Sessions
    /// Credentials loaded and session ready
    SessionOpened,
    /// Server refused to identify itself to this signer
    ServerCertUnavailable,

    // Configuration transactions
    /// Context created
    ConfigTxOpened,
    /// Committed configuration fetched into a context
    ConfigFetched,
    /// Envelope handed to the transport
    ConfigTxSubmitted,
    /// Receipt says the transaction was applied
    ConfigTxCommitted,
    /// Receipt says the transaction was rejected
    ConfigTxInvalidated,
    /// Context discarded without submitting
    ConfigTxAborted,

    // Transport
    /// A network call failed
    TransportFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SessionOpened => "SESSION_OPENED",
            Event::ServerCertUnavailable => "SERVER_CERT_UNAVAILABLE",
            Event::ConfigTxOpened => "CONFIG_TX_OPENED",
            Event::ConfigFetched => "CONFIG_FETCHED",
            Event::ConfigTxSubmitted => "CONFIG_TX_SUBMITTED",
            Event::ConfigTxCommitted => "CONFIG_TX_COMMITTED",
            Event::ConfigTxInvalidated => "CONFIG_TX_INVALIDATED",
            Event::ConfigTxAborted => "CONFIG_TX_ABORTED",
            Event::TransportFailed => "TRANSPORT_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::ConfigFetched | Event::ConfigTxSubmitted => Severity::Debug,
            Event::ServerCertUnavailable | Event::ConfigTxInvalidated => Severity::Warn,
            Event::TransportFailed => Severity::Error,
            _ => Severity::Info,
        }
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
            Event::SessionOpened,
            Event::ServerCertUnavailable,
            Event::ConfigTxOpened,
            Event::ConfigFetched,
            Event::ConfigTxSubmitted,
            Event::ConfigTxCommitted,
            Event::ConfigTxInvalidated,
            Event::ConfigTxAborted,
            Event::TransportFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::TransportFailed.severity(), Severity::Error);
        assert_eq!(Event::ConfigTxInvalidated.severity(), Severity::Warn);
        assert_eq!(Event::ConfigTxCommitted.severity(), Severity::Info);
        assert_eq!(Event::ConfigFetched.severity(), Severity::Debug);
    }
}
