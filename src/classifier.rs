//! Sorts driver failures into "the session is dead" and "this statement failed".

use crate::error::PgBridgeError;

/// Message fragments that mean the server session can no longer be used.
pub const DISCONNECT_PATTERNS: [&str; 6] = [
    "connection closed",
    "connection lost",
    "server closed the connection",
    "connection reset",
    "broken pipe",
    "connection refused",
];

/// Returns true if `message` contains one of the known disconnect phrases,
/// ignoring case.
pub fn is_disconnect_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    DISCONNECT_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

/// Wraps a driver failure message in the matching error variant.
pub fn classify(message: impl Into<String>) -> PgBridgeError {
    let message = message.into();
    if is_disconnect_message(&message) {
        PgBridgeError::Disconnect(message)
    } else {
        PgBridgeError::Statement(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_closed_is_disconnect() {
        let err = classify("FATAL: server closed the connection unexpectedly");
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_syntax_error_is_statement_error() {
        let err = classify("ERROR: syntax error at or near \"SELEC\"");
        assert!(!err.is_disconnect());
        assert!(matches!(err, PgBridgeError::Statement(_)));
    }

    #[test]
    fn test_match_ignores_case() {
        assert!(is_disconnect_message("Broken Pipe (os error 32)"));
        assert!(is_disconnect_message("CONNECTION RESET by peer"));
        assert!(is_disconnect_message("Connection refused"));
        assert!(!is_disconnect_message("duplicate key value"));
    }
}
