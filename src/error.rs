use thiserror::Error;

/// Error type for pgbridge operations
#[derive(Debug, Error)]
pub enum PgBridgeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection is closed")]
    ClosedConnection,

    #[error("Statement failed: {0}")]
    Statement(String),

    /// A statement failure that also means the session is unusable.
    #[error("Connection lost: {0}")]
    Disconnect(String),

    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Interface error: {0}")]
    Interface(String),
}

/// The DB-API exception class an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Interface,
    Database,
    Operational,
    Programming,
}

impl ErrorKind {
    /// The conventional DB-API name of this class.
    pub fn dbapi_name(self) -> &'static str {
        match self {
            ErrorKind::Interface => "InterfaceError",
            ErrorKind::Database => "DatabaseError",
            ErrorKind::Operational => "OperationalError",
            ErrorKind::Programming => "ProgrammingError",
        }
    }
}

impl PgBridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PgBridgeError::ConnectionFailed(_) | PgBridgeError::Disconnect(_) => {
                ErrorKind::Operational
            }
            PgBridgeError::ClosedConnection | PgBridgeError::Interface(_) => ErrorKind::Interface,
            PgBridgeError::Statement(_) => ErrorKind::Database,
            PgBridgeError::Parameter(_) => ErrorKind::Programming,
        }
    }

    /// True for any failure reported by the driver while running a statement,
    /// including those classified as disconnects.
    pub fn is_statement_error(&self) -> bool {
        matches!(
            self,
            PgBridgeError::Statement(_) | PgBridgeError::Disconnect(_)
        )
    }

    /// True when the connection should be discarded rather than reused.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, PgBridgeError::Disconnect(_))
    }
}

/// Result type alias for pgbridge operations
pub type Result<T> = std::result::Result<T, PgBridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_is_a_statement_error() {
        let err = PgBridgeError::Disconnect("broken pipe".to_string());
        assert!(err.is_statement_error());
        assert!(err.is_disconnect());
        assert_eq!(err.kind(), ErrorKind::Operational);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            PgBridgeError::ClosedConnection.kind().dbapi_name(),
            "InterfaceError"
        );
        assert_eq!(
            PgBridgeError::Statement("x".into()).kind().dbapi_name(),
            "DatabaseError"
        );
        assert_eq!(
            PgBridgeError::Parameter("x".into()).kind().dbapi_name(),
            "ProgrammingError"
        );
        assert!(!PgBridgeError::ClosedConnection.is_statement_error());
    }
}
