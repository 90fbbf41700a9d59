use crate::classifier::is_disconnect_message;
use crate::error::PgBridgeError;
use crate::types::IsolationLevel;

/// What the SQL layer may assume about this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_statement_cache: bool,
    pub supports_multivalues_insert: bool,
    pub supports_native_decimal: bool,
    pub supports_native_boolean: bool,
    pub supports_sequences: bool,
    pub implicit_returning: bool,
    pub insert_returning: bool,
    pub update_returning: bool,
    pub delete_returning: bool,
    pub postfetch_lastrowid: bool,
    pub supports_sane_rowcount: bool,
    pub supports_sane_multi_rowcount: bool,
    pub supports_isolation_level: bool,
    pub supports_server_side_cursors: bool,
}

/// Static description of the PostgreSQL backend served by this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dialect;

impl Dialect {
    pub const NAME: &'static str = "postgresql";
    pub const DRIVER: &'static str = "pgbridge";
    pub const DEFAULT_ISOLATION_LEVEL: IsolationLevel = IsolationLevel::ReadCommitted;

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_statement_cache: true,
            supports_multivalues_insert: true,
            supports_native_decimal: true,
            supports_native_boolean: true,
            supports_sequences: true,
            implicit_returning: true,
            insert_returning: true,
            update_returning: true,
            delete_returning: true,
            postfetch_lastrowid: false,
            supports_sane_rowcount: true,
            supports_sane_multi_rowcount: true,
            supports_isolation_level: true,
            supports_server_side_cursors: true,
        }
    }

    /// Whether `err` means the connection should be thrown away.
    pub fn is_disconnect(&self, err: &PgBridgeError) -> bool {
        match err {
            PgBridgeError::Disconnect(_) => true,
            PgBridgeError::Statement(message) | PgBridgeError::ConnectionFailed(message) => {
                is_disconnect_message(message)
            }
            _ => false,
        }
    }

    pub fn default_isolation_level(&self) -> IsolationLevel {
        Self::DEFAULT_ISOLATION_LEVEL
    }
}
