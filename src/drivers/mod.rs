mod in_memory_test;
mod tokio_postgres;

pub use self::in_memory_test::{
    DriverEvent, InMemoryTestDriver, InMemoryTestResponseBuilder, RecordedQuery,
};
pub use self::tokio_postgres::TokioPostgresDriver;
