use async_trait::async_trait;

use crate::error::Result;
use crate::traits::DatabaseDriver;
use crate::types::{IsolationLevel, TransactionOptions};

/// Access to the isolation level, read-only and deferrable characteristics
/// of a connection.
///
/// One implementation is chosen per connection, depending on whether the
/// driver can apply the characteristics natively.
#[async_trait]
pub trait SessionSettings: Send + Sync {
    async fn set_isolation_level(
        &mut self,
        driver: &dyn DatabaseDriver,
        level: IsolationLevel,
    ) -> Result<()>;

    async fn isolation_level(&self, driver: &dyn DatabaseDriver) -> Result<IsolationLevel>;

    async fn set_readonly(&mut self, driver: &dyn DatabaseDriver, value: bool) -> Result<()>;

    async fn readonly(&self, driver: &dyn DatabaseDriver) -> Result<bool>;

    async fn set_deferrable(&mut self, driver: &dyn DatabaseDriver, value: bool) -> Result<()>;

    async fn deferrable(&self, driver: &dyn DatabaseDriver) -> Result<bool>;

    /// Options to pass along when the next transaction begins.
    fn transaction_options(&self) -> TransactionOptions;
}
