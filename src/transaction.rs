use crate::error::Result;
use crate::traits::DatabaseDriver;
use crate::types::TransactionOptions;

/// Whether a connection currently has an open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    None,
    Active,
}

/// Opens a transaction lazily and ends it exactly once.
///
/// There is no autocommit and no nesting: every statement runs inside the
/// current transaction until the caller commits or rolls back, and asking to
/// begin while one is active does nothing.
#[derive(Debug, Default)]
pub struct TransactionController {
    state: TransactionState,
}

impl TransactionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Begins a transaction unless one is already active.
    /// Returns whether a new transaction was started.
    pub async fn ensure_started(
        &mut self,
        driver: &dyn DatabaseDriver,
        options: &TransactionOptions,
    ) -> Result<bool> {
        if self.is_active() {
            return Ok(false);
        }
        driver.begin(options).await?;
        self.state = TransactionState::Active;
        tracing::debug!(begin = %options.begin_statement(), "transaction started");
        Ok(true)
    }

    /// Commits the active transaction; a no-op when none is active.
    ///
    /// The handle is cleared even if the driver fails.
    pub async fn commit(&mut self, driver: &dyn DatabaseDriver) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.state = TransactionState::None;
        driver.commit().await?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Rolls back the active transaction; a no-op when none is active.
    pub async fn rollback(&mut self, driver: &dyn DatabaseDriver) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.state = TransactionState::None;
        driver.rollback().await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{DriverEvent, InMemoryTestDriver};

    #[tokio::test]
    async fn test_begin_is_lazy_and_idempotent() {
        let driver = InMemoryTestDriver::new();
        let mut controller = TransactionController::new();
        assert_eq!(controller.state(), TransactionState::None);

        let options = TransactionOptions::default();
        assert!(controller.ensure_started(&driver, &options).await.unwrap());
        assert!(!controller.ensure_started(&driver, &options).await.unwrap());
        assert!(controller.is_active());
        assert_eq!(driver.events(), vec![DriverEvent::Begin(options)]);
    }

    #[tokio::test]
    async fn test_commit_and_rollback_without_transaction_are_noops() {
        let driver = InMemoryTestDriver::new();
        let mut controller = TransactionController::new();
        controller.commit(&driver).await.unwrap();
        controller.rollback(&driver).await.unwrap();
        assert!(driver.events().is_empty());
        assert_eq!(controller.state(), TransactionState::None);
    }

    #[tokio::test]
    async fn test_commit_ends_transaction() {
        let driver = InMemoryTestDriver::new();
        let mut controller = TransactionController::new();
        let options = TransactionOptions::default();
        controller.ensure_started(&driver, &options).await.unwrap();
        controller.commit(&driver).await.unwrap();
        controller.commit(&driver).await.unwrap();
        assert_eq!(
            driver.events(),
            vec![DriverEvent::Begin(options), DriverEvent::Commit]
        );
    }

    #[tokio::test]
    async fn test_failed_commit_still_clears_handle() {
        let driver = InMemoryTestDriver::new().fail_commit("could not serialize access");
        let mut controller = TransactionController::new();
        controller
            .ensure_started(&driver, &TransactionOptions::default())
            .await
            .unwrap();
        assert!(controller.commit(&driver).await.is_err());
        assert_eq!(controller.state(), TransactionState::None);
    }
}
