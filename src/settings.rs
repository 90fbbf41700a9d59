//! Isolation level, read-only and deferrable handling.
//!
//! [`NativeSettings`] keeps the values locally and hands them to the driver
//! when a transaction begins. [`StatementSettings`] is the fallback for drivers
//! that cannot do that: it sets session characteristics with SQL and reads them
//! back with `SHOW`.

use async_trait::async_trait;

use crate::error::{PgBridgeError, Result};
use crate::traits::{DatabaseDriver, SessionSettings};
use crate::types::{IsolationLevel, NamedParams, TransactionOptions};

/// Picks the settings implementation for a driver.
pub fn for_driver(driver: &dyn DatabaseDriver) -> Box<dyn SessionSettings> {
    if driver.supports_native_settings() {
        Box::new(NativeSettings::default())
    } else {
        Box::new(StatementSettings)
    }
}

/// Characteristics stored on the connection and applied at `BEGIN`.
///
/// Only values set explicitly are sent with `BEGIN`; anything unset keeps the
/// server's session default and is read back from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeSettings {
    isolation_level: Option<IsolationLevel>,
    read_only: Option<bool>,
    deferrable: Option<bool>,
}

#[async_trait]
impl SessionSettings for NativeSettings {
    async fn set_isolation_level(
        &mut self,
        _driver: &dyn DatabaseDriver,
        level: IsolationLevel,
    ) -> Result<()> {
        self.isolation_level = Some(level);
        Ok(())
    }

    async fn isolation_level(&self, driver: &dyn DatabaseDriver) -> Result<IsolationLevel> {
        match self.isolation_level {
            Some(level) => Ok(level),
            None => StatementSettings.isolation_level(driver).await,
        }
    }

    async fn set_readonly(&mut self, _driver: &dyn DatabaseDriver, value: bool) -> Result<()> {
        self.read_only = Some(value);
        Ok(())
    }

    async fn readonly(&self, driver: &dyn DatabaseDriver) -> Result<bool> {
        match self.read_only {
            Some(value) => Ok(value),
            None => StatementSettings.readonly(driver).await,
        }
    }

    async fn set_deferrable(&mut self, _driver: &dyn DatabaseDriver, value: bool) -> Result<()> {
        self.deferrable = Some(value);
        Ok(())
    }

    async fn deferrable(&self, driver: &dyn DatabaseDriver) -> Result<bool> {
        match self.deferrable {
            Some(value) => Ok(value),
            None => StatementSettings.deferrable(driver).await,
        }
    }

    fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            isolation_level: self.isolation_level,
            read_only: self.read_only,
            deferrable: self.deferrable,
        }
    }
}

/// Characteristics kept on the server as session defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementSettings;

impl StatementSettings {
    async fn set(driver: &dyn DatabaseDriver, mode: &str) -> Result<()> {
        let sql = format!("SET SESSION CHARACTERISTICS AS TRANSACTION {mode}");
        driver.query(&sql, &NamedParams::new()).await?;
        Ok(())
    }

    /// Runs `SHOW <setting>` and returns the single text value.
    async fn show(driver: &dyn DatabaseDriver, setting: &str) -> Result<String> {
        let result = driver
            .query(&format!("SHOW {setting}"), &NamedParams::new())
            .await?;
        let columns = result.columns.clone();
        result
            .rows
            .into_iter()
            .next()
            .map(|row| row.normalize(&columns))
            .and_then(|row| row.get(0).and_then(|v| v.as_str().map(str::to_string)))
            .ok_or_else(|| PgBridgeError::Interface(format!("SHOW {setting} returned no value")))
    }

    async fn show_bool(driver: &dyn DatabaseDriver, setting: &str) -> Result<bool> {
        let value = Self::show(driver, setting).await?;
        match value.trim().to_lowercase().as_str() {
            "on" | "true" => Ok(true),
            "off" | "false" => Ok(false),
            other => Err(PgBridgeError::Interface(format!(
                "unexpected value for {setting}: {other}"
            ))),
        }
    }
}

#[async_trait]
impl SessionSettings for StatementSettings {
    async fn set_isolation_level(
        &mut self,
        driver: &dyn DatabaseDriver,
        level: IsolationLevel,
    ) -> Result<()> {
        Self::set(driver, &format!("ISOLATION LEVEL {}", level.as_sql())).await
    }

    async fn isolation_level(&self, driver: &dyn DatabaseDriver) -> Result<IsolationLevel> {
        Self::show(driver, "transaction_isolation").await?.parse()
    }

    async fn set_readonly(&mut self, driver: &dyn DatabaseDriver, value: bool) -> Result<()> {
        Self::set(driver, if value { "READ ONLY" } else { "READ WRITE" }).await
    }

    async fn readonly(&self, driver: &dyn DatabaseDriver) -> Result<bool> {
        Self::show_bool(driver, "transaction_read_only").await
    }

    async fn set_deferrable(&mut self, driver: &dyn DatabaseDriver, value: bool) -> Result<()> {
        Self::set(driver, if value { "DEFERRABLE" } else { "NOT DEFERRABLE" }).await
    }

    async fn deferrable(&self, driver: &dyn DatabaseDriver) -> Result<bool> {
        Self::show_bool(driver, "transaction_deferrable").await
    }

    fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions::default()
    }
}
