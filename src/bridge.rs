use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{PgBridgeError, Result};

/// Drives one asynchronous unit of work to completion on the calling thread.
///
/// Every blocking entry point of a connection goes through [`Bridge::run`].
/// The runtime is single-threaded; tasks spawned on it (such as the
/// tokio-postgres connection task) only make progress while a call is running.
pub struct Bridge {
    runtime: Option<Runtime>,
}

impl Bridge {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PgBridgeError::Interface(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Block until `future` resolves and return its result.
    ///
    /// Fails with [`PgBridgeError::Interface`] when called from inside an async
    /// runtime, where blocking the thread would stall or panic.
    pub fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if Handle::try_current().is_ok() {
            return Err(PgBridgeError::Interface(
                "blocking call made from within an async runtime".to_string(),
            ));
        }
        let runtime = self.runtime.as_ref().ok_or_else(|| {
            PgBridgeError::Interface("runtime has been shut down".to_string())
        })?;
        runtime.block_on(future)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // a plain drop panics when it happens inside another runtime
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").finish_non_exhaustive()
    }
}
