//! AsyncBridge - drive async driver and orchestration calls from hook call sites.
//!
//! Hooks are plain synchronous methods. Browser and orchestration calls are
//! futures. The bridge owns at most one current-thread runtime, created on
//! first use and reused for every later call, so all page operations are
//! serialized on a single event loop.
//!
//! ```text
//! HookScheduler::step_end()            (sync)
//!         │
//!         ▼
//! AsyncBridge::run(capture(page, tag))
//!         │  block_on + timeout
//!         ▼
//! Page::screenshot().await             (async)
//! ```

use crate::result::{AcceptanceError, AcceptanceResult};
use std::cell::OnceCell;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

/// Bridge from synchronous hooks to asynchronous operations
pub struct AsyncBridge {
    runtime: OnceCell<Runtime>,
    default_timeout: Duration,
}

impl fmt::Debug for AsyncBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncBridge")
            .field("has_runtime", &self.has_runtime())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl AsyncBridge {
    /// Create a bridge; no runtime exists until the first call
    #[must_use]
    pub const fn new(default_timeout: Duration) -> Self {
        Self {
            runtime: OnceCell::new(),
            default_timeout,
        }
    }

    /// Default timeout applied by [`AsyncBridge::run`]
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Whether the runtime has been created
    #[must_use]
    pub fn has_runtime(&self) -> bool {
        self.runtime.get().is_some()
    }

    /// Run `op` to completion under the default timeout
    pub fn run<F, T>(&self, op: F) -> AcceptanceResult<T>
    where
        F: Future<Output = AcceptanceResult<T>>,
    {
        self.run_for(self.default_timeout, op)
    }

    /// Run `op` to completion under an explicit timeout.
    ///
    /// Refuses with [`AcceptanceError::InvalidState`] when called from inside
    /// a running runtime: blocking there would nest a second event loop.
    pub fn run_for<F, T>(&self, timeout: Duration, op: F) -> AcceptanceResult<T>
    where
        F: Future<Output = AcceptanceResult<T>>,
    {
        if Handle::try_current().is_ok() {
            return Err(AcceptanceError::invalid_state(
                "AsyncBridge called from inside a running event loop",
            ));
        }
        let runtime = self.runtime()?;
        runtime.block_on(async move {
            match tokio::time::timeout(timeout, op).await {
                Ok(result) => result,
                Err(_) => Err(AcceptanceError::Timeout {
                    ms: timeout.as_millis() as u64,
                }),
            }
        })
    }

    fn runtime(&self) -> AcceptanceResult<&Runtime> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AcceptanceError::session_init(format!("cannot create runtime: {e}")))?;
        tracing::debug!("async bridge runtime created");
        let _ = self.runtime.set(runtime);
        self.runtime
            .get()
            .ok_or_else(|| AcceptanceError::invalid_state("runtime not initialized"))
    }
}

impl Default for AsyncBridge {
    fn default() -> Self {
        Self::new(Duration::from_millis(30_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_created_lazily() {
        let bridge = AsyncBridge::default();
        assert!(!bridge.has_runtime());
        let value = bridge.run(async { Ok(41 + 1) }).unwrap();
        assert_eq!(value, 42);
        assert!(bridge.has_runtime());
    }

    #[test]
    fn test_runtime_reused_across_calls() {
        let bridge = AsyncBridge::default();
        let task = bridge.run(async { Ok(tokio::spawn(async { 7 })) }).unwrap();
        let value = bridge
            .run(async move { task.await.map_err(|e| AcceptanceError::page(e.to_string())) })
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_error_propagates() {
        let bridge = AsyncBridge::default();
        let err = bridge
            .run(async { Err::<(), _>(AcceptanceError::page("element not found")) })
            .unwrap_err();
        assert!(err.to_string().contains("element not found"));
    }

    #[test]
    fn test_timeout_surfaces_as_error() {
        let bridge = AsyncBridge::default();
        let err = bridge
            .run_for(Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, AcceptanceError::Timeout { ms: 10 }));
    }

    #[test]
    fn test_usable_after_timeout() {
        let bridge = AsyncBridge::new(Duration::from_millis(10));
        let _ = bridge.run(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });
        assert_eq!(bridge.run(async { Ok("ok") }).unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_refuses_nested_loop() {
        let bridge = AsyncBridge::default();
        let err = bridge.run(async { Ok(()) }).unwrap_err();
        assert!(matches!(err, AcceptanceError::InvalidState { .. }));
        assert!(!bridge.has_runtime());
    }
}
