use std::future::Future;
use std::time::Duration;

use crate::shutdown::{ShutdownHandle, ShutdownSignalError};

/// Gives agents, which run on their own threads, access to the shared Tokio runtime.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the runner is shutdown. You do not need to do anything
    /// special to handle this, but you should be aware that submitting a future which does not support
    /// cancelling may prevent the runner from shutting down.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Pause the calling agent without holding up any other agent.
    ///
    /// Returns a [ShutdownSignalError] if the runner shuts down during the pause.
    pub fn sleep(&self, duration: Duration) -> anyhow::Result<()> {
        if duration.is_zero() {
            return Ok(());
        }

        self.execute_in_place(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// Note that the future will not be cancelled if the runner is shutdown. It is also not guaranteed
    /// that the runner will wait for the future to complete before shutting down.
    ///
    /// In agent behaviour hooks, you should use [Executor::execute_in_place] instead of [Executor::spawn]
    /// to ensure that your future completes before the behaviour completes and is scheduled again.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> (Executor, ShutdownHandle) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let handle = ShutdownHandle::new();
        (Executor::new(runtime, handle.clone()), handle)
    }

    #[test]
    fn execute_in_place_returns_future_output() {
        let (executor, _handle) = executor();
        let value = executor.execute_in_place(async { Ok(21 * 2) }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn shutdown_cancels_work_in_place() {
        let (executor, handle) = executor();

        let trigger = handle.clone();
        executor.spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.shutdown();
        });

        let err = executor.sleep(Duration::from_secs(60)).unwrap_err();
        assert!(err.is::<ShutdownSignalError>());
    }
}
