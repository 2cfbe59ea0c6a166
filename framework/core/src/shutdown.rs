use std::sync::Arc;

use tokio::sync::broadcast::{error::RecvError, error::TryRecvError, Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts a single shutdown signal to every listener created from it.
///
/// Only listeners that exist when [ShutdownHandle::shutdown] is called receive the signal, so work
/// started afterwards, such as teardown hooks, is not cancelled.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.sender.send(()) {
            // Will fail if nobody is listening for a shutdown signal, in which case the log message
            // can be ignored.
            log::debug!("Failed to send shutdown signal: {e:?}");
        }
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then work
    /// should be stopped so that the scenario can shut down.
    pub fn should_shutdown(&mut self) -> bool {
        match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                // Lagged means more than one signal was sent since the last check.
                Ok(_) | Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => true,
                Err(TryRecvError::Empty) => false,
            },
            Err(_) => false,
        }
    }

    /// Wait for the shutdown signal to be received. It is safe to race this with another future so
    /// that the shutdown signal can be used to cancel other work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        let mut receiver = self.receiver.lock().await;
        loop {
            match receiver.recv().await {
                Ok(()) | Err(RecvError::Closed) => return,
                Err(RecvError::Lagged(_)) => continue,
            }
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{msg}")]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn listener_sees_shutdown() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();
        assert!(!listener.should_shutdown());

        handle.shutdown();
        assert!(listener.should_shutdown());
    }

    #[test]
    fn repeated_shutdown_is_still_seen() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        handle.shutdown();
        handle.shutdown();
        handle.shutdown();
        assert!(listener.should_shutdown());
    }

    #[test]
    fn listener_created_after_shutdown_is_not_signalled() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let mut listener = handle.new_listener();
        assert!(!listener.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_completes_after_signal() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown())
            .await
            .expect("shutdown signal was not delivered");
    }
}
