use tokio::signal;

pub(crate) use conductor_load_core::prelude::{
    AgentBailError, DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError,
};

/// Broadcast a shutdown when the process receives Ctrl-C.
pub(crate) fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                listener_handle.shutdown();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e:?}"),
        }
    });

    Ok(handle)
}
