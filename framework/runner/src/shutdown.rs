use perf_tunnel_core::prelude::CancelHandle;
use tokio::signal;

/// Cancel the run on Ctrl-C. Executions that are already running are allowed to finish.
pub(crate) fn start_cancel_listener(runtime: &tokio::runtime::Runtime) -> CancelHandle {
    let handle = CancelHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                log::warn!(
                    "Received stop signal, finishing running scenarios and cancelling the rest..."
                );
                listener_handle.cancel();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {:?}", e),
        }
    });

    handle
}
