use std::future::Future;

use anyhow::Context;
use perf_tunnel_core::prelude::CancelHandle;

use crate::shutdown::start_cancel_listener;

/// Owns the Tokio runtime that test processes are driven from.
///
/// Workers run on their own OS threads and block on the runtime for each execution, so that one
/// runtime serves every worker.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    cancel_handle: CancelHandle,
}

impl Executor {
    pub fn new(runtime: tokio::runtime::Runtime, cancel_handle: CancelHandle) -> Self {
        Self {
            runtime,
            cancel_handle,
        }
    }

    /// Create a runtime whose [CancelHandle] is triggered by Ctrl-C.
    pub fn with_ctrl_c() -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        let cancel_handle = start_cancel_listener(&runtime);
        Ok(Self::new(runtime, cancel_handle))
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Unlike a shutdown, cancelling the run does not interrupt the future. An execution that has
    /// started is always measured to the end.
    pub fn execute_in_place<T>(&self, fut: impl Future<Output = T>) -> T {
        self.runtime.block_on(fut)
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel_handle
    }
}
