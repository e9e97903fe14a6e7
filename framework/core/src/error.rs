/// Returned when a worker can no longer run anything, for example because the process launcher it
/// relies on has disappeared.
///
/// This is not fatal to the run. The coordinator marks the worker's remaining scenarios as failed
/// and carries on with the other workers.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Runner {worker_id} failed: {msg}")]
pub struct RunnerFailureError {
    worker_id: String,
    msg: String,
}

impl RunnerFailureError {
    pub fn new(worker_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            msg: msg.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}
