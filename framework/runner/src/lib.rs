mod cli;
mod config;
mod coordinator;
mod distributions;
mod executor;
mod history;
mod init;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod test_runner;
mod work_unit;
mod worker;

pub mod prelude {
    pub use crate::cli::{Command, PerfTunnelCli, RunArgs};
    pub use crate::config::{ChecksMode, FileConfig, PerfConfig, Profile};
    pub use crate::coordinator::{
        assign, stable_hash, Coordinator, RunOutcome, RESULTS_FILE, RUN_SUMMARY_FILE,
        SCENARIO_LIST_FILE,
    };
    pub use crate::distributions::DistributionResolver;
    pub use crate::executor::Executor;
    pub use crate::history::ResultStore;
    pub use crate::init::init;
    pub use crate::run::{load_scenarios, run, samples_for_run};
    pub use crate::test_runner::{
        execution_dir, ChildEnvironment, CommandTemplate, RunnerError, TestRunner,
        TestRunnerSettings,
    };
    pub use crate::work_unit::{register_work_units, work_units, BuildEngine, WorkUnit};
    pub use crate::worker::{process_workers, ProcessWorker, Worker, WorkerSpec};
}
