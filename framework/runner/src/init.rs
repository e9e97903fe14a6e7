use crate::cli::PerfTunnelCli;
use clap::Parser;

/// Initialise the CLI and logging for the perf tunnel runner.
pub fn init() -> PerfTunnelCli {
    env_logger::init();

    PerfTunnelCli::parse()
}
