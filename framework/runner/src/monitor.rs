use std::time::{Duration, Instant};

use perf_tunnel_core::prelude::CancelListener;
use sysinfo::System;

/// Default host CPU load, in percent, above which a warning is logged
pub const DEFAULT_CPU_WARN_THRESHOLD: f32 = 90.0;

const WARN_INTERVAL: Duration = Duration::from_secs(30);

/// Monitor the CPU load of the host while workers run and report high usage.
///
/// This won't stop the run, it only lets the user know that measurements may be skewed by other
/// load on the machine. The load is sampled every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] and at
/// most one warning is logged per 30 seconds.
pub(crate) fn start_monitor(threshold: f32, mut stop_listener: CancelListener) {
    let spawned = std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let mut sys = System::new();
            sys.refresh_cpu_usage();
            let cpu_count = sys.cpus().len();
            let mut last_warning: Option<Instant> = None;

            loop {
                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
                if stop_listener.should_stop() {
                    log::trace!("Monitor thread stopping");
                    break;
                }

                sys.refresh_cpu_usage();
                let usage = sys.global_cpu_usage();
                if usage > threshold && last_warning.map_or(true, |at| at.elapsed() > WARN_INTERVAL)
                {
                    log::warn!(
                        "High CPU load detected. The host is at {:.2}% across {} cores, results may be affected",
                        usage,
                        cpu_count
                    );
                    last_warning = Some(Instant::now());
                }
            }
        });

    if let Err(e) = spawned {
        log::warn!("Failed to start monitor thread: {:?}", e);
    }
}
