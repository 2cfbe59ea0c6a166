use anyhow::Context;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::shutdown::DelegatedShutdownListener;

/// Monitor the resource usage of the load generator and report high usage.
///
/// Note that this won't stop the test proceeding, it will just log a warning to let the user know
/// that their results might be affected. An overloaded load generator starts iterations late, which
/// shows up as slower responses from the service under test.
///
/// The CPU usage for the process is collected every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] and checked.
/// If it is above 10% with respect to the number of cores then a warning is logged.
pub(crate) fn start_monitor(mut shutdown_listener: DelegatedShutdownListener) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Monitor thread shutting down");
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                match sys.process(this_process_pid) {
                    Some(process) => {
                        let usage = (process.cpu_usage() / (cpu_count * 100) as f32) * 100.0;
                        if usage > 10.0 {
                            log::warn!("High CPU usage detected. The load generator is using {:.2}% of the CPU, with {} available cores", usage, cpu_count);
                        }
                    }
                    None => log::debug!("No process information for pid {this_process_pid}"),
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
        })
        .context("Failed to start monitor thread")?;

    Ok(())
}
