use std::cmp::min;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

use crate::shutdown::DelegatedShutdownListener;
use crate::stats::RunStats;

/// Displays a progress bar while the test is running to show the user how long is left and how
/// many iterations have finished.
pub(crate) fn start_progress(
    planned_runtime: Duration,
    planned_iterations: Option<u64>,
    stats: Arc<RunStats>,
    mut shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}] {msg}",
    )
    .context("Failed to set progress style")?
    .with_key("planned_runtime", {
        let hours = planned_runtime.as_secs() / 3600;
        let minutes = (planned_runtime.as_secs() % 3600) / 60;
        let seconds = planned_runtime.as_secs() % 60;
        move |_state: &ProgressState, w: &mut dyn Write| {
            // Writing to the progress bar's buffer does not fail.
            let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
        }
    })
    .progress_chars("#>-");

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(style);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let iterations = stats.iterations();
                let finished = iterations.completed + iterations.failed + iterations.interrupted;
                match planned_iterations {
                    Some(planned) => pb.set_message(format!("{finished}/{planned} iterations")),
                    None => pb.set_message(format!("{finished} iterations")),
                }

                let new = min(start_time.elapsed().as_secs(), planned_runtime.as_secs());
                pb.set_position(new);
                std::thread::sleep(Duration::from_secs(1));
            }
        })
        .context("Failed to start progress thread")?;

    Ok(())
}
