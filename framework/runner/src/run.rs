use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use conductor_load_instruments::ReportMetric;
use conductor_load_summary_model::{append_run_summary, ArrivalSummary, CheckCounts, RunSummary};

use crate::arrival::schedule_arrivals;
use crate::monitor::start_monitor;
use crate::pool::AgentPool;
use crate::progress::start_progress;
use crate::stats::RunStats;
use crate::{
    context::{RunnerContext, UserValuesConstraint},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::{start_shutdown_listener, ShutdownHandle, ShutdownSignalError},
};

const GRACEFUL_STOP_POLL: Duration = Duration::from_millis(100);
const GRACEFUL_STOP_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Run a scenario to completion and return a summary of the run.
///
/// Iterations are started at the configured arrival rate until the duration has elapsed, or until
/// the scenario is stopped when running as a soak test. Iterations still running at that point get
/// the graceful stop period to finish before they are interrupted.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;
    let arrival = definition.arrival;

    let run_id = definition
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());
    let started_at = chrono::Utc::now().timestamp();

    log::info!("Running scenario: {} ({})", definition.name, run_id);
    log::info!(
        "Starting {} iterations per {:?} with {} pre-allocated and at most {} agents",
        arrival.rate,
        arrival.time_unit,
        arrival.pre_allocated_agents,
        arrival.max_agents
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(definition.reporter.report_config().init());
    let stats = Arc::new(RunStats::default());
    let mut runner_context = RunnerContext::new(
        executor,
        reporter,
        shutdown_handle.clone(),
        definition.connection_string.clone(),
        stats.clone(),
    );

    if let Some(setup_fn) = definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let runner_context = Arc::new(runner_context);

    // Ready to start spawning agents so start the resource monitor to report high usage by agents
    // which might lead to a misleading outcome.
    start_monitor(shutdown_handle.new_listener())?;

    let mut pool = AgentPool::new(
        runner_context.clone(),
        definition.agent_hooks,
        arrival.max_agents,
    );
    let ready = match pool.start_pre_allocated(arrival.pre_allocated_agents) {
        Ok(ready) => ready,
        Err(e) => {
            shutdown_handle.shutdown();
            stop_agents(pool, &shutdown_handle)?;
            return Err(e);
        }
    };
    log::info!(
        "{} of {} pre-allocated agents are ready",
        ready,
        arrival.pre_allocated_agents
    );

    if let Some(duration) = arrival.duration {
        if !definition.no_progress {
            start_progress(
                duration,
                arrival.planned_iterations(),
                stats.clone(),
                shutdown_handle.new_listener(),
            )?;
        }
    }

    // Created before scheduling so that a stop requested while scheduling also skips the wait.
    let mut wait_listener = shutdown_handle.new_listener();

    let scheduled = runner_context
        .executor()
        .execute_in_place(schedule_arrivals(arrival, |index| pool.dispatch(index)));
    match scheduled {
        Ok(count) => log::info!("Finished scheduling {count} iterations"),
        Err(e) if e.is::<ShutdownSignalError>() => {
            log::info!("Scenario stopped before all iterations were scheduled");
        }
        Err(e) => {
            shutdown_handle.shutdown();
            stop_agents(pool, &shutdown_handle)?;
            return Err(e);
        }
    }

    let graceful_deadline = Instant::now() + arrival.graceful_stop;
    let mut last_logged = Instant::now();
    while pool.busy() > 0 && Instant::now() < graceful_deadline {
        if wait_listener.should_shutdown() {
            break;
        }

        if last_logged.elapsed() >= GRACEFUL_STOP_LOG_INTERVAL {
            log::info!("Waiting for {} iterations to complete...", pool.busy());
            last_logged = Instant::now();
        }

        std::thread::sleep(GRACEFUL_STOP_POLL);
    }

    pool.close();
    let still_busy = pool.busy();
    if still_busy > 0 {
        log::warn!(
            "Interrupting {} iterations still running after the graceful stop period of {:?}",
            still_busy,
            arrival.graceful_stop
        );
        shutdown_handle.shutdown();
    }

    stop_agents(pool, &shutdown_handle)?;

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    let iterations = stats.iterations();
    let reporter = runner_context.reporter();
    reporter.add_custom(
        ReportMetric::new("iterations")
            .with_field("started", iterations.started)
            .with_field("completed", iterations.completed)
            .with_field("failed", iterations.failed)
            .with_field("interrupted", iterations.interrupted),
    );
    reporter.add_custom(ReportMetric::new("dropped_iterations").with_field("count", iterations.dropped));
    reporter.add_custom(ReportMetric::new("agents").with_field("started", stats.agents_started()));
    reporter.finalize();

    if iterations.dropped > 0 {
        log::warn!(
            "{} iterations were dropped because no agent was available",
            iterations.dropped
        );
    }

    let mut summary = RunSummary::new(
        run_id,
        definition.name,
        started_at,
        arrival.duration.map(|d| d.as_secs()),
        ArrivalSummary {
            rate: arrival.rate,
            time_unit_ms: arrival.time_unit.as_millis() as u64,
            pre_allocated_agents: arrival.pre_allocated_agents,
            max_agents: arrival.max_agents,
        },
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.set_agent_count(stats.agents_started());
    summary.set_iterations(iterations);
    for (name, totals) in reporter.check_totals() {
        summary.add_check(
            name,
            CheckCounts {
                passes: totals.passes,
                fails: totals.fails,
            },
        );
    }
    for key in &definition.capture_env {
        if let Ok(value) = std::env::var(key) {
            summary.add_env(key.clone(), value);
        }
    }

    if let Some(path) = &definition.summary_path {
        append_run_summary(&summary, path)
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
    }

    Ok(summary)
}

/// Wait for every agent to exit, then signal the background threads to stop.
fn stop_agents<RV: UserValuesConstraint, V: UserValuesConstraint>(
    pool: AgentPool<RV, V>,
    shutdown_handle: &ShutdownHandle,
) -> anyhow::Result<()> {
    pool.close();
    let joined = pool.join();
    shutdown_handle.shutdown();
    joined
}
