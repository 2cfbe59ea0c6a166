use std::time::Duration;

use anyhow::bail;
use tokio::time::MissedTickBehavior;

/// A constant-arrival-rate load pattern.
///
/// `rate` iterations are started every `time_unit`, no matter how long earlier iterations take to
/// finish. Each iteration runs on an agent; agents are started ahead of time up to
/// `pre_allocated_agents` and on demand up to `max_agents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalRate {
    pub rate: u32,
    pub time_unit: Duration,
    /// How long to keep starting iterations. `None` runs until the scenario is stopped.
    pub duration: Option<Duration>,
    pub pre_allocated_agents: usize,
    /// Upper bound on the number of agents alive at the same time. An agent that retires, after a
    /// bail or a failed setup, frees its slot for a new agent.
    pub max_agents: usize,
    /// How long in-flight iterations may keep running after the last arrival.
    pub graceful_stop: Duration,
}

impl Default for ArrivalRate {
    fn default() -> Self {
        Self {
            rate: 1,
            time_unit: Duration::from_secs(1),
            duration: None,
            pre_allocated_agents: 1,
            max_agents: 100,
            graceful_stop: Duration::from_secs(30),
        }
    }
}

impl ArrivalRate {
    /// Time between two consecutive arrivals.
    pub fn interval(&self) -> Duration {
        self.time_unit / self.rate.max(1)
    }

    /// The number of iterations that will be started over the configured duration.
    pub fn planned_iterations(&self) -> Option<u64> {
        self.duration.map(|duration| {
            (duration.as_nanos() * self.rate as u128 / self.time_unit.as_nanos().max(1)) as u64
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rate == 0 {
            bail!("The arrival rate must be greater than 0");
        }
        if self.time_unit.is_zero() {
            bail!("The arrival time unit must be greater than 0");
        }
        if self.interval().is_zero() {
            bail!(
                "An arrival rate of {} per {:?} is too high to schedule",
                self.rate,
                self.time_unit
            );
        }
        if self.max_agents == 0 {
            bail!("At least one agent is required to run iterations");
        }
        if self.pre_allocated_agents > self.max_agents {
            bail!(
                "Cannot pre-allocate {} agents with a maximum of {}",
                self.pre_allocated_agents,
                self.max_agents
            );
        }

        Ok(())
    }
}

/// Start iterations at a constant rate by calling `dispatch` with each iteration index.
///
/// Iteration `i` is dispatched at `start + i * interval`. Ticks missed because `dispatch` was slow
/// are fired back to back so that the overall rate is held. Returns the number of arrivals.
pub(crate) async fn schedule_arrivals<F>(arrival: ArrivalRate, mut dispatch: F) -> anyhow::Result<u64>
where
    F: FnMut(u64) -> anyhow::Result<()>,
{
    let planned = arrival.planned_iterations();
    let mut ticker = tokio::time::interval(arrival.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut issued = 0;
    while planned.map_or(true, |planned| issued < planned) {
        ticker.tick().await;
        dispatch(issued)?;
        issued += 1;
    }

    Ok(issued)
}
