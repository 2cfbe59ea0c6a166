use std::{fmt::Debug, sync::Arc};

use conductor_load_instruments::Reporter;

use crate::executor::Executor;
use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle};
use crate::stats::RunStats;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// Identifies the iteration an agent is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationInfo {
    /// Position of this iteration in the whole scenario, starting at 0. Unique within a run.
    pub index: u64,
    /// How many iterations this agent ran before this one.
    pub agent_iteration: u64,
}

#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: Option<String>,
    stats: Arc<RunStats>,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: Option<String>,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
            stats,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The connection string passed on the command line, if any.
    pub fn get_connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    pub fn stats(&self) -> &Arc<RunStats> {
        &self.stats
    }

    pub(crate) fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    /// Stop scheduling iterations and interrupt the ones in flight.
    pub fn force_stop_scenario(&self) {
        log::info!("Scenario stop requested");
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// State owned by a single agent for its whole lifetime.
///
/// Values stored with [AgentContext::get_mut] survive between iterations. Anything that belongs to
/// one iteration should live in the behaviour function instead.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_id: String,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    iteration: Option<IterationInfo>,
    completed_iterations: u64,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        agent_id: String,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            agent_id,
            runner_context,
            shutdown_listener,
            iteration: None,
            completed_iterations: 0,
            value: Default::default(),
        }
    }

    /// A value which identifies this agent within the run, such as `agent-3`.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    /// The iteration being run, or `None` outside of the agent behaviour.
    pub fn iteration(&self) -> Option<IterationInfo> {
        self.iteration
    }

    pub(crate) fn begin_iteration(&mut self, index: u64) {
        self.iteration = Some(IterationInfo {
            index,
            agent_iteration: self.completed_iterations,
        });
    }

    pub(crate) fn end_iteration(&mut self) {
        self.iteration = None;
        self.completed_iterations += 1;
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
