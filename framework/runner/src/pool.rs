use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::definition::AgentHookMut;
use crate::shutdown::{AgentBailError, ShutdownSignalError};

pub(crate) struct AgentHooks<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) setup: Option<AgentHookMut<RV, V>>,
    pub(crate) behaviour: Option<AgentHookMut<RV, V>>,
    pub(crate) teardown: Option<AgentHookMut<RV, V>>,
}

// Not derived, a derive would require `RV: Clone` and `V: Clone`.
impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for AgentHooks<RV, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Copy for AgentHooks<RV, V> {}

enum Work {
    Iteration(u64),
    Stop,
}

struct AgentSlot {
    agent_index: usize,
    sender: mpsc::Sender<Work>,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<AgentSlot>,
    closed: bool,
}

/// Agents that iterations are handed to as they arrive.
///
/// Each agent runs on its own thread and works through one iteration at a time. Once an iteration
/// is finished the agent puts itself back in the idle list and waits for the next one. When no agent
/// is idle a new one is started, as long as fewer than `max_agents` agents are alive. Arrivals
/// beyond that are dropped.
pub(crate) struct AgentPool<RV: UserValuesConstraint, V: UserValuesConstraint> {
    runner_context: Arc<RunnerContext<RV>>,
    hooks: AgentHooks<RV, V>,
    max_agents: usize,
    state: Arc<Mutex<PoolState>>,
    handles: Vec<JoinHandle<()>>,
    warned_insufficient_agents: bool,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentPool<RV, V> {
    pub(crate) fn new(
        runner_context: Arc<RunnerContext<RV>>,
        hooks: AgentHooks<RV, V>,
        max_agents: usize,
    ) -> Self {
        Self {
            runner_context,
            hooks,
            max_agents,
            state: Arc::new(Mutex::new(PoolState::default())),
            handles: Vec::new(),
            warned_insufficient_agents: false,
        }
    }

    /// Start `count` agents and block until each of them has finished its setup hook.
    ///
    /// Returns the number of agents that are ready to run iterations.
    pub(crate) fn start_pre_allocated(&mut self, count: usize) -> anyhow::Result<usize> {
        let (ready_sender, mut ready_receiver) = mpsc::unbounded_channel();
        for _ in 0..count.min(self.max_agents) {
            self.spawn_agent(None, Some(ready_sender.clone()))?;
        }
        drop(ready_sender);

        let mut ready = 0;
        while let Some(ok) = ready_receiver.blocking_recv() {
            if ok {
                ready += 1;
            }
        }

        Ok(ready)
    }

    /// Hand iteration `index` to an idle agent, starting a new agent if none is idle.
    pub(crate) fn dispatch(&mut self, index: u64) -> anyhow::Result<()> {
        loop {
            let Some(slot) = self.state.lock().idle.pop() else {
                break;
            };

            match slot.sender.try_send(Work::Iteration(index)) {
                Ok(()) => {
                    self.runner_context.stats().iteration_started();
                    return Ok(());
                }
                Err(_) => {
                    log::debug!("Agent {} is no longer accepting work", slot.agent_index);
                }
            }
        }

        // Retired agents no longer hold a slot.
        if self.runner_context.stats().agents_alive() < self.max_agents {
            self.runner_context.stats().iteration_started();
            return self.spawn_agent(Some(index), None);
        }

        self.runner_context.stats().iteration_dropped();
        if !self.warned_insufficient_agents {
            self.warned_insufficient_agents = true;
            log::warn!(
                "Insufficient agents, all {} agents are busy. Iterations are being dropped, consider raising --max-agents",
                self.max_agents
            );
        }

        Ok(())
    }

    /// Agents that are currently running an iteration or a hook.
    pub(crate) fn busy(&self) -> usize {
        let idle = self.state.lock().idle.len();
        self.runner_context.stats().agents_alive().saturating_sub(idle)
    }

    /// Stop idle agents now and busy agents as soon as their current iteration ends.
    pub(crate) fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };

        for slot in idle {
            if slot.sender.try_send(Work::Stop).is_err() {
                log::debug!("Agent {} has already stopped", slot.agent_index);
            }
        }
    }

    pub(crate) fn join(self) -> anyhow::Result<()> {
        for handle in self.handles {
            handle
                .join()
                .map_err(|e| anyhow::anyhow!("Error joining thread for test agent: {:?}", e))?;
        }

        Ok(())
    }

    fn spawn_agent(
        &mut self,
        first_iteration: Option<u64>,
        ready: Option<mpsc::UnboundedSender<bool>>,
    ) -> anyhow::Result<()> {
        let agent_index = self.handles.len();
        let agent_id = format!("agent-{agent_index}");
        let (sender, receiver) = mpsc::channel(1);

        let context = AgentContext::new(
            agent_id.clone(),
            self.runner_context.clone(),
            self.runner_context.shutdown_handle().new_listener(),
        );
        let worker = AgentWorker {
            agent_index,
            context,
            hooks: self.hooks,
            state: self.state.clone(),
            sender,
            receiver,
            ready,
        };

        let stats = self.runner_context.stats().clone();
        stats.agent_started();
        let handle = std::thread::Builder::new()
            .name(agent_id.clone())
            .spawn(move || worker.run(first_iteration))
            .with_context(|| format!("Failed to spawn thread for {agent_id}"));

        match handle {
            Ok(handle) => {
                self.handles.push(handle);
                Ok(())
            }
            Err(e) => {
                stats.agent_stopped();
                Err(e)
            }
        }
    }
}

struct AgentWorker<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_index: usize,
    context: AgentContext<RV, V>,
    hooks: AgentHooks<RV, V>,
    state: Arc<Mutex<PoolState>>,
    sender: mpsc::Sender<Work>,
    receiver: mpsc::Receiver<Work>,
    ready: Option<mpsc::UnboundedSender<bool>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentWorker<RV, V> {
    fn run(mut self, first_iteration: Option<u64>) {
        let stats = self.context.runner_context().stats().clone();

        if let Some(setup_agent_fn) = self.hooks.setup {
            if let Err(e) = setup_agent_fn(&mut self.context) {
                log::error!(
                    "Agent setup failed for agent {}: {:?}",
                    self.context.agent_id(),
                    e
                );
                self.signal_ready(false);
                if first_iteration.is_some() {
                    stats.iteration_failed();
                }
                stats.agent_stopped();
                return;
            }
        }

        let mut next = first_iteration;
        loop {
            let index = match next.take() {
                Some(index) => index,
                None => match self.wait_for_work() {
                    Some(index) => index,
                    None => break,
                },
            };

            if !self.run_iteration(index) {
                break;
            }
        }

        if let Some(teardown_agent_fn) = self.hooks.teardown {
            if let Err(e) = teardown_agent_fn(&mut self.context) {
                log::error!(
                    "Agent teardown failed for agent {}: {:?}",
                    self.context.agent_id(),
                    e
                );
            }
        }

        log::debug!("Stopping agent {}", self.context.agent_id());
        stats.agent_stopped();
    }

    /// Park this agent in the idle list until it is handed an iteration or told to stop.
    fn wait_for_work(&mut self) -> Option<u64> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return None;
            }
            state.idle.push(AgentSlot {
                agent_index: self.agent_index,
                sender: self.sender.clone(),
            });
        }
        self.signal_ready(true);

        match self.receiver.blocking_recv() {
            Some(Work::Iteration(index)) => Some(index),
            Some(Work::Stop) | None => None,
        }
    }

    /// Returns false when the agent should not run any more iterations.
    fn run_iteration(&mut self, index: u64) -> bool {
        let stats = self.context.runner_context().stats().clone();

        self.context.begin_iteration(index);
        let result = match self.hooks.behaviour {
            Some(behaviour) => behaviour(&mut self.context),
            None => Ok(()),
        };
        self.context.end_iteration();

        match result {
            Ok(()) => {
                stats.iteration_completed();
                true
            }
            Err(e) if e.is::<ShutdownSignalError>() => {
                stats.iteration_interrupted();
                true
            }
            Err(e) if e.is::<AgentBailError>() => {
                log::warn!("Agent {} bailed: {e}", self.context.agent_id());
                stats.iteration_failed();
                false
            }
            Err(e) => {
                log::error!("Agent behaviour failed: {:?}", e);
                stats.iteration_failed();
                true
            }
        }
    }

    fn signal_ready(&mut self, ok: bool) {
        if let Some(ready) = self.ready.take() {
            if ready.send(ok).is_err() {
                log::debug!("Nobody is waiting for agent {} to be ready", self.agent_index);
            }
        }
    }
}
