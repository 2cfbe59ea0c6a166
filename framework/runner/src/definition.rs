use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;

use crate::arrival::ArrivalRate;
use crate::cli::{ConductorLoadScenarioCli, ReporterOpt};
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::init::init;
use crate::pool::AgentHooks;

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: ConductorLoadScenarioCli,
    default_duration_s: Option<u64>,
    default_arrival: ArrivalRate,
    /// Environment variables whose values are recorded in the run summary.
    capture_env: HashSet<String>,
    /// Global setup hook for this scenario. It will be run once, before any agents are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for an agent, which will be run once for each agent as it starts.
    ///
    /// Pre-allocated agents all finish this hook before the first iteration is scheduled. Agents
    /// started on demand run it just before their first iteration.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The behaviour run once per iteration.
    agent_behaviour: Option<AgentHookMut<RV, V>>,
    /// Teardown hook for an agent, run once when the agent stops.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run once after every agent has stopped. This is best effort and
    /// errors are logged rather than failing the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) arrival: ArrivalRate,
    pub(crate) connection_string: Option<String>,
    pub(crate) no_progress: bool,
    pub(crate) reporter: ReporterOpt,
    pub(crate) run_id: Option<String>,
    pub(crate) summary_path: Option<PathBuf>,
    pub(crate) capture_env: HashSet<String>,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) agent_hooks: AgentHooks<RV, V>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and parsed command line
    /// arguments. See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: ConductorLoadScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_duration_s: None,
            default_arrival: ArrivalRate::default(),
            capture_env: HashSet::new(),
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: None,
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Initialise logging, parse the command line and create a new scenario definition.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, init())
    }

    /// How long to start iterations for when `--duration` is not given.
    pub fn with_default_duration_s(mut self, duration: u64) -> Self {
        self.default_duration_s = Some(duration);
        self
    }

    /// Start `rate` iterations every `time_unit` unless overridden on the command line.
    pub fn with_default_rate(mut self, rate: u32, time_unit: Duration) -> Self {
        self.default_arrival.rate = rate;
        self.default_arrival.time_unit = time_unit;
        self
    }

    pub fn with_default_agents(mut self, pre_allocated: usize, max: usize) -> Self {
        self.default_arrival.pre_allocated_agents = pre_allocated;
        self.default_arrival.max_agents = max;
        self
    }

    pub fn with_default_graceful_stop_s(mut self, graceful_stop: u64) -> Self {
        self.default_arrival.graceful_stop = Duration::from_secs(graceful_stop);
        self
    }

    /// Record the value of this environment variable in the run summary, if it is set.
    pub fn add_capture_env(mut self, key: &str) -> Self {
        self.capture_env.insert(key.to_string());
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the agent setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the agent behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_agent_behaviour(mut self, behaviour: AgentHookMut<RV, V>) -> Self {
        if self.agent_behaviour.is_some() {
            panic!("Agent behaviour is already defined");
        }

        self.agent_behaviour = Some(behaviour);
        self
    }

    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let cli = self.cli;

        let duration_s = if cli.soak {
            None
        } else {
            match cli.duration.or(self.default_duration_s) {
                Some(duration) => Some(duration),
                None => bail!(
                    "No duration set for scenario {}, use --duration or run with --soak",
                    self.name
                ),
            }
        };

        let max_agents = cli.max_agents.unwrap_or(self.default_arrival.max_agents);
        let pre_allocated_agents = match cli.pre_allocated_agents {
            Some(pre_allocated) => pre_allocated,
            // Only an explicit value may exceed the maximum, and that is rejected below.
            None => self.default_arrival.pre_allocated_agents.min(max_agents),
        };

        let arrival = ArrivalRate {
            rate: cli.rate.unwrap_or(self.default_arrival.rate),
            time_unit: cli
                .time_unit_ms
                .map(Duration::from_millis)
                .unwrap_or(self.default_arrival.time_unit),
            duration: duration_s.map(Duration::from_secs),
            pre_allocated_agents,
            max_agents,
            graceful_stop: cli
                .graceful_stop
                .map(Duration::from_secs)
                .unwrap_or(self.default_arrival.graceful_stop),
        };
        arrival.validate()?;

        Ok(ScenarioDefinition {
            name: self.name,
            arrival,
            connection_string: cli.connection_string,
            no_progress: cli.no_progress,
            reporter: cli.reporter,
            run_id: cli.run_id,
            summary_path: cli.summary_path,
            capture_env: self.capture_env,
            setup_fn: self.setup_fn,
            agent_hooks: AgentHooks {
                setup: self.setup_agent_fn,
                behaviour: self.agent_behaviour,
                teardown: self.teardown_agent_fn,
            },
            teardown_fn: self.teardown_fn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Default, Debug)]
    struct NoValues;

    impl UserValuesConstraint for NoValues {}

    fn cli(args: &[&str]) -> ConductorLoadScenarioCli {
        ConductorLoadScenarioCli::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
            .unwrap()
    }

    fn builder(args: &[&str]) -> ScenarioDefinitionBuilder<NoValues, NoValues> {
        ScenarioDefinitionBuilder::new("test", cli(args))
    }

    #[test]
    fn defaults_apply_without_flags() {
        let definition = builder(&[])
            .with_default_duration_s(120)
            .with_default_rate(50, Duration::from_secs(1))
            .with_default_agents(10_000, 10_000)
            .build()
            .unwrap();

        assert_eq!(definition.arrival.rate, 50);
        assert_eq!(definition.arrival.duration, Some(Duration::from_secs(120)));
        assert_eq!(definition.arrival.pre_allocated_agents, 10_000);
        assert_eq!(definition.arrival.max_agents, 10_000);
        assert_eq!(definition.arrival.planned_iterations(), Some(6_000));
    }

    #[test]
    fn flags_override_defaults() {
        let definition = builder(&["--rate", "5", "--duration", "10", "--max-agents", "20"])
            .with_default_duration_s(120)
            .with_default_rate(50, Duration::from_secs(1))
            .with_default_agents(10_000, 10_000)
            .build()
            .unwrap();

        assert_eq!(definition.arrival.rate, 5);
        assert_eq!(definition.arrival.duration, Some(Duration::from_secs(10)));
        assert_eq!(definition.arrival.max_agents, 20);
        // The default pre-allocation is clamped to the lower maximum.
        assert_eq!(definition.arrival.pre_allocated_agents, 20);
    }

    #[test]
    fn soak_ignores_duration() {
        let definition = builder(&["--soak"])
            .with_default_duration_s(120)
            .build()
            .unwrap();

        assert_eq!(definition.arrival.duration, None);
    }

    #[test]
    fn missing_duration_is_an_error() {
        let result = builder(&[]).build();

        assert!(result.is_err());
    }

    #[test]
    fn explicit_pre_allocation_above_maximum_is_an_error() {
        let result = builder(&["--pre-allocated-agents", "10", "--max-agents", "5"])
            .with_default_duration_s(1)
            .build();

        assert!(result.is_err());
    }
}
