use anyhow::Context;
use conductor_client_instrumented::prelude::ConductorClient;
use conductor_load_runner::prelude::UserValuesConstraint;

/// Scenario values for scenarios that don't keep any state of their own.
#[derive(Default, Debug)]
pub struct DefaultScenarioValues;

impl UserValuesConstraint for DefaultScenarioValues {}

/// Agent state for Conductor scenarios.
///
/// Scenario specific state goes in `SV`, reachable through [ConductorAgentContext::scenario_values].
#[derive(Default, Debug)]
pub struct ConductorAgentContext<SV: UserValuesConstraint = DefaultScenarioValues> {
    pub(crate) client: Option<ConductorClient>,
    pub scenario_values: SV,
}

impl<SV: UserValuesConstraint> ConductorAgentContext<SV> {
    /// The client handed to this agent by [crate::prelude::use_runner_client].
    pub fn client(&self) -> anyhow::Result<&ConductorClient> {
        self.client
            .as_ref()
            .context("Agent has no Conductor client, call 'use_runner_client' in the 'agent_setup'")
    }
}

impl<SV: UserValuesConstraint> UserValuesConstraint for ConductorAgentContext<SV> {}
