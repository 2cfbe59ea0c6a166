use anyhow::Context;
use conductor_client_instrumented::prelude::ConductorClient;
use conductor_load_runner::prelude::UserValuesConstraint;

use crate::context::DefaultScenarioValues;

/// Runner state for Conductor scenarios.
///
/// Scenario specific state that is shared by all agents goes in `RSV`, reachable through
/// [ConductorRunnerContext::scenario_values].
#[derive(Default, Debug)]
pub struct ConductorRunnerContext<RSV: UserValuesConstraint = DefaultScenarioValues> {
    pub(crate) client: Option<ConductorClient>,
    pub scenario_values: RSV,
}

impl<RSV: UserValuesConstraint> ConductorRunnerContext<RSV> {
    /// The client created by [crate::prelude::configure_client].
    pub fn client(&self) -> anyhow::Result<&ConductorClient> {
        self.client
            .as_ref()
            .context("Conductor client is not configured, call 'configure_client' in the scenario 'setup'")
    }
}

impl<RSV: UserValuesConstraint> UserValuesConstraint for ConductorRunnerContext<RSV> {}
