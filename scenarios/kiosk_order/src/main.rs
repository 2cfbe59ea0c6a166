mod order;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use conductor_scenario_runner::prelude::*;

use crate::order::{run_order_iteration, KioskOrderConfig};

#[derive(Debug, Default)]
pub struct ScenarioValues {
    config: Option<Arc<KioskOrderConfig>>,
}

impl UserValuesConstraint for ScenarioValues {}

type KioskRunnerContext = RunnerContext<ConductorRunnerContext<ScenarioValues>>;

type KioskAgentContext =
    AgentContext<ConductorRunnerContext<ScenarioValues>, ConductorAgentContext<ScenarioValues>>;

fn setup(ctx: &mut KioskRunnerContext) -> HookResult {
    let config = Arc::new(KioskOrderConfig::from_env()?);
    log::info!("Scenario configuration: {config:?}");

    configure_client(ctx, config.http1_only)?;

    if let Some(path) = &config.workflow_definition {
        publish_workflow_from_file(ctx, path)?;
    }

    if config.cleanup {
        let terminated = cleanup_running_workflows(ctx)?;
        log::info!("Terminated {terminated} running workflows before starting");
    }

    ctx.get_mut().scenario_values.config = Some(config);

    Ok(())
}

fn agent_setup(ctx: &mut KioskAgentContext) -> HookResult {
    use_runner_client(ctx)?;
    let config = ctx
        .runner_context()
        .get()
        .scenario_values
        .config
        .clone()
        .context("Scenario configuration missing, was the scenario set up?")?;
    ctx.get_mut().scenario_values.config = Some(config);

    Ok(())
}

fn agent_behaviour(ctx: &mut KioskAgentContext) -> HookResult {
    let iteration = ctx
        .iteration()
        .context("Agent behaviour called outside of an iteration")?;
    let client = ctx.get().client()?.clone();
    let config = ctx
        .get()
        .scenario_values
        .config
        .clone()
        .context("Scenario configuration missing, was the agent set up?")?;
    let reporter = ctx.runner_context().reporter();

    ctx.runner_context()
        .executor()
        .execute_in_place(async move {
            run_order_iteration(&client, &reporter, &config, iteration.index).await
        })?;

    Ok(())
}

fn main() -> ConductorLoadResult<()> {
    let builder = ScenarioDefinitionBuilder::<
        ConductorRunnerContext<ScenarioValues>,
        ConductorAgentContext<ScenarioValues>,
    >::new_with_init(env!("CARGO_PKG_NAME"))
    .with_default_duration_s(120)
    .with_default_rate(50, Duration::from_secs(1))
    .with_default_agents(10_000, 10_000)
    .add_capture_env(order::ENV_API_TEST_URI)
    .add_capture_env(order::ENV_SIGNAL_PAUSE_MS)
    .add_capture_env(order::ENV_MISSING_WORKFLOW_ID)
    .add_capture_env(order::ENV_HTTP1_ONLY)
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(agent_behaviour);

    let summary = run(builder)?;

    let failed_checks: u64 = summary.checks.values().map(|counts| counts.fails).sum();
    if failed_checks > 0 {
        log::warn!("{failed_checks} checks failed during run {}", summary.run_id);
    }

    Ok(())
}
