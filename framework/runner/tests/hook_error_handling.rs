use std::sync::Arc;

use conductor_load_runner::prelude::{
    check, run, AgentBailError, AgentContext, ConductorLoadScenarioCli, HookResult, ReporterOpt,
    RunnerContext, ScenarioDefinitionBuilder, UserValuesConstraint,
};
use conductor_load_summary_model::load_summary_runs;

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct AgentContextValue {
    value: i32,
}

impl UserValuesConstraint for AgentContextValue {}

fn sample_cli_cfg() -> ConductorLoadScenarioCli {
    ConductorLoadScenarioCli {
        connection_string: Some("test_connection_string".to_string()),
        rate: Some(10),
        time_unit_ms: None,
        duration: None,
        soak: false,
        pre_allocated_agents: Some(2),
        max_agents: Some(4),
        graceful_stop: Some(5),
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
        summary_path: None,
    }
}

fn scenario(
    name: &str,
    cli: ConductorLoadScenarioCli,
) -> ScenarioDefinitionBuilder<RunnerContextValue, AgentContextValue> {
    ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(name, cli)
        .with_default_duration_s(1)
}

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_ctx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let scenario = scenario("propagate_error_in_setup_hook", sample_cli_cfg()).use_setup(setup);

    let result = run(scenario);

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "Error in setup hook");
}

#[test]
fn capture_error_in_agent_setup() {
    fn agent_setup(_ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in agent setup hook"))
    }

    let scenario =
        scenario("capture_error_in_agent_setup", sample_cli_cfg()).use_agent_setup(agent_setup);

    let summary = run(scenario).unwrap();

    assert_eq!(summary.iterations.completed, 0);
}

#[test]
fn capture_error_in_agent_behaviour_and_continue() {
    fn agent_behaviour(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        Err(anyhow::anyhow!("Error in agent behaviour hook"))
    }

    let scenario = scenario("capture_error_in_agent_behaviour_and_continue", sample_cli_cfg())
        .use_agent_behaviour(agent_behaviour);

    let summary = run(scenario).unwrap();

    assert_eq!(summary.iterations.completed, 0);
    assert_eq!(summary.iterations.failed, summary.iterations.started);
    // Agents that fail an iteration keep taking new ones.
    assert_eq!(summary.iterations.started + summary.iterations.dropped, 10);
    assert!(summary.iterations.started > 2);
}

#[test]
fn force_stop_ends_soak_run() {
    fn agent_behaviour(ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
        if ctx.get().value < 5 {
            ctx.get_mut().value += 1;
        } else {
            // Save time running this test by shutting down once this has run a few times.
            ctx.runner_context().force_stop_scenario();
        }

        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.soak = true;
    cfg.rate = Some(20);
    cfg.pre_allocated_agents = Some(1);
    cfg.max_agents = Some(1);
    let scenario = scenario("force_stop_ends_soak_run", cfg).use_agent_behaviour(agent_behaviour);

    let summary = run(scenario).unwrap();

    assert_eq!(summary.run_duration, None);
    assert!(summary.iterations.completed >= 6);
}

#[test]
fn bail_error_stops_agent_behaviour() {
    fn agent_behaviour(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        Err(AgentBailError::default().into())
    }

    let mut cfg = sample_cli_cfg();
    cfg.max_agents = Some(2);
    let scenario =
        scenario("bail_error_stops_agent_behaviour", cfg).use_agent_behaviour(agent_behaviour);

    let summary = run(scenario).unwrap();

    // A bailing agent takes no further iterations, every started iteration had its own agent.
    assert_eq!(summary.agent_count as u64, summary.iterations.started);
    assert_eq!(summary.iterations.completed, 0);
    assert_eq!(summary.iterations.failed, summary.iterations.started);
    assert_eq!(summary.iterations.started + summary.iterations.dropped, 10);
}

#[test]
fn capture_error_in_agent_teardown() {
    fn agent_teardown(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        Err(anyhow::anyhow!("Error in agent teardown hook"))
    }

    let scenario = scenario("capture_error_in_agent_teardown", sample_cli_cfg())
        .use_agent_teardown(agent_teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn capture_error_in_teardown() {
    fn teardown(_ctx: Arc<RunnerContext<RunnerContextValue>>) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let scenario = scenario("capture_error_in_teardown", sample_cli_cfg()).use_teardown(teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn runs_every_planned_iteration() {
    fn agent_behaviour(ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
        let has_iteration = ctx.iteration().is_some();
        check(
            &ctx.runner_context().reporter(),
            "iteration info present",
            has_iteration,
        );
        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.rate = Some(20);
    let scenario = scenario("runs_every_planned_iteration", cfg).use_agent_behaviour(agent_behaviour);

    let summary = run(scenario).unwrap();

    assert_eq!(summary.iterations.started, 20);
    assert_eq!(summary.iterations.completed, 20);
    assert_eq!(summary.iterations.dropped, 0);
    let iteration_check = &summary.checks["iteration info present"];
    assert_eq!(iteration_check.passes, 20);
    assert_eq!(iteration_check.fails, 0);
}

#[test]
fn summary_is_appended_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.jsonl");

    let mut cfg = sample_cli_cfg();
    cfg.run_id = Some("test-run".to_string());
    cfg.summary_path = Some(path.clone());
    let scenario = scenario("summary_is_appended_to_file", cfg);

    let summary = run(scenario).unwrap();

    let runs = load_summary_runs(&path).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, "test-run");
    assert_eq!(runs[0].scenario_name, "summary_is_appended_to_file");
    assert_eq!(runs[0].iterations, summary.iterations);
}
