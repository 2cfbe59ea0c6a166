use std::sync::Arc;

use anyhow::Context;
use conductor_scenario_runner::prelude::{
    check, cleanup_running_workflows, configure_client, run, use_runner_client, AgentContext,
    ConductorAgentContext, ConductorLoadScenarioCli, ConductorRunnerContext, HookResult,
    ReporterOpt, RunnerContext, ScenarioDefinitionBuilder, UserValuesConstraint,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cli_for(connection_string: Option<String>) -> ConductorLoadScenarioCli {
    ConductorLoadScenarioCli {
        connection_string,
        rate: Some(2),
        time_unit_ms: None,
        duration: Some(1),
        soak: false,
        pre_allocated_agents: Some(1),
        max_agents: Some(1),
        graceful_stop: Some(1),
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
        summary_path: None,
    }
}

fn setup(ctx: &mut RunnerContext<ConductorRunnerContext>) -> HookResult {
    configure_client(ctx, false)?;
    let terminated = cleanup_running_workflows(ctx)?;
    anyhow::ensure!(terminated == 2, "expected 2 terminated workflows, got {terminated}");
    Ok(())
}

fn agent_setup(ctx: &mut AgentContext<ConductorRunnerContext, ConductorAgentContext>) -> HookResult {
    use_runner_client(ctx)?;
    ctx.get().client()?;
    Ok(())
}

#[test]
fn setup_cleans_up_running_workflows() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/workflow/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"workflowId": "wf-1"}, {"workflowId": "wf-2"}]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/workflow/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/workflow/wf-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/workflow/wf-2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        server
    });

    let scenario = ScenarioDefinitionBuilder::<ConductorRunnerContext, ConductorAgentContext>::new(
        "setup_cleans_up_running_workflows",
        cli_for(Some(server.uri())),
    )
    .use_setup(setup)
    .use_agent_setup(agent_setup);

    let summary = run(scenario).unwrap();

    assert_eq!(summary.iterations.completed, 2);
    runtime.block_on(server.verify());
}

#[test]
fn missing_server_url_fails_setup() {
    fn setup(ctx: &mut RunnerContext<ConductorRunnerContext>) -> HookResult {
        configure_client(ctx, false)
    }

    let scenario = ScenarioDefinitionBuilder::<ConductorRunnerContext, ConductorAgentContext>::new(
        "missing_server_url_fails_setup",
        cli_for(None),
    )
    .use_setup(setup);

    let err = run(scenario).unwrap_err();

    assert!(err.to_string().contains("No Conductor server URL"));
}

#[derive(Default, Debug)]
struct SharedLabel {
    label: Option<Arc<String>>,
}

impl UserValuesConstraint for SharedLabel {}

type SharedLabelAgentContext =
    AgentContext<ConductorRunnerContext<SharedLabel>, ConductorAgentContext<SharedLabel>>;

#[test]
fn runner_scenario_values_reach_agents() {
    fn setup(ctx: &mut RunnerContext<ConductorRunnerContext<SharedLabel>>) -> HookResult {
        ctx.get_mut().scenario_values.label = Some(Arc::new("kiosk".to_string()));
        Ok(())
    }

    fn agent_setup(ctx: &mut SharedLabelAgentContext) -> HookResult {
        let label = ctx
            .runner_context()
            .get()
            .scenario_values
            .label
            .clone()
            .context("label was not set in setup")?;
        ctx.get_mut().scenario_values.label = Some(label);
        Ok(())
    }

    fn agent_behaviour(ctx: &mut SharedLabelAgentContext) -> HookResult {
        let shared = ctx.get().scenario_values.label.as_deref().map(String::as_str) == Some("kiosk");
        check(&ctx.runner_context().reporter(), "shared label", shared);
        Ok(())
    }

    let scenario = ScenarioDefinitionBuilder::<
        ConductorRunnerContext<SharedLabel>,
        ConductorAgentContext<SharedLabel>,
    >::new("runner_scenario_values_reach_agents", cli_for(None))
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(agent_behaviour);

    let summary = run(scenario).unwrap();

    assert_eq!(summary.iterations.completed, 2);
    assert_eq!(summary.checks["shared label"].passes, 2);
    assert_eq!(summary.checks["shared label"].fails, 0);
}
