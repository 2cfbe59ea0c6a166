use std::path::Path;

use anyhow::{bail, Context};
use conductor_client_instrumented::prelude::{ConductorClient, ConductorClientConfig};
use conductor_load_runner::prelude::{
    AgentContext, ConductorLoadResult, HookResult, RunnerContext, UserValuesConstraint,
};

use crate::context::ConductorAgentContext;
use crate::runner_context::ConductorRunnerContext;

/// Static token sent as `X-Authorization`.
pub const ENV_SERVER_TOKEN: &str = "CONDUCTOR_SERVER_TOKEN";
/// Access key id, exchanged for a token together with [ENV_ACCESS_KEY_SECRET].
pub const ENV_ACCESS_KEY_ID: &str = "CONDUCTOR_ACCESS_KEY_ID";
pub const ENV_ACCESS_KEY_SECRET: &str = "CONDUCTOR_ACCESS_KEY_SECRET";

/// How many workflows to fetch per search when cleaning up.
const CLEANUP_PAGE_SIZE: usize = 100;

/// Creates the [ConductorClient] shared by all agents and stores it in the [ConductorRunnerContext].
///
/// The server URL is the connection string from the command line or `CONDUCTOR_SERVER_URL`.
///
/// The token is resolved as follows:
/// - If both `CONDUCTOR_ACCESS_KEY_ID` and `CONDUCTOR_ACCESS_KEY_SECRET` are set, they are
///   exchanged for a token with the server.
/// - Otherwise `CONDUCTOR_SERVER_TOKEN` is used.
/// - If neither is set, requests are sent without `X-Authorization`.
///
/// Call this from the scenario `setup`:
/// ```rust
/// use conductor_scenario_runner::prelude::{configure_client, ConductorRunnerContext, HookResult, RunnerContext};
///
/// fn setup(ctx: &mut RunnerContext<ConductorRunnerContext>) -> HookResult {
///     configure_client(ctx, false)?;
///     Ok(())
/// }
/// ```
pub fn configure_client<RSV: UserValuesConstraint>(
    ctx: &mut RunnerContext<ConductorRunnerContext<RSV>>,
    http1_only: bool,
) -> HookResult {
    let Some(base_url) = ctx.get_connection_string().map(str::to_string) else {
        bail!("No Conductor server URL, pass --connection-string or set CONDUCTOR_SERVER_URL");
    };

    let token = resolve_token(ctx, &base_url, http1_only)?;
    let config = ConductorClientConfig::new(base_url)
        .with_token(token)
        .with_http1_only(http1_only);
    let client = ConductorClient::new(&config, ctx.reporter())
        .context("Failed to create Conductor client")?;

    log::info!("Using Conductor server at {}", client.base_url());
    ctx.get_mut().client = Some(client);

    Ok(())
}

fn resolve_token<RSV: UserValuesConstraint>(
    ctx: &RunnerContext<ConductorRunnerContext<RSV>>,
    base_url: &str,
    http1_only: bool,
) -> ConductorLoadResult<Option<String>> {
    let key_id = std::env::var(ENV_ACCESS_KEY_ID).ok();
    let key_secret = std::env::var(ENV_ACCESS_KEY_SECRET).ok();

    if let (Some(key_id), Some(key_secret)) = (key_id, key_secret) {
        let config = ConductorClientConfig::new(base_url).with_http1_only(http1_only);
        let client = ConductorClient::new(&config, ctx.reporter())
            .context("Failed to create Conductor client")?;
        let token = ctx
            .executor()
            .execute_in_place(async move {
                client
                    .generate_token(&key_id, &key_secret)
                    .await
                    .context("Failed to exchange access key for a token")
            })?;
        log::info!("Got token using access key ID and secret");

        return Ok(Some(token));
    }

    match std::env::var(ENV_SERVER_TOKEN) {
        Ok(token) if !token.is_empty() => {
            log::info!("Using token from {ENV_SERVER_TOKEN}");
            Ok(Some(token))
        }
        _ => {
            log::warn!("No token configured, requests will be sent without X-Authorization");
            Ok(None)
        }
    }
}

/// Gives the agent its own handle to the client created by [configure_client].
///
/// Call this from the `agent_setup` of scenarios whose behaviour uses
/// [ConductorAgentContext::client].
pub fn use_runner_client<RSV: UserValuesConstraint, SV: UserValuesConstraint>(
    ctx: &mut AgentContext<ConductorRunnerContext<RSV>, ConductorAgentContext<SV>>,
) -> HookResult {
    let client = ctx.runner_context().get().client()?.clone();
    ctx.get_mut().client = Some(client);

    Ok(())
}

/// Register the workflow definition stored as JSON at `path`, replacing any existing definition
/// with the same name and version.
pub fn publish_workflow_from_file<RSV: UserValuesConstraint>(
    ctx: &RunnerContext<ConductorRunnerContext<RSV>>,
    path: &Path,
) -> HookResult {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow definition {}", path.display()))?;
    let definition: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Workflow definition {} is not valid JSON", path.display()))?;
    let name = definition
        .get("name")
        .and_then(|name| name.as_str())
        .unwrap_or("<unnamed>")
        .to_string();

    let client = ctx.get().client()?.clone();
    ctx.executor().execute_in_place(async move {
        client
            .publish_workflow(&definition)
            .await
            .context("Failed to publish workflow")
    })?;
    log::info!("Workflow '{name}' published successfully");

    Ok(())
}

/// Terminate every workflow in the `RUNNING` state.
///
/// Useful after a cancelled run, or for workflows left running because the server throttled
/// them. Searches repeatedly until a search turns up nothing that could be terminated. Returns
/// the number of terminated workflows.
pub fn cleanup_running_workflows<RSV: UserValuesConstraint>(
    ctx: &RunnerContext<ConductorRunnerContext<RSV>>,
) -> ConductorLoadResult<u64> {
    let client = ctx.get().client()?.clone();

    ctx.executor().execute_in_place(async move {
        let mut total = 0;
        loop {
            let running = client
                .search_running_workflows(CLEANUP_PAGE_SIZE)
                .await
                .context("Failed to search for running workflows")?;

            let mut terminated = 0;
            for workflow_id in &running {
                match client.terminate_workflow(workflow_id).await {
                    Ok(()) => terminated += 1,
                    Err(e) => log::warn!("Failed to terminate workflow {workflow_id}: {e}"),
                }
            }

            if terminated == 0 {
                break;
            }

            log::info!("Cleaned up {terminated} workflows");
            total += terminated;
        }

        Ok(total)
    })
}
