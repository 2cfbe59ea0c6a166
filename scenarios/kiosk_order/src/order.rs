use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use conductor_scenario_runner::prelude::{
    check, ConductorClient, ExecuteOptions, Reporter, ReturnStrategy, StartWorkflowRequest,
    TaskResult,
};
use serde::Serialize;
use serde_json::json;

pub const ENV_API_TEST_URI: &str = "KIOSK_API_TEST_URI";
pub const ENV_SIGNAL_PAUSE_MS: &str = "KIOSK_SIGNAL_PAUSE_MS";
pub const ENV_MISSING_WORKFLOW_ID: &str = "KIOSK_MISSING_WORKFLOW_ID";
pub const ENV_CLEANUP: &str = "KIOSK_CLEANUP";
pub const ENV_HTTP1_ONLY: &str = "KIOSK_HTTP1_ONLY";
pub const ENV_WORKFLOW_DEFINITION: &str = "KIOSK_WORKFLOW_DEFINITION";

pub const CHECK_WORKFLOW_STARTED: &str = "Workflow Started";
pub const CHECK_WORKFLOW_ID_PRESENT: &str = "Workflow ID present";
pub const CHECK_ADD_ITEM_1: &str = "AddItem call #1";
pub const CHECK_ADD_ITEM_2: &str = "AddItem Call #2";
pub const CHECK_CHECKOUT: &str = "Checkout";
pub const CHECK_WORKFLOW_ID_PRECONDITION: &str = "Workflow ID precondition";

/// Path segment used in place of a missing workflow id.
const MISSING_WORKFLOW_ID_SEGMENT: &str = "null";

/// What to do with the signal calls when the start call returned no workflow id.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MissingWorkflowId {
    /// Send the signals to the workflow `null`. They are expected to fail their checks.
    #[default]
    SignalAnyway,
    /// Don't send the signals and record a failed `Workflow ID precondition` check instead.
    Skip,
}

impl FromStr for MissingWorkflowId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal-anyway" => Ok(MissingWorkflowId::SignalAnyway),
            "skip" => Ok(MissingWorkflowId::Skip),
            other => bail!("Unknown missing workflow id policy '{other}', expected 'signal-anyway' or 'skip'"),
        }
    }
}

/// Settings for the kiosk order iteration, fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct KioskOrderConfig {
    pub workflow_name: String,
    pub workflow_version: u32,
    /// The URL the workflow itself calls.
    pub api_test_uri: String,
    pub api_test_method: String,
    pub execute_options: ExecuteOptions,
    /// Pause between consecutive signal calls.
    pub signal_pause: Duration,
    pub missing_workflow_id: MissingWorkflowId,
    /// Terminate RUNNING workflows before the run starts.
    pub cleanup: bool,
    pub http1_only: bool,
    /// Workflow definition to publish before the run starts.
    pub workflow_definition: Option<PathBuf>,
}

impl Default for KioskOrderConfig {
    fn default() -> Self {
        Self {
            workflow_name: "KioskOrder".to_string(),
            workflow_version: 1,
            api_test_uri: "http://172.20.38.11/".to_string(),
            api_test_method: "GET".to_string(),
            execute_options: ExecuteOptions::default(),
            signal_pause: Duration::from_secs(1),
            missing_workflow_id: MissingWorkflowId::default(),
            cleanup: false,
            http1_only: false,
            workflow_definition: None,
        }
    }
}

impl KioskOrderConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(uri) = lookup(ENV_API_TEST_URI) {
            config.api_test_uri = uri;
        }
        if let Some(pause) = lookup(ENV_SIGNAL_PAUSE_MS) {
            let pause = pause
                .parse()
                .with_context(|| format!("{ENV_SIGNAL_PAUSE_MS} must be a number of milliseconds, got '{pause}'"))?;
            config.signal_pause = Duration::from_millis(pause);
        }
        if let Some(policy) = lookup(ENV_MISSING_WORKFLOW_ID) {
            config.missing_workflow_id = policy.parse()?;
        }
        if let Some(cleanup) = lookup(ENV_CLEANUP) {
            config.cleanup = parse_flag(ENV_CLEANUP, &cleanup)?;
        }
        if let Some(http1_only) = lookup(ENV_HTTP1_ONLY) {
            config.http1_only = parse_flag(ENV_HTTP1_ONLY, &http1_only)?;
        }
        config.workflow_definition = lookup(ENV_WORKFLOW_DEFINITION)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        _ => bail!("{key} must be true or false, got '{value}'"),
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
enum KioskAction {
    AddItem,
    Checkout,
}

#[derive(Debug, Serialize)]
struct SignalBody {
    action: KioskAction,
}

/// One kiosk order: start the workflow, add two items and check out.
///
/// Each call records a check. Failed checks and failed requests never end the iteration early,
/// the only exception being a missing workflow id under [MissingWorkflowId::Skip].
pub async fn run_order_iteration(
    client: &ConductorClient,
    reporter: &Reporter,
    config: &KioskOrderConfig,
    iteration_index: u64,
) -> anyhow::Result<()> {
    let request = StartWorkflowRequest {
        name: config.workflow_name.clone(),
        version: config.workflow_version,
        correlation_id: format!("request-{iteration_index}"),
        input: json!({
            "uri": config.api_test_uri,
            "method": config.api_test_method,
        }),
    };

    let (status, workflow_id) = match client
        .execute_workflow(&request, &config.execute_options)
        .await
    {
        Ok(response) => (response.status, response.workflow_id),
        Err(e) => {
            log::debug!("Start workflow request {} failed: {e}", request.correlation_id);
            (0, None)
        }
    };
    check(reporter, CHECK_WORKFLOW_STARTED, status == 200);
    check(reporter, CHECK_WORKFLOW_ID_PRESENT, workflow_id.is_some());

    let workflow_id = match (workflow_id, config.missing_workflow_id) {
        (Some(workflow_id), _) => workflow_id.to_string(),
        (None, MissingWorkflowId::SignalAnyway) => MISSING_WORKFLOW_ID_SEGMENT.to_string(),
        (None, MissingWorkflowId::Skip) => {
            check(reporter, CHECK_WORKFLOW_ID_PRECONDITION, false);
            return Ok(());
        }
    };

    signal(client, reporter, &workflow_id, KioskAction::AddItem, CHECK_ADD_ITEM_1).await;
    tokio::time::sleep(config.signal_pause).await;

    signal(client, reporter, &workflow_id, KioskAction::AddItem, CHECK_ADD_ITEM_2).await;
    tokio::time::sleep(config.signal_pause).await;

    signal(client, reporter, &workflow_id, KioskAction::Checkout, CHECK_CHECKOUT).await;

    Ok(())
}

async fn signal(
    client: &ConductorClient,
    reporter: &Reporter,
    workflow_id: &str,
    action: KioskAction,
    check_name: &str,
) {
    let status = match client
        .signal_task(
            workflow_id,
            TaskResult::Completed,
            &SignalBody { action },
            ReturnStrategy::BlockingTaskInput,
        )
        .await
    {
        Ok(response) => response.status,
        Err(e) => {
            log::debug!("{check_name} request for workflow {workflow_id} failed: {e}");
            0
        }
    };

    check(reporter, check_name, status == 200);
}
