use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Response header carrying the id of a started workflow.
pub const WORKFLOW_ID_HEADER: &str = "workflowid";

/// Identifier of one workflow instance, as assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WorkflowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// What a synchronous call waits for before the server responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStrategy {
    TargetWorkflow,
    BlockingWorkflow,
    BlockingTask,
    BlockingTaskInput,
}

impl ReturnStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStrategy::TargetWorkflow => "TARGET_WORKFLOW",
            ReturnStrategy::BlockingWorkflow => "BLOCKING_WORKFLOW",
            ReturnStrategy::BlockingTask => "BLOCKING_TASK",
            ReturnStrategy::BlockingTaskInput => "BLOCKING_TASK_INPUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Synchronous,
    Durable,
    RegionDurable,
}

impl Consistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Synchronous => "SYNCHRONOUS",
            Consistency::Durable => "DURABLE",
            Consistency::RegionDurable => "REGION_DURABLE",
        }
    }
}

/// Query options for [crate::prelude::ConductorClient::execute_workflow].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// How long the server may hold the request while the workflow runs.
    pub wait_for_seconds: u32,
    pub return_strategy: ReturnStrategy,
    pub consistency: Consistency,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            wait_for_seconds: 5,
            return_strategy: ReturnStrategy::BlockingTaskInput,
            consistency: Consistency::Synchronous,
        }
    }
}

/// The status a signal sets on the task the workflow is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Completed,
    Failed,
    FailedWithTerminalError,
}

impl TaskResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskResult::Completed => "COMPLETED",
            TaskResult::Failed => "FAILED",
            TaskResult::FailedWithTerminalError => "FAILED_WITH_TERMINAL_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    pub name: String,
    /// Sent as a JSON string in the request body.
    #[serde(serialize_with = "serialize_as_string")]
    pub version: u32,
    pub correlation_id: String,
    pub input: serde_json::Value,
}

fn serialize_as_string<S: serde::Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowResponse {
    pub status: u16,
    /// Taken from the `Workflowid` header, `None` only when the header is missing.
    pub workflow_id: Option<WorkflowId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalResponse {
    pub status: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenRequest<'a> {
    pub(crate) key_id: &'a str,
    pub(crate) key_secret: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResult {
    #[serde(default)]
    pub(crate) results: Vec<WorkflowSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkflowSummary {
    pub(crate) workflow_id: WorkflowId,
}
