mod client;
mod error;
mod types;

pub mod prelude {
    pub use crate::client::{ConductorClient, ConductorClientConfig};
    pub use crate::error::{ConductorClientError, ConductorClientResult};
    pub use crate::types::{
        Consistency, ExecuteOptions, ReturnStrategy, SignalResponse, StartWorkflowRequest,
        TaskResult, WorkflowId, WorkflowResponse, WORKFLOW_ID_HEADER,
    };
}
