mod arrival;
mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod pool;
mod progress;
mod run;
mod shutdown;
mod stats;
mod types;

pub mod prelude {
    pub use crate::arrival::ArrivalRate;
    pub use crate::cli::{ConductorLoadScenarioCli, ReporterOpt};
    pub use crate::context::{AgentContext, IterationInfo, RunnerContext, UserValuesConstraint};
    pub use crate::definition::{
        AgentHookMut, GlobalHook, GlobalHookMut, HookResult, ScenarioDefinitionBuilder,
    };
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::run;
    pub use crate::stats::RunStats;
    pub use crate::types::ConductorLoadResult;

    pub use conductor_load_core::prelude::{
        AgentBailError, DelegatedShutdownListener, ShutdownSignalError,
    };
    pub use conductor_load_instruments::{check, CheckRecord, ReportConfig, ReportMetric, Reporter};
    pub use conductor_load_summary_model::RunSummary;
}
