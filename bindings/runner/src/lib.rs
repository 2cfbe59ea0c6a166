mod common;
mod context;
mod runner_context;

pub mod prelude {
    /// Common operations for Conductor scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::context::{ConductorAgentContext, DefaultScenarioValues};
    pub use crate::runner_context::ConductorRunnerContext;

    /// Re-export of the `conductor_load_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use conductor_load_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use conductor_client_instrumented::prelude::*;
}
