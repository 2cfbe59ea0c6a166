use crate::cli::ConductorLoadScenarioCli;
use clap::Parser;

/// Initialise the CLI and logging for the runner.
pub fn init() -> ConductorLoadScenarioCli {
    env_logger::init();

    ConductorLoadScenarioCli::parse()
}
