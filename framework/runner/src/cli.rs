use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use conductor_load_instruments::ReportConfig;

/// Where results are reported while the scenario runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Discard all results.
    Noop,
    /// Keep results in memory and print summary tables at the end of the run.
    #[default]
    InMemory,
}

impl ReporterOpt {
    pub(crate) fn report_config(self) -> ReportConfig {
        match self {
            ReporterOpt::Noop => ReportConfig::default(),
            ReporterOpt::InMemory => ReportConfig::default().enable_summary(),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct ConductorLoadScenarioCli {
    /// Base URL of the service to test, for example `https://developer.orkescloud.com`
    #[clap(short, long, env = "CONDUCTOR_SERVER_URL")]
    pub connection_string: Option<String>,

    /// The number of iterations to start per time unit
    #[clap(long)]
    pub rate: Option<u32>,

    /// The length of the time unit that `--rate` refers to, in milliseconds
    #[clap(long)]
    pub time_unit_ms: Option<u64>,

    /// The number of seconds to keep starting iterations for
    #[clap(long)]
    pub duration: Option<u64>,

    /// Run this test as a soak test, ignoring any configured duration and continuing to run until stopped
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// The number of agents to start before the first iteration is scheduled
    #[clap(long)]
    pub pre_allocated_agents: Option<usize>,

    /// The maximum number of agents that may run iterations at the same time.
    ///
    /// When every agent is busy and this limit is reached, new arrivals are dropped and counted.
    #[clap(long)]
    pub max_agents: Option<usize>,

    /// Seconds to wait for in-flight iterations after the last arrival before interrupting them
    #[clap(long)]
    pub graceful_stop: Option<u64>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Set the ID of this run
    ///
    /// If not set, a random ID is used.
    #[arg(long, short)]
    pub run_id: Option<String>,

    /// Append a JSON summary of the run to this file
    #[arg(long)]
    pub summary_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        ConductorLoadScenarioCli::command().debug_assert();
    }

    #[test]
    fn parse_arrival_flags() {
        let cli = ConductorLoadScenarioCli::try_parse_from([
            "kiosk_order",
            "--connection-string",
            "http://localhost:8080",
            "--rate",
            "50",
            "--duration",
            "120",
            "--max-agents",
            "200",
            "--reporter",
            "noop",
        ])
        .unwrap();

        assert_eq!(cli.connection_string.as_deref(), Some("http://localhost:8080"));
        assert_eq!(cli.rate, Some(50));
        assert_eq!(cli.duration, Some(120));
        assert_eq!(cli.max_agents, Some(200));
        assert_eq!(cli.pre_allocated_agents, None);
        assert_eq!(cli.reporter, ReporterOpt::Noop);
        assert!(!cli.soak);
    }
}
