use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// The arrival-rate configuration a run was started with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArrivalSummary {
    /// Iterations started per time unit
    pub rate: u32,
    /// Length of the time unit, in milliseconds
    pub time_unit_ms: u64,
    /// Agents started before the first arrival
    pub pre_allocated_agents: usize,
    /// Upper bound on the number of agents
    pub max_agents: usize,
}

/// How the scheduled iterations of a run ended up.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IterationCounts {
    /// Iterations handed to an agent
    pub started: u64,
    /// Iterations whose behaviour returned successfully
    pub completed: u64,
    /// Iterations whose behaviour returned an error
    pub failed: u64,
    /// Iterations cancelled by the shutdown signal
    pub interrupted: u64,
    /// Arrivals that could not start because every agent was busy
    pub dropped: u64,
}

/// Pass and fail counts for one named check
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The duration that the run was configured with, in seconds
    ///
    /// If the run was configured for soak testing, then this will not be set.
    pub run_duration: Option<u64>,
    pub arrival: ArrivalSummary,
    /// The number of agents that were started over the course of the run
    pub agent_count: usize,
    pub iterations: IterationCounts,
    /// Check outcomes keyed by check name
    pub checks: BTreeMap<String, CheckCounts>,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of or
    /// that are included by the scenario itself.
    pub env: HashMap<String, String>,
    /// The version of the harness that was used for this run
    pub harness_version: String,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        run_duration: Option<u64>,
        arrival: ArrivalSummary,
        harness_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            run_duration,
            arrival,
            agent_count: 0,
            iterations: IterationCounts::default(),
            checks: BTreeMap::new(),
            env: HashMap::with_capacity(0),
            harness_version,
        }
    }

    pub fn set_agent_count(&mut self, agent_count: usize) {
        self.agent_count = agent_count;
    }

    pub fn set_iterations(&mut self, iterations: IterationCounts) {
        self.iterations = iterations;
    }

    pub fn add_check(&mut self, name: String, counts: CheckCounts) {
        self.checks.insert(name, counts);
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint identifies the configuration used to run the scenario, so runs that can be
    /// compared share a fingerprint. It covers the scenario name, run duration, arrival
    /// configuration, selected environment variables and the harness version.
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        if let Some(run_duration) = self.run_duration {
            Digest::update(&mut hasher, run_duration.to_le_bytes());
        }
        Digest::update(&mut hasher, self.arrival.rate.to_le_bytes());
        Digest::update(&mut hasher, self.arrival.time_unit_ms.to_le_bytes());
        Digest::update(&mut hasher, self.arrival.pre_allocated_agents.to_le_bytes());
        Digest::update(&mut hasher, self.arrival.max_agents.to_le_bytes());
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.harness_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(run_id: &str) -> RunSummary {
        RunSummary::new(
            run_id.to_string(),
            "kiosk_order".to_string(),
            1_700_000_000,
            Some(120),
            ArrivalSummary {
                rate: 50,
                time_unit_ms: 1000,
                pre_allocated_agents: 10_000,
                max_agents: 10_000,
            },
            "0.1.0".to_string(),
        )
    }

    #[test]
    fn fingerprint_ignores_run_id_and_results() {
        let first = sample("first");
        let mut second = sample("second");
        second.set_iterations(IterationCounts {
            started: 6000,
            completed: 5990,
            failed: 10,
            interrupted: 0,
            dropped: 0,
        });
        second.add_check("Checkout".to_string(), CheckCounts { passes: 1, fails: 0 });

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_arrival_rate() {
        let first = sample("first");
        let mut second = sample("second");
        second.arrival.rate = 100;

        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn append_and_load_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary.jsonl");

        let mut first = sample("first");
        first.add_env("KIOSK_SIGNAL_PAUSE_MS".to_string(), "1000".to_string());
        append_run_summary(&first, &path).unwrap();
        append_run_summary(&sample("second"), &path).unwrap();

        let runs = load_summary_runs(&path).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], first);
        assert_eq!(runs[1].run_id, "second");
    }
}
