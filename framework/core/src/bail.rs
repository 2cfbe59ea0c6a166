/// Return this error from an agent's behaviour to retire that agent.
///
/// The agent stops taking iterations and runs its teardown. The run carries on with the remaining
/// agents, and new agents can still be started by the arrival-rate scheduler if the pool has room.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{msg}")]
pub struct AgentBailError {
    msg: String,
}

impl AgentBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self::new("Agent is bailing")
    }
}
