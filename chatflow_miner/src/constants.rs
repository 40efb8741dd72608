/// Column holding the case identifier of an event
pub const CASE_ID: &str = "CASE_ID";
/// Column holding the activity label of an event
pub const ACTIVITY: &str = "ACTIVITY";
/// Column holding the start timestamp of an event
pub const START_TIMESTAMP: &str = "START_TIMESTAMP";
/// Column holding the end timestamp of an event
///
/// Optional for most operations: where absent, the start timestamp is used instead.
pub const END_TIMESTAMP: &str = "END_TIMESTAMP";
/// Column holding the agent (resource) that executed an event, e.g., `ai`, `human` or `syst`
pub const AGENT: &str = "AGENT";
/// Column holding an ordinal event identifier, used to break ties between events with equal timestamps
pub const EVENT_ID: &str = "EVENT_ID";
/// Column added by [`crate::aggregations::DeriveCaseStartDateOp`] by default
pub const CASE_DATE: &str = "CASE_DATE";

/// Columns that every loaded event table must contain
pub const REQUIRED_COLUMNS: [&str; 4] = [CASE_ID, ACTIVITY, START_TIMESTAMP, END_TIMESTAMP];

/// Agent label of system-generated events
pub const SYSTEM_AGENT: &str = "syst";
/// All (lowercase) agent labels treated as the system agent
///
/// Some exports spell out the full word, so both forms are accepted.
pub const SYSTEM_AGENT_ALIASES: [&str; 2] = [SYSTEM_AGENT, "system"];

/// Agent label of chatbot events
pub const AI_AGENT: &str = "ai";
/// Agent label of human (customer) events
pub const HUMAN_AGENT: &str = "human";

/// Name of the placeholder entry used to offer creating a new process model
pub const NEW_MODEL_PLACEHOLDER: &str = "Create new process model...";

/// Returns `true` if the given agent label denotes the system agent (case-insensitive)
pub fn is_system_agent(agent: &str) -> bool {
    let agent = agent.trim().to_lowercase();
    SYSTEM_AGENT_ALIASES.contains(&agent.as_str())
}
