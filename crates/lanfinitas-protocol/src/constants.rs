/// Task list endpoint (GET lists, POST creates).
pub const TASKS_PATH: &str = "/api/v1/tasks";
pub const DELEGATIONS_PATH: &str = "/api/v1/delegations";
pub const AGENTS_PATH: &str = "/api/v1/agents";

/// Revocation endpoint for a single delegation.
pub fn delegation_revoke_path(delegation_id: &str) -> String {
    format!("{DELEGATIONS_PATH}/{delegation_id}/revoke")
}

// Tasks and delegations churn faster than the agent roster.
pub const DEFAULT_TASK_POLL_SECS: u64 = 5;
pub const DEFAULT_DELEGATION_POLL_SECS: u64 = 5;
pub const DEFAULT_AGENT_POLL_SECS: u64 = 15;

/// Label used when a delegation references a task missing from the current snapshot.
pub const UNKNOWN_TASK_LABEL: &str = "Unknown Task";
/// Label used when a delegation carries no agent id at all.
pub const UNKNOWN_AGENT_LABEL: &str = "Unknown";

pub const MAX_TASK_NAME_LEN: usize = 200;
