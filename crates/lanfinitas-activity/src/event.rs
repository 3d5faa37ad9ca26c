use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lanfinitas_protocol::TaskPriority;

/// Kind of state transition an [`ActivityEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TaskCreated,
    TaskAssigned,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
    DelegationCreated,
    DelegationRevoked,
    DelegationExpired,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 9] = [
        ActivityKind::TaskCreated,
        ActivityKind::TaskAssigned,
        ActivityKind::TaskStarted,
        ActivityKind::TaskCompleted,
        ActivityKind::TaskFailed,
        ActivityKind::TaskCancelled,
        ActivityKind::DelegationCreated,
        ActivityKind::DelegationRevoked,
        ActivityKind::DelegationExpired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::TaskAssigned => "task_assigned",
            Self::TaskStarted => "task_started",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::TaskCancelled => "task_cancelled",
            Self::DelegationCreated => "delegation_created",
            Self::DelegationRevoked => "delegation_revoked",
            Self::DelegationExpired => "delegation_expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Position in the task/delegation lifecycle.
    ///
    /// Breaks timestamp ties: with most-recent-first ordering, the later
    /// stage is listed first.
    pub fn stage_rank(&self) -> u8 {
        match self {
            Self::TaskCreated => 0,
            Self::DelegationCreated => 1,
            Self::TaskAssigned => 2,
            Self::TaskStarted => 3,
            Self::TaskCompleted | Self::TaskFailed | Self::TaskCancelled => 4,
            Self::DelegationRevoked | Self::DelegationExpired => 5,
        }
    }

    pub fn is_task(&self) -> bool {
        !self.is_delegation()
    }

    pub fn is_delegation(&self) -> bool {
        matches!(
            self,
            Self::DelegationCreated | Self::DelegationRevoked | Self::DelegationExpired
        )
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific payload carried alongside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventMetadata {
    #[default]
    None,
    Priority(TaskPriority),
    Permissions(Vec<String>),
    Error(Option<String>),
}

/// One derived, display-only record of a task or delegation transition.
///
/// Rebuilt from scratch on every derivation; never stored or mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// `"<subject id>:<kind>"`, unique per derivation for unique subject ids.
    pub id: String,
    pub kind: ActivityKind,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub metadata: EventMetadata,
    /// Id of the task or delegation the event was derived from.
    pub subject_id: String,
}

impl ActivityEvent {
    pub(crate) fn new(
        subject_id: &str,
        kind: ActivityKind,
        timestamp: DateTime<Utc>,
        title: &str,
        description: String,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            id: format!("{subject_id}:{kind}"),
            kind,
            timestamp,
            title: title.to_string(),
            description,
            metadata,
            subject_id: subject_id.to_string(),
        }
    }
}
