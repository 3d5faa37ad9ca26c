//! Activity timeline derivation.
//!
//! Per task, every milestone reached is emitted:
//! 1. `task_created` at `created_at` (always)
//! 2. `task_assigned` when an agent is assigned, at `started_at` or else
//!    `created_at` (assignment time is not tracked separately)
//! 3. `task_started` at `started_at`
//! 4. `task_completed` when COMPLETED with a `completed_at`
//! 5. `task_failed` when FAILED with a `completed_at`, carrying the error
//! 6. `task_cancelled` when CANCELLED, at `completed_at` or else `created_at`
//!
//! Per delegation:
//! 1. `delegation_created` at `created_at` (always), carrying the permissions
//! 2. `delegation_revoked` when REVOKED with a `revoked_at`
//! 3. `delegation_expired` when EXPIRED with an `expires_at`
//!
//! Events are sorted by timestamp descending, then by lifecycle stage
//! descending, then by event id ascending, so the output does not depend
//! on input order. Ids are only unique when subject ids are; if the
//! backend repeats an id, the description breaks the remaining tie.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use lanfinitas_protocol::{Agent, Delegation, DelegationStatus, Task, TaskStatus};

use crate::directory::{present_id, AgentDirectory, TaskDirectory};
use crate::event::{ActivityEvent, ActivityKind, EventMetadata};

/// Per-kind tallies shown next to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub tasks_created: usize,
    pub tasks_completed: usize,
    pub delegations_created: usize,
    pub tasks_failed: usize,
}

impl ActivityCounts {
    /// Tally an already derived event sequence.
    pub fn tally(events: &[ActivityEvent]) -> Self {
        let count = |kind: ActivityKind| events.iter().filter(|e| e.kind == kind).count();
        Self {
            tasks_created: count(ActivityKind::TaskCreated),
            tasks_completed: count(ActivityKind::TaskCompleted),
            delegations_created: count(ActivityKind::DelegationCreated),
            tasks_failed: count(ActivityKind::TaskFailed),
        }
    }
}

/// Renderable state of the activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Timeline {
    /// Inputs are still being fetched; nothing was derived.
    Loading,
    /// Loaded, but there are no tasks and no delegations.
    Empty,
    Ready {
        events: Vec<ActivityEvent>,
        counts: ActivityCounts,
    },
}

impl Timeline {
    pub fn events(&self) -> &[ActivityEvent] {
        match self {
            Timeline::Ready { events, .. } => events,
            Timeline::Loading | Timeline::Empty => &[],
        }
    }

    pub fn counts(&self) -> ActivityCounts {
        match self {
            Timeline::Ready { counts, .. } => *counts,
            Timeline::Loading | Timeline::Empty => ActivityCounts::default(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Timeline::Loading)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Timeline::Empty)
    }
}

/// Derive the timeline for one snapshot of the three collections.
pub fn derive_timeline(
    tasks: &[Task],
    delegations: &[Delegation],
    agents: &[Agent],
    loading: bool,
) -> Timeline {
    if loading {
        return Timeline::Loading;
    }
    if tasks.is_empty() && delegations.is_empty() {
        return Timeline::Empty;
    }

    let events = derive_events(tasks, delegations, agents);
    let counts = ActivityCounts::tally(&events);
    Timeline::Ready { events, counts }
}

/// Build the sorted event sequence without the loading/empty wrapping.
pub fn derive_events(
    tasks: &[Task],
    delegations: &[Delegation],
    agents: &[Agent],
) -> Vec<ActivityEvent> {
    let agent_dir = AgentDirectory::new(agents);
    let task_dir = TaskDirectory::new(tasks);

    let mut events = Vec::with_capacity(tasks.len() * 3 + delegations.len() * 2);
    for task in tasks {
        push_task_events(task, &agent_dir, &mut events);
    }
    for delegation in delegations {
        push_delegation_events(delegation, &task_dir, &agent_dir, &mut events);
    }

    events.sort_by(compare_events);
    events
}

fn compare_events(a: &ActivityEvent, b: &ActivityEvent) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.kind.stage_rank().cmp(&a.kind.stage_rank()))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.description.cmp(&b.description))
}

fn push_task_events(task: &Task, agents: &AgentDirectory<'_>, out: &mut Vec<ActivityEvent>) {
    let id = task.id.as_str();
    let name = task.name.as_str();

    let created_by = if task.created_by.is_empty() {
        String::new()
    } else {
        format!(" by {}", task.created_by)
    };
    out.push(ActivityEvent::new(
        id,
        ActivityKind::TaskCreated,
        task.created_at,
        "Task Created",
        format!("\"{name}\" was created{created_by} with {} priority", task.priority),
        EventMetadata::Priority(task.priority),
    ));

    if let Some(agent_id) = present_id(task.assigned_agent_id.as_deref()) {
        out.push(ActivityEvent::new(
            id,
            ActivityKind::TaskAssigned,
            task.started_at.unwrap_or(task.created_at),
            "Task Assigned",
            format!("\"{name}\" was assigned to {}", agents.display_name(Some(agent_id))),
            EventMetadata::None,
        ));
    }

    if let Some(started_at) = task.started_at {
        out.push(ActivityEvent::new(
            id,
            ActivityKind::TaskStarted,
            started_at,
            "Task Started",
            format!("\"{name}\" started executing"),
            EventMetadata::None,
        ));
    }

    match (task.status, task.completed_at) {
        (TaskStatus::Completed, Some(completed_at)) => out.push(ActivityEvent::new(
            id,
            ActivityKind::TaskCompleted,
            completed_at,
            "Task Completed",
            format!("\"{name}\" completed successfully"),
            EventMetadata::None,
        )),
        (TaskStatus::Failed, Some(completed_at)) => {
            let reason = task
                .error
                .as_deref()
                .map(|e| format!(": {e}"))
                .unwrap_or_default();
            out.push(ActivityEvent::new(
                id,
                ActivityKind::TaskFailed,
                completed_at,
                "Task Failed",
                format!("\"{name}\" failed{reason}"),
                EventMetadata::Error(task.error.clone()),
            ));
        }
        (TaskStatus::Cancelled, completed_at) => out.push(ActivityEvent::new(
            id,
            ActivityKind::TaskCancelled,
            completed_at.unwrap_or(task.created_at),
            "Task Cancelled",
            format!("\"{name}\" was cancelled"),
            EventMetadata::None,
        )),
        _ => {}
    }
}

fn push_delegation_events(
    delegation: &Delegation,
    tasks: &TaskDirectory<'_>,
    agents: &AgentDirectory<'_>,
    out: &mut Vec<ActivityEvent>,
) {
    let id = delegation.id.as_str();
    let task_name = tasks.display_name(&delegation.task_id);
    let agent_name = agents.display_name(delegation.agent_id.as_deref());

    let permissions = if delegation.permissions.is_empty() {
        "no permissions".to_string()
    } else {
        delegation.permissions.join(", ")
    };
    out.push(ActivityEvent::new(
        id,
        ActivityKind::DelegationCreated,
        delegation.created_at,
        "Delegation Created",
        format!("\"{task_name}\" delegated to {agent_name} ({permissions})"),
        EventMetadata::Permissions(delegation.permissions.clone()),
    ));

    match delegation.status {
        DelegationStatus::Revoked => {
            if let Some(revoked_at) = delegation.revoked_at {
                out.push(ActivityEvent::new(
                    id,
                    ActivityKind::DelegationRevoked,
                    revoked_at,
                    "Delegation Revoked",
                    format!("Delegation of \"{task_name}\" to {agent_name} was revoked"),
                    EventMetadata::None,
                ));
            }
        }
        DelegationStatus::Expired => {
            if let Some(expires_at) = delegation.expires_at {
                out.push(ActivityEvent::new(
                    id,
                    ActivityKind::DelegationExpired,
                    expires_at,
                    "Delegation Expired",
                    format!("Delegation of \"{task_name}\" to {agent_name} expired"),
                    EventMetadata::None,
                ));
            }
        }
        DelegationStatus::Active | DelegationStatus::Completed => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_loading_short_circuits() {
        let tasks = vec![Task::new("t1", "Build", ts("2024-01-01T00:00:00Z"))];
        assert_eq!(derive_timeline(&tasks, &[], &[], true), Timeline::Loading);
    }

    #[test]
    fn test_pending_task_yields_only_created() {
        let tasks = vec![Task::new("t1", "Build", ts("2024-01-01T00:00:00Z"))];
        let events = derive_events(&tasks, &[], &[]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ActivityKind::TaskCreated);
        assert_eq!(events[0].id, "t1:task_created");
    }

    #[test]
    fn test_cancelled_without_completion_uses_creation_time() {
        let mut task = Task::new("t1", "Build", ts("2024-01-01T00:00:00Z"));
        task.status = TaskStatus::Cancelled;
        let events = derive_events(&[task], &[], &[]);
        assert_eq!(events.len(), 2);
        // Same timestamp: the later stage is listed first.
        assert_eq!(events[0].kind, ActivityKind::TaskCancelled);
        assert_eq!(events[0].timestamp, ts("2024-01-01T00:00:00Z"));
        assert_eq!(events[1].kind, ActivityKind::TaskCreated);
    }

    #[test]
    fn test_assigned_without_start_uses_creation_time() {
        let mut task = Task::new("t1", "Build", ts("2024-01-01T00:00:00Z"));
        task.assigned_agent_id = Some("a1".into());
        let events = derive_events(&[task], &[], &[]);
        let assigned = events
            .iter()
            .find(|e| e.kind == ActivityKind::TaskAssigned)
            .unwrap();
        assert_eq!(assigned.timestamp, ts("2024-01-01T00:00:00Z"));
        assert!(assigned.description.contains("a1"));
    }

    #[test]
    fn test_failed_event_carries_error() {
        let mut task = Task::new("t1", "Build", ts("2024-01-01T00:00:00Z"));
        task.status = TaskStatus::Failed;
        task.completed_at = Some(ts("2024-01-01T01:00:00Z"));
        task.error = Some("out of memory".into());
        let events = derive_events(&[task], &[], &[]);
        assert_eq!(events[0].kind, ActivityKind::TaskFailed);
        assert_eq!(events[0].metadata, EventMetadata::Error(Some("out of memory".into())));
        assert!(events[0].description.contains("out of memory"));
    }

    #[test]
    fn test_expired_delegation() {
        let mut d = Delegation::new("d1", "t1", Some("a1".into()), ts("2024-01-02T00:00:00Z"));
        d.status = DelegationStatus::Expired;
        d.expires_at = Some(ts("2024-01-05T00:00:00Z"));
        let events = derive_events(&[], &[d], &[]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ActivityKind::DelegationExpired);
        assert_eq!(events[0].timestamp, ts("2024-01-05T00:00:00Z"));
    }

    #[test]
    fn test_revoked_without_timestamp_is_skipped() {
        let mut d = Delegation::new("d1", "t1", None, ts("2024-01-02T00:00:00Z"));
        d.status = DelegationStatus::Revoked;
        let events = derive_events(&[], &[d], &[]);
        assert_eq!(events.len(), 1);
        assert!(events[0].description.contains("Unknown"));
    }
}
