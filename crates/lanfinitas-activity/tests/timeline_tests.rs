use chrono::{DateTime, Duration, Utc};
use lanfinitas_activity::*;
use lanfinitas_protocol::*;

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn build_task() -> Task {
    Task {
        id: "t1".into(),
        name: "Build".into(),
        priority: TaskPriority::High,
        status: TaskStatus::Completed,
        assigned_agent_id: Some("a1".into()),
        created_by: "alice".into(),
        created_at: ts("2024-01-01T00:00:00Z"),
        started_at: Some(ts("2024-01-01T00:05:00Z")),
        completed_at: Some(ts("2024-01-01T00:10:00Z")),
        error: None,
    }
}

fn revoked_delegation() -> Delegation {
    Delegation {
        id: "d1".into(),
        task_id: "t1".into(),
        agent_id: Some("a1".into()),
        delegator_id: "alice".into(),
        permissions: vec!["read".into(), "execute".into()],
        status: DelegationStatus::Revoked,
        created_at: ts("2024-01-02T00:00:00Z"),
        revoked_at: Some(ts("2024-01-03T00:00:00Z")),
        expires_at: None,
    }
}

// ─── Concrete scenarios ──────────────────────────────────────────────────────

#[test]
fn test_completed_task_yields_four_events_most_recent_first() {
    let agents = vec![Agent::new("a1", "Bot1")];
    let timeline = derive_timeline(&[build_task()], &[], &agents, false);

    let kinds: Vec<ActivityKind> = timeline.events().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActivityKind::TaskCompleted,
            ActivityKind::TaskStarted,
            ActivityKind::TaskAssigned,
            ActivityKind::TaskCreated,
        ]
    );

    let assigned = &timeline.events()[2];
    assert_eq!(assigned.timestamp, ts("2024-01-01T00:05:00Z"));
    assert!(assigned.description.contains("Bot1"), "agent name should be resolved");

    let created = &timeline.events()[3];
    assert_eq!(created.metadata, EventMetadata::Priority(TaskPriority::High));
}

#[test]
fn test_delegation_for_missing_task_uses_placeholder() {
    let timeline = derive_timeline(&[], &[revoked_delegation()], &[], false);
    let events = timeline.events();
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].kind, ActivityKind::DelegationRevoked);
    assert_eq!(events[0].timestamp, ts("2024-01-03T00:00:00Z"));

    assert_eq!(events[1].kind, ActivityKind::DelegationCreated);
    assert!(events[1].description.contains("Unknown Task"));
    assert_eq!(
        events[1].metadata,
        EventMetadata::Permissions(vec!["read".into(), "execute".into()])
    );
}

#[test]
fn test_unresolved_agent_falls_back_to_raw_id() {
    let mut delegation = revoked_delegation();
    delegation.agent_id = Some("agent-7f3c".into());
    let agents = vec![Agent::new("a1", "Bot1")];
    let events = derive_events(&[build_task()], &[delegation], &agents);
    let created = events
        .iter()
        .find(|e| e.kind == ActivityKind::DelegationCreated)
        .unwrap();
    assert!(created.description.contains("agent-7f3c"));
    assert!(created.description.contains("Build"), "task name resolves when present");
}

#[test]
fn test_blank_agent_ids_count_as_absent() {
    let mut task = build_task();
    task.assigned_agent_id = Some("".into());
    let mut delegation = revoked_delegation();
    delegation.agent_id = Some("  ".into());
    let agents = vec![Agent::new("a1", "Bot1")];

    let events = derive_events(&[task], &[delegation], &agents);
    assert!(
        events.iter().all(|e| e.kind != ActivityKind::TaskAssigned),
        "an empty assignment is no assignment"
    );
    let created = events
        .iter()
        .find(|e| e.kind == ActivityKind::DelegationCreated)
        .unwrap();
    assert_eq!(created.description, "\"Build\" delegated to Unknown (read, execute)");
    let revoked = events
        .iter()
        .find(|e| e.kind == ActivityKind::DelegationRevoked)
        .unwrap();
    assert!(revoked.description.ends_with("to Unknown was revoked"), "{}", revoked.description);
}

#[test]
fn test_blank_agent_name_falls_back_to_id() {
    let agents = vec![Agent::new("a1", "")];
    let events = derive_events(&[build_task()], &[], &agents);
    let assigned = events
        .iter()
        .find(|e| e.kind == ActivityKind::TaskAssigned)
        .unwrap();
    assert_eq!(assigned.description, "\"Build\" was assigned to a1");
}

// ─── Loading / empty states ──────────────────────────────────────────────────

#[test]
fn test_empty_state_distinct_from_loading() {
    let agents = vec![Agent::new("a1", "Bot1")];
    let empty = derive_timeline(&[], &[], &agents, false);
    let loading = derive_timeline(&[], &[], &agents, true);
    assert_eq!(empty, Timeline::Empty);
    assert_eq!(loading, Timeline::Loading);
    assert_ne!(empty, loading);
    assert!(empty.is_empty() && !empty.is_loading());
}

// ─── Properties ──────────────────────────────────────────────────────────────

fn assorted_tasks() -> Vec<Task> {
    let base = ts("2024-03-01T00:00:00Z");
    let statuses = [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];
    (0..24)
        .map(|i| {
            let created = base + Duration::minutes(i * 7);
            let status = statuses[(i as usize) % statuses.len()];
            let mut task = Task::new(format!("t{i}"), format!("Task {i}"), created);
            task.status = status;
            if i % 2 == 0 {
                task.assigned_agent_id = Some(format!("a{}", i % 3));
            }
            if i % 3 != 0 {
                task.started_at = Some(created + Duration::minutes(2));
            }
            if status.is_terminal() && i % 12 != 10 && i % 12 != 11 {
                task.completed_at = Some(created + Duration::minutes(5));
            }
            task
        })
        .collect()
}

#[test]
fn test_every_task_emits_between_one_and_six_events() {
    let tasks = assorted_tasks();
    let events = derive_events(&tasks, &[], &[]);
    for task in &tasks {
        let n = events.iter().filter(|e| e.subject_id == task.id).count();
        assert!((1..=6).contains(&n), "task {} produced {n} events", task.id);
    }
}

#[test]
fn test_sorted_non_increasing_by_timestamp() {
    let tasks = assorted_tasks();
    let events = derive_events(&tasks, &[revoked_delegation()], &[]);
    for pair in events.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }
}

#[test]
fn test_created_count_matches_task_count() {
    let tasks = assorted_tasks();
    let timeline = derive_timeline(&tasks, &[], &[], false);
    assert_eq!(timeline.counts().tasks_created, tasks.len());
}

#[test]
fn test_failed_count_requires_completion_timestamp() {
    let tasks = assorted_tasks();
    let expected = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed && t.completed_at.is_some())
        .count();
    let failed_without_ts = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed && t.completed_at.is_none())
        .count();
    assert!(failed_without_ts > 0, "fixture should include FAILED tasks without completion");

    let timeline = derive_timeline(&tasks, &[], &[], false);
    assert_eq!(timeline.counts().tasks_failed, expected);
}

#[test]
fn test_counts_consistent_with_events() {
    let tasks = assorted_tasks();
    let timeline = derive_timeline(&tasks, &[revoked_delegation()], &[], false);
    let counts = timeline.counts();
    assert_eq!(counts, ActivityCounts::tally(timeline.events()));
    assert_eq!(counts.delegations_created, 1);
}

#[test]
fn test_output_independent_of_input_order() {
    let tasks = assorted_tasks();
    let mut reversed = tasks.clone();
    reversed.reverse();
    let agents = vec![Agent::new("a0", "Zero"), Agent::new("a1", "One")];

    let forward = derive_events(&tasks, &[revoked_delegation()], &agents);
    let backward = derive_events(&reversed, &[revoked_delegation()], &agents);
    assert_eq!(forward, backward);
}

#[test]
fn test_rederivation_is_idempotent() {
    let tasks = assorted_tasks();
    let first = derive_timeline(&tasks, &[revoked_delegation()], &[], false);
    let second = derive_timeline(&tasks, &[revoked_delegation()], &[], false);
    assert_eq!(first, second);
}

#[test]
fn test_repeated_subject_ids_still_order_independent() {
    let first = Task::new("dup", "Alpha", ts("2024-01-01T00:00:00Z"));
    let second = Task::new("dup", "Beta", ts("2024-01-01T00:00:00Z"));

    let forward = derive_events(&[first.clone(), second.clone()], &[], &[]);
    let backward = derive_events(&[second, first], &[], &[]);
    assert_eq!(forward, backward);
    assert!(forward[0].description.starts_with("\"Alpha\""));
}
