use lanfinitas_protocol::*;

#[test]
fn test_task_decodes_camel_case_fields() {
    let raw = r#"{
        "id": "t1",
        "name": "Build",
        "priority": "HIGH",
        "status": "IN_PROGRESS",
        "assignedAgentId": "a1",
        "createdBy": "alice",
        "createdAt": "2024-01-01T00:00:00Z",
        "startedAt": "2024-01-01T00:05:00Z"
    }"#;
    let task: Task = serde_json::from_str(raw).unwrap();
    assert_eq!(task.priority, TaskPriority::High);
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.assigned_agent_id.as_deref(), Some("a1"));
    assert!(task.started_at.is_some());
    assert!(task.completed_at.is_none());
    assert!(task.error.is_none());
}

#[test]
fn test_malformed_timestamp_rejected() {
    let raw = r#"{"id": "t1", "name": "Build", "createdAt": "yesterday"}"#;
    assert!(serde_json::from_str::<Task>(raw).is_err(), "invalid dates must not decode");
}

#[test]
fn test_offset_less_timestamps_read_as_utc() {
    let raw = r#"{
        "id": "t1",
        "name": "Build",
        "status": "COMPLETED",
        "createdAt": "2024-01-01T00:00:00.123456",
        "completedAt": "2024-01-01T00:30:00",
        "startedAt": null
    }"#;
    let task: Task = serde_json::from_str(raw).unwrap();
    assert_eq!(task.created_at.to_rfc3339(), "2024-01-01T00:00:00.123456+00:00");
    assert_eq!(
        task.completed_at.map(|t| t.to_rfc3339()).as_deref(),
        Some("2024-01-01T00:30:00+00:00")
    );
    assert!(task.started_at.is_none());
}

#[test]
fn test_offset_less_timestamps_in_list_body() {
    let body = br#"[{"id": "d1", "taskId": "t1", "createdAt": "2024-01-02T08:15:00.5", "expiresAt": "2024-01-03T08:15:00Z"}]"#;
    let delegations: Vec<Delegation> = decode_body(body, 200).unwrap();
    assert_eq!(delegations[0].created_at.timestamp_subsec_millis(), 500);
    assert!(delegations[0].expires_at.is_some());
}

#[test]
fn test_malformed_timestamp_error_names_the_value() {
    let body = br#"[{"id": "t1", "name": "Build", "createdAt": "yesterday-ish"}]"#;
    match decode_body::<Vec<Task>>(body, 200) {
        Err(ProtocolError::Decode(message)) => {
            assert!(message.contains("invalid timestamp 'yesterday-ish'"), "{message}")
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn test_terminal_statuses() {
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
    assert!(!TaskStatus::Pending.is_terminal());
    assert!(!TaskStatus::Assigned.is_terminal());
    assert!(!TaskStatus::InProgress.is_terminal());
}

#[test]
fn test_agent_type_field_and_unknown_status() {
    let raw = r#"{"id": "a1", "name": "Bot1", "type": "SYSTEM", "status": "HIBERNATING"}"#;
    let agent: Agent = serde_json::from_str(raw).unwrap();
    assert_eq!(agent.agent_type, AgentType::System);
    assert_eq!(agent.status, AgentStatus::Unknown);
    assert!(agent.capabilities.is_empty());
}

#[test]
fn test_delegation_without_agent_id() {
    let raw = r#"{
        "id": "d1",
        "taskId": "t1",
        "status": "REVOKED",
        "permissions": ["read", "execute"],
        "createdAt": "2024-01-02T00:00:00Z",
        "revokedAt": "2024-01-03T00:00:00Z"
    }"#;
    let delegation: Delegation = serde_json::from_str(raw).unwrap();
    assert!(delegation.agent_id.is_none());
    assert_eq!(delegation.status, DelegationStatus::Revoked);
    assert_eq!(delegation.permissions, vec!["read", "execute"]);
}

#[test]
fn test_priority_parse_is_case_insensitive() {
    assert_eq!("critical".parse::<TaskPriority>().unwrap(), TaskPriority::Critical);
    assert_eq!("Background".parse::<TaskPriority>().unwrap(), TaskPriority::Background);
    assert!("urgent".parse::<TaskPriority>().is_err());
}

#[test]
fn test_create_task_request_validation() {
    let req = CreateTaskRequest::new("  Build pattern  ", TaskPriority::Low).unwrap();
    assert_eq!(req.name, "Build pattern");

    assert!(matches!(
        CreateTaskRequest::new("   ", TaskPriority::Low),
        Err(ProtocolError::Validation(_))
    ));

    let long = "x".repeat(MAX_TASK_NAME_LEN + 1);
    assert!(CreateTaskRequest::new(&long, TaskPriority::Low).is_err());
}

#[test]
fn test_revoke_path() {
    assert_eq!(delegation_revoke_path("d1"), "/api/v1/delegations/d1/revoke");
}
