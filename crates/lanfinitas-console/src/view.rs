//! Render model shared by the terminal UI and the one-shot dump.
//!
//! Built from a [`SnapshotState`] and an [`ActivityFeed`]; contains only
//! display-ready strings so rendering stays free of derivation logic.

use chrono::{DateTime, Local, Utc};

use lanfinitas_activity::{ActivityCounts, ActivityEvent, ActivityFeed, ActivityFilter, ActivityKind, Timeline};

use crate::poller::{ResourceKind, ResourceStatus, SnapshotState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHealth {
    pub kind: ResourceKind,
    pub label: &'static str,
    pub count: usize,
    pub age_secs: Option<i64>,
    pub error: Option<String>,
}

impl ResourceHealth {
    pub fn summary(&self) -> String {
        let age = self
            .age_secs
            .map(|s| format!("{s}s ago"))
            .unwrap_or_else(|| "never".to_string());
        format!("{} {} ({}, {})", self.kind, self.label, self.count, age)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub time: String,
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineBody {
    Loading,
    Empty,
    /// Events exist but the filter hides all of them.
    Filtered,
    Events(Vec<EventRow>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineView {
    pub generation: u64,
    pub health: Vec<ResourceHealth>,
    pub counts: ActivityCounts,
    pub total_events: usize,
    pub filter: String,
    pub body: TimelineBody,
}

impl TimelineView {
    pub fn build(
        state: &SnapshotState,
        feed: &mut ActivityFeed,
        filter: &ActivityFilter,
        max_events: usize,
    ) -> Self {
        let now = Utc::now();
        let timeline = feed.timeline(
            state.generation,
            &state.tasks.data,
            &state.delegations.data,
            &state.agents.data,
            state.is_loading(),
        );

        let body = match timeline {
            Timeline::Loading => TimelineBody::Loading,
            Timeline::Empty => TimelineBody::Empty,
            Timeline::Ready { events, .. } => {
                if filter.apply(events).next().is_none() {
                    TimelineBody::Filtered
                } else {
                    TimelineBody::Events(
                        filter
                            .apply(events)
                            .take(max_events)
                            .map(|e| EventRow::from_event(e, now))
                            .collect(),
                    )
                }
            }
        };

        Self {
            generation: state.generation,
            health: ResourceKind::ALL
                .into_iter()
                .map(|kind| resource_health(state, kind, now))
                .collect(),
            counts: timeline.counts(),
            total_events: timeline.events().len(),
            filter: filter.describe(),
            body,
        }
    }

    pub fn rows(&self) -> &[EventRow] {
        match &self.body {
            TimelineBody::Events(rows) => rows,
            _ => &[],
        }
    }

    /// Labelled tallies in display order.
    pub fn count_items(&self) -> [(&'static str, usize); 4] {
        [
            ("Tasks Created", self.counts.tasks_created),
            ("Completed", self.counts.tasks_completed),
            ("Delegations", self.counts.delegations_created),
            ("Failed Tasks", self.counts.tasks_failed),
        ]
    }
}

impl EventRow {
    fn from_event(event: &ActivityEvent, now: DateTime<Utc>) -> Self {
        Self {
            time: format_event_time(event.timestamp, now),
            kind: event.kind,
            title: event.title.clone(),
            description: event.description.clone(),
        }
    }
}

fn resource_health(state: &SnapshotState, kind: ResourceKind, now: DateTime<Utc>) -> ResourceHealth {
    let status = state.status(kind);
    let (label, error) = match status {
        ResourceStatus::Pending => ("loading", None),
        ResourceStatus::Ready => ("ok", None),
        ResourceStatus::Failed(msg) => ("stale", Some(msg.clone())),
    };
    ResourceHealth {
        kind,
        label,
        count: state.len(kind),
        age_secs: state
            .fetched_at(kind)
            .map(|ts| now.signed_duration_since(ts).num_seconds().max(0)),
        error,
    }
}

/// Same-day events show the time only; older ones include the date.
pub fn format_event_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let local = ts.with_timezone(&Local);
    if local.date_naive() == now.with_timezone(&Local).date_naive() {
        local.format("%H:%M:%S").to_string()
    } else {
        local.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Short label used in the kind column.
pub fn kind_label(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::TaskCreated => "created",
        ActivityKind::TaskAssigned => "assigned",
        ActivityKind::TaskStarted => "started",
        ActivityKind::TaskCompleted => "completed",
        ActivityKind::TaskFailed => "failed",
        ActivityKind::TaskCancelled => "cancelled",
        ActivityKind::DelegationCreated => "delegated",
        ActivityKind::DelegationRevoked => "revoked",
        ActivityKind::DelegationExpired => "expired",
    }
}

pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
