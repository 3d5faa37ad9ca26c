//! One-shot snapshot: fetch everything once, derive, print.

use std::io::Write;

use serde::Serialize;

use lanfinitas_activity::{derive_timeline, ActivityCounts, ActivityEvent, ActivityFeed, ActivityFilter};

use crate::poller::{Poller, SnapshotState};
use crate::view::{kind_label, TimelineBody, TimelineView};

#[derive(Debug, Serialize)]
struct JsonDump<'a> {
    state: &'static str,
    generation: u64,
    counts: ActivityCounts,
    events: Vec<&'a ActivityEvent>,
}

/// Fetch all collections, then write the timeline to `out`.
///
/// Fails only when every collection failed; partial failures are logged
/// and the timeline is derived from what did load.
pub async fn run_dump(
    poller: &Poller,
    filter: &ActivityFilter,
    limit: usize,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let failures = poller.refresh_all().await;
    for (kind, err) in &failures {
        tracing::warn!(resource = %kind, error = %err, "Fetch failed");
    }
    if failures.len() == 3 {
        let (_, first) = &failures[0];
        return Err(anyhow::anyhow!("backend unreachable: {first}"));
    }

    let state = poller.state().read().await;
    if json {
        write_json(&state, filter, limit, out)
    } else {
        write_text(&state, filter, limit, out)
    }
}

pub fn write_json(
    state: &SnapshotState,
    filter: &ActivityFilter,
    limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let timeline = derive_timeline(
        &state.tasks.data,
        &state.delegations.data,
        &state.agents.data,
        state.is_loading(),
    );
    let label = if timeline.is_loading() {
        "loading"
    } else if timeline.is_empty() {
        "empty"
    } else {
        "ready"
    };
    let dump = JsonDump {
        state: label,
        generation: state.generation,
        counts: timeline.counts(),
        events: filter.apply(timeline.events()).take(limit).collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &dump)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_text(
    state: &SnapshotState,
    filter: &ActivityFilter,
    limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut feed = ActivityFeed::new();
    let view = TimelineView::build(state, &mut feed, filter, limit);

    for health in &view.health {
        writeln!(out, "{}", health.summary())?;
    }
    let counts = view
        .count_items()
        .iter()
        .map(|(label, n)| format!("{label}: {n}"))
        .collect::<Vec<_>>()
        .join(" | ");
    writeln!(out, "{counts}")?;
    writeln!(out)?;

    match &view.body {
        TimelineBody::Loading => writeln!(out, "Loading activity...")?,
        TimelineBody::Empty => writeln!(out, "No activity yet.")?,
        TimelineBody::Filtered => {
            writeln!(out, "No events match filter '{}'.", view.filter)?
        }
        TimelineBody::Events(rows) => {
            for row in rows {
                writeln!(
                    out,
                    "{:<16}  {:<10}  {}",
                    row.time,
                    kind_label(row.kind),
                    row.description
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lanfinitas_protocol::{Agent, Delegation, Task};

    #[test]
    fn test_text_dump_empty_and_loading() {
        let mut out = Vec::new();
        write_text(&SnapshotState::new(), &ActivityFilter::all(), 10, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Loading activity..."));

        let mut state = SnapshotState::new();
        state.apply_tasks(Ok(vec![]));
        state.apply_delegations(Ok(vec![]));
        let mut out = Vec::new();
        write_text(&state, &ActivityFilter::all(), 10, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("No activity yet."));
        assert!(text.contains("Tasks Created: 0"));
    }

    #[test]
    fn test_text_dump_with_zero_limit() {
        let mut state = SnapshotState::new();
        state.apply_tasks(Ok(vec![Task::new("t1", "Build", Utc::now())]));
        state.apply_delegations(Ok(vec![]));
        let mut out = Vec::new();
        write_text(&state, &ActivityFilter::all(), 0, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Tasks Created: 1"));
        assert!(!text.contains("No events match"), "{text}");
    }

    #[test]
    fn test_json_dump_lists_events() {
        let mut state = SnapshotState::new();
        state.apply_tasks(Ok(vec![Task::new("t1", "Build", Utc::now())]));
        state.apply_delegations(Ok(vec![Delegation::new("d1", "t1", Some("a1".into()), Utc::now())]));
        state.apply_agents(Ok(vec![Agent::new("a1", "Bot1")]));

        let mut out = Vec::new();
        write_json(&state, &ActivityFilter::all(), 10, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["state"], "ready");
        assert_eq!(value["counts"]["tasks_created"], 1);
        assert_eq!(value["counts"]["delegations_created"], 1);
        assert_eq!(value["events"].as_array().unwrap().len(), 2);
    }
}
