//! Memoized timeline plus the kind filter used by the console.

use std::collections::HashSet;

use lanfinitas_protocol::{Agent, Delegation, Task};

use crate::deriver::{derive_timeline, Timeline};
use crate::event::{ActivityEvent, ActivityKind};

/// Caches the last derived timeline against the snapshot generation that
/// produced it. Re-deriving with an unchanged generation and loading flag
/// returns the cached timeline.
#[derive(Debug, Default)]
pub struct ActivityFeed {
    cached: Option<(u64, bool, Timeline)>,
    derivations: u64,
}

impl ActivityFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeline(
        &mut self,
        generation: u64,
        tasks: &[Task],
        delegations: &[Delegation],
        agents: &[Agent],
        loading: bool,
    ) -> &Timeline {
        match self.cached.take() {
            Some(entry) if entry.0 == generation && entry.1 == loading => &self.cached.insert(entry).2,
            _ => {
                let timeline = derive_timeline(tasks, delegations, agents, loading);
                self.derivations += 1;
                tracing::trace!(
                    generation,
                    loading,
                    events = timeline.events().len(),
                    "Derived activity timeline"
                );
                &self.cached.insert((generation, loading, timeline)).2
            }
        }
    }

    /// Number of times the timeline was actually recomputed.
    pub fn derivations(&self) -> u64 {
        self.derivations
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

/// Restricts which event kinds are displayed. Counts are never filtered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivityFilter {
    kinds: Option<HashSet<ActivityKind>>,
}

impl ActivityFilter {
    pub fn all() -> Self {
        Self { kinds: None }
    }

    pub fn only(kinds: impl IntoIterator<Item = ActivityKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
        }
    }

    /// Parse `all` or a comma separated list of kind names. Also accepts
    /// the shorthands `tasks` and `delegations`.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        let mut kinds = HashSet::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "tasks" => kinds.extend(ActivityKind::ALL.into_iter().filter(|k| k.is_task())),
                "delegations" => {
                    kinds.extend(ActivityKind::ALL.into_iter().filter(|k| k.is_delegation()))
                }
                other => match ActivityKind::parse(other) {
                    Some(kind) => {
                        kinds.insert(kind);
                    }
                    None => return Err(format!("unknown event kind '{other}'")),
                },
            }
        }
        Ok(Self { kinds: Some(kinds) })
    }

    pub fn is_all(&self) -> bool {
        self.kinds.is_none()
    }

    pub fn matches(&self, kind: ActivityKind) -> bool {
        self.kinds.as_ref().map_or(true, |k| k.contains(&kind))
    }

    pub fn apply<'a>(&'a self, events: &'a [ActivityEvent]) -> impl Iterator<Item = &'a ActivityEvent> + 'a {
        events.iter().filter(move |e| self.matches(e.kind))
    }

    /// Human readable form for status lines.
    pub fn describe(&self) -> String {
        match &self.kinds {
            None => "all".to_string(),
            Some(kinds) => {
                let mut names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
                names.sort_unstable();
                names.join(",")
            }
        }
    }
}
