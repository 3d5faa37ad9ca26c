//! Background polling of the three backend collections.
//!
//! Each collection is fetched on its own interval and written into the
//! shared [`SnapshotState`]. The three collections are never fetched
//! together, so a snapshot may be briefly inconsistent (a delegation may
//! reference a task the task list does not yet contain).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use lanfinitas_protocol::{Agent, Delegation, Task};

use crate::client::{ApiClient, ClientError};
use crate::config::PollingConfig;

pub type SharedSnapshot = Arc<RwLock<SnapshotState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Tasks,
    Delegations,
    Agents,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Tasks,
        ResourceKind::Delegations,
        ResourceKind::Agents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Delegations => "delegations",
            Self::Agents => "agents",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceStatus {
    /// No answer yet, successful or not.
    #[default]
    Pending,
    Ready,
    /// Last fetch failed; `data` still holds the last good collection.
    Failed(String),
}

/// One polled collection plus its fetch bookkeeping.
#[derive(Debug, Clone)]
pub struct Resource<T> {
    pub data: Vec<T>,
    pub status: ResourceStatus,
    pub fetched_at: Option<DateTime<Utc>>,
    pub failures: u32,
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            status: ResourceStatus::Pending,
            fetched_at: None,
            failures: 0,
        }
    }
}

impl<T> Resource<T> {
    pub fn is_pending(&self) -> bool {
        self.status == ResourceStatus::Pending
    }

    /// Returns true when the data was replaced.
    fn apply(&mut self, result: Result<Vec<T>, String>) -> bool {
        match result {
            Ok(data) => {
                self.data = data;
                self.status = ResourceStatus::Ready;
                self.fetched_at = Some(Utc::now());
                self.failures = 0;
                true
            }
            Err(message) => {
                self.status = ResourceStatus::Failed(message);
                self.failures = self.failures.saturating_add(1);
                false
            }
        }
    }
}

/// Latest known state of the backend collections.
#[derive(Debug, Default)]
pub struct SnapshotState {
    pub tasks: Resource<Task>,
    pub delegations: Resource<Delegation>,
    pub agents: Resource<Agent>,
    /// Bumped whenever any collection is replaced.
    pub generation: u64,
}

impl SnapshotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSnapshot {
        Arc::new(RwLock::new(Self::new()))
    }

    /// True until both the task and delegation lists have answered once.
    /// The agent roster only feeds name lookups and does not gate loading.
    pub fn is_loading(&self) -> bool {
        self.tasks.is_pending() || self.delegations.is_pending()
    }

    pub fn apply_tasks(&mut self, result: Result<Vec<Task>, String>) {
        if self.tasks.apply(result) {
            self.generation += 1;
        }
    }

    pub fn apply_delegations(&mut self, result: Result<Vec<Delegation>, String>) {
        if self.delegations.apply(result) {
            self.generation += 1;
        }
    }

    pub fn apply_agents(&mut self, result: Result<Vec<Agent>, String>) {
        if self.agents.apply(result) {
            self.generation += 1;
        }
    }

    pub fn status(&self, kind: ResourceKind) -> &ResourceStatus {
        match kind {
            ResourceKind::Tasks => &self.tasks.status,
            ResourceKind::Delegations => &self.delegations.status,
            ResourceKind::Agents => &self.agents.status,
        }
    }

    pub fn fetched_at(&self, kind: ResourceKind) -> Option<DateTime<Utc>> {
        match kind {
            ResourceKind::Tasks => self.tasks.fetched_at,
            ResourceKind::Delegations => self.delegations.fetched_at,
            ResourceKind::Agents => self.agents.fetched_at,
        }
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Tasks => self.tasks.data.len(),
            ResourceKind::Delegations => self.delegations.data.len(),
            ResourceKind::Agents => self.agents.data.len(),
        }
    }
}

/// Fetches collections from the backend into a [`SharedSnapshot`].
#[derive(Clone)]
pub struct Poller {
    client: Arc<ApiClient>,
    state: SharedSnapshot,
    intervals: PollingConfig,
}

impl Poller {
    pub fn new(client: Arc<ApiClient>, state: SharedSnapshot, intervals: PollingConfig) -> Self {
        Self {
            client,
            state,
            intervals,
        }
    }

    pub fn state(&self) -> &SharedSnapshot {
        &self.state
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn interval(&self, kind: ResourceKind) -> Duration {
        let secs = match kind {
            ResourceKind::Tasks => self.intervals.tasks_secs,
            ResourceKind::Delegations => self.intervals.delegations_secs,
            ResourceKind::Agents => self.intervals.agents_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    /// Fetch one collection and store the result. Failures are recorded in
    /// the snapshot (keeping stale data) and also returned.
    pub async fn refresh(&self, kind: ResourceKind) -> Result<(), ClientError> {
        match kind {
            ResourceKind::Tasks => {
                let result = self.client.list_tasks().await;
                self.record(kind, &result);
                let (stored, outcome) = split_outcome(result);
                self.state.write().await.apply_tasks(stored);
                outcome
            }
            ResourceKind::Delegations => {
                let result = self.client.list_delegations().await;
                self.record(kind, &result);
                let (stored, outcome) = split_outcome(result);
                self.state.write().await.apply_delegations(stored);
                outcome
            }
            ResourceKind::Agents => {
                let result = self.client.list_agents().await;
                self.record(kind, &result);
                let (stored, outcome) = split_outcome(result);
                self.state.write().await.apply_agents(stored);
                outcome
            }
        }
    }

    /// Refresh all three collections concurrently; returns the failures.
    pub async fn refresh_all(&self) -> Vec<(ResourceKind, ClientError)> {
        let (tasks, delegations, agents) = tokio::join!(
            self.refresh(ResourceKind::Tasks),
            self.refresh(ResourceKind::Delegations),
            self.refresh(ResourceKind::Agents),
        );
        [
            (ResourceKind::Tasks, tasks),
            (ResourceKind::Delegations, delegations),
            (ResourceKind::Agents, agents),
        ]
        .into_iter()
        .filter_map(|(kind, r)| r.err().map(|e| (kind, e)))
        .collect()
    }

    /// Start one poll loop per collection. Loops exit once `shutdown`
    /// becomes true or its sender is dropped.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let poller = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { poller.poll_loop(kind, shutdown).await })
            })
            .collect()
    }

    async fn poll_loop(self, kind: ResourceKind, mut shutdown: watch::Receiver<bool>) {
        let period = self.interval(kind);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(resource = %kind, period_secs = period.as_secs(), "Polling started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Errors are already recorded in the snapshot and logged.
                    let _ = self.refresh(kind).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(resource = %kind, "Polling stopped");
    }

    fn record<T>(&self, kind: ResourceKind, result: &Result<Vec<T>, ClientError>) {
        match result {
            Ok(items) => {
                tracing::debug!(resource = %kind, count = items.len(), "Poll succeeded");
            }
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(resource = %kind, error = %e, "Poll rejected; check the API token");
            }
            Err(e) => {
                tracing::warn!(resource = %kind, error = %e, "Poll failed; keeping previous data");
            }
        }
    }
}

/// Separate what goes into the snapshot from what is reported to the caller.
fn split_outcome<T>(
    result: Result<Vec<T>, ClientError>,
) -> (Result<Vec<T>, String>, Result<(), ClientError>) {
    match result {
        Ok(data) => (Ok(data), Ok(())),
        Err(e) => (Err(e.to_string()), Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_until_tasks_and_delegations_answer() {
        let mut state = SnapshotState::new();
        assert!(state.is_loading());

        state.apply_tasks(Ok(vec![]));
        assert!(state.is_loading());

        state.apply_agents(Ok(vec![]));
        assert!(state.is_loading(), "agents do not gate loading");

        state.apply_delegations(Err("connection refused".into()));
        assert!(!state.is_loading(), "a failed answer still ends loading");
    }

    #[test]
    fn test_failure_keeps_stale_data_and_generation() {
        let mut state = SnapshotState::new();
        let task = Task::new("t1", "Build", Utc::now());
        state.apply_tasks(Ok(vec![task]));
        assert_eq!(state.generation, 1);

        state.apply_tasks(Err("timeout".into()));
        assert_eq!(state.generation, 1);
        assert_eq!(state.tasks.data.len(), 1);
        assert_eq!(state.tasks.failures, 1);
        assert_eq!(state.tasks.status, ResourceStatus::Failed("timeout".into()));

        state.apply_tasks(Ok(vec![]));
        assert_eq!(state.generation, 2);
        assert_eq!(state.tasks.failures, 0);
        assert_eq!(state.len(ResourceKind::Tasks), 0);
    }
}
