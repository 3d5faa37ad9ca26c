//! Id-to-name lookups used while building event descriptions.
//!
//! Snapshots are polled independently, so a reference may point at an
//! agent or task the current snapshot does not contain. Lookups never
//! fail; they fall back to the raw id or a fixed label.

use std::collections::HashMap;

use lanfinitas_protocol::{Agent, Task, UNKNOWN_AGENT_LABEL, UNKNOWN_TASK_LABEL};

pub struct AgentDirectory<'a> {
    names: HashMap<&'a str, &'a str>,
}

impl<'a> AgentDirectory<'a> {
    pub fn new(agents: &'a [Agent]) -> Self {
        Self {
            names: agents
                .iter()
                .map(|a| (a.id.as_str(), a.name.as_str()))
                .collect(),
        }
    }

    /// Agent name, else the raw id, else [`UNKNOWN_AGENT_LABEL`].
    /// Blank ids and blank names count as absent.
    pub fn display_name<'s>(&'s self, agent_id: Option<&'s str>) -> &'s str {
        match present_id(agent_id) {
            Some(id) => self
                .names
                .get(id)
                .copied()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(id),
            None => UNKNOWN_AGENT_LABEL,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct TaskDirectory<'a> {
    names: HashMap<&'a str, &'a str>,
}

impl<'a> TaskDirectory<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        Self {
            names: tasks
                .iter()
                .map(|t| (t.id.as_str(), t.name.as_str()))
                .collect(),
        }
    }

    /// Task name, else [`UNKNOWN_TASK_LABEL`].
    pub fn display_name(&self, task_id: &str) -> &'a str {
        self.names
            .get(task_id)
            .copied()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(UNKNOWN_TASK_LABEL)
    }
}

/// `None` for a missing, empty or whitespace-only id.
pub fn present_id(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_agent_name_resolution() {
        let agents = vec![Agent::new("a1", "Bot1")];
        let dir = AgentDirectory::new(&agents);
        assert_eq!(dir.display_name(Some("a1")), "Bot1");
        assert_eq!(dir.display_name(Some("a404")), "a404");
        assert_eq!(dir.display_name(None), "Unknown");
    }

    #[test]
    fn test_task_name_fallback() {
        let tasks = vec![Task::new("t1", "Build", Utc::now())];
        let dir = TaskDirectory::new(&tasks);
        assert_eq!(dir.display_name("t1"), "Build");
        assert_eq!(dir.display_name("t2"), "Unknown Task");
    }
}
