//! Change history and task statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Update,
    StatusChange,
    PriorityChange,
    Delete,
    NoteAdd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    /// Free-form "what changed", e.g. `{"status": {"from": "new", "to": "done"}}`.
    pub changes: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_comment: Option<String>,
}

impl HistoryEvent {
    pub fn new(task_id: impl Into<String>, action: HistoryAction, changes: serde_json::Value) -> Self {
        Self {
            task_id: task_id.into(),
            timestamp: Utc::now(),
            action,
            changes,
            user_comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.user_comment = Some(comment.into());
        self
    }

    /// `{"<field>": {"from": .., "to": ..}}`
    pub fn field_change(
        task_id: impl Into<String>,
        action: HistoryAction,
        field: &str,
        from: impl Serialize,
        to: impl Serialize,
    ) -> Self {
        let changes = serde_json::json!({ field: { "from": from, "to": to } });
        Self::new(task_id, action, changes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_tasks: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub with_deadline: usize,
    pub overdue: usize,
    pub unclassified: usize,
}

impl Statistics {
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let mut s = Statistics {
            total_tasks: tasks.len(),
            ..Default::default()
        };
        for t in tasks {
            *s.by_status.entry(t.status.to_string()).or_default() += 1;
            *s.by_priority.entry(t.priority.to_string()).or_default() += 1;
            *s.by_type.entry(t.task_type.to_string()).or_default() += 1;
            if let Some(dl) = t.deadline {
                s.with_deadline += 1;
                if dl < now && t.status != TaskStatus::Done {
                    s.overdue += 1;
                }
            }
            if !t.is_classified() {
                s.unclassified += 1;
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::Duration;

    #[test]
    fn test_field_change_shape() {
        let e = HistoryEvent::field_change("t1", HistoryAction::StatusChange, "status", "new", "done")
            .with_comment("shipped");
        assert_eq!(e.changes["status"]["from"], "new");
        assert_eq!(e.changes["status"]["to"], "done");

        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"status_change\""));
    }

    #[test]
    fn test_statistics() {
        let now = Utc::now();
        let tasks = vec![
            Task::new("a", "a").with_deadline(now - Duration::days(1)),
            Task::new("b", "b")
                .with_deadline(now - Duration::days(1))
                .with_status(TaskStatus::Done),
            Task::new("c", "c").with_priority(Priority::High).with_confidence(0.7),
        ];
        let s = Statistics::from_tasks(&tasks, now);
        assert_eq!(s.total_tasks, 3);
        assert_eq!(s.with_deadline, 2);
        assert_eq!(s.overdue, 1);
        assert_eq!(s.unclassified, 2);
        assert_eq!(s.by_priority.get("high"), Some(&1));
        assert_eq!(s.by_status.get("new"), Some(&2));
    }
}
