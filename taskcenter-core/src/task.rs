//! Task model shared by the extractor, scorer and selector.
//!
//! Storage (JSON files) is a separate layer; everything here stays small and serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TaskError;

/// Titles longer than this are cut on assignment.
pub const TITLE_MAX_CHARS: usize = 200;

/// Upper bound for a single task's estimate.
pub const MAX_ESTIMATED_HOURS: f64 = 16.0;

/// Project code used when a ticket id carries no letter segment.
pub const FALLBACK_PROJECT: &str = "REMD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Analysis,
    Documentation,
    Development,
    Coordination,
    Bug,
    #[default]
    Unknown,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::Analysis,
        TaskType::Documentation,
        TaskType::Development,
        TaskType::Coordination,
        TaskType::Bug,
        TaskType::Unknown,
    ];

    /// Lenient lookup used for classifier output: accepts the English names
    /// and the Russian labels the classification prompt historically used.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_lowercase();
        let t = match l.as_str() {
            "analysis" | "research" | "анализ/исследование" | "анализ" => TaskType::Analysis,
            "documentation" | "docs" | "документация" => TaskType::Documentation,
            "development" | "dev" | "разработка" => TaskType::Development,
            "coordination" | "координация" => TaskType::Coordination,
            "bug" | "баг/проблема" | "баг" => TaskType::Bug,
            "unknown" | "неизвестно" => TaskType::Unknown,
            _ => return None,
        };
        Some(t)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Analysis => "analysis",
            TaskType::Documentation => "documentation",
            TaskType::Development => "development",
            TaskType::Coordination => "coordination",
            TaskType::Bug => "bug",
            TaskType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" | "низкая" => Some(Complexity::Low),
            "medium" | "средняя" => Some(Complexity::Medium),
            "high" | "высокая" => Some(Complexity::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

/// Ordinal priority. Higher ordinal = more important.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Backlog = 1,
    Low = 2,
    #[default]
    Medium = 3,
    High = 4,
    Critical = 5,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Backlog,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(n: i64) -> Option<Self> {
        match n {
            1 => Some(Priority::Backlog),
            2 => Some(Priority::Low),
            3 => Some(Priority::Medium),
            4 => Some(Priority::High),
            5 => Some(Priority::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Backlog => "backlog",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let l = s.trim().to_lowercase();
        if let Ok(n) = l.parse::<i64>() {
            if let Some(p) = Priority::from_ordinal(n) {
                return Ok(p);
            }
        }
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == l)
            .ok_or(TaskError::UnknownVariant {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    Blocked,
    Review,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::New,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Review,
        TaskStatus::Done,
        TaskStatus::Cancelled,
    ];

    /// Done and Cancelled tasks never get scored or recommended.
    pub fn is_closed(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let l = s.trim().to_lowercase().replace('-', "_");
        TaskStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == l)
            .ok_or(TaskError::UnknownVariant {
                kind: "status",
                value: s.to_string(),
            })
    }
}

macro_rules! display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(TaskType, Complexity, Priority, TaskStatus);

/// Pointer to an issue in an external tracker, e.g. `AN-1418`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReference {
    pub ticket_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub project: String,
}

impl TicketReference {
    pub fn new(ticket_id: impl Into<String>, url: Option<String>) -> Self {
        let ticket_id = ticket_id.into();
        let project = match ticket_id.split_once('-') {
            Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
            _ => FALLBACK_PROJECT.to_string(),
        };
        Self {
            ticket_id,
            url,
            project,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionContext {
    Originator,
    Author,
    Coordination,
    Delegation,
    Approval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonMention {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MentionContext>,
}

impl PersonMention {
    pub fn new(name: impl Into<String>, context: Option<MentionContext>) -> Self {
        Self {
            name: name.into(),
            role: None,
            context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Line exactly as the user typed it.
    #[serde(default)]
    pub original_text: String,

    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub ticket_refs: Vec<TicketReference>,
    #[serde(default)]
    pub mentions: Vec<PersonMention>,
    /// Ids of tasks that must be Done before this one is available.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,

    /// 0.0 marks an unclassified task.
    #[serde(default)]
    pub ai_confidence: f64,
    #[serde(default)]
    pub ai_reasoning: String,
    #[serde(default)]
    pub key_terms: Vec<String>,
    #[serde(default)]
    pub related_systems: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_notes: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_status_change: Option<DateTime<Utc>>,
}

impl Task {
    /// Unchecked constructor for a known id. Stored tasks go through
    /// [`Task::create`] or are checked by [`Task::validate`] on save.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: truncate_chars(title.into().trim(), TITLE_MAX_CHARS),
            description: String::new(),
            original_text: String::new(),
            task_type: TaskType::Unknown,
            complexity: Complexity::Medium,
            priority: Priority::Medium,
            status: TaskStatus::New,
            ticket_refs: Vec::new(),
            mentions: Vec::new(),
            dependencies: Vec::new(),
            deadline: None,
            estimated_hours: None,
            ai_confidence: 0.0,
            ai_reasoning: String::new(),
            key_terms: Vec::new(),
            related_systems: Vec::new(),
            tags: Vec::new(),
            user_notes: String::new(),
            created_at: now,
            updated_at: now,
            last_status_change: None,
        }
    }

    /// New task with a random UUID id. The title must not be blank.
    pub fn create(title: impl Into<String>) -> Result<Self, TaskError> {
        let task = Self::new(uuid::Uuid::new_v4().to_string(), title);
        if task.title.is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        Ok(task)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_estimate(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.ai_confidence = confidence;
        self
    }

    /// Short id for listings.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    pub fn is_classified(&self) -> bool {
        self.ai_confidence > 0.0
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), TaskError> {
        let t = title.trim();
        if t.is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        self.title = truncate_chars(t, TITLE_MAX_CHARS);
        Ok(())
    }

    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if self.status != status {
            self.status = status;
            self.last_status_change = Some(now);
        }
        self.updated_at = now;
    }

    pub fn set_estimated_hours(&mut self, hours: Option<f64>) -> Result<(), TaskError> {
        if let Some(h) = hours {
            check_estimate(h)?;
        }
        self.estimated_hours = hours;
        Ok(())
    }

    pub fn set_confidence(&mut self, confidence: f64) -> Result<(), TaskError> {
        check_confidence(confidence)?;
        self.ai_confidence = confidence;
        Ok(())
    }

    /// Adds a dependency; duplicates are ignored.
    pub fn add_dependency(&mut self, id: &str) -> Result<(), TaskError> {
        if id == self.id {
            return Err(TaskError::SelfDependency(self.id.clone()));
        }
        if !self.dependencies.iter().any(|d| d == id) {
            self.dependencies.push(id.to_string());
        }
        Ok(())
    }

    pub fn remove_dependency(&mut self, id: &str) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|d| d != id);
        before != self.dependencies.len()
    }

    /// Checks the invariants a stored task must hold.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.title.trim().is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        if self.dependencies.iter().any(|d| d == &self.id) {
            return Err(TaskError::SelfDependency(self.id.clone()));
        }
        if let Some(h) = self.estimated_hours {
            check_estimate(h)?;
        }
        check_confidence(self.ai_confidence)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.short_id(), self.title, self.status)
    }
}

fn check_estimate(h: f64) -> Result<(), TaskError> {
    if (0.0..=MAX_ESTIMATED_HOURS).contains(&h) {
        Ok(())
    } else {
        Err(TaskError::EstimateOutOfRange(h))
    }
}

fn check_confidence(c: f64) -> Result<(), TaskError> {
    if (0.0..=1.0).contains(&c) {
        Ok(())
    } else {
        Err(TaskError::ConfidenceOutOfRange(c))
    }
}

/// Char-boundary safe prefix.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_project_from_prefix() {
        let t = TicketReference::new("EGISZREMD-15284", None);
        assert_eq!(t.project, "EGISZREMD");

        let bare = TicketReference::new("15284", None);
        assert_eq!(bare.project, FALLBACK_PROJECT);
    }

    #[test]
    fn title_is_trimmed_and_never_empty() {
        let mut t = Task::new("t1", "  Обновить документацию  ");
        assert_eq!(t.title, "Обновить документацию");
        assert_eq!(t.set_title("   "), Err(TaskError::EmptyTitle));
        assert_eq!(t.title, "Обновить документацию");

        assert_eq!(Task::create(" \t ").unwrap_err(), TaskError::EmptyTitle);
        let created = Task::create("Созвон").unwrap();
        assert_eq!(created.id.len(), 36);
        assert!(created.validate().is_ok());
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut t = Task::new("t1", "a");
        assert!(matches!(
            t.add_dependency("t1"),
            Err(TaskError::SelfDependency(_))
        ));
        t.add_dependency("t2").unwrap();
        t.add_dependency("t2").unwrap();
        assert_eq!(t.dependencies, vec!["t2".to_string()]);

        let bad = Task::new("t3", "b").with_dependencies(["t3"]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn estimate_bounds() {
        let mut t = Task::new("t1", "a");
        assert!(t.set_estimated_hours(Some(16.0)).is_ok());
        assert!(t.set_estimated_hours(Some(16.5)).is_err());
        assert!(t.set_estimated_hours(Some(-1.0)).is_err());
        assert_eq!(t.estimated_hours, Some(16.0));
    }

    #[test]
    fn status_change_is_timestamped() {
        let mut t = Task::new("t1", "a");
        let now = Utc::now();
        t.set_status(TaskStatus::Done, now);
        assert_eq!(t.last_status_change, Some(now));
        assert!(t.status.is_closed());
    }

    #[test]
    fn parse_priority_and_status() {
        assert_eq!("4".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("Critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("9".parse::<Priority>().is_err());
        assert_eq!(
            "in-progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert!(Priority::Critical > Priority::Backlog);
    }

    #[test]
    fn labels_accept_russian_aliases() {
        assert_eq!(TaskType::from_label("Баг/Проблема"), Some(TaskType::Bug));
        assert_eq!(Complexity::from_label("высокая"), Some(Complexity::High));
        assert_eq!(TaskType::from_label("gardening"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let t = Task::new("t1", "a").with_status(TaskStatus::InProgress);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"in_progress\""));
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
