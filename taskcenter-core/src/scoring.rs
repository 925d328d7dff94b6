//! Multi-factor priority scoring.
//!
//! Five independent sub-scores, each in [0, 1], are combined with a fixed
//! weight table into a 0-100 composite:
//!
//! | factor           | weight |
//! |------------------|--------|
//! | base priority    | 0.30   |
//! | deadline         | 0.25   |
//! | urgency keywords | 0.20   |
//! | blocking         | 0.15   |
//! | AI confidence    | 0.10   |
//!
//! Scoring is a pure function of the task, the full task set (for blocking)
//! and the injected clock.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TaskError;
use crate::task::{Priority, Task, TaskStatus};
use crate::time::{Clock, days_until};

/// Substrings that mark a task as time-critical (matched case-insensitively).
pub const URGENCY_KEYWORDS: [&str; 6] = ["срочно", "критично", "блокер", "asap", "сегодня", "горит"];

/// True if any urgency keyword occurs in `text`.
pub fn contains_urgency_keyword(text: &str) -> bool {
    count_urgency_keywords(text) > 0
}

/// Number of distinct urgency keywords occurring in `text`.
pub fn count_urgency_keywords(text: &str) -> usize {
    let lower = text.to_lowercase();
    URGENCY_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub base_priority: f64,
    pub deadline: f64,
    pub urgency_keywords: f64,
    pub blocking: f64,
    pub ai_confidence: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            base_priority: 0.30,
            deadline: 0.25,
            urgency_keywords: 0.20,
            blocking: 0.15,
            ai_confidence: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.base_priority + self.deadline + self.urgency_keywords + self.blocking + self.ai_confidence
    }

    /// Weights must be non-negative and add up to 1.0.
    pub fn validate(&self) -> Result<(), TaskError> {
        let all = [
            self.base_priority,
            self.deadline,
            self.urgency_keywords,
            self.blocking,
            self.ai_confidence,
        ];
        let sum = self.sum();
        if all.iter().any(|w| *w < 0.0) || (sum - 1.0).abs() > 1e-6 {
            return Err(TaskError::InvalidWeights(sum));
        }
        Ok(())
    }
}

/// Per-factor sub-scores plus the weighted composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base_priority: f64,
    pub deadline: f64,
    pub urgency_keywords: f64,
    pub blocking: f64,
    pub ai_confidence: f64,
    /// 0-100, one decimal.
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImportanceTier {
    Low,
    Medium,
    High,
    Critical,
}

impl ImportanceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ImportanceTier::Critical
        } else if score >= 60.0 {
            ImportanceTier::High
        } else if score >= 40.0 {
            ImportanceTier::Medium
        } else {
            ImportanceTier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImportanceTier::Critical => "[!] critical",
            ImportanceTier::High => "[^] high",
            ImportanceTier::Medium => "[-] medium",
            ImportanceTier::Low => "[~] low",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            ImportanceTier::Critical => "Start now, critical task.",
            ImportanceTier::High => "Do it today, high priority.",
            ImportanceTier::Medium => "Plan it for this week.",
            ImportanceTier::Low => "Can wait.",
        }
    }
}

impl fmt::Display for ImportanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A task paired with its composite score. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTask {
    pub task: Task,
    pub score: f64,
    pub tier: ImportanceTier,
}

#[derive(Debug, Clone)]
pub struct PriorityScorer<C: Clock> {
    weights: ScoringWeights,
    clock: C,
}

impl<C: Clock> PriorityScorer<C> {
    pub fn new(weights: ScoringWeights, clock: C) -> Self {
        Self { weights, clock }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Composite 0-100 score for `task`. `all_tasks` is only consulted for
    /// the blocking factor.
    pub fn score(&self, task: &Task, all_tasks: &[Task]) -> f64 {
        self.breakdown(task, all_tasks).total
    }

    pub fn breakdown(&self, task: &Task, all_tasks: &[Task]) -> ScoreBreakdown {
        let w = &self.weights;
        let base_priority = base_priority_score(task.priority);
        let deadline = self.deadline_score(task);
        let urgency_keywords = urgency_keyword_score(task);
        let blocking = blocking_score(task, all_tasks);
        let ai_confidence = task.ai_confidence.clamp(0.0, 1.0);

        let weighted = w.base_priority * base_priority
            + w.deadline * deadline
            + w.urgency_keywords * urgency_keywords
            + w.blocking * blocking
            + w.ai_confidence * ai_confidence;

        ScoreBreakdown {
            base_priority,
            deadline,
            urgency_keywords,
            blocking,
            ai_confidence,
            total: round1((weighted * 100.0).clamp(0.0, 100.0)),
        }
    }

    pub fn deadline_score(&self, task: &Task) -> f64 {
        match task.deadline {
            None => 0.3,
            Some(dl) => deadline_score_for_days(days_until(dl, &self.clock)),
        }
    }

    /// Score every open task and sort by score, highest first.
    ///
    /// Done and Cancelled tasks are dropped. The sort is stable, so equal
    /// scores keep their input order.
    pub fn rank(&self, tasks: &[Task]) -> Vec<ScoredTask> {
        let mut out: Vec<ScoredTask> = tasks
            .iter()
            .filter(|t| !t.status.is_closed())
            .map(|t| {
                let score = self.score(t, tasks);
                ScoredTask {
                    task: t.clone(),
                    score,
                    tier: ImportanceTier::from_score(score),
                }
            })
            .collect();

        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        tracing::debug!(ranked = out.len(), total = tasks.len(), "ranked tasks");
        out
    }
}

pub fn base_priority_score(priority: Priority) -> f64 {
    match priority {
        Priority::Critical => 1.0,
        Priority::High => 0.8,
        Priority::Medium => 0.5,
        Priority::Low => 0.3,
        Priority::Backlog => 0.1,
    }
}

pub fn deadline_score_for_days(days: i64) -> f64 {
    match days {
        d if d <= 0 => 1.0,
        1 => 0.9,
        d if d <= 3 => 0.8,
        d if d <= 7 => 0.6,
        d if d <= 14 => 0.4,
        _ => 0.2,
    }
}

pub fn urgency_keyword_score(task: &Task) -> f64 {
    let text = format!("{} {} {}", task.title, task.description, task.original_text);
    (count_urgency_keywords(&text) as f64 * 0.5).min(1.0)
}

/// Counts other tasks, not yet Done, that list `task` as a dependency.
pub fn blocking_score(task: &Task, all_tasks: &[Task]) -> f64 {
    let dependents = all_tasks
        .iter()
        .filter(|t| t.id != task.id && t.status != TaskStatus::Done)
        .filter(|t| t.dependencies.iter().any(|d| d == &task.id))
        .count();
    (dependents as f64 * 0.3).min(1.0)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn scorer() -> PriorityScorer<FixedClock> {
        PriorityScorer::new(ScoringWeights::default(), FixedClock::utc(now()))
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!(ScoringWeights::default().validate().is_ok());
        let bad = ScoringWeights {
            blocking: 0.5,
            ..ScoringWeights::default()
        };
        assert!(matches!(bad.validate(), Err(TaskError::InvalidWeights(_))));
    }

    #[test]
    fn test_base_priority_is_monotone() {
        let scores: Vec<f64> = Priority::ALL.iter().map(|p| base_priority_score(*p)).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1], "{scores:?}");
        }
    }

    #[test]
    fn test_deadline_buckets() {
        let s = scorer();
        let at = |days: i64| Task::new("t", "x").with_deadline(now() + Duration::days(days));

        assert_eq!(s.deadline_score(&at(0)), 1.0);
        assert_eq!(s.deadline_score(&at(-1)), 1.0);
        assert_eq!(s.deadline_score(&at(1)), 0.9);
        assert_eq!(s.deadline_score(&at(3)), 0.8);
        assert_eq!(s.deadline_score(&at(7)), 0.6);
        assert_eq!(s.deadline_score(&at(10)), 0.4);
        assert_eq!(s.deadline_score(&at(30)), 0.2);
        assert_eq!(s.deadline_score(&Task::new("t", "x")), 0.3);
    }

    #[test]
    fn test_deadline_later_today_counts_as_today() {
        let s = scorer();
        let later = Task::new("t", "x").with_deadline(now() + Duration::hours(11));
        assert_eq!(s.deadline_score(&later), 1.0);
    }

    #[test]
    fn test_urgency_keywords_case_insensitive_and_capped() {
        let one = Task::new("t", "Исправить баг - СРОЧНО!");
        assert_eq!(urgency_keyword_score(&one), 0.5);

        let three = Task::new("t", "срочно, горит, блокер");
        assert_eq!(urgency_keyword_score(&three), 1.0);

        assert_eq!(urgency_keyword_score(&Task::new("t", "calm")), 0.0);
    }

    #[test]
    fn test_blocking_counts_open_dependents_only() {
        let root = Task::new("root", "root");
        let tasks = vec![
            root.clone(),
            Task::new("a", "a").with_dependencies(["root"]),
            Task::new("b", "b").with_dependencies(["root"]),
            Task::new("c", "c")
                .with_dependencies(["root"])
                .with_status(TaskStatus::Done),
        ];
        assert!((blocking_score(&root, &tasks) - 0.6).abs() < 1e-9);

        let many: Vec<Task> = (0..5)
            .map(|i| Task::new(format!("d{i}"), "d").with_dependencies(["root"]))
            .collect();
        assert_eq!(blocking_score(&root, &many), 1.0);
        assert_eq!(blocking_score(&Task::new("lonely", "x"), &tasks), 0.0);
    }

    #[test]
    fn test_composite_score_example() {
        // High priority (0.8), due tomorrow (0.9), one keyword (0.5),
        // no dependents (0), confidence 0.9.
        let t = Task::new("t", "Проверить ФЛК сегодня")
            .with_priority(Priority::High)
            .with_deadline(now() + Duration::days(1))
            .with_confidence(0.9);
        let b = scorer().breakdown(&t, std::slice::from_ref(&t));
        // 0.24 + 0.225 + 0.1 + 0 + 0.09 = 0.655
        assert_eq!(b.total, 65.5);
    }

    #[test]
    fn test_score_bounds_and_rounding() {
        let s = scorer();
        let max = Task::new("m", "срочно горит")
            .with_priority(Priority::Critical)
            .with_deadline(now())
            .with_confidence(1.0);
        let deps: Vec<Task> = (0..4)
            .map(|i| Task::new(format!("d{i}"), "d").with_dependencies(["m"]))
            .chain(std::iter::once(max.clone()))
            .collect();
        assert_eq!(s.score(&max, &deps), 100.0);

        let min = Task::new("n", "x").with_priority(Priority::Backlog);
        let score = s.score(&min, &[]);
        assert!((0.0..=100.0).contains(&score));
        assert_eq!(score, (score * 10.0).round() / 10.0);
    }

    #[test]
    fn test_custom_weights_are_honoured() {
        let only_priority = ScoringWeights {
            base_priority: 1.0,
            deadline: 0.0,
            urgency_keywords: 0.0,
            blocking: 0.0,
            ai_confidence: 0.0,
        };
        let s = PriorityScorer::new(only_priority, FixedClock::utc(now()));
        let t = Task::new("t", "срочно").with_priority(Priority::Low);
        assert_eq!(s.score(&t, &[]), 30.0);
    }

    #[test]
    fn test_rank_excludes_closed_and_is_stable() {
        let tasks = vec![
            Task::new("first", "a"),
            Task::new("done", "b").with_status(TaskStatus::Done),
            Task::new("second", "c"),
            Task::new("top", "d").with_priority(Priority::Critical),
            Task::new("gone", "e").with_status(TaskStatus::Cancelled),
        ];
        let ranked = scorer().rank(&tasks);
        let ids: Vec<&str> = ranked.iter().map(|s| s.task.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
        assert!(ranked.iter().all(|s| !s.task.status.is_closed()));
    }

    #[test]
    fn test_rank_empty() {
        assert!(scorer().rank(&[]).is_empty());
    }

    #[test]
    fn test_tiers() {
        assert_eq!(ImportanceTier::from_score(80.0), ImportanceTier::Critical);
        assert_eq!(ImportanceTier::from_score(79.9), ImportanceTier::High);
        assert_eq!(ImportanceTier::from_score(40.0), ImportanceTier::Medium);
        assert_eq!(ImportanceTier::from_score(12.0), ImportanceTier::Low);
    }
}
