//! Daily recommendation: pick the actionable tasks that fit an hours budget.
//!
//! Selection is greedy by score: walk the ranked list once, take every task
//! whose estimate still fits, skip the rest, never backtrack. A higher-scored
//! task is always preferred over a better packing of the day.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::scoring::{PriorityScorer, ScoredTask};
use crate::task::{Task, TaskStatus};
use crate::time::Clock;

/// Assumed effort for tasks without an estimate.
pub const DEFAULT_ESTIMATE_HOURS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Hours available per day.
    pub available_hours: f64,
    /// Cap on tasks recommended per day.
    pub max_tasks: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            available_hours: 8.0,
            max_tasks: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub tasks: Vec<ScoredTask>,
    pub total_hours: f64,
    pub available_hours: f64,
    pub remaining_hours: f64,
}

impl Recommendation {
    pub fn empty(available_hours: f64) -> Self {
        Self {
            tasks: Vec::new(),
            total_hours: 0.0,
            available_hours,
            remaining_hours: available_hours.max(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Available: {:.1}h\nRecommended tasks: {}\nExpected: {:.1}h\nRemaining: {:.1}h",
            self.available_hours,
            self.tasks.len(),
            self.total_hours,
            self.remaining_hours
        )
    }
}

pub fn estimated_hours(task: &Task) -> f64 {
    task.estimated_hours.unwrap_or(DEFAULT_ESTIMATE_HOURS)
}

/// True unless the task is closed or waits on a known task that is not Done.
///
/// Dependency ids missing from `by_id` do not block.
fn is_available(task: &Task, by_id: &HashMap<&str, TaskStatus>) -> bool {
    if task.status.is_closed() {
        return false;
    }
    !task.dependencies.iter().any(|dep| {
        by_id
            .get(dep.as_str())
            .is_some_and(|status| *status != TaskStatus::Done)
    })
}

/// Keep only candidates that can be worked on now. Order is preserved.
pub fn filter_available(ranked: Vec<ScoredTask>, all_tasks: &[Task]) -> Vec<ScoredTask> {
    let by_id: HashMap<&str, TaskStatus> =
        all_tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();

    ranked
        .into_iter()
        .filter(|s| {
            let ok = is_available(&s.task, &by_id);
            if !ok {
                tracing::trace!(task = %s.task.id, "not available");
            }
            ok
        })
        .collect()
}

/// Greedy fill over `candidates` (expected score-descending).
pub fn select_greedy(candidates: Vec<ScoredTask>, budget: f64, max_tasks: usize) -> Vec<ScoredTask> {
    let mut selected = Vec::new();
    if max_tasks == 0 {
        return selected;
    }

    let mut remaining = budget;
    for cand in candidates {
        let est = estimated_hours(&cand.task);
        if est > remaining {
            continue;
        }
        remaining -= est;
        selected.push(cand);
        if selected.len() >= max_tasks {
            break;
        }
    }
    selected
}

/// Availability filter + greedy selection over an already ranked list.
pub fn select(ranked: Vec<ScoredTask>, all_tasks: &[Task], budget: f64, max_tasks: usize) -> Recommendation {
    let candidates = filter_available(ranked, all_tasks);
    if candidates.is_empty() {
        return Recommendation::empty(budget);
    }

    let tasks = select_greedy(candidates, budget, max_tasks);
    let total_hours: f64 = tasks.iter().map(|s| estimated_hours(&s.task)).sum();

    Recommendation {
        tasks,
        total_hours,
        available_hours: budget,
        remaining_hours: (budget - total_hours).max(0.0),
    }
}

/// Scorer + planning limits bundled for the "what do I do today" question.
#[derive(Debug, Clone)]
pub struct RecommendationEngine<C: Clock> {
    scorer: PriorityScorer<C>,
    planning: PlanningConfig,
}

impl<C: Clock> RecommendationEngine<C> {
    pub fn new(scorer: PriorityScorer<C>, planning: PlanningConfig) -> Self {
        Self { scorer, planning }
    }

    pub fn scorer(&self) -> &PriorityScorer<C> {
        &self.scorer
    }

    pub fn planning(&self) -> &PlanningConfig {
        &self.planning
    }

    /// Recommend tasks for today. `available_hours` overrides the configured budget.
    pub fn recommend_for_today(&self, tasks: &[Task], available_hours: Option<f64>) -> Recommendation {
        let budget = available_hours.unwrap_or(self.planning.available_hours);
        let ranked = self.scorer.rank(tasks);
        let rec = select(ranked, tasks, budget, self.planning.max_tasks);
        tracing::info!(
            selected = rec.tasks.len(),
            total_hours = rec.total_hours,
            budget,
            "built daily recommendation"
        );
        rec
    }
}
