//! Optional AI classification seam.
//!
//! The core never talks to a model directly. A [`Classifier`] returns a
//! [`Classification`] whose fields are all optional; [`apply_classification`]
//! copies over only what came back. Without a classifier, tasks keep
//! `ai_confidence == 0.0`, the "unclassified" marker.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::task::{Complexity, MAX_ESTIMATED_HOURS, Priority, Task, TaskType};

/// Loosely typed classifier answer. Unknown labels are ignored on apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classification {
    pub task_type: Option<String>,
    pub complexity: Option<String>,
    /// 1 (backlog) ..= 5 (critical)
    pub priority: Option<i64>,
    pub confidence: Option<f64>,
    pub estimated_hours: Option<f64>,
    pub key_terms: Option<Vec<String>>,
    pub related_systems: Option<Vec<String>>,
    pub reasoning: Option<String>,
}

/// One element of a batch answer. `task_index` is 1-based.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub task_index: Option<usize>,
    #[serde(flatten)]
    pub classification: Classification,
}

pub trait Classifier {
    fn classify(&self, task: &Task, context: Option<&str>) -> Result<Classification>;

    /// Classify several tasks at once. The answer has one slot per input task,
    /// in input order; `None` marks a task that got no usable answer.
    ///
    /// The default makes one `classify` call per task.
    fn classify_batch(&self, tasks: &[Task], context: Option<&str>) -> Result<Vec<Option<Classification>>> {
        Ok(tasks
            .iter()
            .map(|t| match self.classify(t, context) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(task = %t.id, error = %e, "classification failed");
                    None
                }
            })
            .collect())
    }
}

/// Put batch answers back in input order.
///
/// Items carrying a valid `task_index` go to that slot; items without one
/// take the slot matching their position. Out-of-range indexes are dropped.
pub fn align_batch(items: Vec<BatchItem>, len: usize) -> Vec<Option<Classification>> {
    let mut slots: Vec<Option<Classification>> = vec![None; len];
    for (pos, item) in items.into_iter().enumerate() {
        let idx = match item.task_index {
            Some(i) => i.checked_sub(1),
            None => Some(pos),
        };
        match idx.filter(|i| *i < len) {
            Some(i) => slots[i] = Some(item.classification),
            None => tracing::debug!(task_index = ?item.task_index, pos, "batch answer has no matching task"),
        }
    }
    slots
}

/// Copy present, valid fields of `c` onto `task`. Returns true if anything changed.
pub fn apply_classification(task: &mut Task, c: &Classification) -> bool {
    let before = task.clone();

    if let Some(t) = c.task_type.as_deref().and_then(TaskType::from_label) {
        task.task_type = t;
    }
    if let Some(cx) = c.complexity.as_deref().and_then(Complexity::from_label) {
        task.complexity = cx;
    }
    if let Some(p) = c.priority.and_then(Priority::from_ordinal) {
        task.priority = p;
    }
    if let Some(conf) = c.confidence.filter(|v| v.is_finite()) {
        if let Err(e) = task.set_confidence(conf) {
            tracing::debug!(task = %task.id, error = %e, "clamping classifier confidence");
            task.ai_confidence = conf.clamp(0.0, 1.0);
        }
    }
    if let Some(h) = c
        .estimated_hours
        .filter(|h| *h > 0.0 && *h <= MAX_ESTIMATED_HOURS)
    {
        task.estimated_hours = Some(h);
    }
    if let Some(terms) = c.key_terms.as_ref().filter(|v| !v.is_empty()) {
        task.key_terms = terms.clone();
    }
    if let Some(systems) = c.related_systems.as_ref().filter(|v| !v.is_empty()) {
        task.related_systems = systems.clone();
    }
    if let Some(r) = c.reasoning.as_ref() {
        task.ai_reasoning = r.clone();
    }

    *task != before
}

/// Classify every task in place. Failures are logged and leave the task as it was.
/// Returns how many tasks were updated.
pub fn classify_all(classifier: Option<&dyn Classifier>, tasks: &mut [Task], context: Option<&str>) -> usize {
    let Some(classifier) = classifier else {
        tracing::debug!("no classifier configured; tasks stay unclassified");
        return 0;
    };

    let mut updated = 0;
    for task in tasks.iter_mut() {
        match classifier.classify(task, context) {
            Ok(c) => {
                if apply_classification(task, &c) {
                    updated += 1;
                }
            }
            Err(e) => {
                tracing::warn!(task = %task.id, error = %e, "classification failed");
            }
        }
    }
    updated
}

/// Classify `tasks` with one batch call, falling back to one call per task
/// when the batch call fails. Returns how many tasks were updated.
pub fn classify_batch_all(classifier: Option<&dyn Classifier>, tasks: &mut [Task], context: Option<&str>) -> usize {
    let Some(classifier) = classifier else {
        tracing::debug!("no classifier configured; tasks stay unclassified");
        return 0;
    };
    if tasks.is_empty() {
        return 0;
    }

    let answers = match classifier.classify_batch(tasks, context) {
        Ok(answers) => answers,
        Err(e) => {
            tracing::warn!(error = %e, count = tasks.len(), "batch classification failed, classifying one by one");
            return classify_all(Some(classifier), tasks, context);
        }
    };

    let mut updated = 0;
    for (task, answer) in tasks.iter_mut().zip(answers) {
        if let Some(c) = answer {
            if apply_classification(task, &c) {
                updated += 1;
            }
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Classification);

    impl Classifier for Fixed {
        fn classify(&self, _task: &Task, _context: Option<&str>) -> Result<Classification> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn classify(&self, _task: &Task, _context: Option<&str>) -> Result<Classification> {
            anyhow::bail!("overloaded")
        }
    }

    /// Batch endpoint is down; single calls work.
    struct BatchDown {
        single_calls: std::cell::Cell<usize>,
    }

    impl Classifier for BatchDown {
        fn classify(&self, _task: &Task, _context: Option<&str>) -> Result<Classification> {
            self.single_calls.set(self.single_calls.get() + 1);
            Ok(Classification {
                priority: Some(5),
                confidence: Some(0.6),
                ..Classification::default()
            })
        }

        fn classify_batch(&self, _tasks: &[Task], _context: Option<&str>) -> Result<Vec<Option<Classification>>> {
            anyhow::bail!("batch answer was not a JSON array")
        }
    }

    #[test]
    fn test_batch_failure_falls_back_to_single_calls() {
        let mut tasks = vec![Task::new("a", "a"), Task::new("b", "b"), Task::new("c", "c")];
        let c = BatchDown {
            single_calls: std::cell::Cell::new(0),
        };
        assert_eq!(classify_batch_all(Some(&c), &mut tasks, None), 3);
        assert_eq!(c.single_calls.get(), 3);
        assert!(tasks.iter().all(|t| t.priority == Priority::Critical && t.ai_confidence == 0.6));
    }

    #[test]
    fn test_default_batch_is_per_task_and_skips_failures() {
        let mut tasks = vec![Task::new("a", "a"), Task::new("b", "b")];
        assert_eq!(classify_batch_all(Some(&Failing), &mut tasks, None), 0);
        assert_eq!(classify_batch_all(None, &mut tasks, None), 0);
        assert_eq!(classify_batch_all(Some(&Failing), &mut [], None), 0);

        let ok = Fixed(Classification {
            confidence: Some(0.4),
            ..Classification::default()
        });
        assert_eq!(classify_batch_all(Some(&ok), &mut tasks, None), 2);
    }

    #[test]
    fn test_align_batch_by_task_index() {
        let items: Vec<BatchItem> = serde_json::from_str(
            r#"[
                {"task_index": 2, "priority": 5, "confidence": 0.9},
                {"task_index": 1, "task_type": "bug"},
                {"task_index": 7, "priority": 1},
                {"task_index": 0, "priority": 1}
            ]"#,
        )
        .unwrap();
        let slots = align_batch(items, 3);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].as_ref().unwrap().task_type.as_deref(), Some("bug"));
        assert_eq!(slots[1].as_ref().unwrap().priority, Some(5));
        assert!(slots[2].is_none());
    }

    #[test]
    fn test_align_batch_without_indexes_uses_position() {
        let items: Vec<BatchItem> =
            serde_json::from_str(r#"[{"priority": 2}, {"priority": 4}]"#).unwrap();
        let slots = align_batch(items, 2);
        assert_eq!(slots[0].as_ref().unwrap().priority, Some(2));
        assert_eq!(slots[1].as_ref().unwrap().priority, Some(4));
    }

    #[test]
    fn test_apply_full_result() {
        let mut t = Task::new("t1", "Обновить документацию по интеграции");
        let c: Classification = serde_json::from_str(
            r#"{
                "task_type": "Документация",
                "complexity": "low",
                "priority": 4,
                "confidence": 0.85,
                "estimated_hours": 3,
                "key_terms": ["ГИСЗ"],
                "reasoning": "docs update"
            }"#,
        )
        .unwrap();

        assert!(apply_classification(&mut t, &c));
        assert_eq!(t.task_type, TaskType::Documentation);
        assert_eq!(t.complexity, Complexity::Low);
        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.ai_confidence, 0.85);
        assert_eq!(t.estimated_hours, Some(3.0));
        assert_eq!(t.key_terms, vec!["ГИСЗ".to_string()]);
        assert!(t.related_systems.is_empty());
        assert!(t.is_classified());
    }

    #[test]
    fn test_partial_result_keeps_existing_fields() {
        let mut t = Task::new("t1", "x").with_priority(Priority::High).with_estimate(5.0);
        let c = Classification {
            task_type: Some("gardening".into()),
            priority: Some(9),
            estimated_hours: Some(40.0),
            confidence: Some(1.7),
            ..Classification::default()
        };
        apply_classification(&mut t, &c);
        assert_eq!(t.task_type, TaskType::Unknown);
        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.estimated_hours, Some(5.0));
        assert_eq!(t.ai_confidence, 1.0);
    }

    #[test]
    fn test_classify_all_tolerates_absence_and_failure() {
        let mut tasks = vec![Task::new("a", "a"), Task::new("b", "b")];
        assert_eq!(classify_all(None, &mut tasks, None), 0);

        assert_eq!(classify_all(Some(&Failing), &mut tasks, None), 0);
        assert!(tasks.iter().all(|t| t.ai_confidence == 0.0));

        let ok = Fixed(Classification {
            confidence: Some(0.5),
            ..Classification::default()
        });
        assert_eq!(classify_all(Some(&ok), &mut tasks, Some("ctx")), 2);
        assert!(tasks.iter().all(|t| t.ai_confidence == 0.5));
    }
}
