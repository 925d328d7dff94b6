//! taskcenter-core: task model, priority scoring and daily recommendations.

pub mod classify;
pub mod error;
pub mod history;
pub mod recommend;
pub mod scoring;
pub mod store;
pub mod task;
pub mod time;

pub use classify::{
    BatchItem, Classification, Classifier, align_batch, apply_classification, classify_all,
    classify_batch_all,
};
pub use error::{StoreError, TaskError};
pub use history::{HistoryAction, HistoryEvent, Statistics};
pub use recommend::{
    DEFAULT_ESTIMATE_HOURS, PlanningConfig, Recommendation, RecommendationEngine, filter_available,
    select, select_greedy,
};
pub use scoring::{
    ImportanceTier, PriorityScorer, ScoreBreakdown, ScoredTask, ScoringWeights, URGENCY_KEYWORDS,
    contains_urgency_keyword,
};
pub use store::{MemoryStore, TaskStore};
pub use task::{
    Complexity, MentionContext, PersonMention, Priority, Task, TaskStatus, TaskType,
    TicketReference,
};
pub use time::{Clock, FixedClock, SystemClock};
