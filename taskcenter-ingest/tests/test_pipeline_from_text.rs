use chrono::{Duration, TimeZone, Utc};
use taskcenter_core::{
    FixedClock, PlanningConfig, Priority, PriorityScorer, RecommendationEngine, ScoringWeights,
    TaskStatus,
};
use taskcenter_ingest::TaskParser;

const BACKLOG: &str = r#"
1. Проанализировать требования к ФЛК EGISZREMD-15263
2. Обновить документацию по интеграции с ГИСЗ - связаться с Петровым
3. Исправить баг с валидацией СНИЛСа - СРОЧНО!
4. Задача Саиды https://jira.example.com/browse/AN-1418
5. Подготовить отчет для руководства
6. Согласовать с Ивановым формат выгрузки. Блокер для релиза
7.
"#;

fn engine() -> RecommendationEngine<FixedClock> {
    let now = Utc.with_ymd_and_hms(2026, 4, 6, 8, 0, 0).unwrap();
    RecommendationEngine::new(
        PriorityScorer::new(ScoringWeights::default(), FixedClock::utc(now)),
        PlanningConfig::default(),
    )
}

/// Text -> tasks -> ranking: urgent lines float to the top.
#[test]
fn test_urgent_lines_rank_first() {
    let tasks = TaskParser::new().unwrap().parse_task_list(BACKLOG);
    assert_eq!(tasks.len(), 6);

    let ranked = engine().scorer().rank(&tasks);
    assert_eq!(ranked.len(), 6);

    let top: Vec<&str> = ranked.iter().take(2).map(|s| s.task.title.as_str()).collect();
    assert!(top.contains(&"Исправить баг с валидацией СНИЛСа - СРОЧНО!"));
    assert!(top.contains(&"Согласовать с Ивановым формат выгрузки"));
    assert!(ranked.iter().take(2).all(|s| s.task.priority == Priority::High));
}

/// Text -> tasks -> plan: default 2h estimates and the 8h budget allow four tasks.
#[test]
fn test_daily_plan_from_text() {
    let tasks = TaskParser::new().unwrap().parse_task_list(BACKLOG);
    let rec = engine().recommend_for_today(&tasks, None);

    assert_eq!(rec.tasks.len(), 4);
    assert_eq!(rec.total_hours, 8.0);
    assert_eq!(rec.remaining_hours, 0.0);
}

/// A dependency parsed tasks pick up later blocks until the blocker is Done.
#[test]
fn test_dependency_between_parsed_tasks() {
    let mut tasks = TaskParser::new().unwrap().parse_task_list(BACKLOG);
    let blocker_id = tasks[5].id.clone();
    tasks[4].add_dependency(&blocker_id).unwrap();
    tasks[4].deadline = Some(Utc.with_ymd_and_hms(2026, 4, 6, 18, 0, 0).unwrap());
    tasks[4].estimated_hours = Some(1.0);

    let e = engine();
    let rec = e.recommend_for_today(&tasks, Some(16.0));
    assert!(rec.tasks.iter().all(|s| s.task.id != tasks[4].id));

    // The blocker gains the blocking factor: 41.5 + 0.3 * 15.
    let ranked = e.scorer().rank(&tasks);
    let blocker = ranked.iter().find(|s| s.task.id == blocker_id).unwrap();
    assert_eq!(blocker.score, 46.0);

    tasks[5].set_status(TaskStatus::Done, Utc::now() + Duration::minutes(1));
    let rec = e.recommend_for_today(&tasks, Some(16.0));
    assert!(rec.tasks.iter().any(|s| s.task.id == tasks[4].id));
    assert!(rec.tasks.iter().all(|s| s.task.id != blocker_id));
}
