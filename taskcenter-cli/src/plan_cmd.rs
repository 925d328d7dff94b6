use anyhow::Result;

use taskcenter_core::recommend::estimated_hours;
use taskcenter_core::time::{days_until, parse_timezone};
use taskcenter_core::{
    PlanningConfig, PriorityScorer, Recommendation, RecommendationEngine, ScoredTask, SystemClock,
    TaskStore,
};

use crate::App;

fn scorer(app: &App) -> Result<PriorityScorer<SystemClock>> {
    app.cfg.scoring.validate()?;
    let tz = parse_timezone(&app.cfg.timezone)?;
    Ok(PriorityScorer::new(app.cfg.scoring, SystemClock::new(tz)))
}

fn print_row(pos: usize, st: &ScoredTask) {
    let t = &st.task;
    println!(
        "{:>2}. {:>5.1}  {:<13} {:<8}  {}",
        pos,
        st.score,
        st.tier.label(),
        t.short_id(),
        t.title
    );
}

pub fn prioritize(app: &App, limit: usize) -> Result<()> {
    let tasks = app.store.load_all()?;
    let ranked = scorer(app)?.rank(&tasks);
    if ranked.is_empty() {
        println!("No open tasks.");
        return Ok(());
    }
    for (i, st) in ranked.iter().take(limit).enumerate() {
        print_row(i + 1, st);
    }
    if ranked.len() > limit {
        println!("... {} more", ranked.len() - limit);
    }
    Ok(())
}

pub fn score(app: &App, id: &str) -> Result<()> {
    let tasks = app.store.load_all()?;
    let task = taskcenter_core::store::resolve(&tasks, id)?;
    let scorer = scorer(app)?;
    let b = scorer.breakdown(task, &tasks);
    let w = scorer.weights();

    println!("{}\n", task);
    println!("{:<18} {:>6} {:>7} {:>7}", "factor", "value", "weight", "points");
    let rows = [
        ("base priority", b.base_priority, w.base_priority),
        ("deadline", b.deadline, w.deadline),
        ("urgency keywords", b.urgency_keywords, w.urgency_keywords),
        ("blocking", b.blocking, w.blocking),
        ("ai confidence", b.ai_confidence, w.ai_confidence),
    ];
    for (name, value, weight) in rows {
        println!("{name:<18} {value:>6.2} {weight:>7.2} {:>7.1}", value * weight * 100.0);
    }
    println!("{:<18} {:>6} {:>7} {:>7.1}", "total", "", "", b.total);

    let tier = taskcenter_core::ImportanceTier::from_score(b.total);
    println!("\n{}  {}", tier.label(), tier.advice());
    if let Some(dl) = task.deadline {
        let days = days_until(dl, scorer.clock());
        println!("deadline in {days} day(s)");
    }
    Ok(())
}

pub fn today(app: &App, hours: Option<f64>, max: Option<usize>) -> Result<()> {
    let planning = PlanningConfig {
        max_tasks: max.unwrap_or(app.cfg.planning.max_tasks),
        ..app.cfg.planning
    };
    if let Some(h) = hours.filter(|h| !h.is_finite() || *h < 0.0) {
        anyhow::bail!("available hours must be >= 0, got {h}");
    }

    let tasks = app.store.load_all()?;
    let engine = RecommendationEngine::new(scorer(app)?, planning);
    let rec = engine.recommend_for_today(&tasks, hours);
    print_recommendation(&rec);
    Ok(())
}

fn print_recommendation(rec: &Recommendation) {
    if rec.is_empty() {
        println!("Nothing fits today's budget.\n");
    } else {
        println!("Today:");
        for (i, st) in rec.tasks.iter().enumerate() {
            print_row(i + 1, st);
            println!("      ~{:.1}h  {}", estimated_hours(&st.task), st.tier.advice());
        }
        println!();
    }
    println!("{}", rec.summary());
}
