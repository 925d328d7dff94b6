use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Subcommand;
use std::io::Read;
use std::path::PathBuf;

use taskcenter_core::store::resolve;
use taskcenter_core::time::parse_local_deadline_to_utc;
use taskcenter_core::{
    Classifier, HistoryAction, HistoryEvent, Priority, Statistics, Task, TaskStatus, TaskStore,
    classify_batch_all,
};
use taskcenter_ingest::{KeywordExtractor, TaskParser};

use crate::App;
use crate::auth::anthropic_api_key;
use crate::llm::AnthropicClassifier;

#[derive(Subcommand, Debug)]
pub enum DepsCommand {
    /// Make <id> wait for <on>
    Add { id: String, on: String },
    /// Drop the dependency of <id> on <on>
    Remove { id: String, on: String },
}

fn read_input(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(t) = text {
        return Ok(t);
    }
    if let Some(p) = file {
        return std::fs::read_to_string(&p).with_context(|| format!("read {}", p.display()));
    }
    let mut s = String::new();
    std::io::stdin()
        .read_to_string(&mut s)
        .context("read task list from stdin")?;
    Ok(s)
}

/// Classifier if an API key is configured; otherwise tasks stay unclassified.
fn make_classifier(app: &App) -> Result<Option<AnthropicClassifier>> {
    match anthropic_api_key()? {
        Some(key) => Ok(Some(AnthropicClassifier::new(key, &app.cfg.llm))),
        None => {
            tracing::warn!("no Anthropic API key (ANTHROPIC_API_KEY or `taskcenter auth`); skipping classification");
            Ok(None)
        }
    }
}

/// Classify `tasks` in one batch. The user context is extended with the
/// domain keywords found across the batch.
fn classify_tasks(classifier: Option<&dyn Classifier>, tasks: &mut [Task], context: Option<&str>) -> Result<usize> {
    let keywords = KeywordExtractor::new()?;
    let mut found: Vec<String> = Vec::new();
    for task in tasks.iter() {
        for k in keywords.extract(&task.description) {
            if !found.contains(&k) {
                found.push(k);
            }
        }
    }

    let mut ctx = context.unwrap_or_default().trim().to_string();
    if !found.is_empty() {
        if !ctx.is_empty() {
            ctx.push('\n');
        }
        ctx.push_str(&format!("Keywords: {}", found.join(", ")));
    }
    let ctx = (!ctx.is_empty()).then_some(ctx);
    Ok(classify_batch_all(classifier, tasks, ctx.as_deref()))
}

/// Load, change one task, validate, save, and log the returned event.
fn mutate<F>(app: &App, id: &str, f: F) -> Result<Task>
where
    F: FnOnce(&mut Task, &[Task]) -> Result<HistoryEvent>,
{
    let mut tasks = app.store.load_all()?;
    let full_id = resolve(&tasks, id)?.id.clone();
    let snapshot = tasks.clone();
    let idx = tasks
        .iter()
        .position(|t| t.id == full_id)
        .context("task vanished during update")?;

    let task = &mut tasks[idx];
    let event = f(task, &snapshot)?;
    task.updated_at = Utc::now();
    task.validate()?;
    let updated = task.clone();

    app.store.save_all(&tasks)?;
    app.store.append_history(event)?;
    Ok(updated)
}

pub fn add(app: &App, text: Option<String>, file: Option<PathBuf>, classify: bool, context: Option<&str>) -> Result<()> {
    let input = read_input(text, file)?;
    let mut new_tasks = TaskParser::new()?.parse_task_list(&input);
    if new_tasks.is_empty() {
        println!("No tasks found in input.");
        return Ok(());
    }

    if classify {
        let classifier = make_classifier(app)?;
        let n = classify_tasks(
            classifier.as_ref().map(|c| c as &dyn Classifier),
            &mut new_tasks,
            context,
        )?;
        println!("Classified {n}/{} tasks", new_tasks.len());
    }

    let mut tasks = app.store.load_all()?;
    tasks.extend(new_tasks.iter().cloned());
    app.store.save_all(&tasks)?;

    for t in &new_tasks {
        let changes = serde_json::json!({ "title": t.title, "original_text": t.original_text });
        app.store
            .append_history(HistoryEvent::new(&t.id, HistoryAction::Create, changes))?;
        print_added(t);
    }

    let mut meta = app.store.load_metadata()?;
    meta.insert("last_import".into(), serde_json::json!(Utc::now().to_rfc3339()));
    meta.insert("last_import_count".into(), serde_json::json!(new_tasks.len()));
    app.store.save_metadata(meta)?;

    println!("\nAdded {} tasks", new_tasks.len());
    Ok(())
}

fn print_added(t: &Task) {
    println!("+ [{}] {} ({})", t.short_id(), t.title, t.priority);
    if !t.ticket_refs.is_empty() {
        let ids: Vec<&str> = t.ticket_refs.iter().map(|r| r.ticket_id.as_str()).collect();
        println!("    tickets: {}", ids.join(", "));
    }
    if !t.mentions.is_empty() {
        let names: Vec<String> = t
            .mentions
            .iter()
            .map(|m| match m.context {
                Some(c) => format!("{} ({:?})", m.name, c),
                None => m.name.clone(),
            })
            .collect();
        println!("    people: {}", names.join(", "));
    }
}

/// Tasks shown by `list`, in stored order.
fn list_filter<'a>(
    tasks: &'a [Task],
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    unclassified: bool,
    all: bool,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| match status {
            Some(s) => t.status == s,
            None => all || !t.status.is_closed(),
        })
        .filter(|t| priority.is_none_or(|p| t.priority == p))
        .filter(|t| !unclassified || !t.is_classified())
        .collect()
}

pub fn list(app: &App, status: Option<&str>, priority: Option<&str>, unclassified: bool, all: bool) -> Result<()> {
    let status: Option<TaskStatus> = status.map(str::parse).transpose()?;
    let priority: Option<Priority> = priority.map(str::parse).transpose()?;
    let tasks = app.store.load_all()?;

    let shown = list_filter(&tasks, status, priority, unclassified, all);

    if shown.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for t in shown {
        let due = t
            .deadline
            .map(|d| format!("  due {}", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        println!(
            "{:<8}  {:<11} {:<8} {}{}",
            t.short_id(),
            t.status.as_str(),
            t.priority.as_str(),
            t.title,
            due
        );
    }
    Ok(())
}

pub fn show(app: &App, id: &str) -> Result<()> {
    let t = app.store.find(id)?;
    println!("{}\n", t);
    println!("id:          {}", t.id);
    println!("type:        {}", t.task_type);
    println!("complexity:  {}", t.complexity);
    println!("priority:    {} ({})", t.priority, t.priority.ordinal());
    println!("status:      {}", t.status);
    if let Some(d) = t.deadline {
        println!("deadline:    {}", d.to_rfc3339());
    }
    if let Some(h) = t.estimated_hours {
        println!("estimate:    {h:.1}h");
    }
    if t.is_classified() {
        println!("confidence:  {:.2}", t.ai_confidence);
    }
    if !t.dependencies.is_empty() {
        println!("depends on:  {}", t.dependencies.join(", "));
    }
    for r in &t.ticket_refs {
        match &r.url {
            Some(u) => println!("ticket:      {} [{}] {}", r.ticket_id, r.project, u),
            None => println!("ticket:      {} [{}]", r.ticket_id, r.project),
        }
    }
    for m in &t.mentions {
        println!("person:      {} {:?}", m.name, m.context);
    }
    if !t.key_terms.is_empty() {
        println!("key terms:   {}", t.key_terms.join(", "));
    }
    if !t.description.is_empty() {
        println!("\n{}", t.description);
    }
    if !t.ai_reasoning.is_empty() {
        println!("\nAI: {}", t.ai_reasoning);
    }
    if !t.user_notes.is_empty() {
        println!("\nNotes:\n{}", t.user_notes);
    }
    Ok(())
}

pub fn set_status(app: &App, id: &str, status: &str, comment: Option<String>) -> Result<()> {
    let status: TaskStatus = status.parse()?;
    let now = Utc::now();
    let t = mutate(app, id, |task, _| {
        let from = task.status;
        task.set_status(status, now);
        let mut e = HistoryEvent::field_change(&task.id, HistoryAction::StatusChange, "status", from, status);
        if let Some(c) = comment {
            e = e.with_comment(c);
        }
        Ok(e)
    })?;
    println!("{}", t);
    Ok(())
}

pub fn set_priority(app: &App, id: &str, priority: &str) -> Result<()> {
    let priority: Priority = priority.parse()?;
    let t = mutate(app, id, |task, _| {
        let from = task.priority;
        task.priority = priority;
        Ok(HistoryEvent::field_change(&task.id, HistoryAction::PriorityChange, "priority", from, priority))
    })?;
    println!("{} -> {}", t, t.priority);
    Ok(())
}

pub fn deps(app: &App, cmd: DepsCommand) -> Result<()> {
    match cmd {
        DepsCommand::Add { id, on } => {
            let t = mutate(app, &id, |task, all| {
                let dep = resolve(all, &on)?.id.clone();
                task.add_dependency(&dep)?;
                Ok(HistoryEvent::new(
                    &task.id,
                    HistoryAction::Update,
                    serde_json::json!({ "dependencies": { "added": dep } }),
                ))
            })?;
            println!("{} now depends on {}", t.short_id(), t.dependencies.join(", "));
        }
        DepsCommand::Remove { id, on } => {
            mutate(app, &id, |task, all| {
                // Allow removing ids that no longer resolve.
                let dep = resolve(all, &on).map(|d| d.id.clone()).unwrap_or(on);
                if !task.remove_dependency(&dep) {
                    bail!("{} does not depend on {}", task.short_id(), dep);
                }
                Ok(HistoryEvent::new(
                    &task.id,
                    HistoryAction::Update,
                    serde_json::json!({ "dependencies": { "removed": dep } }),
                ))
            })?;
            println!("Dependency removed");
        }
    }
    Ok(())
}

pub fn set_estimate(app: &App, id: &str, hours: f64) -> Result<()> {
    let t = mutate(app, id, |task, _| {
        let from = task.estimated_hours;
        task.set_estimated_hours(Some(hours))?;
        Ok(HistoryEvent::field_change(&task.id, HistoryAction::Update, "estimated_hours", from, hours))
    })?;
    println!("{} estimate: {:.1}h", t.short_id(), hours);
    Ok(())
}

pub fn set_deadline(app: &App, id: &str, when: Option<String>, clear: bool) -> Result<()> {
    let deadline = match (when, clear) {
        (_, true) => None,
        (Some(w), false) => Some(parse_local_deadline_to_utc(&w, &app.cfg.timezone)?),
        (None, false) => bail!("pass a deadline or --clear"),
    };
    let t = mutate(app, id, |task, _| {
        let from = task.deadline;
        task.deadline = deadline;
        Ok(HistoryEvent::field_change(&task.id, HistoryAction::Update, "deadline", from, deadline))
    })?;
    match t.deadline {
        Some(d) => println!("{} due {}", t.short_id(), d.to_rfc3339()),
        None => println!("{} has no deadline", t.short_id()),
    }
    Ok(())
}

pub fn add_note(app: &App, id: &str, text: &str) -> Result<()> {
    let now = Utc::now();
    mutate(app, id, |task, _| {
        if !task.user_notes.is_empty() {
            task.user_notes.push('\n');
        }
        task.user_notes
            .push_str(&format!("[{}] {}", now.format("%Y-%m-%d %H:%M"), text.trim()));
        Ok(HistoryEvent::new(
            &task.id,
            HistoryAction::NoteAdd,
            serde_json::json!({ "note": text.trim() }),
        ))
    })?;
    println!("Note added");
    Ok(())
}

pub fn classify(app: &App, id: Option<&str>, context: Option<&str>) -> Result<()> {
    let Some(classifier) = make_classifier(app)? else {
        bail!("classification needs an API key: set ANTHROPIC_API_KEY or run `taskcenter auth paste-anthropic-key`");
    };

    let mut tasks = app.store.load_all()?;
    let targets: Vec<usize> = match id {
        Some(id) => {
            let full = resolve(&tasks, id)?.id.clone();
            tasks.iter().position(|t| t.id == full).into_iter().collect()
        }
        None => tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.status.is_closed() && !t.is_classified())
            .map(|(i, _)| i)
            .collect(),
    };
    if targets.is_empty() {
        println!("Nothing to classify.");
        return Ok(());
    }

    let mut batch: Vec<Task> = targets.iter().map(|&i| tasks[i].clone()).collect();
    classify_tasks(Some(&classifier as &dyn Classifier), &mut batch, context)?;

    let mut updated = 0;
    for (i, classified) in targets.iter().copied().zip(batch) {
        if classified == tasks[i] {
            continue;
        }
        updated += 1;
        let before = std::mem::replace(&mut tasks[i], classified);
        let t = &mut tasks[i];
        t.updated_at = Utc::now();
        app.store.append_history(HistoryEvent::new(
            &t.id,
            HistoryAction::Update,
            serde_json::json!({
                "classification": {
                    "task_type": t.task_type,
                    "complexity": t.complexity,
                    "priority": { "from": before.priority, "to": t.priority },
                    "confidence": t.ai_confidence,
                }
            }),
        ))?;
        println!("~ {} [{} / {} / {}] {:.2}", t, t.task_type, t.complexity, t.priority, t.ai_confidence);
    }
    app.store.save_all(&tasks)?;
    println!("\nClassified {updated}/{} tasks", targets.len());
    Ok(())
}

pub fn delete(app: &App, id: &str) -> Result<()> {
    let full = app.store.find(id)?.id;
    let removed = app.store.delete(&full)?;
    let waiting = app
        .store
        .load_all()?
        .iter()
        .filter(|t| t.dependencies.contains(&full))
        .count();
    app.store.append_history(HistoryEvent::new(
        &full,
        HistoryAction::Delete,
        serde_json::json!({ "title": removed.title }),
    ))?;
    println!("Deleted {}", removed);
    if waiting > 0 {
        println!("note: {waiting} task(s) still list it as a dependency (unknown ids do not block)");
    }
    Ok(())
}

pub fn history(app: &App, id: &str) -> Result<()> {
    let full = match app.store.find(id) {
        Ok(t) => t.id,
        // Deleted tasks only live on in history.
        Err(taskcenter_core::StoreError::NotFound(_)) => id.to_string(),
        Err(e) => return Err(e.into()),
    };
    let events = app.store.task_history(&full)?;
    if events.is_empty() {
        println!("No history for {id}");
        return Ok(());
    }
    for e in events {
        let comment = e.user_comment.map(|c| format!("  # {c}")).unwrap_or_default();
        println!(
            "{}  {:<15} {}{}",
            e.timestamp.format("%Y-%m-%d %H:%M"),
            serde_json::to_value(e.action)?.as_str().unwrap_or_default(),
            e.changes,
            comment
        );
    }
    Ok(())
}

pub fn stats(app: &App) -> Result<()> {
    let s = Statistics::from_tasks(&app.store.load_all()?, Utc::now());
    println!("Total tasks:   {}", s.total_tasks);
    println!("With deadline: {}", s.with_deadline);
    println!("Overdue:       {}", s.overdue);
    println!("Unclassified:  {}", s.unclassified);
    if let Some(at) = app.store.load_metadata()?.get("last_import").and_then(|v| v.as_str()) {
        println!("Last import:   {at}");
    }
    for (title, map) in [("By status", &s.by_status), ("By priority", &s.by_priority), ("By type", &s.by_type)] {
        println!("\n{title}:");
        for (k, v) in map {
            println!("  {k:<13} {v}");
        }
    }
    Ok(())
}
