//! Free-form task line parser
//!
//! Expected input: one task per line, optionally numbered:
//!   1. Проанализировать требования к ФЛК EGISZREMD-15263
//!   2) Обновить документацию по интеграции с ГИСЗ - связаться с Петровым
//!   3. Исправить баг с валидацией СНИЛСа - СРОЧНО!
//!
//! Each line becomes a `Task` with ticket references, person mentions and an
//! urgency-forced priority. Malformed lines never fail: they just produce a
//! task with empty extraction lists.

use anyhow::Result;
use regex::Regex;
use taskcenter_core::scoring::contains_urgency_keyword;
use taskcenter_core::task::truncate_chars;
use taskcenter_core::{MentionContext, PersonMention, Priority, Task, TicketReference};

/// Title length when the text has no sentence before a period.
const TITLE_FALLBACK_CHARS: usize = 100;

const NAME: &str = r"[А-ЯЁ][а-яё]+(?:\s+[А-ЯЁ][а-яё]+)?";

#[derive(Debug, Clone)]
pub struct TaskParser {
    prefix_re: Regex,
    ticket_re: Regex,
    mention_re: Regex,
}

impl TaskParser {
    pub fn new() -> Result<Self> {
        // "1. ", "1) ", "10. "
        let prefix_re = Regex::new(r"^\s*\d+[.)]\s*")?;

        // Bare `AN-1418` or a tracker URL ending in `/browse/AN-1418`.
        // At a URL's start the bare branch fails on "https:", so the URL branch wins.
        let ticket_re = Regex::new(concat!(
            r"(?i)(?P<bare>[A-Z]{2,}-\d+)",
            r"|(?P<url>https?://\S+?/browse/(?P<ticket>[A-Z]{2,}-\d+))"
        ))?;

        // Trigger words are case-insensitive; names must be capitalized.
        let mention_re = Regex::new(&format!(
            r"\b(?P<trigger>(?i:от|задача|связаться\s+с|согласовать\s+с|передать))\s+(?P<name>{NAME})"
        ))?;

        Ok(Self {
            prefix_re,
            ticket_re,
            mention_re,
        })
    }

    /// Parse a multi-line list. Blank lines and lines that are only a number are skipped.
    pub fn parse_task_list(&self, text: &str) -> Vec<Task> {
        let tasks: Vec<Task> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(|l| self.parse_line(l))
            .collect();
        tracing::debug!(count = tasks.len(), "parsed task list");
        tasks
    }

    /// Parse a single line. Returns `None` when nothing is left after the
    /// ordinal prefix is removed.
    pub fn parse_line(&self, line: &str) -> Option<Task> {
        let clean = self.strip_prefix(line);
        if clean.is_empty() {
            return None;
        }

        let mut task = Task::create(title_of(clean)).ok()?;
        task.original_text = line.to_string();
        task.description = clean.to_string();
        task.ticket_refs = self.extract_tickets(clean);
        task.mentions = self.extract_mentions(clean);

        if contains_urgency_keyword(clean) {
            task.priority = Priority::High;
        }

        Some(task)
    }

    pub fn strip_prefix<'a>(&self, line: &'a str) -> &'a str {
        let rest = match self.prefix_re.find(line) {
            Some(m) => &line[m.end()..],
            None => line,
        };
        rest.trim()
    }

    /// All ticket references in order of appearance; duplicates are kept.
    pub fn extract_tickets(&self, text: &str) -> Vec<TicketReference> {
        self.ticket_re
            .captures_iter(text)
            .filter_map(|caps| {
                if let Some(url) = caps.name("url") {
                    let id = caps.name("ticket")?.as_str();
                    Some(TicketReference::new(id, Some(url.as_str().to_string())))
                } else {
                    let id = caps.name("bare")?.as_str();
                    Some(TicketReference::new(id, None))
                }
            })
            .collect()
    }

    pub fn extract_mentions(&self, text: &str) -> Vec<PersonMention> {
        self.mention_re
            .captures_iter(text)
            .filter_map(|caps| {
                let name = caps.name("name")?.as_str().trim();
                let trigger = caps.name("trigger")?.as_str();
                Some(PersonMention::new(name, mention_context(trigger)))
            })
            .collect()
    }
}

/// Text before the first period; the first 100 characters when there is no
/// period or the text starts with one.
fn title_of(clean: &str) -> String {
    match clean.split_once('.') {
        Some((head, _)) if !head.trim().is_empty() => head.trim().to_string(),
        _ => truncate_chars(clean, TITLE_FALLBACK_CHARS),
    }
}

fn mention_context(trigger: &str) -> Option<MentionContext> {
    let t = trigger.to_lowercase();
    let ctx = if t.starts_with("согласовать") {
        MentionContext::Approval
    } else if t.starts_with("связаться") {
        MentionContext::Coordination
    } else if t.starts_with("передать") {
        MentionContext::Delegation
    } else if t == "от" {
        MentionContext::Originator
    } else if t == "задача" {
        MentionContext::Author
    } else {
        return None;
    };
    Some(ctx)
}
