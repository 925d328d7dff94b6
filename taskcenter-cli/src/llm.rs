//! Anthropic-backed task classifier.
//!
//! Batches go out as one Messages API call answered with a JSON array; single
//! tasks get one call each. Rate-limit (429), overload (529) and 5xx answers
//! are retried with exponential backoff; anything else fails the call.

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use taskcenter_core::{BatchItem, Classification, Classifier, Task, align_batch};

use crate::config::LlmSection;

const SYSTEM_PROMPT: &str = "You classify work items from a personal task list. \
Tasks are often written in Russian and refer to health-records integration work \
(РЭМД, СЭМД, ФЛК, ГИСЗ). Answer with JSON only, nothing else.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): base * factor^attempt, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    pub fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 || status.is_server_error()
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicClassifier {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl AnthropicClassifier {
    pub fn new(api_key: impl Into<String>, llm: &LlmSection) -> Self {
        Self {
            api_key: api_key.into(),
            model: llm.model.clone(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            retry: RetryPolicy {
                max_retries: llm.max_retries,
                ..RetryPolicy::default()
            },
            client: reqwest::Client::new(),
        }
    }

    async fn complete(&self, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            system: &'a str,
            messages: Vec<Msg<'a>>,
        }

        #[derive(Deserialize)]
        struct Resp {
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(rename = "type")]
            t: String,
            text: Option<String>,
        }

        let body = Req {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Msg {
                role: "user",
                content: user,
            }],
        };

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let url = format!("{}/v1/messages", self.base_url);
        let mut attempt = 0;
        loop {
            let resp = self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(&body)
                .send()
                .await
                .context("anthropic request")?;

            let status = resp.status();
            if status.is_success() {
                let out: Resp = resp.json().await.context("parse anthropic response")?;
                let mut s = String::new();
                for b in out.content {
                    if b.t == "text" {
                        if let Some(t) = b.text {
                            s.push_str(&t);
                        }
                    }
                }
                return Ok(s.trim().to_string());
            }

            let txt = resp.text().await.unwrap_or_default();
            if RetryPolicy::is_retryable(status) && attempt < self.retry.max_retries {
                let delay = self.retry.delay_for(attempt);
                tracing::warn!(%status, attempt, delay_secs = delay.as_secs_f64(), "anthropic busy, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            bail!("anthropic error: {status} {txt}");
        }
    }
}

impl AnthropicClassifier {
    /// Sync wrapper over `complete` for callers outside async code.
    fn ask(&self, prompt: &str) -> Result<String> {
        // The CLI runs under #[tokio::main]; block_on from inside a runtime panics,
        // so hop through block_in_place when one is already running.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.complete(prompt)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.complete(prompt))
        }
    }
}

impl Classifier for AnthropicClassifier {
    fn classify(&self, task: &Task, context: Option<&str>) -> Result<Classification> {
        let text = self.ask(&build_prompt(task, context))?;
        parse_classification(&text)
    }

    fn classify_batch(&self, tasks: &[Task], context: Option<&str>) -> Result<Vec<Option<Classification>>> {
        let text = self.ask(&build_batch_prompt(tasks, context))?;
        parse_batch(&text, tasks.len())
    }
}

pub fn build_prompt(task: &Task, context: Option<&str>) -> String {
    let mut p = String::new();
    p.push_str("Classify this task.\n\n");
    p.push_str(&format!("Title: {}\n", task.title));
    if !task.description.is_empty() && task.description != task.title {
        p.push_str(&format!("Description: {}\n", task.description));
    }
    if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
        p.push_str(&format!("\nContext:\n{}\n", ctx.trim()));
    }
    p.push_str(
        r#"
Return JSON with these fields:
{
  "task_type": "analysis|documentation|development|coordination|bug|unknown",
  "complexity": "low|medium|high",
  "priority": 1-5 (5 = critical, 1 = backlog),
  "confidence": 0.0-1.0,
  "estimated_hours": number of hours (0-16),
  "key_terms": [strings],
  "related_systems": [strings],
  "reasoning": "one short sentence"
}
Return ONLY valid JSON, no extra text."#,
    );
    p
}

pub fn build_batch_prompt(tasks: &[Task], context: Option<&str>) -> String {
    let mut p = String::new();
    p.push_str("Classify each of these tasks.\n\n");
    for (i, task) in tasks.iter().enumerate() {
        p.push_str(&format!("{}. {}\n", i + 1, task.title));
        if !task.description.is_empty() && task.description != task.title {
            p.push_str(&format!("   {}\n", task.description));
        }
    }
    if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
        p.push_str(&format!("\nContext:\n{}\n", ctx.trim()));
    }
    p.push_str(
        r#"
Return a JSON array with one object per task:
[
  {
    "task_index": task number from the list (starting at 1),
    "task_type": "analysis|documentation|development|coordination|bug|unknown",
    "complexity": "low|medium|high",
    "priority": 1-5 (5 = critical, 1 = backlog),
    "confidence": 0.0-1.0,
    "estimated_hours": number of hours (0-16),
    "key_terms": [strings],
    "related_systems": [strings],
    "reasoning": "one short sentence"
  }
]
Return ONLY valid JSON, no extra text."#,
    );
    p
}

/// Parse a batch answer into one slot per task.
pub fn parse_batch(text: &str, len: usize) -> Result<Vec<Option<Classification>>> {
    let body = strip_fences(text);
    let items: Vec<BatchItem> = serde_json::from_str(body)
        .with_context(|| format!("classifier returned an invalid batch:\n{body}"))?;
    Ok(align_batch(items, len))
}

/// Parse a model answer that may be wrapped in ```json fences.
pub fn parse_classification(text: &str) -> Result<Classification> {
    let body = strip_fences(text);
    serde_json::from_str(body)
        .with_context(|| format!("classifier returned invalid JSON:\n{body}"))
}

fn strip_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}
