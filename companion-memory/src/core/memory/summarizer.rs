//! LLM-backed summarization and promotion decisions
//!
//! Nothing here returns an error: every collaborator failure turns into a
//! [`Summarized::Fallback`] carrying a documented fallback value.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::ShortTermEntry;
use crate::core::clients::TextCompletionClient;

/// Maximum number of items included in a summarization prompt
pub const MAX_SUMMARY_ITEMS: usize = 20;
/// Length (in characters) of fallback excerpts
pub const FALLBACK_CHARS: usize = 100;
pub const DEFAULT_MAX_POINTS: usize = 3;
pub const DEFAULT_PROMOTION_THRESHOLD: f64 = 0.7;

/// Outcome of a summarization call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Summarized<T> {
    /// Produced by the completion collaborator
    Generated { value: T },
    /// Collaborator unavailable or unusable; `value` is derived locally
    Fallback { value: T, reason: String },
}

impl<T> Summarized<T> {
    pub fn value(&self) -> &T {
        match self {
            Summarized::Generated { value } | Summarized::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Summarized::Generated { value } | Summarized::Fallback { value, .. } => value,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Summarized::Generated { .. })
    }

    /// The generated value, or `None` when this is a fallback
    pub fn generated(self) -> Option<T> {
        match self {
            Summarized::Generated { value } => Some(value),
            Summarized::Fallback { .. } => None,
        }
    }
}

/// Item that can take part in a promotion decision
pub trait Promotable {
    fn importance(&self) -> f64;
}

impl Promotable for ShortTermEntry {
    fn importance(&self) -> f64 {
        self.importance
    }
}

/// Minimal promotion input for callers without a stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionCandidate {
    pub importance: f64,
    pub content: String,
}

impl Promotable for PromotionCandidate {
    fn importance(&self) -> f64 {
        self.importance
    }
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Strip list markers such as `-`, `*`, `•` or `1.` from a key point
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let without_bullet = line
        .strip_prefix(['-', '*', '•'])
        .map(str::trim_start)
        .unwrap_or(line);

    let digits = without_bullet
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits > 0 {
        let rest = &without_bullet[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')', '、']) {
            return rest.trim_start();
        }
    }
    without_bullet
}

pub struct MemorySummarizer {
    completion: Arc<dyn TextCompletionClient>,
}

impl MemorySummarizer {
    pub fn new(completion: Arc<dyn TextCompletionClient>) -> Self {
        Self { completion }
    }

    fn summary_prompt(contents: &[String], context: &str) -> String {
        let items = contents
            .iter()
            .take(MAX_SUMMARY_ITEMS)
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = String::from(
            "Summarize the following memories, extracting the key information and recurring patterns.\n\n",
        );
        if !context.trim().is_empty() {
            prompt.push_str(&format!("Context: {}\n\n", context.trim()));
        }
        prompt.push_str(&format!("Memories:\n{items}\n\n"));
        prompt.push_str("Reply with a concise summary of the most important points (at most 100 words).");
        prompt
    }

    fn key_points_prompt(content: &str, max_points: usize) -> String {
        format!(
            "Extract the key points (at most {max_points}) from the following content:\n\n{content}\n\nKey points (one per line):"
        )
    }

    /// Summarize up to [`MAX_SUMMARY_ITEMS`] memory contents
    pub async fn summarize(&self, contents: &[String], context: &str) -> Summarized<String> {
        let fallback = |reason: String| Summarized::Fallback {
            value: contents
                .first()
                .map(|c| truncate_chars(c, FALLBACK_CHARS))
                .unwrap_or_default(),
            reason,
        };

        if contents.is_empty() {
            return fallback("no content to summarize".to_string());
        }

        let prompt = Self::summary_prompt(contents, context);
        match self.completion.complete(&prompt).await {
            Ok(text) => {
                let summary = text.trim();
                if summary.is_empty() {
                    warn!("Summarization returned an empty completion");
                    fallback("empty completion".to_string())
                } else {
                    debug!("Summarized {} memories", contents.len().min(MAX_SUMMARY_ITEMS));
                    Summarized::Generated {
                        value: summary.to_string(),
                    }
                }
            },
            Err(e) => {
                warn!("Summarization failed, using excerpt: {}", e);
                fallback(e.to_string())
            },
        }
    }

    /// Up to `max_points` key points of a single content
    pub async fn extract_key_points(
        &self,
        content: &str,
        max_points: usize,
    ) -> Summarized<Vec<String>> {
        let prompt = Self::key_points_prompt(content, max_points);
        match self.completion.complete(&prompt).await {
            Ok(text) => {
                let points: Vec<String> = text
                    .lines()
                    .map(strip_list_marker)
                    .filter(|p| !p.is_empty())
                    .take(max_points)
                    .map(String::from)
                    .collect();
                Summarized::Generated { value: points }
            },
            Err(e) => {
                warn!("Key point extraction failed, using excerpt: {}", e);
                let value = if content.is_empty() {
                    vec![]
                } else {
                    vec![truncate_chars(content, FALLBACK_CHARS)]
                };
                Summarized::Fallback {
                    value,
                    reason: e.to_string(),
                }
            },
        }
    }

    /// Items worth promoting to long-term memory
    ///
    /// Empty unless the batch's mean importance reaches `threshold`; then
    /// every item at or above `threshold`.
    pub fn evaluate_promotion<T: Promotable + Clone>(batch: &[T], threshold: f64) -> Vec<T> {
        if batch.is_empty() {
            return vec![];
        }

        let mean = batch.iter().map(Promotable::importance).sum::<f64>() / batch.len() as f64;
        if mean < threshold {
            debug!(
                "Promotion skipped: mean importance {:.3} below {:.3}",
                mean, threshold
            );
            return vec![];
        }

        batch
            .iter()
            .filter(|item| item.importance() >= threshold)
            .cloned()
            .collect()
    }
}
