//! Model-assisted selection and ordering of candidates.
//!
//! The curator never fails a run because the model misbehaved: unusable replies
//! are re-prompted a bounded number of times and then replaced by a greedy
//! top-score fill. Only a transport outage that survives retries is an error.

mod prompt;
mod response;

pub use prompt::{build_messages, corrective_message, key_for, CandidateKeys};
pub use response::{parse_selections, ResponseError, Selection};

use crate::catalog::MediaItem;
use crate::config::{GenerationSettings, OllamaSettings};
use crate::llm::{CompletionOptions, FinishReason, LlmError, LlmProvider, Message};
use crate::playlist::{CuratedItem, DurationTolerance};
use crate::retry_policy::RetryPolicy;
use crate::server::metrics;
use crate::theme::ThemeSpec;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CurationError {
    #[error("Generative model unavailable after {attempts} attempt(s): {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: LlmError,
    },
}

/// How the final selection was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationStrategy {
    Model,
    /// No model configured.
    GreedyNoModel,
    /// The model kept replying with something unusable.
    GreedyInvalidOutput,
}

impl CurationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurationStrategy::Model => "model",
            CurationStrategy::GreedyNoModel => "greedy_no_model",
            CurationStrategy::GreedyInvalidOutput => "greedy_invalid_output",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Curation {
    pub items: Vec<CuratedItem>,
    pub strategy: CurationStrategy,
    /// Model selections that named no known candidate, or repeated one.
    pub dropped_selections: usize,
    pub backfilled: usize,
}

impl Curation {
    pub fn total_minutes(&self) -> u32 {
        self.items.iter().map(|i| i.media.runtime_minutes).sum()
    }
}

#[derive(Debug, Clone)]
pub struct CuratorSettings {
    pub tolerance: DurationTolerance,
    pub max_repair_attempts: u32,
    pub max_candidates_in_prompt: usize,
    /// Cap on model calls in flight across all themes.
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
    pub options: CompletionOptions,
}

impl CuratorSettings {
    pub fn from_config(generation: &GenerationSettings, ollama: &OllamaSettings) -> Self {
        Self {
            tolerance: DurationTolerance::new(generation.duration_tolerance),
            max_repair_attempts: generation.max_repair_attempts,
            max_candidates_in_prompt: generation.max_candidates_in_prompt,
            max_concurrent: generation.max_concurrent_curations,
            retry: RetryPolicy::new(generation),
            options: CompletionOptions {
                temperature: ollama.temperature,
                max_tokens: None,
                json_output: true,
                timeout: Duration::from_secs(ollama.timeout_secs),
            },
        }
    }
}

impl Default for CuratorSettings {
    fn default() -> Self {
        let generation = GenerationSettings::default();
        Self {
            tolerance: DurationTolerance::new(generation.duration_tolerance),
            max_repair_attempts: generation.max_repair_attempts,
            max_candidates_in_prompt: generation.max_candidates_in_prompt,
            max_concurrent: generation.max_concurrent_curations,
            retry: RetryPolicy::new(&generation),
            options: CompletionOptions {
                json_output: true,
                ..Default::default()
            },
        }
    }
}

enum CallFailure {
    /// The endpoint answered but the body was unusable.
    Garbled(LlmError),
    Outage { attempts: u32, error: LlmError },
}

pub struct LlmCurator {
    provider: Option<Arc<dyn LlmProvider>>,
    settings: CuratorSettings,
    permits: Semaphore,
}

impl LlmCurator {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, settings: CuratorSettings) -> Self {
        let permits = Semaphore::new(settings.max_concurrent.max(1));
        Self {
            provider,
            settings,
            permits,
        }
    }

    pub fn has_model(&self) -> bool {
        self.provider.is_some()
    }

    pub fn tolerance(&self) -> DurationTolerance {
        self.settings.tolerance
    }

    /// Picks and orders a subset of `candidates` (best first) for `theme`.
    pub async fn curate(
        &self,
        theme: &ThemeSpec,
        candidates: &[MediaItem],
    ) -> Result<Curation, CurationError> {
        let Some(provider) = &self.provider else {
            debug!(theme = %theme.name, "No model configured, using greedy selection");
            metrics::record_curation_fallback(CurationStrategy::GreedyNoModel.as_str());
            return Ok(self.greedy(theme, candidates, CurationStrategy::GreedyNoModel));
        };

        let shown = candidates
            .len()
            .min(self.settings.max_candidates_in_prompt.max(1));
        let keys = CandidateKeys::for_candidates(shown);
        let mut messages = build_messages(theme, &candidates[..shown], self.settings.tolerance);

        for attempt in 0..=self.settings.max_repair_attempts {
            let content = match self.complete_with_retry(provider.as_ref(), &messages).await {
                Ok(content) => content,
                Err(CallFailure::Garbled(e)) => {
                    warn!(theme = %theme.name, attempt, "Unreadable model response: {}", e);
                    messages.push(corrective_message(&e.to_string()));
                    continue;
                }
                Err(CallFailure::Outage { attempts, error }) => {
                    return Err(CurationError::Unavailable {
                        attempts,
                        source: error,
                    });
                }
            };

            match parse_selections(&content) {
                Ok(selections) => {
                    let curation = self.resolve(theme, candidates, &keys, selections);
                    info!(
                        theme = %theme.name,
                        items = curation.items.len(),
                        dropped = curation.dropped_selections,
                        backfilled = curation.backfilled,
                        "Model curation complete"
                    );
                    return Ok(curation);
                }
                Err(e) => {
                    warn!(
                        theme = %theme.name,
                        attempt,
                        max_repairs = self.settings.max_repair_attempts,
                        "Unusable model reply: {}", e
                    );
                    messages.push(Message::assistant(content));
                    messages.push(corrective_message(&e.to_string()));
                }
            }
        }

        warn!(
            theme = %theme.name,
            "Model output unusable after repairs, falling back to greedy selection"
        );
        metrics::record_curation_fallback(CurationStrategy::GreedyInvalidOutput.as_str());
        Ok(self.greedy(theme, candidates, CurationStrategy::GreedyInvalidOutput))
    }

    /// Deterministic top-score fill, no model involved.
    pub fn greedy(
        &self,
        theme: &ThemeSpec,
        candidates: &[MediaItem],
        strategy: CurationStrategy,
    ) -> Curation {
        let (items, backfilled) = fill(theme, candidates, Vec::new(), self.settings.tolerance);
        Curation {
            items,
            strategy,
            dropped_selections: 0,
            backfilled,
        }
    }

    async fn complete_with_retry(
        &self,
        provider: &dyn LlmProvider,
        messages: &[Message],
    ) -> Result<String, CallFailure> {
        let mut retry_count = 0;
        loop {
            let result = {
                // The semaphore is never closed.
                let _permit = self.permits.acquire().await.ok();
                provider.complete(messages, &self.settings.options).await
            };

            match result {
                Ok(response) => {
                    metrics::record_llm_request("ok");
                    if response.finish_reason == FinishReason::MaxTokens {
                        warn!(model = provider.model(), "Model reply hit the token limit");
                    }
                    return Ok(response.message.content);
                }
                Err(e @ (LlmError::InvalidResponse(_) | LlmError::Serialization(_))) => {
                    metrics::record_llm_request("invalid");
                    return Err(CallFailure::Garbled(e));
                }
                Err(e) if self.settings.retry.should_retry(&e, retry_count) => {
                    metrics::record_llm_request("retry");
                    let delay = self.settings.retry.backoff(retry_count);
                    warn!(
                        provider = provider.name(),
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Model request failed, retrying: {}", e
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => {
                    metrics::record_llm_request("error");
                    return Err(CallFailure::Outage {
                        attempts: retry_count + 1,
                        error: e,
                    });
                }
            }
        }
    }

    fn resolve(
        &self,
        theme: &ThemeSpec,
        candidates: &[MediaItem],
        keys: &CandidateKeys,
        mut selections: Vec<Selection>,
    ) -> Curation {
        // Stable: selections without an order keep their reply position, after the ordered ones.
        selections.sort_by_key(|s| s.order.unwrap_or(u32::MAX));

        let mut dropped = 0;
        let mut seen = HashSet::new();
        let mut picks = Vec::with_capacity(selections.len());
        for selection in selections {
            match keys.resolve(&selection.key) {
                Some(index) if seen.insert(index) => picks.push((index, selection.reason)),
                Some(_) => {
                    debug!(theme = %theme.name, key = %selection.key, "Ignoring repeated selection");
                    dropped += 1;
                }
                None => {
                    warn!(
                        theme = %theme.name,
                        key = %selection.key,
                        "Model selected an unknown candidate, dropping it"
                    );
                    dropped += 1;
                }
            }
        }

        let (items, backfilled) = fill(theme, candidates, picks, self.settings.tolerance);
        Curation {
            items,
            strategy: CurationStrategy::Model,
            dropped_selections: dropped,
            backfilled,
        }
    }
}

/// Takes `picks` in order, skipping any that would overrun the duration band, then
/// backfills from `candidates` (best first) until the target is reached, the item
/// cap is hit, or candidates run out. If the result would still fall short of the
/// band, the first candidate skipped for overrunning is added anyway.
fn fill(
    theme: &ThemeSpec,
    candidates: &[MediaItem],
    picks: Vec<(usize, Option<String>)>,
    tolerance: DurationTolerance,
) -> (Vec<CuratedItem>, usize) {
    let target = theme.duration_minutes;
    let (lower, upper) = tolerance.bounds(target);
    let fits = |total: u32, runtime: u32| (total + runtime) as f64 <= upper + 1e-9;

    let mut chosen = HashSet::new();
    let mut items = Vec::new();
    let mut total = 0u32;

    for (index, reason) in picks {
        if items.len() >= theme.max_items {
            warn!(theme = %theme.name, max_items = theme.max_items, "Model picked too many items");
            break;
        }
        let media = &candidates[index];
        if !fits(total, media.runtime_minutes) {
            warn!(
                theme = %theme.name,
                title = %media.title,
                "Skipping model pick that overruns the duration band"
            );
            continue;
        }
        chosen.insert(index);
        total += media.runtime_minutes;
        items.push(CuratedItem {
            media: media.clone(),
            order: Some(items.len() as u32 + 1),
            reason,
        });
    }

    let mut backfilled = 0;
    let mut overrun = None;
    for (index, media) in candidates.iter().enumerate() {
        if total >= target || items.len() >= theme.max_items {
            break;
        }
        if chosen.contains(&index) {
            continue;
        }
        if fits(total, media.runtime_minutes) {
            chosen.insert(index);
            total += media.runtime_minutes;
            items.push(CuratedItem::backfill(media.clone()));
            backfilled += 1;
        } else if overrun.is_none() {
            overrun = Some(index);
        }
    }

    if (total as f64) < lower && items.len() < theme.max_items {
        if let Some(index) = overrun {
            items.push(CuratedItem::backfill(candidates[index].clone()));
            backfilled += 1;
        }
    }

    (items, backfilled)
}
