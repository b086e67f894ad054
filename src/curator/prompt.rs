//! Prompt construction for model-assisted curation.
//!
//! Candidates are addressed by positional keys (`c1`, `c2`, ...) so catalog ids
//! never reach the model.

use crate::catalog::MediaItem;
use crate::llm::Message;
use crate::playlist::DurationTolerance;
use crate::theme::ThemeSpec;
use serde::Serialize;
use std::collections::HashMap;

const SYNOPSIS_MAX_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are the program director of a themed TV channel. \
You pick titles from a candidate list and put them in a running order that fits the theme. \
Only use keys that appear in the candidate list. \
Reply with a single JSON object and nothing else.";

const RESPONSE_SCHEMA: &str = r#"{"selections": [{"key": "c1", "order": 1, "reason": "short justification"}]}"#;

/// Maps prompt keys back to candidate positions.
#[derive(Debug, Default)]
pub struct CandidateKeys {
    by_key: HashMap<String, usize>,
}

impl CandidateKeys {
    pub fn for_candidates(count: usize) -> Self {
        Self {
            by_key: (0..count).map(|i| (key_for(i), i)).collect(),
        }
    }

    /// Case and whitespace are ignored, and a bare number is accepted as its key.
    pub fn resolve(&self, key: &str) -> Option<usize> {
        let normalized = key.trim().to_ascii_lowercase();
        if let Some(index) = self.by_key.get(&normalized) {
            return Some(*index);
        }
        if normalized.chars().all(|c| c.is_ascii_digit()) && !normalized.is_empty() {
            return self.by_key.get(&format!("c{}", normalized)).copied();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

pub fn key_for(index: usize) -> String {
    format!("c{}", index + 1)
}

#[derive(Serialize)]
struct PromptCandidate<'a> {
    key: String,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    kind: &'static str,
    genres: &'a [String],
    score: f64,
    runtime_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_rating: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synopsis: Option<String>,
}

fn synopsis(overview: Option<&str>) -> Option<String> {
    let text = overview?.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= SYNOPSIS_MAX_CHARS {
        return Some(text.to_string());
    }
    let cut: String = text.chars().take(SYNOPSIS_MAX_CHARS).collect();
    Some(format!("{}...", cut.trim_end()))
}

/// Builds the initial system and user messages for `theme` over `candidates`.
pub fn build_messages(
    theme: &ThemeSpec,
    candidates: &[MediaItem],
    tolerance: DurationTolerance,
) -> Vec<Message> {
    let listing: Vec<PromptCandidate> = candidates
        .iter()
        .enumerate()
        .map(|(i, m)| PromptCandidate {
            key: key_for(i),
            title: &m.title,
            year: m.year,
            kind: m.kind.as_str(),
            genres: &m.genres,
            score: m.quality_score(),
            runtime_minutes: m.runtime_minutes,
            content_rating: m.content_rating.as_deref(),
            synopsis: synopsis(m.overview.as_deref()),
        })
        .collect();
    let listing = serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "[]".to_string());

    let (lower, upper) = tolerance.bounds(theme.duration_minutes);
    let mut request = format!("Theme: {}\n", theme.name);
    if !theme.description.trim().is_empty() {
        request.push_str(&format!("Description: {}\n", theme.description.trim()));
    }
    if !theme.genres.is_empty() {
        request.push_str(&format!("Preferred genres: {}\n", theme.genres.join(", ")));
    }
    if !theme.keywords.is_empty() {
        request.push_str(&format!("Keywords: {}\n", theme.keywords.join(", ")));
    }
    request.push_str(&format!(
        "Target total runtime: {} minutes (acceptable {:.0} to {:.0}).\n\
         Pick at most {} titles.\n\n\
         Candidates:\n{}\n\n\
         Respond with JSON in exactly this shape:\n{}\n\
         `order` starts at 1 and gives the airing position.",
        theme.duration_minutes, lower, upper, theme.max_items, listing, RESPONSE_SCHEMA
    ));

    vec![Message::system(SYSTEM_PROMPT), Message::user(request)]
}

/// Follow-up sent after a response that could not be parsed.
pub fn corrective_message(problem: &str) -> Message {
    Message::user(format!(
        "Your previous reply could not be used: {}. \
         Reply again with only a JSON object shaped like {} using keys from the candidate list.",
        problem, RESPONSE_SCHEMA
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MediaKind, MediaSource};
    use chrono::Utc;

    fn media(id: i64, title: &str) -> MediaItem {
        MediaItem {
            id,
            source: MediaSource::Radarr,
            external_id: format!("tt{}", id),
            title: title.to_string(),
            year: Some(1982),
            kind: MediaKind::Movie,
            genres: vec!["Science Fiction".to_string()],
            content_rating: Some("R".to_string()),
            imdb_rating: Some(8.1),
            tmdb_rating: None,
            runtime_minutes: 117,
            path: Some("/movies/x.mkv".to_string()),
            overview: Some("x".repeat(500)),
            has_file: true,
            synced_at: Utc::now(),
        }
    }

    #[test]
    fn test_keys_resolve() {
        let keys = CandidateKeys::for_candidates(3);
        assert_eq!(keys.len(), 3);
        assert_eq!(keys.resolve("c1"), Some(0));
        assert_eq!(keys.resolve(" C3 "), Some(2));
        assert_eq!(keys.resolve("2"), Some(1));
        assert_eq!(keys.resolve("c4"), None);
        assert_eq!(keys.resolve("4217"), None);
        assert_eq!(keys.resolve(""), None);
    }

    #[test]
    fn test_prompt_hides_internal_ids() {
        let mut theme = ThemeSpec::new("Cyberpunk", "ch-9");
        theme.description = "Neon and rain".to_string();
        let candidates = vec![media(4217, "Blade Runner"), media(9931, "Akira")];

        let messages = build_messages(&theme, &candidates, DurationTolerance::default());

        assert_eq!(messages.len(), 2);
        let user = &messages[1].content;
        assert!(user.contains("\"key\": \"c1\""));
        assert!(user.contains("\"key\": \"c2\""));
        assert!(user.contains("Blade Runner"));
        assert!(user.contains("Neon and rain"));
        assert!(user.contains("153 to 207"));
        assert!(!user.contains("4217"));
        assert!(!user.contains("/movies/x.mkv"));
    }

    #[test]
    fn test_synopsis_truncated() {
        let text = synopsis(Some(&"y".repeat(400))).unwrap();
        assert_eq!(text.chars().count(), SYNOPSIS_MAX_CHARS + 3);
        assert!(synopsis(Some("   ")).is_none());
        assert_eq!(synopsis(Some("short")).as_deref(), Some("short"));
    }
}
