use crate::catalog::MediaKind;
use serde::Serialize;

pub const DEFAULT_THEME_DURATION_MINUTES: u32 = 180;
pub const DEFAULT_THEME_MAX_ITEMS: usize = 20;

/// A named lineup recipe. Read-only input to a generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeSpec {
    pub name: String,
    pub description: String,
    pub channel_id: String,
    /// Cron expression; `None` falls back to the scheduler default.
    pub schedule: Option<String>,
    /// Never empty once resolved from config.
    pub media_kinds: Vec<MediaKind>,
    pub genres: Vec<String>,
    pub keywords: Vec<String>,
    pub min_rating: f64,
    pub max_items: usize,
    pub duration_minutes: u32,
}

impl ThemeSpec {
    pub fn new(name: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            channel_id: channel_id.into(),
            schedule: None,
            media_kinds: vec![MediaKind::Movie],
            genres: vec![],
            keywords: vec![],
            min_rating: 0.0,
            max_items: DEFAULT_THEME_MAX_ITEMS,
            duration_minutes: DEFAULT_THEME_DURATION_MINUTES,
        }
    }
}
