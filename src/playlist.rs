//! Turns curated selections into a committed-ready lineup.

use crate::catalog::MediaItem;
use crate::theme::ThemeSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Accepted deviation from a theme's target duration, as a fraction of it.
/// The band is inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationTolerance(f64);

impl DurationTolerance {
    pub fn new(fraction: f64) -> Self {
        Self(fraction.clamp(0.0, 1.0))
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }

    pub fn bounds(&self, target_minutes: u32) -> (f64, f64) {
        let target = target_minutes as f64;
        (target * (1.0 - self.0), target * (1.0 + self.0))
    }

    pub fn contains(&self, target_minutes: u32, total_minutes: u32) -> bool {
        let (lower, upper) = self.bounds(target_minutes);
        let total = total_minutes as f64;
        total >= lower - 1e-9 && total <= upper + 1e-9
    }

    pub fn lower_bound(&self, target_minutes: u32) -> f64 {
        self.bounds(target_minutes).0
    }
}

impl Default for DurationTolerance {
    fn default() -> Self {
        Self(0.15)
    }
}

/// One curator pick, before assembly.
#[derive(Debug, Clone)]
pub struct CuratedItem {
    pub media: MediaItem,
    /// Position requested by the model; `None` for backfilled items.
    pub order: Option<u32>,
    pub reason: Option<String>,
}

impl CuratedItem {
    pub fn backfill(media: MediaItem) -> Self {
        Self {
            media,
            order: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistItem {
    pub media: MediaItem,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Playlist {
    pub theme_name: String,
    pub channel_id: String,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<PlaylistItem>,
    pub total_score: f64,
    pub total_duration_minutes: u32,
}

impl Playlist {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn media_ids(&self) -> Vec<i64> {
        self.items.iter().map(|i| i.media.id).collect()
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Playlist for {0} has no items")]
    Empty(String),

    #[error(
        "Playlist for {theme} runs {total} min, outside [{lower:.0}, {upper:.0}] for target {target} min"
    )]
    DurationOutOfTolerance {
        theme: String,
        total: u32,
        target: u32,
        lower: f64,
        upper: f64,
    },
}

pub struct PlaylistAssembler {
    tolerance: DurationTolerance,
}

impl PlaylistAssembler {
    pub fn new(tolerance: DurationTolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> DurationTolerance {
        self.tolerance
    }

    /// Deduplicates by media id (first occurrence wins), orders by the curator's
    /// positions, then checks the total against the theme's duration band.
    ///
    /// Items the curator gave a position come first, by position. The rest follow
    /// by score descending.
    pub fn assemble(
        &self,
        theme: &ThemeSpec,
        curated: Vec<CuratedItem>,
        now: DateTime<Utc>,
    ) -> Result<Playlist, AssemblyError> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(curated.len());
        for item in curated {
            if seen.insert(item.media.id) {
                unique.push(item);
            } else {
                warn!(
                    theme = %theme.name,
                    media_id = item.media.id,
                    title = %item.media.title,
                    "Dropping duplicate playlist item"
                );
            }
        }

        let (mut ordered, mut unordered): (Vec<_>, Vec<_>) =
            unique.into_iter().partition(|i| i.order.is_some());
        ordered.sort_by_key(|i| i.order);
        unordered.sort_by(|a, b| crate::selector::compare_candidates(&a.media, &b.media));
        ordered.extend(unordered);

        let items: Vec<PlaylistItem> = ordered
            .into_iter()
            .map(|i| PlaylistItem {
                score: i.media.quality_score(),
                media: i.media,
                reason: i.reason,
            })
            .collect();

        // An empty lineup would clear the channel
        if items.is_empty() {
            return Err(AssemblyError::Empty(theme.name.clone()));
        }

        let total_duration_minutes: u32 = items.iter().map(|i| i.media.runtime_minutes).sum();
        let total_score: f64 = items.iter().map(|i| i.score).sum();

        if !self
            .tolerance
            .contains(theme.duration_minutes, total_duration_minutes)
        {
            let (lower, upper) = self.tolerance.bounds(theme.duration_minutes);
            return Err(AssemblyError::DurationOutOfTolerance {
                theme: theme.name.clone(),
                total: total_duration_minutes,
                target: theme.duration_minutes,
                lower,
                upper,
            });
        }

        debug!(
            theme = %theme.name,
            items = items.len(),
            duration = total_duration_minutes,
            score = total_score,
            "Assembled playlist"
        );

        Ok(Playlist {
            theme_name: theme.name.clone(),
            channel_id: theme.channel_id.clone(),
            generated_at: now,
            items,
            total_score,
            total_duration_minutes,
        })
    }
}
