//! Theme-driven candidate filtering over the local catalog.

use crate::catalog::{CatalogFilter, CatalogStore, MediaItem};
use crate::theme::ThemeSpec;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Theme {0} does not allow any media kind")]
    NoMediaKinds(String),

    #[error("No eligible candidates for theme {0}")]
    NoCandidates(String),

    #[error("Catalog unavailable: {0:#}")]
    Catalog(anyhow::Error),
}

pub struct CandidateSelector {
    catalog: Arc<dyn CatalogStore>,
}

impl CandidateSelector {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Returns the theme's eligible items, best first.
    ///
    /// Filters apply in order: media kind, file availability, genre/keyword match,
    /// minimum quality score, cooldown exclusion. Ties on score sort by title so
    /// unchanged state always yields the same sequence.
    pub fn select_candidates(
        &self,
        theme: &ThemeSpec,
        excluded: &HashSet<i64>,
    ) -> Result<Vec<MediaItem>, SelectionError> {
        if theme.media_kinds.is_empty() {
            return Err(SelectionError::NoMediaKinds(theme.name.clone()));
        }

        let filter = CatalogFilter {
            kinds: theme.media_kinds.clone(),
            source: None,
            available_only: true,
        };
        let items = self
            .catalog
            .list_media(&filter)
            .map_err(SelectionError::Catalog)?;
        let listed = items.len();

        let mut candidates: Vec<MediaItem> = items
            .into_iter()
            .filter(|item| theme.media_kinds.contains(&item.kind) && item.has_file)
            .filter(|item| matches_theme(theme, item))
            .filter(|item| item.quality_score() >= theme.min_rating)
            .filter(|item| !excluded.contains(&item.id))
            .collect();

        candidates.sort_by(compare_candidates);

        debug!(
            theme = %theme.name,
            listed,
            excluded = excluded.len(),
            candidates = candidates.len(),
            "Selected candidates"
        );

        if candidates.is_empty() {
            return Err(SelectionError::NoCandidates(theme.name.clone()));
        }
        Ok(candidates)
    }
}

/// Score descending, then title ascending.
pub fn compare_candidates(a: &MediaItem, b: &MediaItem) -> Ordering {
    b.quality_score()
        .total_cmp(&a.quality_score())
        .then_with(|| a.title.cmp(&b.title))
}

/// A theme without genres or keywords accepts everything. Otherwise an item
/// matches when a configured genre or keyword equals one of its genre tags, or a
/// keyword occurs in its title or overview. Comparison ignores case.
pub fn matches_theme(theme: &ThemeSpec, item: &MediaItem) -> bool {
    if theme.genres.is_empty() && theme.keywords.is_empty() {
        return true;
    }

    let tags: HashSet<String> = item
        .genres
        .iter()
        .map(|g| g.trim().to_lowercase())
        .collect();

    let tag_hit = theme
        .genres
        .iter()
        .chain(theme.keywords.iter())
        .map(|term| term.trim().to_lowercase())
        .any(|term| !term.is_empty() && tags.contains(&term));
    if tag_hit {
        return true;
    }

    let title = item.title.to_lowercase();
    let overview = item.overview.as_deref().unwrap_or_default().to_lowercase();
    theme
        .keywords
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .any(|kw| title.contains(&kw) || overview.contains(&kw))
}
