//! Local catalog of synced media.
//!
//! The catalog is owned by the ingestion pipeline; the generation engine only
//! reads from it. `upsert_media` exists for that pipeline and for fixtures.

mod models;
mod schema;
mod sqlite_catalog_store;

pub use models::{CatalogFilter, MediaItem, MediaKind, MediaSource};
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use sqlite_catalog_store::SqliteCatalogStore;

use anyhow::Result;

pub trait CatalogStore: Send + Sync {
    /// Items matching `filter`, in insertion order.
    fn list_media(&self, filter: &CatalogFilter) -> Result<Vec<MediaItem>>;
    fn get_media(&self, id: i64) -> Result<Option<MediaItem>>;
    /// Inserts or refreshes an item keyed by (source, external_id). The `id` field
    /// of `item` is ignored; the stored id is returned.
    fn upsert_media(&self, item: &MediaItem) -> Result<i64>;
    fn count_media(&self) -> Result<usize>;
}
