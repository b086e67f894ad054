mod connections;
mod versioned_schema;

pub use connections::*;
pub use versioned_schema::*;

/// Offset added to every schema version stored in `PRAGMA user_version`, so a
/// database created by another tool is never mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 99999;
