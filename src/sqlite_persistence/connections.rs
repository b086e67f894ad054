use super::{open_versioned, VersionedSchema};
use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DEFAULT_READ_POOL_SIZE: usize = 4;

/// One WAL write connection plus a round-robin pool of read-only connections.
///
/// Readers never wait on the write mutex, so lookups proceed while a write
/// transaction is open on the same database.
pub struct SqliteConnections {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Vec<Arc<Mutex<Connection>>>,
    read_index: AtomicUsize,
}

impl SqliteConnections {
    pub fn open(
        path: &Path,
        label: &str,
        schemas: &'static [VersionedSchema],
        read_pool_size: usize,
    ) -> Result<Self> {
        let write_conn = open_versioned(path, label, schemas)?;
        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .with_context(|| format!("Failed to enable WAL on {} database", label))?;

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("Failed to open {} read connection", label))?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(Self {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: AtomicUsize::new(0),
        })
    }

    pub fn writer(&self) -> Arc<Mutex<Connection>> {
        self.write_conn.clone()
    }

    pub fn reader(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }
}
