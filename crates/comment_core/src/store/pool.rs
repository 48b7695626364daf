//! Small fixed-size SQLite connection pool.
//!
//! One writer connection plus optional read-only connections, each behind its
//! own mutex. With no readers, reads share the writer.

use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) struct ConnectionPool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    read_cursor: AtomicUsize,
}

impl ConnectionPool {
    pub(crate) fn new(writer: Connection, readers: Vec<Connection>) -> Self {
        Self {
            writer: Mutex::new(writer),
            readers: readers.into_iter().map(Mutex::new).collect(),
            read_cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn writer(&self) -> MutexGuard<'_, Connection> {
        // Transactions roll back when dropped during unwind, so a poisoned
        // connection is still consistent.
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the next read connection using round-robin selection.
    pub(crate) fn reader(&self) -> MutexGuard<'_, Connection> {
        if self.readers.is_empty() {
            return self.writer();
        }
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        self.readers[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Visits every pooled connection, writer first.
    pub(crate) fn for_each<E>(
        &self,
        mut visit: impl FnMut(&Connection) -> Result<(), E>,
    ) -> Result<(), E> {
        visit(&*self.writer())?;
        for reader in &self.readers {
            visit(&*reader.lock().unwrap_or_else(PoisonError::into_inner))?;
        }
        Ok(())
    }
}
