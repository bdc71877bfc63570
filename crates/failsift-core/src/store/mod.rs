//! Outcome history storage
//!
//! Histories live behind the [`HistoryStore`] capability so backends are
//! swappable: Redis for shared state across processes, in-memory for tests
//! and single-process embedding.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisHistoryStore;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::rules::Outcome;

/// Bounded, newest-first outcome history keyed by identifier
///
/// Implementations perform no retries; any backend I/O failure propagates
/// to the caller unmodified.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert an outcome at the head of the identifier's history, then trim
    /// the history to at most `limit` entries, discarding the oldest.
    async fn record(&self, identifier: &str, outcome: Outcome, limit: usize) -> Result<()>;

    /// Read the full history, newest-first. Unknown identifiers read empty.
    async fn read(&self, identifier: &str) -> Result<Vec<Outcome>>;

    /// Delete the identifier's history entirely.
    async fn reset(&self, identifier: &str) -> Result<()>;
}

/// The only identifier validation the store layer performs.
pub(crate) fn check_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(Error::validation("identifier must not be empty"));
    }
    Ok(())
}
