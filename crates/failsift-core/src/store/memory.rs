//! In-memory history store

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::rules::Outcome;

use super::{check_identifier, HistoryStore};

/// Process-local history store
///
/// Same contract as the Redis backend without the I/O. Useful for tests
/// and for single-process deployments that do not need shared state.
#[derive(Default)]
pub struct MemoryStore {
    histories: RwLock<HashMap<String, VecDeque<Outcome>>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn record(&self, identifier: &str, outcome: Outcome, limit: usize) -> Result<()> {
        check_identifier(identifier)?;

        let mut histories = self.histories.write();
        let history = histories.entry(identifier.to_string()).or_default();
        history.push_front(outcome);
        history.truncate(limit);

        Ok(())
    }

    async fn read(&self, identifier: &str) -> Result<Vec<Outcome>> {
        check_identifier(identifier)?;

        let histories = self.histories.read();
        Ok(histories
            .get(identifier)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn reset(&self, identifier: &str) -> Result<()> {
        check_identifier(identifier)?;

        self.histories.write().remove(identifier);
        Ok(())
    }
}
