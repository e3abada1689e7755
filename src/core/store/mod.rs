//! Counter stores backing the classification statistics.
//!
//! Every operation must be atomic on its own: the aggregator never locks
//! around store calls, and several processes may share one store.

mod memory;
mod sqlite;

use crate::core::model::{StatsCounters, Verdict};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::unavailable(e.to_string())
    }
}

pub trait CounterStore: Send + Sync {
    /// Atomically add one to the counter for `kind` and return the new value.
    fn increment(&self, kind: Verdict) -> Result<u64, StoreError>;

    /// Current value of the counter for `kind`; zero if never incremented.
    fn read(&self, kind: Verdict) -> Result<u64, StoreError>;

    /// Register `dna` and increment `kind`, both or neither.
    /// Returns `false` without touching the counters if `dna` was already registered.
    fn insert_sequence(&self, dna: &str, kind: Verdict) -> Result<bool, StoreError>;

    fn counters(&self) -> Result<StatsCounters, StoreError> {
        Ok(StatsCounters {
            mutant_count: self.read(Verdict::Mutant)?,
            human_count: self.read(Verdict::Human)?,
        })
    }
}
