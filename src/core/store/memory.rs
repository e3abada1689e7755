use super::{CounterStore, StoreError};
use crate::core::model::Verdict;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    counts: HashMap<Verdict, u64>,
    sequences: HashSet<String>,
}

/// Process-local store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }
}

impl CounterStore for MemoryStore {
    fn increment(&self, kind: Verdict) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let count = state.counts.entry(kind).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn read(&self, kind: Verdict) -> Result<u64, StoreError> {
        Ok(self.lock()?.counts.get(&kind).copied().unwrap_or(0))
    }

    fn insert_sequence(&self, dna: &str, kind: Verdict) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        if !state.sequences.insert(dna.to_string()) {
            return Ok(false);
        }
        *state.counts.entry(kind).or_insert(0) += 1;
        Ok(true)
    }
}
