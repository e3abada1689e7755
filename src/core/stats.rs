use crate::core::model::{Grid, StatsCounters, StatsSummary, Verdict};
use crate::core::store::{CounterStore, StoreError};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error(transparent)]
    StorageUnavailable(#[from] StoreError),

    #[error("ratio undefined: no human sequences recorded ({mutant_count} mutant)")]
    DivisionUndefined { mutant_count: u64 },
}

/// Records verdicts against an injected counter store and reports the totals.
/// Holds no counter state of its own.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn CounterStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, verdict: Verdict) -> Result<(), StatsError> {
        self.store.increment(verdict)?;
        Ok(())
    }

    /// Record `verdict` only the first time this exact grid is seen.
    /// Returns whether the grid was new.
    pub fn record_sequence(&self, grid: &Grid, verdict: Verdict) -> Result<bool, StatsError> {
        let stored = self.store.insert_sequence(&grid.fingerprint(), verdict)?;
        if stored {
            info!(%verdict, size = grid.size(), "DNA sequence stored");
        } else {
            info!(%verdict, size = grid.size(), "DNA sequence already recorded");
        }
        Ok(stored)
    }

    pub fn counters(&self) -> Result<StatsCounters, StatsError> {
        Ok(self.store.counters()?)
    }

    pub fn summary(&self) -> Result<StatsSummary, StatsError> {
        summarize(self.counters()?)
    }
}

pub fn summarize(counters: StatsCounters) -> Result<StatsSummary, StatsError> {
    let StatsCounters {
        mutant_count,
        human_count,
    } = counters;
    if human_count == 0 {
        return Err(StatsError::DivisionUndefined { mutant_count });
    }
    Ok(StatsSummary {
        mutant_count,
        human_count,
        ratio: mutant_count as f64 / human_count as f64,
    })
}
