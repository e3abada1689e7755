use crate::core::model::{StatsCounters, Verdict};
use crate::core::stats::{StatsAggregator, StatsError, summarize};
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use tracing::warn;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutantResponse {
    pub is_mutant: bool,
}

impl From<Verdict> for MutantResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            is_mutant: verdict.is_mutant(),
        }
    }
}

/// `ratio` is `None` (JSON `null`) when no human sequences have been recorded.
#[derive(Debug, PartialEq, Serialize)]
pub struct StatsResponse {
    pub count_mutant_dna: u64,
    pub count_human_dna: u64,
    pub ratio: Option<f64>,
}

impl StatsResponse {
    pub fn from_counters(counters: StatsCounters) -> Result<Self, StatsError> {
        let ratio = match summarize(counters) {
            Ok(summary) => Some(round2(summary.ratio)),
            Err(StatsError::DivisionUndefined { mutant_count }) => {
                warn!(mutant_count, "no human DNA recorded; ratio is undefined");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            count_mutant_dna: counters.mutant_count,
            count_human_dna: counters.human_count,
            ratio,
        })
    }

    pub fn collect(stats: &StatsAggregator) -> Result<Self, StatsError> {
        Self::from_counters(stats.counters()?)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn write<T: Serialize>(w: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *w, value)?;
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<T: Serialize>(value: &T) -> String {
        let mut out = Vec::new();
        write(&mut out, value).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn mutant_response_shape() {
        assert_eq!(render(&MutantResponse::from(Verdict::Mutant)), "{\"isMutant\":true}\n");
        assert_eq!(render(&MutantResponse::from(Verdict::Human)), "{\"isMutant\":false}\n");
    }

    #[test]
    fn ratio_is_rounded() {
        let resp = StatsResponse::from_counters(StatsCounters {
            mutant_count: 40,
            human_count: 30,
        })
        .unwrap();
        assert_eq!(resp.ratio, Some(1.33));
        assert_eq!(
            render(&resp),
            "{\"count_mutant_dna\":40,\"count_human_dna\":30,\"ratio\":1.33}\n"
        );
    }

    #[test]
    fn undefined_ratio_is_null() {
        let resp = StatsResponse::from_counters(StatsCounters {
            mutant_count: 3,
            human_count: 0,
        })
        .unwrap();
        assert_eq!(resp.ratio, None);
        assert_eq!(
            render(&resp),
            "{\"count_mutant_dna\":3,\"count_human_dna\":0,\"ratio\":null}\n"
        );
    }
}
