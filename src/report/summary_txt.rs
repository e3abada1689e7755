use crate::core::engine::BatchOutput;
use crate::report::json::StatsResponse;
use anyhow::Result;
use std::io::Write;

pub fn write_stats(w: &mut dyn Write, stats: &StatsResponse) -> Result<()> {
    writeln!(w, "#Measure\tValue")?;
    writeln!(w, "{}\t{}", "Mutant DNA", stats.count_mutant_dna)?;
    writeln!(w, "{}\t{}", "Human DNA", stats.count_human_dna)?;
    match stats.ratio {
        Some(ratio) => writeln!(w, "{}\t{:.2}", "Ratio", ratio)?,
        None => writeln!(w, "{}\t{}", "Ratio", "undefined")?,
    }
    Ok(())
}

pub fn write_batch(w: &mut dyn Write, output: &BatchOutput) -> Result<()> {
    writeln!(w, "#Measure\tValue")?;
    writeln!(w, "{}\t{}", "Processed", output.processed)?;
    writeln!(w, "{}\t{}", "Mutant", output.mutant)?;
    writeln!(w, "{}\t{}", "Human", output.human)?;
    writeln!(w, "{}\t{}", "Duplicates", output.duplicates)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_table() {
        let mut out = Vec::new();
        let stats = StatsResponse {
            count_mutant_dna: 40,
            count_human_dna: 100,
            ratio: Some(0.4),
        };
        write_stats(&mut out, &stats).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#Measure\tValue\nMutant DNA\t40\nHuman DNA\t100\nRatio\t0.40\n"
        );
    }

    #[test]
    fn undefined_ratio() {
        let mut out = Vec::new();
        let stats = StatsResponse {
            count_mutant_dna: 1,
            count_human_dna: 0,
            ratio: None,
        };
        write_stats(&mut out, &stats).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("Ratio\tundefined\n"));
    }

    #[test]
    fn batch_table() {
        let mut out = Vec::new();
        let output = BatchOutput {
            processed: 5,
            mutant: 2,
            human: 2,
            duplicates: 1,
        };
        write_batch(&mut out, &output).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#Measure\tValue\nProcessed\t5\nMutant\t2\nHuman\t2\nDuplicates\t1\n"
        );
    }
}
