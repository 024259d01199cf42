//! Human-readable run report.

use std::io::{self, Write};

use kustforge_domain::RunOutcome;

use crate::runner::{LookupStats, RunReport};

/// Writes `report` to `out`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_report(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    match report {
        RunReport::Rendered(outcome, stats) => {
            write_outcome(out, outcome)?;
            write_stats(out, stats)?;
        }
        RunReport::RolledBack(results) => {
            for (template, result) in results {
                match result {
                    Ok(output) => writeln!(
                        out,
                        "rolled back {template} to snapshot {} ({})",
                        output.restored.id,
                        output.restored.taken_at.to_rfc3339()
                    )?,
                    Err(err) => {
                        let kind = err
                            .kind()
                            .map_or_else(|| "error".to_string(), |kind| kind.to_string());
                        writeln!(out, "{template}: [{kind}] {err}")?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn write_outcome(out: &mut impl Write, outcome: &RunOutcome) -> io::Result<()> {
    match outcome {
        RunOutcome::DiffOnly(diffs) => {
            for entry in diffs {
                writeln!(out, "{}: {}", entry.template, entry.diff.summary())?;
                write!(out, "{}", entry.diff)?;
            }
        }
        RunOutcome::Success(outputs) => {
            for output in outputs {
                writeln!(out, "applied {} ({})", output.template, output.diff.summary())?;
            }
        }
        RunOutcome::Failure(failures) => {
            writeln!(out, "{} reference(s) failed, nothing was written:", failures.len())?;
            for failure in failures {
                writeln!(out, "  {failure}")?;
            }
        }
    }
    Ok(())
}

fn write_stats(out: &mut impl Write, stats: &LookupStats) -> io::Result<()> {
    writeln!(
        out,
        "lookups: {} fetched ({} cached), {} hit(s), {} coalesced, {} credential exchange(s)",
        stats.cache.misses,
        stats.cached_values,
        stats.cache.hits,
        stats.cache.coalesced,
        stats.credential_exchanges
    )
}
