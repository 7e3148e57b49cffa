use std::io::{self, Write};

use tracing::info;

use crate::app::{LoadFailure, ProgressEvent, ProgressSink};
use crate::error::KeggError;
use crate::record::{GenesetRecord, to_clean_json};

pub struct JsonOutput;

impl JsonOutput {
    /// Writes one cleaned JSON record per line and returns how many were written.
    pub fn write_records<W: Write>(
        records: &[GenesetRecord],
        mut writer: W,
    ) -> Result<usize, KeggError> {
        for record in records {
            let value = to_clean_json(record)?;
            let line = serde_json::to_string(&value)
                .map_err(|err| KeggError::Serialize(err.to_string()))?;
            writer
                .write_all(line.as_bytes())
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|err| KeggError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| KeggError::Filesystem(err.to_string()))?;
        Ok(records.len())
    }

    pub fn print_failures(failures: &[LoadFailure]) -> io::Result<()> {
        let mut stderr = io::stderr();
        for failure in failures {
            writeln!(stderr, "skipped {}: {}", failure.unit, failure.error)?;
        }
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress events to the log.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => info!("{}", event.message),
        }
    }
}
