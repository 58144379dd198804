//! Dump command implementation.

use serde::Serialize;
use swapbatch_core::{BatchConfig, BatchSequence, Cursor, Line};

/// One stored line for output.
#[derive(Debug, Serialize)]
pub struct LineInfo {
    /// Position in the sequence.
    pub index: usize,
    /// Batch holding the line.
    pub batch: usize,
    /// Offset of the line's header within its batch.
    pub offset: usize,
    /// Line text (invalid UTF-8 replaced).
    pub text: String,
}

/// Runs the dump command.
pub fn run(
    config: BatchConfig,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let lines = read_lines(config, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
        _ => {
            for line in &lines {
                println!("{}", line.text);
            }
        }
    }

    Ok(())
}

/// Reads up to `limit` lines from preserved batches.
pub fn read_lines(
    config: BatchConfig,
    limit: Option<usize>,
) -> Result<Vec<LineInfo>, Box<dyn std::error::Error>> {
    let mut seq = BatchSequence::<Line>::open(config)?;
    let max_lines = limit.unwrap_or(usize::MAX);
    let mut lines = Vec::new();

    let mut cursor = seq.begin()?;
    while let Cursor::At { batch, header } = cursor {
        if lines.len() >= max_lines {
            break;
        }
        let record = seq.record(cursor)?;
        lines.push(LineInfo {
            index: lines.len(),
            batch,
            offset: header,
            text: record.text().into_owned(),
        });
        cursor = seq.next_cursor(cursor)?;
    }

    Ok(lines)
}
