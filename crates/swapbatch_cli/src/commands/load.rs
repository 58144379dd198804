//! Load command implementation.

use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use swapbatch_core::{BatchConfig, BatchSequence, Line};
use tracing::{info, warn};

/// Load result.
#[derive(Debug, Serialize)]
pub struct LoadResult {
    /// Input file.
    pub input: String,
    /// Batch file prefix.
    pub basename: String,
    /// Lines stored.
    pub items: usize,
    /// Lines skipped as oversize or malformed.
    pub skipped: usize,
    /// Batch files created.
    pub batches: usize,
    /// Capacity of each batch in bytes.
    pub batch_size: usize,
    /// Whether the batch files were kept.
    pub preserved: bool,
    /// Summary line.
    pub summary: String,
}

/// Runs the load command.
pub fn run(
    config: BatchConfig,
    input: &Path,
    preserve: bool,
    skip_errors: bool,
    echo: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = load(config, input, preserve, skip_errors, |line| {
        if echo {
            println!("{line}");
        }
    })?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("{}", result.summary);
            if result.skipped > 0 {
                println!("Skipped {} lines.", result.skipped);
            }
            if result.preserved {
                println!("Batch files kept at {}N", result.basename);
            }
        }
    }

    Ok(())
}

/// Stores every line of `input`, passing each stored line to `visit`.
///
/// With `skip_errors`, lines that are too large for a batch or rejected by
/// the reader are logged and skipped instead of ending the load.
pub fn load(
    config: BatchConfig,
    input: &Path,
    preserve: bool,
    skip_errors: bool,
    mut visit: impl FnMut(&str),
) -> Result<LoadResult, Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(File::open(input)?);
    let mut seq = BatchSequence::<Line>::create(config.autodelete(!preserve))?;

    let mut stored = 0;
    let mut skipped = 0;
    loop {
        match seq.append(&mut reader) {
            Ok(Some(line)) => {
                visit(&*line.text());
                stored += 1;
            }
            Ok(None) => break,
            Err(e) if skip_errors && e.is_item_error() => {
                warn!(line = stored + skipped + 1, error = %e, "skipping line");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    info!(input = %input.display(), lines = stored, skipped, batches = seq.n_batches(), "loaded");

    let stats = seq.stats();
    Ok(LoadResult {
        input: input.display().to_string(),
        basename: stats.basename.display().to_string(),
        items: stats.items,
        skipped,
        batches: stats.batches,
        batch_size: stats.batch_size,
        preserved: !seq.is_autodelete(),
        summary: stats.to_string(),
    })
}
