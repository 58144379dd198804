//! Inspect command implementation.

use serde::Serialize;
use swapbatch_core::{BatchConfig, BatchSequence, Line};

/// Batch inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Batch file prefix.
    pub basename: String,
    /// Capacity of each batch in bytes.
    pub batch_size: usize,
    /// Number of batch files.
    pub batches: usize,
    /// Total records.
    pub items: usize,
    /// Disk space reserved by all batches.
    pub reserved_bytes: u64,
    /// Per-batch details.
    pub details: Vec<BatchInfo>,
}

/// Statistics for a single batch.
#[derive(Debug, Serialize)]
pub struct BatchInfo {
    /// Batch index.
    pub index: usize,
    /// Batch file path.
    pub path: String,
    /// Records in the batch.
    pub records: usize,
}

/// Runs the inspect command.
pub fn run(config: BatchConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(config)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Attaches to preserved batches and counts their records.
pub fn inspect(config: BatchConfig) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut seq = BatchSequence::<Line>::open(config)?;
    let counts = seq.records_per_batch()?;
    let stats = seq.stats();

    let details = counts
        .into_iter()
        .enumerate()
        .map(|(index, records)| BatchInfo {
            index,
            path: seq.batch_path(index).display().to_string(),
            records,
        })
        .collect();

    Ok(InspectResult {
        basename: stats.basename.display().to_string(),
        batch_size: stats.batch_size,
        batches: stats.batches,
        items: stats.items,
        reserved_bytes: stats.reserved_bytes(),
        details,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("SwapBatch Inspection");
    println!("====================");
    println!();
    println!("Basename:    {}", result.basename);
    println!("Batch size:  {}", format_size(result.batch_size as u64));
    println!("Batches:     {}", result.batches);
    println!("Records:     {}", result.items);
    println!("Reserved:    {}", format_size(result.reserved_bytes));
    println!();
    println!("Per batch:");
    for batch in &result.details {
        println!("  [{}] {} records  {}", batch.index, batch.records, batch.path);
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
