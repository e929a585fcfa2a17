//! Fatal errors raised while quality filtering and demultiplexing.
//!
//! Per-read filter outcomes (too short, too many no-calls, etc.) are never errors; they are
//! tallied in [`crate::metrics::RunStatistics`].  The errors here either indicate that the two
//! input FASTQs are not aligned with one another, or that the run was misconfigured.
use thiserror::Error;

/// The errors that terminate a run.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("Headers of barcode and read do not match: {barcode_header:?} != {read_header:?}. Confirm that the barcode FASTQ and read FASTQ match one another.")]
    HeaderMismatch { barcode_header: String, read_header: String },

    #[error("The {exhausted} FASTQ ended after {records_read} records but the other FASTQ has more records (likely uneven input FASTQs)")]
    UnevenInputs { exhausted: &'static str, records_read: usize },

    #[error("Quality threshold symbol {symbol:?} is not in the quality scale")]
    InvalidQualityThreshold { symbol: char },

    #[error("Quality threshold must be a single symbol or empty, found: {threshold:?}")]
    MultiCharQualityThreshold { threshold: String },
}
