//! Run level statistics collected while filtering and demultiplexing.
//!
//! A single [`RunStatistics`] is owned by the [`crate::split_libraries::SplitLibraries`] iterator
//! and updated once per input record.  Every record is counted as input and then lands in
//! exactly one bucket: unknown barcode, one of the filter failures, or passed (in which case its
//! final length and sample are recorded).
//!
//! At the end of the run the statistics are rendered as a plain text log
//! ([`RunStatistics::render_log`]) and as a read length [`Histogram`].
use std::{io::Write, num::NonZeroUsize};

use ahash::AHashMap;
use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::filter::FilterOutcome;

/// The default width of each [`Histogram`] bin.
pub const DEFAULT_HISTOGRAM_BIN_WIDTH: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(width) => width,
    None => panic!("Histogram bin width must be greater than zero"),
};

/// Counts and lengths accumulated over a run.
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    /// Every record pair read, regardless of its fate.
    pub input_sequences: usize,
    /// Records whose barcode was not found and that were not kept as unassigned.
    pub barcode_not_in_map: usize,
    pub too_short: usize,
    pub too_many_no_calls: usize,
    pub bad_illumina_quality_digit: usize,
    /// The lengths of the passing reads after truncation, in the order they passed.
    pub sequence_lengths: Vec<usize>,
    /// The number of passing reads per sample.
    pub per_sample_counts: AHashMap<String, usize>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_input(&mut self) {
        self.input_sequences += 1;
    }

    pub fn record_unmapped_barcode(&mut self) {
        self.barcode_not_in_map += 1;
    }

    /// Record the outcome of filtering a read assigned to `sample_id`, with `length` being the
    /// length after truncation.
    pub fn record_outcome(&mut self, outcome: FilterOutcome, sample_id: &str, length: usize) {
        match outcome {
            FilterOutcome::Pass => {
                self.sequence_lengths.push(length);
                *self.per_sample_counts.entry(sample_id.to_string()).or_insert(0) += 1;
            }
            FilterOutcome::TooShort => self.too_short += 1,
            FilterOutcome::TooManyNoCalls => self.too_many_no_calls += 1,
            FilterOutcome::BadIlluminaQualityDigit => self.bad_illumina_quality_digit += 1,
        }
    }

    /// The number of reads that had the given outcome.
    pub fn count(&self, outcome: FilterOutcome) -> usize {
        match outcome {
            FilterOutcome::Pass => self.sequence_lengths.len(),
            FilterOutcome::TooShort => self.too_short,
            FilterOutcome::TooManyNoCalls => self.too_many_no_calls,
            FilterOutcome::BadIlluminaQualityDigit => self.bad_illumina_quality_digit,
        }
    }

    /// The number of reads that passed filtering.
    pub fn passed(&self) -> usize {
        self.sequence_lengths.len()
    }

    /// The median length of the passing reads, `None` if no read passed.
    ///
    /// With an even number of reads this is the mean of the two middle lengths.
    pub fn median_sequence_length(&self) -> Option<f64> {
        if self.sequence_lengths.is_empty() {
            return None;
        }
        let sorted = self.sequence_lengths.iter().copied().sorted_unstable().collect_vec();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        };
        Some(median)
    }

    /// Per-sample pass counts, ordered by count and then by sample identifier.
    pub fn sorted_sample_counts(&self) -> Vec<(&str, usize)> {
        self.per_sample_counts
            .iter()
            .map(|(sample_id, count)| (sample_id.as_str(), *count))
            .sorted_by(|(a_id, a_count), (b_id, b_count)| {
                a_count.cmp(b_count).then_with(|| a_id.cmp(b_id))
            })
            .collect()
    }

    /// Render the run log.  Lines are joined with `\n` with no trailing newline.
    pub fn render_log(&self) -> String {
        let median = match self.median_sequence_length() {
            Some(median) => format!("{:.2}", median),
            None => "nan".to_string(),
        };
        let mut lines = vec![
            "Quality filter results".to_string(),
            format!("Total number of input sequences: {}", self.input_sequences),
            format!("Barcode not in mapping file: {}", self.barcode_not_in_map),
        ];
        for outcome in FilterOutcome::iter().filter(|outcome| !outcome.is_pass()) {
            lines.push(format!("{}: {}", outcome, self.count(outcome)));
        }
        lines.push(String::new());
        lines.push("Result summary (after quality filtering)".to_string());
        lines.push(format!("Median sequence length: {}", median));
        for (sample_id, count) in self.sorted_sample_counts() {
            lines.push(format!("{}\t{}", sample_id, count));
        }
        lines.join("\n")
    }

    /// Writes the run log to the given writer.
    pub fn write_log<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.render_log().as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Bin the passing read lengths.
    pub fn histogram(&self, bin_width: NonZeroUsize) -> Histogram {
        Histogram::from_lengths(&self.sequence_lengths, bin_width)
    }
}

/// A single row of the histogram output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramBin {
    /// The lower edge of the bin.
    #[serde(rename = "Length")]
    pub length: usize,
    #[serde(rename = "Count")]
    pub count: usize,
}

/// Read lengths counted into fixed width bins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    /// Count the lengths into bins of `bin_width`.
    ///
    /// The lower edges run from the minimum length rounded down to a multiple of `bin_width`, in
    /// steps of `bin_width`, for as long as they stay below the maximum length rounded down plus
    /// two bin widths.  Every bin is half-open except the last one, which also includes its upper
    /// edge.  No lengths gives no bins.
    pub fn from_lengths(lengths: &[usize], bin_width: NonZeroUsize) -> Self {
        let bin_width = bin_width.get();
        let (min, max) = match lengths.iter().minmax().into_option() {
            Some((min, max)) => (*min, *max),
            None => return Self::default(),
        };

        let floor = (min / bin_width) * bin_width;
        let ceil = ((max / bin_width) + 2) * bin_width;
        let edges = (floor..ceil).step_by(bin_width).collect_vec();
        let mut counts = vec![0; edges.len() - 1];
        for length in lengths {
            let index = ((length - floor) / bin_width).min(counts.len() - 1);
            counts[index] += 1;
        }

        let bins = edges
            .into_iter()
            .zip(counts)
            .map(|(length, count)| HistogramBin { length, count })
            .collect();
        Self { bins }
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Writes the histogram as tab separated `Length` and `Count` columns, with a header even
    /// when there are no bins.  Rows are separated by `\n` with no trailing newline, as in the
    /// run log.
    pub fn write_tsv<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut table =
            csv::WriterBuilder::new().delimiter(b'\t').has_headers(false).from_writer(vec![]);
        table.write_record(&["Length", "Count"])?;
        for bin in &self.bins {
            table.serialize(bin)?;
        }
        let mut table = table.into_inner().map_err(|e| e.into_error())?;
        if table.last() == Some(&b'\n') {
            table.pop();
        }
        writer.write_all(&table)?;
        writer.flush()?;
        Ok(())
    }
}
