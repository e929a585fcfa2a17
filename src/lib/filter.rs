//! Per-read quality filtering.
//!
//! [`classify`] runs the following checks in order, stopping at the first failure:
//!
//! 1. If enabled, the Illumina quality digit in the header must not be `0`.
//! 2. The read is truncated with [`truncate_by_quality`].
//! 3. The truncated read must be at least `min_length` bases long.
//! 4. The truncated read must contain at most `max_no_calls` `N`s.
use strum::{Display, EnumIter};

use crate::{
    fastq_header::FastqHeader,
    quality::{truncate_by_quality, QualityThreshold},
};

/// The default minimum length of a read after truncation.
pub const DEFAULT_MIN_LENGTH: usize = 75;

/// Helper struct to hold onto and reuse the filter parameters used by [`classify`].
#[derive(Debug, Clone)]
pub struct ReadFilterConfig {
    /// The longest run of consecutive bad quality bases tolerated before truncating.
    pub max_bad_run_length: usize,
    /// The quality symbols considered bad.
    pub quality_threshold: QualityThreshold,
    /// Reads shorter than this after truncation are discarded.
    pub min_length: usize,
    /// Reads with more `N`s than this after truncation are discarded.
    pub max_no_calls: usize,
    /// If true, discard reads whose header carries an Illumina quality digit of `0`.
    pub filter_bad_illumina_qual_digit: bool,
}

impl ReadFilterConfig {
    /// Create a new [`ReadFilterConfig`].
    pub fn new(
        max_bad_run_length: usize,
        quality_threshold: QualityThreshold,
        min_length: usize,
        max_no_calls: usize,
        filter_bad_illumina_qual_digit: bool,
    ) -> Self {
        Self {
            max_bad_run_length,
            quality_threshold,
            min_length,
            max_no_calls,
            filter_bad_illumina_qual_digit,
        }
    }
}

impl Default for ReadFilterConfig {
    fn default() -> Self {
        Self {
            max_bad_run_length: 0,
            quality_threshold: QualityThreshold::default(),
            min_length: DEFAULT_MIN_LENGTH,
            max_no_calls: 0,
            filter_bad_illumina_qual_digit: true,
        }
    }
}

/// The reason a read was kept or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FilterOutcome {
    Pass,
    #[strum(serialize = "Read too short after quality truncation")]
    TooShort,
    #[strum(serialize = "Count of N characters exceeds limit")]
    TooManyNoCalls,
    #[strum(serialize = "Illumina quality digit = 0")]
    BadIlluminaQualityDigit,
}

impl FilterOutcome {
    pub fn is_pass(self) -> bool {
        self == FilterOutcome::Pass
    }
}

/// The outcome of [`classify`] along with the (possibly truncated) bases and qualities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilteredRead<'r> {
    pub outcome: FilterOutcome,
    pub seq: &'r [u8],
    pub qual: &'r [u8],
}

/// Classify a single read.
///
/// A failing quality digit short-circuits before truncation, so in that case the bases and
/// qualities are returned unmodified.
pub fn classify<'r>(
    config: &ReadFilterConfig,
    header: &[u8],
    seq: &'r [u8],
    qual: &'r [u8],
) -> FilteredRead<'r> {
    if config.filter_bad_illumina_qual_digit
        && FastqHeader::new(header).quality_digit() == Some(0)
    {
        return FilteredRead { outcome: FilterOutcome::BadIlluminaQualityDigit, seq, qual };
    }

    let (seq, qual) =
        truncate_by_quality(seq, qual, config.max_bad_run_length, &config.quality_threshold);

    let outcome = if seq.len() < config.min_length {
        FilterOutcome::TooShort
    } else if bytecount::count(seq, b'N') > config.max_no_calls {
        FilterOutcome::TooManyNoCalls
    } else {
        FilterOutcome::Pass
    };
    FilteredRead { outcome, seq, qual }
}
