//! Quality scale handling and quality based truncation of reads.
//!
//! Quality symbols are ranked by their position in a [`QualityScale`] (worst to best), not by
//! any numeric Phred conversion.  A [`QualityThreshold`] marks the threshold symbol and every
//! symbol ranked below it as "bad".  [`truncate_by_quality`] then trims a read back to the last
//! good base before the first run of bad bases that is longer than the tolerated run length.
use std::str::FromStr;

use crate::error::DemuxError;

/// The Illumina 1.5+ quality symbols, from worst to best.
pub const ILLUMINA_QUALITY_SYMBOLS: &[u8] =
    b"@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// The symbol used as the default quality threshold.
pub const DEFAULT_QUALITY_THRESHOLD: u8 = b'B';

/// A total order over quality symbols.
#[derive(Debug, Clone, Copy)]
pub struct QualityScale<'a> {
    symbols: &'a [u8],
}

impl QualityScale<'static> {
    /// The fixed Illumina scale, see [`ILLUMINA_QUALITY_SYMBOLS`].
    pub const ILLUMINA: QualityScale<'static> = QualityScale { symbols: ILLUMINA_QUALITY_SYMBOLS };
}

impl<'a> QualityScale<'a> {
    /// Create a scale from symbols ordered from worst to best.
    pub fn new(symbols: &'a [u8]) -> Self {
        Self { symbols }
    }

    /// The rank of `symbol` in the scale (0 is worst), `None` if it is not in the scale.
    pub fn rank(&self, symbol: u8) -> Option<usize> {
        self.symbols.iter().position(|s| *s == symbol)
    }

    /// Build the [`QualityThreshold`] whose bad set is `first_bad` and every worse symbol.
    ///
    /// A `first_bad` of `None` yields a threshold with an empty bad set.
    ///
    /// # Errors
    ///
    /// - [`DemuxError::InvalidQualityThreshold`] if `first_bad` is not in the scale.
    pub fn threshold(&self, first_bad: Option<u8>) -> Result<QualityThreshold, DemuxError> {
        let mut bad = [false; 256];
        if let Some(symbol) = first_bad {
            let rank = self
                .rank(symbol)
                .ok_or(DemuxError::InvalidQualityThreshold { symbol: char::from(symbol) })?;
            for s in &self.symbols[..=rank] {
                bad[usize::from(*s)] = true;
            }
        }
        Ok(QualityThreshold { symbol: first_bad, bad })
    }
}

/// The set of quality symbols considered bad for the run.
#[derive(Clone)]
pub struct QualityThreshold {
    symbol: Option<u8>,
    bad: [bool; 256],
}

impl QualityThreshold {
    /// A threshold on the Illumina scale.
    ///
    /// # Errors
    ///
    /// - [`DemuxError::InvalidQualityThreshold`] if `first_bad` is not an Illumina quality symbol.
    pub fn illumina(first_bad: Option<u8>) -> Result<Self, DemuxError> {
        QualityScale::ILLUMINA.threshold(first_bad)
    }

    /// A threshold that never marks any symbol as bad.
    pub fn none() -> Self {
        Self { symbol: None, bad: [false; 256] }
    }

    /// The threshold symbol, if any.
    pub fn symbol(&self) -> Option<u8> {
        self.symbol
    }

    #[inline]
    pub fn is_bad(&self, qual: u8) -> bool {
        self.bad[usize::from(qual)]
    }
}

impl Default for QualityThreshold {
    fn default() -> Self {
        Self::illumina(Some(DEFAULT_QUALITY_THRESHOLD))
            .expect("default quality threshold is an Illumina quality symbol")
    }
}

impl std::fmt::Debug for QualityThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityThreshold").field("symbol", &self.symbol.map(char::from)).finish()
    }
}

impl FromStr for QualityThreshold {
    type Err = DemuxError;

    /// Parse a threshold on the Illumina scale.  The empty string disables truncation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [] => Ok(Self::none()),
            [symbol] => Self::illumina(Some(*symbol)),
            _ => Err(DemuxError::MultiCharQualityThreshold { threshold: s.to_string() }),
        }
    }
}

/// Truncate a read at the first run of bad quality bases longer than `max_bad_run_length`.
///
/// Bases are scanned left to right.  Every good base moves the cut point to just after itself,
/// every bad base extends the current run.  As soon as the run exceeds `max_bad_run_length` the
/// bases and qualities are cut at the last good base; if that never happens the read is
/// returned untouched.
pub fn truncate_by_quality<'r>(
    seq: &'r [u8],
    qual: &'r [u8],
    max_bad_run_length: usize,
    threshold: &QualityThreshold,
) -> (&'r [u8], &'r [u8]) {
    let mut last_good_end = 0;
    let mut bad_run_length = 0;
    for (i, q) in qual.iter().take(seq.len()).enumerate() {
        if threshold.is_bad(*q) {
            bad_run_length += 1;
        } else {
            bad_run_length = 0;
            last_good_end = i + 1;
        }

        if bad_run_length > max_bad_run_length {
            return (&seq[..last_good_end], &qual[..last_good_end]);
        }
    }
    (seq, qual)
}
