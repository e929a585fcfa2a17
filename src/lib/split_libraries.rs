//! The single pass filter and demultiplex pipeline.
//!
//! [`SplitLibraries`] is a lazy iterator over the reads that are kept.  Each call to `next` pulls
//! record pairs from the source until one passes, in this order for every pair:
//!
//! 1. count the pair as input
//! 2. resolve the barcode to a sample, dropping the pair if it has none
//! 3. classify (and truncate) the read with [`classify`]
//! 4. on a pass, orient the read and give it the next sequence identifier
//!
//! Once the source is exhausted the optional log and histogram are written to their sinks.  A
//! fatal error is yielded once, after which the iterator is done and the sinks are never written.
use std::{io::Write, iter::FusedIterator, num::NonZeroUsize};

use anyhow::{Context, Result};
use log::debug;
use seq_io::fastq::Record;

use crate::{
    demux::{DemuxConfig, DemuxedRead, Demultiplexer},
    filter::{classify, ReadFilterConfig},
    metrics::{RunStatistics, DEFAULT_HISTOGRAM_BIN_WIDTH},
    paired_reader::RecordPair,
    sample_metadata::BarcodeMap,
};

/// Filters and demultiplexes record pairs, yielding the reads that pass.
pub struct SplitLibraries<'a, I> {
    source: I,
    demultiplexer: Demultiplexer<'a>,
    filter_config: ReadFilterConfig,
    statistics: RunStatistics,
    log_sink: Option<Box<dyn Write + 'a>>,
    histogram_sink: Option<Box<dyn Write + 'a>>,
    histogram_bin_width: NonZeroUsize,
    done: bool,
}

impl<'a, I> SplitLibraries<'a, I>
where
    I: Iterator<Item = Result<RecordPair>>,
{
    /// Create a new [`SplitLibraries`] over the record pairs from `source`, typically a
    /// [`crate::paired_reader::PairedFastqReader`].
    pub fn new(
        source: I,
        barcodes: &'a BarcodeMap,
        demux_config: DemuxConfig,
        filter_config: ReadFilterConfig,
    ) -> Self {
        Self {
            source,
            demultiplexer: Demultiplexer::new(barcodes, demux_config),
            filter_config,
            statistics: RunStatistics::new(),
            log_sink: None,
            histogram_sink: None,
            histogram_bin_width: DEFAULT_HISTOGRAM_BIN_WIDTH,
            done: false,
        }
    }

    /// Write the run log to `sink` once all records have been processed.
    #[must_use]
    pub fn with_log_sink<W: Write + 'a>(mut self, sink: W) -> Self {
        self.log_sink = Some(Box::new(sink));
        self
    }

    /// Write the read length histogram to `sink` once all records have been processed.
    #[must_use]
    pub fn with_histogram_sink<W: Write + 'a>(mut self, sink: W) -> Self {
        self.histogram_sink = Some(Box::new(sink));
        self
    }

    /// Set the width of the histogram bins.
    #[must_use]
    pub fn with_histogram_bin_width(mut self, bin_width: NonZeroUsize) -> Self {
        self.histogram_bin_width = bin_width;
        self
    }

    /// The statistics accumulated so far.
    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    /// Consume the iterator, returning the statistics accumulated so far.
    pub fn into_statistics(self) -> RunStatistics {
        self.statistics
    }

    /// Process a single pair, returning the demultiplexed read if it passed.
    fn process(&mut self, pair: &RecordPair) -> Option<DemuxedRead> {
        self.statistics.record_input();

        let sample_id = match self.demultiplexer.assign(pair.barcode.seq()) {
            Some(sample_id) => sample_id,
            None => {
                self.statistics.record_unmapped_barcode();
                return None;
            }
        };

        let header = pair.read.head();
        let filtered = classify(&self.filter_config, header, pair.read.seq(), pair.read.qual());
        self.statistics.record_outcome(filtered.outcome, sample_id, filtered.seq.len());
        if filtered.outcome.is_pass() {
            Some(self.demultiplexer.emit(sample_id, header, filtered.seq, filtered.qual))
        } else {
            None
        }
    }

    /// Write the log and histogram to their sinks, if any.
    fn write_reports(&mut self) -> Result<()> {
        if let Some(mut sink) = self.log_sink.take() {
            debug!("Writing the run log");
            self.statistics.write_log(&mut sink).context("Failed to write the run log")?;
        }
        if let Some(sink) = self.histogram_sink.take() {
            debug!("Writing the read length histogram");
            self.statistics
                .histogram(self.histogram_bin_width)
                .write_tsv(sink)
                .context("Failed to write the read length histogram")?;
        }
        Ok(())
    }
}

impl<'a, I> Iterator for SplitLibraries<'a, I>
where
    I: Iterator<Item = Result<RecordPair>>,
{
    type Item = Result<DemuxedRead>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.source.next() {
                Some(Ok(pair)) => {
                    if let Some(read) = self.process(&pair) {
                        return Some(Ok(read));
                    }
                }
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error));
                }
                None => {
                    self.done = true;
                    if let Err(error) = self.write_reports() {
                        return Some(Err(error));
                    }
                }
            }
        }
        None
    }
}

impl<'a, I> FusedIterator for SplitLibraries<'a, I> where I: Iterator<Item = Result<RecordPair>> {}
