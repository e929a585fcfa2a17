//! Lockstep iteration over a barcode FASTQ and its read FASTQ.
//!
//! The two inputs are expected to hold the same clusters in the same order.  Every call to
//! [`PairedFastqReader::next`] pulls exactly one record from each input and checks that their
//! headers describe the same cluster (see [`FastqHeader::matches`]).  Any disagreement between the
//! inputs, whether a header mismatch or one input running out before the other, is fatal.
use anyhow::Result;
use seq_io::fastq::{OwnedRecord, Record};

use crate::{error::DemuxError, fastq_header::FastqHeader, utils::s};

/// A barcode record and its read record.
#[derive(Debug, Clone)]
pub struct RecordPair {
    pub barcode: OwnedRecord,
    pub read: OwnedRecord,
}

/// Zips two FASTQ record streams together, verifying that they stay in step.
///
/// The reader is fused: after yielding an error it only yields `None`.
pub struct PairedFastqReader<B, R> {
    barcodes: B,
    reads: R,
    records_read: usize,
    done: bool,
}

impl<B, R> PairedFastqReader<B, R>
where
    B: Iterator<Item = Result<OwnedRecord>>,
    R: Iterator<Item = Result<OwnedRecord>>,
{
    /// Create a new [`PairedFastqReader`] over the barcode and read record streams.
    pub fn new(barcodes: B, reads: R) -> Self {
        Self { barcodes, reads, records_read: 0, done: false }
    }

    /// The number of pairs yielded so far.
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    fn next_pair(&mut self) -> Option<Result<RecordPair>> {
        let pair = match (self.barcodes.next(), self.reads.next()) {
            (None, None) => return None,
            (Some(Err(e)), _) | (_, Some(Err(e))) => return Some(Err(e)),
            (Some(Ok(_)), None) => {
                return Some(Err(DemuxError::UnevenInputs {
                    exhausted: "read",
                    records_read: self.records_read,
                }
                .into()))
            }
            (None, Some(Ok(_))) => {
                return Some(Err(DemuxError::UnevenInputs {
                    exhausted: "barcode",
                    records_read: self.records_read,
                }
                .into()))
            }
            (Some(Ok(barcode)), Some(Ok(read))) => RecordPair { barcode, read },
        };

        let barcode_header = FastqHeader::new(pair.barcode.head());
        let read_header = FastqHeader::new(pair.read.head());
        if !barcode_header.matches(&read_header) {
            return Some(Err(DemuxError::HeaderMismatch {
                barcode_header: s(barcode_header.as_bytes()),
                read_header: s(read_header.as_bytes()),
            }
            .into()));
        }

        self.records_read += 1;
        Some(Ok(pair))
    }
}

impl<B, R> Iterator for PairedFastqReader<B, R>
where
    B: Iterator<Item = Result<OwnedRecord>>,
    R: Iterator<Item = Result<OwnedRecord>>,
{
    type Item = Result<RecordPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_pair();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}
