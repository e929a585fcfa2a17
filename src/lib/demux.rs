//! Functionality directly related to assigning reads to samples.
//!
//! The [`Demultiplexer`] resolves a barcode to a sample through a [`BarcodeMap`] and turns reads
//! that passed filtering into [`DemuxedRead`]s, each carrying the next sequence identifier.
use std::{borrow::Cow, io::Write};

use bstr::ByteSlice;

use crate::{sample_metadata::BarcodeMap, utils::reverse_complement};

/// The sample name given to reads whose barcode is not in the [`BarcodeMap`], when such reads are
/// kept.
pub const UNASSIGNED_NAME: &str = "Unassigned";

/// Options controlling sample assignment and the orientation of emitted reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxConfig {
    /// If true, reads with an unknown barcode are emitted under [`UNASSIGNED_NAME`] rather
    /// than dropped.
    pub store_unassigned: bool,
    /// If true, emitted reads are reverse complemented and their qualities reversed.
    pub rev_comp_read: bool,
    /// If true, barcodes are reverse complemented before being looked up.
    pub rev_comp_barcode: bool,
    /// The sequence identifier given to the first emitted read.
    pub start_seq_id: usize,
}

impl DemuxConfig {
    /// Create a new [`DemuxConfig`].
    pub fn new(
        store_unassigned: bool,
        rev_comp_read: bool,
        rev_comp_barcode: bool,
        start_seq_id: usize,
    ) -> Self {
        Self { store_unassigned, rev_comp_read, rev_comp_barcode, start_seq_id }
    }
}

impl Default for DemuxConfig {
    /// Unknown barcodes are dropped, nothing is reverse complemented, and identifiers start at 0.
    fn default() -> Self {
        Self { store_unassigned: false, rev_comp_read: false, rev_comp_barcode: false, start_seq_id: 0 }
    }
}

/// A read that passed filtering and was assigned to a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxedRead {
    /// `{sample_id}_{seq_id} {original read header}`
    pub header: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub seq_id: usize,
}

impl DemuxedRead {
    /// Writes the read as a FASTA record.
    pub fn write_fasta<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(b">")?;
        writer.write_all(self.header.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.seq)?;
        writer.write_all(b"\n")
    }

    /// Writes the read as a FASTQ record.
    pub fn write_fastq<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(b"@")?;
        writer.write_all(self.header.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.seq)?;
        writer.write_all(b"\n+\n")?;
        writer.write_all(&self.qual)?;
        writer.write_all(b"\n")
    }
}

/// Assigns barcodes to samples and hands out sequence identifiers.
#[derive(Debug)]
pub struct Demultiplexer<'a> {
    /// The barcode to sample lookup, fixed for the run.
    barcodes: &'a BarcodeMap,
    config: DemuxConfig,
    /// The identifier given to the next emitted read.
    next_seq_id: usize,
}

impl<'a> Demultiplexer<'a> {
    pub fn new(barcodes: &'a BarcodeMap, config: DemuxConfig) -> Self {
        Self { barcodes, config, next_seq_id: config.start_seq_id }
    }

    /// The identifier that the next emitted read will receive.
    pub fn next_seq_id(&self) -> usize {
        self.next_seq_id
    }

    /// Resolve the barcode to a sample identifier.
    ///
    /// Returns `None` when the barcode is unknown and unassigned reads are not kept; the caller
    /// should count and drop the read.
    pub fn assign(&self, barcode: &[u8]) -> Option<&'a str> {
        let barcode: Cow<[u8]> = if self.config.rev_comp_barcode {
            Cow::Owned(reverse_complement(barcode))
        } else {
            Cow::Borrowed(barcode)
        };
        let barcodes: &'a BarcodeMap = self.barcodes;
        match barcodes.get(&barcode) {
            Some(sample_id) => Some(sample_id),
            None if self.config.store_unassigned => Some(UNASSIGNED_NAME),
            None => None,
        }
    }

    /// Build the output record for a read that passed filtering, consuming one sequence identifier.
    pub fn emit(&mut self, sample_id: &str, header: &[u8], seq: &[u8], qual: &[u8]) -> DemuxedRead {
        let (seq, qual) = if self.config.rev_comp_read {
            (reverse_complement(seq), qual.iter().rev().copied().collect())
        } else {
            (seq.to_vec(), qual.to_vec())
        };
        let seq_id = self.next_seq_id;
        self.next_seq_id += 1;
        DemuxedRead {
            header: format!("{}_{} {}", sample_id, seq_id, header.to_str_lossy()),
            seq,
            qual,
            seq_id,
        }
    }
}
