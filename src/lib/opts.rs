#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::Parser;
use env_logger::Env;

use crate::{
    demux::DemuxConfig,
    filter::ReadFilterConfig,
    quality::QualityThreshold,
    utils::built_info,
};

pub static TOOL_NAME: &str = "fqsplit";

static SHORT_USAGE: &str =
    "Quality filters and demultiplexes a read FASTQ using a paired barcode FASTQ.";

static LONG_USAGE: &str = "
Quality filters and demultiplexes a read FASTQ using a paired barcode FASTQ.

The barcode FASTQ and the read FASTQ must hold the same clusters in the same order, with
matching Illumina 1.4-1.7 style headers (e.g. `NAME#0/2` and `NAME#0/1`).  Either input may be
plain text or block compressed (e.g. with `bgzip`).

Each read is assigned to a sample by looking its barcode up in the mapping file.  Reads are then
truncated at the first run of more than --max-bad-run-length bases with a quality at or below
--quality-threshold, and discarded if they are shorter than --min-per-read-length, contain more
than --max-no-calls `N`s, or carry an Illumina quality digit of 0 in their header.

The mapping file is tab separated with a header line starting with `#SampleID` that must contain a
`BarcodeSequence` column.  Sample IDs and barcodes must be unique.

The following files are written to the output directory:

  - seqs.fna               - the passing reads, named `<sample>_<id> <original header>`
  - seqs.fastq             - the passing reads with qualities, if --store-qual-scores is given
  - split_library_log.txt  - counts of reads discarded per reason and of reads per sample
  - histograms.txt         - a histogram of the lengths of the passing reads

Example invocation:

fqsplit \\
  --barcode-fastq barcodes.fastq.gz \\
  --read-fastq reads.fastq.gz \\
  --mapping-file mapping.tsv \\
  --output-dir split-out/
";

#[derive(Parser, Debug, Clone)]
#[clap(name = TOOL_NAME, version = built_info::VERSION.as_str(), about=SHORT_USAGE, long_about=LONG_USAGE, term_width=0)]
pub struct Opts {
    /// Path to the barcode FASTQ.
    #[clap(long, short = 'b', display_order = 1)]
    pub barcode_fastq: PathBuf,

    /// Path to the read FASTQ.
    #[clap(long, short = 'i', display_order = 1)]
    pub read_fastq: PathBuf,

    /// Path to the mapping file.
    #[clap(long, short = 'm', display_order = 2)]
    pub mapping_file: PathBuf,

    /// The directory to write outputs.
    ///
    /// The directory must exist.  This tool will overwrite existing files.
    #[clap(long, short, display_order = 3)]
    pub output_dir: PathBuf,

    /// Keep reads whose barcode is not in the mapping file, naming them `Unassigned`.
    #[clap(long, display_order = 11)]
    pub store_unassigned: bool,

    /// Max number of consecutive low quality bases allowed before truncating a read.
    #[clap(long, short = 'r', default_value = "0", display_order = 11)]
    pub max_bad_run_length: usize,

    /// The highest quality symbol considered low quality.
    ///
    /// Must be a single symbol from the Illumina 1.5 scale (`@` to `~`).  An empty value disables
    /// quality truncation.
    #[clap(long, short = 'q', default_value = "B", display_order = 11)]
    pub quality_threshold: String,

    /// Min length of a read after quality truncation.
    #[clap(long, short = 'l', default_value = "75", display_order = 11)]
    pub min_per_read_length: usize,

    /// Max number of no-calls (N's) allowed in a read after quality truncation.
    #[clap(long, short = 'n', default_value = "0", display_order = 11)]
    pub max_no_calls: usize,

    /// Do not discard reads with an Illumina quality digit of 0 in their header.
    #[clap(long, display_order = 11)]
    pub skip_illumina_quality_digit_filter: bool,

    /// Reverse complement the reads before writing them.
    #[clap(long, display_order = 21)]
    pub rev_comp: bool,

    /// Reverse complement the barcodes before looking them up in the mapping file.
    #[clap(long, display_order = 21)]
    pub rev_comp_barcode: bool,

    /// The identifier given to the first written read.  Identifiers increase by one per read.
    #[clap(long, short = 's', default_value = "0", display_order = 21)]
    pub start_seq_id: usize,

    /// Also write the passing reads, with their qualities, to `seqs.fastq`.
    #[clap(long, display_order = 31)]
    pub store_qual_scores: bool,

    /// Do not write `split_library_log.txt`.
    #[clap(long, display_order = 31)]
    pub skip_log: bool,

    /// Do not write `histograms.txt`.
    #[clap(long, display_order = 31)]
    pub skip_histogram: bool,

    /// BGZF compress the output reads, appending `.gz` to their file names.
    #[clap(long, display_order = 31)]
    pub compress_outputs: bool,
}

impl Opts {
    /// Extract a [`ReadFilterConfig`] from the CLI opts.
    ///
    /// # Errors
    ///
    /// - if the quality threshold is not a single symbol on the Illumina scale (or empty)
    /// - if the min read length is zero
    pub fn as_read_filter_config(&self) -> Result<ReadFilterConfig> {
        let quality_threshold: QualityThreshold = self.quality_threshold.parse()?;
        ensure!(
            self.min_per_read_length > 0,
            "--min-per-read-length must be greater than zero, found: {}",
            self.min_per_read_length
        );
        Ok(ReadFilterConfig::new(
            self.max_bad_run_length,
            quality_threshold,
            self.min_per_read_length,
            self.max_no_calls,
            !self.skip_illumina_quality_digit_filter,
        ))
    }

    /// Extract a [`DemuxConfig`] from the CLI opts.
    pub fn as_demux_config(&self) -> DemuxConfig {
        DemuxConfig::new(
            self.store_unassigned,
            self.rev_comp,
            self.rev_comp_barcode,
            self.start_seq_id,
        )
    }
}

/// Implement defaults that match the CLI options to allow for easier testing.
///
/// Note that these defaults exist only within test code.
#[cfg(test)]
impl Default for Opts {
    fn default() -> Self {
        Self {
            barcode_fastq: PathBuf::default(),
            read_fastq: PathBuf::default(),
            mapping_file: PathBuf::default(),
            output_dir: PathBuf::default(),
            store_unassigned: false,
            max_bad_run_length: 0,
            quality_threshold: String::from("B"),
            min_per_read_length: crate::filter::DEFAULT_MIN_LENGTH,
            max_no_calls: 0,
            skip_illumina_quality_digit_filter: false,
            rev_comp: false,
            rev_comp_barcode: false,
            start_seq_id: 0,
            store_qual_scores: false,
            skip_log: false,
            skip_histogram: false,
            compress_outputs: false,
        }
    }
}

/// Parse args and set up logging / tracing
pub fn setup() -> Opts {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    Opts::parse()
}
