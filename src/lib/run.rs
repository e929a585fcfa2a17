use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use log::{debug, info};

use crate::{
    opts::Opts,
    paired_reader::PairedFastqReader,
    sample_metadata::BarcodeMap,
    split_libraries::SplitLibraries,
    utils::{create_output, fastq_records},
};

/// The FASTA of passing reads.
pub const SEQS_FASTA_FILE_NAME: &str = "seqs.fna";
/// The FASTQ of passing reads, written with `--store-qual-scores`.
pub const SEQS_FASTQ_FILE_NAME: &str = "seqs.fastq";
pub const LOG_FILE_NAME: &str = "split_library_log.txt";
pub const HISTOGRAM_FILE_NAME: &str = "histograms.txt";

/// The path of an output file, with a `.gz` suffix if it will be compressed.
fn output_path(output_dir: &Path, file_name: &str, compress: bool) -> PathBuf {
    if compress {
        output_dir.join(format!("{}.gz", file_name))
    } else {
        output_dir.join(file_name)
    }
}

/// Run the quality filter and demultiplexer end to end, writing all outputs to the output
/// directory.
pub fn run(opts: Opts) -> Result<(), anyhow::Error> {
    let filter_config = opts.as_read_filter_config()?;
    let demux_config = opts.as_demux_config();
    debug!("Read filter configuration: {:?}", filter_config);
    debug!("Demultiplexing configuration: {:?}", demux_config);

    // Preflight checks
    ensure!(
        opts.output_dir.is_dir(),
        "Output directory does not exist: {}",
        &opts.output_dir.to_string_lossy()
    );

    info!("Reading mapping file {}", opts.mapping_file.to_string_lossy());
    let barcodes = BarcodeMap::from_path(&opts.mapping_file)?;
    info!("Found {} samples", barcodes.len());

    info!(
        "Opening barcode FASTQ {} and read FASTQ {}",
        opts.barcode_fastq.to_string_lossy(),
        opts.read_fastq.to_string_lossy()
    );
    let source = PairedFastqReader::new(
        fastq_records(&opts.barcode_fastq)?,
        fastq_records(&opts.read_fastq)?,
    );

    let fasta_path = output_path(&opts.output_dir, SEQS_FASTA_FILE_NAME, opts.compress_outputs);
    let mut fasta = create_output(&fasta_path, opts.compress_outputs)?;
    let fastq_path = output_path(&opts.output_dir, SEQS_FASTQ_FILE_NAME, opts.compress_outputs);
    let mut fastq = if opts.store_qual_scores {
        Some(create_output(&fastq_path, opts.compress_outputs)?)
    } else {
        None
    };

    let mut split_libraries = SplitLibraries::new(source, &barcodes, demux_config, filter_config);
    if !opts.skip_log {
        let log = create_output(&opts.output_dir.join(LOG_FILE_NAME), false)?;
        split_libraries = split_libraries.with_log_sink(log);
    }
    if !opts.skip_histogram {
        let histogram = create_output(&opts.output_dir.join(HISTOGRAM_FILE_NAME), false)?;
        split_libraries = split_libraries.with_histogram_sink(histogram);
    }

    info!("Filtering and demultiplexing reads");
    for read in split_libraries.by_ref() {
        let read = read?;
        read.write_fasta(&mut fasta)
            .with_context(|| format!("Failed to write to {}", fasta_path.to_string_lossy()))?;
        if let Some(fastq) = fastq.as_mut() {
            read.write_fastq(fastq)
                .with_context(|| format!("Failed to write to {}", fastq_path.to_string_lossy()))?;
        }
    }

    info!("Flushing outputs");
    fasta.flush().context("Failed to flush and finish writing.")?;
    if let Some(mut fastq) = fastq {
        fastq.flush().context("Failed to flush and finish writing.")?;
    }
    drop(fasta);

    let stats = split_libraries.into_statistics();
    info!(
        "Processed {} input sequences: {} passed, {} with a barcode not in the mapping file, {} too short, {} with too many no-calls, {} with a bad Illumina quality digit",
        stats.input_sequences,
        stats.passed(),
        stats.barcode_not_in_map,
        stats.too_short,
        stats.too_many_no_calls,
        stats.bad_illumina_quality_digit,
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{
        fs::create_dir,
        path::{Path, PathBuf},
    };

    use matches::assert_matches;
    use rstest::rstest;
    use seq_io::fastq::OwnedRecord;

    use crate::{
        error::DemuxError,
        sample_metadata::MappingFileError,
        utils::test_commons::{
            slurp, write_mapping_file, write_reads_to_file, Fq, SAMPLE_BARCODE_1,
            SAMPLE_BARCODE_2,
        },
    };

    use super::{
        run, Opts, HISTOGRAM_FILE_NAME, LOG_FILE_NAME, SEQS_FASTA_FILE_NAME, SEQS_FASTQ_FILE_NAME,
    };

    fn barcode_record(name: &str, barcode: &[u8]) -> OwnedRecord {
        Fq { name: &format!("{}#1/2", name), bases: barcode, ..Fq::default() }.to_owned_record()
    }

    fn read_record(name: &str, bases: &[u8]) -> OwnedRecord {
        Fq { name: &format!("{}#1/1", name), bases, ..Fq::default() }.to_owned_record()
    }

    /// Writes the barcode and read FASTQs, the mapping file, and creates the output directory,
    /// returning [`Opts`] pointing at them.
    fn setup_inputs(
        dir: &Path,
        reads: &[(&str, &[u8], &[u8])],
        compressed_inputs: bool,
    ) -> Opts {
        let suffix = if compressed_inputs { ".fastq.gz" } else { ".fastq" };
        let barcode_fastq = dir.join(format!("barcodes{}", suffix));
        let read_fastq = dir.join(format!("reads{}", suffix));
        write_reads_to_file(
            reads.iter().map(|(name, barcode, _)| barcode_record(name, barcode)),
            &barcode_fastq,
        );
        write_reads_to_file(reads.iter().map(|(name, _, bases)| read_record(name, bases)), &read_fastq);

        let mapping_file =
            write_mapping_file(&dir.join("mapping.tsv"), &[("S1", "AAAAAAAA"), ("S2", "CCCCCCCC")]);
        let output_dir = dir.join("output");
        create_dir(&output_dir).unwrap();

        Opts {
            barcode_fastq,
            read_fastq,
            mapping_file,
            output_dir,
            min_per_read_length: 4,
            ..Opts::default()
        }
    }

    fn standard_reads() -> Vec<(&'static str, &'static [u8], &'static [u8])> {
        vec![
            ("r1", SAMPLE_BARCODE_1, &b"ACGTACGTAC"[..]),
            ("r2", SAMPLE_BARCODE_2, &b"ACGTACGTACGT"[..]),
            ("r3", &b"TTTTTTTT"[..], &b"ACGTACGTAC"[..]),
            ("r4", SAMPLE_BARCODE_2, &b"ACGTACGTACGTACGTACGTA"[..]),
        ]
    }

    fn output(opts: &Opts, file_name: &str) -> PathBuf {
        opts.output_dir.join(file_name)
    }

    #[rstest]
    fn test_end_to_end(#[values(true, false)] compressed_inputs: bool) {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup_inputs(dir.path(), &standard_reads(), compressed_inputs);
        let output_dir = opts.output_dir.clone();
        run(opts).unwrap();

        assert_eq!(
            slurp(output_dir.join(SEQS_FASTA_FILE_NAME), false),
            ">S1_0 r1#1/1\nACGTACGTAC\n\
             >S2_1 r2#1/1\nACGTACGTACGT\n\
             >S2_2 r4#1/1\nACGTACGTACGTACGTACGTA\n"
        );
        assert!(!output_dir.join(SEQS_FASTQ_FILE_NAME).exists());

        let expected_log = "Quality filter results\n\
            Total number of input sequences: 4\n\
            Barcode not in mapping file: 1\n\
            Read too short after quality truncation: 0\n\
            Count of N characters exceeds limit: 0\n\
            Illumina quality digit = 0: 0\n\
            \n\
            Result summary (after quality filtering)\n\
            Median sequence length: 12.00\n\
            S1\t1\n\
            S2\t2";
        assert_eq!(slurp(output_dir.join(LOG_FILE_NAME), false), expected_log);
        assert_eq!(
            slurp(output_dir.join(HISTOGRAM_FILE_NAME), false),
            "Length\tCount\n10\t2\n20\t1"
        );
    }

    #[test]
    fn test_store_qual_scores_with_compressed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let reads: Vec<(&str, &[u8], &[u8])> = vec![("r1", SAMPLE_BARCODE_1, &b"ACGTACGT"[..])];
        let opts = Opts {
            store_qual_scores: true,
            compress_outputs: true,
            start_seq_id: 7,
            ..setup_inputs(dir.path(), &reads, false)
        };
        run(opts.clone()).unwrap();

        let fasta = output(&opts, &format!("{}.gz", SEQS_FASTA_FILE_NAME));
        let fastq = output(&opts, &format!("{}.gz", SEQS_FASTQ_FILE_NAME));
        assert_eq!(slurp(fasta, true), ">S1_7 r1#1/1\nACGTACGT\n");
        assert_eq!(slurp(fastq, true), "@S1_7 r1#1/1\nACGTACGT\n+\nhhhhhhhh\n");
        // The reports are never compressed
        assert!(slurp(output(&opts, LOG_FILE_NAME), false).contains("S1\t1"));
    }

    #[test]
    fn test_skip_log_and_histogram() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Opts {
            skip_log: true,
            skip_histogram: true,
            ..setup_inputs(dir.path(), &standard_reads(), false)
        };
        run(opts.clone()).unwrap();

        assert!(output(&opts, SEQS_FASTA_FILE_NAME).exists());
        assert!(!output(&opts, LOG_FILE_NAME).exists());
        assert!(!output(&opts, HISTOGRAM_FILE_NAME).exists());
    }

    #[test]
    fn test_no_reads_pass() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Opts {
            min_per_read_length: 100,
            ..setup_inputs(dir.path(), &standard_reads(), false)
        };
        run(opts.clone()).unwrap();

        assert_eq!(slurp(output(&opts, SEQS_FASTA_FILE_NAME), false), "");
        let log = slurp(output(&opts, LOG_FILE_NAME), false);
        assert!(log.contains("Read too short after quality truncation: 3\n"));
        assert!(log.ends_with("Median sequence length: nan"));
        assert_eq!(slurp(output(&opts, HISTOGRAM_FILE_NAME), false), "Length\tCount");
    }

    #[test]
    fn test_uneven_inputs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup_inputs(dir.path(), &standard_reads(), false);
        write_reads_to_file(
            vec![read_record("r1", b"ACGTACGTAC"), read_record("r2", b"ACGTACGTACGT")],
            &opts.read_fastq,
        );

        let err = run(opts).unwrap_err();
        assert_matches!(
            err.downcast_ref::<DemuxError>(),
            Some(DemuxError::UnevenInputs { exhausted: "read", records_read: 2 })
        );
    }

    #[test]
    fn test_header_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup_inputs(dir.path(), &standard_reads(), false);
        write_reads_to_file(
            vec![read_record("r1", b"ACGTACGTAC"), read_record("other", b"ACGTACGTACGT")],
            &opts.read_fastq,
        );

        let err = run(opts.clone()).unwrap_err();
        assert_matches!(err.downcast_ref::<DemuxError>(), Some(DemuxError::HeaderMismatch { .. }));
        // Reports are only written once every record has been read
        assert_eq!(slurp(output(&opts, LOG_FILE_NAME), false), "");
    }

    #[test]
    fn test_missing_output_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Opts {
            output_dir: dir.path().join("does-not-exist"),
            ..setup_inputs(dir.path(), &standard_reads(), false)
        };
        let err = run(opts).unwrap_err();
        assert!(err.to_string().starts_with("Output directory does not exist"));
    }

    #[test]
    fn test_duplicate_barcode_in_mapping_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup_inputs(dir.path(), &standard_reads(), false);
        write_mapping_file(&opts.mapping_file, &[("S1", "AAAAAAAA"), ("S2", "aaaaaaaa")]);

        let err = run(opts).unwrap_err();
        assert_matches!(
            err.downcast_ref::<MappingFileError>(),
            Some(MappingFileError::DuplicateBarcode { .. })
        );
    }

    #[test]
    fn test_invalid_quality_threshold_fails_before_reading() {
        let opts = Opts { quality_threshold: String::from("BB"), ..Opts::default() };
        let err = run(opts).unwrap_err();
        assert_matches!(
            err.downcast_ref::<DemuxError>(),
            Some(DemuxError::MultiCharQualityThreshold { .. })
        );
    }
}
