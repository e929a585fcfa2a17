//! Utility functions.
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use core::fmt::Display;
use gzp::{deflate::Bgzf, BgzfSyncReader, BgzfSyncWriter, BlockFormatSpec, Compression, GzpError, BUFSIZE};
use seq_io::fastq::{self, OwnedRecord};

/// The compression level used for BGZF outputs.
pub const OUTPUT_COMPRESSION_LEVEL: u32 = 3;

pub mod built_info {
    use lazy_static::lazy_static;
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    /// Get a software version string including
    ///   - Git commit hash
    ///   - Git dirty info (whether the repo had uncommitted changes)
    ///   - Cargo package version if no git info found
    fn get_software_version() -> String {
        let prefix = match GIT_COMMIT_HASH {
            Some(s) if s.len() >= 8 => format!("{}-{}", PKG_VERSION, &s[0..8]),
            _ => PKG_VERSION.to_string(),
        };
        let suffix = match GIT_DIRTY {
            Some(true) => "-dirty",
            _ => "",
        };
        format!("{}{}", prefix, suffix)
    }

    lazy_static! {
        /// Version of the software with git hash
        pub static ref VERSION: String = get_software_version();
    }
}

/// Lossy conversion of bytes into a `String`.
pub fn s(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

/// Complement of every byte: `ACGTN`, the IUPAC ambiguity codes, and their lower case forms are
/// complemented, anything else maps to itself.
const COMPLEMENT: [u8; 256] = build_complement_table();

const fn build_complement_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }
    let pairs: [(u8, u8); 10] = [
        (b'A', b'T'),
        (b'C', b'G'),
        (b'N', b'N'),
        (b'R', b'Y'),
        (b'S', b'S'),
        (b'W', b'W'),
        (b'K', b'M'),
        (b'B', b'V'),
        (b'D', b'H'),
        (b'U', b'A'),
    ];
    let mut j = 0;
    while j < pairs.len() {
        let (a, b) = pairs[j];
        // U only complements one way; A -> T
        if a != b'U' {
            table[b as usize] = a;
            table[b.to_ascii_lowercase() as usize] = a.to_ascii_lowercase();
        }
        table[a as usize] = b;
        table[a.to_ascii_lowercase() as usize] = b.to_ascii_lowercase();
        j += 1;
    }
    table
}

/// Reverse complement a sequence of bases.
pub fn reverse_complement(bases: &[u8]) -> Vec<u8> {
    bases.iter().rev().map(|b| COMPLEMENT[usize::from(*b)]).collect()
}

/// The compression format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Plain,
    Bgzf,
}

/// Determines whether the file is plain text or BGZF from its first bytes.
///
/// # Errors
///
/// - if the file cannot be opened or read
/// - if the file is GZIP compressed but not BGZF
pub fn detect_input_format(file: &Path) -> Result<InputFormat> {
    let reader = match File::open(file) {
        Ok(f) => BufReader::with_capacity(BUFSIZE, f),
        Err(error) => {
            return Err(error).with_context(|| format!("Failed to open {}", file.to_string_lossy()))
        }
    };
    let mut bytes = Vec::with_capacity(Bgzf::HEADER_SIZE);
    reader
        .take(Bgzf::HEADER_SIZE as u64)
        .read_to_end(&mut bytes)
        .with_context(|| format!("Error reading from: {}", file.to_string_lossy()))?;

    if bytes.len() < 3 || bytes[0] != 31 || bytes[1] != 139 || bytes[2] != 8 {
        Ok(InputFormat::Plain)
    } else if bytes.len() < Bgzf::HEADER_SIZE
        || bytes[3] & 4 != 4
        || bytes[12] != b'B'
        || bytes[13] != b'C'
    {
        Err(report_bgzf_error(file, GzpError::InvalidHeader("Header in GZIP but not BGZF format")))
    } else {
        Ok(InputFormat::Bgzf)
    }
}

/// Creates an error message when the file is GZIP but not BGZF.
fn report_bgzf_error<C>(file: &Path, context: C) -> anyhow::Error
where
    C: Display + Send + Sync + 'static,
{
    let filename = file.to_string_lossy();
    let message = format!(
        "
Error reading from: {}

Compressed inputs must be in BGZF (bgzip) format, but a plain GZIP file was found.

To re-compress a GZIP file with bgzip:
  1. install with `conda install -c bioconda htslib`
     or from http://www.htslib.org/download/
  2. `gunzip -c {} > tmp.fastq`
  3. `bgzip --stdout --threads tmp.fastq > {}`
",
        filename, filename, filename,
    );
    anyhow!(message).context(context)
}

/// Opens a plain text or BGZF compressed file for reading.
///
/// # Errors
///
/// See [`detect_input_format`].
pub fn open_input(file: &Path) -> Result<Box<dyn Read + Send>> {
    let format = detect_input_format(file)?;
    let reader = BufReader::with_capacity(
        BUFSIZE,
        File::open(file).with_context(|| format!("Failed to open {}", file.to_string_lossy()))?,
    );
    Ok(match format {
        InputFormat::Plain => Box::new(reader),
        InputFormat::Bgzf => Box::new(BgzfSyncReader::new(reader)),
    })
}

/// Opens a FASTQ file and iterates over its records.
///
/// Parse errors are reported with the name of the file.
///
/// # Errors
///
/// See [`open_input`].
pub fn fastq_records(file: &Path) -> Result<impl Iterator<Item = Result<OwnedRecord>>> {
    let reader = fastq::Reader::with_capacity(open_input(file)?, BUFSIZE);
    let filename = file.to_string_lossy().to_string();
    Ok(reader
        .into_records()
        .map(move |r| r.with_context(|| format!("Failed to parse a FASTQ record from {}", filename))))
}

/// Creates a buffered writer to the given path, BGZF compressed if `compress` is true.
///
/// # Errors
///
/// - if the file cannot be created
pub fn create_output(file: &Path, compress: bool) -> Result<Box<dyn Write>> {
    let writer = BufWriter::with_capacity(
        BUFSIZE,
        File::create(file)
            .with_context(|| format!("Failed to create {}", file.to_string_lossy()))?,
    );
    Ok(if compress {
        Box::new(BgzfSyncWriter::new(writer, Compression::new(OUTPUT_COMPRESSION_LEVEL)))
    } else {
        Box::new(writer)
    })
}
