#![forbid(unsafe_code)]
#![allow(clippy::must_use_candidate)]
//! Sample metadata and the barcode to sample lookup used when demultiplexing.
//!
//! Samples are read from a tab-separated mapping file:
//!
//! ```text
//! #SampleID	BarcodeSequence	LinkerPrimerSequence	Description
//! # optional comment lines start with a '#'
//! Sample1	AACCGGTT	GTGCCAGCMGCCGCGGTAA	first sample
//! Sample2	TTGGCCAA	GTGCCAGCMGCCGCGGTAA	second sample
//! ```
//!
//! The header must be the first non-blank line, must start with `#SampleID`, and must name a
//! `BarcodeSequence` column.  The sample identifier is always the first column.  Any other
//! columns are ignored.
use std::{fmt::Display, path::Path};

use ahash::{AHashMap, AHashSet};
use bstr::{BString, ByteSlice};
use csv::{ReaderBuilder, StringRecord, Trim};
use fgoxide::io::Io;
use thiserror::Error;

/// The bases that are allowed in a [`SampleMetadata::barcode`].
const ALLOWED_BASES: &[u8] = &[b'A', b'C', b'G', b'T', b'N'];

/// The prefix of the mapping file header line.
pub const SAMPLE_ID_HEADER: &str = "#SampleID";

/// The name of the mapping file column holding the sample barcode.
pub const BARCODE_COLUMN: &str = "BarcodeSequence";

/// The reason that a barcode has been deemed invalid.
#[derive(Debug)]
#[non_exhaustive]
pub enum ReasonBarcodeInvalid {
    EmptyString,
    InvalidBases(BString),
}

impl Display for ReasonBarcodeInvalid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyString => write!(f, "Barcode is an empty string"),
            Self::InvalidBases(bases) => {
                write!(f, "Barcode contains bases other than A, C, G, T, or N: {}", bases)
            }
        }
    }
}

/// The error that may occur when reading a mapping file.
#[derive(Error, Debug)]
pub enum MappingFileError {
    #[error("Io error occurred")]
    FgError(#[from] fgoxide::FgError),

    #[error(transparent)]
    Deserialize(#[from] csv::Error),

    #[error("The mapping file was empty")]
    Empty,

    #[error("The first line of the mapping file must start with '#SampleID', found: {line}")]
    MissingHeader { line: String },

    #[error("The mapping file header is missing the 'BarcodeSequence' column")]
    MissingBarcodeColumn,

    #[error("The sample on line {line_number} had {actual} fields, expected at least {expected} fields")]
    TooFewFields { actual: usize, expected: usize, line_number: usize },

    #[error("Empty sample ID on line {line_number}")]
    EmptySampleId { line_number: usize },

    #[error("Invalid barcode sequence for {id} `{barcode}` - {reason}. Line {line_number}")]
    InvalidBarcode { barcode: String, id: String, reason: ReasonBarcodeInvalid, line_number: usize },

    #[error("Duplicate sample ID found on line {line_number}: {id}")]
    DuplicateSampleId { id: String, line_number: usize },

    #[error("Duplicate barcode {barcode} found on line {line_number} for {sample_b}, already used by {sample_a}")]
    DuplicateBarcode { barcode: String, sample_a: String, sample_b: String, line_number: usize },
}

/// Metadata about a sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleMetadata {
    /// The unique identifier for the sample.
    pub sample_id: String,
    /// The sanitized (upper-cased) barcode used for demultiplexing.
    pub barcode: BString,
    /// The line number in the input in which this sample was defined.
    pub line_number: Option<usize>,
}

impl SampleMetadata {
    /// Create a new [`SampleMetadata`] object, upper-casing the barcode.
    ///
    /// # Errors
    ///
    /// - [`MappingFileError::InvalidBarcode`] if the barcode is empty or has bases other than
    ///   `ACGTN`
    pub fn new(
        sample_id: String,
        barcode: &[u8],
        line_number: usize,
    ) -> Result<Self, MappingFileError> {
        if sample_id.is_empty() {
            return Err(MappingFileError::EmptySampleId { line_number });
        }
        let barcode = Self::sanitize_barcode(barcode);
        Self::validate_barcode(&barcode, &sample_id, line_number)?;
        Ok(Self { sample_id, barcode, line_number: Some(line_number) })
    }

    /// Upper-case the barcode.
    pub fn sanitize_barcode(raw_barcode: &[u8]) -> BString {
        BString::from(raw_barcode.to_ascii_uppercase())
    }

    /// Validates that the barcode is non-empty and has only valid bases.
    ///
    /// # Errors
    ///
    /// - [`MappingFileError::InvalidBarcode`] if the barcode is invalid
    pub fn validate_barcode(
        barcode: &[u8],
        id: &str,
        line_number: usize,
    ) -> Result<(), MappingFileError> {
        let reason = if barcode.is_empty() {
            ReasonBarcodeInvalid::EmptyString
        } else if !barcode.iter().all(|b| ALLOWED_BASES.contains(b)) {
            ReasonBarcodeInvalid::InvalidBases(BString::from(barcode))
        } else {
            return Ok(());
        };
        Err(MappingFileError::InvalidBarcode {
            barcode: barcode.to_str_lossy().to_string(),
            id: id.to_string(),
            reason,
            line_number,
        })
    }
}

/// Maps a barcode sequence to the identifier of the sample it belongs to.
#[derive(Debug, Clone, Default)]
pub struct BarcodeMap {
    samples: AHashMap<Vec<u8>, String>,
}

impl BarcodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from validated samples.
    ///
    /// # Errors
    ///
    /// - [`MappingFileError::DuplicateSampleId`] if two samples share an identifier
    /// - [`MappingFileError::DuplicateBarcode`] if two samples share a barcode
    pub fn from_samples(samples: &[SampleMetadata]) -> Result<Self, MappingFileError> {
        let mut ids = AHashSet::with_capacity(samples.len());
        let mut map = Self::new();
        for sample in samples {
            let line_number = sample.line_number.unwrap_or_default();
            if !ids.insert(sample.sample_id.as_str()) {
                return Err(MappingFileError::DuplicateSampleId {
                    id: sample.sample_id.clone(),
                    line_number,
                });
            }
            if let Some(existing) = map.get(&sample.barcode) {
                return Err(MappingFileError::DuplicateBarcode {
                    barcode: sample.barcode.to_string(),
                    sample_a: existing.to_string(),
                    sample_b: sample.sample_id.clone(),
                    line_number,
                });
            }
            map.insert(sample.barcode.to_vec(), sample.sample_id.clone());
        }
        Ok(map)
    }

    /// Reads a mapping file and builds the map from it.
    ///
    /// # Errors
    ///
    /// Any [`MappingFileError`], see [`read_mapping_file`] and [`BarcodeMap::from_samples`].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, MappingFileError> {
        Self::from_samples(&read_mapping_file(path)?)
    }

    /// Insert a barcode, returning the sample it previously mapped to, if any.
    pub fn insert(&mut self, barcode: Vec<u8>, sample_id: String) -> Option<String> {
        self.samples.insert(barcode, sample_id)
    }

    /// The sample identifier for the barcode, if any.
    #[inline]
    pub fn get(&self, barcode: &[u8]) -> Option<&str> {
        self.samples.get(barcode).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl<B: Into<Vec<u8>>, S: Into<String>> FromIterator<(B, S)> for BarcodeMap {
    fn from_iter<T: IntoIterator<Item = (B, S)>>(iter: T) -> Self {
        Self { samples: iter.into_iter().map(|(b, s)| (b.into(), s.into())).collect() }
    }
}

/// Reads the samples from the mapping file at the given path.
///
/// # Errors
///
/// - [`MappingFileError::Empty`] if there are no non-blank lines
/// - [`MappingFileError::MissingHeader`] if the first non-blank line is not the header
/// - [`MappingFileError::MissingBarcodeColumn`] if the header lacks the barcode column
/// - [`MappingFileError::TooFewFields`] if a sample line does not reach the barcode column
/// - [`MappingFileError::EmptySampleId`] and [`MappingFileError::InvalidBarcode`] for bad values
pub fn read_mapping_file<P: AsRef<Path>>(path: P) -> Result<Vec<SampleMetadata>, MappingFileError> {
    let io = Io::default();
    let lines = io.read_lines(&path.as_ref())?;
    samples_from_lines(&lines)
}

/// Parses the samples from the lines of a mapping file.
///
/// # Errors
///
/// See [`read_mapping_file`].
pub fn samples_from_lines<S: AsRef<str>>(
    lines: &[S],
) -> Result<Vec<SampleMetadata>, MappingFileError> {
    // Keep the 1-based line number of every line that is not blank, and not a comment after the
    // header.
    let mut kept: Vec<(usize, &str)> = vec![];
    for (index, line) in lines.iter().map(AsRef::as_ref).enumerate() {
        if line.trim().is_empty() || (!kept.is_empty() && line.starts_with('#')) {
            continue;
        }
        kept.push((index + 1, line));
    }

    let (_, header) = kept.first().ok_or(MappingFileError::Empty)?;
    if !header.starts_with(SAMPLE_ID_HEADER) {
        return Err(MappingFileError::MissingHeader { line: header.to_string() });
    }

    let data = kept.iter().map(|(_, line)| *line).collect::<Vec<_>>().join("\n");
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data.as_bytes());
    let records = reader.records().collect::<Result<Vec<StringRecord>, csv::Error>>()?;

    let barcode_index = records
        .first()
        .and_then(|header| header.iter().position(|column| column == BARCODE_COLUMN))
        .ok_or(MappingFileError::MissingBarcodeColumn)?;

    let mut samples = Vec::with_capacity(records.len().saturating_sub(1));
    for (record, (line_number, _)) in records.iter().zip(kept.iter()).skip(1) {
        if record.len() <= barcode_index {
            return Err(MappingFileError::TooFewFields {
                actual: record.len(),
                expected: barcode_index + 1,
                line_number: *line_number,
            });
        }
        samples.push(SampleMetadata::new(
            record[0].to_string(),
            record[barcode_index].as_bytes(),
            *line_number,
        )?);
    }
    Ok(samples)
}

#[cfg(test)]
mod test {
    use matches::assert_matches;
    use rstest::rstest;
    use tempfile::tempdir;

    use crate::utils::test_commons::write_mapping_file;

    use super::{read_mapping_file, samples_from_lines, BarcodeMap, MappingFileError};

    const HEADER: &str = "#SampleID\tBarcodeSequence\tLinkerPrimerSequence\tDescription";

    #[test]
    fn test_all_valid_data() {
        let lines = vec![
            HEADER,
            "#comment line",
            "S1\tAACCGGTT\tGTGC\tfirst",
            "",
            "S2\tttggccaa\tGTGC\tsecond",
        ];
        let samples = samples_from_lines(&lines).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].sample_id, "S1");
        assert_eq!(samples[0].barcode, "AACCGGTT");
        assert_eq!(samples[0].line_number, Some(3));
        assert_eq!(samples[1].sample_id, "S2");
        // Upper-cased
        assert_eq!(samples[1].barcode, "TTGGCCAA");
        assert_eq!(samples[1].line_number, Some(5));

        let map = BarcodeMap::from_samples(&samples).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(b"AACCGGTT"), Some("S1"));
        assert_eq!(map.get(b"TTGGCCAA"), Some("S2"));
        assert_eq!(map.get(b"ttggccaa"), None);
    }

    #[test]
    fn test_barcode_column_need_not_be_second() {
        let lines = vec!["#SampleID\tDescription\tBarcodeSequence", "S1\tfirst\tACGT"];
        let samples = samples_from_lines(&lines).unwrap();
        assert_eq!(samples[0].barcode, "ACGT");
    }

    #[test]
    fn test_header_only_is_no_samples() {
        let samples = samples_from_lines(&[HEADER]).unwrap();
        assert!(samples.is_empty());
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec!["", "  "])]
    fn test_empty(#[case] lines: Vec<&str>) {
        assert_matches!(samples_from_lines(&lines), Err(MappingFileError::Empty));
    }

    #[test]
    fn test_missing_header() {
        let lines = vec!["S1\tACGT", "S2\tTTTT"];
        assert_matches!(samples_from_lines(&lines), Err(MappingFileError::MissingHeader { .. }));
    }

    #[test]
    fn test_missing_barcode_column() {
        let lines = vec!["#SampleID\tDescription", "S1\tACGT"];
        assert_matches!(samples_from_lines(&lines), Err(MappingFileError::MissingBarcodeColumn));
    }

    #[test]
    fn test_too_few_fields() {
        let lines = vec![HEADER, "S1\tACGT", "S2"];
        assert_matches!(
            samples_from_lines(&lines),
            Err(MappingFileError::TooFewFields { actual: 1, expected: 2, line_number: 3 })
        );
    }

    #[test]
    fn test_empty_sample_id() {
        let lines = vec![HEADER, "\tACGT\tGTGC\tx"];
        assert_matches!(
            samples_from_lines(&lines),
            Err(MappingFileError::EmptySampleId { line_number: 2 })
        );
    }

    #[rstest]
    #[case("S1\t\tGTGC\tx")]
    #[case("S1\tACGU\tGTGC\tx")]
    #[case("S1\tAC-GT\tGTGC\tx")]
    fn test_invalid_barcode(#[case] line: &str) {
        let lines = vec![HEADER, line];
        let result = samples_from_lines(&lines);
        assert_matches!(result, Err(MappingFileError::InvalidBarcode { line_number: 2, .. }));
    }

    #[test]
    fn test_duplicate_sample_id() {
        let lines = vec![HEADER, "S1\tAAAA", "S1\tCCCC"];
        let samples = samples_from_lines(&lines).unwrap();
        assert_matches!(
            BarcodeMap::from_samples(&samples),
            Err(MappingFileError::DuplicateSampleId { line_number: 3, .. })
        );
    }

    #[test]
    fn test_duplicate_barcode() {
        let lines = vec![HEADER, "S1\tAAAA", "S2\taaaa"];
        let samples = samples_from_lines(&lines).unwrap();
        match BarcodeMap::from_samples(&samples) {
            Err(MappingFileError::DuplicateBarcode { barcode, sample_a, sample_b, line_number }) => {
                assert_eq!(barcode, "AAAA");
                assert_eq!(sample_a, "S1");
                assert_eq!(sample_b, "S2");
                assert_eq!(line_number, 3);
            }
            other => panic!("Expected a duplicate barcode error, found: {:?}", other),
        }
    }

    #[test]
    fn test_read_from_path() {
        let dir = tempdir().unwrap();
        let path = write_mapping_file(&dir.path().join("map.txt"), &[("S1", "AAAA"), ("S2", "CCCC")]);
        let samples = read_mapping_file(&path).unwrap();
        assert_eq!(samples.len(), 2);

        let map = BarcodeMap::from_path(&path).unwrap();
        assert_eq!(map.get(b"AAAA"), Some("S1"));
        assert_eq!(map.get(b"CCCC"), Some("S2"));
    }

    #[test]
    fn test_from_iter() {
        let map: BarcodeMap = vec![("AAAA", "S1"), ("CCCC", "S2")].into_iter().collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(b"AAAA"), Some("S1"));
        assert!(!map.is_empty());
        assert!(BarcodeMap::new().is_empty());
    }
}
