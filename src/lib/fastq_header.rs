#![forbid(unsafe_code)]
#![allow(clippy::must_use_candidate)]
//! Lightweight views over Illumina (pipeline 1.4 - 1.7) FASTQ headers.
//!
//! These headers carry an optional quality control digit after a `#` and an optional mate
//! number after a `/`:
//!
//! ```text
//! <header>     ::= <read-name> | <read-name>#<index> | <read-name>#<index>/<mate>
//! <index>      ::= <qc-digit> | <index-sequence>
//! <qc-digit>   ::= [0-9]
//! <mate>       ::= [0-9]+
//! ```
//!
//! Anything after the first whitespace is treated as an opaque comment.
//!
//! # Usage
//!
//! ```rust
//! use fqsplit_lib::fastq_header::FastqHeader;
//! let header = FastqHeader::new(b"HWI-EAS440_0386:1:23:17547:1423#0/1");
//! assert_eq!(header.read_name(), b"HWI-EAS440_0386:1:23:17547:1423");
//! assert_eq!(header.quality_digit(), Some(0));
//! assert!(header.matches(&FastqHeader::new(b"HWI-EAS440_0386:1:23:17547:1423#0/2")));
//! ```

use bstr::ByteSlice;

/// A borrowed FASTQ header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastqHeader<'a> {
    raw: &'a [u8],
}

impl<'a> FastqHeader<'a> {
    /// Wrap the raw header bytes (without the leading `@`).
    pub fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    /// The header bytes as given.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    /// The header with everything from the first `#` removed, and then everything from the
    /// first `/` removed.
    ///
    /// Two headers describe the same cluster when their read names are equal.
    pub fn read_name(&self) -> &'a [u8] {
        let name = self.raw.find_byte(b'#').map_or(self.raw, |i| &self.raw[..i]);
        name.find_byte(b'/').map_or(name, |i| &name[..i])
    }

    /// True if both headers have the same [`FastqHeader::read_name`].
    pub fn matches(&self, other: &FastqHeader<'_>) -> bool {
        self.read_name() == other.read_name()
    }

    /// The Illumina quality control digit.
    ///
    /// The digit is the character right after the first `#` found in the first whitespace
    /// delimited token.  `None` is returned if there is no such `#`, if nothing follows it, or
    /// if the character is not a decimal digit.
    pub fn quality_digit(&self) -> Option<u8> {
        let first_token = self.raw.fields().next()?;
        let index = first_token.find_byte(b'#')?;
        let digit = *first_token.get(index + 1)?;
        if digit.is_ascii_digit() {
            Some(digit - b'0')
        } else {
            None
        }
    }
}
