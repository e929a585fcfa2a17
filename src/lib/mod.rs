//! A library of functionality for quality filtering and demultiplexing paired barcode and read
//! FASTQ files.
//!
//! # Overview
//!
//! The flow of data is as follows:
//!
//! - The [`paired_reader::PairedFastqReader`] steps the barcode and read FASTQs together, checking
//!   that each pair of records describes the same cluster.
//! - The [`split_libraries::SplitLibraries`] iterator assigns each pair to a sample with the
//!   [`demux::Demultiplexer`], classifies the read with [`filter::classify`], and yields the
//!   [`demux::DemuxedRead`]s that pass.
//! - [`metrics::RunStatistics`] are accumulated along the way and written as the run log and the
//!   read length histogram once all records have been read.
#![deny(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
pub mod demux;
pub mod error;
pub mod fastq_header;
pub mod filter;
pub mod metrics;
pub mod opts;
pub mod paired_reader;
pub mod quality;
pub mod run;
pub mod sample_metadata;
pub mod split_libraries;
pub mod utils;
