//! Error types for the `rawr` application.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for support-estimation operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse FASTA input: {0}")]
    FastaParse(String),

    #[error("input file is empty")]
    EmptyInput,

    #[error(
        "alignment rows have different lengths ({shortest} to {longest}): input must be a rectangular MSA"
    )]
    RaggedAlignment { shortest: usize, longest: usize },

    #[error("failed to parse Newick tree: {0}")]
    NewickParse(String),

    #[error("input tree leaves do not match the alignment taxa: {0}")]
    TaxonMismatch(String),

    #[error(
        "cannot place {anchor_num} anchors of length {anchor_len} in an alignment of {columns} columns"
    )]
    InsufficientSpace {
        anchor_num: usize,
        anchor_len: usize,
        columns: usize,
    },

    #[error("replicate {replicate}: {message}")]
    ReplicateIo { replicate: usize, message: String },

    #[error("external tool '{tool}' failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("no replicate produced usable artifacts; support cannot be estimated")]
    NoUsableReplicates,

    #[error("failed to write output: {0}")]
    WriteOutput(#[from] io::Error),

    #[error("failed to write report to '{path}': {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write support table to '{path}': {source}")]
    SupportWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
