//! FASTA file parsing utilities.

use crate::alignment::AlignmentMatrix;
use crate::error::{Error, Result};
use clio::Input;
use needletail::parser::FastxReader;
use needletail::{parse_fastx_file, parse_fastx_stdin};
use std::path::Path;

/// Extracts the accession (first word) from a FASTA header.
#[must_use]
pub fn get_record_accession_string(record_header: &[u8]) -> Option<String> {
    let accession = record_header
        .split(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\x0C' | b'\r'))
        .next();
    match accession {
        Some(acc) if !acc.is_empty() => Some(String::from_utf8_lossy(acc).into_owned()),
        _ => None,
    }
}

/// Parses an aligned FASTA input into an [`AlignmentMatrix`].
pub fn parse_alignment(input: &Input) -> Result<AlignmentMatrix> {
    let reader = if input.is_std() {
        parse_fastx_stdin()
    } else {
        if input.is_empty().unwrap_or(false) {
            return Err(Error::EmptyInput);
        }
        parse_fastx_file(input.path().to_path_buf())
    };

    collect_records(reader.map_err(|e| Error::FastaParse(e.to_string()))?)
}

/// Parses a replicate alignment FASTA from a file path.
pub fn parse_alignment_file(path: &Path) -> Result<AlignmentMatrix> {
    collect_records(parse_fastx_file(path).map_err(|e| Error::FastaParse(e.to_string()))?)
}

fn collect_records(mut reader: Box<dyn FastxReader>) -> Result<AlignmentMatrix> {
    let mut labels = Vec::new();
    let mut rows = Vec::new();

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| Error::FastaParse(e.to_string()))?;

        let label = get_record_accession_string(record.id())
            .ok_or_else(|| Error::FastaParse("record with empty header".to_string()))?;
        let mut sequence = record.seq().to_vec();
        sequence.retain(|&b| !b.is_ascii_whitespace());

        labels.push(label);
        rows.push(sequence);
    }

    AlignmentMatrix::new(labels, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accession_is_first_word() {
        assert_eq!(
            get_record_accession_string(b"seq1 some description"),
            Some("seq1".to_string())
        );
        assert_eq!(get_record_accession_string(b""), None);
    }

    #[test]
    fn parses_aligned_fasta_file() {
        let mut file = tempfile::Builder::new().suffix(".fasta").tempfile().unwrap();
        write!(file, ">a\nAC-T\n>b\nACGT\n").unwrap();
        let matrix = parse_alignment_file(file.path()).unwrap();
        assert_eq!(matrix.row_count(), 2);
        assert_eq!(matrix.column_count(), 4);
        assert_eq!(matrix.label(0), "a");
        assert_eq!(matrix.row(1), b"ACGT");
    }

    #[test]
    fn ragged_fasta_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".fasta").tempfile().unwrap();
        write!(file, ">a\nAC-T\n>b\nACG\n").unwrap();
        assert!(matches!(
            parse_alignment_file(file.path()),
            Err(Error::RaggedAlignment { .. })
        ));
    }
}
