//! Alignment data structures and operations.
//!
//! This module provides the immutable in-memory representation of a multiple
//! sequence alignment (rows = taxa, columns = alignment positions) and the
//! operations needed to derive resampled matrices from column index
//! sequences.

use crate::error::{Error, Result};
use itertools::Itertools;

#[inline]
pub const fn is_gap_char(byte: u8) -> bool {
    byte == b'-' || byte == b'.'
}

/// An immutable multiple sequence alignment.
///
/// Every row holds exactly `column_count` symbols. Constructed once from
/// parsed input and never mutated; resampling produces new matrices.
#[derive(Clone, Debug)]
pub struct AlignmentMatrix {
    labels: Vec<String>,
    rows: Vec<Vec<u8>>,
    column_count: usize,
}

impl AlignmentMatrix {
    /// Builds a matrix from labeled rows, requiring at least one row and
    /// uniform row length.
    pub fn new(labels: Vec<String>, rows: Vec<Vec<u8>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }

        let (shortest, longest) = rows
            .iter()
            .map(Vec::len)
            .minmax()
            .into_option()
            .unwrap_or((0, 0));
        if shortest != longest {
            return Err(Error::RaggedAlignment { shortest, longest });
        }

        Ok(Self {
            labels,
            rows,
            column_count: longest,
        })
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.column_count
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn label(&self, row: usize) -> &str {
        &self.labels[row]
    }

    #[must_use]
    pub fn symbol(&self, row: usize, column: usize) -> u8 {
        self.rows[row][column]
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[u8] {
        &self.rows[row]
    }

    /// Returns the index of the row with the given label, if present.
    #[must_use]
    pub fn row_by_label(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Indices of the rows that carry a residue (non-gap) at `column`.
    #[must_use]
    pub fn residue_rows(&self, column: usize) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&r| !is_gap_char(self.rows[r][column]))
            .collect()
    }

    /// The row with all gap symbols removed.
    #[must_use]
    pub fn degapped_row(&self, row: usize) -> Vec<u8> {
        self.rows[row]
            .iter()
            .copied()
            .filter(|&b| !is_gap_char(b))
            .collect()
    }

    /// Derives a new matrix by taking the listed columns in order, with
    /// repetition allowed. The derived columns are renumbered `0..`.
    #[must_use]
    pub fn subsample(&self, indices: &[usize]) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&c| row[c]).collect())
            .collect();
        Self {
            labels: self.labels.clone(),
            rows,
            column_count: indices.len(),
        }
    }

    /// True if every row keeps at least one residue after de-gapping.
    #[must_use]
    pub fn all_rows_have_residues(&self) -> bool {
        self.rows
            .iter()
            .all(|row| row.iter().any(|&b| !is_gap_char(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&str]) -> AlignmentMatrix {
        let labels = (0..rows.len()).map(|i| format!("t{i}")).collect();
        let rows = rows.iter().map(|r| r.as_bytes().to_vec()).collect();
        AlignmentMatrix::new(labels, rows).unwrap()
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            AlignmentMatrix::new(Vec::new(), Vec::new()),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn rejects_ragged_rows() {
        let result = AlignmentMatrix::new(
            vec!["a".into(), "b".into()],
            vec![b"ACGT".to_vec(), b"ACG".to_vec()],
        );
        assert!(matches!(
            result,
            Err(Error::RaggedAlignment {
                shortest: 3,
                longest: 4
            })
        ));
    }

    #[test]
    fn subsample_allows_repetition() {
        let m = matrix(&["AC-T", "A-GT"]);
        let s = m.subsample(&[0, 0, 3]);
        assert_eq!(s.column_count(), 3);
        assert_eq!(s.row(0), b"AAT");
        assert_eq!(s.row(1), b"AAT");
    }

    #[test]
    fn detects_all_gap_rows() {
        let m = matrix(&["A-C", "-G-"]);
        assert!(!m.subsample(&[0, 2]).all_rows_have_residues());
        assert!(m.subsample(&[0, 1]).all_rows_have_residues());
    }

    #[test]
    fn residue_rows_skips_gaps() {
        let m = matrix(&["A-C", "-GC", "AGC"]);
        assert_eq!(m.residue_rows(0), vec![0, 2]);
        assert_eq!(m.residue_rows(1), vec![1, 2]);
        assert_eq!(m.residue_rows(2), vec![0, 1, 2]);
    }
}
