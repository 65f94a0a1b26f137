//! Per-column conservation scoring used by SERES anchor selection.

use crate::alignment::{AlignmentMatrix, is_gap_char};

/// Computes the max-normalized similarity score of every column.
///
/// The raw score of a column is the number of unordered row pairs whose
/// symbols are both non-gap and identical. Scores are divided by the maximum
/// raw score across all columns; an all-zero profile stays all-zero.
#[must_use]
pub fn column_similarity(alignment: &AlignmentMatrix) -> Vec<f64> {
    let raw: Vec<usize> = (0..alignment.column_count())
        .map(|c| raw_column_score(alignment, c))
        .collect();

    let max = raw.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return vec![0.0; raw.len()];
    }

    #[allow(clippy::cast_precision_loss)]
    let normalized = raw.iter().map(|&s| s as f64 / max as f64).collect();
    normalized
}

/// Identical non-gap pairs in one column, counted from a symbol histogram.
fn raw_column_score(alignment: &AlignmentMatrix, column: usize) -> usize {
    let mut counts = [0usize; 256];
    for row in 0..alignment.row_count() {
        let symbol = alignment.symbol(row, column);
        if !is_gap_char(symbol) {
            counts[symbol as usize] += 1;
        }
    }
    counts.iter().map(|&k| k * k.saturating_sub(1) / 2).sum()
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
    fn fully_conserved_column_scores_one() {
        let m = matrix(&["AAG-", "AAC-", "ATCA"]);
        let sim = column_similarity(&m);
        // column 0: three identical pairs; column 1: one; column 2: one
        // (C/C); column 3: no non-gap pair.
        assert_eq!(sim, vec![1.0, 1.0 / 3.0, 1.0 / 3.0, 0.0]);
    }

    #[test]
    fn gap_only_pairs_do_not_count() {
        let m = matrix(&["--", "--", "A-"]);
        assert_eq!(column_similarity(&m), vec![0.0, 0.0]);
    }
}
