//! Pairwise support accounting across replicates.
//!
//! For every replicate we record, per (column, row pair) key, whether the
//! pair was sampled at all ("observed") and whether the external
//! re-alignment kept the two residues in the same column ("positive").
//! Counters from independently processed replicates are combined by
//! element-wise addition, so the reduction is order-independent.

use crate::alignment::{AlignmentMatrix, is_gap_char};
use crate::error::{Error, Result};
use crate::pairs::PairIndexer;

/// Dense per-pair counters accumulated over all replicates.
#[derive(Clone, Debug)]
pub struct SupportCounters {
    pub sample: Vec<u32>,
    pub positive: Vec<u32>,
    /// Number of replicates that contributed to the counters.
    pub replicates: u32,
}

impl SupportCounters {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            sample: vec![0; len],
            positive: vec![0; len],
            replicates: 0,
        }
    }

    /// Element-wise addition; associative and commutative, so partial
    /// counters can be reduced in any order.
    pub fn merge(&mut self, other: &Self) {
        for (a, b) in self.sample.iter_mut().zip(&other.sample) {
            *a += b;
        }
        for (a, b) in self.positive.iter_mut().zip(&other.positive) {
            *a += b;
        }
        self.replicates += other.replicates;
    }
}

/// Accounts one replicate into `counters`.
///
/// `indices` is the replicate's resampled column sequence (walk order) and
/// `realigned` the externally produced re-alignment of the gapless replicate
/// sequences. Inconsistent artifacts (unknown labels, residue counts that do
/// not match the walk) fail with [`Error::ReplicateIo`] so the caller can
/// skip the replicate.
pub fn accumulate_replicate(
    original: &AlignmentMatrix,
    indexer: &PairIndexer,
    indices: &[usize],
    realigned: &AlignmentMatrix,
    replicate: usize,
    counters: &mut SupportCounters,
) -> Result<()> {
    let replicate_error = |message: String| Error::ReplicateIo { replicate, message };

    let columns = original.column_count();
    if let Some(&bad) = indices.iter().find(|&&c| c >= columns) {
        return Err(replicate_error(format!(
            "index file lists column {bad}, but the alignment has {columns} columns"
        )));
    }

    // Map original rows to re-aligned rows by label.
    let mut row_map = Vec::with_capacity(original.row_count());
    for row in 0..original.row_count() {
        let label = original.label(row);
        let mapped = realigned
            .row_by_label(label)
            .ok_or_else(|| replicate_error(format!("re-alignment is missing taxon '{label}'")))?;
        row_map.push(mapped);
    }

    // Original column each residue of the gapless replicate row came from,
    // in emission order.
    let origins: Vec<Vec<usize>> = (0..original.row_count())
        .map(|row| {
            indices
                .iter()
                .copied()
                .filter(|&c| !is_gap_char(original.symbol(row, c)))
                .collect()
        })
        .collect();

    for (row, rows_origins) in origins.iter().enumerate() {
        let residues = realigned.degapped_row(row_map[row]).len();
        if residues != rows_origins.len() {
            return Err(replicate_error(format!(
                "taxon '{}' has {residues} re-aligned residues but the walk sampled {}",
                original.label(row),
                rows_origins.len()
            )));
        }
    }

    let total = indexer.total(columns);
    let mut observed = vec![false; total];
    let mut positive = vec![false; total];

    // Observed: both rows non-gap at the resampled occurrence of column c.
    // Each pair counts once per replicate no matter how often the walk
    // revisits c.
    let residue_rows: Vec<Vec<usize>> = (0..columns).map(|c| original.residue_rows(c)).collect();
    for &c in indices {
        let rows = &residue_rows[c];
        for (i, &r1) in rows.iter().enumerate() {
            for &r2 in &rows[i + 1..] {
                observed[indexer.index(c, r1, r2)] = true;
            }
        }
    }

    // Positive: within one re-aligned column, two residues that originated
    // from the same original column are still co-located.
    let mut cursors = vec![0usize; original.row_count()];
    let mut column_entries: Vec<(usize, usize)> = Vec::with_capacity(original.row_count());
    for aligned_column in 0..realigned.column_count() {
        column_entries.clear();
        for row in 0..original.row_count() {
            if !is_gap_char(realigned.symbol(row_map[row], aligned_column)) {
                column_entries.push((row, origins[row][cursors[row]]));
                cursors[row] += 1;
            }
        }
        for (i, &(r1, o1)) in column_entries.iter().enumerate() {
            for &(r2, o2) in &column_entries[i + 1..] {
                if o1 == o2 {
                    positive[indexer.index(o1, r1, r2)] = true;
                }
            }
        }
    }

    for (count, &seen) in counters.sample.iter_mut().zip(&observed) {
        *count += u32::from(seen);
    }
    for (count, &hit) in counters.positive.iter_mut().zip(&positive) {
        *count += u32::from(hit);
    }
    counters.replicates += 1;

    Ok(())
}
