//! Dense linear indexing of (column, unordered row pair) keys.
//!
//! Support accounting needs one counter per pair of rows per original
//! column. The triangular pair rank keeps the counters in a flat array
//! instead of a map.

/// Bijective mapping between `(column, {r1, r2})` keys and dense indices.
#[derive(Clone, Copy, Debug)]
pub struct PairIndexer {
    rows: usize,
    pairs_per_column: usize,
}

impl PairIndexer {
    #[must_use]
    pub const fn new(rows: usize) -> Self {
        Self {
            rows,
            pairs_per_column: rows * (rows - 1) / 2,
        }
    }

    #[must_use]
    pub const fn pairs_per_column(&self) -> usize {
        self.pairs_per_column
    }

    /// Total number of pair indices for an alignment of `columns` columns.
    #[must_use]
    pub const fn total(&self, columns: usize) -> usize {
        columns * self.pairs_per_column
    }

    /// Triangular rank of the unordered pair `r1 < r2` within one column.
    #[must_use]
    pub const fn pair_rank(&self, r1: usize, r2: usize) -> usize {
        debug_assert!(r1 < r2 && r2 < self.rows);
        (2 * self.rows - r1 - 1) * r1 / 2 + (r2 - r1 - 1)
    }

    /// Dense index of pair `r1 < r2` at `column`.
    #[must_use]
    pub const fn index(&self, column: usize, r1: usize, r2: usize) -> usize {
        column * self.pairs_per_column + self.pair_rank(r1, r2)
    }

    /// Inverse of [`index`](Self::index): `(column, r1, r2)` with `r1 < r2`.
    #[must_use]
    pub fn decode(&self, index: usize) -> (usize, usize, usize) {
        let column = index / self.pairs_per_column;
        let mut rank = index % self.pairs_per_column;

        let mut r1 = 0;
        loop {
            let pairs_in_row = self.rows - 1 - r1;
            if rank < pairs_in_row {
                return (column, r1, r1 + 1 + rank);
            }
            rank -= pairs_in_row;
            r1 += 1;
        }
    }
}
