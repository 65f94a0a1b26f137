//! RAWR and SERES resampling.
//!
//! Both samplers produce an ordered sequence of original column positions
//! (repetition allowed) plus the alignment matrix derived from it. All
//! randomness flows through the caller-supplied generator so replicates are
//! reproducible from a seed.

use crate::alignment::AlignmentMatrix;
use rand::Rng;

/// A resampled replicate: the column index sequence in walk order and the
/// matrix derived from it.
pub struct Resample {
    pub indices: Vec<usize>,
    pub matrix: AlignmentMatrix,
}

/// Generates one RAWR replicate: a directional random walk over the columns
/// with reversal probability `reverse_rate`, clamped at the alignment edges.
///
/// Walks are redrawn until no row of the derived matrix is entirely gaps.
/// The returned index sequence has exactly `L` entries.
pub fn rawr_sample<R: Rng + ?Sized>(
    alignment: &AlignmentMatrix,
    reverse_rate: f64,
    start: Option<usize>,
    rng: &mut R,
) -> Resample {
    let columns = alignment.column_count();

    loop {
        let mut current = match start {
            Some(column) => column,
            None => rng.random_range(0..columns),
        };
        let mut direction: i64 = if rng.random_bool(0.5) { 1 } else { -1 };
        // One extra flag mirrors the original draw; the walk consumes at
        // most `columns` of them.
        let turnover: Vec<bool> = (0..=columns).map(|_| rng.random_bool(reverse_rate)).collect();

        let mut indices = Vec::with_capacity(columns);
        for &reverse in turnover.iter().take(columns) {
            indices.push(current);
            let next = current as i64 + direction;
            if next < 0 {
                current = 0;
                direction = 1;
            } else if next as usize > columns - 1 {
                current = columns - 1;
                direction = -1;
            } else {
                current = next as usize;
                if reverse {
                    direction = -direction;
                }
            }
        }

        let matrix = alignment.subsample(&indices);
        if matrix.all_rows_have_residues() {
            return Resample { indices, matrix };
        }
    }
}

/// Generates one SERES replicate by traversing barrier-delimited segments,
/// flipping direction according to the turnover flags.
///
/// Segments are appended whole; the walk stops as soon as the accumulated
/// length reaches `L`, so the result may overshoot `L` by up to one segment.
/// Unlike RAWR there is no validity retry.
pub fn seres_sample<R: Rng + ?Sized>(
    alignment: &AlignmentMatrix,
    barriers: &[usize],
    reverse_rate: f64,
    rng: &mut R,
) -> Resample {
    let columns = alignment.column_count();
    let last = barriers.len() - 1;

    let turnover: Vec<bool> = (0..columns).map(|_| rng.random_bool(reverse_rate)).collect();
    let mut bi = rng.random_range(0..barriers.len());
    let mut previous: u8 = u8::from(rng.random_bool(0.5));

    let mut indices = Vec::with_capacity(columns);
    for &flag in &turnover {
        let direction = if bi == 0 {
            1
        } else if bi == last {
            0
        } else {
            u8::from(flag) ^ previous
        };

        if direction == 0 {
            // backward: barriers[bi] down to barriers[bi-1] + 1
            indices.extend((barriers[bi - 1] + 1..=barriers[bi]).rev());
            bi -= 1;
        } else {
            // forward: barriers[bi] up to barriers[bi+1] - 1
            indices.extend(barriers[bi]..barriers[bi + 1]);
            bi += 1;
        }
        previous = direction;

        if indices.len() >= columns {
            break;
        }
    }

    let matrix = alignment.subsample(&indices);
    Resample { indices, matrix }
}
