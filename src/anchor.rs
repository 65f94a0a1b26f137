//! Greedy anchor selection for SERES segment boundaries.

use crate::error::{Error, Result};

/// Selects `anchor_num` non-overlapping high-similarity windows of length
/// `anchor_len` and returns the sorted barrier set delimiting the resulting
/// segments: `{0} ∪ {window endpoints} ∪ {L-1}`, strictly increasing, with
/// `2 * anchor_num + 2` entries.
///
/// Candidates are ranked by the inclusive sliding-window sum of the
/// normalized similarity scores, ties broken by position ascending so anchor
/// placement is deterministic. Selected anchors must keep a minimum spacing
/// of `max(L / (2 * (anchor_num + 1)), anchor_len)` from each other and from
/// the alignment edges; if the pool runs dry before `anchor_num` anchors are
/// placed the configuration is infeasible and the run must abort before any
/// sampling happens.
pub fn select_barriers(
    similarity: &[f64],
    anchor_len: usize,
    anchor_num: usize,
) -> Result<Vec<usize>> {
    let columns = similarity.len();
    let infeasible = || Error::InsufficientSpace {
        anchor_num,
        anchor_len,
        columns,
    };

    if anchor_len == 0 || anchor_num == 0 || anchor_len > columns {
        return Err(infeasible());
    }

    // Inclusive window sums for every window end in [anchor_len - 1, L - 1].
    let mut window_score = vec![0.0f64; columns];
    let mut running: f64 = similarity[..anchor_len].iter().sum();
    window_score[anchor_len - 1] = running;
    for end in anchor_len..columns {
        running += similarity[end] - similarity[end - anchor_len];
        window_score[end] = running;
    }

    let min_dist = (columns / (2 * (anchor_num + 1))).max(anchor_len);

    let mut pool: Vec<usize> = (anchor_len - 1..columns)
        .filter(|&p| p > min_dist && p < columns.saturating_sub(min_dist + 1))
        .collect();
    pool.sort_by(|&a, &b| {
        window_score[b]
            .partial_cmp(&window_score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut barriers = vec![0, columns - 1];
    for _ in 0..anchor_num {
        let best = *pool.first().ok_or_else(infeasible)?;
        barriers.push(best - anchor_len + 1);
        barriers.push(best);
        pool.retain(|&p| p.abs_diff(best) > min_dist);
    }

    barriers.sort_unstable();
    Ok(barriers)
}
