use nalgebra as na;
use ndarray::Array2;

/// Result of one frame's track-to-spot assignment.
///
/// `matches` holds `(track index, spot index, cost)` for every pair that
/// survived gating; the unmatched lists cover the rest of both sides.
#[derive(Debug, Clone)]
pub struct Pairing {
    pub matches: Vec<(usize, usize, f32)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_spots: Vec<usize>,
}

/// Cost assigned to dummy rows and columns when padding a rectangular
/// problem to a square one. Far above any plausible pixel distance, so
/// gating always rejects pairs that involve padding.
const PAD_COST: f64 = 1.0e9;

/// Optimal one-to-one pairing between track positions and spot positions.
///
/// Costs are Euclidean distances. The matrix is padded to square and the
/// optimization runs unconstrained; gating against `distance_threshold`
/// happens afterwards, so a pair the solver returns for lack of a better
/// option is still rejected here rather than distorting the optimum.
///
/// Rows are augmented in index order and equal-cost alternatives resolve
/// to the lowest-indexed column, so callers that present tracks in
/// ascending id order get the documented tie-break: lower-id tracks keep
/// lower-indexed spots.
pub fn solve(
    tracks: &[na::Point2<f32>],
    spots: &[na::Point2<f32>],
    distance_threshold: f32,
) -> Pairing {
    let n_tracks = tracks.len();
    let n_spots = spots.len();

    if n_tracks == 0 || n_spots == 0 {
        return Pairing {
            matches: Vec::new(),
            unmatched_tracks: (0..n_tracks).collect(),
            unmatched_spots: (0..n_spots).collect(),
        };
    }

    let size = n_tracks.max(n_spots);
    let cost = Array2::from_shape_fn((size, size), |(i, j)| {
        if i < n_tracks && j < n_spots {
            na::distance(&tracks[i], &spots[j]) as f64
        } else {
            PAD_COST
        }
    });

    let row_to_col = kuhn_munkres(&cost);

    let mut matches = Vec::new();
    let mut unmatched_tracks = Vec::new();
    let mut spot_taken = vec![false; n_spots];

    for (track_idx, &col) in row_to_col.iter().enumerate().take(n_tracks) {
        if col < n_spots {
            let pair_cost = na::distance(&tracks[track_idx], &spots[col]);
            if pair_cost <= distance_threshold {
                matches.push((track_idx, col, pair_cost));
                spot_taken[col] = true;
                continue;
            }
        }

        unmatched_tracks.push(track_idx);
    }

    let unmatched_spots = (0..n_spots).filter(|&j| !spot_taken[j]).collect();

    Pairing {
        matches,
        unmatched_tracks,
        unmatched_spots,
    }
}

/// Kuhn-Munkres over a square cost matrix, returning the column assigned
/// to each row. Shortest-augmenting-path formulation with row and column
/// potentials, O(n^3).
fn kuhn_munkres(cost: &Array2<f64>) -> Vec<usize> {
    let n = cost.nrows();
    debug_assert_eq!(n, cost.ncols());

    // 1-based bookkeeping; index 0 is the virtual start column.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut col_to_row = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        col_to_row[0] = row;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = col_to_row[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }

                let reduced = cost[[i0 - 1, j - 1]] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[col_to_row[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if col_to_row[j0] == 0 {
                break;
            }
        }

        // Walk the alternating path back and flip the matching.
        loop {
            let j1 = way[j0];
            col_to_row[j0] = col_to_row[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![usize::MAX; n];
    for j in 1..=n {
        let row = col_to_row[j];
        if row > 0 {
            row_to_col[row - 1] = j - 1;
        }
    }

    // Padding guarantees feasibility; an unassigned row is a logic defect.
    assert!(
        row_to_col.iter().all(|&c| c != usize::MAX),
        "assignment left a row unmatched"
    );

    row_to_col
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pt(x: f32, y: f32) -> na::Point2<f32> {
        na::Point2::new(x, y)
    }

    /// Deterministic pseudo-random stream for the brute-force sweep.
    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 40) as f32 / (1u64 << 24) as f32
        }

        fn next_point(&mut self) -> na::Point2<f32> {
            pt(self.next_f32() * 100.0, self.next_f32() * 100.0)
        }
    }

    /// Minimum total cost over every injective mapping of the smaller
    /// side into the larger, by exhaustive recursion.
    fn brute_force(tracks: &[na::Point2<f32>], spots: &[na::Point2<f32>]) -> f32 {
        fn recurse(
            tracks: &[na::Point2<f32>],
            spots: &[na::Point2<f32>],
            row: usize,
            taken: &mut Vec<bool>,
            left: usize,
        ) -> f32 {
            if left == 0 {
                return 0.0;
            }
            if row == tracks.len() {
                return f32::INFINITY;
            }

            // Either skip this row (only allowed if enough rows remain)...
            let rows_remaining = tracks.len() - row - 1;
            let mut best = if rows_remaining >= left {
                recurse(tracks, spots, row + 1, taken, left)
            } else {
                f32::INFINITY
            };

            // ...or match it to any free column.
            for j in 0..spots.len() {
                if !taken[j] {
                    taken[j] = true;
                    let cost = na::distance(&tracks[row], &spots[j])
                        + recurse(tracks, spots, row + 1, taken, left - 1);
                    taken[j] = false;
                    best = best.min(cost);
                }
            }

            best
        }

        let left = tracks.len().min(spots.len());
        let mut taken = vec![false; spots.len()];
        recurse(tracks, spots, 0, &mut taken, left)
    }

    #[test]
    fn test_empty_sides() {
        let pairing = solve(&[], &[pt(1.0, 1.0)], 50.0);
        assert!(pairing.matches.is_empty());
        assert_eq!(pairing.unmatched_spots, vec![0]);

        let pairing = solve(&[pt(1.0, 1.0)], &[], 50.0);
        assert!(pairing.matches.is_empty());
        assert_eq!(pairing.unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_single_pair() {
        let pairing = solve(&[pt(0.0, 0.0)], &[pt(3.0, 4.0)], 50.0);

        assert_eq!(pairing.matches.len(), 1);
        let (track, spot, cost) = pairing.matches[0];
        assert_eq!((track, spot), (0, 0));
        assert_relative_eq!(cost, 5.0);
    }

    #[test]
    fn test_beats_greedy_nearest_neighbor() {
        // Greedy takes the 0.9 pair first and pays 0.9 + 3.0; the
        // optimum is 1.1 + 1.0.
        let tracks = [pt(0.0, 0.0), pt(2.0, 0.0)];
        let spots = [pt(1.1, 0.0), pt(3.0, 0.0)];

        let pairing = solve(&tracks, &spots, 50.0);
        let total: f32 = pairing.matches.iter().map(|&(_, _, c)| c).sum();

        let pairs: Vec<(usize, usize)> = pairing.matches.iter().map(|&(t, s, _)| (t, s)).collect();
        assert_eq!(pairs, vec![(0, 0), (1, 1)]);
        assert_relative_eq!(total, 2.1, epsilon = 1e-5);
    }

    #[test]
    fn test_optimal_against_brute_force() {
        let mut rng = Lcg(0x5eed);

        for n in 1..=6usize {
            for m in 1..=6usize {
                for _ in 0..10 {
                    let tracks: Vec<_> = (0..n).map(|_| rng.next_point()).collect();
                    let spots: Vec<_> = (0..m).map(|_| rng.next_point()).collect();

                    let pairing = solve(&tracks, &spots, f32::INFINITY);
                    let total: f32 = pairing.matches.iter().map(|&(_, _, c)| c).sum();

                    assert_eq!(pairing.matches.len(), n.min(m));
                    assert_relative_eq!(
                        total,
                        brute_force(&tracks, &spots),
                        epsilon = 1e-2
                    );
                }
            }
        }
    }

    #[test]
    fn test_tie_break_prefers_lower_indices() {
        // Both pairings cost the same; the lower-indexed row must keep
        // the lower-indexed column, every run.
        let tracks = [pt(0.0, 0.0), pt(10.0, 0.0)];
        let spots = [pt(5.0, 5.0), pt(5.0, -5.0)];

        for _ in 0..20 {
            let pairing = solve(&tracks, &spots, 50.0);
            let pairs: Vec<(usize, usize)> =
                pairing.matches.iter().map(|&(t, s, _)| (t, s)).collect();
            assert_eq!(pairs, vec![(0, 0), (1, 1)]);
        }
    }

    #[test]
    fn test_gating_rejects_distant_pair() {
        // The solver must pair them (padding is worse), gating drops it.
        let pairing = solve(&[pt(0.0, 0.0)], &[pt(100.0, 0.0)], 50.0);

        assert!(pairing.matches.is_empty());
        assert_eq!(pairing.unmatched_tracks, vec![0]);
        assert_eq!(pairing.unmatched_spots, vec![0]);
    }

    #[test]
    fn test_rectangular_surplus_spots() {
        let tracks = [pt(0.0, 0.0)];
        let spots = [pt(60.0, 0.0), pt(1.0, 0.0), pt(30.0, 0.0)];

        let pairing = solve(&tracks, &spots, 50.0);

        assert_eq!(pairing.matches.len(), 1);
        assert_eq!(pairing.matches[0].0, 0);
        assert_eq!(pairing.matches[0].1, 1);
        assert_eq!(pairing.unmatched_spots, vec![0, 2]);
    }

    #[test]
    fn test_rectangular_surplus_tracks() {
        let tracks = [pt(0.0, 0.0), pt(20.0, 0.0), pt(40.0, 0.0)];
        let spots = [pt(21.0, 0.0)];

        let pairing = solve(&tracks, &spots, 50.0);

        assert_eq!(pairing.matches.len(), 1);
        assert_eq!((pairing.matches[0].0, pairing.matches[0].1), (1, 0));
        assert_eq!(pairing.unmatched_tracks, vec![0, 2]);
    }
}
