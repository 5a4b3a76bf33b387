//! Cost matrices and track/detection assignment.
//!
//! Rows of every cost matrix are tracks and columns are detections.

use crate::error::TrackError;
use crate::lapjv::lapjv;
use crate::object::Point;
use log::{trace, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How tracks are paired with detections each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMode {
    /// Kalman prediction plus globally optimal (Jonker-Volgenant) matching.
    #[default]
    Optimal,
    /// No prediction, row-wise nearest neighbour. Cheaper, but crossing
    /// objects can swap identities.
    Greedy,
}

/// Result of linear assignment
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssignmentResult {
    /// Matched pairs as (track_index, detection_index)
    pub matches: Vec<(usize, usize)>,
    /// Indices of unmatched tracks
    pub unmatched_tracks: Vec<usize>,
    /// Indices of unmatched detections
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    fn all_unmatched(num_trks: usize, num_dets: usize) -> Self {
        Self {
            matches: Vec::new(),
            unmatched_tracks: (0..num_trks).collect(),
            unmatched_detections: (0..num_dets).collect(),
        }
    }
}

/// Euclidean distance between every track position and every detection point.
pub fn distance_matrix(tracks: &[(f32, f32)], detections: &[Point]) -> DMatrix<f32> {
    DMatrix::from_fn(tracks.len(), detections.len(), |i, j| {
        let (x, y) = tracks[i];
        detections[j].distance_to(x, y)
    })
}

/// Sum of the costs of `matches`.
pub fn total_cost(cost_matrix: &DMatrix<f32>, matches: &[(usize, usize)]) -> f32 {
    matches.iter().map(|&(i, j)| cost_matrix[(i, j)]).sum()
}

/// Minimum-cost rectangular assignment.
///
/// The matrix is padded to a square with a constant larger than every real
/// cost, so exactly `min(rows, cols)` real pairs come back.
pub fn optimal_assignment(
    cost_matrix: &DMatrix<f32>,
) -> Result<Vec<(usize, usize)>, TrackError> {
    let nrows = cost_matrix.nrows();
    let ncols = cost_matrix.ncols();
    if nrows == 0 || ncols == 0 {
        return Ok(Vec::new());
    }

    let n = nrows.max(ncols);
    let cost_max = cost_matrix.iter().cloned().fold(0.0f32, f32::max) as f64;
    let mut cost_vec = vec![vec![cost_max + 1.0; n]; n];
    for i in 0..nrows {
        for j in 0..ncols {
            cost_vec[i][j] = cost_matrix[(i, j)] as f64;
        }
    }

    let mut x = vec![-1isize; n];
    let mut y = vec![-1isize; n];
    lapjv(&cost_vec, &mut x, &mut y)?;

    // Drop padding assignments: x[i] = j means row i is assigned to column j
    let matches = x
        .iter()
        .enumerate()
        .filter(|&(i, &j)| i < nrows && j >= 0 && (j as usize) < ncols)
        .map(|(i, &j)| (i, j as usize))
        .collect();
    Ok(matches)
}

/// Row-wise nearest neighbour.
///
/// Rows are visited in order of their smallest cost; each takes its closest
/// column that is still free.
pub fn greedy_assignment(cost_matrix: &DMatrix<f32>) -> Vec<(usize, usize)> {
    let nrows = cost_matrix.nrows();
    let ncols = cost_matrix.ncols();
    if nrows == 0 || ncols == 0 {
        return Vec::new();
    }

    let row_min = |i: usize| {
        cost_matrix
            .row(i)
            .iter()
            .cloned()
            .fold(f32::INFINITY, f32::min)
    };
    let mut rows: Vec<usize> = (0..nrows).collect();
    rows.sort_by(|&a, &b| row_min(a).total_cmp(&row_min(b)));

    let mut used_cols = vec![false; ncols];
    let mut matches = Vec::with_capacity(nrows.min(ncols));
    for i in rows {
        let best = (0..ncols)
            .filter(|&j| !used_cols[j])
            .min_by(|&a, &b| cost_matrix[(i, a)].total_cmp(&cost_matrix[(i, b)]));
        if let Some(j) = best {
            used_cols[j] = true;
            matches.push((i, j));
        }
    }
    matches
}

/// Assigns tracks (rows) to detections (columns) and rejects every pair
/// whose cost is above `gating_distance`.
///
/// Never fails: a solver error leaves everything unmatched.
pub fn linear_assignment(
    cost_matrix: &DMatrix<f32>,
    gating_distance: f32,
    mode: AssociationMode,
) -> AssignmentResult {
    let num_trks = cost_matrix.nrows();
    let num_dets = cost_matrix.ncols();

    if num_trks == 0 || num_dets == 0 {
        return AssignmentResult::all_unmatched(num_trks, num_dets);
    }

    let candidates = match mode {
        AssociationMode::Optimal => match optimal_assignment(cost_matrix) {
            Ok(matches) => matches,
            Err(err) => {
                warn!("assignment failed, leaving frame unmatched: {}", err);
                return AssignmentResult::all_unmatched(num_trks, num_dets);
            }
        },
        AssociationMode::Greedy => greedy_assignment(cost_matrix),
    };
    trace!("{:?} assignment candidates: {:?}", mode, candidates);

    let matches: Vec<(usize, usize)> = candidates
        .into_iter()
        .filter(|&(t, d)| cost_matrix[(t, d)] <= gating_distance)
        .collect();

    let matched_trks: HashSet<_> = matches.iter().map(|(t, _)| *t).collect();
    let matched_dets: HashSet<_> = matches.iter().map(|(_, d)| *d).collect();

    AssignmentResult {
        unmatched_tracks: (0..num_trks).filter(|t| !matched_trks.contains(t)).collect(),
        unmatched_detections: (0..num_dets).filter(|d| !matched_dets.contains(d)).collect(),
        matches,
    }
}
