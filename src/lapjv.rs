use crate::error::TrackError::{self, LapjvError};

/* -----------------------------------------------------------------------------
 * lapjv.rs - Jonker-Volgenant linear assignment for dense square matrices
 * ----------------------------------------------------------------------------- */

const LARGE: f64 = 1e12;

/// Column reduction and reduction transfer. Returns the number of free rows.
fn column_reduction(
    n: usize,
    cost: &[Vec<f64>],
    free_rows: &mut [usize],
    x: &mut [isize],
    y: &mut [isize],
    v: &mut [f64],
) -> usize {
    for i in 0..n {
        x[i] = -1;
        v[i] = LARGE;
        y[i] = 0;
    }
    for i in 0..n {
        for j in 0..n {
            let c = cost[i][j];
            if c < v[j] {
                v[j] = c;
                y[j] = i as isize;
            }
        }
    }

    let mut unique = vec![true; n];
    for j in (0..n).rev() {
        let i = y[j] as usize;
        if x[i] < 0 {
            x[i] = j as isize;
        } else {
            unique[i] = false;
            y[j] = -1;
        }
    }

    let mut n_free_rows = 0;
    for i in 0..n {
        if x[i] < 0 {
            free_rows[n_free_rows] = i;
            n_free_rows += 1;
        } else if unique[i] {
            let j = x[i] as usize;
            let mut min = LARGE;
            for j2 in 0..n {
                if j2 == j {
                    continue;
                }
                let c = cost[i][j2] - v[j2];
                if c < min {
                    min = c;
                }
            }
            v[j] -= min;
        }
    }
    n_free_rows
}

/// Augmenting row reduction. Returns the number of rows still free.
fn augmenting_row_reduction(
    n: usize,
    cost: &[Vec<f64>],
    n_free_rows: usize,
    free_rows: &mut [usize],
    x: &mut [isize],
    y: &mut [isize],
    v: &mut [f64],
) -> usize {
    let mut current = 0;
    let mut new_free_rows = 0;
    let mut rr_cnt = 0;

    while current < n_free_rows {
        rr_cnt += 1;
        let free_i = free_rows[current];
        current += 1;

        let mut j1: isize = 0;
        let mut j2: isize = -1;
        let mut v1 = cost[free_i][0] - v[0];
        let mut v2 = LARGE;

        for j in 1..n {
            let c = cost[free_i][j] - v[j];
            if c < v2 {
                if c >= v1 {
                    v2 = c;
                    j2 = j as isize;
                } else {
                    v2 = v1;
                    v1 = c;
                    j2 = j1;
                    j1 = j as isize;
                }
            }
        }

        let mut i0 = y[j1 as usize];
        let v1_new = v[j1 as usize] - (v2 - v1);
        let v1_lowers = v1_new < v[j1 as usize];

        if rr_cnt < current * n {
            if v1_lowers {
                v[j1 as usize] = v1_new;
            } else if i0 >= 0 && j2 >= 0 {
                j1 = j2;
                i0 = y[j2 as usize];
            }

            if i0 >= 0 {
                if v1_lowers {
                    current -= 1;
                    free_rows[current] = i0 as usize;
                } else {
                    free_rows[new_free_rows] = i0 as usize;
                    new_free_rows += 1;
                }
            }
        } else if i0 >= 0 {
            free_rows[new_free_rows] = i0 as usize;
            new_free_rows += 1;
        }
        x[free_i] = j1;
        y[j1 as usize] = free_i as isize;
    }
    new_free_rows
}

/// Moves every column with minimal `d` to the front of the scan window.
fn find_minima(n: usize, lo: usize, d: &[f64], cols: &mut [usize]) -> usize {
    let mut hi = lo + 1;
    let mut mind = d[cols[lo]];
    for k in hi..n {
        let j = cols[k];
        if d[j] <= mind {
            if d[j] < mind {
                hi = lo;
                mind = d[j];
            }
            cols[k] = cols[hi];
            cols[hi] = j;
            hi += 1;
        }
    }
    hi
}

#[allow(clippy::too_many_arguments)]
fn scan(
    n: usize,
    cost: &[Vec<f64>],
    plo: &mut usize,
    phi: &mut usize,
    d: &mut [f64],
    cols: &mut [usize],
    pred: &mut [usize],
    y: &[isize],
    v: &[f64],
) -> Option<usize> {
    let mut lo = *plo;
    let mut hi = *phi;

    while lo != hi {
        let j = cols[lo];
        lo += 1;
        let i = y[j] as usize;
        let mind = d[j];
        let h = cost[i][j] - v[j] - mind;
        for k in hi..n {
            let j = cols[k];
            let cred_ij = cost[i][j] - v[j] - h;
            if cred_ij < d[j] {
                d[j] = cred_ij;
                pred[j] = i;
                if cred_ij == mind {
                    if y[j] < 0 {
                        return Some(j);
                    }
                    cols[k] = cols[hi];
                    cols[hi] = j;
                    hi += 1;
                }
            }
        }
    }
    *plo = lo;
    *phi = hi;
    None
}

/// Shortest augmenting path (Dijkstra) from `start_i` to a free column.
fn find_path(
    n: usize,
    cost: &[Vec<f64>],
    start_i: usize,
    y: &[isize],
    v: &mut [f64],
    pred: &mut [usize],
) -> usize {
    let mut lo = 0;
    let mut hi = 0;
    let mut n_ready = 0;
    let mut final_j = None;
    let mut cols: Vec<usize> = (0..n).collect();
    let mut d = vec![0.0; n];

    for j in 0..n {
        pred[j] = start_i;
        d[j] = cost[start_i][j] - v[j];
    }

    while final_j.is_none() {
        if lo == hi {
            n_ready = lo;
            hi = find_minima(n, lo, &d, &mut cols);
            for &j in &cols[lo..hi] {
                if y[j] < 0 {
                    final_j = Some(j);
                }
            }
        }
        if final_j.is_none() {
            final_j = scan(
                n, cost, &mut lo, &mut hi, &mut d, &mut cols, pred, y, v,
            );
        }
    }

    let mind = d[cols[lo]];
    for &j in &cols[..n_ready] {
        v[j] += d[j] - mind;
    }
    final_j.unwrap_or_default()
}

fn augment(
    n: usize,
    cost: &[Vec<f64>],
    n_free_rows: usize,
    free_rows: &[usize],
    x: &mut [isize],
    y: &mut [isize],
    v: &mut [f64],
) {
    let mut pred = vec![0; n];

    for &free_row in &free_rows[..n_free_rows] {
        let mut i = usize::MAX;
        let mut j = find_path(n, cost, free_row, y, v, &mut pred) as isize;
        while i != free_row {
            i = pred[j as usize];
            y[j as usize] = i as isize;
            std::mem::swap(&mut j, &mut x[i]);
        }
    }
}

/// Solves the square assignment problem described by `cost`.
///
/// On success `x[i]` is the column assigned to row `i` and `y[j]` the row
/// assigned to column `j`.
pub(crate) fn lapjv(
    cost: &[Vec<f64>],
    x: &mut [isize],
    y: &mut [isize],
) -> Result<(), TrackError> {
    let n = cost.len();
    if n == 0 {
        return Err(LapjvError(
            "cost matrix must have at least one row".to_string(),
        ));
    }
    if n != x.len() || n != y.len() {
        return Err(LapjvError(format!(
            "cost.len() must be equal to x.len() and y.len(), but cost.len() = {}, x.len() = {}, y.len() = {}",
            n,
            x.len(),
            y.len()
        )));
    }
    if let Some(row) = cost.iter().find(|row| row.len() != n) {
        return Err(LapjvError(format!(
            "cost matrix must be square, found a row of length {} in a {}x{} matrix",
            row.len(),
            n,
            n
        )));
    }
    if cost.iter().flatten().any(|c| !c.is_finite()) {
        return Err(LapjvError("cost matrix contains non-finite values".to_string()));
    }

    let mut free_rows = vec![0; n];
    let mut v = vec![0.0; n];
    let mut ret = column_reduction(n, cost, &mut free_rows, x, y, &mut v);
    let mut i = 0;
    while ret > 0 && i < 2 {
        ret = augmenting_row_reduction(n, cost, ret, &mut free_rows, x, y, &mut v);
        i += 1;
    }
    if ret > 0 {
        augment(n, cost, ret, &free_rows, x, y, &mut v);
    }
    Ok(())
}
