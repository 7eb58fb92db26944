//! Network inversion - design matrices of a pair network and minimum-norm least-squares solves

use crate::epoch::{EpochKey, PairIndex};
use crate::error::{Result, StackError};
use nalgebra::{DMatrix, DVector, SVD};

/// Condition number above which a solve is reported as ill-conditioned
pub const CONDITION_WARNING: f64 = 1e8;

/// Incidence and time-weighted incidence matrices of a pair network
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrices {
    /// `m x (n-1)`: -1/+1 per pair, reference epoch column removed
    pub a: DMatrix<f64>,
    /// `m x (n-1)`: day separations spanned by each pair, last column removed
    pub b: DMatrix<f64>,
    /// Chronological ordinal of the removed reference column of `a`
    pub reference: usize,
}

/// Build the design matrices of a (possibly filtered) pair index.
///
/// `reference` defaults to the earliest epoch and must belong to the index.
pub fn design_matrices(index: &PairIndex, reference: Option<&EpochKey>) -> Result<DesignMatrices> {
    let epochs = index.epochs();
    let reference = match reference {
        Some(key) => epochs.require_ordinal(key)?,
        None => 0,
    };
    let (a, b) = full_design_matrices(index)?;

    Ok(DesignMatrices {
        a: a.remove_column(reference),
        b: b.remove_column(epochs.len() - 1),
        reference,
    })
}

/// A and B with every epoch column present, `m x n`
pub fn full_design_matrices(index: &PairIndex) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let n = index.epochs().len();
    let m = index.len();
    if m + 1 < n {
        return Err(StackError::IllFormedMatrix(format!(
            "{} pairs cannot constrain {} epochs",
            m, n
        )));
    }

    let tbase_diff = index.epochs().tbase_diff();
    let mut a = DMatrix::<f64>::zeros(m, n);
    let mut b = DMatrix::<f64>::zeros(m, n);
    for (i, pair) in index.pairs().iter().enumerate() {
        a[(i, pair.first)] = -1.0;
        a[(i, pair.second)] = 1.0;
        for k in pair.first..pair.second {
            b[(i, k)] = tbase_diff[k] as f64;
        }
    }
    Ok((a, b))
}

/// Outcome of a minimum-norm solve
#[derive(Debug, Clone, PartialEq)]
pub struct Inversion {
    pub solution: DVector<f64>,
    pub rank: usize,
    /// Ratio of the largest to the smallest retained singular value
    pub condition_number: f64,
}

impl Inversion {
    pub fn is_full_rank(&self) -> bool {
        self.rank == self.solution.len()
    }
}

/// Minimum-norm least-squares solve through the SVD pseudo-inverse.
///
/// Rank deficiency (a disconnected network) is logged, not rejected.
pub fn solve_min_norm(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<Inversion> {
    let (m, n) = matrix.shape();
    if rhs.len() != m {
        return Err(StackError::InvalidDimensions(format!(
            "{} observations for a {}x{} design matrix",
            rhs.len(),
            m,
            n
        )));
    }
    if n == 0 {
        return Ok(Inversion {
            solution: DVector::zeros(0),
            rank: 0,
            condition_number: 1.0,
        });
    }

    let svd = SVD::new(matrix.clone(), true, true);
    let max_sv = svd.singular_values.max();
    let eps = max_sv * (m.max(n) as f64) * f64::EPSILON;
    let retained: Vec<f64> = svd
        .singular_values
        .iter()
        .copied()
        .filter(|&s| s > eps)
        .collect();
    let rank = retained.len();
    let min_sv = retained.iter().copied().fold(f64::INFINITY, f64::min);
    let condition_number = if rank > 0 { max_sv / min_sv } else { f64::INFINITY };

    if rank < n {
        log::warn!(
            "design matrix is rank deficient ({} of {} columns), network may be disconnected",
            rank,
            n
        );
    } else if condition_number > CONDITION_WARNING {
        log::warn!("design matrix is ill-conditioned (condition number {:.3e})", condition_number);
    }

    let solution = svd
        .solve(rhs, eps)
        .map_err(|e| StackError::IllFormedMatrix(e.to_string()))?;
    Ok(Inversion {
        solution,
        rank,
        condition_number,
    })
}

/// Perpendicular-baseline time series from per-pair baselines.
///
/// Solves `B * rate = bperp` and integrates `rate * dt`; the first epoch is zero.
pub fn perp_baseline_time_series(index: &PairIndex, bperp: &[f64]) -> Result<Vec<f64>> {
    if bperp.len() != index.len() {
        return Err(StackError::InvalidDimensions(format!(
            "{} baselines for {} pairs",
            bperp.len(),
            index.len()
        )));
    }
    let design = design_matrices(index, None)?;
    let rhs = DVector::from_column_slice(bperp);
    let rate = solve_min_norm(&design.b, &rhs)?.solution;

    let tbase_diff = index.epochs().tbase_diff();
    let mut series = Vec::with_capacity(index.epochs().len());
    series.push(0.0);
    let mut total = 0.0;
    for (k, dt) in tbase_diff.iter().enumerate() {
        total += rate[k] * *dt as f64;
        series.push(total);
    }
    Ok(series)
}

/// Invert per-pair observations into a per-epoch series, zero at `reference`.
///
/// Result is in chronological epoch order.
pub fn invert_epoch_series(
    index: &PairIndex,
    observations: &[f64],
    reference: Option<&EpochKey>,
) -> Result<Vec<f64>> {
    let design = design_matrices(index, reference)?;
    let rhs = DVector::from_column_slice(observations);
    let solved = solve_min_norm(&design.a, &rhs)?.solution;

    let mut series: Vec<f64> = solved.iter().copied().collect();
    series.insert(design.reference, 0.0);
    Ok(series)
}
