use ndarray::prelude::*;
use crate::error::{Error, Result};

#[inline]
fn check_len(a: &ArrayView1<'_, f32>, b: &ArrayView1<'_, f32>) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch(a.len(), b.len()));
    }

    Ok(())
}

#[inline]
fn norm(a: &ArrayView1<'_, f32>) -> f32 {
    a.fold(0.0f32, |acc, x| acc + x * x).sqrt()
}

/// Euclidean (L2) distance between two descriptors of equal length.
pub fn euclidean_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> Result<f32> {
    check_len(&a, &b)?;

    Ok(norm(&(&a - &b).view()))
}

/// Cosine similarity in `[-1, 1]` between two descriptors of equal length.
///
/// Undefined when either descriptor has zero norm, reported as
/// `Error::DegenerateVector`.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> Result<f32> {
    check_len(&a, &b)?;

    let (length_a, length_b) = (norm(&a), norm(&b));

    if length_a == 0.0 || length_b == 0.0 {
        return Err(Error::DegenerateVector);
    }

    Ok((a.dot(&b) / (length_a * length_b)).max(-1.0).min(1.0))
}

/// Compute pair-wise euclidean distance between rows of `a` and `b`.
///
/// Returns a matrix of size `a.nrows()`, `b.nrows()` such that element
/// `(i, j)` contains the distance between `a[i]` and `b[j]`.
pub fn pairwise_euclidean(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    if a.ncols() != b.ncols() {
        return Err(Error::DimensionMismatch(a.ncols(), b.ncols()));
    }

    let mut dist = Array2::zeros((a.nrows(), b.nrows()));

    // |a|^2 + |b|^2 - 2ab cancels in f32 for large, close rows
    for ((i, j), value) in dist.indexed_iter_mut() {
        *value = norm(&(&a.row(i) - &b.row(j)).view());
    }

    Ok(dist)
}

/// Compute pair-wise cosine similarity between rows of `a` and `b`.
///
/// Rows with zero norm have no direction; their entries are `NaN`.
pub fn pairwise_cosine_similarity(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    if a.ncols() != b.ncols() {
        return Err(Error::DimensionMismatch(a.ncols(), b.ncols()));
    }

    let length_a = a.map_axis(Axis(1), |x| norm(&x));
    let length_b = b.map_axis(Axis(1), |x| norm(&x));

    let a = &a / &length_a.insert_axis(Axis(1));
    let b = &b / &length_b.insert_axis(Axis(1));

    let mut sim = a.dot(&b.t());
    sim.mapv_inplace(|x| if x.is_nan() { x } else { x.max(-1.0).min(1.0) });

    Ok(sim)
}
