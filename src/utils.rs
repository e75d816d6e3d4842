//! Numeric helpers shared by the priors, policies, and aggregation code.

/// Numerically stable `ln Σ exp(x)`.
///
/// Returns negative infinity for an empty input or when every term is
/// negative infinity.
///
/// # Examples
///
/// ```
/// use costometer::utils::log_sum_exp;
///
/// let lse = log_sum_exp([0.0, 0.0]);
/// assert!((lse - std::f64::consts::LN_2).abs() < 1e-12);
/// assert_eq!(log_sum_exp(std::iter::empty()), f64::NEG_INFINITY);
/// ```
pub fn log_sum_exp<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max.is_infinite() || max.is_nan() {
        return max;
    }
    max + values.iter().map(|value| (value - max).exp()).sum::<f64>().ln()
}

/// Normalize weights to probabilities that sum to 1.0.
///
/// # Returns
///
/// - `Some(Vec<f64>)` containing normalized probabilities if total weight is positive and finite
/// - `None` otherwise, including for an empty input
///
/// # Examples
///
/// ```
/// use costometer::utils::normalize_weights;
///
/// let normalized = normalize_weights(vec![1.0, 2.0, 1.0]).unwrap();
/// assert_eq!(normalized, vec![0.25, 0.5, 0.25]);
///
/// assert_eq!(normalize_weights(vec![0.0, 0.0]), None);
/// ```
pub fn normalize_weights<I>(weights: I) -> Option<Vec<f64>>
where
    I: IntoIterator<Item = f64>,
{
    let weights: Vec<f64> = weights.into_iter().collect();
    let sum: f64 = weights.iter().sum();
    if weights.is_empty() || !sum.is_finite() || sum <= 0.0 {
        return None;
    }
    Some(weights.iter().map(|weight| weight / sum).collect())
}

/// Equality up to a relative tolerance, with an absolute floor of the same
/// size for values near zero.
pub fn approx_eq(a: f64, b: f64, rel_tol: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= rel_tol * scale
}
