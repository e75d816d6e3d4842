/// Bayesian information criterion of a fit with log-likelihood `llf` on
/// `nobs` observations and `k` free parameters.
///
/// # Examples
///
/// ```
/// use costometer::analysis::bic;
///
/// assert_eq!(bic(-10.0, 1, 3), 20.0);
/// assert!((bic(-10.0, 20, 2) - (20.0 + 2.0 * 20f64.ln())).abs() < 1e-12);
/// ```
pub fn bic(llf: f64, nobs: usize, k: usize) -> f64 {
    -2.0 * llf + k as f64 * (nobs as f64).ln()
}
