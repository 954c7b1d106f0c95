//! Modified Bessel function of the first kind, order zero.
//!
//! Polynomial approximations from Abramowitz & Stegun 9.8.1 and 9.8.2,
//! with relative error around 1e-7.

const SMALL_ARGUMENT_LIMIT: f64 = 3.75;

const SMALL_COEFFS: [f64; 7] = [
    1.0, 3.5156229, 3.0899424, 1.2067492, 0.2659732, 0.0360768, 0.0045813,
];

const LARGE_COEFFS: [f64; 9] = [
    0.39894228,
    0.01328592,
    0.00225319,
    -0.00157565,
    0.00916281,
    -0.02057706,
    0.02635537,
    -0.01647633,
    0.00392377,
];

#[inline]
fn horner(coeffs: &[f64], t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * t + c)
}

/// `I0(x)`.
pub fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < SMALL_ARGUMENT_LIMIT {
        let t = (x / SMALL_ARGUMENT_LIMIT).powi(2);
        horner(&SMALL_COEFFS, t)
    } else {
        ax.exp() / ax.sqrt() * horner(&LARGE_COEFFS, SMALL_ARGUMENT_LIMIT / ax)
    }
}

/// Exponentially scaled `I0(x) * exp(-|x|)`, finite for arguments where `I0` overflows.
pub fn bessel_i0_scaled(x: f64) -> f64 {
    let ax = x.abs();
    if ax < SMALL_ARGUMENT_LIMIT {
        bessel_i0(x) * (-ax).exp()
    } else {
        horner(&LARGE_COEFFS, SMALL_ARGUMENT_LIMIT / ax) / ax.sqrt()
    }
}
