//! Minimum-image geometry for spaces that are periodic along some axes.
//!
//! A `period` entry `<= 0` marks that axis as ordinary Euclidean.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};

#[inline]
fn wrap_component(delta: f64, period: f64) -> f64 {
    if period > 0.0 {
        let scaled = delta / period;
        (scaled - scaled.round()) * period
    } else {
        delta
    }
}

/// Writes the minimum-image displacement `a - b` into a caller-owned buffer.
///
/// All three views must have the same length as `period`.
pub fn wrapped_delta_into(
    period: ArrayView1<f64>,
    a: ArrayView1<f64>,
    b: ArrayView1<f64>,
    mut out: ArrayViewMut1<f64>,
) {
    Zip::from(&mut out)
        .and(&period)
        .and(&a)
        .and(&b)
        .for_each(|o, &l, &x, &y| *o = wrap_component(x - y, l));
}

/// Minimum-image displacement `a - b`.
pub fn wrapped_delta(
    period: ArrayView1<f64>,
    a: ArrayView1<f64>,
    b: ArrayView1<f64>,
) -> Array1<f64> {
    let mut out = Array1::zeros(period.len());
    wrapped_delta_into(period, a, b, out.view_mut());
    out
}

/// Squared length of the minimum-image displacement. Allocation free.
pub fn wrapped_squared_distance(
    period: ArrayView1<f64>,
    a: ArrayView1<f64>,
    b: ArrayView1<f64>,
) -> f64 {
    Zip::from(&period).and(&a).and(&b).fold(0.0, |acc, &l, &x, &y| {
        let d = wrap_component(x - y, l);
        acc + d * d
    })
}

/// Minimum-image displacement of every sample row of `x` (shape `N x D`) from `reference`.
pub fn batch_wrapped_delta(
    period: ArrayView1<f64>,
    x: ArrayView2<f64>,
    reference: ArrayView1<f64>,
) -> Array2<f64> {
    let mut out = Array2::zeros(x.raw_dim());
    for (row, target) in x.outer_iter().zip(out.outer_iter_mut()) {
        wrapped_delta_into(period, row, reference, target);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn non_periodic_axes_are_plain_differences() {
        let period = array![0.0, -1.0];
        let d = wrapped_delta(period.view(), array![5.0, -3.0].view(), array![1.0, 4.0].view());
        assert_eq!(d, array![4.0, -7.0]);
    }

    #[test]
    fn periodic_axis_takes_shortest_image() {
        let period = array![1.0, 0.0];
        let d = wrapped_delta(period.view(), array![0.9, 0.9].view(), array![0.1, 0.1].view());
        assert_abs_diff_eq!(d[0], -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(d[1], 0.8, epsilon = 1e-12);
    }

    #[test]
    fn squared_distance_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(7);
        let period = array![2.0, 0.0, 6.283185307179586, -1.0];
        for _ in 0..200 {
            let a = Array1::from_shape_fn(4, |_| rng.gen_range(-10.0..10.0));
            let b = Array1::from_shape_fn(4, |_| rng.gen_range(-10.0..10.0));
            let ab = wrapped_squared_distance(period.view(), a.view(), b.view());
            let ba = wrapped_squared_distance(period.view(), b.view(), a.view());
            assert_abs_diff_eq!(ab, ba, epsilon = 1e-9);
        }
    }

    #[test]
    fn shifting_by_one_period_leaves_delta_unchanged() {
        let mut rng = StdRng::seed_from_u64(11);
        let period = array![3.0, 0.5];
        for _ in 0..200 {
            let a = Array1::from_shape_fn(2, |_| rng.gen_range(-5.0..5.0));
            let b = Array1::from_shape_fn(2, |_| rng.gen_range(-5.0..5.0));
            let base = wrapped_delta(period.view(), a.view(), b.view());
            for k in 0..2 {
                let mut shifted = a.clone();
                shifted[k] += period[k];
                let moved = wrapped_delta(period.view(), shifted.view(), b.view());
                assert!(base.abs_diff_eq(&moved, 1e-9));
            }
        }
    }

    #[test]
    fn squared_distance_matches_delta() {
        let period = array![1.0, 0.0];
        let a = array![0.95, 2.0];
        let b = array![0.05, 1.0];
        let d = wrapped_delta(period.view(), a.view(), b.view());
        assert_abs_diff_eq!(
            wrapped_squared_distance(period.view(), a.view(), b.view()),
            d.dot(&d),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(d.dot(&d), 0.01 + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn batch_delta_matches_row_by_row() {
        let period = array![1.0, 0.0];
        let x = array![[0.9, 1.0], [0.2, -3.0], [0.5, 0.0]];
        let reference = array![0.1, 0.5];
        let batch = batch_wrapped_delta(period.view(), x.view(), reference.view());
        for (i, row) in x.outer_iter().enumerate() {
            let single = wrapped_delta(period.view(), row, reference.view());
            assert_eq!(batch.row(i), single);
        }
    }
}
