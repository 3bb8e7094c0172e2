//! Folding pairs of filter taps into single bilinear fetches.

/// One bilinear fetch standing in for two adjacent taps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedSample {
    /// Sample position, in the same units as `pos1`.
    pub offset: f32,
    pub total_weight: f32,
    /// Squared L2 error of the effective weights against (w1, w2).
    pub sum_sq_error: f32,
}

/// Replace taps `w1` at `pos1` and `w2` at `pos1 + pos1_pos2_diff` by one
/// bilinear sample.
///
/// `num_subtexels` is how many distinct interpolation positions the hardware
/// resolves between two texels (1 / measured texel subpixel precision). The
/// interpolation factor is quantised to that grid before the weight is chosen,
/// so the returned error is what the GPU will actually produce.
///
/// Both weights must have the same sign.
pub fn combine_two_samples(
    w1: f32,
    w2: f32,
    pos1: f32,
    pos1_pos2_diff: f32,
    num_subtexels: f32,
) -> CombinedSample {
    assert!(w1 * w2 >= 0.0, "combine_two_samples: weights of differing sign");

    let mut z = if (w1 + w2).abs() < 1e-6 {
        0.5
    } else {
        w2 / (w1 + w2)
    };

    let offset = pos1 + z * pos1_pos2_diff;
    z = (offset - pos1) / pos1_pos2_diff;
    z = (z * num_subtexels).round_ties_even() / num_subtexels;

    // Least-squares weight for the quantised z:
    //   minimise (w(1-z) - w1)^2 + (wz - w2)^2
    let total_weight = (w1 + z * (w2 - w1)) / (z * z + (1.0 - z) * (1.0 - z));

    let err1 = total_weight * (1.0 - z) - w1;
    let err2 = total_weight * z - w2;
    CombinedSample {
        offset,
        total_weight,
        sum_sq_error: err1 * err1 + err2 * err2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn equal_weights_sample_the_midpoint() {
        let s = combine_two_samples(0.25, 0.25, 1.0, 1.0, 256.0);
        assert_abs_diff_eq!(s.offset, 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(s.total_weight, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(s.sum_sq_error, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn fine_precision_is_nearly_exact() {
        let s = combine_two_samples(0.3, 0.1, 0.0, 1.0, 65536.0);
        assert_abs_diff_eq!(s.offset, 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(s.total_weight, 0.4, epsilon = 1e-4);
        assert!(s.sum_sq_error < 1e-8);
    }

    #[test]
    fn coarse_precision_shows_up_as_error() {
        // Two subtexel positions only: z snaps to 0 or 1 (or 0.5).
        let s = combine_two_samples(0.3, 0.1, 0.0, 1.0, 2.0);
        assert!(s.sum_sq_error > 1e-4);
        let fine = combine_two_samples(0.3, 0.1, 0.0, 1.0, 256.0);
        assert!(fine.sum_sq_error < s.sum_sq_error);
    }

    #[test]
    fn zero_weights_are_harmless() {
        let s = combine_two_samples(0.0, 0.0, 2.0, 1.0, 256.0);
        assert_abs_diff_eq!(s.offset, 2.5);
        assert_abs_diff_eq!(s.total_weight, 0.0);
    }

    #[test]
    #[should_panic(expected = "differing sign")]
    fn mixed_signs_are_rejected() {
        combine_two_samples(0.5, -0.1, 0.0, 1.0, 256.0);
    }
}
