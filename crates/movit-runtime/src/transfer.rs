//! Piecewise power-law transfer curves (sRGB, Rec. 709 family, Rec. 2020).
//!
//! Every supported curve has the shape
//!
//! ```text
//! encode(L) = slope * L                        for L <  beta
//!           = alpha * L^(1/gamma) - (alpha-1)  otherwise
//! ```
//!
//! which is what the gamma expansion/compression shaders evaluate, with the
//! four constants passed as uniforms.

use movit_core::GammaCurve;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferCurve {
    /// Linear-light breakpoint.
    pub beta: f32,
    /// Slope of the linear toe.
    pub slope: f32,
    pub alpha: f32,
    /// Exponent applied when decoding (1/gamma when encoding).
    pub gamma: f32,
}

impl TransferCurve {
    pub const SRGB: TransferCurve = TransferCurve {
        beta: 0.0031308,
        slope: 12.92,
        alpha: 1.055,
        gamma: 2.4,
    };

    pub const REC_709: TransferCurve = TransferCurve {
        beta: 0.018053968510807,
        slope: 4.5,
        alpha: 1.09929682680944,
        gamma: 1.0 / 0.45,
    };

    /// Rec. 2020 at 12-bit precision. The 10-bit variant is identical to
    /// Rec. 709.
    pub const REC_2020_12_BIT: TransferCurve = TransferCurve {
        beta: 0.0181,
        slope: 4.5,
        alpha: 1.0993,
        gamma: 1.0 / 0.45,
    };

    /// Parameters for a non-linear curve; `None` for linear and invalid.
    pub fn for_curve(curve: GammaCurve) -> Option<TransferCurve> {
        match curve {
            GammaCurve::Srgb => Some(Self::SRGB),
            GammaCurve::Rec709 => Some(Self::REC_709),
            GammaCurve::Rec2020_12Bit => Some(Self::REC_2020_12_BIT),
            GammaCurve::Linear | GammaCurve::Invalid => None,
        }
    }

    /// Encoded value at which the toe ends.
    pub fn encoded_breakpoint(&self) -> f32 {
        self.beta * self.slope
    }

    pub fn expand(&self, v: f32) -> f32 {
        if v < self.encoded_breakpoint() {
            v / self.slope
        } else {
            ((v + self.alpha - 1.0) / self.alpha).powf(self.gamma)
        }
    }

    pub fn compress(&self, l: f32) -> f32 {
        if l < self.beta {
            l * self.slope
        } else {
            self.alpha * l.powf(1.0 / self.gamma) - (self.alpha - 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn srgb_known_values() {
        let c = TransferCurve::SRGB;
        assert_abs_diff_eq!(c.expand(0.5), 0.214_041, epsilon = 1e-5);
        assert_abs_diff_eq!(c.expand(0.04), 0.04 / 12.92, epsilon = 1e-7);
        assert_abs_diff_eq!(c.expand(1.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c.compress(0.0), 0.0);
    }

    #[test]
    fn curves_are_continuous_at_the_breakpoint() {
        for c in [
            TransferCurve::SRGB,
            TransferCurve::REC_709,
            TransferCurve::REC_2020_12_BIT,
        ] {
            let toe = c.beta * c.slope;
            let power = c.alpha * c.beta.powf(1.0 / c.gamma) - (c.alpha - 1.0);
            assert_abs_diff_eq!(toe, power, epsilon = 1e-3);
        }
    }

    #[test]
    fn expand_inverts_compress() {
        for c in [TransferCurve::SRGB, TransferCurve::REC_709] {
            for i in 0..=20 {
                let l = i as f32 / 20.0;
                assert_abs_diff_eq!(c.expand(c.compress(l)), l, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn linear_has_no_parameters() {
        assert!(TransferCurve::for_curve(GammaCurve::Linear).is_none());
        assert_eq!(
            TransferCurve::for_curve(GammaCurve::REC_2020_10_BIT),
            Some(TransferCurve::REC_709)
        );
    }
}
