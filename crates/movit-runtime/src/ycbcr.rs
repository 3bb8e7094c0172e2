//! Y'CbCr coefficient tables and conversion matrices.
//!
//! Values are normalised to 0..1 in both directions; `num_levels` lets the
//! same formulas describe 8-bit, 10-bit and 12-bit code ranges.

use glam::{DMat3, DVec3};
use movit_core::{YCbCrFormat, YCbCrLumaCoefficients};

/// Luma weights (Kr, Kb); Kg is implied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YCbCrCoefficients {
    pub kr: f64,
    pub kb: f64,
}

impl YCbCrCoefficients {
    pub fn for_luma(luma: YCbCrLumaCoefficients) -> Self {
        match luma {
            YCbCrLumaCoefficients::Rec601 => Self { kr: 0.299, kb: 0.114 },
            YCbCrLumaCoefficients::Rec709 => Self { kr: 0.2126, kb: 0.0722 },
            YCbCrLumaCoefficients::Rec2020 => Self { kr: 0.2627, kb: 0.0593 },
        }
    }

    pub fn kg(&self) -> f64 {
        1.0 - self.kr - self.kb
    }
}

/// Everything a shader needs to decode or encode one Y'CbCr format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YCbCrMatrices {
    /// R'G'B' -> unscaled Y'CbCr (Cb/Cr centred on zero).
    pub rgb_to_ycbcr: DMat3,
    /// Inverse of `rgb_to_ycbcr`.
    pub ycbcr_to_rgb: DMat3,
    /// Normalised code value of black / neutral chroma.
    pub offset: DVec3,
    /// Multiply (code - offset) by this to get unscaled Y'CbCr.
    pub scale: DVec3,
}

impl YCbCrMatrices {
    pub fn new(format: &YCbCrFormat) -> Self {
        let c = YCbCrCoefficients::for_luma(format.luma_coefficients);
        let (kr, kg, kb) = (c.kr, c.kg(), c.kb);

        // Rows: Y', Cb, Cr.
        let rgb_to_ycbcr = DMat3::from_cols(
            DVec3::new(kr, -kr / (2.0 * (1.0 - kb)), 0.5),
            DVec3::new(kg, -kg / (2.0 * (1.0 - kb)), -kg / (2.0 * (1.0 - kr))),
            DVec3::new(kb, 0.5, -kb / (2.0 * (1.0 - kr))),
        );

        let levels = f64::from(format.num_levels.max(2));
        let m = levels - 1.0;
        let (offset, scale) = if format.full_range {
            (
                DVec3::new(0.0, (levels / 2.0) / m, (levels / 2.0) / m),
                DVec3::ONE,
            )
        } else {
            let unit = levels / 256.0;
            (
                DVec3::new(16.0 * unit / m, 128.0 * unit / m, 128.0 * unit / m),
                DVec3::new(m / (219.0 * unit), m / (224.0 * unit), m / (224.0 * unit)),
            )
        };

        Self {
            rgb_to_ycbcr,
            ycbcr_to_rgb: rgb_to_ycbcr.inverse(),
            offset,
            scale,
        }
    }

    /// Normalised R'G'B' -> normalised Y'CbCr code values.
    pub fn encode(&self, rgb: DVec3) -> DVec3 {
        (self.rgb_to_ycbcr * rgb) / self.scale + self.offset
    }

    /// Normalised Y'CbCr code values -> normalised R'G'B'.
    pub fn decode(&self, ycbcr: DVec3) -> DVec3 {
        self.ycbcr_to_rgb * ((ycbcr - self.offset) * self.scale)
    }

    /// Decoding folded into one matrix applied to `code - offset`.
    pub fn decode_matrix(&self) -> DMat3 {
        self.ycbcr_to_rgb * DMat3::from_diagonal(self.scale)
    }

    /// Encoding folded into one matrix; add `offset` afterwards.
    pub fn encode_matrix(&self) -> DMat3 {
        DMat3::from_diagonal(self.scale.recip()) * self.rgb_to_ycbcr
    }
}

/// Texture-coordinate shift that lands a chroma sample sited at `pos`
/// (0 = left/top, 0.5 = centre of the subsampled block) on its texel
/// centre, for a chroma plane `resolution` texels wide.
pub fn chroma_offset(pos: f32, subsampling_factor: u32, resolution: u32) -> f32 {
    let factor = subsampling_factor.max(1) as f32;
    let local = (0.5 + pos * (factor - 1.0)) / factor;
    if (local - 0.5).abs() < 1e-10 {
        0.0
    } else {
        (0.5 - local) / resolution as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn to_8bit(v: DVec3) -> [i32; 3] {
        [
            (v.x * 255.0).round() as i32,
            (v.y * 255.0).round() as i32,
            (v.z * 255.0).round() as i32,
        ]
    }

    #[test]
    fn rec601_studio_pure_colours() {
        let m = YCbCrMatrices::new(&YCbCrFormat::default());
        // (R'G'B', expected Y'CbCr) from the usual Rec. 601 8-bit table.
        let table = [
            ([0.0, 0.0, 0.0], [16, 128, 128]),
            ([1.0, 1.0, 1.0], [235, 128, 128]),
            ([1.0, 0.0, 0.0], [81, 90, 240]),
            ([0.0, 1.0, 0.0], [145, 54, 34]),
            ([0.0, 0.0, 1.0], [41, 240, 110]),
        ];
        for (rgb, expected) in table {
            let got = to_8bit(m.encode(DVec3::from_array(rgb)));
            for (g, e) in got.iter().zip(expected) {
                assert!((g - e).abs() <= 1, "{rgb:?}: got {got:?}, expected {expected:?}");
            }
        }
    }

    #[test]
    fn decode_inverts_encode_within_two_levels() {
        for luma in [
            YCbCrLumaCoefficients::Rec601,
            YCbCrLumaCoefficients::Rec709,
            YCbCrLumaCoefficients::Rec2020,
        ] {
            for full_range in [false, true] {
                let fmt = YCbCrFormat {
                    luma_coefficients: luma,
                    full_range,
                    ..YCbCrFormat::default()
                };
                let m = YCbCrMatrices::new(&fmt);
                let rgb = DVec3::new(0.25, 0.6, 0.9);
                let back = m.decode(m.encode(rgb));
                assert_abs_diff_eq!(back.x, rgb.x, epsilon = 2.0 / 255.0);
                assert_abs_diff_eq!(back.y, rgb.y, epsilon = 2.0 / 255.0);
                assert_abs_diff_eq!(back.z, rgb.z, epsilon = 2.0 / 255.0);
            }
        }
    }

    #[test]
    fn folded_matrices_agree_with_stepwise_conversion() {
        let m = YCbCrMatrices::new(&YCbCrFormat::default());
        let code = DVec3::new(0.4, 0.45, 0.7);
        let a = m.decode(code);
        let b = m.decode_matrix() * (code - m.offset);
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-12);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-12);

        let rgb = DVec3::new(0.1, 0.2, 0.3);
        let e = m.encode_matrix() * rgb + m.offset;
        let f = m.encode(rgb);
        assert_abs_diff_eq!(e.y, f.y, epsilon = 1e-12);
    }

    #[test]
    fn chroma_offset_is_zero_without_subsampling() {
        assert_eq!(chroma_offset(0.0, 1, 1920), 0.0);
        assert_eq!(chroma_offset(0.5, 2, 960), 0.0);
        // Left-sited 4:2:x chroma sits a quarter block left of centre.
        assert_abs_diff_eq!(chroma_offset(0.0, 2, 960), 0.25 / 960.0, epsilon = 1e-9);
    }

    #[test]
    fn ten_bit_studio_offsets() {
        let fmt = YCbCrFormat {
            num_levels: 1024,
            ..YCbCrFormat::default()
        };
        let m = YCbCrMatrices::new(&fmt);
        assert_abs_diff_eq!(m.offset.x * 1023.0, 64.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.offset.y * 1023.0, 512.0, epsilon = 1e-9);
    }
}
