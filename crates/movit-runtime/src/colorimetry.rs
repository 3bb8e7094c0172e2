//! Colour primaries and RGB <-> XYZ matrices.
//!
//! All supported RGB spaces share the D65 white point, so conversions between
//! them are a plain matrix product through XYZ without chromatic adaptation.

use glam::{DMat3, DVec3};
use movit_core::Colorspace;

/// CIE xy chromaticities of the three primaries and the white point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primaries {
    pub r: (f64, f64),
    pub g: (f64, f64),
    pub b: (f64, f64),
    pub w: (f64, f64),
}

pub const D65_XY: (f64, f64) = (0.3127, 0.3290);

/// sRGB / Rec. 709.
pub const SRGB: Primaries = Primaries {
    r: (0.640, 0.330),
    g: (0.300, 0.600),
    b: (0.150, 0.060),
    w: D65_XY,
};

/// Rec. 601 for 525-line systems (SMPTE C).
pub const REC_601_525: Primaries = Primaries {
    r: (0.630, 0.340),
    g: (0.310, 0.595),
    b: (0.155, 0.070),
    w: D65_XY,
};

/// Rec. 601 for 625-line systems (EBU).
pub const REC_601_625: Primaries = Primaries {
    r: (0.640, 0.330),
    g: (0.290, 0.600),
    b: (0.150, 0.060),
    w: D65_XY,
};

pub const REC_2020: Primaries = Primaries {
    r: (0.708, 0.292),
    g: (0.170, 0.797),
    b: (0.131, 0.046),
    w: D65_XY,
};

impl Primaries {
    /// `None` for XYZ (identity) and for the invalid sentinel.
    pub fn for_colorspace(cs: Colorspace) -> Option<Primaries> {
        match cs {
            Colorspace::Srgb => Some(SRGB),
            Colorspace::Rec601_525 => Some(REC_601_525),
            Colorspace::Rec601_625 => Some(REC_601_625),
            Colorspace::Rec2020 => Some(REC_2020),
            Colorspace::Xyz | Colorspace::Invalid => None,
        }
    }
}

fn xy_to_xyz(x: f64, y: f64) -> DVec3 {
    DVec3::new(x / y, 1.0, (1.0 - x - y) / y)
}

/// RGB -> XYZ for a set of primaries, normalised so RGB white maps to the
/// white point with Y = 1.
pub fn rgb_to_xyz_matrix(p: &Primaries) -> DMat3 {
    let r = xy_to_xyz(p.r.0, p.r.1);
    let g = xy_to_xyz(p.g.0, p.g.1);
    let b = xy_to_xyz(p.b.0, p.b.1);
    let w = xy_to_xyz(p.w.0, p.w.1);

    let m = DMat3::from_cols(r, g, b);
    let s = m.inverse() * w;
    DMat3::from_cols(r * s.x, g * s.y, b * s.z)
}

fn to_xyz(cs: Colorspace) -> DMat3 {
    match cs {
        Colorspace::Xyz => DMat3::IDENTITY,
        Colorspace::Invalid => panic!("no conversion matrix for the invalid colour space"),
        other => match Primaries::for_colorspace(other) {
            Some(p) => rgb_to_xyz_matrix(&p),
            None => DMat3::IDENTITY,
        },
    }
}

/// Linear-light matrix taking `src` RGB (or XYZ) to `dst` RGB (or XYZ).
pub fn conversion_matrix(src: Colorspace, dst: Colorspace) -> DMat3 {
    if src == dst {
        return DMat3::IDENTITY;
    }
    to_xyz(dst).inverse() * to_xyz(src)
}

/// Column-major `f32` layout as expected by `uniform mat3`.
pub fn mat3_to_gl(m: &DMat3) -> [f32; 9] {
    m.to_cols_array().map(|v| v as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn srgb_white_maps_to_d65() {
        let white = conversion_matrix(Colorspace::Srgb, Colorspace::Xyz) * DVec3::ONE;
        assert_abs_diff_eq!(white.x, 0.9505, epsilon = 1e-3);
        assert_abs_diff_eq!(white.y, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(white.z, 1.0889, epsilon = 1e-3);
    }

    #[test]
    fn srgb_matrix_matches_published_values() {
        let m = rgb_to_xyz_matrix(&SRGB);
        assert_abs_diff_eq!(m.x_axis.x, 0.4124, epsilon = 1e-3);
        assert_abs_diff_eq!(m.y_axis.y, 0.7152, epsilon = 1e-3);
        assert_abs_diff_eq!(m.z_axis.z, 0.9505, epsilon = 1e-3);
    }

    #[test]
    fn conversions_round_trip() {
        for cs in [
            Colorspace::Rec601_525,
            Colorspace::Rec601_625,
            Colorspace::Rec2020,
            Colorspace::Xyz,
        ] {
            let there = conversion_matrix(Colorspace::Srgb, cs);
            let back = conversion_matrix(cs, Colorspace::Srgb);
            let v = DVec3::new(0.2, 0.5, 0.8);
            let r = back * (there * v);
            assert_abs_diff_eq!(r.x, v.x, epsilon = 1e-9);
            assert_abs_diff_eq!(r.y, v.y, epsilon = 1e-9);
            assert_abs_diff_eq!(r.z, v.z, epsilon = 1e-9);
        }
    }

    #[test]
    fn shared_white_point_keeps_white_white() {
        let w = conversion_matrix(Colorspace::Rec2020, Colorspace::Srgb) * DVec3::ONE;
        assert_abs_diff_eq!(w.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(w.y, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(w.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn gl_layout_is_column_major() {
        let m = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(4.0, 5.0, 6.0),
            DVec3::new(7.0, 8.0, 9.0),
        );
        assert_eq!(mat3_to_gl(&m), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }
}
