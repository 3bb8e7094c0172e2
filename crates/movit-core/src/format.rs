//! Colour, gamma, alpha and Y'CbCr vocabulary.
//!
//! The integer codes (`as_i32` / `from_i32`) are the values effects accept
//! through their `set_int` parameters, e.g. `source_space` on the colourspace
//! conversion effect.

use serde::{Deserialize, Serialize};

/// RGB primaries (plus XYZ as a pseudo-space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colorspace {
    Invalid,
    /// sRGB / Rec. 709 primaries.
    Srgb,
    /// Rec. 601, 525-line (NTSC) primaries.
    Rec601_525,
    /// Rec. 601, 625-line (PAL/SECAM) primaries.
    Rec601_625,
    Xyz,
    Rec2020,
}

impl Colorspace {
    pub const REC_709: Colorspace = Colorspace::Srgb;

    pub fn as_i32(self) -> i32 {
        match self {
            Colorspace::Invalid => -1,
            Colorspace::Srgb => 0,
            Colorspace::Rec601_525 => 1,
            Colorspace::Rec601_625 => 2,
            Colorspace::Xyz => 3,
            Colorspace::Rec2020 => 4,
        }
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Colorspace::Srgb),
            1 => Some(Colorspace::Rec601_525),
            2 => Some(Colorspace::Rec601_625),
            3 => Some(Colorspace::Xyz),
            4 => Some(Colorspace::Rec2020),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Colorspace::Invalid => "invalid",
            Colorspace::Srgb => "sRGB",
            Colorspace::Rec601_525 => "Rec601_525",
            Colorspace::Rec601_625 => "Rec601_625",
            Colorspace::Xyz => "XYZ",
            Colorspace::Rec2020 => "Rec2020",
        }
    }
}

/// Transfer curve of the pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaCurve {
    Invalid,
    Linear,
    Srgb,
    /// Rec. 601 and Rec. 709 share this curve.
    Rec709,
    Rec2020_12Bit,
}

impl GammaCurve {
    pub const REC_601: GammaCurve = GammaCurve::Rec709;
    /// The 10-bit Rec. 2020 curve is numerically the Rec. 709 curve.
    pub const REC_2020_10_BIT: GammaCurve = GammaCurve::Rec709;

    pub fn as_i32(self) -> i32 {
        match self {
            GammaCurve::Invalid => -1,
            GammaCurve::Linear => 0,
            GammaCurve::Srgb => 1,
            GammaCurve::Rec709 => 2,
            GammaCurve::Rec2020_12Bit => 3,
        }
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(GammaCurve::Linear),
            1 => Some(GammaCurve::Srgb),
            2 => Some(GammaCurve::Rec709),
            3 => Some(GammaCurve::Rec2020_12Bit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GammaCurve::Invalid => "invalid",
            GammaCurve::Linear => "linear",
            GammaCurve::Srgb => "sRGB",
            GammaCurve::Rec709 => "Rec709",
            GammaCurve::Rec2020_12Bit => "Rec2020_12bit",
        }
    }
}

/// Alpha representation of a node's output, as inferred by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaType {
    Invalid,
    /// Alpha is 1.0 everywhere; compatible with both representations.
    Blank,
    Premultiplied,
    Postmultiplied,
}

impl AlphaType {
    pub fn name(self) -> &'static str {
        match self {
            AlphaType::Invalid => "invalid",
            AlphaType::Blank => "blank",
            AlphaType::Premultiplied => "premultiplied",
            AlphaType::Postmultiplied => "postmultiplied",
        }
    }
}

/// Tri-state mipmap demand an effect places on the texture it samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipmapRequirements {
    #[default]
    DoesNotNeedMipmaps,
    NeedsMipmaps,
    CannotAcceptMipmaps,
}

/// Colourspace + transfer curve pair describing an RGB image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFormat {
    pub color_space: Colorspace,
    pub gamma_curve: GammaCurve,
}

impl ImageFormat {
    pub const SRGB: ImageFormat = ImageFormat {
        color_space: Colorspace::Srgb,
        gamma_curve: GammaCurve::Srgb,
    };

    pub const LINEAR_SRGB: ImageFormat = ImageFormat {
        color_space: Colorspace::Srgb,
        gamma_curve: GammaCurve::Linear,
    };
}

impl Default for ImageFormat {
    fn default() -> Self {
        ImageFormat::SRGB
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YCbCrLumaCoefficients {
    Rec601,
    Rec709,
    Rec2020,
}

/// Chroma sample position within a subsampled block, in units of luma samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaSiting {
    pub x: f32,
    pub y: f32,
}

impl ChromaSiting {
    /// Left/centre siting used by MPEG-2 style 4:2:0.
    pub const LEFT: ChromaSiting = ChromaSiting { x: 0.0, y: 0.5 };
    pub const CENTER: ChromaSiting = ChromaSiting { x: 0.5, y: 0.5 };
}

/// Description of a Y'CbCr signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YCbCrFormat {
    pub luma_coefficients: YCbCrLumaCoefficients,
    /// Full range (0..255 for 8-bit) instead of studio swing (16..235/240).
    pub full_range: bool,
    /// Number of quantisation levels; 256 for 8-bit, 1024 for 10-bit.
    pub num_levels: u32,
    pub chroma_subsampling_x: u32,
    pub chroma_subsampling_y: u32,
    pub cb_position: ChromaSiting,
    pub cr_position: ChromaSiting,
}

impl Default for YCbCrFormat {
    fn default() -> Self {
        Self {
            luma_coefficients: YCbCrLumaCoefficients::Rec601,
            full_range: false,
            num_levels: 256,
            chroma_subsampling_x: 1,
            chroma_subsampling_y: 1,
            cb_position: ChromaSiting::CENTER,
            cr_position: ChromaSiting::CENTER,
        }
    }
}

/// How Y'CbCr output is spread over render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YCbCrOutputSplitting {
    /// Y'CbCr in one RGBA target.
    Interleaved,
    /// Y' in one target, CbCr in a second.
    SplitYAndCbCr,
    /// Y', Cb and Cr in three targets.
    Planar,
}

/// Storage type of the Y'CbCr destination; decides whether values are clamped
/// and rounded to integer levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YCbCrOutputType {
    UnsignedByte,
    UnsignedShort,
    Float,
}
