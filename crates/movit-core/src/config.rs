//! Per-chain configuration.
//!
//! Everything a client can decide about a chain before `finalize()` can be
//! described by a [`ChainConfig`], either built in code or loaded from JSON.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::EngineError;
use crate::format::{ImageFormat, YCbCrFormat, YCbCrOutputSplitting, YCbCrOutputType};

/// `GL_RGBA16F`; the default storage for intermediate textures.
pub const GL_RGBA16F: u32 = 0x881A;

/// Maximum number of Y'CbCr outputs one chain can produce.
pub const MAX_YCBCR_OUTPUTS: usize = 2;

/// Maximum dither depth in bits.
pub const MAX_DITHER_BITS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputAlphaFormat {
    #[default]
    Premultiplied,
    Postmultiplied,
}

/// Where row 0 of the output lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrigin {
    /// OpenGL convention.
    #[default]
    BottomLeft,
    /// Most image/video formats; the last phase flips vertically.
    TopLeft,
}

/// Pseudo-gamma applied to linear-light intermediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntermediateTransformation {
    #[default]
    None,
    /// Store `sqrt(rgb)` and square on read; gives fp16 intermediates more
    /// precision in the darks.
    SquareRoot,
}

/// The RGBA output of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbaOutputConfig {
    pub format: ImageFormat,
    #[serde(default)]
    pub alpha_format: OutputAlphaFormat,
}

/// One Y'CbCr output of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YCbCrOutputConfig {
    /// R'G'B' format the Y'CbCr signal is derived from.
    pub format: ImageFormat,
    #[serde(default)]
    pub alpha_format: OutputAlphaFormat,
    pub ycbcr_format: YCbCrFormat,
    pub splitting: YCbCrOutputSplitting,
    pub output_type: YCbCrOutputType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_aspect")]
    pub aspect_nom: f32,
    #[serde(default = "default_aspect")]
    pub aspect_denom: f32,

    #[serde(default)]
    pub rgba_output: Option<RgbaOutputConfig>,
    #[serde(default)]
    pub ycbcr_outputs: Vec<YCbCrOutputConfig>,

    #[serde(default)]
    pub output_origin: OutputOrigin,
    #[serde(default = "default_intermediate_format")]
    pub intermediate_format: u32,
    #[serde(default)]
    pub intermediate_transformation: IntermediateTransformation,
    #[serde(default)]
    pub dither_bits: u32,
    #[serde(default)]
    pub phase_timing: bool,
}

fn default_aspect() -> f32 {
    1.0
}

fn default_intermediate_format() -> u32 {
    GL_RGBA16F
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            aspect_nom: 16.0,
            aspect_denom: 9.0,
            rgba_output: None,
            ycbcr_outputs: Vec::new(),
            output_origin: OutputOrigin::default(),
            intermediate_format: GL_RGBA16F,
            intermediate_transformation: IntermediateTransformation::default(),
            dither_bits: 0,
            phase_timing: false,
        }
    }
}

impl ChainConfig {
    pub fn new(aspect_nom: f32, aspect_denom: f32) -> Self {
        Self {
            aspect_nom,
            aspect_denom,
            ..Self::default()
        }
    }

    /// Load and validate a chain configuration from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let cfg: ChainConfig = load_typed_json(path.as_ref())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the option domains of every field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.aspect_nom > 0.0 && self.aspect_denom > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "aspect must be positive, got {}:{}",
                self.aspect_nom, self.aspect_denom
            )));
        }
        if self.dither_bits > MAX_DITHER_BITS {
            return Err(EngineError::InvalidConfig(format!(
                "dither_bits must be in 0..={MAX_DITHER_BITS}, got {}",
                self.dither_bits
            )));
        }
        if self.rgba_output.is_none() && self.ycbcr_outputs.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one output (rgba or ycbcr) is required".to_string(),
            ));
        }
        if self.ycbcr_outputs.len() > MAX_YCBCR_OUTPUTS {
            return Err(EngineError::InvalidConfig(format!(
                "at most {MAX_YCBCR_OUTPUTS} ycbcr outputs are supported, got {}",
                self.ycbcr_outputs.len()
            )));
        }
        if let Some(first) = self.ycbcr_outputs.first() {
            for out in &self.ycbcr_outputs[1..] {
                if out.format != first.format
                    || out.alpha_format != first.alpha_format
                    || out.ycbcr_format != first.ycbcr_format
                    || out.output_type != first.output_type
                {
                    return Err(EngineError::InvalidConfig(
                        "all ycbcr outputs must share format, alpha format and output type"
                            .to_string(),
                    ));
                }
            }
            if let Some(rgba) = &self.rgba_output {
                if rgba.format != first.format || rgba.alpha_format != first.alpha_format {
                    return Err(EngineError::InvalidConfig(
                        "rgba and ycbcr outputs must share format and alpha format".to_string(),
                    ));
                }
            }
            let y = &first.ycbcr_format;
            if y.chroma_subsampling_x != 1 || y.chroma_subsampling_y != 1 {
                return Err(EngineError::InvalidConfig(
                    "ycbcr output supports only 4:4:4 (no chroma subsampling)".to_string(),
                ));
            }
            if y.num_levels < 2 {
                return Err(EngineError::InvalidConfig(format!(
                    "ycbcr num_levels must be at least 2, got {}",
                    y.num_levels
                )));
            }
        }
        Ok(())
    }
}

/// Read a JSON file and deserialize it, mapping failures onto [`EngineError`].
pub fn load_typed_json<T: DeserializeOwned>(path: &Path) -> Result<T, EngineError> {
    let bytes = std::fs::read(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| EngineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Colorspace, GammaCurve};

    fn rgba() -> Option<RgbaOutputConfig> {
        Some(RgbaOutputConfig {
            format: ImageFormat::SRGB,
            alpha_format: OutputAlphaFormat::Postmultiplied,
        })
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let cfg: ChainConfig = serde_json::from_str(
            r#"{"rgba_output": {"format": {"color_space": "srgb", "gamma_curve": "srgb"}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.aspect_nom, 1.0);
        assert_eq!(cfg.intermediate_format, GL_RGBA16F);
        assert_eq!(cfg.output_origin, OutputOrigin::BottomLeft);
        assert_eq!(
            cfg.rgba_output.unwrap().alpha_format,
            OutputAlphaFormat::Premultiplied
        );
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_dither() {
        let cfg = ChainConfig {
            dither_bits: 17,
            rgba_output: rgba(),
            ..ChainConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_chain_without_outputs() {
        let err = ChainConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("at least one output"));
    }

    #[test]
    fn rejects_disagreeing_ycbcr_outputs() {
        let a = YCbCrOutputConfig {
            format: ImageFormat::SRGB,
            alpha_format: OutputAlphaFormat::Postmultiplied,
            ycbcr_format: YCbCrFormat::default(),
            splitting: YCbCrOutputSplitting::Planar,
            output_type: YCbCrOutputType::UnsignedByte,
        };
        let mut b = a;
        b.format = ImageFormat {
            color_space: Colorspace::Rec2020,
            gamma_curve: GammaCurve::Rec2020_12Bit,
        };
        let cfg = ChainConfig {
            ycbcr_outputs: vec![a, b],
            ..ChainConfig::default()
        };
        assert!(cfg.validate().is_err());

        // Differing splitting alone is fine.
        b = a;
        b.splitting = YCbCrOutputSplitting::Interleaved;
        let cfg = ChainConfig {
            ycbcr_outputs: vec![a, b],
            ..ChainConfig::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ChainConfig::from_json_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
