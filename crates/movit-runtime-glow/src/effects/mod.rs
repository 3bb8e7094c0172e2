//! Built-in effects.
//!
//! The conversion effects here are the ones the pipeline compiler inserts on
//! its own (colour space, gamma, alpha, Y'CbCr, dither, compute display);
//! the rest are general-purpose building blocks.

mod alpha;
mod blur;
mod colorspace_conversion;
mod compute_output_display;
mod dither;
mod gamma;
mod identity;
mod mix;
mod resize;
mod ycbcr_conversion;

pub use alpha::{AlphaDivisionEffect, AlphaMultiplicationEffect};
pub use blur::{blur_mip_level, BlurDirection, BlurEffect, SingleBlurPassEffect, NUM_TAPS};
pub use colorspace_conversion::ColorspaceConversionEffect;
pub use compute_output_display::ComputeShaderOutputDisplayEffect;
pub use dither::DitherEffect;
pub use gamma::{GammaCompressionEffect, GammaExpansionEffect};
pub use identity::IdentityEffect;
pub use mix::MixEffect;
pub use resize::ResizeEffect;
pub use ycbcr_conversion::YCbCrConversionEffect;
