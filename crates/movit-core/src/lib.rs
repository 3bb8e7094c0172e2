#![forbid(unsafe_code)]

//! Shared vocabulary for the movit crates.
//!
//! This crate holds no GL handles. It defines the engine error type, the
//! colour/alpha/Y'CbCr vocabulary every effect and the pipeline compiler speak,
//! and the serde-backed chain configuration.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod format;
pub mod settings;

pub use error::EngineError;

pub use config::{
    load_typed_json, ChainConfig, IntermediateTransformation, OutputAlphaFormat, OutputOrigin,
    RgbaOutputConfig, YCbCrOutputConfig, GL_RGBA16F, MAX_DITHER_BITS, MAX_YCBCR_OUTPUTS,
};
pub use format::{
    AlphaType, ChromaSiting, Colorspace, GammaCurve, ImageFormat, MipmapRequirements,
    YCbCrFormat, YCbCrLumaCoefficients, YCbCrOutputSplitting, YCbCrOutputType,
};
pub use settings::{ContextId, DebugLevel, MovitSettings};
