//! movit runtime (glow/OpenGL backend)
//
// Builds a DAG of image effects, repairs colour space / gamma / alpha
// mismatches by inserting conversions, splits the result into as few GPU
// passes as possible and runs them.
//
// Nothing here owns a window or a GL context: the host makes a context
// current and passes `&glow::Context` (plus a `ContextId` for per-context
// objects) into every call that touches GL.
#![allow(clippy::missing_safety_doc)]

pub mod chain;
pub mod effect;
pub mod effects;
pub mod gl_util;
pub mod init;
pub mod inputs;
pub mod params;
pub mod resource_pool;
pub mod shaders;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chain::{
    DestinationTexture, EffectChain, GraphRewriter, LinkType, Node, Phase, PhaseTimingReport,
};
pub use effect::{AlphaHandling, Effect, EffectKind, Input, OutputSize, SetupContext};
pub use init::{capabilities, init_movit, Capabilities, GlslDialect};
pub use params::{Params, UniformValue};
pub use resource_pool::ResourcePool;

pub use movit_core::{
    AlphaType, ChainConfig, Colorspace, ContextId, EngineError, GammaCurve, ImageFormat,
    MipmapRequirements, OutputAlphaFormat, OutputOrigin, YCbCrFormat, YCbCrLumaCoefficients,
    YCbCrOutputSplitting, YCbCrOutputType,
};
pub use movit_graph::NodeId;
