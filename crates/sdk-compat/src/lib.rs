//! Compile-only compatibility crate.
//!
//! This crate exists to ensure the public SDK surface remains usable by third-party
//! consumers. It is not shipped or run; it must only build.

use movit_core::{ChainConfig, ImageFormat, OutputAlphaFormat, YCbCrFormat};
use movit_graph::Graph;
use movit_runtime::{replace_prefix, size_rectangle_to_fit};
use movit_runtime_glow::effects::{BlurEffect, MixEffect};
use movit_runtime_glow::inputs::{FlatInput, FlatPixelFormat};
use movit_runtime_glow::{EffectChain, YCbCrOutputSplitting, YCbCrOutputType};

#[allow(dead_code)]
pub fn _compile_witness() {
    // A chain builds and finalizes using only public APIs; no GL needed.
    let mut chain = EffectChain::new(ChainConfig::new(16.0, 9.0));
    let a = chain.add_input(FlatInput::new(
        ImageFormat::SRGB,
        FlatPixelFormat::RgbaPostmultiplied,
        false,
        1280,
        720,
    ));
    let b = chain.add_input(FlatInput::new(
        ImageFormat::SRGB,
        FlatPixelFormat::Rgb,
        false,
        1280,
        720,
    ));
    let blurred = chain.add_effect_with_inputs(BlurEffect::new(), &[a]);
    let mix = chain.add_effect_with_inputs(MixEffect::new(), &[blurred, b]);
    chain.add_output(ImageFormat::SRGB, OutputAlphaFormat::Postmultiplied);
    chain.add_ycbcr_output(
        ImageFormat::SRGB,
        OutputAlphaFormat::Postmultiplied,
        YCbCrFormat::default(),
        YCbCrOutputSplitting::Planar,
        YCbCrOutputType::UnsignedByte,
    );
    chain.set_dither_bits(8);
    chain.finalize();

    // Parameters stay settable after finalize.
    let _ = chain.set_float(blurred, "radius", 4.0);
    let _ = chain.set_float(mix, "strength_first", 0.5);
    if let Some(input) = chain.effect_as_mut::<FlatInput>(a) {
        input.set_size(640, 360);
    }
    let _phases = chain.phases().len();

    // Pure helpers remain callable on their own.
    let _fit = size_rectangle_to_fit(640, 480, 16.0, 9.0, (0, 0));
    let _glsl = replace_prefix("PREFIX(strength)", "eff0");
    let _empty: Graph<()> = Graph::new();
}
