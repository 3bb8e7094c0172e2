//! Generated program text: defines, outputs and uniform declarations.

#[cfg(test)]
mod tests {
    use movit_core::IntermediateTransformation;
    use movit_runtime_glow::testing::{MockEffect, MockProfile};
    use movit_runtime_glow::{
        ChainConfig, EffectChain, ImageFormat, OutputAlphaFormat, OutputOrigin, YCbCrFormat,
        YCbCrOutputSplitting, YCbCrOutputType,
    };

    use crate::support::*;

    fn chain_with(config: ChainConfig) -> EffectChain {
        let mut chain = EffectChain::new(config);
        chain.add_output(ImageFormat::SRGB, OutputAlphaFormat::Premultiplied);
        chain
    }

    #[test]
    fn effect_uniforms_are_declared_with_the_effect_prefix() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();

        let shader = chain.phases()[0].shader();
        assert!(shader.contains("uniform float eff1_strength;"));
        assert!(shader.contains("eff1_strength"));
        assert!(!shader.contains("PREFIX(strength)"));
        assert!(shader.contains("#define INPUT eff1"));
        assert_eq!(chain.phases()[0].fragment_outputs(), &["FragColor".to_string()]);
    }

    #[test]
    fn linear_intermediates_are_stored_as_square_roots() {
        let mut config = ChainConfig::new(16.0, 9.0);
        config.intermediate_transformation = IntermediateTransformation::SquareRoot;
        let mut chain = chain_with(config);
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::plain());
        chain.add_effect(MockEffect::new(MockProfile {
            needs_texture_bounce: true,
            ..MockProfile::default()
        }));
        chain.finalize();

        assert_well_formed(&chain);
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert!(phases[0].shader().contains("#define SQUARE_ROOT_TRANSFORMATION 1"));
        assert!(phases[1].shader().contains("tmp.rgb *= tmp.rgb;"));
        // The caller's output is never transformed.
        assert!(!phases[1].shader().contains("#define SQUARE_ROOT_TRANSFORMATION 1"));
    }

    #[test]
    fn top_left_origin_flips_only_the_last_phase() {
        let mut config = ChainConfig::new(16.0, 9.0);
        config.output_origin = OutputOrigin::TopLeft;
        let mut chain = chain_with(config);
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.add_effect(MockEffect::new(MockProfile {
            needs_texture_bounce: true,
            ..MockProfile::passthrough()
        }));
        chain.finalize();

        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert!(phases[0].vertex_shader().contains("#define FLIP_ORIGIN 0"));
        assert!(phases[1].vertex_shader().contains("#define FLIP_ORIGIN 1"));
    }

    #[test]
    fn compute_output_is_flipped_once() {
        let mut config = ChainConfig::new(16.0, 9.0);
        config.output_origin = OutputOrigin::TopLeft;
        let mut chain = chain_with(config);
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(compute_profile()));
        chain.finalize();

        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert!(phases[0].shader().contains("#define FLIP_ORIGIN 1"));
        assert!(phases[1].vertex_shader().contains("#define FLIP_ORIGIN 0"));
    }

    #[test]
    fn planar_ycbcr_with_rgba_writes_four_targets() {
        let mut chain = new_chain();
        chain.add_ycbcr_output(
            ImageFormat::SRGB,
            OutputAlphaFormat::Premultiplied,
            YCbCrFormat::default(),
            YCbCrOutputSplitting::Planar,
            YCbCrOutputType::UnsignedByte,
        );
        chain.add_output(ImageFormat::SRGB, OutputAlphaFormat::Premultiplied);
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();

        let phase = &chain.phases()[0];
        let outputs: Vec<&str> = phase.fragment_outputs().iter().map(String::as_str).collect();
        assert_eq!(outputs, ["Y", "Cb", "Cr", "RGBA"]);
        assert!(phase.shader().contains("#define YCBCR_OUTPUT_PLANAR 1"));
        assert!(phase.shader().contains("#define YCBCR_ALSO_OUTPUT_RGBA 1"));
    }

    #[test]
    fn two_ycbcr_outputs_may_split_differently() {
        let mut chain = new_chain();
        for splitting in [YCbCrOutputSplitting::SplitYAndCbCr, YCbCrOutputSplitting::Interleaved] {
            chain.add_ycbcr_output(
                ImageFormat::SRGB,
                OutputAlphaFormat::Premultiplied,
                YCbCrFormat::default(),
                splitting,
                YCbCrOutputType::UnsignedByte,
            );
        }
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();

        let phase = &chain.phases()[0];
        let outputs: Vec<&str> = phase.fragment_outputs().iter().map(String::as_str).collect();
        assert_eq!(outputs, ["Y", "Chroma", "YCbCr2"]);
        assert!(phase.shader().contains("#define SECOND_YCBCR_OUTPUT_INTERLEAVED 1"));
    }

    #[test]
    fn intermediate_phases_write_a_single_colour_target() {
        let mut chain = new_chain();
        chain.add_ycbcr_output(
            ImageFormat::SRGB,
            OutputAlphaFormat::Premultiplied,
            YCbCrFormat::default(),
            YCbCrOutputSplitting::Planar,
            YCbCrOutputType::UnsignedByte,
        );
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.add_effect(MockEffect::new(MockProfile {
            needs_texture_bounce: true,
            ..MockProfile::passthrough()
        }));
        chain.finalize();

        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].fragment_outputs(), &["FragColor".to_string()]);
        assert_eq!(phases[1].fragment_outputs().len(), 3);
    }
}
