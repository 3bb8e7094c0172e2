//! Conversion insertion: the compiler must make every edge agree on colour
//! space, gamma and alpha, and deliver the requested output format.

#[cfg(test)]
mod tests {
    use movit_runtime_glow::effects::{BlurEffect, YCbCrConversionEffect};
    use movit_runtime_glow::testing::{MockEffect, MockInput, MockProfile};
    use movit_runtime_glow::{
        AlphaHandling, AlphaType, Colorspace, GammaCurve, ImageFormat, OutputAlphaFormat,
        YCbCrFormat, YCbCrLumaCoefficients, YCbCrOutputSplitting, YCbCrOutputType,
    };

    use crate::support::*;

    #[test]
    fn passthrough_chain_needs_no_conversions() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();

        assert_well_formed(&chain);
        assert_eq!(chain.graph().enabled_ids().count(), 2);
        assert_eq!(chain.phases().len(), 1);
    }

    #[test]
    fn linear_effect_on_srgb_input_is_wrapped_in_gamma_conversions() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        let effect = chain.add_effect(MockEffect::plain());
        chain.finalize();

        assert_well_formed(&chain);
        assert_eq!(enabled_of_type(&chain, "GammaExpansionEffect").len(), 1);
        assert_eq!(enabled_of_type(&chain, "GammaCompressionEffect").len(), 1);
        assert_eq!(chain.node(effect).output_gamma_curve(), GammaCurve::Linear);

        let out = sink(&chain);
        assert_eq!(chain.effect(out).effect_type_id(), "GammaCompressionEffect");
        assert_eq!(chain.node(out).output_gamma_curve(), GammaCurve::Srgb);
    }

    #[test]
    fn input_that_can_decode_is_asked_for_linear_light() {
        let mut chain = srgb_chain();
        let input = chain.add_input(srgb_input(64, 64).with_linear_gamma_output(true));
        chain.add_effect(MockEffect::plain());
        chain.finalize();

        assert_well_formed(&chain);
        assert!(enabled_of_type(&chain, "GammaExpansionEffect").is_empty());
        assert!(chain
            .effect_as::<MockInput>(input)
            .is_some_and(|i| i.outputs_linear_gamma()));
        assert_eq!(chain.node(input).output_gamma_curve(), GammaCurve::Linear);
    }

    #[test]
    fn foreign_primaries_are_converted_before_an_srgb_effect() {
        let mut chain = srgb_chain();
        let format = ImageFormat {
            color_space: Colorspace::Rec601_625,
            gamma_curve: GammaCurve::Srgb,
        };
        chain.add_input(MockInput::new(format, 64, 64));
        let effect = chain.add_effect(MockEffect::plain());
        chain.finalize();

        assert_well_formed(&chain);
        let conversions = enabled_of_type(&chain, "ColorspaceConversionEffect");
        assert_eq!(conversions.len(), 1);
        assert_eq!(chain.node(conversions[0]).output_color_space(), Colorspace::Srgb);
        assert_eq!(chain.node(effect).output_color_space(), Colorspace::Srgb);
    }

    #[test]
    fn output_colour_space_is_converted_at_the_end() {
        let mut chain = new_chain();
        let format = ImageFormat {
            color_space: Colorspace::Rec601_625,
            gamma_curve: GammaCurve::Srgb,
        };
        chain.add_output(format, OutputAlphaFormat::Premultiplied);
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();

        assert_well_formed(&chain);
        assert_eq!(enabled_of_type(&chain, "ColorspaceConversionEffect").len(), 1);
        let out = chain.node(sink(&chain));
        assert_eq!(out.output_color_space(), Colorspace::Rec601_625);
        assert_eq!(out.output_gamma_curve(), GammaCurve::Srgb);
    }

    #[test]
    fn postmultiplied_input_is_multiplied_for_a_premultiplied_effect() {
        let mut chain = srgb_chain();
        chain.add_input(
            srgb_input(64, 64).with_alpha(AlphaHandling::OutputPostmultipliedAlpha),
        );
        let effect = chain.add_effect(MockEffect::plain());
        chain.finalize();

        assert_well_formed(&chain);
        assert_eq!(enabled_of_type(&chain, "AlphaMultiplicationEffect").len(), 1);
        assert_eq!(chain.node(effect).output_alpha_type(), AlphaType::Premultiplied);
    }

    #[test]
    fn postmultiplied_output_divides_alpha() {
        let mut chain = new_chain();
        chain.add_output(ImageFormat::LINEAR_SRGB, OutputAlphaFormat::Postmultiplied);
        chain.add_input(
            MockInput::new(ImageFormat::LINEAR_SRGB, 64, 64)
                .with_alpha(AlphaHandling::InputAndOutputPremultipliedAlpha),
        );
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();

        assert_well_formed(&chain);
        let out = sink(&chain);
        assert_eq!(chain.effect(out).effect_type_id(), "AlphaDivisionEffect");
        assert_eq!(chain.node(out).output_alpha_type(), AlphaType::Postmultiplied);
        assert!(enabled_of_type(&chain, "GammaCompressionEffect").is_empty());
    }

    #[test]
    fn blank_alpha_survives_a_keep_blank_effect() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        let effect = chain.add_effect(MockEffect::new(MockProfile {
            alpha_handling: AlphaHandling::InputPremultipliedAlphaKeepBlank,
            ..MockProfile::default()
        }));
        chain.finalize();

        assert_well_formed(&chain);
        assert_eq!(chain.node(effect).output_alpha_type(), AlphaType::Blank);
        assert!(enabled_of_type(&chain, "AlphaDivisionEffect").is_empty());
    }

    #[test]
    fn ycbcr_conversion_and_dither_close_the_chain() {
        let mut chain = new_chain();
        chain.add_ycbcr_output(
            ImageFormat::SRGB,
            OutputAlphaFormat::Premultiplied,
            YCbCrFormat::default(),
            YCbCrOutputSplitting::Interleaved,
            YCbCrOutputType::UnsignedByte,
        );
        chain.set_dither_bits(8);
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();

        assert_well_formed(&chain);
        let ycbcr = chain.ycbcr_conversion_node().unwrap();
        let dither = chain.dither_node().unwrap();
        assert_eq!(sink(&chain), dither);
        assert_eq!(chain.graph().incoming(dither), &[ycbcr]);
        assert_eq!(chain.phases().len(), 1);
    }

    #[test]
    fn ycbcr_format_can_change_after_finalize() {
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
        chain.finalize();

        let shader_before = chain.phases()[0].shader().to_string();
        let rec709 = YCbCrFormat {
            luma_coefficients: YCbCrLumaCoefficients::Rec709,
            full_range: true,
            ..YCbCrFormat::default()
        };
        chain.change_ycbcr_output_format(rec709);

        let node = chain.ycbcr_conversion_node().unwrap();
        let conv = chain.effect_as::<YCbCrConversionEffect>(node).unwrap();
        assert_eq!(conv.format(), &rec709);
        assert_eq!(chain.config().ycbcr_outputs[0].ycbcr_format, rec709);
        assert_eq!(chain.phases()[0].shader(), shader_before);
    }

    #[test]
    fn blur_rewrites_into_two_passes_and_forwards_radius() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        let blur = chain.add_effect(BlurEffect::new());
        chain.finalize();

        assert_well_formed(&chain);
        assert!(chain.graph().is_disabled(blur));
        let passes = enabled_of_type(&chain, "SingleBlurPassEffect");
        assert_eq!(passes.len(), 2);

        assert!(chain.set_float(blur, "radius", 5.0));
        for pass in passes {
            assert_eq!(chain.effect(pass).params().float("radius"), 5.0);
        }
        assert!(!chain.set_float(blur, "radius", -1.0));
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        let effect = chain.add_effect(MockEffect::plain());
        assert!(chain.set_float(effect, "strength", 0.5));
        assert!(!chain.set_float(effect, "no_such_param", 0.5));
        assert!(!chain.set_int(effect, "strength", 1));
    }

    #[test]
    #[should_panic(expected = "finalize called twice")]
    fn finalize_twice_panics() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.finalize();
        chain.finalize();
    }

    #[test]
    #[should_panic(expected = "exactly one node")]
    fn two_sinks_panic() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.add_input(srgb_input(32, 32));
        chain.finalize();
    }

    #[test]
    #[should_panic(expected = "at least one output")]
    fn chain_without_output_panics() {
        let mut chain = new_chain();
        chain.add_input(srgb_input(64, 64));
        chain.finalize();
    }

    #[test]
    #[should_panic(expected = "after finalize")]
    fn adding_effects_after_finalize_panics() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.finalize();
        let _ = chain.add_effect(MockEffect::new(MockProfile::passthrough()));
    }
}
