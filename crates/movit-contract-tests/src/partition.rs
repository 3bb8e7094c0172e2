//! Phase splitting: where the compiler must (and must not) put a texture
//! bounce between two effects.

#[cfg(test)]
mod tests {
    use movit_runtime_glow::testing::{MockEffect, MockInput, MockProfile};
    use movit_runtime_glow::{
        EffectKind, LinkType, MipmapRequirements, OutputSize,
    };

    use crate::support::*;

    fn bouncing() -> MockProfile {
        MockProfile {
            needs_texture_bounce: true,
            ..MockProfile::passthrough()
        }
    }

    #[test]
    fn texture_bounce_starts_a_new_phase() {
        let mut chain = srgb_chain();
        let input = chain.add_input(srgb_input(64, 64));
        let a = chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        let b = chain.add_effect(MockEffect::new(bouncing()));
        chain.finalize();

        assert_well_formed(&chain);
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].effects(), &[input, a]);
        assert_eq!(phases[1].effects(), &[b]);
        assert_eq!(phases[1].inputs(), &[0]);
        assert_eq!(chain.node(b).incoming_link_types(), &[LinkType::InAnotherPhase]);
        assert_eq!(chain.node(a).incoming_link_types(), &[LinkType::InSamePhase]);
    }

    #[test]
    fn bounce_directly_on_an_input_reads_it_in_place() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(bouncing()));
        chain.finalize();

        assert_well_formed(&chain);
        assert_eq!(chain.phases().len(), 1);
    }

    #[test]
    fn fan_out_of_a_computed_node_is_rendered_once() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        let a = chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        let b = chain.add_effect_with_inputs(MockEffect::new(MockProfile::passthrough()), &[a]);
        let c = chain.add_effect_with_inputs(MockEffect::new(MockProfile::passthrough()), &[a]);
        let mix = chain.add_effect_with_inputs(
            MockEffect::new(MockProfile {
                num_inputs: 2,
                ..MockProfile::passthrough()
            }),
            &[b, c],
        );
        chain.finalize();

        assert_well_formed(&chain);
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].output_node(), a);
        assert_eq!(phases[1].output_node(), mix);
        // Both readers share one input texture.
        assert_eq!(phases[1].inputs(), &[0]);
    }

    #[test]
    fn fan_out_of_a_single_texture_input_stays_in_one_phase() {
        let mut chain = srgb_chain();
        let input = chain.add_input(srgb_input(64, 64));
        let b = chain.add_effect_with_inputs(MockEffect::new(MockProfile::passthrough()), &[input]);
        let c = chain.add_effect_with_inputs(MockEffect::new(MockProfile::passthrough()), &[input]);
        chain.add_effect_with_inputs(
            MockEffect::new(MockProfile {
                num_inputs: 2,
                ..MockProfile::passthrough()
            }),
            &[b, c],
        );
        chain.finalize();

        assert_well_formed(&chain);
        let phases = chain.phases();
        assert_eq!(phases.len(), 1);
        let inputs = phases[0].effects().iter().filter(|&&id| id == input).count();
        assert_eq!(inputs, 1);
        assert!(phases[0].shader().contains("#define INPUT2"));
    }

    #[test]
    fn mipmap_conflict_splits_and_asks_the_input_for_mipmaps() {
        let mut chain = srgb_chain();
        let input = chain.add_input(srgb_input(64, 64));
        let a = chain.add_effect(MockEffect::new(MockProfile {
            needs_mipmaps: MipmapRequirements::NeedsMipmaps,
            ..MockProfile::passthrough()
        }));
        let b = chain.add_effect(MockEffect::new(MockProfile {
            needs_mipmaps: MipmapRequirements::CannotAcceptMipmaps,
            ..MockProfile::passthrough()
        }));
        chain.finalize();

        assert_well_formed(&chain);
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].effects(), &[input, a]);
        assert_eq!(phases[1].effects(), &[b]);
        assert_eq!(chain.node(input).needs_mipmaps(), MipmapRequirements::NeedsMipmaps);
        assert!(chain
            .effect_as::<MockInput>(input)
            .is_some_and(|i| i.mipmaps_requested()));
    }

    #[test]
    fn input_without_mipmaps_gets_a_phase_of_its_own() {
        let mut chain = srgb_chain();
        let input = chain.add_input(srgb_input(64, 64).with_mipmap_support(false));
        let a = chain.add_effect(MockEffect::new(MockProfile {
            needs_mipmaps: MipmapRequirements::NeedsMipmaps,
            ..MockProfile::passthrough()
        }));
        chain.finalize();

        assert_well_formed(&chain);
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].effects(), &[input]);
        assert_eq!(phases[1].effects(), &[a]);
        assert!(chain
            .effect_as::<MockInput>(input)
            .is_some_and(|i| !i.mipmaps_requested()));
    }

    #[test]
    fn size_change_splits_unless_the_reader_is_one_to_one() {
        let resizer = MockProfile {
            output_size: Some(OutputSize::exact(32, 32)),
            one_to_one_sampling: false,
            strong_one_to_one_sampling: false,
            ..MockProfile::passthrough()
        };
        let sampler = MockProfile {
            one_to_one_sampling: false,
            strong_one_to_one_sampling: false,
            ..MockProfile::passthrough()
        };

        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(resizer.clone()));
        chain.add_effect(MockEffect::new(sampler));
        chain.finalize();
        assert_well_formed(&chain);
        assert_eq!(chain.phases().len(), 2);

        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(resizer));
        chain.add_effect(MockEffect::new(MockProfile::passthrough()));
        chain.finalize();
        assert_well_formed(&chain);
        assert_eq!(chain.phases().len(), 1);
    }

    #[test]
    fn trailing_compute_shader_gets_a_display_phase() {
        let mut chain = srgb_chain();
        let input = chain.add_input(srgb_input(64, 64));
        let cs = chain.add_effect(MockEffect::new(compute_profile()));
        chain.finalize();

        assert_well_formed(&chain);
        assert!(chain.has_dummy_effect());
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);

        assert!(phases[0].is_compute_shader());
        assert_eq!(phases[0].compute_shader_node(), Some(cs));
        assert_eq!(phases[0].effects(), &[input, cs]);
        assert!(phases[0].vertex_shader().is_empty());
        assert!(phases[0].fragment_outputs().is_empty());
        assert!(phases[0].shader().contains("#define CS_OUTPUT_SIZE eff1_output_size"));

        let display = phases[1].output_node();
        assert_eq!(chain.node(display).kind(), EffectKind::ComputeShaderOutputDisplay);
        assert!(!phases[1].is_compute_shader());
        assert_eq!(phases[1].fragment_outputs(), &["FragColor".to_string()]);
    }

    #[test]
    fn mix_after_a_compute_shader_gets_a_display_phase() {
        let mut chain = srgb_chain();
        let a = chain.add_input(srgb_input(64, 64));
        let cs = chain.add_effect_with_inputs(MockEffect::new(compute_profile()), &[a]);
        let b = chain.add_input(srgb_input(64, 64));
        let mix = chain.add_effect_with_inputs(
            MockEffect::new(MockProfile {
                num_inputs: 2,
                ..MockProfile::passthrough()
            }),
            &[cs, b],
        );
        chain.finalize();

        assert_well_formed(&chain);
        assert!(chain.has_dummy_effect());
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert!(phases[0].is_compute_shader());
        assert_eq!(phases[0].compute_shader_node(), Some(cs));
        assert_eq!(phases[0].output_node(), mix);
        assert!(phases[0].shader().contains("#define INPUT1(tc) CS_OUTPUT_VAL"));

        let display = phases[1].output_node();
        assert_eq!(chain.node(display).kind(), EffectKind::ComputeShaderOutputDisplay);
        assert!(!phases[1].is_compute_shader());
        assert_eq!(chain.graph().incoming(display), &[mix]);
    }

    #[test]
    fn display_phase_is_dropped_when_compute_is_not_last() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        let cs = chain.add_effect(MockEffect::new(compute_profile()));
        let after = chain.add_effect(MockEffect::new(bouncing()));
        chain.finalize();

        assert_well_formed(&chain);
        // The display pass was added for the compute shader, then dropped.
        let display: Vec<_> = chain
            .graph()
            .ids()
            .filter(|&id| chain.node(id).kind() == EffectKind::ComputeShaderOutputDisplay)
            .collect();
        assert_eq!(display.len(), 1);
        assert!(chain.graph().is_disabled(display[0]));
        assert!(chain.node(display[0]).containing_phase().is_none());
        assert!(!chain.has_dummy_effect());
        assert!(enabled_of_type(&chain, "ComputeShaderOutputDisplayEffect").is_empty());
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].compute_shader_node(), Some(cs));
        assert_eq!(phases[1].output_node(), after);
        assert_eq!(sink(&chain), after);
    }

    #[test]
    fn compute_shader_inside_the_chain_is_not_followed_by_a_display() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        chain.add_effect(MockEffect::new(compute_profile()));
        let reader = chain.add_effect(MockEffect::new(MockProfile {
            one_to_one_sampling: false,
            strong_one_to_one_sampling: false,
            ..MockProfile::passthrough()
        }));
        chain.finalize();

        assert_well_formed(&chain);
        assert!(!chain.has_dummy_effect());
        let phases = chain.phases();
        assert_eq!(phases.len(), 2);
        assert!(phases[0].is_compute_shader());
        assert_eq!(phases[1].effects(), &[reader]);
    }

    #[test]
    fn every_effect_contributes_its_shader_once() {
        let mut chain = srgb_chain();
        chain.add_input(srgb_input(64, 64));
        let a = chain.add_effect(MockEffect::plain());
        let b = chain.add_effect(MockEffect::new(bouncing()));
        chain.finalize();

        for id in [a, b] {
            let mock = chain.effect_as::<MockEffect>(id).unwrap();
            assert_eq!(mock.shader_requests(), 1);
        }
    }
}
