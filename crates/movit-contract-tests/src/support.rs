//! Shared builders and structural checks for finalized chains.

use movit_runtime_glow::testing::{MockInput, MockProfile};
use movit_runtime_glow::{
    AlphaType, ChainConfig, Colorspace, EffectChain, GammaCurve, ImageFormat, NodeId,
    OutputAlphaFormat,
};

pub fn new_chain() -> EffectChain {
    EffectChain::new(ChainConfig::new(16.0, 9.0))
}

pub fn srgb_input(width: u32, height: u32) -> MockInput {
    MockInput::new(ImageFormat::SRGB, width, height)
}

/// A chain with an sRGB premultiplied RGBA output, ready for effects.
pub fn srgb_chain() -> EffectChain {
    let mut chain = new_chain();
    chain.add_output(ImageFormat::SRGB, OutputAlphaFormat::Premultiplied);
    chain
}

/// A compute shader that writes each pixel once.
pub fn compute_profile() -> MockProfile {
    MockProfile {
        is_compute_shader: true,
        one_to_one_sampling: false,
        strong_one_to_one_sampling: false,
        ..MockProfile::passthrough()
    }
}

pub fn enabled_of_type(chain: &EffectChain, type_id: &str) -> Vec<NodeId> {
    chain
        .graph()
        .enabled_ids()
        .filter(|&id| chain.effect(id).effect_type_id() == type_id)
        .collect()
}

pub fn sink(chain: &EffectChain) -> NodeId {
    let sinks = chain.graph().sinks();
    assert_eq!(sinks.len(), 1, "expected a single sink, got {sinks:?}");
    sinks[0]
}

/// Properties every finalized chain must have, whatever it computes.
pub fn assert_well_formed(chain: &EffectChain) {
    assert!(chain.is_finalized());
    let phases = chain.phases();
    assert!(!phases.is_empty(), "no phases");
    assert!(phases[0].inputs().is_empty(), "first phase reads another phase");

    for (p, phase) in phases.iter().enumerate() {
        assert!(
            phase.inputs().iter().all(|&q| q < p),
            "phase {p} reads a later phase: {:?}",
            phase.inputs()
        );
        assert!(phase.effects().contains(&phase.output_node()));
        assert!(!phase.shader().is_empty(), "phase {p} has no program text");
        for &id in phase.effects() {
            assert_eq!(chain.node(id).containing_phase(), Some(p));
        }
    }

    let graph = chain.graph();
    for id in graph.enabled_ids() {
        let node = chain.node(id);
        assert!(node.containing_phase().is_some(), "{id} is in no phase");
        assert_ne!(node.output_alpha_type(), AlphaType::Invalid, "{id}");
        assert_ne!(node.output_color_space(), Colorspace::Invalid, "{id}");
        assert_ne!(node.output_gamma_curve(), GammaCurve::Invalid, "{id}");
        if node.is_input() {
            continue;
        }

        let incoming = graph.incoming(id);
        assert_eq!(incoming.len(), node.incoming_link_types().len(), "{id}");
        let effect = chain.effect(id);
        for &dep in incoming {
            let d = chain.node(dep);
            if effect.needs_linear_light() {
                assert_eq!(
                    d.output_gamma_curve(),
                    GammaCurve::Linear,
                    "{} reads non-linear {dep}",
                    effect.effect_type_id()
                );
            }
            if effect.needs_srgb_primaries() {
                assert_eq!(
                    d.output_color_space(),
                    Colorspace::Srgb,
                    "{} reads non-sRGB {dep}",
                    effect.effect_type_id()
                );
            }
        }
    }
}
