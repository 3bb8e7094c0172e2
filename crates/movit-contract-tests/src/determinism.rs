#![forbid(unsafe_code)]

#[cfg(test)]
mod tests {
    use movit_runtime_glow::effects::{BlurEffect, MixEffect};
    use movit_runtime_glow::testing::MockEffect;
    use movit_runtime_glow::EffectChain;

    use crate::support::*;

    fn build() -> EffectChain {
        let mut chain = srgb_chain();
        let a = chain.add_input(srgb_input(64, 64));
        let b = chain.add_input(srgb_input(32, 18));
        let blurred = chain.add_effect_with_inputs(BlurEffect::new(), &[a]);
        let graded = chain.add_effect_with_inputs(MockEffect::plain(), &[b]);
        chain.add_effect_with_inputs(MixEffect::new(), &[blurred, graded]);
        chain.finalize();
        chain
    }

    /// Determinism contract:
    /// finalizing the same graph twice yields the same phases and programs.
    #[test]
    fn finalize_is_deterministic_for_same_graph() {
        let c1 = build();
        let c2 = build();
        assert_well_formed(&c1);

        assert_eq!(c1.phases().len(), c2.phases().len(), "phase count must be stable");
        for (p1, p2) in c1.phases().iter().zip(c2.phases()) {
            assert_eq!(p1.effects(), p2.effects(), "phase membership must be stable");
            assert_eq!(p1.inputs(), p2.inputs());
            assert_eq!(p1.shader(), p2.shader(), "program text must be stable");
            assert_eq!(p1.vertex_shader(), p2.vertex_shader());
        }
    }
}
