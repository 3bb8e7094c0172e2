//! Graph rewriting, metadata propagation and invariant repair.

use movit_core::{AlphaType, Colorspace, GammaCurve, OutputAlphaFormat};
use movit_graph::NodeId;

use super::{add_node, EffectChain, GraphRewriter};
use crate::effect::{AlphaHandling, Effect, EffectKind};
use crate::effects::{
    AlphaDivisionEffect, AlphaMultiplicationEffect, ColorspaceConversionEffect,
    ComputeShaderOutputDisplayEffect, DitherEffect, GammaCompressionEffect, GammaExpansionEffect,
    YCbCrConversionEffect,
};

/// Fix-point loops give up after this many passes.
const MAX_REPAIR_PASSES: u32 = 100;

/// Value every incoming edge agrees on, if any.
fn unanimous<T: Copy + PartialEq>(mut values: impl Iterator<Item = T>) -> Option<T> {
    let first = values.next()?;
    values.all(|v| v == first).then_some(first)
}

impl EffectChain {
    /// Compile the graph into phases. Must be called exactly once, after every
    /// input, effect and output has been added.
    pub fn finalize(&mut self) {
        assert!(!self.finalized, "finalize called twice");
        if let Err(e) = self.config.validate() {
            panic!("finalize: {e}");
        }
        tracing::debug!(nodes = self.graph.len(), "finalizing chain");

        self.output_dot("step0-start");

        self.rewrite_graph();
        self.output_dot("step1-rewritten");

        self.find_color_spaces_for_inputs();
        self.output_dot("step2-input-colorspace");

        self.propagate_alpha();
        self.output_dot("step3-propagated-alpha");

        self.propagate_gamma_and_color_space();
        self.output_dot("step4-propagated-all");

        self.fix_internal_color_spaces();
        self.fix_internal_alpha(6);
        self.fix_output_color_space();
        self.output_dot("step7-output-colorspacefix");
        self.fix_output_alpha();
        self.output_dot("step8-output-alphafix");

        // Colour space conversions can create new needs for gamma conversion,
        // and gamma conversions new needs for alpha conversion.
        self.fix_internal_gamma_by_asking_inputs(9);
        self.fix_internal_gamma_by_inserting_nodes(10);
        self.fix_output_gamma();
        self.output_dot("step11-output-gammafix");
        self.propagate_alpha();
        self.output_dot("step12-output-alpha-propagated");
        self.fix_internal_alpha(13);
        self.output_dot("step14-output-alpha-fixed");
        self.fix_internal_gamma_by_asking_inputs(15);
        self.fix_internal_gamma_by_inserting_nodes(16);

        self.output_dot("step17-before-ycbcr");
        self.add_ycbcr_conversion_if_needed();

        self.output_dot("step18-before-dither");
        self.add_dither_if_needed();

        self.output_dot("step19-before-dummy-effect");
        self.add_dummy_effect_if_needed();

        self.output_dot("step20-final");

        let output = self.find_output_node();
        self.partition(output);
        self.output_dot("step21-split-to-phases");

        self.remove_unneeded_dummy_phase();
        assert!(
            self.phases[0].inputs.is_empty(),
            "the first phase cannot depend on another phase"
        );
        self.generate_all_glsl();

        self.finalized = true;
        tracing::debug!(phases = self.phases.len(), "chain finalized");
    }

    /// Enabled nodes, senders before receivers.
    pub(super) fn sorted_nodes(&self) -> Vec<NodeId> {
        let enabled: Vec<NodeId> = self.graph.enabled_ids().collect();
        self.graph.topological_sort(&enabled)
    }

    /// The single enabled node without outgoing edges.
    pub(super) fn find_output_node(&self) -> NodeId {
        let sinks = self.graph.sinks();
        assert_eq!(
            sinks.len(),
            1,
            "the chain must end in exactly one node, found {}",
            sinks.len()
        );
        sinks[0]
    }

    /// Let every node (including those added on the way) replace itself by a
    /// sub-graph.
    fn rewrite_graph(&mut self) {
        let mut i = 0;
        while i < self.graph.len() {
            let id = NodeId(i as u32);
            i += 1;
            if self.graph.is_disabled(id) {
                continue;
            }
            let Some(mut effect) = self.graph.get_mut(id).effect.take() else {
                continue;
            };
            effect.rewrite_graph(&mut GraphRewriter::new(&mut self.graph), id);
            self.graph.get_mut(id).effect = Some(effect);
        }
    }

    fn find_color_spaces_for_inputs(&mut self) {
        let ids: Vec<NodeId> = self.graph.enabled_ids().collect();
        for id in ids {
            let node = self.graph.get_mut(id);
            if !node.is_input() {
                continue;
            }
            let effect = node.effect();
            let Some(input) = effect.as_input() else {
                panic!("{} has no inputs but is not an Input", effect.effect_type_id());
            };
            let color_space = input.color_space();
            let gamma_curve = input.gamma_curve();
            let alpha_type = match effect.alpha_handling() {
                AlphaHandling::OutputBlankAlpha => AlphaType::Blank,
                AlphaHandling::InputAndOutputPremultipliedAlpha => AlphaType::Premultiplied,
                AlphaHandling::OutputPostmultipliedAlpha => AlphaType::Postmultiplied,
                other => panic!(
                    "input {} cannot use alpha handling {other:?}",
                    effect.effect_type_id()
                ),
            };
            if alpha_type == AlphaType::Premultiplied {
                assert_eq!(
                    gamma_curve,
                    GammaCurve::Linear,
                    "premultiplied input {id} must be in linear light"
                );
            }
            node.output_color_space = color_space;
            node.output_gamma_curve = gamma_curve;
            node.output_alpha_type = alpha_type;
        }
    }

    /// Inputs keep their values; conversion effects report what they convert
    /// to; everything else inherits a value all its inputs agree on.
    pub(super) fn propagate_gamma_and_color_space(&mut self) {
        for id in self.sorted_nodes() {
            if self.graph.incoming(id).is_empty() {
                continue;
            }
            let kind = self.graph.get(id).kind();
            let params = self.graph.get(id).effect().params();

            let color_space = if kind == EffectKind::ColorspaceConversion {
                Colorspace::from_i32(params.int("destination_space")).unwrap_or(Colorspace::Invalid)
            } else {
                unanimous(
                    self.graph
                        .incoming(id)
                        .iter()
                        .map(|&s| self.graph.get(s).output_color_space),
                )
                .unwrap_or(Colorspace::Invalid)
            };

            let gamma_curve = match kind {
                EffectKind::GammaExpansion => GammaCurve::Linear,
                EffectKind::GammaCompression => {
                    GammaCurve::from_i32(params.int("destination_curve"))
                        .unwrap_or(GammaCurve::Invalid)
                }
                _ => unanimous(
                    self.graph
                        .incoming(id)
                        .iter()
                        .map(|&s| self.graph.get(s).output_gamma_curve),
                )
                .unwrap_or(GammaCurve::Invalid),
            };

            let node = self.graph.get_mut(id);
            node.output_color_space = color_space;
            node.output_gamma_curve = gamma_curve;
        }
    }

    pub(super) fn propagate_alpha(&mut self) {
        for id in self.sorted_nodes() {
            let incoming: Vec<AlphaType> = self
                .graph
                .incoming(id)
                .iter()
                .map(|&s| self.graph.get(s).output_alpha_type)
                .collect();
            if incoming.is_empty() {
                assert_ne!(
                    self.graph.get(id).output_alpha_type,
                    AlphaType::Invalid,
                    "input {id} has no alpha type"
                );
                continue;
            }
            let alpha = self.alpha_for(id, &incoming);
            self.graph.get_mut(id).output_alpha_type = alpha;
        }
    }

    fn alpha_for(&self, id: NodeId, incoming: &[AlphaType]) -> AlphaType {
        let effect = self.graph.get(id).effect();
        match effect.kind() {
            EffectKind::AlphaMultiplication => {
                assert_eq!(incoming, [AlphaType::Postmultiplied]);
                return AlphaType::Premultiplied;
            }
            EffectKind::AlphaDivision => {
                assert_eq!(incoming, [AlphaType::Premultiplied]);
                return AlphaType::Postmultiplied;
            }
            // The only effects that need postmultiplied input.
            kind if kind.is_gamma_conversion() => {
                assert_eq!(incoming.len(), 1);
                return match incoming[0] {
                    AlphaType::Blank => AlphaType::Blank,
                    AlphaType::Postmultiplied => AlphaType::Postmultiplied,
                    _ => AlphaType::Invalid,
                };
            }
            _ => {}
        }

        let handling = effect.alpha_handling();
        assert!(
            matches!(
                handling,
                AlphaHandling::InputAndOutputPremultipliedAlpha
                    | AlphaHandling::InputPremultipliedAlphaKeepBlank
                    | AlphaHandling::DontCareAlphaType
            ),
            "only inputs can produce alpha unconditionally ({})",
            effect.effect_type_id()
        );

        let any_premultiplied = incoming.contains(&AlphaType::Premultiplied);
        let any_postmultiplied = incoming.contains(&AlphaType::Postmultiplied);
        if incoming.contains(&AlphaType::Invalid) || (any_premultiplied && any_postmultiplied) {
            return AlphaType::Invalid;
        }

        match handling {
            AlphaHandling::DontCareAlphaType => {
                if any_premultiplied {
                    AlphaType::Premultiplied
                } else if any_postmultiplied {
                    AlphaType::Postmultiplied
                } else {
                    AlphaType::Blank
                }
            }
            _ => {
                // Premultiplied alpha on nonlinear values is meaningless.
                assert!(
                    effect.needs_linear_light(),
                    "{} wants premultiplied alpha but not linear light",
                    effect.effect_type_id()
                );
                if any_postmultiplied {
                    AlphaType::Invalid
                } else if !any_premultiplied
                    && handling == AlphaHandling::InputPremultipliedAlphaKeepBlank
                {
                    AlphaType::Blank
                } else {
                    AlphaType::Premultiplied
                }
            }
        }
    }

    fn add_conversion(&mut self, effect: impl Effect + 'static) -> NodeId {
        add_node(&mut self.graph, Box::new(effect))
    }

    /// Route every outgoing edge of `input` through a new `effect` node.
    fn insert_after(&mut self, input: NodeId, effect: impl Effect + 'static) -> NodeId {
        let conversion = self.add_conversion(effect);
        self.graph.replace_sender(input, conversion);
        self.graph.connect(input, conversion);
        conversion
    }

    /// Append `effect` after the current output node.
    fn append_to_output(&mut self, effect: impl Effect + 'static) -> NodeId {
        let output = self.find_output_node();
        let node = self.add_conversion(effect);
        self.graph.connect(output, node);
        self.propagate_alpha();
        self.propagate_gamma_and_color_space();
        node
    }

    fn node_needs_colorspace_fix(&self, id: NodeId) -> bool {
        let node = self.graph.get(id);
        if self.graph.is_disabled(id) || node.is_input() {
            return false;
        }
        node.output_color_space == Colorspace::Invalid
            || (node.effect().needs_srgb_primaries()
                && node.output_color_space != Colorspace::Srgb)
    }

    /// Convert every non-sRGB input of a node that needs sRGB primaries (or
    /// whose inputs disagree) to sRGB.
    fn fix_internal_color_spaces(&mut self) {
        let mut pass = 0;
        loop {
            let Some(id) = self
                .sorted_nodes()
                .into_iter()
                .find(|&n| self.node_needs_colorspace_fix(n))
            else {
                break;
            };
            for input in self.graph.incoming(id).to_vec() {
                let space = self.graph.get(input).output_color_space;
                assert_ne!(space, Colorspace::Invalid, "input {input} has no colour space");
                if space == Colorspace::Srgb || !self.graph.outgoing(input).contains(&id) {
                    continue;
                }
                let conversion =
                    self.insert_after(input, ColorspaceConversionEffect::new(space, Colorspace::Srgb));
                self.graph.get_mut(conversion).output_color_space = Colorspace::Srgb;
            }
            self.propagate_gamma_and_color_space();

            pass += 1;
            self.output_dot(&format!("step5-colorspacefix-iter{pass}"));
            assert!(pass < MAX_REPAIR_PASSES, "colour space repair does not converge");
        }
    }

    fn node_needs_alpha_fix(&self, id: NodeId) -> bool {
        let node = self.graph.get(id);
        !self.graph.is_disabled(id)
            && !node.is_input()
            && node.output_alpha_type == AlphaType::Invalid
    }

    /// Multiply or divide alpha on the inputs of every node whose alpha type
    /// is invalid.
    fn fix_internal_alpha(&mut self, step: u32) {
        let mut pass = 0;
        loop {
            let Some(id) = self
                .sorted_nodes()
                .into_iter()
                .find(|&n| self.node_needs_alpha_fix(n))
            else {
                break;
            };
            let kind = self.graph.get(id).kind();
            assert_ne!(
                kind,
                EffectKind::GammaExpansion,
                "gamma expansion cannot take premultiplied alpha"
            );
            let desired = if kind == EffectKind::GammaCompression {
                AlphaType::Postmultiplied
            } else {
                AlphaType::Premultiplied
            };

            for input in self.graph.incoming(id).to_vec() {
                let alpha = self.graph.get(input).output_alpha_type;
                assert_ne!(alpha, AlphaType::Invalid, "input {input} has no alpha type");
                if alpha == desired || alpha == AlphaType::Blank {
                    continue;
                }
                if !self.graph.outgoing(input).contains(&id) {
                    continue;
                }
                let conversion = if desired == AlphaType::Premultiplied {
                    self.insert_after(input, AlphaMultiplicationEffect::new())
                } else {
                    self.insert_after(input, AlphaDivisionEffect::new())
                };
                self.graph.get_mut(conversion).output_alpha_type = desired;
            }
            self.propagate_gamma_and_color_space();
            self.propagate_alpha();

            pass += 1;
            self.output_dot(&format!("step{step}-alphafix-iter{pass}"));
            assert!(pass < MAX_REPAIR_PASSES, "alpha repair does not converge");
        }
    }

    fn output_gamma(&self) -> GammaCurve {
        self.output_format().0.gamma_curve
    }

    fn node_needs_gamma_fix(&self, id: NodeId) -> bool {
        if self.graph.is_disabled(id) {
            return false;
        }
        let node = self.graph.get(id);

        // The output is not a node, so the sink stands in for it. Getting
        // it to linear is enough here; fix_output_gamma does the rest.
        if self.graph.outgoing(id).is_empty()
            && node.output_gamma_curve != self.output_gamma()
            && node.output_gamma_curve != GammaCurve::Linear
        {
            return true;
        }
        if node.is_input() {
            return false;
        }
        if node.output_gamma_curve == GammaCurve::Invalid {
            return true;
        }
        if node.kind() == EffectKind::GammaCompression {
            let incoming = self.graph.incoming(id);
            assert_eq!(incoming.len(), 1);
            return self.graph.get(incoming[0]).output_gamma_curve != GammaCurve::Linear;
        }
        node.effect().needs_linear_light() && node.output_gamma_curve != GammaCurve::Linear
    }

    /// Inputs feeding `id` through non-linear nodes.
    fn find_all_nonlinear_inputs(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let node = self.graph.get(id);
        if node.output_gamma_curve == GammaCurve::Linear
            && node.kind() != EffectKind::GammaCompression
        {
            return;
        }
        if node.is_input() {
            if !out.contains(&id) {
                out.push(id);
            }
            return;
        }
        for &input in self.graph.incoming(id) {
            self.find_all_nonlinear_inputs(input, out);
        }
    }

    /// Where every non-linear input behind a node can decode to linear light
    /// itself, ask it to instead of inserting a conversion.
    fn fix_internal_gamma_by_asking_inputs(&mut self, step: u32) {
        let mut pass = 0;
        loop {
            let mut fixed = false;
            for id in self.sorted_nodes() {
                if !self.node_needs_gamma_fix(id) {
                    continue;
                }
                let mut nonlinear = Vec::new();
                self.find_all_nonlinear_inputs(id, &mut nonlinear);
                if nonlinear.is_empty() {
                    continue;
                }
                let all_ok = nonlinear.iter().all(|&n| {
                    self.graph
                        .get(n)
                        .effect()
                        .as_input()
                        .is_some_and(|input| input.can_output_linear_gamma())
                });
                if !all_ok {
                    continue;
                }
                for n in nonlinear {
                    let node = self.graph.get_mut(n);
                    assert!(
                        node.effect_mut().set_int("output_linear_gamma", 1),
                        "input {n} claims linear output but rejects output_linear_gamma"
                    );
                    node.output_gamma_curve = GammaCurve::Linear;
                }
                self.propagate_gamma_and_color_space();
                fixed = true;
                break;
            }

            pass += 1;
            self.output_dot(&format!("step{step}-gammafix-iter{pass}"));
            assert!(pass < MAX_REPAIR_PASSES, "gamma repair does not converge");
            if !fixed {
                break;
            }
        }
    }

    /// Insert gamma expansion on every non-linear input of a node that needs
    /// linear light.
    fn fix_internal_gamma_by_inserting_nodes(&mut self, step: u32) {
        let mut pass = 0;
        loop {
            let Some(id) = self
                .sorted_nodes()
                .into_iter()
                .find(|&n| self.node_needs_gamma_fix(n))
            else {
                break;
            };

            // An input only gets here when it is the whole chain; the
            // conversion then goes after it.
            if self.graph.incoming(id).is_empty() {
                assert!(self.graph.outgoing(id).is_empty());
                let curve = self.graph.get(id).output_gamma_curve;
                let conversion = self.add_conversion(GammaExpansionEffect::new(curve));
                self.graph.get_mut(conversion).output_gamma_curve = GammaCurve::Linear;
                self.graph.connect(id, conversion);
            }

            for input in self.graph.incoming(id).to_vec() {
                let curve = self.graph.get(input).output_gamma_curve;
                assert_ne!(curve, GammaCurve::Invalid, "input {input} has no gamma curve");
                if curve == GammaCurve::Linear || !self.graph.outgoing(input).contains(&id) {
                    continue;
                }
                let conversion = self.insert_after(input, GammaExpansionEffect::new(curve));
                self.graph.get_mut(conversion).output_gamma_curve = GammaCurve::Linear;
            }
            self.propagate_alpha();
            self.propagate_gamma_and_color_space();

            pass += 1;
            self.output_dot(&format!("step{step}-gammafix-iter{pass}"));
            assert!(pass < MAX_REPAIR_PASSES, "gamma repair does not converge");
        }
    }

    fn fix_output_color_space(&mut self) {
        let output = self.find_output_node();
        let have = self.graph.get(output).output_color_space;
        let want = self.output_format().0.color_space;
        if have != want {
            let conversion = self.append_to_output(ColorspaceConversionEffect::new(have, want));
            debug_assert_eq!(self.graph.get(conversion).output_color_space, want);
        }
    }

    fn fix_output_alpha(&mut self) {
        let output = self.find_output_node();
        let alpha = self.graph.get(output).output_alpha_type;
        assert_ne!(alpha, AlphaType::Invalid, "output node {output} has no alpha type");
        match (alpha, self.output_format().1) {
            (AlphaType::Premultiplied, OutputAlphaFormat::Postmultiplied) => {
                self.append_to_output(AlphaDivisionEffect::new());
            }
            (AlphaType::Postmultiplied, OutputAlphaFormat::Premultiplied) => {
                self.append_to_output(AlphaMultiplicationEffect::new());
            }
            _ => {}
        }
    }

    fn fix_output_gamma(&mut self) {
        let output = self.find_output_node();
        let want = self.output_gamma();
        if self.graph.get(output).output_gamma_curve != want {
            self.append_to_output(GammaCompressionEffect::new(want));
        }
    }

    fn add_ycbcr_conversion_if_needed(&mut self) {
        let Some(out) = self.config.ycbcr_outputs.first().copied() else {
            return;
        };
        let node =
            self.append_to_output(YCbCrConversionEffect::new(out.ycbcr_format, out.output_type));
        self.ycbcr_conversion_node = Some(node);
    }

    fn add_dither_if_needed(&mut self) {
        if self.config.dither_bits == 0 {
            return;
        }
        let node = self.append_to_output(DitherEffect::new(self.config.dither_bits));
        self.dither_node = Some(node);
    }

    /// A compute shader cannot write to a framebuffer, so a chain whose
    /// output is computed (possibly followed by strong one-to-one effects
    /// running in the same phase) gets a pass-through fragment phase.
    fn add_dummy_effect_if_needed(&mut self) {
        let output = self.find_output_node();
        if self.induces_compute_shader(output) {
            self.append_to_output(ComputeShaderOutputDisplayEffect::new());
            self.has_dummy_effect = true;
        }
    }

    /// Whether the phase ending in `node` may end up as a compute phase:
    /// `node` is a compute shader, or strong one-to-one effects lead back
    /// to one along any input.
    fn induces_compute_shader(&self, node: NodeId) -> bool {
        let effect = self.graph.get(node).effect();
        if effect.is_compute_shader() {
            return true;
        }
        if !effect.strong_one_to_one_sampling() {
            return false;
        }
        self.graph
            .incoming(node)
            .iter()
            .any(|&dep| self.induces_compute_shader(dep))
    }
}
