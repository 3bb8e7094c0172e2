//! Splitting the repaired graph into phases.

use std::collections::HashMap;

use movit_core::MipmapRequirements;
use movit_graph::NodeId;

use super::{EffectChain, LinkType, Phase};
use crate::effect::EffectKind;

impl EffectChain {
    pub(super) fn partition(&mut self, output: NodeId) {
        let mut completed = HashMap::new();
        self.construct_phase(output, &mut completed);
    }

    /// Build the phase ending in `output` (and, recursively, every phase it
    /// reads from). Returns its index in `self.phases`.
    fn construct_phase(&mut self, output: NodeId, completed: &mut HashMap<NodeId, usize>) -> usize {
        if let Some(&existing) = completed.get(&output) {
            return existing;
        }

        let mut phase = Phase::new(output);
        {
            let node = self.graph.get_mut(output);
            let effect = node.effect();
            let (one_to_one, strong, compute) = (
                effect.one_to_one_sampling(),
                effect.strong_one_to_one_sampling(),
                effect.is_compute_shader(),
            );
            node.one_to_one_sampling = one_to_one;
            node.strong_one_to_one_sampling = strong;
            if compute {
                phase.is_compute_shader = true;
                phase.compute_shader_node = Some(output);
            }
        }

        let mut todo = vec![output];
        while let Some(id) = todo.pop() {
            let own = self.graph.get(id).effect().needs_mipmaps();
            if own != MipmapRequirements::DoesNotNeedMipmaps {
                let current = self.graph.get(id).needs_mipmaps;
                assert!(
                    current == MipmapRequirements::DoesNotNeedMipmaps || current == own,
                    "node {id} was given mipmap requirement {current:?} but needs {own:?}"
                );
                self.graph.get_mut(id).needs_mipmaps = own;
            }

            if self.graph.get(id).is_input() {
                // An input can be reached along several paths.
                if phase.effects.contains(&id) {
                    continue;
                }
            } else {
                assert!(
                    !completed.contains_key(&id),
                    "node {id} already belongs to another phase"
                );
            }
            phase.effects.push(id);
            if self.graph.get(id).effect().is_compute_shader() {
                assert!(phase.compute_shader_node.is_none_or(|n| n == id));
                phase.is_compute_shader = true;
                phase.compute_shader_node = Some(id);
            }

            let deps = self.graph.incoming(id).to_vec();
            assert_eq!(self.graph.get(id).effect().num_inputs(), deps.len());
            let mut link_types = Vec::with_capacity(deps.len());
            for dep in deps {
                let saved_mipmaps = self.graph.get(dep).needs_mipmaps;
                let new_phase = self.needs_new_phase(id, dep, &mut phase);
                if new_phase {
                    self.graph.get_mut(dep).needs_mipmaps = saved_mipmaps;
                    let input_phase = self.construct_phase(dep, completed);
                    phase.inputs.push(input_phase);
                    link_types.push(LinkType::InAnotherPhase);
                } else {
                    let (one_to_one, strong) = {
                        let node = self.graph.get(id);
                        let dep_effect = self.graph.get(dep).effect();
                        (
                            node.one_to_one_sampling && dep_effect.one_to_one_sampling(),
                            node.strong_one_to_one_sampling
                                && dep_effect.strong_one_to_one_sampling(),
                        )
                    };
                    let dep_node = self.graph.get_mut(dep);
                    dep_node.one_to_one_sampling = one_to_one;
                    dep_node.strong_one_to_one_sampling = strong;
                    todo.push(dep);
                    link_types.push(LinkType::InSamePhase);
                }
            }
            self.graph.get_mut(id).incoming_link_type = link_types;
        }

        let mut unique = Vec::with_capacity(phase.inputs.len());
        for p in phase.inputs.drain(..) {
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        phase.inputs = unique;
        phase.effects = self.graph.topological_sort(&phase.effects);

        for &id in &phase.effects {
            let node = self.graph.get_mut(id);
            if !node.is_input() {
                continue;
            }
            let needs = node.needs_mipmaps == MipmapRequirements::NeedsMipmaps;
            if needs {
                assert!(
                    node.effect()
                        .as_input()
                        .is_some_and(|input| input.can_supply_mipmaps()),
                    "input {id} cannot supply the mipmaps it was asked for"
                );
            }
            let accepted = node.effect_mut().set_int("needs_mipmaps", i32::from(needs));
            assert!(accepted, "input {id} rejects needs_mipmaps");
        }

        let index = self.phases.len();
        for &id in &phase.effects {
            self.graph.get_mut(id).containing_phase = Some(index);
        }
        phase.input_samplers = vec![0; phase.inputs.len()];
        tracing::trace!(
            phase = index,
            effects = phase.effects.len(),
            inputs = ?phase.inputs,
            compute = phase.is_compute_shader,
            "phase constructed"
        );
        self.phases.push(phase);
        completed.insert(output, index);
        index
    }

    /// Whether `node` must sample `dep` from a texture rendered by another
    /// phase. Also propagates the mipmap requirement onto `dep` and may claim
    /// `dep` as the phase's compute shader.
    fn needs_new_phase(&mut self, node: NodeId, dep: NodeId, phase: &mut Phase) -> bool {
        let n = self.graph.get(node);
        let d = self.graph.get(dep);
        let node_effect = n.effect();
        let dep_effect = d.effect();
        let mut split = false;

        if node_effect.needs_texture_bounce()
            && !d.is_single_texture()
            && !dep_effect.override_disable_bounce()
        {
            split = true;
        }

        let dep_requirement = match dep_effect.needs_mipmaps() {
            MipmapRequirements::DoesNotNeedMipmaps => d.needs_mipmaps,
            own => own,
        };
        let mut propagate = None;
        match n.needs_mipmaps {
            MipmapRequirements::NeedsMipmaps => {
                let input_refuses = dep_effect
                    .as_input()
                    .is_some_and(|input| !input.can_supply_mipmaps());
                if dep_requirement == MipmapRequirements::CannotAcceptMipmaps || input_refuses {
                    split = true;
                } else {
                    propagate = Some(MipmapRequirements::NeedsMipmaps);
                }
            }
            MipmapRequirements::CannotAcceptMipmaps => {
                if dep_requirement == MipmapRequirements::NeedsMipmaps {
                    split = true;
                } else {
                    propagate = Some(MipmapRequirements::CannotAcceptMipmaps);
                }
            }
            MipmapRequirements::DoesNotNeedMipmaps => {}
        }

        let fan_out = self.graph.outgoing(dep);
        if fan_out.len() > 1 {
            if !d.is_single_texture() {
                split = true;
            } else if fan_out
                .iter()
                .any(|&other| self.graph.get(other).effect().needs_texture_bounce())
            {
                split = true;
            }
        }

        let mut claim_compute = false;
        if dep_effect.is_compute_shader() {
            if phase.is_compute_shader || !n.strong_one_to_one_sampling {
                split = true;
            } else {
                claim_compute = true;
            }
        }

        if dep_effect.sets_virtual_output_size()
            || (dep_effect.changes_output_size() && !n.one_to_one_sampling)
        {
            split = true;
        }

        if let Some(req) = propagate {
            self.graph.get_mut(dep).needs_mipmaps = req;
        }
        if claim_compute && !split {
            phase.is_compute_shader = true;
            phase.compute_shader_node = Some(dep);
        }
        split
    }

    /// A display pass behind a compute phase is only needed when the
    /// compute phase is not the last one anyway.
    pub(super) fn remove_unneeded_dummy_phase(&mut self) {
        if !self.has_dummy_effect || self.phases.len() < 2 {
            return;
        }
        let penultimate = &self.phases[self.phases.len() - 2];
        if penultimate.is_compute_shader {
            return;
        }
        let last = &self.phases[self.phases.len() - 1];
        assert_eq!(
            last.effects.len(),
            1,
            "the display phase holds exactly one effect"
        );
        let dummy = last.effects[0];
        assert_eq!(self.graph.get(dummy).kind(), EffectKind::ComputeShaderOutputDisplay);
        let incoming = self.graph.incoming(dummy).to_vec();
        assert_eq!(incoming.len(), 1);

        self.graph.disconnect(incoming[0], dummy);
        self.graph.disable(dummy);
        self.graph.get_mut(dummy).containing_phase = None;
        self.phases.pop();
        self.has_dummy_effect = false;
        tracing::debug!("compute output is not last; dropped display phase");
    }
}
