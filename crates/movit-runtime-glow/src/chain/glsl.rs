//! Per-phase shader text assembly.

use std::collections::HashMap;
use std::fmt::Write as _;

use movit_core::{GammaCurve, IntermediateTransformation, OutputOrigin, YCbCrOutputSplitting};
use movit_graph::NodeId;
use movit_runtime::replace_prefix;

use super::{EffectChain, LinkType};
use crate::effect::EffectKind;
use crate::init::capabilities;
use crate::params::UniformValue;
use crate::shaders::{read_shader, FOOTER_COMP, FOOTER_FRAG, HEADER_COMP, HEADER_FRAG, VS_VERT};

/// Generated program text plus the uniforms the executor must upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseProgram {
    /// Empty for compute phases.
    pub vert: String,
    pub frag: String,
    /// Fragment outputs in draw-buffer order.
    pub outputs: Vec<String>,
    pub uniforms: Vec<UniformSlot>,
}

/// One `uniform` declaration of a phase program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub glsl_name: String,
    pub source: UniformSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformSource {
    /// A registered uniform of an effect in the phase.
    Effect { node: NodeId, name: String },
    /// `tex_in<i>`, bound to the phase's i-th input sampler.
    InputSampler(usize),
    /// The image unit a compute phase writes to.
    OutputImage,
}

impl EffectChain {
    /// Whether `node` writes what the caller sees: it is the sink, or the
    /// only thing after it is the compute display pass.
    fn feeds_chain_output(&self, node: NodeId) -> bool {
        match self.graph.outgoing(node) {
            [] => true,
            [next] => {
                self.has_dummy_effect
                    && self.graph.get(*next).kind() == EffectKind::ComputeShaderOutputDisplay
            }
            _ => false,
        }
    }

    /// Whether the phase ending in `node` stores `sqrt(rgb)` in its
    /// intermediate texture.
    pub(super) fn stores_square_root(&self, node: NodeId) -> bool {
        self.config.intermediate_transformation == IntermediateTransformation::SquareRoot
            && !self.feeds_chain_output(node)
            && self.graph.get(node).output_gamma_curve == GammaCurve::Linear
    }

    pub(super) fn generate_all_glsl(&mut self) {
        for p in 0..self.phases.len() {
            let program = self.generate_glsl(p);
            tracing::trace!(phase = p, shader = %program.frag, "generated phase program");
            self.phases[p].program = program;
        }
    }

    fn generate_glsl(&mut self, p: usize) -> PhaseProgram {
        let caps = capabilities();
        let phase = &self.phases[p];
        let output_node = phase.output_node;
        let is_compute = phase.is_compute_shader;
        let compute_node = phase.compute_shader_node;
        let effects = phase.effects.clone();
        let input_nodes: Vec<NodeId> = phase
            .inputs
            .iter()
            .map(|&q| self.phases[q].output_node)
            .collect();

        let mut defines = String::new();
        let mut body = String::new();
        let mut uniforms = Vec::new();
        let mut ids: HashMap<(NodeId, LinkType), String> = HashMap::new();

        for (i, &input) in input_nodes.iter().enumerate() {
            let id = format!("in{i}");
            let _ = writeln!(body, "uniform sampler2D tex_{id};");
            let _ = write!(
                body,
                "vec4 {id}(vec2 tc) {{\n\tvec4 tmp = texture(tex_{id}, tc);\n"
            );
            if self.stores_square_root(input) {
                body.push_str("\ttmp.rgb *= tmp.rgb;\n");
            }
            body.push_str("\treturn tmp;\n}\n\n");
            uniforms.push(UniformSlot {
                glsl_name: format!("tex_{id}"),
                source: UniformSource::InputSampler(i),
            });
            ids.insert((input, LinkType::InAnotherPhase), id);
        }

        for (k, &node) in effects.iter().enumerate() {
            let id = format!("eff{k}");
            let incoming = self.graph.incoming(node).to_vec();
            let link_types = self.graph.get(node).incoming_link_type.clone();
            let num_inputs = incoming.len();

            for (j, (&dep, &link)) in incoming.iter().zip(&link_types).enumerate() {
                let name = if num_inputs == 1 {
                    "INPUT".to_string()
                } else {
                    format!("INPUT{}", j + 1)
                };
                if link == LinkType::InSamePhase && compute_node == Some(dep) {
                    let _ = writeln!(body, "#define {name}(tc) CS_OUTPUT_VAL");
                } else {
                    let dep_id = ids.get(&(dep, link));
                    assert!(
                        dep_id.is_some(),
                        "phase {p}: no shader id for input {dep} of {node}"
                    );
                    if let Some(dep_id) = dep_id {
                        let _ = writeln!(body, "#define {name} {dep_id}");
                    }
                }
            }

            let _ = writeln!(body, "#define FUNCNAME {id}");
            if compute_node == Some(node) {
                let _ = writeln!(
                    body,
                    "#define NORMALIZE_TEXTURE_COORDS(tc) ((tc) * {id}_inv_output_size + {id}_output_texcoord_adjust)"
                );
            }
            let source = self.graph.get_mut(node).effect_mut().output_fragment_shader();
            body.push_str(&replace_prefix(&source, &id));
            body.push_str("#undef FUNCNAME\n");
            if compute_node == Some(node) {
                body.push_str("#undef NORMALIZE_TEXTURE_COORDS\n");
            }
            if num_inputs == 1 {
                body.push_str("#undef INPUT\n");
            } else {
                for j in 0..num_inputs {
                    let _ = writeln!(body, "#undef INPUT{}", j + 1);
                }
            }
            body.push('\n');
            ids.insert((node, LinkType::InSamePhase), id);
        }

        assert!(!effects.is_empty(), "phase {p} has no effects");
        let last_id = format!("eff{}", effects.len() - 1);
        let cs_index = compute_node.and_then(|cs| effects.iter().position(|&n| n == cs));
        assert_eq!(
            cs_index.is_some(),
            compute_node.is_some(),
            "phase {p}: compute node is not in the phase"
        );
        if let Some(cs_index) = cs_index {
            let _ = writeln!(body, "#define INPUT eff{cs_index}");
            if cs_index == effects.len() - 1 {
                body.push_str("#define CS_POSTPROC(tc) CS_OUTPUT_VAL\n");
            } else {
                let _ = writeln!(body, "#define CS_POSTPROC {last_id}");
            }
        } else {
            let _ = writeln!(body, "#define INPUT {last_id}");
        }

        // Y'CbCr targets belong to the phase that writes the caller's output.
        let mut outputs = Vec::new();
        let is_final = self.graph.outgoing(output_node).is_empty();
        if is_final && !is_compute && !self.config.ycbcr_outputs.is_empty() {
            let ycbcr = &self.config.ycbcr_outputs;
            match ycbcr[0].splitting {
                YCbCrOutputSplitting::Interleaved => outputs.push("FragColor".to_string()),
                YCbCrOutputSplitting::SplitYAndCbCr => {
                    defines.push_str("#define YCBCR_OUTPUT_SPLIT_Y_AND_CBCR 1\n");
                    outputs.extend(["Y", "Chroma"].map(String::from));
                }
                YCbCrOutputSplitting::Planar => {
                    defines.push_str("#define YCBCR_OUTPUT_PLANAR 1\n");
                    outputs.extend(["Y", "Cb", "Cr"].map(String::from));
                }
            }
            if let Some(second) = ycbcr.get(1) {
                match second.splitting {
                    YCbCrOutputSplitting::Interleaved => {
                        defines.push_str("#define SECOND_YCBCR_OUTPUT_INTERLEAVED 1\n");
                        outputs.push("YCbCr2".to_string());
                    }
                    YCbCrOutputSplitting::SplitYAndCbCr => {
                        defines.push_str("#define SECOND_YCBCR_OUTPUT_SPLIT_Y_AND_CBCR 1\n");
                        outputs.extend(["Y2", "Chroma2"].map(String::from));
                    }
                    YCbCrOutputSplitting::Planar => {
                        defines.push_str("#define SECOND_YCBCR_OUTPUT_PLANAR 1\n");
                        outputs.extend(["Y2", "Cb2", "Cr2"].map(String::from));
                    }
                }
            }
            if self.config.rgba_output.is_some() {
                defines.push_str("#define YCBCR_ALSO_OUTPUT_RGBA 1\n");
                outputs.push("RGBA".to_string());
            }
        } else if !is_compute {
            outputs.push("FragColor".to_string());
        }
        if is_final && is_compute {
            assert!(
                self.config
                    .ycbcr_outputs
                    .iter()
                    .all(|o| o.splitting == YCbCrOutputSplitting::Interleaved)
                    && (self.config.ycbcr_outputs.is_empty() || self.config.rgba_output.is_none()),
                "a compute shader can write only one output"
            );
        }

        if self.stores_square_root(output_node) {
            defines.push_str("#define SQUARE_ROOT_TRANSFORMATION 1\n");
        }

        // The display pass copies what the compute phase already flipped.
        let flip = self.config.output_origin == OutputOrigin::TopLeft
            && self.feeds_chain_output(output_node)
            && self.graph.get(output_node).kind() != EffectKind::ComputeShaderOutputDisplay;

        if let (Some(cs), Some(cs_index)) = (compute_node, cs_index) {
            let _ = writeln!(defines, "#define CS_OUTPUT_SIZE eff{cs_index}_output_size");
            let _ = writeln!(defines, "#define CS_INV_OUTPUT_SIZE eff{cs_index}_inv_output_size");
            if flip {
                defines.push_str("#define FLIP_ORIGIN 1\n");
            }
            let params = self.graph.get_mut(cs).effect_mut().params_mut();
            if !params.contains("output_size") {
                params.register_uniform("output_size", UniformValue::IVec2([0, 0]));
            }
            if !params.contains("inv_output_size") {
                params.register_uniform("inv_output_size", UniformValue::Vec2([0.0, 0.0]));
            }
            if !params.contains("output_texcoord_adjust") {
                params.register_uniform("output_texcoord_adjust", UniformValue::Vec2([0.0, 0.0]));
            }
            uniforms.push(UniformSlot {
                glsl_name: "tex_outbuf".to_string(),
                source: UniformSource::OutputImage,
            });
        }

        let mut decls = String::new();
        for (k, &node) in effects.iter().enumerate() {
            for entry in self.graph.get(node).effect().params().uniforms() {
                let glsl_name = format!("eff{k}_{}", entry.name);
                let ty = entry.value.glsl_type();
                match entry.value.array_len() {
                    Some(n) => {
                        let _ = writeln!(decls, "uniform {ty} {glsl_name}[{n}];");
                    }
                    None => {
                        let _ = writeln!(decls, "uniform {ty} {glsl_name};");
                    }
                }
                uniforms.push(UniformSlot {
                    glsl_name,
                    source: UniformSource::Effect {
                        node,
                        name: entry.name.clone(),
                    },
                });
            }
        }

        let (vert, frag) = if is_compute {
            let header = format!(
                "{}{defines}{}",
                caps.compute_version(),
                read_shader("header.comp", HEADER_COMP)
            );
            let footer = read_shader("footer.comp", FOOTER_COMP);
            (String::new(), format!("{header}\n{decls}\n{body}{footer}"))
        } else {
            let header = format!(
                "{}{defines}{}",
                caps.fragment_version(),
                read_shader("header.frag", HEADER_FRAG)
            );
            let footer = read_shader("footer.frag", FOOTER_FRAG);
            let mut vert = format!("{}{}", caps.fragment_version(), read_shader("vs.vert", VS_VERT));
            if flip {
                vert = vert.replace("#define FLIP_ORIGIN 0", "#define FLIP_ORIGIN 1");
            }
            (vert, format!("{header}\n{decls}\n{body}{footer}"))
        };

        PhaseProgram {
            vert,
            frag,
            outputs,
            uniforms,
        }
    }
}
