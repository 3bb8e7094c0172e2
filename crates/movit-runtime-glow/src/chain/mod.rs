//! The effect chain: client-facing graph building, the pipeline compiler
//! (`finalize`) and the executor (`render_*`).
//!
//! A chain goes through two states. While building, clients add inputs,
//! effects and outputs and may set parameters. `finalize` then rewrites the
//! graph, repairs colour/gamma/alpha mismatches by inserting conversion nodes,
//! splits the result into phases and generates GLSL for each phase. It does
//! not touch GL; programs are linked on the first render (or by `prepare`).
#![allow(clippy::missing_safety_doc)]

mod dot;
mod finalize;
mod glsl;
mod partition;
mod render;
mod timing;

use std::collections::HashMap;
use std::sync::Arc;

use glow::HasContext;
use movit_core::{
    AlphaType, ChainConfig, Colorspace, ContextId, GammaCurve, ImageFormat, MipmapRequirements,
    OutputAlphaFormat, RgbaOutputConfig, YCbCrFormat, YCbCrOutputConfig, YCbCrOutputSplitting,
    YCbCrOutputType, MAX_DITHER_BITS, MAX_YCBCR_OUTPUTS,
};
use movit_graph::{Graph, NodeId};

use crate::effect::{Effect, EffectKind};
use crate::effects::YCbCrConversionEffect;
use crate::resource_pool::ResourcePool;

pub use render::DestinationTexture;
pub use timing::PhaseTimingReport;

use glsl::PhaseProgram;
use timing::PhaseTimer;

/// How a node reads one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// The input is computed inline in the same shader.
    InSamePhase,
    /// The input is sampled from the texture another phase rendered.
    InAnotherPhase,
}

/// A graph vertex: one effect plus what the compiler inferred about it.
pub struct Node {
    effect: Option<Box<dyn Effect>>,

    pub(crate) output_color_space: Colorspace,
    pub(crate) output_gamma_curve: GammaCurve,
    pub(crate) output_alpha_type: AlphaType,

    pub(crate) needs_mipmaps: MipmapRequirements,
    pub(crate) one_to_one_sampling: bool,
    pub(crate) strong_one_to_one_sampling: bool,

    /// Parallel to the graph's incoming list once partitioned.
    pub(crate) incoming_link_type: Vec<LinkType>,

    pub(crate) output_width: u32,
    pub(crate) output_height: u32,

    pub(crate) bound_sampler_num: Option<u32>,
    pub(crate) containing_phase: Option<usize>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("effect", &self.effect.as_ref().map(|e| e.effect_type_id()))
            .field("color_space", &self.output_color_space)
            .field("gamma", &self.output_gamma_curve)
            .field("alpha", &self.output_alpha_type)
            .field("phase", &self.containing_phase)
            .finish()
    }
}

impl Node {
    fn new(effect: Box<dyn Effect>) -> Self {
        Self {
            effect: Some(effect),
            output_color_space: Colorspace::Invalid,
            output_gamma_curve: GammaCurve::Invalid,
            output_alpha_type: AlphaType::Invalid,
            needs_mipmaps: MipmapRequirements::DoesNotNeedMipmaps,
            one_to_one_sampling: false,
            strong_one_to_one_sampling: false,
            incoming_link_type: Vec::new(),
            output_width: 0,
            output_height: 0,
            bound_sampler_num: None,
            containing_phase: None,
        }
    }

    pub fn effect(&self) -> &dyn Effect {
        match &self.effect {
            Some(e) => e.as_ref(),
            None => panic!("effect is checked out for a graph rewrite"),
        }
    }

    pub fn effect_mut(&mut self) -> &mut dyn Effect {
        match &mut self.effect {
            Some(e) => e.as_mut(),
            None => panic!("effect is checked out for a graph rewrite"),
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.effect().kind()
    }

    pub fn is_input(&self) -> bool {
        self.effect().num_inputs() == 0
    }

    /// A true input that binds exactly one texture.
    pub fn is_single_texture(&self) -> bool {
        self.effect()
            .as_input()
            .is_some_and(|input| input.is_single_texture())
    }

    pub fn output_color_space(&self) -> Colorspace {
        self.output_color_space
    }

    pub fn output_gamma_curve(&self) -> GammaCurve {
        self.output_gamma_curve
    }

    pub fn output_alpha_type(&self) -> AlphaType {
        self.output_alpha_type
    }

    /// Mipmap requirement propagated onto this node during partitioning.
    pub fn needs_mipmaps(&self) -> MipmapRequirements {
        self.needs_mipmaps
    }

    pub fn incoming_link_types(&self) -> &[LinkType] {
        &self.incoming_link_type
    }

    /// Index into `EffectChain::phases` of the phase this node was compiled
    /// into. A single-texture input read by several phases reports the last.
    pub fn containing_phase(&self) -> Option<usize> {
        self.containing_phase
    }

    /// Size computed for this node by the last render.
    pub fn output_size(&self) -> (u32, u32) {
        (self.output_width, self.output_height)
    }
}

/// One shader program invocation.
#[derive(Debug)]
pub struct Phase {
    pub(crate) output_node: NodeId,
    /// Topologically sorted.
    pub(crate) effects: Vec<NodeId>,
    /// Earlier phases whose output textures this phase samples, in sampler
    /// order.
    pub(crate) inputs: Vec<usize>,
    pub(crate) is_compute_shader: bool,
    pub(crate) compute_shader_node: Option<NodeId>,

    pub(crate) program: PhaseProgram,
    /// Master program from the resource pool, linked on first use.
    pub(crate) glsl_program: Option<glow::NativeProgram>,
    pub(crate) input_samplers: Vec<i32>,
    /// Per program instance, parallel to `program.uniforms`.
    pub(crate) uniform_locations:
        HashMap<glow::NativeProgram, Vec<Option<glow::NativeUniformLocation>>>,

    pub(crate) output_width: u32,
    pub(crate) output_height: u32,
    pub(crate) virtual_output_width: u32,
    pub(crate) virtual_output_height: u32,

    pub(crate) timer: PhaseTimer,
}

impl Phase {
    pub(crate) fn new(output_node: NodeId) -> Self {
        Self {
            output_node,
            effects: Vec::new(),
            inputs: Vec::new(),
            is_compute_shader: false,
            compute_shader_node: None,
            program: PhaseProgram::default(),
            glsl_program: None,
            input_samplers: Vec::new(),
            uniform_locations: HashMap::new(),
            output_width: 0,
            output_height: 0,
            virtual_output_width: 0,
            virtual_output_height: 0,
            timer: PhaseTimer::default(),
        }
    }

    pub fn output_node(&self) -> NodeId {
        self.output_node
    }

    pub fn effects(&self) -> &[NodeId] {
        &self.effects
    }

    pub fn inputs(&self) -> &[usize] {
        &self.inputs
    }

    pub fn is_compute_shader(&self) -> bool {
        self.is_compute_shader
    }

    pub fn compute_shader_node(&self) -> Option<NodeId> {
        self.compute_shader_node
    }

    /// Vertex shader text; empty for compute phases.
    pub fn vertex_shader(&self) -> &str {
        &self.program.vert
    }

    /// Fragment or compute shader text.
    pub fn shader(&self) -> &str {
        &self.program.frag
    }

    /// Fragment outputs bound to draw buffers 0.., in order.
    pub fn fragment_outputs(&self) -> &[String] {
        &self.program.outputs
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.output_width, self.output_height)
    }

    pub fn virtual_output_size(&self) -> (u32, u32) {
        (self.virtual_output_width, self.virtual_output_height)
    }
}

/// Graph surgery handed to `Effect::rewrite_graph`.
pub struct GraphRewriter<'a> {
    graph: &'a mut Graph<Node>,
}

impl std::fmt::Debug for GraphRewriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRewriter")
            .field("nodes", &self.graph.len())
            .finish()
    }
}

impl<'a> GraphRewriter<'a> {
    pub(crate) fn new(graph: &'a mut Graph<Node>) -> Self {
        Self { graph }
    }

    /// Add an unconnected node. Its own `rewrite_graph` runs later in the
    /// same finalize.
    pub fn add_effect(&mut self, effect: Box<dyn Effect>) -> NodeId {
        add_node(self.graph, effect)
    }

    pub fn connect(&mut self, sender: NodeId, receiver: NodeId) {
        self.graph.connect(sender, receiver);
    }

    pub fn replace_receiver(&mut self, old: NodeId, new: NodeId) {
        self.graph.replace_receiver(old, new);
    }

    pub fn replace_sender(&mut self, old: NodeId, new: NodeId) {
        self.graph.replace_sender(old, new);
    }

    pub fn insert_between(&mut self, sender: NodeId, middle: NodeId, receiver: NodeId) {
        self.graph.insert_between(sender, middle, receiver);
    }

    pub fn disable(&mut self, node: NodeId) {
        self.graph.disable(node);
    }

    pub fn incoming(&self, node: NodeId) -> &[NodeId] {
        self.graph.incoming(node)
    }

    pub fn outgoing(&self, node: NodeId) -> &[NodeId] {
        self.graph.outgoing(node)
    }
}

fn add_node(graph: &mut Graph<Node>, effect: Box<dyn Effect>) -> NodeId {
    let id = graph.add_node(Node::new(effect));
    graph.get_mut(id).effect_mut().inform_added(id);
    id
}

/// A DAG of effects from one or more inputs to one output, compiled into
/// phases by [`EffectChain::finalize`].
pub struct EffectChain {
    config: ChainConfig,
    graph: Graph<Node>,
    inputs: Vec<NodeId>,
    last_added: Option<NodeId>,
    phases: Vec<Phase>,
    finalized: bool,

    ycbcr_conversion_node: Option<NodeId>,
    dither_node: Option<NodeId>,
    has_dummy_effect: bool,

    pool: Arc<ResourcePool>,
    owns_pool: bool,
    phase_timing: bool,
}

impl std::fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectChain")
            .field("nodes", &self.graph.len())
            .field("phases", &self.phases.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl EffectChain {
    /// A chain with a private resource pool.
    pub fn new(config: ChainConfig) -> Self {
        let mut chain = Self::with_resource_pool(config, Arc::new(ResourcePool::new()));
        chain.owns_pool = true;
        chain
    }

    /// A chain drawing programs, textures and FBOs from a shared pool.
    pub fn with_resource_pool(config: ChainConfig, pool: Arc<ResourcePool>) -> Self {
        let phase_timing = config.phase_timing;
        Self {
            config,
            graph: Graph::new(),
            inputs: Vec::new(),
            last_added: None,
            phases: Vec::new(),
            finalized: false,
            ycbcr_conversion_node: None,
            dither_node: None,
            has_dummy_effect: false,
            pool,
            owns_pool: false,
            phase_timing,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn resource_pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn assert_building(&self, what: &str) {
        assert!(!self.finalized, "{what} called after finalize");
    }

    /// Add a zero-input effect. The chain takes ownership.
    pub fn add_input(&mut self, input: impl Effect + 'static) -> NodeId {
        self.add_input_boxed(Box::new(input))
    }

    pub fn add_input_boxed(&mut self, input: Box<dyn Effect>) -> NodeId {
        self.assert_building("add_input");
        assert!(
            input.num_inputs() == 0 && input.as_input().is_some(),
            "add_input: {} is not an input",
            input.effect_type_id()
        );
        let id = add_node(&mut self.graph, input);
        self.inputs.push(id);
        self.last_added = Some(id);
        id
    }

    /// Add a one-input effect reading the most recently added node.
    pub fn add_effect(&mut self, effect: impl Effect + 'static) -> NodeId {
        let Some(last) = self.last_added else {
            panic!("add_effect: nothing to connect to; add an input first");
        };
        self.add_effect_with_inputs(effect, &[last])
    }

    /// Add an effect reading `inputs`, in argument order.
    pub fn add_effect_with_inputs(
        &mut self,
        effect: impl Effect + 'static,
        inputs: &[NodeId],
    ) -> NodeId {
        self.add_effect_boxed(Box::new(effect), inputs)
    }

    pub fn add_effect_boxed(&mut self, effect: Box<dyn Effect>, inputs: &[NodeId]) -> NodeId {
        self.assert_building("add_effect");
        assert_eq!(
            effect.num_inputs(),
            inputs.len(),
            "add_effect: {} takes {} inputs",
            effect.effect_type_id(),
            effect.num_inputs()
        );
        let id = add_node(&mut self.graph, effect);
        for &input in inputs {
            assert!(self.graph.contains(input), "add_effect: unknown node {input}");
            self.graph.connect(input, id);
        }
        self.last_added = Some(id);
        id
    }

    /// Request an RGBA output.
    pub fn add_output(&mut self, format: ImageFormat, alpha_format: OutputAlphaFormat) {
        self.assert_building("add_output");
        assert!(
            self.config.rgba_output.is_none(),
            "add_output: the chain already has an RGBA output"
        );
        if let Some(first) = self.config.ycbcr_outputs.first() {
            assert!(
                first.format == format && first.alpha_format == alpha_format,
                "add_output: RGBA and Y'CbCr outputs must share format and alpha format"
            );
        }
        self.config.rgba_output = Some(RgbaOutputConfig {
            format,
            alpha_format,
        });
    }

    /// Request a Y'CbCr output. Every Y'CbCr output shares one format; only
    /// the splitting may differ.
    pub fn add_ycbcr_output(
        &mut self,
        format: ImageFormat,
        alpha_format: OutputAlphaFormat,
        ycbcr_format: YCbCrFormat,
        splitting: YCbCrOutputSplitting,
        output_type: YCbCrOutputType,
    ) {
        self.assert_building("add_ycbcr_output");
        assert!(
            self.config.ycbcr_outputs.len() < MAX_YCBCR_OUTPUTS,
            "add_ycbcr_output: at most {MAX_YCBCR_OUTPUTS} Y'CbCr outputs"
        );
        assert!(
            ycbcr_format.chroma_subsampling_x == 1 && ycbcr_format.chroma_subsampling_y == 1,
            "add_ycbcr_output: only 4:4:4 output is supported"
        );
        if let Some(first) = self.config.ycbcr_outputs.first() {
            assert!(
                first.format == format
                    && first.alpha_format == alpha_format
                    && first.ycbcr_format == ycbcr_format
                    && first.output_type == output_type,
                "add_ycbcr_output: Y'CbCr outputs disagree on format"
            );
        }
        if let Some(rgba) = &self.config.rgba_output {
            assert!(
                rgba.format == format && rgba.alpha_format == alpha_format,
                "add_ycbcr_output: RGBA and Y'CbCr outputs must share format and alpha format"
            );
        }
        self.config.ycbcr_outputs.push(YCbCrOutputConfig {
            format,
            alpha_format,
            ycbcr_format,
            splitting,
            output_type,
        });
    }

    /// Switch every Y'CbCr output to `ycbcr_format`. Allowed after finalize;
    /// only uniforms change, so no recompilation happens.
    pub fn change_ycbcr_output_format(&mut self, ycbcr_format: YCbCrFormat) {
        assert!(
            !self.config.ycbcr_outputs.is_empty(),
            "change_ycbcr_output_format: the chain has no Y'CbCr output"
        );
        assert!(
            ycbcr_format.chroma_subsampling_x == 1 && ycbcr_format.chroma_subsampling_y == 1,
            "change_ycbcr_output_format: only 4:4:4 output is supported"
        );
        for out in &mut self.config.ycbcr_outputs {
            out.ycbcr_format = ycbcr_format;
        }
        if let Some(id) = self.ycbcr_conversion_node {
            let Some(conv) = self
                .graph
                .get_mut(id)
                .effect_mut()
                .as_any_mut()
                .downcast_mut::<YCbCrConversionEffect>()
            else {
                panic!("Y'CbCr conversion node holds another effect");
            };
            conv.change_format(ycbcr_format);
        }
    }

    /// Dither the final output to `num_bits` (0 turns dithering off).
    pub fn set_dither_bits(&mut self, num_bits: u32) {
        self.assert_building("set_dither_bits");
        assert!(
            num_bits <= MAX_DITHER_BITS,
            "set_dither_bits: at most {MAX_DITHER_BITS} bits"
        );
        self.config.dither_bits = num_bits;
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.graph.get(id)
    }

    pub fn graph(&self) -> &Graph<Node> {
        &self.graph
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn effect(&self, id: NodeId) -> &dyn Effect {
        self.graph.get(id).effect()
    }

    /// Borrow a node's effect as its concrete type.
    pub fn effect_as<T: Effect>(&self, id: NodeId) -> Option<&T> {
        self.graph.get(id).effect().as_any().downcast_ref::<T>()
    }

    /// Mutable access for inputs that take new data between renders.
    pub fn effect_as_mut<T: Effect>(&mut self, id: NodeId) -> Option<&mut T> {
        self.graph
            .get_mut(id)
            .effect_mut()
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn has_dummy_effect(&self) -> bool {
        self.has_dummy_effect
    }

    pub fn ycbcr_conversion_node(&self) -> Option<NodeId> {
        self.ycbcr_conversion_node
    }

    pub fn dither_node(&self) -> Option<NodeId> {
        self.dither_node
    }

    /// Apply `set` to `node` and, when it accepts, to every node the effect
    /// forwards its parameters to.
    fn set_param(&mut self, node: NodeId, set: impl Fn(&mut dyn Effect) -> bool) -> bool {
        if !set(&mut *self.graph.get_mut(node).effect_mut()) {
            return false;
        }
        let mut pending: Vec<NodeId> = self.graph.get(node).effect().forwarded_to().to_vec();
        while let Some(target) = pending.pop() {
            let effect = self.graph.get_mut(target).effect_mut();
            if set(&mut *effect) {
                pending.extend_from_slice(effect.forwarded_to());
            } else {
                tracing::warn!(node = %target, "forwarded parameter rejected");
            }
        }
        true
    }

    #[must_use]
    pub fn set_int(&mut self, node: NodeId, key: &str, value: i32) -> bool {
        self.set_param(node, |e| e.set_int(key, value))
    }

    #[must_use]
    pub fn set_float(&mut self, node: NodeId, key: &str, value: f32) -> bool {
        self.set_param(node, |e| e.set_float(key, value))
    }

    #[must_use]
    pub fn set_vec2(&mut self, node: NodeId, key: &str, value: [f32; 2]) -> bool {
        self.set_param(node, |e| e.set_vec2(key, value))
    }

    #[must_use]
    pub fn set_vec3(&mut self, node: NodeId, key: &str, value: [f32; 3]) -> bool {
        self.set_param(node, |e| e.set_vec3(key, value))
    }

    #[must_use]
    pub fn set_vec4(&mut self, node: NodeId, key: &str, value: [f32; 4]) -> bool {
        self.set_param(node, |e| e.set_vec4(key, value))
    }

    #[must_use]
    pub fn set_ivec2(&mut self, node: NodeId, key: &str, value: [i32; 2]) -> bool {
        self.set_param(node, |e| e.set_ivec2(key, value))
    }

    /// The colour format every output is rendered in.
    fn output_format(&self) -> (ImageFormat, OutputAlphaFormat) {
        if let Some(rgba) = &self.config.rgba_output {
            return (rgba.format, rgba.alpha_format);
        }
        match self.config.ycbcr_outputs.first() {
            Some(out) => (out.format, out.alpha_format),
            None => panic!("no output requested; call add_output or add_ycbcr_output"),
        }
    }

    /// Link every phase program now instead of on the first render.
    pub unsafe fn prepare(&mut self, gl: &glow::Context) -> Result<(), movit_core::EngineError> {
        assert!(self.finalized, "prepare called before finalize");
        for phase in &mut self.phases {
            render::ensure_program(gl, &self.pool, phase)?;
        }
        Ok(())
    }

    /// Release every GL object the chain holds. The chain's own context must
    /// be current; a private resource pool is destroyed as well.
    pub unsafe fn destroy(&mut self, gl: &glow::Context, ctx: ContextId) {
        for phase in &mut self.phases {
            if let Some(program) = phase.glsl_program.take() {
                self.pool.release_glsl_program(gl, program);
            }
            phase.timer.destroy(gl);
        }
        let ids: Vec<NodeId> = self.graph.ids().collect();
        for id in ids {
            self.graph.get_mut(id).effect_mut().destroy(gl);
        }
        if self.owns_pool {
            self.pool.destroy(gl, ctx);
        }
        gl.use_program(None);
    }
}
