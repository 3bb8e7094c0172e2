//! The executor: per-render sizing, intermediate textures and draws.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glow::HasContext;
use movit_core::{ContextId, EngineError, MipmapRequirements};
use movit_graph::Graph;
use movit_runtime::size_rectangle_to_fit;

use super::glsl::UniformSource;
use super::{EffectChain, LinkType, Node, Phase};
use crate::effect::{EffectKind, SetupContext};
use crate::gl_util::set_sampling;
use crate::init::{capabilities, GlslDialect};
use crate::params::UniformValue;
use crate::resource_pool::{ResourcePool, MAX_FBO_ATTACHMENTS};

/// A caller-owned texture the last phase renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationTexture {
    pub texture: glow::NativeTexture,
    /// Sized internal format, e.g. `glow::RGBA8`.
    pub format: u32,
}

enum Target<'a> {
    /// `None` is the default framebuffer. `origin` is the viewport's
    /// lower-left corner.
    Framebuffer {
        fbo: Option<glow::NativeFramebuffer>,
        origin: (i32, i32),
    },
    /// Written through image units by a trailing compute phase.
    Images(&'a [DestinationTexture]),
}

/// `GL_VIEWPORT` as (origin, size), negative extents clamped to zero.
fn split_viewport(viewport: [i32; 4]) -> ((i32, i32), (u32, u32)) {
    let [x, y, w, h] = viewport;
    ((x, y), (w.max(0) as u32, h.max(0) as u32))
}

/// The phase's master program, linked through the pool on first use.
pub(super) unsafe fn ensure_program(
    gl: &glow::Context,
    pool: &ResourcePool,
    phase: &mut Phase,
) -> Result<glow::NativeProgram, EngineError> {
    if let Some(program) = phase.glsl_program {
        return Ok(program);
    }
    let program = if phase.is_compute_shader {
        pool.compile_glsl_compute_program(gl, &phase.program.frag)?
    } else {
        pool.compile_glsl_program(
            gl,
            &phase.program.vert,
            &phase.program.frag,
            &phase.program.outputs,
        )?
    };
    phase.glsl_program = Some(program);
    Ok(program)
}

impl EffectChain {
    /// Render into the current viewport of the default framebuffer.
    pub unsafe fn render_to_screen(
        &mut self,
        gl: &glow::Context,
        ctx: ContextId,
    ) -> Result<(), EngineError> {
        self.render_to_fbo(gl, ctx, None, 0, 0)
    }

    /// Render into `fbo` (`None` for the default framebuffer) at
    /// `width` x `height`. A zero size means the current viewport.
    pub unsafe fn render_to_fbo(
        &mut self,
        gl: &glow::Context,
        ctx: ContextId,
        fbo: Option<glow::NativeFramebuffer>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        assert!(self.finalized, "render called before finalize");
        let (origin, (width, height)) = if width == 0 || height == 0 {
            let mut viewport = [0i32; 4];
            gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
            split_viewport(viewport)
        } else {
            ((0, 0), (width, height))
        };
        self.render(gl, ctx, Target::Framebuffer { fbo, origin }, width, height)
    }

    /// Render into one to four caller-owned textures, one per fragment
    /// output. A chain ending in a compute shader writes the single
    /// destination directly and skips its display phase.
    pub unsafe fn render_to_texture(
        &mut self,
        gl: &glow::Context,
        ctx: ContextId,
        destinations: &[DestinationTexture],
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        assert!(self.finalized, "render called before finalize");
        assert!(
            !destinations.is_empty() && destinations.len() <= MAX_FBO_ATTACHMENTS,
            "render_to_texture: between 1 and {MAX_FBO_ATTACHMENTS} destinations"
        );
        assert!(width > 0 && height > 0, "render_to_texture: empty destination");

        if self.has_dummy_effect {
            assert_eq!(
                destinations.len(),
                1,
                "render_to_texture: a compute shader writes exactly one texture"
            );
            return self.render(gl, ctx, Target::Images(destinations), width, height);
        }

        let textures: Vec<glow::NativeTexture> = destinations.iter().map(|d| d.texture).collect();
        let pool = Arc::clone(&self.pool);
        let fbo = pool.create_fbo(gl, ctx, &textures)?;
        let target = Target::Framebuffer {
            fbo: Some(fbo),
            origin: (0, 0),
        };
        let result = self.render(gl, ctx, target, width, height);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        pool.release_fbo(gl, ctx, fbo);
        result
    }

    /// How many phases a render runs. Writing straight into textures after
    /// a compute tail skips the display phase.
    pub(super) fn phases_to_run(&self, skip_display: bool) -> usize {
        let n = self.phases.len();
        if !skip_display {
            return n;
        }
        assert!(n >= 2, "a display phase needs a phase before it");
        let last = &self.phases[n - 1];
        assert!(
            last.effects.len() == 1
                && self.graph.get(last.effects[0]).kind() == EffectKind::ComputeShaderOutputDisplay,
            "the last phase is not the compute display pass"
        );
        assert!(self.phases[n - 2].is_compute_shader);
        n - 1
    }

    unsafe fn render(
        &mut self,
        gl: &glow::Context,
        ctx: ContextId,
        target: Target<'_>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        let num_phases = self.phases_to_run(matches!(target, Target::Images(_)));

        gl.disable(glow::DITHER);
        gl.disable(glow::BLEND);
        gl.disable(glow::DEPTH_TEST);
        gl.depth_mask(false);
        if capabilities().dialect == GlslDialect::Desktop {
            gl.disable(glow::FRAMEBUFFER_SRGB);
        }

        let mut output_textures: HashMap<usize, glow::NativeTexture> = HashMap::new();
        let result = self.run_phases(
            gl,
            ctx,
            &target,
            num_phases,
            (width, height),
            &mut output_textures,
        );

        for (_, tex) in output_textures.drain() {
            self.pool.release_2d_texture(gl, tex);
        }
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        gl.use_program(None);
        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);
        gl.active_texture(glow::TEXTURE0);

        if self.timing_active() {
            for phase in &mut self.phases {
                phase.timer.poll(gl);
            }
        }
        result
    }

    unsafe fn run_phases(
        &mut self,
        gl: &glow::Context,
        ctx: ContextId,
        target: &Target<'_>,
        num_phases: usize,
        (width, height): (u32, u32),
        output_textures: &mut HashMap<usize, glow::NativeTexture>,
    ) -> Result<(), EngineError> {
        let mut refcount: HashMap<usize, usize> = HashMap::new();
        for phase in &self.phases[..num_phases] {
            for &q in &phase.inputs {
                *refcount.entry(q).or_default() += 1;
            }
        }
        let mut generated_mipmaps: HashSet<usize> = HashSet::new();
        let timing = self.timing_active();
        let pool = Arc::clone(&self.pool);

        for p in 0..num_phases {
            let is_last = p + 1 == num_phases;
            self.inform_input_sizes(p);
            self.find_output_size(p);

            let intermediate;
            let destinations: &[DestinationTexture] = if is_last {
                let phase = &mut self.phases[p];
                phase.output_width = width;
                phase.output_height = height;
                if let Some(dither) = self.dither_node {
                    let effect = self.graph.get_mut(dither).effect_mut();
                    let accepted = effect.set_int("output_width", width as i32)
                        && effect.set_int("output_height", height as i32);
                    assert!(accepted, "dither effect rejects its output size");
                }
                match target {
                    Target::Images(images) => *images,
                    Target::Framebuffer { fbo, origin } => {
                        assert!(
                            !self.phases[p].is_compute_shader,
                            "a compute phase cannot write a framebuffer"
                        );
                        gl.bind_framebuffer(glow::FRAMEBUFFER, *fbo);
                        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
                        if status != glow::FRAMEBUFFER_COMPLETE {
                            return Err(EngineError::FramebufferIncomplete(status));
                        }
                        gl.viewport(origin.0, origin.1, width as i32, height as i32);
                        &[]
                    }
                }
            } else {
                let (w, h) = self.phases[p].output_size();
                let format = self.config.intermediate_format;
                let tex = pool.create_2d_texture(gl, format, w, h)?;
                gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MIN_FILTER,
                    glow::LINEAR as i32,
                );
                output_textures.insert(p, tex);
                intermediate = [DestinationTexture {
                    texture: tex,
                    format,
                }];
                &intermediate
            };

            if timing {
                self.phases[p].timer.begin(gl)?;
            }
            let executed =
                self.execute_phase(gl, ctx, p, output_textures, destinations, &mut generated_mipmaps);
            if timing {
                self.phases[p].timer.end(gl);
            }
            executed?;

            for q in self.phases[p].inputs.clone() {
                let Some(count) = refcount.get_mut(&q) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    if let Some(tex) = output_textures.remove(&q) {
                        pool.release_2d_texture(gl, tex);
                    }
                }
            }
        }
        Ok(())
    }

    /// Give every node of phase `p` its (virtual) output size and tell each
    /// effect the sizes of its inputs.
    fn inform_input_sizes(&mut self, p: usize) {
        let effects = self.phases[p].effects.clone();
        for &id in &effects {
            let node = self.graph.get_mut(id);
            let size = node.effect().as_input().map(|input| (input.width(), input.height()));
            match size {
                Some((w, h)) => {
                    assert!(w > 0 && h > 0, "input {id} has no size");
                    node.output_width = w;
                    node.output_height = h;
                }
                None => {
                    node.output_width = 0;
                    node.output_height = 0;
                }
            }
        }
        for q in self.phases[p].inputs.clone() {
            let (vw, vh) = self.phases[q].virtual_output_size();
            assert!(vw > 0 && vh > 0, "phase {q} has no output size");
            let node = self.graph.get_mut(self.phases[q].output_node);
            node.output_width = vw;
            node.output_height = vh;
        }

        for &id in &effects {
            let incoming = self.graph.incoming(id).to_vec();
            if incoming.is_empty() {
                continue;
            }
            let sizes: Vec<(u32, u32)> = incoming
                .iter()
                .map(|&i| self.graph.get(i).output_size())
                .collect();
            let common = if sizes.iter().all(|&s| s == sizes[0]) {
                sizes[0]
            } else {
                (0, 0)
            };

            let node = self.graph.get_mut(id);
            let effect = node.effect_mut();
            for (i, &(w, h)) in sizes.iter().enumerate() {
                effect.inform_input_size(i, w, h);
            }
            let (w, h) = if effect.changes_output_size() {
                let size = effect.get_output_size();
                assert!(
                    effect.sets_virtual_output_size()
                        || (size.width == size.virtual_width && size.height == size.virtual_height),
                    "{} reports a virtual size without setting one",
                    effect.effect_type_id()
                );
                (size.virtual_width, size.virtual_height)
            } else {
                common
            };
            node.output_width = w;
            node.output_height = h;
        }
    }

    /// Pick the render size of phase `p`: what its output effect asks for,
    /// the common size of its inputs, or the smallest rectangle of the
    /// chain's aspect that holds them all.
    fn find_output_size(&mut self, p: usize) {
        let phase = &self.phases[p];
        let output = phase.compute_shader_node.unwrap_or(phase.output_node);
        let effect = self.graph.get(output).effect();
        if effect.changes_output_size() {
            let size = effect.get_output_size();
            assert!(size.width > 0 && size.height > 0, "{output} reports an empty size");
            let phase = &mut self.phases[p];
            phase.output_width = size.width;
            phase.output_height = size.height;
            phase.virtual_output_width = size.virtual_width;
            phase.virtual_output_height = size.virtual_height;
            return;
        }

        let mut sizes: Vec<(u32, u32)> = phase
            .inputs
            .iter()
            .map(|&q| self.phases[q].virtual_output_size())
            .collect();
        let mut real_sizes: Vec<(u32, u32)> = phase
            .inputs
            .iter()
            .map(|&q| self.phases[q].output_size())
            .collect();
        for &id in &phase.effects {
            if let Some(input) = self.graph.get(id).effect().as_input() {
                sizes.push((input.width(), input.height()));
                real_sizes.push((input.width(), input.height()));
            }
        }
        assert!(!sizes.is_empty(), "phase {p} has neither inputs nor sources");

        let (w, h) = if sizes.iter().all(|&s| s == sizes[0]) {
            sizes[0]
        } else {
            let (nom, denom) = (self.config.aspect_nom, self.config.aspect_denom);
            real_sizes.iter().fold((0, 0), |current, &(w, h)| {
                size_rectangle_to_fit(w, h, nom, denom, current)
            })
        };
        assert!(w > 0 && h > 0, "phase {p} has no output size");
        let phase = &mut self.phases[p];
        phase.output_width = w;
        phase.output_height = h;
        phase.virtual_output_width = w;
        phase.virtual_output_height = h;
    }

    unsafe fn execute_phase(
        &mut self,
        gl: &glow::Context,
        ctx: ContextId,
        p: usize,
        output_textures: &HashMap<usize, glow::NativeTexture>,
        destinations: &[DestinationTexture],
        generated_mipmaps: &mut HashSet<usize>,
    ) -> Result<(), EngineError> {
        let pool = Arc::clone(&self.pool);
        let master = ensure_program(gl, &pool, &mut self.phases[p])?;

        let inputs = self.phases[p].inputs.clone();
        let effects = self.phases[p].effects.clone();
        for (i, &q) in inputs.iter().enumerate() {
            let Some(&tex) = output_textures.get(&q) else {
                panic!("phase {p} reads phase {q}, which has no texture");
            };
            gl.active_texture(glow::TEXTURE0 + i as u32);
            gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            let producer = self.phases[q].output_node;
            self.graph.get_mut(producer).bound_sampler_num = Some(i as u32);

            let (mut needs, mut refuses) = (false, false);
            for &id in &effects {
                let node = self.graph.get(id);
                let reads_it = self
                    .graph
                    .incoming(id)
                    .iter()
                    .zip(&node.incoming_link_type)
                    .any(|(&src, &link)| src == producer && link == LinkType::InAnotherPhase);
                if reads_it {
                    match node.needs_mipmaps {
                        MipmapRequirements::NeedsMipmaps => needs = true,
                        MipmapRequirements::CannotAcceptMipmaps => refuses = true,
                        MipmapRequirements::DoesNotNeedMipmaps => {}
                    }
                }
            }
            assert!(
                !(needs && refuses),
                "phase {p}: consumers of phase {q} disagree on mipmaps"
            );
            if needs && generated_mipmaps.insert(q) {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            let min_filter = if needs {
                glow::LINEAR_MIPMAP_NEAREST
            } else {
                glow::LINEAR
            };
            set_sampling(gl, min_filter, glow::LINEAR);
            self.phases[p].input_samplers[i] = i as i32;
        }

        let instance = pool.use_glsl_program(gl, master)?;
        let mut fbo = None;
        let drawn = self.draw_phase(gl, ctx, p, instance, destinations, &mut fbo);

        for &id in &effects {
            self.graph.get_mut(id).effect_mut().clear_gl_state(gl);
        }
        pool.unuse_glsl_program(gl, instance);
        if let Some(fbo) = fbo {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            pool.release_fbo(gl, ctx, fbo);
        }
        drawn
    }

    unsafe fn draw_phase(
        &mut self,
        gl: &glow::Context,
        ctx: ContextId,
        p: usize,
        instance: glow::NativeProgram,
        destinations: &[DestinationTexture],
        fbo: &mut Option<glow::NativeFramebuffer>,
    ) -> Result<(), EngineError> {
        let (w, h) = self.phases[p].output_size();
        let compute_node = self.phases[p].compute_shader_node;
        let is_compute = self.phases[p].is_compute_shader;

        if is_compute {
            let Some(cs) = compute_node else {
                panic!("compute phase {p} has no compute node");
            };
            assert_eq!(
                destinations.len(),
                1,
                "compute phase {p} writes exactly one texture"
            );
            let dest = destinations[0];
            gl.bind_image_texture(0, dest.texture, 0, false, 0, glow::WRITE_ONLY, dest.format);
            let (fw, fh) = (w as f32, h as f32);
            let params = self.graph.get_mut(cs).effect_mut().params_mut();
            params.set_uniform("output_size", UniformValue::IVec2([w as i32, h as i32]));
            params.set_uniform("inv_output_size", UniformValue::Vec2([1.0 / fw, 1.0 / fh]));
            params.set_uniform(
                "output_texcoord_adjust",
                UniformValue::Vec2([0.5 / fw, 0.5 / fh]),
            );
        } else if !destinations.is_empty() {
            let textures: Vec<glow::NativeTexture> =
                destinations.iter().map(|d| d.texture).collect();
            let created = self.pool.create_fbo(gl, ctx, &textures)?;
            *fbo = Some(created);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(created));
            gl.viewport(0, 0, w as i32, h as i32);
        }

        let caps = capabilities();
        let mut sampler_num = self.phases[p].inputs.len() as u32;
        for (k, id) in self.phases[p].effects.clone().into_iter().enumerate() {
            let prefix = format!("eff{k}");
            let input_samplers: Vec<Option<u32>> = self
                .graph
                .incoming(id)
                .iter()
                .zip(&self.graph.get(id).incoming_link_type)
                .map(|(&dep, &link)| {
                    let dep = self.graph.get(dep);
                    if link == LinkType::InAnotherPhase || dep.is_single_texture() {
                        dep.bound_sampler_num
                    } else {
                        None
                    }
                })
                .collect();

            let before = sampler_num;
            let node = self.graph.get_mut(id);
            let single_texture = node.is_single_texture();
            {
                let mut setup =
                    SetupContext::new(instance, &prefix, caps, &mut sampler_num, input_samplers);
                node.effect_mut().set_gl_state(gl, &mut setup)?;
            }
            if single_texture {
                assert_eq!(
                    sampler_num,
                    before + 1,
                    "single-texture input {id} must bind exactly one sampler"
                );
                node.bound_sampler_num = Some(before);
            } else {
                node.bound_sampler_num = None;
            }
        }

        if let Some(cs) = compute_node {
            let [x, y, z] = self.graph.get(cs).effect().get_compute_dimensions(w, h);
            upload_uniforms(gl, &self.graph, &mut self.phases[p], instance);
            gl.dispatch_compute(x, y, z);
            gl.memory_barrier(glow::TEXTURE_FETCH_BARRIER_BIT | glow::TEXTURE_UPDATE_BARRIER_BIT);
        } else {
            upload_uniforms(gl, &self.graph, &mut self.phases[p], instance);
            self.pool.fullscreen_triangle(gl, ctx)?.draw(gl);
        }
        Ok(())
    }
}

/// Upload every uniform slot of `phase` into `instance`, resolving
/// locations once per instance.
unsafe fn upload_uniforms(
    gl: &glow::Context,
    graph: &Graph<Node>,
    phase: &mut Phase,
    instance: glow::NativeProgram,
) {
    let slots = &phase.program.uniforms;
    let locations = phase.uniform_locations.entry(instance).or_insert_with(|| {
        slots
            .iter()
            .map(|slot| gl.get_uniform_location(instance, &slot.glsl_name))
            .collect()
    });

    for (slot, location) in slots.iter().zip(locations.iter()) {
        // Uniforms the driver optimised away have no location.
        let Some(location) = location.as_ref() else {
            continue;
        };
        match &slot.source {
            UniformSource::Effect { node, name } => {
                let Some(value) = graph.get(*node).effect().params().get(name) else {
                    panic!("uniform {} lost its value", slot.glsl_name);
                };
                set_uniform(gl, location, value);
            }
            UniformSource::InputSampler(i) => {
                gl.uniform_1_i32(Some(location), phase.input_samplers[*i]);
            }
            UniformSource::OutputImage => gl.uniform_1_i32(Some(location), 0),
        }
    }
}

unsafe fn set_uniform(
    gl: &glow::Context,
    location: &glow::NativeUniformLocation,
    value: &UniformValue,
) {
    let loc = Some(location);
    match value {
        UniformValue::Int(v) | UniformValue::Sampler2D(v) | UniformValue::Image2D(v) => {
            gl.uniform_1_i32(loc, *v)
        }
        UniformValue::Bool(b) => gl.uniform_1_i32(loc, i32::from(*b)),
        UniformValue::Float(v) => gl.uniform_1_f32(loc, *v),
        UniformValue::Vec2([x, y]) => gl.uniform_2_f32(loc, *x, *y),
        UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(loc, *x, *y, *z),
        UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(loc, *x, *y, *z, *w),
        UniformValue::IVec2([x, y]) => gl.uniform_2_i32(loc, *x, *y),
        UniformValue::FloatArray(v) => gl.uniform_1_f32_slice(loc, v),
        UniformValue::Vec2Array(v) => gl.uniform_2_f32_slice(loc, bytemuck::cast_slice(v)),
        UniformValue::Vec3Array(v) => gl.uniform_3_f32_slice(loc, bytemuck::cast_slice(v)),
        UniformValue::Vec4Array(v) => gl.uniform_4_f32_slice(loc, bytemuck::cast_slice(v)),
        UniformValue::Mat3(m) => gl.uniform_matrix_3_f32_slice(loc, false, m),
    }
}

#[cfg(test)]
mod tests {
    use movit_core::{ChainConfig, ImageFormat, OutputAlphaFormat};
    use movit_graph::NodeId;

    use super::*;
    use crate::testing::{MockEffect, MockInput, MockProfile};

    fn two_input_chain(a: (u32, u32), b: (u32, u32)) -> (EffectChain, NodeId) {
        let mut chain = EffectChain::new(ChainConfig::new(16.0, 9.0));
        let in_a = chain.add_input(MockInput::new(ImageFormat::SRGB, a.0, a.1));
        let in_b = chain.add_input(MockInput::new(ImageFormat::SRGB, b.0, b.1));
        let mix = chain.add_effect_with_inputs(
            MockEffect::new(MockProfile {
                num_inputs: 2,
                ..MockProfile::passthrough()
            }),
            &[in_a, in_b],
        );
        chain.add_output(ImageFormat::SRGB, OutputAlphaFormat::Premultiplied);
        chain.finalize();
        (chain, mix)
    }

    #[test]
    fn equal_inputs_keep_their_size() {
        let (mut chain, mix) = two_input_chain((64, 36), (64, 36));
        assert_eq!(chain.phases().len(), 1);
        chain.inform_input_sizes(0);
        chain.find_output_size(0);

        assert_eq!(chain.phases()[0].output_size(), (64, 36));
        assert_eq!(chain.node(mix).output_size(), (64, 36));
        let mock = chain.effect_as::<MockEffect>(mix).unwrap();
        assert_eq!(mock.input_sizes(), &[(64, 36), (64, 36)]);
    }

    #[test]
    fn mismatched_inputs_fit_the_chain_aspect() {
        let (mut chain, mix) = two_input_chain((64, 64), (32, 18));
        chain.inform_input_sizes(0);
        chain.find_output_size(0);

        // 64x64 needs a 114x64 frame at 16:9; 32x18 fits inside it.
        assert_eq!(chain.phases()[0].output_size(), (114, 64));
        assert_eq!(chain.node(mix).output_size(), (0, 0));
        let mock = chain.effect_as::<MockEffect>(mix).unwrap();
        assert_eq!(mock.input_sizes(), &[(64, 64), (32, 18)]);
    }

    fn compute() -> MockProfile {
        MockProfile {
            is_compute_shader: true,
            one_to_one_sampling: false,
            strong_one_to_one_sampling: false,
            ..MockProfile::passthrough()
        }
    }

    fn compute_chain() -> EffectChain {
        let mut chain = EffectChain::new(ChainConfig::new(16.0, 9.0));
        chain.add_input(MockInput::new(ImageFormat::SRGB, 64, 36));
        chain.add_effect(MockEffect::new(compute()));
        chain.add_output(ImageFormat::SRGB, OutputAlphaFormat::Premultiplied);
        chain.finalize();
        chain
    }

    #[test]
    fn texture_output_skips_the_display_phase() {
        let chain = compute_chain();
        assert!(chain.has_dummy_effect());
        assert_eq!(chain.phases_to_run(false), 2);
        assert_eq!(chain.phases_to_run(true), 1);
        assert!(chain.phases()[0].is_compute_shader());
    }

    #[test]
    #[should_panic(expected = "needs a phase before it")]
    fn skipping_the_display_phase_needs_a_compute_tail() {
        let (chain, _) = two_input_chain((64, 36), (64, 36));
        let _ = chain.phases_to_run(true);
    }

    #[test]
    fn mix_after_compute_still_ends_in_a_fragment_phase() {
        let mut chain = EffectChain::new(ChainConfig::new(16.0, 9.0));
        let a = chain.add_input(MockInput::new(ImageFormat::SRGB, 64, 36));
        let cs = chain.add_effect_with_inputs(MockEffect::new(compute()), &[a]);
        let b = chain.add_input(MockInput::new(ImageFormat::SRGB, 64, 36));
        chain.add_effect_with_inputs(
            MockEffect::new(MockProfile {
                num_inputs: 2,
                ..MockProfile::passthrough()
            }),
            &[cs, b],
        );
        chain.add_output(ImageFormat::SRGB, OutputAlphaFormat::Premultiplied);
        chain.finalize();

        assert!(chain.has_dummy_effect());
        let last = chain.phases_to_run(false) - 1;
        assert!(!chain.phases()[last].is_compute_shader());
        assert_eq!(chain.phases_to_run(true), last);
    }

    #[test]
    fn queried_viewport_keeps_its_origin() {
        assert_eq!(split_viewport([16, 8, 640, 360]), ((16, 8), (640, 360)));
        assert_eq!(split_viewport([0, 0, -1, 10]), ((0, 0), (0, 10)));
    }
}
