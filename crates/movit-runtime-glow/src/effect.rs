//! The contract every effect and input exposes to the pipeline compiler.

use std::any::Any;
use std::fmt;

use movit_core::{Colorspace, EngineError, GammaCurve, MipmapRequirements};
use movit_graph::NodeId;

use crate::chain::GraphRewriter;
use crate::init::Capabilities;
use crate::params::{Params, UniformValue};

/// How an effect treats the alpha channel of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaHandling {
    /// Inputs only: alpha is always 1.
    OutputBlankAlpha,
    /// Inputs only: colour is not multiplied by alpha.
    OutputPostmultipliedAlpha,
    /// Wants premultiplied (or blank) input, produces premultiplied output.
    /// Requires linear light.
    InputAndOutputPremultipliedAlpha,
    /// As above, but blank input stays blank.
    InputPremultipliedAlphaKeepBlank,
    /// Output alpha type equals the (unanimous) input alpha type.
    DontCareAlphaType,
}

/// Effects the compiler inserts or treats specially, recognised by type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    GammaExpansion,
    GammaCompression,
    ColorspaceConversion,
    AlphaMultiplication,
    AlphaDivision,
    YCbCrConversion,
    Dither,
    ComputeShaderOutputDisplay,
    Other,
}

impl EffectKind {
    pub fn from_type_id(id: &str) -> Self {
        match id {
            "GammaExpansionEffect" => EffectKind::GammaExpansion,
            "GammaCompressionEffect" => EffectKind::GammaCompression,
            "ColorspaceConversionEffect" => EffectKind::ColorspaceConversion,
            "AlphaMultiplicationEffect" => EffectKind::AlphaMultiplication,
            "AlphaDivisionEffect" => EffectKind::AlphaDivision,
            "YCbCrConversionEffect" => EffectKind::YCbCrConversion,
            "DitherEffect" => EffectKind::Dither,
            "ComputeShaderOutputDisplayEffect" => EffectKind::ComputeShaderOutputDisplay,
            _ => EffectKind::Other,
        }
    }

    pub fn is_gamma_conversion(self) -> bool {
        matches!(self, EffectKind::GammaExpansion | EffectKind::GammaCompression)
    }
}

/// Result of `Effect::get_output_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
    pub virtual_width: u32,
    pub virtual_height: u32,
}

impl OutputSize {
    /// Real and virtual size are the same.
    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            virtual_width: width,
            virtual_height: height,
        }
    }
}

/// What an effect sees while setting up GL state for one draw.
pub struct SetupContext<'a> {
    pub program: glow::NativeProgram,
    /// Per-instance uniform prefix, e.g. `eff2`.
    pub prefix: &'a str,
    pub capabilities: &'a Capabilities,
    sampler_num: &'a mut u32,
    input_samplers: Vec<Option<u32>>,
}

impl fmt::Debug for SetupContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupContext")
            .field("prefix", &self.prefix)
            .field("sampler_num", &*self.sampler_num)
            .field("input_samplers", &self.input_samplers)
            .finish()
    }
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(
        program: glow::NativeProgram,
        prefix: &'a str,
        capabilities: &'a Capabilities,
        sampler_num: &'a mut u32,
        input_samplers: Vec<Option<u32>>,
    ) -> Self {
        Self {
            program,
            prefix,
            capabilities,
            sampler_num,
            input_samplers,
        }
    }

    /// Claim the next free texture unit.
    pub fn next_sampler(&mut self) -> u32 {
        let n = *self.sampler_num;
        *self.sampler_num += 1;
        n
    }

    /// Texture unit holding input `i`, if that input was bound as a texture
    /// (bounced from another phase, or a single-texture input).
    pub fn input_sampler(&self, i: usize) -> Option<u32> {
        self.input_samplers.get(i).copied().flatten()
    }
}

/// Downcasting hook so callers can reach the concrete type of an effect the
/// chain owns (e.g. to upload new pixels into a `FlatInput`).
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An image transformation with a declared capability profile.
///
/// Capability predicates must be pure functions of the effect's
/// configuration; the compiler may call them any number of times.
pub trait Effect: AsAny + fmt::Debug + Send {
    /// Stable behavioural key, e.g. `"BlurEffect"`.
    fn effect_type_id(&self) -> &'static str;

    fn kind(&self) -> EffectKind {
        EffectKind::from_type_id(self.effect_type_id())
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn needs_linear_light(&self) -> bool {
        true
    }

    fn needs_srgb_primaries(&self) -> bool {
        true
    }

    fn needs_texture_bounce(&self) -> bool {
        false
    }

    fn needs_mipmaps(&self) -> MipmapRequirements {
        MipmapRequirements::DoesNotNeedMipmaps
    }

    fn one_to_one_sampling(&self) -> bool {
        self.strong_one_to_one_sampling()
    }

    fn strong_one_to_one_sampling(&self) -> bool {
        false
    }

    fn changes_output_size(&self) -> bool {
        self.sets_virtual_output_size()
    }

    fn sets_virtual_output_size(&self) -> bool {
        false
    }

    fn is_compute_shader(&self) -> bool {
        false
    }

    fn override_disable_bounce(&self) -> bool {
        false
    }

    fn alpha_handling(&self) -> AlphaHandling {
        AlphaHandling::InputAndOutputPremultipliedAlpha
    }

    /// GLSL body with every per-instance identifier wrapped in `PREFIX(..)`.
    ///
    /// Called once per finalize, after which the uniform set is frozen. An
    /// effect may still register uniforms here (e.g. arrays sized from its
    /// configuration).
    fn output_fragment_shader(&mut self) -> String;

    fn params(&self) -> &Params;

    fn params_mut(&mut self) -> &mut Params;

    #[must_use]
    fn set_int(&mut self, key: &str, value: i32) -> bool {
        self.params_mut().set_param(key, UniformValue::Int(value))
    }

    #[must_use]
    fn set_float(&mut self, key: &str, value: f32) -> bool {
        self.params_mut().set_param(key, UniformValue::Float(value))
    }

    #[must_use]
    fn set_vec2(&mut self, key: &str, value: [f32; 2]) -> bool {
        self.params_mut().set_param(key, UniformValue::Vec2(value))
    }

    #[must_use]
    fn set_vec3(&mut self, key: &str, value: [f32; 3]) -> bool {
        self.params_mut().set_param(key, UniformValue::Vec3(value))
    }

    #[must_use]
    fn set_vec4(&mut self, key: &str, value: [f32; 4]) -> bool {
        self.params_mut().set_param(key, UniformValue::Vec4(value))
    }

    #[must_use]
    fn set_ivec2(&mut self, key: &str, value: [i32; 2]) -> bool {
        self.params_mut().set_param(key, UniformValue::IVec2(value))
    }

    /// Called when the effect is placed into a chain.
    fn inform_added(&mut self, _node: NodeId) {}

    /// Replace this node by a sub-graph. Called once during finalize; an
    /// effect that rewrites itself disables `self_node` and re-routes its
    /// edges with `replace_sender` / `replace_receiver`.
    fn rewrite_graph(&mut self, _graph: &mut GraphRewriter<'_>, _self_node: NodeId) {}

    /// Nodes that receive the same parameter updates as this one, typically
    /// the sub-graph created by `rewrite_graph`.
    fn forwarded_to(&self) -> &[NodeId] {
        &[]
    }

    fn inform_input_size(&mut self, _input: usize, _width: u32, _height: u32) {}

    /// Only called when `changes_output_size()` is true.
    fn get_output_size(&self) -> OutputSize {
        panic!(
            "{} changes output size but does not report one",
            self.effect_type_id()
        )
    }

    /// Work-group counts for a compute dispatch covering the output.
    fn get_compute_dimensions(&self, output_width: u32, output_height: u32) -> [u32; 3] {
        [output_width, output_height, 1]
    }

    /// Per-draw setup: bind textures, tune sampler state on bounced inputs,
    /// refresh registered uniforms.
    ///
    /// # Safety
    /// The GL context that owns the chain's resources must be current.
    unsafe fn set_gl_state(
        &mut self,
        _gl: &glow::Context,
        _ctx: &mut SetupContext<'_>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// # Safety
    /// As for `set_gl_state`.
    unsafe fn clear_gl_state(&mut self, _gl: &glow::Context) {}

    /// Release GL objects owned by the effect.
    ///
    /// # Safety
    /// As for `set_gl_state`.
    unsafe fn destroy(&mut self, _gl: &glow::Context) {}

    fn as_input(&self) -> Option<&dyn Input> {
        None
    }

    fn as_input_mut(&mut self) -> Option<&mut dyn Input> {
        None
    }
}

/// Extra contract of zero-input effects that supply pixels.
pub trait Input: fmt::Debug {
    /// Whether the input can decode to linear light on fetch
    /// (`output_linear_gamma = 1`).
    fn can_output_linear_gamma(&self) -> bool;

    fn can_supply_mipmaps(&self) -> bool {
        true
    }

    /// Exactly one texture sampled through exactly one sampler unit.
    fn is_single_texture(&self) -> bool {
        true
    }

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn color_space(&self) -> Colorspace;

    fn gamma_curve(&self) -> GammaCurve;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_ids_are_recognised() {
        assert_eq!(
            EffectKind::from_type_id("GammaCompressionEffect"),
            EffectKind::GammaCompression
        );
        assert!(EffectKind::from_type_id("GammaExpansionEffect").is_gamma_conversion());
        assert_eq!(EffectKind::from_type_id("BlurEffect"), EffectKind::Other);
    }

    #[test]
    fn output_size_exact_sets_virtual_size() {
        let s = OutputSize::exact(640, 360);
        assert_eq!((s.virtual_width, s.virtual_height), (640, 360));
    }
}
