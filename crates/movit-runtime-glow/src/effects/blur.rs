//! Separable blur, approximating a Gaussian with a logistic kernel.
//!
//! `BlurEffect` is a placeholder that rewrites itself into a horizontal and a
//! vertical `SingleBlurPassEffect`. Each pass has `NUM_TAPS` taps on either
//! side of the centre, folded pairwise into bilinear fetches, so large radii
//! are handled by sampling a smaller mip level.

use movit_core::{EngineError, MipmapRequirements};
use movit_graph::NodeId;
use movit_runtime::combine_two_samples;

use crate::chain::GraphRewriter;
use crate::effect::{Effect, OutputSize, SetupContext};
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

/// Taps on each side of the centre sample.
pub const NUM_TAPS: u32 = 16;

const NUM_SAMPLES: usize = NUM_TAPS as usize / 2 + 1;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	vec4 sum = vec4(PREFIX(samples)[0].y) * INPUT(tc);
	for (int i = 1; i < PREFIX(num_taps) / 2 + 1; ++i) {
		vec2 s = PREFIX(samples)[i];
		vec2 tc1 = tc, tc2 = tc;
#if PREFIX(direction_vertical)
		tc1.y -= s.x;
		tc2.y += s.x;
#else
		tc1.x -= s.x;
		tc2.x += s.x;
#endif
		sum += vec4(s.y) * (INPUT(tc1) + INPUT(tc2));
	}
	return sum;
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurDirection {
    Horizontal,
    Vertical,
}

impl BlurDirection {
    fn as_i32(self) -> i32 {
        match self {
            BlurDirection::Horizontal => 0,
            BlurDirection::Vertical => 1,
        }
    }

    fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(BlurDirection::Horizontal),
            1 => Some(BlurDirection::Vertical),
            _ => None,
        }
    }
}

/// Halve (width, height) until `num_taps` taps reach about 1.5 sigma.
/// Returns the mip size and the radius measured in mip texels.
pub fn blur_mip_level(width: u32, height: u32, radius: f32, num_taps: u32) -> (u32, u32, f32) {
    let (mut mw, mut mh) = (width.max(1), height.max(1));
    let mut adjusted = radius;
    while (mw > 1 || mh > 1) && adjusted * 1.5 > (num_taps / 2) as f32 {
        mw = (mw / 2).max(1);
        mh = (mh / 2).max(1);
        adjusted = radius * mw as f32 / width.max(1) as f32;
    }
    (mw, mh, adjusted)
}

/// Normalised kernel weights for taps 0..=num_taps.
fn kernel_weights(radius: f32, num_taps: u32) -> Vec<f32> {
    let n = num_taps as usize + 1;
    let mut weight = vec![0.0f32; n];
    if radius < 1e-3 {
        weight[0] = 1.0;
        return weight;
    }
    for (i, w) in weight.iter_mut().enumerate() {
        let c = (i as f32 / (2.0 * 0.5513 * radius)).cosh();
        *w = 1.0 / (c * c);
    }
    let sum = weight[0] + 2.0 * weight[1..].iter().sum::<f32>();
    for w in &mut weight {
        *w /= sum;
    }
    weight
}

/// `(offset, weight)` pairs for the shader; entry 0 is the centre tap,
/// offsets are in normalised texture coordinates for a `size`-texel axis.
fn blur_samples(radius: f32, num_taps: u32, size: u32, num_subtexels: f32) -> Vec<[f32; 2]> {
    let weight = kernel_weights(radius, num_taps);
    let size = size.max(1) as f32;
    let mut samples = Vec::with_capacity(num_taps as usize / 2 + 1);
    samples.push([0.0, weight[0]]);
    for i in 1..=(num_taps as usize / 2) {
        let base = 2 * i - 1;
        let c = combine_two_samples(
            weight[base],
            weight[base + 1],
            base as f32 / size,
            1.0 / size,
            num_subtexels,
        );
        samples.push([c.offset, c.total_weight]);
    }
    samples
}

/// One direction of the blur.
#[derive(Debug)]
pub struct SingleBlurPassEffect {
    params: Params,
    input_width: u32,
    input_height: u32,
}

impl SingleBlurPassEffect {
    pub fn new(direction: BlurDirection, radius: f32) -> Self {
        let mut params = Params::new();
        params.register_param_only("radius", UniformValue::Float(radius));
        params.register_param_only("direction", UniformValue::Int(direction.as_i32()));
        params.register_uniform(
            "samples",
            UniformValue::Vec2Array(vec![[0.0, 0.0]; NUM_SAMPLES]),
        );
        Self {
            params,
            input_width: 1,
            input_height: 1,
        }
    }

    pub fn direction(&self) -> BlurDirection {
        BlurDirection::from_i32(self.params.int("direction")).unwrap_or(BlurDirection::Horizontal)
    }

    fn mip_level(&self) -> (u32, u32, f32) {
        blur_mip_level(
            self.input_width,
            self.input_height,
            self.params.float("radius"),
            NUM_TAPS,
        )
    }
}

impl Effect for SingleBlurPassEffect {
    fn effect_type_id(&self) -> &'static str {
        "SingleBlurPassEffect"
    }

    fn needs_texture_bounce(&self) -> bool {
        true
    }

    fn needs_mipmaps(&self) -> MipmapRequirements {
        match self.direction() {
            BlurDirection::Horizontal => MipmapRequirements::NeedsMipmaps,
            BlurDirection::Vertical => MipmapRequirements::DoesNotNeedMipmaps,
        }
    }

    fn sets_virtual_output_size(&self) -> bool {
        true
    }

    fn inform_input_size(&mut self, _input: usize, width: u32, height: u32) {
        self.input_width = width;
        self.input_height = height;
    }

    /// The horizontal pass renders at the reduced mip size. The vertical
    /// pass reads that texture and writes the full virtual size.
    fn get_output_size(&self) -> OutputSize {
        match self.direction() {
            BlurDirection::Horizontal => {
                let (mw, mh, _) = self.mip_level();
                OutputSize {
                    width: mw,
                    height: mh,
                    virtual_width: self.input_width,
                    virtual_height: self.input_height,
                }
            }
            BlurDirection::Vertical => OutputSize::exact(self.input_width, self.input_height),
        }
    }

    fn output_fragment_shader(&mut self) -> String {
        let vertical = i32::from(self.direction() == BlurDirection::Vertical);
        format!(
            "#define PREFIX(direction_vertical) {vertical}\n#define PREFIX(num_taps) {NUM_TAPS}\n{}",
            read_shader("blur_effect.frag", FRAG)
        )
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_float(&mut self, key: &str, value: f32) -> bool {
        key == "radius" && value >= 0.0 && self.params.set_param(key, UniformValue::Float(value))
    }

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        key == "direction"
            && BlurDirection::from_i32(value).is_some()
            && self.params.set_param(key, UniformValue::Int(value))
    }

    unsafe fn set_gl_state(
        &mut self,
        _gl: &glow::Context,
        ctx: &mut SetupContext<'_>,
    ) -> Result<(), EngineError> {
        let (mw, mh, radius) = self.mip_level();
        let size = match self.direction() {
            BlurDirection::Horizontal => mw,
            BlurDirection::Vertical => mh,
        };
        let samples = blur_samples(radius, NUM_TAPS, size, ctx.capabilities.num_subtexels());
        self.params
            .set_uniform("samples", UniformValue::Vec2Array(samples));
        Ok(())
    }
}

/// Two-pass blur with a client-settable `radius` (in pixels, default 3).
#[derive(Debug)]
pub struct BlurEffect {
    params: Params,
    passes: Vec<NodeId>,
}

impl Default for BlurEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl BlurEffect {
    pub fn new() -> Self {
        let mut params = Params::new();
        params.register_param_only("radius", UniformValue::Float(3.0));
        Self {
            params,
            passes: Vec::new(),
        }
    }
}

impl Effect for BlurEffect {
    fn effect_type_id(&self) -> &'static str {
        "BlurEffect"
    }

    fn output_fragment_shader(&mut self) -> String {
        unreachable!("BlurEffect is rewritten into single passes before code generation")
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_float(&mut self, key: &str, value: f32) -> bool {
        key == "radius" && value >= 0.0 && self.params.set_param(key, UniformValue::Float(value))
    }

    fn rewrite_graph(&mut self, graph: &mut GraphRewriter<'_>, self_node: NodeId) {
        let radius = self.params.float("radius");
        let h = graph.add_effect(Box::new(SingleBlurPassEffect::new(
            BlurDirection::Horizontal,
            radius,
        )));
        let v = graph.add_effect(Box::new(SingleBlurPassEffect::new(
            BlurDirection::Vertical,
            radius,
        )));
        graph.connect(h, v);
        graph.replace_receiver(self_node, h);
        graph.replace_sender(self_node, v);
        graph.disable(self_node);
        self.passes = vec![h, v];
    }

    fn forwarded_to(&self) -> &[NodeId] {
        &self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn small_radius_keeps_full_resolution() {
        assert_eq!(blur_mip_level(1280, 720, 3.0, NUM_TAPS), (1280, 720, 3.0));
    }

    #[test]
    fn large_radius_drops_mip_levels() {
        let (w, h, r) = blur_mip_level(1280, 720, 20.0, NUM_TAPS);
        assert_eq!((w, h), (320, 180));
        assert_abs_diff_eq!(r, 5.0, epsilon = 1e-5);
        assert!(r * 1.5 <= (NUM_TAPS / 2) as f32);
    }

    #[test]
    fn mip_level_stops_at_one_pixel() {
        let (w, h, _) = blur_mip_level(4, 2, 1000.0, NUM_TAPS);
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn zero_radius_is_a_passthrough_kernel() {
        let s = blur_samples(0.0, NUM_TAPS, 640, 64.0);
        assert_eq!(s.len(), NUM_SAMPLES);
        assert_eq!(s[0], [0.0, 1.0]);
        assert!(s[1..].iter().all(|p| p[1] == 0.0));
    }

    #[test]
    fn kernel_weights_sum_to_one() {
        let w = kernel_weights(3.0, NUM_TAPS);
        let sum = w[0] + 2.0 * w[1..].iter().sum::<f32>();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-5);
        assert!(w.windows(2).all(|p| p[0] >= p[1]));
    }

    #[test]
    fn combined_samples_sit_between_their_taps() {
        let size = 640;
        let s = blur_samples(3.0, NUM_TAPS, size, 64.0);
        for (i, p) in s.iter().enumerate().skip(1) {
            let base = (2 * i - 1) as f32 / size as f32;
            assert!(p[0] >= base && p[0] <= base + 1.0 / size as f32);
        }
    }

    #[test]
    fn pass_reports_mip_size_and_virtual_input_size() {
        let mut pass = SingleBlurPassEffect::new(BlurDirection::Horizontal, 20.0);
        pass.inform_input_size(0, 1280, 720);
        let size = pass.get_output_size();
        assert_eq!((size.width, size.height), (320, 180));
        assert_eq!((size.virtual_width, size.virtual_height), (1280, 720));
        assert_eq!(pass.needs_mipmaps(), MipmapRequirements::NeedsMipmaps);
    }

    #[test]
    fn vertical_pass_restores_the_full_size() {
        let mut pass = SingleBlurPassEffect::new(BlurDirection::Vertical, 20.0);
        pass.inform_input_size(0, 1280, 720);
        let size = pass.get_output_size();
        assert_eq!((size.width, size.height), (1280, 720));
        assert_eq!((size.virtual_width, size.virtual_height), (1280, 720));
    }

    #[test]
    fn shader_defines_direction() {
        let mut pass = SingleBlurPassEffect::new(BlurDirection::Vertical, 3.0);
        let src = pass.output_fragment_shader();
        assert!(src.starts_with("#define PREFIX(direction_vertical) 1\n"));
        assert!(src.contains("#define PREFIX(num_taps) 16\n"));
    }

    #[test]
    fn radius_must_be_non_negative() {
        let mut blur = BlurEffect::new();
        assert!(!blur.set_float("radius", -1.0));
        assert!(blur.set_float("radius", 8.0));
        assert!(!blur.set_float("strength", 1.0));
    }
}
