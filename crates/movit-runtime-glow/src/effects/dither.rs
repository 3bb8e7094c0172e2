use movit_core::{EngineError, MAX_DITHER_BITS};

use crate::effect::{AlphaHandling, Effect, SetupContext};
use crate::init::capabilities;
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const FRAG: &str = r#"float PREFIX(noise)(vec2 tc) {
	// Per output pixel, roughly uniform in [-0.5, 0.5).
	vec2 p = floor(tc * PREFIX(tc_scale));
	return fract(sin(dot(p, vec2(12.9898, 78.233))) * 43758.5453) - 0.5;
}

#if defined(YCBCR_ALSO_OUTPUT_RGBA)
vec4[2] FUNCNAME(vec2 tc) {
	vec4[2] result = INPUT(tc);
	float d = PREFIX(noise)(tc) * PREFIX(inv_round_fac);
	result[0].rgb += vec3(d);
	result[1].rgb += vec3(d);
#if PREFIX(explicit_round)
	result[0].rgb = round(result[0].rgb * PREFIX(round_fac)) * PREFIX(inv_round_fac);
	result[1].rgb = round(result[1].rgb * PREFIX(round_fac)) * PREFIX(inv_round_fac);
#endif
	return result;
}
#else
vec4 FUNCNAME(vec2 tc) {
	vec4 result = INPUT(tc);
	result.rgb += vec3(PREFIX(noise)(tc) * PREFIX(inv_round_fac));
#if PREFIX(explicit_round)
	result.rgb = round(result.rgb * PREFIX(round_fac)) * PREFIX(inv_round_fac);
#endif
	return result;
}
#endif
"#;

/// Adds one least-significant bit of noise before quantisation to
/// `num_bits`. Appended by the chain when dither bits are requested; the
/// executor keeps `output_width` / `output_height` up to date.
#[derive(Debug)]
pub struct DitherEffect {
    params: Params,
}

impl Default for DitherEffect {
    fn default() -> Self {
        Self::new(8)
    }
}

impl DitherEffect {
    pub fn new(num_bits: u32) -> Self {
        let mut params = Params::new();
        params.register_param_only("num_bits", UniformValue::Int(num_bits as i32));
        params.register_param_only("output_width", UniformValue::Int(1));
        params.register_param_only("output_height", UniformValue::Int(1));
        params.register_uniform("round_fac", UniformValue::Float(0.0));
        params.register_uniform("inv_round_fac", UniformValue::Float(0.0));
        params.register_uniform("tc_scale", UniformValue::Vec2([1.0, 1.0]));
        let mut effect = Self { params };
        effect.update_uniforms();
        effect
    }

    fn update_uniforms(&mut self) {
        let bits = self.params.int("num_bits");
        let round_fac = ((1u64 << bits) - 1) as f32;
        let (w, h) = (self.params.int("output_width"), self.params.int("output_height"));
        let p = &mut self.params;
        p.set_uniform("round_fac", UniformValue::Float(round_fac));
        p.set_uniform("inv_round_fac", UniformValue::Float(1.0 / round_fac));
        p.set_uniform("tc_scale", UniformValue::Vec2([w as f32, h as f32]));
    }
}

impl Effect for DitherEffect {
    fn effect_type_id(&self) -> &'static str {
        "DitherEffect"
    }

    fn needs_linear_light(&self) -> bool {
        false
    }

    fn needs_srgb_primaries(&self) -> bool {
        false
    }

    fn alpha_handling(&self) -> AlphaHandling {
        AlphaHandling::DontCareAlphaType
    }

    fn strong_one_to_one_sampling(&self) -> bool {
        true
    }

    fn output_fragment_shader(&mut self) -> String {
        let explicit_round = i32::from(capabilities().num_wrongly_rounded > 0);
        format!(
            "#define PREFIX(explicit_round) {explicit_round}\n{}",
            read_shader("dither_effect.frag", FRAG)
        )
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        let ok = match key {
            "num_bits" => (1..=MAX_DITHER_BITS as i32).contains(&value),
            "output_width" | "output_height" => value > 0,
            _ => false,
        };
        ok && self.params.set_param(key, UniformValue::Int(value))
    }

    unsafe fn set_gl_state(
        &mut self,
        _gl: &glow::Context,
        _ctx: &mut SetupContext<'_>,
    ) -> Result<(), EngineError> {
        self.update_uniforms();
        Ok(())
    }
}
