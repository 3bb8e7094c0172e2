use glam::DVec3;
use movit_core::{YCbCrFormat, YCbCrOutputType};
use movit_runtime::{mat3_to_gl, YCbCrMatrices};

use crate::effect::{AlphaHandling, Effect};
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const FRAG: &str = r#"#if defined(YCBCR_ALSO_OUTPUT_RGBA)
vec4[2] FUNCNAME(vec2 tc) {
#else
vec4 FUNCNAME(vec2 tc) {
#endif
	vec4 rgba = INPUT(tc);
	vec4 ycbcr_a;
	ycbcr_a.rgb = PREFIX(ycbcr_matrix) * rgba.rgb + PREFIX(offset);
	if (PREFIX(clamp_range)) {
		// Keep out of the reserved sync levels of studio range.
		ycbcr_a.rgb = clamp(ycbcr_a.rgb, PREFIX(ycbcr_min), PREFIX(ycbcr_max));
	}
	ycbcr_a.a = rgba.a;
#if defined(YCBCR_ALSO_OUTPUT_RGBA)
	return vec4[2](ycbcr_a, rgba);
#else
	return ycbcr_a;
#endif
}
"#;

fn to_array(v: DVec3) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}

/// Gamma-encoded R'G'B' -> Y'CbCr code values (normalised). Appended by the
/// chain as the last colour effect when a Y'CbCr output is requested.
#[derive(Debug)]
pub struct YCbCrConversionEffect {
    params: Params,
    format: YCbCrFormat,
    output_type: YCbCrOutputType,
}

impl YCbCrConversionEffect {
    pub fn new(format: YCbCrFormat, output_type: YCbCrOutputType) -> Self {
        let mut params = Params::new();
        params.register_uniform("ycbcr_matrix", UniformValue::Mat3([0.0; 9]));
        params.register_uniform("offset", UniformValue::Vec3([0.0; 3]));
        params.register_uniform("clamp_range", UniformValue::Bool(false));
        params.register_uniform("ycbcr_min", UniformValue::Vec3([0.0; 3]));
        params.register_uniform("ycbcr_max", UniformValue::Vec3([1.0; 3]));
        let mut effect = Self {
            params,
            format,
            output_type,
        };
        effect.update_uniforms();
        effect
    }

    pub fn format(&self) -> &YCbCrFormat {
        &self.format
    }

    /// Switch to another Y'CbCr format after finalize. Only the uniforms
    /// change, so the compiled program stays valid.
    pub fn change_format(&mut self, format: YCbCrFormat) {
        self.format = format;
        self.update_uniforms();
    }

    fn update_uniforms(&mut self) {
        let m = YCbCrMatrices::new(&self.format);
        let clamp = !self.format.full_range && self.output_type != YCbCrOutputType::Float;
        let levels = f64::from(self.format.num_levels.max(2));
        let unit = levels / 256.0;
        let top = levels - 1.0;
        let min = DVec3::splat(16.0 * unit / top);
        let max = DVec3::new(235.0 * unit / top, 240.0 * unit / top, 240.0 * unit / top);

        let p = &mut self.params;
        p.set_uniform(
            "ycbcr_matrix",
            UniformValue::Mat3(mat3_to_gl(&m.encode_matrix())),
        );
        p.set_uniform("offset", UniformValue::Vec3(to_array(m.offset)));
        p.set_uniform("clamp_range", UniformValue::Bool(clamp));
        p.set_uniform("ycbcr_min", UniformValue::Vec3(to_array(min)));
        p.set_uniform("ycbcr_max", UniformValue::Vec3(to_array(max)));
    }
}

impl Effect for YCbCrConversionEffect {
    fn effect_type_id(&self) -> &'static str {
        "YCbCrConversionEffect"
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
        read_shader("ycbcr_conversion_effect.frag", FRAG)
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}
