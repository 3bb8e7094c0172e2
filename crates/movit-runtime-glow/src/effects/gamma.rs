use movit_core::GammaCurve;
use movit_runtime::TransferCurve;

use crate::effect::{AlphaHandling, Effect};
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const EXPANSION_FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	vec4 x = INPUT(tc);
	vec3 toe = x.rgb * PREFIX(inv_slope);
	vec3 power = pow(max((x.rgb + PREFIX(alpha_minus_one)) * PREFIX(inv_alpha), 0.0), vec3(PREFIX(gamma)));
	x.rgb = mix(toe, power, step(PREFIX(breakpoint), x.rgb));
	return x;
}
"#;

const COMPRESSION_FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	vec4 x = INPUT(tc);
	vec3 toe = x.rgb * PREFIX(slope);
	vec3 power = PREFIX(alpha) * pow(max(x.rgb, 0.0), vec3(PREFIX(inv_gamma))) - (PREFIX(alpha) - 1.0);
	x.rgb = mix(toe, power, step(PREFIX(beta), x.rgb));
	return x;
}
"#;

fn valid_curve(code: i32) -> Option<TransferCurve> {
    GammaCurve::from_i32(code).and_then(TransferCurve::for_curve)
}

/// Non-linear -> linear light.
#[derive(Debug)]
pub struct GammaExpansionEffect {
    params: Params,
}

impl GammaExpansionEffect {
    pub fn new(source_curve: GammaCurve) -> Self {
        let mut params = Params::new();
        params.register_param_only("source_curve", UniformValue::Int(source_curve.as_i32()));
        for name in ["inv_slope", "alpha_minus_one", "inv_alpha", "gamma", "breakpoint"] {
            params.register_uniform(name, UniformValue::Float(0.0));
        }
        let mut effect = Self { params };
        effect.update_uniforms();
        effect
    }

    pub fn source_curve(&self) -> GammaCurve {
        GammaCurve::from_i32(self.params.int("source_curve")).unwrap_or(GammaCurve::Invalid)
    }

    fn update_uniforms(&mut self) {
        let Some(c) = valid_curve(self.params.int("source_curve")) else {
            return;
        };
        let p = &mut self.params;
        p.set_uniform("inv_slope", UniformValue::Float(1.0 / c.slope));
        p.set_uniform("alpha_minus_one", UniformValue::Float(c.alpha - 1.0));
        p.set_uniform("inv_alpha", UniformValue::Float(1.0 / c.alpha));
        p.set_uniform("gamma", UniformValue::Float(c.gamma));
        p.set_uniform("breakpoint", UniformValue::Float(c.encoded_breakpoint()));
    }
}

impl Effect for GammaExpansionEffect {
    fn effect_type_id(&self) -> &'static str {
        "GammaExpansionEffect"
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
        read_shader("gamma_expansion_effect.frag", EXPANSION_FRAG)
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        if key == "source_curve" && valid_curve(value).is_none() {
            return false;
        }
        if !self.params.set_param(key, UniformValue::Int(value)) {
            return false;
        }
        self.update_uniforms();
        true
    }
}

/// Linear light -> non-linear. Expects postmultiplied (or blank) alpha.
#[derive(Debug)]
pub struct GammaCompressionEffect {
    params: Params,
}

impl GammaCompressionEffect {
    pub fn new(destination_curve: GammaCurve) -> Self {
        let mut params = Params::new();
        params.register_param_only(
            "destination_curve",
            UniformValue::Int(destination_curve.as_i32()),
        );
        for name in ["slope", "alpha", "inv_gamma", "beta"] {
            params.register_uniform(name, UniformValue::Float(0.0));
        }
        let mut effect = Self { params };
        effect.update_uniforms();
        effect
    }

    pub fn destination_curve(&self) -> GammaCurve {
        GammaCurve::from_i32(self.params.int("destination_curve")).unwrap_or(GammaCurve::Invalid)
    }

    fn update_uniforms(&mut self) {
        let Some(c) = valid_curve(self.params.int("destination_curve")) else {
            return;
        };
        let p = &mut self.params;
        p.set_uniform("slope", UniformValue::Float(c.slope));
        p.set_uniform("alpha", UniformValue::Float(c.alpha));
        p.set_uniform("inv_gamma", UniformValue::Float(1.0 / c.gamma));
        p.set_uniform("beta", UniformValue::Float(c.beta));
    }
}

impl Effect for GammaCompressionEffect {
    fn effect_type_id(&self) -> &'static str {
        "GammaCompressionEffect"
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
        read_shader("gamma_compression_effect.frag", COMPRESSION_FRAG)
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        if key == "destination_curve" && valid_curve(value).is_none() {
            return false;
        }
        if !self.params.set_param(key, UniformValue::Int(value)) {
            return false;
        }
        self.update_uniforms();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_uniforms_follow_curve() {
        let e = GammaExpansionEffect::new(GammaCurve::Srgb);
        assert_eq!(e.params().float("gamma"), 2.4);
        assert!((e.params().float("breakpoint") - 0.04045).abs() < 1e-5);
    }

    #[test]
    fn linear_is_not_a_valid_curve() {
        let mut e = GammaCompressionEffect::new(GammaCurve::Rec709);
        assert!(!e.set_int("destination_curve", GammaCurve::Linear.as_i32()));
        assert_eq!(e.destination_curve(), GammaCurve::Rec709);
        assert!(e.set_int("destination_curve", GammaCurve::Srgb.as_i32()));
        assert_eq!(e.params().float("slope"), 12.92);
    }

    #[test]
    fn compression_needs_linear_input_expansion_does_not() {
        assert!(GammaCompressionEffect::new(GammaCurve::Srgb).needs_linear_light());
        assert!(!GammaExpansionEffect::new(GammaCurve::Srgb).needs_linear_light());
    }
}
