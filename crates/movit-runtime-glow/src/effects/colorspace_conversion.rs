use movit_core::Colorspace;
use movit_runtime::{conversion_matrix, mat3_to_gl};

use crate::effect::{AlphaHandling, Effect};
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	vec4 x = INPUT(tc);
	x.rgb = PREFIX(conversion_matrix) * x.rgb;
	return x;
}
"#;

/// Linear-light change of primaries, e.g. Rec. 601 -> sRGB or sRGB -> XYZ.
#[derive(Debug)]
pub struct ColorspaceConversionEffect {
    params: Params,
}

impl ColorspaceConversionEffect {
    pub fn new(source: Colorspace, destination: Colorspace) -> Self {
        let mut params = Params::new();
        params.register_param_only("source_space", UniformValue::Int(source.as_i32()));
        params.register_param_only("destination_space", UniformValue::Int(destination.as_i32()));
        params.register_uniform("conversion_matrix", UniformValue::Mat3([0.0; 9]));
        let mut effect = Self { params };
        effect.update_matrix();
        effect
    }

    pub fn source_space(&self) -> Colorspace {
        Colorspace::from_i32(self.params.int("source_space")).unwrap_or(Colorspace::Invalid)
    }

    pub fn destination_space(&self) -> Colorspace {
        Colorspace::from_i32(self.params.int("destination_space")).unwrap_or(Colorspace::Invalid)
    }

    fn update_matrix(&mut self) {
        let (src, dst) = (self.source_space(), self.destination_space());
        if src == Colorspace::Invalid || dst == Colorspace::Invalid {
            return;
        }
        let m = conversion_matrix(src, dst);
        self.params
            .set_uniform("conversion_matrix", UniformValue::Mat3(mat3_to_gl(&m)));
    }
}

impl Effect for ColorspaceConversionEffect {
    fn effect_type_id(&self) -> &'static str {
        "ColorspaceConversionEffect"
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
        read_shader("colorspace_conversion_effect.frag", FRAG)
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        if matches!(key, "source_space" | "destination_space")
            && Colorspace::from_i32(value).is_none()
        {
            return false;
        }
        if !self.params.set_param(key, UniformValue::Int(value)) {
            return false;
        }
        self.update_matrix();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn apply(m: &[f32; 9], v: [f32; 3]) -> [f32; 3] {
        // Column-major.
        [
            m[0] * v[0] + m[3] * v[1] + m[6] * v[2],
            m[1] * v[0] + m[4] * v[1] + m[7] * v[2],
            m[2] * v[0] + m[5] * v[1] + m[8] * v[2],
        ]
    }

    #[test]
    fn srgb_white_to_xyz() {
        let e = ColorspaceConversionEffect::new(Colorspace::Srgb, Colorspace::Xyz);
        let m = match e.params().get("conversion_matrix") {
            Some(UniformValue::Mat3(m)) => *m,
            other => panic!("unexpected {other:?}"),
        };
        let xyz = apply(&m, [1.0, 1.0, 1.0]);
        assert_abs_diff_eq!(xyz[0], 0.9505, epsilon = 1e-3);
        assert_abs_diff_eq!(xyz[1], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(xyz[2], 1.0889, epsilon = 1e-3);
    }

    #[test]
    fn rejects_unknown_spaces() {
        let mut e = ColorspaceConversionEffect::new(Colorspace::Rec2020, Colorspace::Srgb);
        assert!(!e.set_int("source_space", 42));
        assert!(!e.set_int("destination_space", -1));
        assert_eq!(e.source_space(), Colorspace::Rec2020);
        assert!(e.set_int("source_space", Colorspace::Rec601_625.as_i32()));
        assert_eq!(e.source_space(), Colorspace::Rec601_625);
    }
}
