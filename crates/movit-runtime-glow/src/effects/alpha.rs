use crate::effect::{AlphaHandling, Effect};
use crate::params::Params;
use crate::shaders::read_shader;

const MULTIPLICATION_FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	vec4 x = INPUT(tc);
	x.rgb *= x.aaa;
	return x;
}
"#;

const DIVISION_FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	vec4 x = INPUT(tc);
	x.rgb *= 1.0 / max(x.a, 1e-10);
	return x;
}
"#;

/// Postmultiplied -> premultiplied alpha.
#[derive(Debug, Default)]
pub struct AlphaMultiplicationEffect {
    params: Params,
}

impl AlphaMultiplicationEffect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Effect for AlphaMultiplicationEffect {
    fn effect_type_id(&self) -> &'static str {
        "AlphaMultiplicationEffect"
    }

    fn alpha_handling(&self) -> AlphaHandling {
        AlphaHandling::DontCareAlphaType
    }

    fn strong_one_to_one_sampling(&self) -> bool {
        true
    }

    fn output_fragment_shader(&mut self) -> String {
        read_shader("alpha_multiplication_effect.frag", MULTIPLICATION_FRAG)
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}

/// Premultiplied -> postmultiplied alpha. Fully transparent pixels stay
/// zero instead of dividing by zero.
#[derive(Debug, Default)]
pub struct AlphaDivisionEffect {
    params: Params,
}

impl AlphaDivisionEffect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Effect for AlphaDivisionEffect {
    fn effect_type_id(&self) -> &'static str {
        "AlphaDivisionEffect"
    }

    fn alpha_handling(&self) -> AlphaHandling {
        AlphaHandling::DontCareAlphaType
    }

    fn strong_one_to_one_sampling(&self) -> bool {
        true
    }

    fn output_fragment_shader(&mut self) -> String {
        read_shader("alpha_division_effect.frag", DIVISION_FRAG)
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// CPU rendition of the two shaders.
    fn multiply(p: [f32; 4]) -> [f32; 4] {
        [p[0] * p[3], p[1] * p[3], p[2] * p[3], p[3]]
    }

    fn divide(p: [f32; 4]) -> [f32; 4] {
        let inv = 1.0 / p[3].max(1e-10);
        [p[0] * inv, p[1] * inv, p[2] * inv, p[3]]
    }

    #[test]
    fn division_recovers_postmultiplied_pixels() {
        let input = [[0.1, 0.5, 0.1, 0.5], [0.2, 0.2, 1.0, 1.0]];
        let expected = [[0.2, 1.0, 0.2, 0.5], [0.2, 0.2, 1.0, 1.0]];
        for (px, want) in input.iter().zip(expected) {
            let got = divide(*px);
            for c in 0..4 {
                assert!((got[c] - want[c]).abs() < 1e-6, "{got:?} != {want:?}");
            }
        }
    }

    #[test]
    fn zero_alpha_survives_both_directions() {
        let px = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(divide(px), px);
        assert_eq!(multiply(divide(px)), px);
        assert_eq!(multiply([0.7, 0.3, 0.1, 0.0]), px);
    }

    #[test]
    fn shaders_are_wired_to_the_right_ids() {
        assert!(AlphaMultiplicationEffect::new()
            .output_fragment_shader()
            .contains("x.rgb *= x.aaa"));
        assert_eq!(AlphaDivisionEffect::new().effect_type_id(), "AlphaDivisionEffect");
    }
}
