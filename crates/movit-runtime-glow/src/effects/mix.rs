use crate::effect::Effect;
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	return PREFIX(strength_first) * INPUT1(tc) + PREFIX(strength_second) * INPUT2(tc);
}
"#;

/// Weighted sum of two inputs.
///
/// With the default strengths of 1.0 this is plain addition; set
/// `strength_first = 1 - t`, `strength_second = t` for a crossfade.
#[derive(Debug)]
pub struct MixEffect {
    params: Params,
}

impl Default for MixEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl MixEffect {
    pub fn new() -> Self {
        let mut params = Params::new();
        params.register_param("strength_first", UniformValue::Float(1.0));
        params.register_param("strength_second", UniformValue::Float(1.0));
        Self { params }
    }
}

impl Effect for MixEffect {
    fn effect_type_id(&self) -> &'static str {
        "MixEffect"
    }

    fn num_inputs(&self) -> usize {
        2
    }

    fn strong_one_to_one_sampling(&self) -> bool {
        true
    }

    fn output_fragment_shader(&mut self) -> String {
        read_shader("mix_effect.frag", FRAG)
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

    #[test]
    fn strengths_are_settable_floats() {
        let mut m = MixEffect::new();
        assert!(m.set_float("strength_first", 0.25));
        assert!(!m.set_int("strength_first", 1));
        assert!(!m.set_float("strength_third", 1.0));
        assert_eq!(m.params().float("strength_first"), 0.25);
        assert_eq!(m.num_inputs(), 2);
    }
}
