use crate::effect::Effect;
use crate::params::Params;
use crate::shaders::read_shader;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	return INPUT(tc);
}
"#;

/// Returns its input unchanged. Mostly useful for testing chain plumbing.
#[derive(Debug, Default)]
pub struct IdentityEffect {
    params: Params,
}

impl IdentityEffect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Effect for IdentityEffect {
    fn effect_type_id(&self) -> &'static str {
        "IdentityEffect"
    }

    fn strong_one_to_one_sampling(&self) -> bool {
        true
    }

    fn output_fragment_shader(&mut self) -> String {
        read_shader("identity.frag", FRAG)
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}
