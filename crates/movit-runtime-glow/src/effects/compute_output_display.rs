use crate::effect::{AlphaHandling, Effect};
use crate::params::Params;
use crate::shaders::read_shader;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	return INPUT(tc);
}
"#;

/// Pass-through fragment phase appended after a compute shader so the
/// chain can still end in a framebuffer write. It always bounces, so it lands
/// in a phase of its own and can be dropped again when the caller renders
/// straight to textures.
#[derive(Debug, Default)]
pub struct ComputeShaderOutputDisplayEffect {
    params: Params,
}

impl ComputeShaderOutputDisplayEffect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Effect for ComputeShaderOutputDisplayEffect {
    fn effect_type_id(&self) -> &'static str {
        "ComputeShaderOutputDisplayEffect"
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

    fn one_to_one_sampling(&self) -> bool {
        true
    }

    fn needs_texture_bounce(&self) -> bool {
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
