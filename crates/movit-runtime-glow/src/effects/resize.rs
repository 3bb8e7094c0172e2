use glow::HasContext;
use movit_core::EngineError;

use crate::effect::{Effect, OutputSize, SetupContext};
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	return INPUT(tc);
}
"#;

/// Scale to a fixed size with plain bilinear filtering.
#[derive(Debug)]
pub struct ResizeEffect {
    params: Params,
}

impl ResizeEffect {
    pub fn new(width: u32, height: u32) -> Self {
        let mut params = Params::new();
        params.register_param_only("width", UniformValue::Int(width as i32));
        params.register_param_only("height", UniformValue::Int(height as i32));
        Self { params }
    }
}

impl Effect for ResizeEffect {
    fn effect_type_id(&self) -> &'static str {
        "ResizeEffect"
    }

    fn needs_texture_bounce(&self) -> bool {
        true
    }

    fn changes_output_size(&self) -> bool {
        true
    }

    fn get_output_size(&self) -> OutputSize {
        OutputSize::exact(
            self.params.int("width") as u32,
            self.params.int("height") as u32,
        )
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

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        if value <= 0 {
            return false;
        }
        self.params.set_param(key, UniformValue::Int(value))
    }

    unsafe fn set_gl_state(
        &mut self,
        gl: &glow::Context,
        ctx: &mut SetupContext<'_>,
    ) -> Result<(), EngineError> {
        // Downscaling from a mipmapped input would otherwise pick up the
        // mip filter the producer chose.
        if let Some(unit) = ctx.input_sampler(0) {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        }
        Ok(())
    }
}
