//! Small GL helpers shared by the resource pool, the probes and inputs.
#![allow(clippy::missing_safety_doc)]

use glow::HasContext;
use movit_core::EngineError;

/// Attribute slots every fragment phase binds before linking, so one VAO
/// layout serves all programs.
pub const ATTRIB_POSITION: u32 = 0;
pub const ATTRIB_TEXCOORD: u32 = 1;

unsafe fn compile_stage(
    gl: &glow::Context,
    stage: u32,
    src: &str,
) -> Result<glow::NativeShader, EngineError> {
    let shader = gl
        .create_shader(stage)
        .map_err(|e| EngineError::GlCreate(format!("create_shader(0x{stage:x}) failed: {e:?}")))?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        tracing::error!(stage, %log, "shader compile failed\n{src}");
        return Err(match stage {
            glow::VERTEX_SHADER => EngineError::VertexCompile(log),
            glow::COMPUTE_SHADER => EngineError::ComputeCompile(log),
            _ => EngineError::FragmentCompile(log),
        });
    }
    Ok(shader)
}

unsafe fn link(
    gl: &glow::Context,
    shaders: &[glow::NativeShader],
    before_link: impl FnOnce(glow::NativeProgram),
) -> Result<glow::NativeProgram, EngineError> {
    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            for &s in shaders {
                gl.delete_shader(s);
            }
            return Err(EngineError::GlCreate(format!("create_program failed: {e:?}")));
        }
    };
    for &s in shaders {
        gl.attach_shader(program, s);
    }
    before_link(program);
    gl.link_program(program);

    for &s in shaders {
        gl.detach_shader(program, s);
        gl.delete_shader(s);
    }

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        tracing::error!(%log, "program link failed");
        return Err(EngineError::Link(log));
    }
    Ok(program)
}

/// Compile and link a vertex + fragment program. `outputs` are bound to
/// draw buffers 0.. in order.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
    outputs: &[String],
) -> Result<glow::NativeProgram, EngineError> {
    let vs = compile_stage(gl, glow::VERTEX_SHADER, vert_src)?;
    let fs = match compile_stage(gl, glow::FRAGMENT_SHADER, frag_src) {
        Ok(fs) => fs,
        Err(e) => {
            gl.delete_shader(vs);
            return Err(e);
        }
    };
    link(gl, &[vs, fs], |program| {
        gl.bind_attrib_location(program, ATTRIB_POSITION, "position");
        gl.bind_attrib_location(program, ATTRIB_TEXCOORD, "texcoord");
        for (i, name) in outputs.iter().enumerate() {
            gl.bind_frag_data_location(program, i as u32, name);
        }
    })
}

pub unsafe fn compile_compute_program(
    gl: &glow::Context,
    src: &str,
) -> Result<glow::NativeProgram, EngineError> {
    let cs = compile_stage(gl, glow::COMPUTE_SHADER, src)?;
    link(gl, &[cs], |_| {})
}

/// One triangle covering the viewport; `position` and `texcoord` read the
/// same (0,0), (2,0), (0,2) vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullscreenTriangle {
    pub vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl FullscreenTriangle {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, EngineError> {
        let verts: [f32; 6] = [0.0, 0.0, 2.0, 0.0, 0.0, 2.0];

        let vao = gl
            .create_vertex_array()
            .map_err(|e| EngineError::GlCreate(format!("create_vertex_array: {e}")))?;
        let vbo = gl
            .create_buffer()
            .map_err(|e| EngineError::GlCreate(format!("create_buffer: {e}")))?;

        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&verts),
            glow::STATIC_DRAW,
        );

        for attrib in [ATTRIB_POSITION, ATTRIB_TEXCOORD] {
            gl.enable_vertex_attrib_array(attrib);
            gl.vertex_attrib_pointer_f32(attrib, 2, glow::FLOAT, false, 2 * 4, 0);
        }

        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);

        Ok(Self { vao, vbo })
    }

    pub unsafe fn draw(&self, gl: &glow::Context) {
        gl.bind_vertex_array(Some(self.vao));
        gl.draw_arrays(glow::TRIANGLES, 0, 3);
        gl.bind_vertex_array(None);
    }

    pub unsafe fn destroy(&self, gl: &glow::Context) {
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}

/// Set min/mag filter and clamp-to-edge wrapping on the bound 2D texture.
pub unsafe fn set_sampling(gl: &glow::Context, min_filter: u32, mag_filter: u32) {
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min_filter as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, mag_filter as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
}

/// Pixel transfer format and type for allocating `internal_format`.
pub fn transfer_format(internal_format: u32) -> (u32, u32) {
    use movit_runtime::texture_format as tf;
    let format = match internal_format {
        tf::R8 | tf::R16 | tf::R16F | tf::R32F => glow::RED,
        tf::RG8 | tf::RG16 | tf::RG16F | tf::RG32F => glow::RG,
        tf::RGB8 | tf::SRGB8 | tf::RGB16 | tf::RGB16F | tf::RGB32F | tf::RGB565
        | tf::R11F_G11F_B10F => glow::RGB,
        _ => glow::RGBA,
    };
    let ty = match internal_format {
        tf::R16F | tf::RG16F | tf::RGB16F | tf::RGBA16F | tf::R32F | tf::RG32F | tf::RGB32F
        | tf::RGBA32F | tf::R11F_G11F_B10F => glow::FLOAT,
        tf::R16 | tf::RG16 | tf::RGB16 | tf::RGBA16 => glow::UNSIGNED_SHORT,
        tf::RGB10_A2 => glow::UNSIGNED_INT_2_10_10_10_REV,
        tf::RGB565 => glow::UNSIGNED_SHORT_5_6_5,
        _ => glow::UNSIGNED_BYTE,
    };
    (format, ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_format_matches_internal_format() {
        assert_eq!(transfer_format(glow::RGBA16F), (glow::RGBA, glow::FLOAT));
        assert_eq!(transfer_format(glow::R8), (glow::RED, glow::UNSIGNED_BYTE));
        assert_eq!(transfer_format(glow::SRGB8_ALPHA8), (glow::RGBA, glow::UNSIGNED_BYTE));
        assert_eq!(transfer_format(glow::RG16), (glow::RG, glow::UNSIGNED_SHORT));
    }
}
