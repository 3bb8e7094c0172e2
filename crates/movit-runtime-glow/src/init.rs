//! Process-wide initialisation and capability probes.
#![allow(clippy::missing_safety_doc)]

use std::sync::OnceLock;

use glow::HasContext;
use movit_core::{DebugLevel, EngineError, MovitSettings};
use movit_runtime::{count_wrongly_rounded, largest_gradient_step};

use crate::gl_util::{compile_program, set_sampling, FullscreenTriangle};
use crate::shaders::{ShaderLibrary, VS_VERT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslDialect {
    /// Desktop GL 3.3+ (`#version 330 core`, compute at 430).
    Desktop,
    /// GLES 3.0+ (`#version 300 es`, compute at 310 es).
    Es,
}

/// What the current driver can do, measured once by `init_movit`.
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub dialect: GlslDialect,
    pub compute_shaders: bool,
    pub timer_queries: bool,
    /// Smallest interpolation step of bilinear sampling, in texels.
    pub texel_subpixel_precision: f32,
    /// 8-bit levels the driver rounds the wrong way when writing output.
    pub num_wrongly_rounded: usize,
}

impl Capabilities {
    /// Used when `init_movit` has not run (e.g. when only finalizing).
    pub const FALLBACK: Capabilities = Capabilities {
        dialect: GlslDialect::Desktop,
        compute_shaders: false,
        timer_queries: false,
        texel_subpixel_precision: 1.0 / 64.0,
        num_wrongly_rounded: 0,
    };

    pub fn fragment_version(&self) -> &'static str {
        match self.dialect {
            GlslDialect::Desktop => "#version 330 core\n",
            GlslDialect::Es => "#version 300 es\nprecision highp float;\n",
        }
    }

    pub fn compute_version(&self) -> &'static str {
        match self.dialect {
            GlslDialect::Desktop => "#version 430 core\n",
            GlslDialect::Es => "#version 310 es\nprecision highp float;\nprecision highp image2D;\n",
        }
    }

    /// Interpolation positions the sampler resolves between two texels.
    pub fn num_subtexels(&self) -> f32 {
        1.0 / self.texel_subpixel_precision
    }
}

#[derive(Debug)]
struct Movit {
    settings: MovitSettings,
    caps: Capabilities,
    shaders: ShaderLibrary,
}

static MOVIT: OnceLock<Movit> = OnceLock::new();
static FALLBACK_CAPS: Capabilities = Capabilities::FALLBACK;
static BUILTIN_SHADERS: ShaderLibrary = ShaderLibrary::builtin_only();

/// Probe the current GL context and store process-wide settings.
///
/// Runs once per process; later calls return the stored record without
/// touching GL.
pub unsafe fn init_movit(
    gl: &glow::Context,
    settings: MovitSettings,
) -> Result<&'static Capabilities, EngineError> {
    if let Some(m) = MOVIT.get() {
        return Ok(&m.caps);
    }

    let caps = probe(gl)?;
    tracing::info!(
        dialect = ?caps.dialect,
        compute = caps.compute_shaders,
        timer_queries = caps.timer_queries,
        texel_subpixel_precision = caps.texel_subpixel_precision,
        wrongly_rounded = caps.num_wrongly_rounded,
        "movit initialised"
    );
    if caps.num_wrongly_rounded > 0 {
        tracing::warn!(
            levels = caps.num_wrongly_rounded,
            "driver rounds 8-bit output inconsistently; dither will round explicitly"
        );
    }

    let shaders = ShaderLibrary::new(settings.data_dir.clone());
    let m = MOVIT.get_or_init(|| Movit {
        settings,
        caps,
        shaders,
    });
    Ok(&m.caps)
}

pub fn capabilities() -> &'static Capabilities {
    MOVIT.get().map(|m| &m.caps).unwrap_or(&FALLBACK_CAPS)
}

pub fn shader_library() -> &'static ShaderLibrary {
    MOVIT.get().map(|m| &m.shaders).unwrap_or(&BUILTIN_SHADERS)
}

pub fn debug_level() -> DebugLevel {
    MOVIT
        .get()
        .map(|m| m.settings.debug_level)
        .unwrap_or_default()
}

unsafe fn probe(gl: &glow::Context) -> Result<Capabilities, EngineError> {
    let version = gl.version();
    let (major, minor) = (version.major, version.minor);
    if major < 3 {
        return Err(EngineError::Unsupported(format!(
            "GL {major}.{minor}; at least 3.0 is required"
        )));
    }
    let extensions = gl.supported_extensions();
    let at_least = |maj: u32, min: u32| (major, minor) >= (maj, min);

    let (dialect, compute_shaders, timer_queries) = if version.is_embedded {
        (
            GlslDialect::Es,
            at_least(3, 1),
            extensions.contains("GL_EXT_disjoint_timer_query"),
        )
    } else {
        (
            GlslDialect::Desktop,
            at_least(4, 3) || extensions.contains("GL_ARB_compute_shader"),
            at_least(3, 3) || extensions.contains("GL_ARB_timer_query"),
        )
    };

    let mut caps = Capabilities {
        dialect,
        compute_shaders,
        timer_queries,
        ..Capabilities::FALLBACK
    };

    match measure_texel_subpixel_precision(gl, &caps) {
        Ok(p) if p > 0.0 => caps.texel_subpixel_precision = p,
        Ok(_) => tracing::warn!("texel precision probe returned a flat ramp; using fallback"),
        Err(e) => tracing::warn!(error = %e, "texel precision probe failed; using fallback"),
    }
    match measure_roundoff_problems(gl, &caps) {
        Ok(n) => caps.num_wrongly_rounded = n,
        Err(e) => tracing::warn!(error = %e, "roundoff probe failed; assuming none"),
    }
    Ok(caps)
}

struct ProbeSource<'a> {
    internal_format: u32,
    width: i32,
    format: u32,
    ty: u32,
    pixels: &'a [u8],
    filter: u32,
}

/// Draw one full-width row through `frag_body` into a `dst_format` target
/// and read it back.
unsafe fn run_probe(
    gl: &glow::Context,
    caps: &Capabilities,
    src: ProbeSource<'_>,
    dst_format: u32,
    frag_body: &str,
    read: (u32, u32),
    out: &mut [u8],
) -> Result<(), EngineError> {
    let width = src.width;
    let src_tex = gl
        .create_texture()
        .map_err(|e| EngineError::GlCreate(format!("probe texture: {e}")))?;
    gl.bind_texture(glow::TEXTURE_2D, Some(src_tex));
    set_sampling(gl, src.filter, src.filter);
    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        src.internal_format as i32,
        width,
        1,
        0,
        src.format,
        src.ty,
        Some(src.pixels),
    );

    let dst_width = (out.len() / bytes_per_read_texel(read)) as i32;
    let dst_tex = gl
        .create_texture()
        .map_err(|e| EngineError::GlCreate(format!("probe target: {e}")))?;
    gl.bind_texture(glow::TEXTURE_2D, Some(dst_tex));
    set_sampling(gl, glow::NEAREST, glow::NEAREST);
    let (fmt, ty) = crate::gl_util::transfer_format(dst_format);
    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        dst_format as i32,
        dst_width,
        1,
        0,
        fmt,
        ty,
        None,
    );
    gl.bind_texture(glow::TEXTURE_2D, None);

    let result = (|| -> Result<(), EngineError> {
        let fbo = gl
            .create_framebuffer()
            .map_err(|e| EngineError::GlCreate(format!("probe fbo: {e}")))?;
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        gl.framebuffer_texture_2d(
            glow::FRAMEBUFFER,
            glow::COLOR_ATTACHMENT0,
            glow::TEXTURE_2D,
            Some(dst_tex),
            0,
        );
        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        if status != glow::FRAMEBUFFER_COMPLETE {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.delete_framebuffer(fbo);
            return Err(EngineError::FramebufferIncomplete(status));
        }

        let vs = format!("{}{}", caps.fragment_version(), VS_VERT);
        let fs = format!(
            "{}in vec2 tc;\nout vec4 FragColor;\nuniform sampler2D tex;\n{}",
            caps.fragment_version(),
            frag_body
        );
        let program = match compile_program(gl, &vs, &fs, &["FragColor".to_string()]) {
            Ok(p) => p,
            Err(e) => {
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                gl.delete_framebuffer(fbo);
                return Err(e);
            }
        };
        let tri = FullscreenTriangle::new(gl)?;

        gl.viewport(0, 0, dst_width, 1);
        gl.disable(glow::BLEND);
        gl.use_program(Some(program));
        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(src_tex));
        gl.uniform_1_i32(gl.get_uniform_location(program, "tex").as_ref(), 0);
        tri.draw(gl);

        gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
        gl.read_pixels(
            0,
            0,
            dst_width,
            1,
            read.0,
            read.1,
            glow::PixelPackData::Slice(out),
        );

        gl.use_program(None);
        gl.bind_texture(glow::TEXTURE_2D, None);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        tri.destroy(gl);
        gl.delete_program(program);
        gl.delete_framebuffer(fbo);
        Ok(())
    })();

    gl.delete_texture(src_tex);
    gl.delete_texture(dst_tex);
    result
}

fn bytes_per_read_texel(read: (u32, u32)) -> usize {
    match read.1 {
        glow::FLOAT => 4,
        _ => 1,
    }
}

/// Sample a 2-texel 0 -> 1 ramp across a wide row and report the largest
/// step between neighbouring outputs.
unsafe fn measure_texel_subpixel_precision(
    gl: &glow::Context,
    caps: &Capabilities,
) -> Result<f32, EngineError> {
    const WIDTH: usize = 1024;
    let ramp: [f32; 2] = [0.0, 1.0];
    let mut out = vec![0.0f32; WIDTH];
    run_probe(
        gl,
        caps,
        ProbeSource {
            internal_format: glow::R32F,
            width: 2,
            format: glow::RED,
            ty: glow::FLOAT,
            pixels: bytemuck::cast_slice(&ramp),
            filter: glow::LINEAR,
        },
        glow::R32F,
        &format!(
            "void main() {{\n\
             \tfloat x = (gl_FragCoord.x - 0.5) / {};\n\
             \tFragColor = texture(tex, vec2(0.25 + 0.5 * x, 0.5));\n\
             }}\n",
            (WIDTH - 1) as f32
        ),
        (glow::RED, glow::FLOAT),
        bytemuck::cast_slice_mut(out.as_mut_slice()),
    )?;
    Ok(largest_gradient_step(&out))
}

/// Write every 8-bit level as an exact float and count the ones that do not
/// come back as themselves.
unsafe fn measure_roundoff_problems(
    gl: &glow::Context,
    caps: &Capabilities,
) -> Result<usize, EngineError> {
    let levels: Vec<f32> = (0..256).map(|i| i as f32 / 255.0).collect();
    let mut out = vec![0u8; 256];
    run_probe(
        gl,
        caps,
        ProbeSource {
            internal_format: glow::R32F,
            width: 256,
            format: glow::RED,
            ty: glow::FLOAT,
            pixels: bytemuck::cast_slice(levels.as_slice()),
            filter: glow::NEAREST,
        },
        glow::RGBA8,
        "void main() {\n\tFragColor = texture(tex, tc);\n}\n",
        (glow::RED, glow::UNSIGNED_BYTE),
        &mut out,
    )?;
    Ok(count_wrongly_rounded(&out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_served_before_init() {
        // Tests never create a GL context, so init has not run.
        assert_eq!(capabilities(), &Capabilities::FALLBACK);
        assert_eq!(debug_level(), DebugLevel::Off);
        assert!(shader_library().data_dir().is_none());
    }

    #[test]
    fn version_lines_follow_dialect() {
        let mut caps = Capabilities::FALLBACK;
        assert!(caps.fragment_version().starts_with("#version 330"));
        assert!(caps.compute_version().starts_with("#version 430"));
        caps.dialect = GlslDialect::Es;
        assert!(caps.fragment_version().contains("precision highp float"));
        assert_eq!(Capabilities::FALLBACK.num_subtexels(), 64.0);
    }
}
