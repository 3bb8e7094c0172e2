use glam::DVec3;
use glow::HasContext;
use movit_core::{Colorspace, EngineError, GammaCurve, ImageFormat, YCbCrFormat};
use movit_runtime::{chroma_offset, mat3_to_gl, texture_format as tf, YCbCrMatrices};

use super::UploadTexture;
use crate::effect::{AlphaHandling, Effect, Input, SetupContext};
use crate::gl_util::set_sampling;
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	tc.y = 1.0 - tc.y;
	vec3 ycbcr;
#if PREFIX(interleaved)
	ycbcr = texture(PREFIX(tex_y), tc).xyz;
#elif PREFIX(split)
	ycbcr.x = texture(PREFIX(tex_y), tc).x;
	ycbcr.yz = texture(PREFIX(tex_cbcr), tc + PREFIX(cb_offset)).xy;
#else
	ycbcr.x = texture(PREFIX(tex_y), tc).x;
	ycbcr.y = texture(PREFIX(tex_cb), tc + PREFIX(cb_offset)).x;
	ycbcr.z = texture(PREFIX(tex_cr), tc + PREFIX(cr_offset)).x;
#endif
	ycbcr -= PREFIX(offset);
	return vec4(PREFIX(inv_ycbcr_matrix) * ycbcr, 1.0);
}
"#;

/// How the Y', Cb and Cr samples are laid out in client memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YCbCrInputSplitting {
    /// Three planes: Y', Cb, Cr.
    Planar,
    /// Y' plane plus one interleaved CbCr plane (NV12 style).
    SplitYAndCbCr,
    /// One plane of Y'CbCr triplets; no chroma subsampling.
    Interleaved,
}

impl YCbCrInputSplitting {
    fn num_planes(self) -> usize {
        match self {
            YCbCrInputSplitting::Planar => 3,
            YCbCrInputSplitting::SplitYAndCbCr => 2,
            YCbCrInputSplitting::Interleaved => 1,
        }
    }

    fn sampler_names(self) -> &'static [&'static str] {
        match self {
            YCbCrInputSplitting::Planar => &["tex_y", "tex_cb", "tex_cr"],
            YCbCrInputSplitting::SplitYAndCbCr => &["tex_y", "tex_cbcr"],
            YCbCrInputSplitting::Interleaved => &["tex_y"],
        }
    }
}

#[derive(Debug)]
struct Plane {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
    texture: UploadTexture,
}

impl Plane {
    fn new(width: u32, height: u32, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0; width as usize * height as usize * channels],
            texture: UploadTexture::new(),
        }
    }

    fn internal_format(&self) -> (u32, u32) {
        match self.channels {
            1 => (tf::R8, glow::RED),
            2 => (tf::RG8, glow::RG),
            _ => (tf::RGB8, glow::RGB),
        }
    }
}

/// 8-bit Y'CbCr decoded to gamma-encoded R'G'B' in the shader.
#[derive(Debug)]
pub struct YCbCrInput {
    params: Params,
    format: ImageFormat,
    ycbcr: YCbCrFormat,
    splitting: YCbCrInputSplitting,
    width: u32,
    height: u32,
    planes: Vec<Plane>,
}

impl YCbCrInput {
    pub fn new(
        format: ImageFormat,
        ycbcr: YCbCrFormat,
        width: u32,
        height: u32,
        splitting: YCbCrInputSplitting,
    ) -> Self {
        assert!(width > 0 && height > 0, "YCbCrInput: empty image");
        let mut params = Params::new();
        params.register_param_only("needs_mipmaps", UniformValue::Int(0));
        for name in splitting.sampler_names() {
            params.register_uniform(name, UniformValue::Sampler2D(0));
        }
        params.register_uniform("inv_ycbcr_matrix", UniformValue::Mat3([0.0; 9]));
        params.register_uniform("offset", UniformValue::Vec3([0.0; 3]));
        params.register_uniform("cb_offset", UniformValue::Vec2([0.0; 2]));
        params.register_uniform("cr_offset", UniformValue::Vec2([0.0; 2]));
        let mut input = Self {
            params,
            format,
            ycbcr,
            splitting,
            width,
            height,
            planes: Vec::new(),
        };
        input.change_ycbcr_format(ycbcr);
        input
    }

    pub fn splitting(&self) -> YCbCrInputSplitting {
        self.splitting
    }

    pub fn ycbcr_format(&self) -> &YCbCrFormat {
        &self.ycbcr
    }

    /// (width, height) of plane `i`.
    pub fn plane_size(&self, plane: usize) -> (u32, u32) {
        let p = &self.planes[plane];
        (p.width, p.height)
    }

    /// Replace one plane's samples, rows top to bottom, tightly packed.
    pub fn set_plane_data(&mut self, plane: usize, data: Vec<u8>) {
        assert!(
            plane < self.planes.len(),
            "YCbCrInput: plane {plane} out of range"
        );
        let p = &mut self.planes[plane];
        assert_eq!(
            data.len(),
            p.width as usize * p.height as usize * p.channels,
            "YCbCrInput: plane {plane} data does not match {}x{}",
            p.width,
            p.height
        );
        p.data = data;
        p.texture.dirty = true;
    }

    /// Switch coefficients, range or chroma siting between renders. A change
    /// of subsampling reallocates the chroma planes (zeroed).
    pub fn change_ycbcr_format(&mut self, ycbcr: YCbCrFormat) {
        let (sx, sy) = (
            ycbcr.chroma_subsampling_x.max(1),
            ycbcr.chroma_subsampling_y.max(1),
        );
        if self.splitting == YCbCrInputSplitting::Interleaved {
            assert!(
                sx == 1 && sy == 1,
                "YCbCrInput: interleaved input cannot be chroma subsampled"
            );
        }
        let (cw, ch) = (self.width.div_ceil(sx), self.height.div_ceil(sy));
        let layout_changed = self.planes.is_empty()
            || self.planes.len() > 1 && self.plane_size(1) != (cw, ch);
        if layout_changed {
            self.planes = match self.splitting {
                YCbCrInputSplitting::Planar => vec![
                    Plane::new(self.width, self.height, 1),
                    Plane::new(cw, ch, 1),
                    Plane::new(cw, ch, 1),
                ],
                YCbCrInputSplitting::SplitYAndCbCr => vec![
                    Plane::new(self.width, self.height, 1),
                    Plane::new(cw, ch, 2),
                ],
                YCbCrInputSplitting::Interleaved => vec![Plane::new(self.width, self.height, 3)],
            };
        }
        self.ycbcr = ycbcr;

        let m = YCbCrMatrices::new(&ycbcr);
        let offset: DVec3 = m.offset;
        let cb = [
            chroma_offset(ycbcr.cb_position.x, sx, cw),
            chroma_offset(ycbcr.cb_position.y, sy, ch),
        ];
        let cr = [
            chroma_offset(ycbcr.cr_position.x, sx, cw),
            chroma_offset(ycbcr.cr_position.y, sy, ch),
        ];
        let p = &mut self.params;
        p.set_uniform(
            "inv_ycbcr_matrix",
            UniformValue::Mat3(mat3_to_gl(&m.decode_matrix())),
        );
        p.set_uniform(
            "offset",
            UniformValue::Vec3([offset.x as f32, offset.y as f32, offset.z as f32]),
        );
        p.set_uniform("cb_offset", UniformValue::Vec2(cb));
        p.set_uniform("cr_offset", UniformValue::Vec2(cr));
    }
}

impl Effect for YCbCrInput {
    fn effect_type_id(&self) -> &'static str {
        "YCbCrInput"
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn alpha_handling(&self) -> AlphaHandling {
        AlphaHandling::OutputBlankAlpha
    }

    fn output_fragment_shader(&mut self) -> String {
        let interleaved = i32::from(self.splitting == YCbCrInputSplitting::Interleaved);
        let split = i32::from(self.splitting == YCbCrInputSplitting::SplitYAndCbCr);
        format!(
            "#define PREFIX(interleaved) {interleaved}\n#define PREFIX(split) {split}\n{}",
            read_shader("ycbcr_input.frag", FRAG)
        )
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    unsafe fn set_gl_state(
        &mut self,
        gl: &glow::Context,
        ctx: &mut SetupContext<'_>,
    ) -> Result<(), EngineError> {
        let mipmaps = self.params.int("needs_mipmaps") != 0;
        for (i, name) in self.splitting.sampler_names().iter().enumerate() {
            let unit = ctx.next_sampler();
            let plane = &mut self.planes[i];
            plane.texture.bind(gl, unit)?;
            if plane.texture.dirty {
                let (internal, format) = plane.internal_format();
                gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    internal as i32,
                    plane.width as i32,
                    plane.height as i32,
                    0,
                    format,
                    glow::UNSIGNED_BYTE,
                    Some(&plane.data),
                );
                gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
                if mipmaps {
                    gl.generate_mipmap(glow::TEXTURE_2D);
                }
                plane.texture.dirty = false;
            }
            let min = if mipmaps {
                glow::LINEAR_MIPMAP_NEAREST
            } else {
                glow::LINEAR
            };
            set_sampling(gl, min, glow::LINEAR);
            self.params
                .set_uniform(name, UniformValue::Sampler2D(unit as i32));
        }
        Ok(())
    }

    unsafe fn destroy(&mut self, gl: &glow::Context) {
        for plane in &mut self.planes {
            plane.texture.destroy(gl);
        }
    }

    fn as_input(&self) -> Option<&dyn Input> {
        Some(self)
    }

    fn as_input_mut(&mut self) -> Option<&mut dyn Input> {
        Some(self)
    }
}

impl Input for YCbCrInput {
    fn can_output_linear_gamma(&self) -> bool {
        false
    }

    fn can_supply_mipmaps(&self) -> bool {
        self.splitting == YCbCrInputSplitting::Interleaved
    }

    fn is_single_texture(&self) -> bool {
        self.splitting == YCbCrInputSplitting::Interleaved
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn color_space(&self) -> Colorspace {
        self.format.color_space
    }

    fn gamma_curve(&self) -> GammaCurve {
        self.format.gamma_curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use movit_core::ChromaSiting;

    fn rec601_420() -> YCbCrFormat {
        YCbCrFormat {
            chroma_subsampling_x: 2,
            chroma_subsampling_y: 2,
            cb_position: ChromaSiting { x: 0.0, y: 0.5 },
            cr_position: ChromaSiting { x: 0.0, y: 0.5 },
            ..YCbCrFormat::default()
        }
    }

    #[test]
    fn planar_420_plane_sizes_round_up() {
        let input = YCbCrInput::new(
            ImageFormat::SRGB,
            rec601_420(),
            5,
            3,
            YCbCrInputSplitting::Planar,
        );
        assert_eq!(input.plane_size(0), (5, 3));
        assert_eq!(input.plane_size(1), (3, 2));
        assert_eq!(input.plane_size(2), (3, 2));
        assert!(!input.is_single_texture());
        assert!(!input.can_supply_mipmaps());
    }

    #[test]
    fn left_sited_chroma_is_shifted() {
        let input = YCbCrInput::new(
            ImageFormat::SRGB,
            rec601_420(),
            8,
            8,
            YCbCrInputSplitting::SplitYAndCbCr,
        );
        let cb = input.params().vec2("cb_offset");
        // Left-sited chroma over a 4-texel plane: (0.5 - 0.25) / 4.
        assert_abs_diff_eq!(cb[0], 0.0625, epsilon = 1e-6);
        assert_abs_diff_eq!(cb[1], 0.0, epsilon = 1e-6);
        assert!(input.params().contains("tex_cbcr"));
        assert!(!input.params().contains("tex_cb"));
    }

    #[test]
    fn interleaved_is_single_texture() {
        let input = YCbCrInput::new(
            ImageFormat::SRGB,
            YCbCrFormat::default(),
            4,
            4,
            YCbCrInputSplitting::Interleaved,
        );
        assert!(input.is_single_texture());
        assert_eq!(input.alpha_handling(), AlphaHandling::OutputBlankAlpha);
        assert!(!input.can_output_linear_gamma());
    }

    #[test]
    fn format_change_keeps_planes_when_subsampling_is_unchanged() {
        let mut input = YCbCrInput::new(
            ImageFormat::SRGB,
            rec601_420(),
            4,
            4,
            YCbCrInputSplitting::Planar,
        );
        input.set_plane_data(1, vec![200; 4]);
        input.change_ycbcr_format(YCbCrFormat {
            full_range: true,
            ..rec601_420()
        });
        assert_eq!(input.planes[1].data, vec![200; 4]);
        assert_eq!(input.params().vec3("offset")[0], 0.0);
    }

    #[test]
    #[should_panic(expected = "cannot be chroma subsampled")]
    fn interleaved_rejects_subsampling() {
        YCbCrInput::new(
            ImageFormat::SRGB,
            rec601_420(),
            4,
            4,
            YCbCrInputSplitting::Interleaved,
        );
    }
}
