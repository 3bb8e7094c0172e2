use glow::HasContext;
use movit_core::{Colorspace, EngineError, GammaCurve, ImageFormat};
use movit_runtime::texture_format as tf;

use super::UploadTexture;
use crate::effect::{AlphaHandling, Effect, Input, SetupContext};
use crate::gl_util::set_sampling;
use crate::params::{Params, UniformValue};
use crate::shaders::read_shader;

const FRAG: &str = r#"vec4 FUNCNAME(vec2 tc) {
	// Client images are stored top row first.
	tc.y = 1.0 - tc.y;
	vec4 pixel = texture(PREFIX(tex), tc);
#if PREFIX(grayscale)
	pixel.gb = pixel.rr;
#endif
	return pixel;
}
"#;

/// Channel layout of client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatPixelFormat {
    RgbaPremultiplied,
    RgbaPostmultiplied,
    BgraPremultiplied,
    BgraPostmultiplied,
    Rgb,
    Grayscale,
}

impl FlatPixelFormat {
    pub fn channels(self) -> usize {
        match self {
            FlatPixelFormat::Rgb => 3,
            FlatPixelFormat::Grayscale => 1,
            _ => 4,
        }
    }
}

/// Pixel storage: 8-bit normalised or 32-bit float, rows top to bottom,
/// tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatPixelData {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl FlatPixelData {
    fn len(&self) -> usize {
        match self {
            FlatPixelData::U8(v) => v.len(),
            FlatPixelData::F32(v) => v.len(),
        }
    }

    fn is_u8(&self) -> bool {
        matches!(self, FlatPixelData::U8(_))
    }

    fn bytes(&self) -> &[u8] {
        match self {
            FlatPixelData::U8(v) => v,
            FlatPixelData::F32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// One texture uploaded from CPU memory.
#[derive(Debug)]
pub struct FlatInput {
    params: Params,
    format: ImageFormat,
    pixel_format: FlatPixelFormat,
    width: u32,
    height: u32,
    data: FlatPixelData,
    texture: UploadTexture,
}

impl FlatInput {
    /// An input whose pixels are all zero until `set_pixel_data`.
    pub fn new(
        format: ImageFormat,
        pixel_format: FlatPixelFormat,
        float: bool,
        width: u32,
        height: u32,
    ) -> Self {
        assert!(width > 0 && height > 0, "FlatInput: empty image");
        let n = width as usize * height as usize * pixel_format.channels();
        let data = if float {
            FlatPixelData::F32(vec![0.0; n])
        } else {
            FlatPixelData::U8(vec![0; n])
        };
        let mut params = Params::new();
        params.register_param_only("output_linear_gamma", UniformValue::Int(0));
        params.register_param_only("needs_mipmaps", UniformValue::Int(0));
        params.register_uniform("tex", UniformValue::Sampler2D(0));
        Self {
            params,
            format,
            pixel_format,
            width,
            height,
            data,
            texture: UploadTexture::new(),
        }
    }

    pub fn pixel_format(&self) -> FlatPixelFormat {
        self.pixel_format
    }

    /// Replace the pixels. The storage type must match the one chosen at
    /// construction and the length must cover width x height x channels.
    pub fn set_pixel_data(&mut self, data: FlatPixelData) {
        assert_eq!(
            data.is_u8(),
            self.data.is_u8(),
            "FlatInput: pixel storage type cannot change"
        );
        assert_eq!(
            data.len(),
            self.width as usize * self.height as usize * self.pixel_format.channels(),
            "FlatInput: pixel data does not match {}x{}",
            self.width,
            self.height
        );
        self.data = data;
        self.texture.dirty = true;
    }

    /// Resize; pixel data is reset to zero until the next `set_pixel_data`.
    pub fn set_size(&mut self, width: u32, height: u32) {
        assert!(width > 0 && height > 0, "FlatInput: empty image");
        self.width = width;
        self.height = height;
        let n = width as usize * height as usize * self.pixel_format.channels();
        self.data = match self.data {
            FlatPixelData::U8(_) => FlatPixelData::U8(vec![0; n]),
            FlatPixelData::F32(_) => FlatPixelData::F32(vec![0.0; n]),
        };
        self.texture.dirty = true;
    }

    pub fn set_width(&mut self, width: u32) {
        self.set_size(width, self.height);
    }

    pub fn set_height(&mut self, height: u32) {
        self.set_size(self.width, height);
    }

    fn output_linear_gamma(&self) -> bool {
        self.params.int("output_linear_gamma") != 0
    }

    fn wants_mipmaps(&self) -> bool {
        self.params.int("needs_mipmaps") != 0
    }

    /// (internal format, transfer format, transfer type).
    fn gl_formats(&self) -> (u32, u32, u32) {
        let srgb = self.output_linear_gamma() && self.format.gamma_curve == GammaCurve::Srgb;
        let format = match self.pixel_format {
            FlatPixelFormat::RgbaPremultiplied | FlatPixelFormat::RgbaPostmultiplied => glow::RGBA,
            FlatPixelFormat::BgraPremultiplied | FlatPixelFormat::BgraPostmultiplied => glow::BGRA,
            FlatPixelFormat::Rgb => glow::RGB,
            FlatPixelFormat::Grayscale => glow::RED,
        };
        let internal = match (&self.data, self.pixel_format.channels()) {
            (FlatPixelData::U8(_), 4) if srgb => tf::SRGB8_ALPHA8,
            (FlatPixelData::U8(_), 4) => tf::RGBA8,
            (FlatPixelData::U8(_), 3) if srgb => tf::SRGB8,
            (FlatPixelData::U8(_), 3) => tf::RGB8,
            (FlatPixelData::U8(_), _) => tf::R8,
            (FlatPixelData::F32(_), 4) => tf::RGBA32F,
            (FlatPixelData::F32(_), 3) => tf::RGB32F,
            (FlatPixelData::F32(_), _) => tf::R32F,
        };
        let ty = if self.data.is_u8() {
            glow::UNSIGNED_BYTE
        } else {
            glow::FLOAT
        };
        (internal, format, ty)
    }
}

impl Effect for FlatInput {
    fn effect_type_id(&self) -> &'static str {
        "FlatInput"
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn alpha_handling(&self) -> AlphaHandling {
        match self.pixel_format {
            FlatPixelFormat::RgbaPremultiplied | FlatPixelFormat::BgraPremultiplied => {
                AlphaHandling::InputAndOutputPremultipliedAlpha
            }
            FlatPixelFormat::RgbaPostmultiplied | FlatPixelFormat::BgraPostmultiplied => {
                AlphaHandling::OutputPostmultipliedAlpha
            }
            FlatPixelFormat::Rgb | FlatPixelFormat::Grayscale => AlphaHandling::OutputBlankAlpha,
        }
    }

    fn output_fragment_shader(&mut self) -> String {
        let gray = i32::from(self.pixel_format == FlatPixelFormat::Grayscale);
        format!(
            "#define PREFIX(grayscale) {gray}\n{}",
            read_shader("flat_input.frag", FRAG)
        )
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        if key == "output_linear_gamma" && value != 0 && !self.can_output_linear_gamma() {
            return false;
        }
        let changed = self.params.get(key) != Some(&UniformValue::Int(value));
        let ok = self.params.set_param(key, UniformValue::Int(value));
        if ok && changed {
            self.texture.dirty = true;
        }
        ok
    }

    unsafe fn set_gl_state(
        &mut self,
        gl: &glow::Context,
        ctx: &mut SetupContext<'_>,
    ) -> Result<(), EngineError> {
        let unit = ctx.next_sampler();
        self.texture.bind(gl, unit)?;
        let mipmaps = self.wants_mipmaps();
        if self.texture.dirty {
            let (internal, format, ty) = self.gl_formats();
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                self.width as i32,
                self.height as i32,
                0,
                format,
                ty,
                Some(self.data.bytes()),
            );
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            if mipmaps {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.texture.dirty = false;
        }
        let min = if mipmaps {
            glow::LINEAR_MIPMAP_NEAREST
        } else {
            glow::LINEAR
        };
        set_sampling(gl, min, glow::LINEAR);
        self.params
            .set_uniform("tex", UniformValue::Sampler2D(unit as i32));
        Ok(())
    }

    unsafe fn destroy(&mut self, gl: &glow::Context) {
        self.texture.destroy(gl);
    }

    fn as_input(&self) -> Option<&dyn Input> {
        Some(self)
    }

    fn as_input_mut(&mut self) -> Option<&mut dyn Input> {
        Some(self)
    }
}

impl Input for FlatInput {
    fn can_output_linear_gamma(&self) -> bool {
        self.data.is_u8()
            && self.pixel_format != FlatPixelFormat::Grayscale
            && matches!(self.format.gamma_curve, GammaCurve::Linear | GammaCurve::Srgb)
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
