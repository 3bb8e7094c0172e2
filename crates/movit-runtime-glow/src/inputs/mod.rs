//! Zero-input effects that supply pixels from client memory.

mod flat_input;
mod ycbcr_input;

pub use flat_input::{FlatInput, FlatPixelData, FlatPixelFormat};
pub use ycbcr_input::{YCbCrInput, YCbCrInputSplitting};

use glow::HasContext;
use movit_core::EngineError;

/// A client-side texture owned by an input, re-uploaded when dirty.
#[derive(Debug, Default)]
pub(crate) struct UploadTexture {
    texture: Option<glow::NativeTexture>,
    pub(crate) dirty: bool,
}

impl UploadTexture {
    pub(crate) fn new() -> Self {
        Self {
            texture: None,
            dirty: true,
        }
    }

    /// Bind to `unit`, creating the texture on first use.
    pub(crate) unsafe fn bind(
        &mut self,
        gl: &glow::Context,
        unit: u32,
    ) -> Result<glow::NativeTexture, EngineError> {
        let tex = match self.texture {
            Some(t) => t,
            None => {
                let t = gl
                    .create_texture()
                    .map_err(|e| EngineError::GlCreate(format!("input texture: {e}")))?;
                self.texture = Some(t);
                self.dirty = true;
                t
            }
        };
        gl.active_texture(glow::TEXTURE0 + unit);
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        Ok(tex)
    }

    pub(crate) unsafe fn destroy(&mut self, gl: &glow::Context) {
        if let Some(t) = self.texture.take() {
            gl.delete_texture(t);
        }
        self.dirty = true;
    }
}
