//! Pool of GL programs, textures, FBOs and VAOs shared between chains.
//!
//! Programs and textures are shareable across contexts and live on global
//! freelists. FBOs and VAOs belong to the context that created them; each
//! context must call [`ResourcePool::clean_context`] before it goes away.
//! Nothing here frees GL objects on `Drop`: [`ResourcePool::destroy`] does.
#![allow(clippy::missing_safety_doc)]

mod freelist;

pub use freelist::{
    Attachment, FboFreelist, ProgramCache, TextureFreelist, TextureKey, MAX_FBO_ATTACHMENTS,
    MAX_FREE_FBOS_PER_CONTEXT,
};

use std::collections::HashMap;

use glow::HasContext;
use movit_core::{ContextId, EngineError};
use parking_lot::Mutex;

use crate::gl_util::{compile_compute_program, compile_program, set_sampling, transfer_format, FullscreenTriangle};

pub const DEFAULT_PROGRAM_FREELIST_MAX: usize = 100;
pub const DEFAULT_TEXTURE_FREELIST_BYTES: usize = 100 << 20;

/// GL sync object; only ever waited on or deleted while the pool lock is held.
#[derive(Debug)]
struct SyncFence(glow::NativeFence);

// SAFETY: a GLsync is a plain handle valid in every context of a share
// group; it is only passed back to GL, never dereferenced.
unsafe impl Send for SyncFence {}

#[derive(Debug, Clone)]
enum ProgramSource {
    Fragment {
        vert: String,
        frag: String,
        outputs: Vec<String>,
    },
    Compute(String),
}

impl ProgramSource {
    unsafe fn link(&self, gl: &glow::Context) -> Result<glow::NativeProgram, EngineError> {
        match self {
            ProgramSource::Fragment {
                vert,
                frag,
                outputs,
            } => compile_program(gl, vert, frag, outputs),
            ProgramSource::Compute(src) => compile_compute_program(gl, src),
        }
    }
}

#[derive(Debug)]
struct PoolState {
    programs: ProgramCache<glow::NativeProgram>,
    sources: HashMap<glow::NativeProgram, ProgramSource>,
    textures: TextureFreelist<glow::NativeTexture, SyncFence>,
    texture_keys: HashMap<glow::NativeTexture, TextureKey>,
    fbos: FboFreelist<glow::NativeFramebuffer, glow::NativeTexture>,
    vaos: HashMap<ContextId, FullscreenTriangle>,
}

#[derive(Debug)]
pub struct ResourcePool {
    state: Mutex<PoolState>,
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_PROGRAM_FREELIST_MAX, DEFAULT_TEXTURE_FREELIST_BYTES)
    }

    /// `program_freelist_max` unreferenced programs and
    /// `texture_freelist_bytes` of released textures are kept for reuse.
    pub fn with_limits(program_freelist_max: usize, texture_freelist_bytes: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                programs: ProgramCache::new(program_freelist_max),
                sources: HashMap::new(),
                textures: TextureFreelist::new(texture_freelist_bytes),
                texture_keys: HashMap::new(),
                fbos: FboFreelist::new(),
                vaos: HashMap::new(),
            }),
        }
    }

    /// Link (or reuse) a vertex + fragment program. `outputs` are bound to
    /// draw buffers 0.. in order and are part of the cache key.
    pub unsafe fn compile_glsl_program(
        &self,
        gl: &glow::Context,
        vert: &str,
        frag: &str,
        outputs: &[String],
    ) -> Result<glow::NativeProgram, EngineError> {
        let mut key = String::with_capacity(vert.len() + frag.len() + 64);
        key.push_str(vert);
        key.push_str(frag);
        for name in outputs {
            key.push_str("// Bound output: ");
            key.push_str(name);
            key.push('\n');
        }
        let source = ProgramSource::Fragment {
            vert: vert.to_string(),
            frag: frag.to_string(),
            outputs: outputs.to_vec(),
        };
        self.compile(gl, key, source)
    }

    pub unsafe fn compile_glsl_compute_program(
        &self,
        gl: &glow::Context,
        src: &str,
    ) -> Result<glow::NativeProgram, EngineError> {
        self.compile(gl, src.to_string(), ProgramSource::Compute(src.to_string()))
    }

    unsafe fn compile(
        &self,
        gl: &glow::Context,
        key: String,
        source: ProgramSource,
    ) -> Result<glow::NativeProgram, EngineError> {
        let mut st = self.state.lock();
        if let Some(master) = st.programs.acquire(&key) {
            return Ok(master);
        }
        let master = source.link(gl)?;
        tracing::debug!(program = ?master, "linked program");
        st.programs.insert(key, master);
        st.sources.insert(master, source);
        Ok(master)
    }

    /// Drop one reference taken by `compile_glsl_*`.
    pub unsafe fn release_glsl_program(&self, gl: &glow::Context, master: glow::NativeProgram) {
        let mut st = self.state.lock();
        for p in st.programs.release(master) {
            st.sources.remove(&p);
            gl.delete_program(p);
        }
    }

    /// Make an instance of `master` current and return it. Instances are
    /// linked clones so that overlapping users keep separate uniform state.
    pub unsafe fn use_glsl_program(
        &self,
        gl: &glow::Context,
        master: glow::NativeProgram,
    ) -> Result<glow::NativeProgram, EngineError> {
        let mut st = self.state.lock();
        let instance = match st.programs.take_instance(master) {
            Some(p) => p,
            None => {
                let source = st
                    .sources
                    .get(&master)
                    .cloned()
                    .ok_or_else(|| EngineError::other("use_glsl_program: unknown program"))?;
                let p = source.link(gl)?;
                st.programs.add_instance(master, p);
                p
            }
        };
        gl.use_program(Some(instance));
        Ok(instance)
    }

    pub unsafe fn unuse_glsl_program(&self, gl: &glow::Context, instance: glow::NativeProgram) {
        gl.use_program(None);
        self.state.lock().programs.return_instance(instance);
    }

    /// A texture with undefined contents. A recycled texture is returned
    /// only after the GPU has passed its release fence.
    pub unsafe fn create_2d_texture(
        &self,
        gl: &glow::Context,
        internal_format: u32,
        width: u32,
        height: u32,
    ) -> Result<glow::NativeTexture, EngineError> {
        let key = TextureKey {
            internal_format,
            width,
            height,
        };
        let mut st = self.state.lock();
        if let Some((tex, fence)) = st.textures.take(key) {
            gl.wait_sync(fence.0, 0, glow::TIMEOUT_IGNORED);
            gl.delete_sync(fence.0);
            return Ok(tex);
        }

        let tex = gl
            .create_texture()
            .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e:?}")))?;
        let (format, ty) = transfer_format(internal_format);
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        set_sampling(gl, glow::LINEAR, glow::LINEAR);
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            internal_format as i32,
            width as i32,
            height as i32,
            0,
            format,
            ty,
            None,
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
        st.texture_keys.insert(tex, key);
        tracing::trace!(?tex, internal_format, width, height, "allocated texture");
        Ok(tex)
    }

    pub unsafe fn release_2d_texture(&self, gl: &glow::Context, tex: glow::NativeTexture) {
        let mut st = self.state.lock();
        let Some(&key) = st.texture_keys.get(&tex) else {
            panic!("release_2d_texture: texture not allocated by this pool");
        };
        let fence = match gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) {
            Ok(f) => SyncFence(f),
            Err(e) => {
                tracing::warn!(error = %e, "fence_sync failed; deleting texture");
                st.texture_keys.remove(&tex);
                st.fbos.unlink_texture(tex);
                gl.delete_texture(tex);
                return;
            }
        };
        for (old, old_fence) in st.textures.put(key, tex, fence) {
            st.texture_keys.remove(&old);
            st.fbos.unlink_texture(old);
            gl.delete_sync(old_fence.0);
            gl.delete_texture(old);
        }
    }

    /// An FBO of the current context with `textures` as color attachments
    /// 0.., draw buffers set to match.
    pub unsafe fn create_fbo(
        &self,
        gl: &glow::Context,
        ctx: ContextId,
        textures: &[glow::NativeTexture],
    ) -> Result<glow::NativeFramebuffer, EngineError> {
        let mut st = self.state.lock();
        if let Some(fbo) = st.fbos.take(ctx, textures) {
            return Ok(fbo);
        }

        let fbo = gl
            .create_framebuffer()
            .map_err(|e| EngineError::GlCreate(format!("create_framebuffer failed: {e:?}")))?;
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        let mut bufs = Vec::with_capacity(textures.len());
        for (i, &tex) in textures.iter().enumerate() {
            let attachment = glow::COLOR_ATTACHMENT0 + i as u32;
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                attachment,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
            bufs.push(attachment);
        }
        gl.draw_buffers(&bufs);

        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        if status != glow::FRAMEBUFFER_COMPLETE {
            gl.delete_framebuffer(fbo);
            return Err(EngineError::FramebufferIncomplete(status));
        }

        st.fbos.insert(ctx, fbo, textures);
        Ok(fbo)
    }

    pub unsafe fn release_fbo(
        &self,
        gl: &glow::Context,
        ctx: ContextId,
        fbo: glow::NativeFramebuffer,
    ) {
        let doomed = self.state.lock().fbos.release(ctx, fbo);
        for f in doomed {
            gl.delete_framebuffer(f);
        }
    }

    /// The fullscreen-triangle VAO of `ctx`, created on first use.
    pub unsafe fn fullscreen_triangle(
        &self,
        gl: &glow::Context,
        ctx: ContextId,
    ) -> Result<FullscreenTriangle, EngineError> {
        let mut st = self.state.lock();
        if let Some(&tri) = st.vaos.get(&ctx) {
            return Ok(tri);
        }
        let tri = FullscreenTriangle::new(gl)?;
        st.vaos.insert(ctx, tri);
        Ok(tri)
    }

    /// Delete every FBO and VAO owned by `ctx`, which must be current.
    pub unsafe fn clean_context(&self, gl: &glow::Context, ctx: ContextId) {
        let mut st = self.state.lock();
        let fbos = st.fbos.drain_context(ctx);
        tracing::debug!(context = ctx.0, fbos = fbos.len(), "cleaning context");
        for f in fbos {
            gl.delete_framebuffer(f);
        }
        if let Some(tri) = st.vaos.remove(&ctx) {
            tri.destroy(gl);
        }
    }

    /// Delete everything. `current` is cleaned first; every other context
    /// must already have been cleaned.
    pub unsafe fn destroy(&self, gl: &glow::Context, current: ContextId) {
        self.clean_context(gl, current);
        let mut st = self.state.lock();
        let leftover: Vec<ContextId> = st
            .fbos
            .contexts()
            .chain(st.vaos.keys().copied())
            .collect();
        assert!(
            leftover.is_empty(),
            "ResourcePool::destroy: contexts {leftover:?} still own FBOs or VAOs"
        );
        for p in st.programs.drain() {
            gl.delete_program(p);
        }
        st.sources.clear();
        for (tex, fence) in st.textures.drain() {
            gl.delete_sync(fence.0);
            gl.delete_texture(tex);
        }
        st.texture_keys.clear();
    }
}
