use std::path::PathBuf;

/// Engine-level errors used across movit crates.
///
/// Only environment and configuration failures are reported here. Misuse of
/// the chain protocol (rendering before finalize, adding outputs afterwards)
/// panics instead, and parameter setters report through their `bool` result.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    // ---- Config / shader data ----
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json parse error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ---- Backend ----
    #[error("vertex shader compile error: {0}")]
    VertexCompile(String),

    #[error("fragment shader compile error: {0}")]
    FragmentCompile(String),

    #[error("compute shader compile error: {0}")]
    ComputeCompile(String),

    #[error("program link error: {0}")]
    Link(String),

    #[error("backend object creation failed: {0}")]
    GlCreate(String),

    #[error("framebuffer incomplete: 0x{0:x}")]
    FramebufferIncomplete(u32),

    #[error("unsupported by this GL context: {0}")]
    Unsupported(String),

    // ---- Fallback ----
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        EngineError::Other(s.into())
    }
}
