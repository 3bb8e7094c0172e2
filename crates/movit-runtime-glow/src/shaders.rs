//! Shader text service.
//!
//! Every shader the crate needs is compiled in. When a data directory is
//! configured through `init_movit`, a file with the same name inside it
//! replaces the built-in text, which lets effect shaders be tuned without a
//! rebuild.

use std::path::{Path, PathBuf};

use movit_core::EngineError;

/// Shared by every fragment phase. The compiler prepends the version line
/// and patches `FLIP_ORIGIN` on the last phase.
pub const VS_VERT: &str = r#"in vec2 position;
in vec2 texcoord;
out vec2 tc;

#define FLIP_ORIGIN 0

void main()
{
	gl_Position = vec4(position * 2.0 - 1.0, 0.0, 1.0);
	tc = texcoord;
#if FLIP_ORIGIN
	tc.y = 1.0 - tc.y;
#endif
}
"#;

pub const HEADER_FRAG: &str = r#"in vec2 tc;
"#;

pub const FOOTER_FRAG: &str = r#"
#if defined(YCBCR_OUTPUT_PLANAR)
out vec4 Y;
out vec4 Cb;
out vec4 Cr;
#elif defined(YCBCR_OUTPUT_SPLIT_Y_AND_CBCR)
out vec4 Y;
out vec4 Chroma;
#else
out vec4 FragColor;
#endif

#if defined(SECOND_YCBCR_OUTPUT_PLANAR)
out vec4 Y2;
out vec4 Cb2;
out vec4 Cr2;
#elif defined(SECOND_YCBCR_OUTPUT_SPLIT_Y_AND_CBCR)
out vec4 Y2;
out vec4 Chroma2;
#elif defined(SECOND_YCBCR_OUTPUT_INTERLEAVED)
out vec4 YCbCr2;
#endif

#if defined(YCBCR_ALSO_OUTPUT_RGBA)
out vec4 RGBA;
#endif

void main()
{
#if defined(YCBCR_ALSO_OUTPUT_RGBA)
	vec4 color[2] = INPUT(tc);
	vec4 color0 = color[0];
	vec4 color1 = color[1];
#else
	vec4 color0 = INPUT(tc);
#endif

#if defined(SQUARE_ROOT_TRANSFORMATION)
	// Cheap pseudo-gamma for linear intermediates; undone in in<i>().
	color0.rgb = sqrt(max(color0.rgb, 0.0));
#endif

#if defined(YCBCR_OUTPUT_PLANAR)
	Y = color0.rrra;
	Cb = color0.ggga;
	Cr = color0.bbba;
#elif defined(YCBCR_OUTPUT_SPLIT_Y_AND_CBCR)
	Y = color0.rrra;
	Chroma = color0.gbba;
#else
	FragColor = color0;
#endif

#if defined(SECOND_YCBCR_OUTPUT_PLANAR)
	Y2 = color0.rrra;
	Cb2 = color0.ggga;
	Cr2 = color0.bbba;
#elif defined(SECOND_YCBCR_OUTPUT_SPLIT_Y_AND_CBCR)
	Y2 = color0.rrra;
	Chroma2 = color0.gbba;
#elif defined(SECOND_YCBCR_OUTPUT_INTERLEAVED)
	YCbCr2 = color0;
#endif

#if defined(YCBCR_ALSO_OUTPUT_RGBA)
	RGBA = color1;
#endif
}
"#;

/// Compute phases. The compute effect writes through `cs_output()`; effects
/// that follow it in the same phase read the written value as `CS_OUTPUT_VAL`.
pub const HEADER_COMP: &str = r#"vec4 CS_OUTPUT_VAL;
void cs_output(uvec2 coord, vec4 val);
void cs_output(ivec2 coord, vec4 val);
"#;

pub const FOOTER_COMP: &str = r#"
uniform restrict writeonly image2D tex_outbuf;

void cs_output(ivec2 coord, vec4 val)
{
	CS_OUTPUT_VAL = val;
	vec2 tc = (vec2(coord) + 0.5) * CS_INV_OUTPUT_SIZE;
	val = CS_POSTPROC(tc);
#if defined(SQUARE_ROOT_TRANSFORMATION)
	val.rgb = sqrt(max(val.rgb, 0.0));
#endif
#if defined(FLIP_ORIGIN)
	coord.y = CS_OUTPUT_SIZE.y - coord.y - 1;
#endif
	imageStore(tex_outbuf, coord, val);
}

void cs_output(uvec2 coord, vec4 val)
{
	cs_output(ivec2(coord), val);
}

void main()
{
	INPUT();
}
"#;

const BUILTINS: &[(&str, &str)] = &[
    ("vs.vert", VS_VERT),
    ("header.frag", HEADER_FRAG),
    ("footer.frag", FOOTER_FRAG),
    ("header.comp", HEADER_COMP),
    ("footer.comp", FOOTER_COMP),
];

/// Name -> shader text lookup with an optional on-disk override directory.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    data_dir: Option<PathBuf>,
}

impl ShaderLibrary {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self { data_dir }
    }

    pub const fn builtin_only() -> Self {
        Self { data_dir: None }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Text of a compiler-owned shader (`vs.vert`, `footer.frag`, ...).
    pub fn read(&self, name: &str) -> Result<String, EngineError> {
        let builtin = BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, text)| *text)
            .ok_or_else(|| EngineError::other(format!("no shader named '{name}'")))?;
        self.read_or(name, builtin)
    }

    /// Text of `name`, preferring an override file in the data directory.
    pub fn read_or(&self, name: &str, builtin: &str) -> Result<String, EngineError> {
        if let Some(dir) = &self.data_dir {
            let path = dir.join(name);
            if path.is_file() {
                tracing::debug!(path = %path.display(), "shader override");
                return std::fs::read_to_string(&path)
                    .map_err(|source| EngineError::Io { path, source });
            }
        }
        Ok(builtin.to_string())
    }
}

/// Effect-side lookup. A broken override falls back to the built-in text.
pub fn read_shader(name: &str, builtin: &str) -> String {
    match crate::init::shader_library().read_or(name, builtin) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(name, error = %e, "shader override unreadable; using built-in");
            builtin.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_served_without_data_dir() {
        let lib = ShaderLibrary::default();
        let vs = lib.read("vs.vert").unwrap();
        assert!(vs.contains("#define FLIP_ORIGIN 0"));
        assert!(lib.read("footer.comp").unwrap().contains("imageStore"));
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(ShaderLibrary::default().read("nope.frag").is_err());
    }

    #[test]
    fn data_dir_overrides_builtin() {
        let dir = std::env::temp_dir().join(format!("movit-shaders-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("header.frag"), "// custom\nin vec2 tc;\n").unwrap();

        let lib = ShaderLibrary::new(Some(dir.clone()));
        assert!(lib.read("header.frag").unwrap().starts_with("// custom"));
        // Files that are absent still come from the built-ins.
        assert!(lib.read("footer.frag").unwrap().contains("FragColor"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
