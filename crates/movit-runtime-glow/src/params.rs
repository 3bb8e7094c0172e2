//! Parameter and uniform registry carried by every effect.
//!
//! Parameters are what clients set by name (`set_int("radius", ..)`);
//! uniforms are what the phase compiler declares in GLSL and uploads each
//! frame. By default a parameter is also a uniform, so most effects only
//! register once and read the same value on both sides.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Bool(bool),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    IVec2([i32; 2]),
    FloatArray(Vec<f32>),
    Vec2Array(Vec<[f32; 2]>),
    Vec3Array(Vec<[f32; 3]>),
    Vec4Array(Vec<[f32; 4]>),
    /// Column-major.
    Mat3([f32; 9]),
    /// Texture unit.
    Sampler2D(i32),
    /// Image unit.
    Image2D(i32),
}

impl UniformValue {
    /// GLSL type keyword.
    pub fn glsl_type(&self) -> &'static str {
        match self {
            UniformValue::Int(_) => "int",
            UniformValue::Bool(_) => "bool",
            UniformValue::Float(_) | UniformValue::FloatArray(_) => "float",
            UniformValue::Vec2(_) | UniformValue::Vec2Array(_) => "vec2",
            UniformValue::Vec3(_) | UniformValue::Vec3Array(_) => "vec3",
            UniformValue::Vec4(_) | UniformValue::Vec4Array(_) => "vec4",
            UniformValue::IVec2(_) => "ivec2",
            UniformValue::Mat3(_) => "mat3",
            UniformValue::Sampler2D(_) => "sampler2D",
            UniformValue::Image2D(_) => "image2D",
        }
    }

    /// Array length for array uniforms.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            UniformValue::FloatArray(v) => Some(v.len()),
            UniformValue::Vec2Array(v) => Some(v.len()),
            UniformValue::Vec3Array(v) => Some(v.len()),
            UniformValue::Vec4Array(v) => Some(v.len()),
            _ => None,
        }
    }

    fn same_kind(&self, other: &UniformValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.array_len() == other.array_len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry {
    pub name: String,
    pub value: UniformValue,
    pub is_param: bool,
    pub is_uniform: bool,
}

/// Ordered name -> value store. Declaration order is registration order.
#[derive(Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<ParamEntry>,
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, &e.value)))
            .finish()
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, name: &str, value: UniformValue, is_param: bool, is_uniform: bool) {
        assert!(
            self.find(name).is_none(),
            "parameter or uniform '{name}' registered twice"
        );
        self.entries.push(ParamEntry {
            name: name.to_string(),
            value,
            is_param,
            is_uniform,
        });
    }

    /// Settable by clients and declared as a uniform.
    pub fn register_param(&mut self, name: &str, value: UniformValue) {
        self.register(name, value, true, true);
    }

    /// Settable by clients, consumed on the CPU only.
    pub fn register_param_only(&mut self, name: &str, value: UniformValue) {
        self.register(name, value, true, false);
    }

    /// Declared as a uniform, maintained by the effect itself.
    pub fn register_uniform(&mut self, name: &str, value: UniformValue) {
        self.register(name, value, false, true);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.find(name).map(|i| &self.entries[i].value)
    }

    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    pub fn uniforms(&self) -> impl Iterator<Item = &ParamEntry> {
        self.entries.iter().filter(|e| e.is_uniform)
    }

    /// Client-facing setter: only parameters of the same type (and array
    /// length) are accepted. Returns `false` without touching anything
    /// otherwise.
    #[must_use]
    pub fn set_param(&mut self, name: &str, value: UniformValue) -> bool {
        match self.find(name) {
            Some(i) if self.entries[i].is_param && self.entries[i].value.same_kind(&value) => {
                self.entries[i].value = value;
                true
            }
            _ => false,
        }
    }

    /// Effect-internal setter for uniform-only entries (and parameters).
    /// Unknown names are a bug in the effect.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match self.find(name) {
            Some(i) => {
                assert!(
                    self.entries[i].value.same_kind(&value),
                    "uniform '{name}' changed type"
                );
                self.entries[i].value = value;
            }
            None => panic!("uniform '{name}' was never registered"),
        }
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(UniformValue::Int(v)) => *v,
            Some(UniformValue::Bool(b)) => i32::from(*b),
            other => panic!("'{name}' is not an int parameter: {other:?}"),
        }
    }

    pub fn float(&self, name: &str) -> f32 {
        match self.get(name) {
            Some(UniformValue::Float(v)) => *v,
            other => panic!("'{name}' is not a float parameter: {other:?}"),
        }
    }

    pub fn vec2(&self, name: &str) -> [f32; 2] {
        match self.get(name) {
            Some(UniformValue::Vec2(v)) => *v,
            other => panic!("'{name}' is not a vec2 parameter: {other:?}"),
        }
    }

    pub fn vec3(&self, name: &str) -> [f32; 3] {
        match self.get(name) {
            Some(UniformValue::Vec3(v)) => *v,
            other => panic!("'{name}' is not a vec3 parameter: {other:?}"),
        }
    }

    pub fn vec4(&self, name: &str) -> [f32; 4] {
        match self.get(name) {
            Some(UniformValue::Vec4(v)) => *v,
            other => panic!("'{name}' is not a vec4 parameter: {other:?}"),
        }
    }

    pub fn ivec2(&self, name: &str) -> [i32; 2] {
        match self.get(name) {
            Some(UniformValue::IVec2(v)) => *v,
            other => panic!("'{name}' is not an ivec2 parameter: {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_param_checks_name_and_type() {
        let mut p = Params::new();
        p.register_param("radius", UniformValue::Float(3.0));
        p.register_uniform("weights", UniformValue::FloatArray(vec![0.0; 4]));

        assert!(p.set_param("radius", UniformValue::Float(5.0)));
        assert_eq!(p.float("radius"), 5.0);

        assert!(!p.set_param("radius", UniformValue::Int(5)));
        assert!(!p.set_param("nope", UniformValue::Float(1.0)));
        // Uniform-only entries are not client parameters.
        assert!(!p.set_param("weights", UniformValue::FloatArray(vec![1.0; 4])));
        assert_eq!(p.float("radius"), 5.0);
    }

    #[test]
    fn array_uniforms_keep_their_length() {
        let mut p = Params::new();
        p.register_uniform("w", UniformValue::Vec4Array(vec![[0.0; 4]; 3]));
        p.set_uniform("w", UniformValue::Vec4Array(vec![[1.0; 4]; 3]));
        assert_eq!(p.get("w").and_then(UniformValue::array_len), Some(3));
    }

    #[test]
    #[should_panic(expected = "changed type")]
    fn resizing_an_array_uniform_panics() {
        let mut p = Params::new();
        p.register_uniform("w", UniformValue::FloatArray(vec![0.0; 3]));
        p.set_uniform("w", UniformValue::FloatArray(vec![0.0; 5]));
    }

    #[test]
    fn param_only_entries_are_not_uniforms() {
        let mut p = Params::new();
        p.register_param_only("num_bits", UniformValue::Int(8));
        p.register_param("gain", UniformValue::Float(1.0));
        let names: Vec<_> = p.uniforms().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["gain"]);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        let mut p = Params::new();
        p.register_param("x", UniformValue::Int(0));
        p.register_uniform("x", UniformValue::Int(0));
    }
}
