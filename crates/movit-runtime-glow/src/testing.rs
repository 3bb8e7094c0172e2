//! Mock effects and inputs with configurable capability profiles.
//!
//! Finalize never touches GL, so every compiler decision can be exercised
//! with these and inspected through `EffectChain::phases` and
//! `EffectChain::node`.

use movit_core::{Colorspace, GammaCurve, ImageFormat, MipmapRequirements};

use crate::effect::{AlphaHandling, Effect, Input, OutputSize};
use crate::params::{Params, UniformValue};

/// Capability profile of a [`MockEffect`]. Defaults match the `Effect`
/// trait defaults for a one-input effect.
#[derive(Debug, Clone, PartialEq)]
pub struct MockProfile {
    pub type_id: &'static str,
    pub num_inputs: usize,
    pub needs_linear_light: bool,
    pub needs_srgb_primaries: bool,
    pub needs_texture_bounce: bool,
    pub needs_mipmaps: MipmapRequirements,
    pub one_to_one_sampling: bool,
    pub strong_one_to_one_sampling: bool,
    pub sets_virtual_output_size: bool,
    /// `Some` makes the effect change its output size.
    pub output_size: Option<OutputSize>,
    pub is_compute_shader: bool,
    pub override_disable_bounce: bool,
    pub alpha_handling: AlphaHandling,
}

impl Default for MockProfile {
    fn default() -> Self {
        Self {
            type_id: "MockEffect",
            num_inputs: 1,
            needs_linear_light: true,
            needs_srgb_primaries: true,
            needs_texture_bounce: false,
            needs_mipmaps: MipmapRequirements::DoesNotNeedMipmaps,
            one_to_one_sampling: false,
            strong_one_to_one_sampling: false,
            sets_virtual_output_size: false,
            output_size: None,
            is_compute_shader: false,
            override_disable_bounce: false,
            alpha_handling: AlphaHandling::InputAndOutputPremultipliedAlpha,
        }
    }
}

impl MockProfile {
    /// Works in any gamma, any primaries and any alpha type, sampling
    /// exactly under each output pixel.
    pub fn passthrough() -> Self {
        Self {
            needs_linear_light: false,
            needs_srgb_primaries: false,
            strong_one_to_one_sampling: true,
            one_to_one_sampling: true,
            alpha_handling: AlphaHandling::DontCareAlphaType,
            ..Self::default()
        }
    }
}

/// An effect that does nothing but report its profile. It also records the
/// sizes it was told about and counts shader requests.
#[derive(Debug)]
pub struct MockEffect {
    profile: MockProfile,
    params: Params,
    input_sizes: Vec<(u32, u32)>,
    shader_requests: usize,
}

impl MockEffect {
    pub fn new(profile: MockProfile) -> Self {
        let mut params = Params::new();
        params.register_param("strength", UniformValue::Float(1.0));
        Self {
            input_sizes: vec![(0, 0); profile.num_inputs],
            profile,
            params,
            shader_requests: 0,
        }
    }

    /// A default one-input effect.
    pub fn plain() -> Self {
        Self::new(MockProfile::default())
    }

    pub fn with_inputs(num_inputs: usize) -> Self {
        Self::new(MockProfile {
            num_inputs,
            ..MockProfile::default()
        })
    }

    pub fn profile(&self) -> &MockProfile {
        &self.profile
    }

    pub fn input_sizes(&self) -> &[(u32, u32)] {
        &self.input_sizes
    }

    pub fn shader_requests(&self) -> usize {
        self.shader_requests
    }
}

impl Effect for MockEffect {
    fn effect_type_id(&self) -> &'static str {
        self.profile.type_id
    }

    fn num_inputs(&self) -> usize {
        self.profile.num_inputs
    }

    fn needs_linear_light(&self) -> bool {
        self.profile.needs_linear_light
    }

    fn needs_srgb_primaries(&self) -> bool {
        self.profile.needs_srgb_primaries
    }

    fn needs_texture_bounce(&self) -> bool {
        self.profile.needs_texture_bounce
    }

    fn needs_mipmaps(&self) -> MipmapRequirements {
        self.profile.needs_mipmaps
    }

    fn one_to_one_sampling(&self) -> bool {
        self.profile.one_to_one_sampling || self.profile.strong_one_to_one_sampling
    }

    fn strong_one_to_one_sampling(&self) -> bool {
        self.profile.strong_one_to_one_sampling
    }

    fn changes_output_size(&self) -> bool {
        self.profile.output_size.is_some() || self.profile.sets_virtual_output_size
    }

    fn sets_virtual_output_size(&self) -> bool {
        self.profile.sets_virtual_output_size
    }

    fn is_compute_shader(&self) -> bool {
        self.profile.is_compute_shader
    }

    fn override_disable_bounce(&self) -> bool {
        self.profile.override_disable_bounce
    }

    fn alpha_handling(&self) -> AlphaHandling {
        self.profile.alpha_handling
    }

    fn output_fragment_shader(&mut self) -> String {
        self.shader_requests += 1;
        if self.profile.is_compute_shader {
            return "void FUNCNAME() {\n\tcs_output(gl_GlobalInvocationID.xy, vec4(PREFIX(strength)));\n}\n"
                .to_string();
        }
        match self.profile.num_inputs {
            0 => "vec4 FUNCNAME(vec2 tc) {\n\treturn vec4(PREFIX(strength));\n}\n".to_string(),
            1 => "vec4 FUNCNAME(vec2 tc) {\n\treturn INPUT(tc) * PREFIX(strength);\n}\n"
                .to_string(),
            n => {
                let sum: Vec<String> = (1..=n).map(|j| format!("INPUT{j}(tc)")).collect();
                format!(
                    "vec4 FUNCNAME(vec2 tc) {{\n\treturn ({}) * PREFIX(strength);\n}}\n",
                    sum.join(" + ")
                )
            }
        }
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn inform_input_size(&mut self, input: usize, width: u32, height: u32) {
        self.input_sizes[input] = (width, height);
    }

    fn get_output_size(&self) -> OutputSize {
        match self.profile.output_size {
            Some(size) => size,
            None => panic!("MockEffect: no output size configured"),
        }
    }
}

/// A zero-input effect of a given format and size.
#[derive(Debug)]
pub struct MockInput {
    params: Params,
    format: ImageFormat,
    width: u32,
    height: u32,
    alpha_handling: AlphaHandling,
    can_output_linear_gamma: bool,
    can_supply_mipmaps: bool,
    single_texture: bool,
}

impl MockInput {
    /// A blank-alpha, single-texture input that cannot decode to linear
    /// light.
    pub fn new(format: ImageFormat, width: u32, height: u32) -> Self {
        let mut params = Params::new();
        params.register_param_only("output_linear_gamma", UniformValue::Int(0));
        params.register_param_only("needs_mipmaps", UniformValue::Int(0));
        Self {
            params,
            format,
            width,
            height,
            alpha_handling: AlphaHandling::OutputBlankAlpha,
            can_output_linear_gamma: false,
            can_supply_mipmaps: true,
            single_texture: true,
        }
    }

    pub fn with_alpha(mut self, alpha_handling: AlphaHandling) -> Self {
        self.alpha_handling = alpha_handling;
        self
    }

    pub fn with_linear_gamma_output(mut self, can: bool) -> Self {
        self.can_output_linear_gamma = can;
        self
    }

    pub fn with_mipmap_support(mut self, can: bool) -> Self {
        self.can_supply_mipmaps = can;
        self
    }

    pub fn with_single_texture(mut self, single: bool) -> Self {
        self.single_texture = single;
        self
    }

    /// Whether the compiler switched this input to linear output.
    pub fn outputs_linear_gamma(&self) -> bool {
        self.params.int("output_linear_gamma") != 0
    }

    /// Whether the compiler asked this input for mipmaps.
    pub fn mipmaps_requested(&self) -> bool {
        self.params.int("needs_mipmaps") != 0
    }
}

impl Effect for MockInput {
    fn effect_type_id(&self) -> &'static str {
        "MockInput"
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn needs_linear_light(&self) -> bool {
        false
    }

    fn needs_srgb_primaries(&self) -> bool {
        false
    }

    fn alpha_handling(&self) -> AlphaHandling {
        self.alpha_handling
    }

    fn output_fragment_shader(&mut self) -> String {
        "vec4 FUNCNAME(vec2 tc) {\n\treturn vec4(tc, 0.0, 1.0);\n}\n".to_string()
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn set_int(&mut self, key: &str, value: i32) -> bool {
        if key == "output_linear_gamma" && value != 0 && !self.can_output_linear_gamma {
            return false;
        }
        self.params.set_param(key, UniformValue::Int(value))
    }

    fn as_input(&self) -> Option<&dyn Input> {
        Some(self)
    }

    fn as_input_mut(&mut self) -> Option<&mut dyn Input> {
        Some(self)
    }
}

impl Input for MockInput {
    fn can_output_linear_gamma(&self) -> bool {
        self.can_output_linear_gamma
    }

    fn can_supply_mipmaps(&self) -> bool {
        self.can_supply_mipmaps
    }

    fn is_single_texture(&self) -> bool {
        self.single_texture
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
        if self.outputs_linear_gamma() {
            GammaCurve::Linear
        } else {
            self.format.gamma_curve
        }
    }
}
