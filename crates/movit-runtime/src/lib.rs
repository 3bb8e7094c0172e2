#![forbid(unsafe_code)]

//! Backend-agnostic runtime "standard library".
//!
//! Numerics and text transforms shared by the pipeline compiler and the
//! built-in effects. Nothing here touches GL; backends and effects turn these
//! values into uniforms and shader text.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod colorimetry;
pub mod geometry;
pub mod probe;
pub mod sampling;
pub mod shader_text;
pub mod texture_format;
pub mod transfer;
pub mod ycbcr;

pub use colorimetry::{conversion_matrix, mat3_to_gl, rgb_to_xyz_matrix, Primaries};
pub use geometry::{fit_to_aspect, size_rectangle_to_fit};
pub use probe::{count_wrongly_rounded, largest_gradient_step};
pub use sampling::{combine_two_samples, CombinedSample};
pub use shader_text::replace_prefix;
pub use texture_format::{bytes_per_pixel, estimate_texture_size};
pub use transfer::TransferCurve;
pub use ycbcr::{chroma_offset, YCbCrCoefficients, YCbCrMatrices};
