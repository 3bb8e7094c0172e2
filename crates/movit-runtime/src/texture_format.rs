//! Internal-format sizes used for the texture freelist byte budget.
//!
//! The constants mirror the GL enum values so this crate stays free of a GL
//! dependency.

pub const R8: u32 = 0x8229;
pub const R16: u32 = 0x822A;
pub const R16F: u32 = 0x822D;
pub const R32F: u32 = 0x822E;
pub const RG8: u32 = 0x822B;
pub const RG16: u32 = 0x822C;
pub const RG16F: u32 = 0x822F;
pub const RG32F: u32 = 0x8230;
pub const RGB8: u32 = 0x8051;
pub const RGB10_A2: u32 = 0x8059;
pub const RGB16: u32 = 0x8054;
pub const RGB16F: u32 = 0x881B;
pub const RGB32F: u32 = 0x8815;
pub const RGB565: u32 = 0x8D62;
pub const R11F_G11F_B10F: u32 = 0x8C3A;
pub const RGBA8: u32 = 0x8058;
pub const RGBA16: u32 = 0x805B;
pub const RGBA16F: u32 = 0x881A;
pub const RGBA32F: u32 = 0x8814;
pub const SRGB8: u32 = 0x8C41;
pub const SRGB8_ALPHA8: u32 = 0x8C43;

/// Bytes per texel, or `None` for formats the pool does not know.
pub fn bytes_per_pixel(internal_format: u32) -> Option<usize> {
    let n = match internal_format {
        RGBA32F => 16,
        RGB32F => 12,
        RGBA16F | RGBA16 | RG32F => 8,
        RGB16F | RGB16 => 6,
        RGBA8 | SRGB8_ALPHA8 | RGB10_A2 | R11F_G11F_B10F | RG16F | RG16 | R32F => 4,
        RGB8 | SRGB8 => 3,
        RG8 | R16F | R16 | RGB565 => 2,
        R8 => 1,
        _ => return None,
    };
    Some(n)
}

/// Estimated GPU memory for one level-0 texture. Unknown formats are charged
/// as the widest one, so the budget errs on the side of evicting.
pub fn estimate_texture_size(internal_format: u32, width: u32, height: u32) -> usize {
    let bpp = bytes_per_pixel(internal_format).unwrap_or(16);
    width as usize * height as usize * bpp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intermediate_format_is_eight_bytes() {
        assert_eq!(RGBA16F, movit_core::GL_RGBA16F);
        assert_eq!(estimate_texture_size(RGBA16F, 1920, 1080), 1920 * 1080 * 8);
    }

    #[test]
    fn unknown_format_is_charged_conservatively() {
        assert_eq!(bytes_per_pixel(0xDEAD), None);
        assert_eq!(estimate_texture_size(0xDEAD, 2, 2), 64);
    }
}
