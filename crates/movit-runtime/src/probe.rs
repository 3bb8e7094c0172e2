//! Analysis of capability-probe readbacks.
//!
//! The GL side renders the probe images; these functions interpret what came
//! back so the interpretation can be tested without a GPU.

/// Largest step between consecutive samples of a bilinearly sampled 0 -> 1
/// gradient. This is the texel subpixel precision of the sampler.
pub fn largest_gradient_step(samples: &[f32]) -> f32 {
    samples
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0.0, f32::max)
}

/// Number of 8-bit output levels that came back different from the level
/// that was written as `i / 255`.
pub fn count_wrongly_rounded(readback: &[u8]) -> usize {
    readback
        .iter()
        .enumerate()
        .filter(|&(i, &v)| usize::from(v) != i)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_of_a_quantised_ramp() {
        // 1/4 precision: four plateaus.
        let samples = [0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0];
        assert_eq!(largest_gradient_step(&samples), 0.25);
        assert_eq!(largest_gradient_step(&[]), 0.0);
    }

    #[test]
    fn counts_rounding_mismatches() {
        let mut readback: Vec<u8> = (0..=255).collect();
        assert_eq!(count_wrongly_rounded(&readback), 0);
        readback[128] = 127;
        readback[200] = 199;
        assert_eq!(count_wrongly_rounded(&readback), 2);
    }
}
