//! Output rectangle selection.

/// Grow `current` to the smallest rectangle of aspect `nom:denom` that
/// contains a `width` x `height` image, keeping `current` if it is already
/// large enough.
pub fn size_rectangle_to_fit(
    width: u32,
    height: u32,
    aspect_nom: f32,
    aspect_denom: f32,
    current: (u32, u32),
) -> (u32, u32) {
    let (scaled_w, scaled_h) = if width as f32 * aspect_denom >= height as f32 * aspect_nom {
        // Wider than the frame (or equal): keep width.
        (
            width,
            (width as f32 * aspect_denom / aspect_nom).round_ties_even() as u32,
        )
    } else {
        (
            (height as f32 * aspect_nom / aspect_denom).round_ties_even() as u32,
            height,
        )
    };

    // Same aspect on both sides, so one must contain the other.
    debug_assert!(!(scaled_w < current.0 && scaled_h > current.1));
    debug_assert!(!(scaled_h < current.1 && scaled_w > current.0));

    if scaled_w >= current.0 && scaled_h >= current.1 {
        (scaled_w, scaled_h)
    } else {
        current
    }
}

/// Smallest rectangle of the given aspect containing every size in `sizes`.
pub fn fit_to_aspect(
    sizes: impl IntoIterator<Item = (u32, u32)>,
    aspect_nom: f32,
    aspect_denom: f32,
) -> (u32, u32) {
    sizes.into_iter().fold((0, 0), |acc, (w, h)| {
        size_rectangle_to_fit(w, h, aspect_nom, aspect_denom, acc)
    })
}
