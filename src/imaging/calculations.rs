//! Pure calculation functions for image dimensions.

/// Dimensions after scaling `source` down to at most `max_width` pixels wide.
///
/// Aspect ratio is preserved and images are never upscaled. Height is rounded
/// and kept at least 1 so very wide panoramas still produce a valid image.
pub fn fit_to_width(source: (u32, u32), max_width: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w <= max_width || src_w == 0 {
        return source;
    }
    let h = (src_h as f64 * max_width as f64 / src_w as f64).round() as u32;
    (max_width, h.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_scales_down() {
        assert_eq!(fit_to_width((4000, 3000), 2000), (2000, 1500));
    }

    #[test]
    fn portrait_scales_by_width() {
        assert_eq!(fit_to_width((3000, 4000), 600), (600, 800));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(fit_to_width((400, 300), 600), (400, 300));
        assert_eq!(fit_to_width((600, 300), 600), (600, 300));
    }

    #[test]
    fn extreme_panorama_keeps_one_pixel_height() {
        assert_eq!(fit_to_width((100_000, 10), 600), (600, 1));
    }
}
