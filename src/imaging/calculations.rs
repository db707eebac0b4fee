//! Pure calculation functions for image dimensions.

/// Largest size with the source aspect ratio that fits inside `bounds`.
///
/// Never upscales: a source already inside the box is returned unchanged.
/// Each output edge is at least 1px.
///
/// ```
/// # use imguploader::imaging::fit_within;
/// // 4000x3000 landscape into a 1280 box → 1280x960
/// assert_eq!(fit_within((4000, 3000), (1280, 1280)), (1280, 960));
///
/// // small images stay as they are
/// assert_eq!(fit_within((200, 100), (320, 320)), (200, 100));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w == 0 || src_h == 0 {
        return (src_w, src_h);
    }
    if src_w <= max_w && src_h <= max_h {
        return source;
    }

    let scale = f64::min(max_w as f64 / src_w as f64, max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_limited_by_width() {
        assert_eq!(fit_within((4000, 3000), (1280, 1280)), (1280, 960));
    }

    #[test]
    fn portrait_limited_by_height() {
        assert_eq!(fit_within((3000, 4000), (1280, 1280)), (960, 1280));
    }

    #[test]
    fn non_square_bounds() {
        // 1600x900 into 800x600: width is the binding edge
        assert_eq!(fit_within((1600, 900), (800, 600)), (800, 450));
        // 900x1600 into 800x600: height binds
        assert_eq!(fit_within((900, 1600), (800, 600)), (338, 600));
    }

    #[test]
    fn exact_fit_is_unchanged() {
        assert_eq!(fit_within((320, 320), (320, 320)), (320, 320));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(fit_within((100, 50), (1280, 1280)), (100, 50));
    }

    #[test]
    fn extreme_panorama_keeps_one_pixel() {
        assert_eq!(fit_within((10000, 10), (320, 320)), (320, 1));
    }

    #[test]
    fn zero_sized_source_passes_through() {
        assert_eq!(fit_within((0, 10), (320, 320)), (0, 10));
    }
}
