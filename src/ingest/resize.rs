/// Target dimensions whose longer edge is at most `max_edge`, keeping the aspect ratio.
///
/// Never upscales; a zero-sized input is returned unchanged.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if width == 0 || height == 0 || max_edge == 0 || longer <= max_edge {
        return (width, height);
    }

    let ratio = f64::from(max_edge) / f64::from(longer);
    let scale = |edge: u32| -> u32 {
        let scaled = (f64::from(edge) * ratio).round() as u32;
        scaled.clamp(1, max_edge)
    };

    if width >= height {
        (max_edge, scale(height))
    } else {
        (scale(width), max_edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_is_capped_on_width() {
        assert_eq!(fit_within(6000, 4000, 3000), (3000, 2000));
        assert_eq!(fit_within(4032, 3024, 1920), (1920, 1440));
    }

    #[test]
    fn portrait_is_capped_on_height() {
        assert_eq!(fit_within(3024, 4032, 1600), (1200, 1600));
    }

    #[test]
    fn small_images_are_left_alone() {
        assert_eq!(fit_within(1200, 800, 1920), (1200, 800));
        assert_eq!(fit_within(1920, 1080, 1920), (1920, 1080));
    }

    #[test]
    fn extreme_aspect_keeps_at_least_one_pixel() {
        assert_eq!(fit_within(100_000, 2, 2400), (2400, 1));
        assert_eq!(fit_within(0, 500, 100), (0, 500));
    }
}
