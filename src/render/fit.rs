use super::font::{TextBounds, TextMeasure};

pub const MIN_FONT_SIZE: u32 = 1;
pub const MAX_FONT_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    pub size: u32,
    pub bounds: TextBounds,
    /// False when no size fit and the search fell back to the minimum.
    pub fits: bool,
}

/// Largest integer font size in `MIN_FONT_SIZE..=MAX_FONT_SIZE` whose ink box
/// fits inside `max_width` by `max_height`.
///
/// Binary search; assumes the measured box grows with the size.
pub fn fit_font<M>(text: &str, max_width: f32, max_height: f32, font: &M) -> FontFit
where
    M: TextMeasure + ?Sized,
{
    let mut low = MIN_FONT_SIZE;
    let mut high = MAX_FONT_SIZE;
    let mut best: Option<FontFit> = None;

    while low <= high {
        let size = (low + high) / 2;
        let bounds = font.measure(text, size as f32);
        if bounds.width() <= max_width && bounds.height() <= max_height {
            best = Some(FontFit {
                size,
                bounds,
                fits: true,
            });
            low = size + 1;
        } else {
            high = size - 1;
        }
    }

    best.unwrap_or_else(|| FontFit {
        size: MIN_FONT_SIZE,
        bounds: font.measure(text, MIN_FONT_SIZE as f32),
        fits: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::font::estimate_bounds;
    use std::cell::Cell;

    /// Every glyph is `advance` em wide and 1 em tall.
    struct Monospace {
        advance: f32,
        calls: Cell<usize>,
    }

    impl Monospace {
        fn new(advance: f32) -> Self {
            Self {
                advance,
                calls: Cell::new(0),
            }
        }
    }

    impl TextMeasure for Monospace {
        fn measure(&self, text: &str, font_size: f32) -> TextBounds {
            self.calls.set(self.calls.get() + 1);
            TextBounds {
                left: 0.0,
                top: -font_size,
                right: text.chars().count() as f32 * self.advance * font_size,
                bottom: 0.0,
            }
        }
    }

    #[test]
    fn picks_largest_size_that_fits() {
        let font = Monospace::new(0.5);
        // 7 glyphs × 0.5em: width limit 81 allows 23, height limit 36 allows 36.
        let fit = fit_font("BONJOUR", 81.0, 36.0, &font);
        assert_eq!(fit.size, 23);
        assert!(fit.fits);
        assert!(fit.bounds.width() <= 81.0);
        assert!(fit.bounds.height() <= 36.0);
        assert!(font.measure("BONJOUR", 24.0).width() > 81.0);
    }

    #[test]
    fn height_limits_short_text() {
        let font = Monospace::new(0.5);
        let fit = fit_font("A", 500.0, 12.0, &font);
        assert_eq!(fit.size, 12);
    }

    #[test]
    fn caps_at_max_size() {
        let font = Monospace::new(0.5);
        let fit = fit_font("A", 10_000.0, 10_000.0, &font);
        assert_eq!(fit.size, MAX_FONT_SIZE);
        assert!(fit.fits);
    }

    #[test]
    fn falls_back_to_min_size_when_nothing_fits() {
        let font = Monospace::new(0.5);
        let fit = fit_font("a very long line of text", 2.0, 0.5, &font);
        assert_eq!(fit.size, MIN_FONT_SIZE);
        assert!(!fit.fits);
    }

    #[test]
    fn search_is_logarithmic() {
        let font = Monospace::new(0.5);
        fit_font("HELLO", 81.0, 36.0, &font);
        assert!(font.calls.get() <= 8, "calls = {}", font.calls.get());
    }

    #[test]
    fn shrinking_limits_never_grow_the_size() {
        struct Estimated;
        impl TextMeasure for Estimated {
            fn measure(&self, text: &str, font_size: f32) -> TextBounds {
                estimate_bounds(text, font_size)
            }
        }

        let mut previous = u32::MAX;
        let mut width = 400.0;
        let mut height = 120.0;
        while width > 1.0 {
            let fit = fit_font("Photo translate", width, height, &Estimated);
            assert!(fit.size <= previous);
            if fit.fits {
                assert!(fit.bounds.width() <= width);
                assert!(fit.bounds.height() <= height);
            }
            previous = fit.size;
            width *= 0.8;
            height *= 0.85;
        }
    }
}
