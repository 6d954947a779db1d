mod fit;
mod font;
mod region;
mod renderer;

pub use fit::{FontFit, MAX_FONT_SIZE, MIN_FONT_SIZE, fit_font};
pub use font::{FontMetrics, FontResource, TextBounds, TextMeasure};
pub use region::{FIT_RATIO, RegionLayout, RegionRenderer, RenderStyle, layout_region};
pub use renderer::{DEFAULT_OUTPUT_SUFFIX, ImageRenderer, derive_output_path};
