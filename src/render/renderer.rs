use anyhow::{Context, anyhow};
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tiny_skia::{ColorU8, IntSize, Pixmap};
use tracing::{debug, info};

use super::font::FontResource;
use super::region::{RegionRenderer, RenderStyle};
use crate::error::PipelineError;
use crate::geometry::TextRegion;
use crate::settings::RenderSettings;

pub const DEFAULT_OUTPUT_SUFFIX: &str = "_output";

/// Re-renders translated text onto images and writes the result next to the
/// source.
pub struct ImageRenderer {
    font: FontResource,
    style: RenderStyle,
    output_suffix: String,
}

impl ImageRenderer {
    pub fn new(font: FontResource, style: RenderStyle) -> Self {
        Self {
            font,
            style,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }

    pub fn from_settings(settings: &RenderSettings) -> Self {
        let font = FontResource::load(
            settings.font_path.as_deref().map(Path::new),
            settings.font_family.as_deref(),
        );
        let style = RenderStyle {
            fill_color: settings.fill_color.clone(),
            text_color: settings.text_color.clone(),
        };
        Self::new(font, style).with_output_suffix(settings.output_suffix.clone())
    }

    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        if !suffix.trim().is_empty() {
            self.output_suffix = suffix;
        }
        self
    }

    pub fn font(&self) -> &FontResource {
        &self.font
    }

    /// Erases every region and draws its text, in order, then saves to
    /// `output_path` or the derived `<stem>_output.<ext>` path.
    pub fn render_image(
        &self,
        image_path: &Path,
        regions: &[TextRegion],
        output_path: Option<&Path>,
    ) -> Result<PathBuf, PipelineError> {
        let output_path = match output_path {
            Some(path) => path.to_path_buf(),
            None => derive_output_path(image_path, &self.output_suffix),
        };
        if !image_path.is_file() {
            return Err(PipelineError::Input(format!(
                "image not found: {}",
                image_path.display()
            )));
        }
        let image = ImageReader::open(image_path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|err| {
                PipelineError::Input(format!(
                    "failed to open image {}: {}",
                    image_path.display(),
                    err
                ))
            })?
            .decode()
            .map_err(|err| {
                PipelineError::Input(format!(
                    "failed to decode image {}: {}",
                    image_path.display(),
                    err
                ))
            })?;

        if regions.is_empty() {
            if is_same_file(image_path, &output_path) {
                debug!("no regions; {} left unchanged", image_path.display());
                return Ok(output_path);
            }
            debug!("no regions; copying {} unchanged", image_path.display());
            fs::copy(image_path, &output_path).map_err(|err| {
                PipelineError::Render(format!(
                    "failed to write {}: {}",
                    output_path.display(),
                    err
                ))
            })?;
            return Ok(output_path);
        }

        let has_alpha = image.color().has_alpha();
        let mut pixmap = pixmap_from_image(&image).map_err(PipelineError::render)?;
        drop(image);

        let renderer = RegionRenderer::new(&self.font, &self.style);
        for region in regions {
            let layout = renderer
                .render_region(&mut pixmap, region)
                .map_err(PipelineError::render)?;
            debug!(
                "region {} '{}' drawn at size {} centered on ({:.1}, {:.1})",
                region.id, region.text, layout.fit.size, layout.center.0, layout.center.1
            );
        }

        save_pixmap(&pixmap, &output_path, has_alpha).map_err(PipelineError::render)?;
        info!(
            "rendered {} regions to {}",
            regions.len(),
            output_path.display()
        );
        Ok(output_path)
    }
}

/// `photo.jpg` becomes `photo<suffix>.jpg`; the extension is kept.
pub fn derive_output_path(image_path: &Path, suffix: &str) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = match image_path.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    image_path.with_file_name(file_name)
}

/// `fs::copy` onto its own source truncates it.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn pixmap_from_image(image: &DynamicImage) -> anyhow::Result<Pixmap> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let size = IntSize::from_wh(width, height).ok_or_else(|| anyhow!("empty image"))?;
    let mut data = Vec::with_capacity(rgba.as_raw().len());
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let color = ColorU8::from_rgba(r, g, b, a).premultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Pixmap::from_vec(data, size).ok_or_else(|| anyhow!("failed to build drawing surface"))
}

fn save_pixmap(pixmap: &Pixmap, output_path: &Path, keep_alpha: bool) -> anyhow::Result<()> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    let rgba = RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .ok_or_else(|| anyhow!("failed to build image buffer"))?;
    let format = ImageFormat::from_path(output_path)
        .with_context(|| format!("unsupported output format: {}", output_path.display()))?;
    let image = DynamicImage::ImageRgba8(rgba);
    let image = if keep_alpha && format != ImageFormat::Jpeg {
        image
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };
    image
        .save_with_format(output_path, format)
        .with_context(|| format!("failed to save image: {}", output_path.display()))?;
    Ok(())
}
