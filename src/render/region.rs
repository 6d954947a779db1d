use anyhow::{Context, Result};
use tiny_skia::Pixmap;
use usvg::{Options, Tree};

use super::fit::{FontFit, fit_font};
use super::font::{FontResource, TextMeasure};
use crate::geometry::{Polygon, TextRegion};

/// Share of the region's width and height the replacement text may occupy.
pub const FIT_RATIO: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub fill_color: String,
    pub text_color: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            fill_color: "#ffffff".to_string(),
            text_color: "#000000".to_string(),
        }
    }
}

/// Where and how large the replacement text of one region is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionLayout {
    pub center: (f32, f32),
    pub max_width: f32,
    pub max_height: f32,
    pub fit: FontFit,
    /// Pen origin on the baseline.
    pub origin: (f32, f32),
}

impl RegionLayout {
    /// Ink box of the placed text in image coordinates: `(x, y, w, h)`.
    pub fn text_rect(&self) -> (f32, f32, f32, f32) {
        let bounds = self.fit.bounds;
        (
            self.origin.0 + bounds.left,
            self.origin.1 + bounds.top,
            bounds.width(),
            bounds.height(),
        )
    }
}

pub fn layout_region<M>(region: &TextRegion, font: &M) -> RegionLayout
where
    M: TextMeasure + ?Sized,
{
    let polygon = &region.polygon;
    let max_width = polygon.width() as f32 * FIT_RATIO;
    let max_height = polygon.height() as f32 * FIT_RATIO;
    let fit = fit_font(&region.text, max_width, max_height, font);
    let center = polygon.center();
    let bounds = fit.bounds;
    let origin = (
        center.0 - (bounds.left + bounds.right) / 2.0,
        center.1 - (bounds.top + bounds.bottom) / 2.0,
    );
    RegionLayout {
        center,
        max_width,
        max_height,
        fit,
        origin,
    }
}

/// Erases and redraws regions on one drawing surface.
pub struct RegionRenderer<'a> {
    font: &'a FontResource,
    style: &'a RenderStyle,
}

impl<'a> RegionRenderer<'a> {
    pub fn new(font: &'a FontResource, style: &'a RenderStyle) -> Self {
        Self { font, style }
    }

    /// Fills the region's quadrilateral with the fill colour and draws its text
    /// centered inside it.
    pub fn render_region(&self, pixmap: &mut Pixmap, region: &TextRegion) -> Result<RegionLayout> {
        let layout = layout_region(region, self.font);
        let mut svg = svg_open(pixmap.width(), pixmap.height());
        svg.push_str(&polygon_element(&region.polygon, &self.style.fill_color));
        if !region.text.trim().is_empty() {
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="{color}" xml:space="preserve">{text}</text>"#,
                x = layout.origin.0,
                y = layout.origin.1,
                size = layout.fit.size,
                family = escape_xml(self.font.family()),
                color = escape_xml(&self.style.text_color),
                text = escape_xml(&region.text)
            ));
        }
        svg.push_str("</svg>");
        self.rasterize(pixmap, &svg)
            .with_context(|| format!("failed to draw region '{}'", region.text))?;
        Ok(layout)
    }

    /// Fills the region's quadrilateral only.
    pub fn erase_region(&self, pixmap: &mut Pixmap, polygon: &Polygon) -> Result<()> {
        let mut svg = svg_open(pixmap.width(), pixmap.height());
        svg.push_str(&polygon_element(polygon, &self.style.fill_color));
        svg.push_str("</svg>");
        self.rasterize(pixmap, &svg)
    }

    fn rasterize(&self, pixmap: &mut Pixmap, svg: &str) -> Result<()> {
        let options = Options {
            fontdb: self.font.fontdb(),
            ..Options::default()
        };
        let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
        let mut pixmap_mut = pixmap.as_mut();
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
        Ok(())
    }
}

fn svg_open(width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    )
}

fn polygon_element(polygon: &Polygon, fill: &str) -> String {
    let points = polygon
        .points()
        .iter()
        .map(|point| format!("{},{}", point.x, point.y))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        r#"<polygon points="{points}" fill="{fill}" shape-rendering="crispEdges"/>"#,
        points = points,
        fill = escape_xml(fill)
    )
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
