use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned extent of a polygon, inclusive of its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        self.max_x.abs_diff(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.abs_diff(self.min_y)
    }
}

/// Quadrilateral text boundary ordered top-left, top-right, bottom-right,
/// bottom-left. Always exactly four points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon([Point; 4]);

impl Polygon {
    pub fn new(points: [Point; 4]) -> Self {
        Self(points)
    }

    /// Axis-aligned rectangle from `(x, y)` spanning `w` by `h`.
    pub fn rect(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self([
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ])
    }

    /// Backend flat list `x1,y1,x2,y2,x3,y3,x4,y4`; fractional values are
    /// truncated toward zero.
    pub fn from_flat(coords: &[f64]) -> Result<Self, String> {
        if coords.len() != 8 {
            return Err(format!(
                "bounding box must have 8 coordinates, got {}",
                coords.len()
            ));
        }
        let mut points = [Point::new(0, 0); 4];
        for (idx, pair) in coords.chunks_exact(2).enumerate() {
            points[idx] = Point::new(pair[0] as i32, pair[1] as i32);
        }
        Ok(Self(points))
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds {
            min_x: i32::MAX,
            min_y: i32::MAX,
            max_x: i32::MIN,
            max_y: i32::MIN,
        };
        for point in &self.0 {
            bounds.min_x = bounds.min_x.min(point.x);
            bounds.min_y = bounds.min_y.min(point.y);
            bounds.max_x = bounds.max_x.max(point.x);
            bounds.max_y = bounds.max_y.max(point.y);
        }
        bounds
    }

    pub fn width(&self) -> u32 {
        self.bounds().width()
    }

    pub fn height(&self) -> u32 {
        self.bounds().height()
    }

    /// Midpoint of the top-left and bottom-right corners.
    pub fn center(&self) -> (f32, f32) {
        let tl = self.0[0];
        let br = self.0[2];
        (
            (tl.x as f32 + br.x as f32) / 2.0,
            (tl.y as f32 + br.y as f32) / 2.0,
        )
    }
}

impl TryFrom<Vec<Point>> for Polygon {
    type Error = String;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        let count = points.len();
        let points: [Point; 4] = points
            .try_into()
            .map_err(|_| format!("polygon must have exactly 4 points, got {}", count))?;
        Ok(Self(points))
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(polygon: Polygon) -> Self {
        polygon.0.to_vec()
    }
}

/// One line of text and the quadrilateral it occupies. `id` correlates an
/// OCR line with its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRegion {
    #[serde(default, skip_serializing)]
    pub id: usize,
    pub text: String,
    #[serde(rename = "boundingPolygon")]
    pub polygon: Polygon,
}

impl TextRegion {
    pub fn new(id: usize, text: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            id,
            text: text.into(),
            polygon,
        }
    }

    /// Same geometry and id, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            id: self.id,
            text: text.into(),
            polygon: self.polygon,
        }
    }
}
