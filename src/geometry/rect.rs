// Rectangle value types for device space and PDF content space
use crate::types::GeometryError;
use serde::{Deserialize, Deserializer, Serialize};

/// Rectangle on the rendered raster: top-left origin, pixels
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DeviceRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build from two drag corners in any order
    pub fn from_drag(start: (f64, f64), end: (f64, f64)) -> Self {
        Self {
            x: start.0.min(end.0),
            y: start.1.min(end.1),
            width: (end.0 - start.0).abs(),
            height: (end.1 - start.1).abs(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Rectangle in PDF content space: bottom-left origin, points.
///
/// Canonical form keeps `(x1, y1)` as the top-left corner and `(x2, y2)` as
/// the bottom-right corner, so `x1 < x2` and `y1 > y2`. This is the layout
/// the extractor expects in its area string.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ContentRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl ContentRect {
    /// Normalizes corner order; rejects zero-area rectangles.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, GeometryError> {
        let rect = Self {
            x1: x1.min(x2),
            y1: y1.max(y2),
            x2: x1.max(x2),
            y2: y1.min(y2),
        };
        if rect.width() <= 0.0 || rect.height() <= 0.0 || !rect.is_finite() {
            return Err(GeometryError::Degenerate {
                width: rect.width(),
                height: rect.height(),
            });
        }
        Ok(rect)
    }

    /// `y` is the top edge in content space, matching the legacy stored shape.
    pub fn from_top_left(x: f64, y: f64, width: f64, height: f64) -> Result<Self, GeometryError> {
        Self::from_corners(x, y, x + width, y - height)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y2
    }

    pub fn left(&self) -> f64 {
        self.x1
    }

    pub fn right(&self) -> f64 {
        self.x2
    }

    fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.x1 && x <= self.x2
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.contains_x(x) && y <= self.y1 && y >= self.y2
    }

    /// Area string understood by the extractor: "x1,y1,x2,y2"
    pub fn area_string(&self) -> String {
        format!(
            "{},{},{},{}",
            fmt_coord(self.x1),
            fmt_coord(self.y1),
            fmt_coord(self.x2),
            fmt_coord(self.y2)
        )
    }
}

/// Trims trailing zeros so integer coordinates print without a fraction.
pub(crate) fn fmt_coord(v: f64) -> String {
    let s = format!("{:.3}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Shapes a stored rectangle may take on disk
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRect {
    Corners { x1: f64, y1: f64, x2: f64, y2: f64 },
    TopLeft { x: f64, y: f64, width: f64, height: f64 },
    Array([f64; 4]),
}

impl<'de> Deserialize<'de> for ContentRect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = StoredRect::deserialize(deserializer)?;
        let rect = match stored {
            StoredRect::Corners { x1, y1, x2, y2 } => ContentRect::from_corners(x1, y1, x2, y2),
            StoredRect::TopLeft { x, y, width, height } => {
                ContentRect::from_top_left(x, y, width, height)
            }
            StoredRect::Array([x1, y1, x2, y2]) => ContentRect::from_corners(x1, y1, x2, y2),
        };
        rect.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_are_normalized() {
        let rect = ContentRect::from_corners(200.0, 747.0, 50.0, 767.0).unwrap();
        assert_eq!(rect, ContentRect { x1: 50.0, y1: 767.0, x2: 200.0, y2: 747.0 });
        assert_eq!(rect.width(), 150.0);
        assert_eq!(rect.height(), 20.0);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(matches!(
            ContentRect::from_corners(10.0, 10.0, 10.0, 50.0),
            Err(GeometryError::Degenerate { .. })
        ));
        assert!(ContentRect::from_corners(f64::NAN, 1.0, 2.0, 3.0).is_err());
    }

    #[test]
    fn test_area_string() {
        let rect = ContentRect::from_corners(50.0, 767.0, 200.5, 747.25).unwrap();
        assert_eq!(rect.area_string(), "50,767,200.5,747.25");
    }

    #[test]
    fn test_deserialize_every_stored_shape() {
        let expected = ContentRect { x1: 10.0, y1: 100.0, x2: 60.0, y2: 80.0 };
        let corners: ContentRect =
            serde_json::from_str(r#"{"x1":10,"y1":100,"x2":60,"y2":80,"extra":true}"#).unwrap();
        let top_left: ContentRect =
            serde_json::from_str(r#"{"x":10,"y":100,"width":50,"height":20}"#).unwrap();
        let array: ContentRect = serde_json::from_str("[60, 80, 10, 100]").unwrap();
        assert_eq!(corners, expected);
        assert_eq!(top_left, expected);
        assert_eq!(array, expected);
    }

    #[test]
    fn test_deserialize_rejects_degenerate() {
        let res: Result<ContentRect, _> = serde_json::from_str(r#"{"x1":1,"y1":1,"x2":1,"y2":0}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_device_rect_from_drag() {
        let rect = DeviceRect::from_drag((300.0, 90.0), (100.0, 50.0));
        assert_eq!(rect, DeviceRect::new(100.0, 50.0, 200.0, 40.0));
        assert!(DeviceRect::from_drag((1.0, 1.0), (1.0, 9.0)).is_degenerate());
    }
}
