// Device space <-> PDF content space conversion
use super::rect::{ContentRect, DeviceRect};
use crate::types::GeometryError;
use serde::{Deserialize, Serialize};

/// Page size in points alongside the size of its rendered pixmap
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub content_width: f64,
    pub content_height: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl PageMetrics {
    /// Pixmap size a renderer produces for this page at `scale`
    pub fn at_scale(content_width: f64, content_height: f64, scale: f64) -> Self {
        Self {
            content_width,
            content_height,
            pixel_width: (content_width * scale).round().max(0.0) as u32,
            pixel_height: (content_height * scale).round().max(0.0) as u32,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CoordinateMapper {
    scale_x: f64,
    scale_y: f64,
    page_height: f64,
}

impl CoordinateMapper {
    pub fn new(metrics: PageMetrics) -> Result<Self, GeometryError> {
        if metrics.pixel_width == 0 || metrics.pixel_height == 0 {
            return Err(GeometryError::ZeroRaster {
                width: metrics.pixel_width,
                height: metrics.pixel_height,
            });
        }
        Ok(Self {
            scale_x: metrics.content_width / metrics.pixel_width as f64,
            scale_y: metrics.content_height / metrics.pixel_height as f64,
            page_height: metrics.content_height,
        })
    }

    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    pub fn to_content_rect(&self, rect: &DeviceRect) -> Result<ContentRect, GeometryError> {
        if rect.is_degenerate() {
            return Err(GeometryError::Degenerate {
                width: rect.width,
                height: rect.height,
            });
        }
        // Y flips: device grows downward, content grows upward
        let x1 = rect.x * self.scale_x;
        let y1 = self.page_height - rect.y * self.scale_y;
        let x2 = (rect.x + rect.width) * self.scale_x;
        let y2 = self.page_height - (rect.y + rect.height) * self.scale_y;
        ContentRect::from_corners(x1, y1, x2, y2)
    }

    pub fn to_device_rect(&self, rect: &ContentRect) -> DeviceRect {
        DeviceRect {
            x: rect.x1 / self.scale_x,
            y: (self.page_height - rect.y1) / self.scale_y,
            width: rect.width() / self.scale_x,
            height: rect.height() / self.scale_y,
        }
    }

    pub fn to_content_x(&self, x: f64) -> f64 {
        x * self.scale_x
    }

    pub fn to_device_x(&self, x: f64) -> f64 {
        x / self.scale_x
    }

    pub fn to_content_point(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale_x, self.page_height - y * self.scale_y)
    }
}
