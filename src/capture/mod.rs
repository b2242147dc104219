pub mod region;

pub use region::RegionPlan;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::models::{Point, Rgb, SampleGeometry};

/// Absolute screen rectangle to capture. Coordinates may be negative on
/// multi-monitor layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Minimal rect covering a single rule's sample area. Independent-rule
    /// loops capture this instead of the shared plan.
    pub fn for_geometry(geometry: &SampleGeometry) -> Self {
        let (origin, width, height) = geometry.bounds();
        Self::new(origin.x, origin.y, width, height)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.y >= self.top
            && point.x < self.left + self.width as i32
            && point.y < self.top + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Captures pixel data for a rectangle. Pure data producer, no rule
/// knowledge; implementations wrap the platform screen-grab API and are
/// supplied by the embedding application.
pub trait FrameSource: Send + Sync {
    fn capture(&self, rect: &CaptureRect) -> Result<Frame, CaptureError>;
}

/// Pixel data for one captured rect, alive for a single tick.
#[derive(Debug)]
pub struct Frame {
    rect: CaptureRect,
    pixels: RgbaImage,
}

impl Frame {
    pub fn new(rect: CaptureRect, pixels: RgbaImage) -> Result<Self, CaptureError> {
        if pixels.width() != rect.width || pixels.height() != rect.height {
            return Err(CaptureError::SizeMismatch {
                want_w: rect.width,
                want_h: rect.height,
                got_w: pixels.width(),
                got_h: pixels.height(),
            });
        }
        Ok(Self { rect, pixels })
    }

    pub fn rect(&self) -> &CaptureRect {
        &self.rect
    }

    /// Color at an absolute screen coordinate, `None` when the point falls
    /// outside this frame's rect.
    pub fn color_at(&self, point: Point) -> Option<Rgb> {
        if !self.rect.contains(point) {
            return None;
        }
        let x = (point.x - self.rect.left) as u32;
        let y = (point.y - self.rect.top) as u32;
        let px = self.pixels.get_pixel(x, y);
        Some(Rgb::new(px[0], px[1], px[2]))
    }
}
