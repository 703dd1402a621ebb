//! Frame and landmark types handed over by the camera collaborator.
//!
//! A [`PixelBuffer`] is a single RGBA8 video frame at whatever resolution the
//! camera delivered. [`FaceLandmarks`] is the per-frame mesh produced by the
//! landmark tracker; the engine never consumes it directly, but callers use
//! [`FaceLandmarks::face_region`] and [`PixelBuffer::crop`] to frame the face
//! before preprocessing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per RGBA sample.
pub const RGBA_CHANNELS: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero (got {width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("RGBA buffer length mismatch: expected {expected} bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("crop region {region:?} lies outside the {width}x{height} frame")]
    RegionOutOfBounds {
        region: FaceRegion,
        width: u32,
        height: u32,
    },
}

/// Read-only RGBA8 frame, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyFrame { width, height });
        }
        let expected = width as usize * height as usize * RGBA_CHANNELS;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// RGBA sample at `(x, y)`. Callers guarantee the coordinate is in range.
    pub(crate) fn rgba_at(&self, x: usize, y: usize) -> &[u8] {
        let idx = (y * self.width as usize + x) * RGBA_CHANNELS;
        &self.data[idx..idx + RGBA_CHANNELS]
    }

    /// Copy a rectangular region into a new buffer.
    pub fn crop(&self, region: &FaceRegion) -> Result<PixelBuffer, FrameError> {
        let fits = region.width > 0
            && region.height > 0
            && region.x.checked_add(region.width).is_some_and(|r| r <= self.width)
            && region.y.checked_add(region.height).is_some_and(|b| b <= self.height);
        if !fits {
            return Err(FrameError::RegionOutOfBounds {
                region: *region,
                width: self.width,
                height: self.height,
            });
        }

        let row_bytes = region.width as usize * RGBA_CHANNELS;
        let mut data = Vec::with_capacity(row_bytes * region.height as usize);
        for y in region.y..region.y + region.height {
            let start = (y as usize * self.width as usize + region.x as usize) * RGBA_CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        PixelBuffer::new(region.width, region.height, data)
    }
}

impl TryFrom<image::RgbaImage> for PixelBuffer {
    type Error = FrameError;

    fn try_from(img: image::RgbaImage) -> Result<Self, Self::Error> {
        let (width, height) = img.dimensions();
        PixelBuffer::new(width, height, img.into_raw())
    }
}

/// Normalized landmark coordinate: `x` and `y` in [0, 1] relative to the
/// frame, `z` relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// Landmark set for one detected face, with the tracker's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub points: Vec<Point3>,
    pub confidence: f32,
}

/// Pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceLandmarks {
    /// Pixel bounding box of the landmarks, grown by `margin` (a fraction of
    /// the box size) on every side and clamped to the frame.
    ///
    /// Returns `None` when there are no landmarks or the clamped box has no
    /// area (e.g. the face lies entirely outside the frame).
    pub fn face_region(&self, frame_width: u32, frame_height: u32, margin: f32) -> Option<FaceRegion> {
        let mut points = self.points.iter().filter(|p| p.x.is_finite() && p.y.is_finite());
        let first = points.next()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }

        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let margin = margin.max(0.0);
        let pad_x = (max_x - min_x) * fw * margin;
        let pad_y = (max_y - min_y) * fh * margin;

        let left = (min_x * fw - pad_x).clamp(0.0, fw).floor();
        let top = (min_y * fh - pad_y).clamp(0.0, fh).floor();
        let right = (max_x * fw + pad_x).clamp(0.0, fw).ceil();
        let bottom = (max_y * fh + pad_y).clamp(0.0, fh).ceil();

        let width = (right - left) as u32;
        let height = (bottom - top) as u32;
        if width == 0 || height == 0 {
            return None;
        }

        Some(FaceRegion {
            x: left as u32,
            y: top as u32,
            width,
            height,
        })
    }
}
