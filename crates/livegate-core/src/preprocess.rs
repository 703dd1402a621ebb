//! Frame → classifier input tensor.
//!
//! The anti-spoofing classifier takes a fixed 80×80 RGB input in NCHW layout
//! with values in [0, 1]. Frames arrive at arbitrary camera resolutions, so
//! each destination pixel is filled by nearest-neighbour sampling: cheap
//! enough to run on every frame, and the classifier is trained on small
//! crops where interpolation quality barely matters.

use ndarray::{Array4, ArrayView4};

use crate::frame::PixelBuffer;

/// Side length of the square classifier input.
pub const INPUT_SIZE: usize = 80;
/// Colour planes in the input (R, G, B; alpha is dropped).
pub const INPUT_CHANNELS: usize = 3;
/// Total number of values in one input tensor.
pub const TENSOR_LEN: usize = INPUT_CHANNELS * INPUT_SIZE * INPUT_SIZE;

/// Classifier input of shape `(1, 3, 80, 80)`.
///
/// Stored in standard layout, so [`FrameTensor::as_slice`] yields the R plane,
/// then the G plane, then the B plane, each row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor {
    data: Array4<f32>,
}

impl FrameTensor {
    /// Wrap a flat channel-planar buffer. Returns `None` unless it holds
    /// exactly [`TENSOR_LEN`] values.
    pub fn from_planar(values: Vec<f32>) -> Option<Self> {
        Array4::from_shape_vec((1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE), values)
            .ok()
            .map(|data| Self { data })
    }

    pub fn as_slice(&self) -> &[f32] {
        // Constructed in standard layout in every path.
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Resample `frame` to the classifier input.
///
/// Source coordinates are `floor(x * W / 80)` and `floor(y * H / 80)`,
/// computed in integer arithmetic so the result is exact and stays inside
/// the frame for every resolution.
pub fn preprocess(frame: &PixelBuffer) -> FrameTensor {
    let width = frame.width() as usize;
    let height = frame.height() as usize;

    let data = Array4::from_shape_fn(
        (1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE),
        |(_, c, y, x)| {
            let src_x = x * width / INPUT_SIZE;
            let src_y = y * height / INPUT_SIZE;
            f32::from(frame.rgba_at(src_x, src_y)[c]) / 255.0
        },
    );

    FrameTensor { data }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> PixelBuffer {
        let data = rgba.repeat((width * height) as usize);
        PixelBuffer::new(width, height, data).unwrap()
    }

    /// Frame with a pseudo-random but reproducible pattern.
    fn patterned_frame(width: u32, height: u32) -> PixelBuffer {
        let len = (width * height) as usize * 4;
        let data = (0..len).map(|i| (i.wrapping_mul(31) % 251) as u8).collect();
        PixelBuffer::new(width, height, data).unwrap()
    }

    #[test]
    fn test_shape_is_fixed_across_resolutions() {
        for (w, h) in [(1, 1), (1, 80), (79, 3), (80, 80), (81, 81), (640, 480), (1920, 1080)] {
            let tensor = preprocess(&patterned_frame(w, h));
            assert_eq!(tensor.shape(), &[1, 3, 80, 80], "resolution {w}x{h}");
            assert_eq!(tensor.len(), TENSOR_LEN);
            assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_deterministic() {
        let frame = patterned_frame(333, 217);
        let a = preprocess(&frame);
        let b = preprocess(&frame);
        let bits_a: Vec<u32> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u32> = b.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_channel_planar_layout_and_alpha_dropped() {
        let tensor = preprocess(&solid_frame(17, 9, [255, 0, 51, 7]));
        let plane = INPUT_SIZE * INPUT_SIZE;
        let values = tensor.as_slice();
        assert!(values[..plane].iter().all(|&v| v == 1.0));
        assert!(values[plane..2 * plane].iter().all(|&v| v == 0.0));
        assert!(values[2 * plane..].iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_single_pixel_frame_fills_every_position() {
        let tensor = preprocess(&solid_frame(1, 1, [0, 255, 0, 255]));
        let plane = INPUT_SIZE * INPUT_SIZE;
        assert!(tensor.as_slice()[plane..2 * plane].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_nearest_neighbour_sampling() {
        // 160x160 frame: red encodes x/2, green encodes y/2, so destination
        // (x, y) must sample source (2x, 2y) and read back (x, y).
        let mut data = Vec::with_capacity(160 * 160 * 4);
        for y in 0..160u32 {
            for x in 0..160u32 {
                data.extend_from_slice(&[(x / 2) as u8, (y / 2) as u8, 0, 255]);
            }
        }
        let tensor = preprocess(&PixelBuffer::new(160, 160, data).unwrap());
        let values = tensor.as_slice();
        let plane = INPUT_SIZE * INPUT_SIZE;
        for (x, y) in [(0usize, 0usize), (13, 57), (79, 79)] {
            let r = values[y * INPUT_SIZE + x];
            let g = values[plane + y * INPUT_SIZE + x];
            assert_eq!(r, x as f32 / 255.0);
            assert_eq!(g, y as f32 / 255.0);
        }
    }

    #[test]
    fn test_downsampling_uses_floor_coordinates() {
        // Width 100: destination x=79 maps to floor(79 * 100 / 80) = 98.
        let mut data = vec![0u8; 100 * 4];
        data[98 * 4] = 200;
        let tensor = preprocess(&PixelBuffer::new(100, 1, data).unwrap());
        assert_eq!(tensor.as_slice()[79], 200.0 / 255.0);
        assert_eq!(tensor.as_slice()[78], 0.0);
    }

    #[test]
    fn test_from_planar_requires_exact_length() {
        assert!(FrameTensor::from_planar(vec![0.0; TENSOR_LEN]).is_some());
        assert!(FrameTensor::from_planar(vec![0.0; TENSOR_LEN - 1]).is_none());
    }
}
