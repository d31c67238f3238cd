use ndarray::ArrayView3;

/// One decoded picture from a media source: tightly packed RGB bytes, row-major.
///
/// Pixel layout conversion happens inside the media backends; everything
/// downstream (analyzers, the sampling loop) sees this one format.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
        }
    }

    /// Wraps an `image` RGB buffer without copying.
    pub fn from_rgb_image(image: image::RgbImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, sequence)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of this frame in its source's decode order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// A frame with zero width or height carries no pixels worth analyzing.
    pub fn is_decodable(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Copies the rectangle `(x, y, w, h)` into a new frame, clamped to bounds.
    ///
    /// Returns `None` when the clamped rectangle is empty.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<Frame> {
        let x1 = x.min(self.width);
        let y1 = y.min(self.height);
        let x2 = x.saturating_add(w).min(self.width);
        let y2 = y.saturating_add(h).min(self.height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let row_bytes = (x2 - x1) as usize * channels;
        let mut data = Vec::with_capacity(row_bytes * (y2 - y1) as usize);
        for row in y1..y2 {
            let start = (row as usize * self.width as usize + x1 as usize) * channels;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Some(Frame::new(data, x2 - x1, y2 - y1, self.channels, self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::new();
        for row in 0..height {
            for col in 0..width {
                data.extend_from_slice(&[row as u8, col as u8, 0]);
            }
        }
        Frame::new(data, width, height, 3, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let frame = Frame::new(vec![0u8; 12], 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.sequence(), 5);
        assert!(frame.is_decodable());
    }

    #[test]
    fn test_empty_frame_is_not_decodable() {
        let frame = Frame::new(Vec::new(), 0, 0, 3, 0);
        assert!(!frame.is_decodable());
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_from_rgb_image_keeps_dimensions() {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3]));
        let frame = Frame::from_rgb_image(img, 9);
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(&frame.data()[..3], &[1, 2, 3]);
        assert_eq!(frame.sequence(), 9);
    }

    #[test]
    fn test_as_ndarray_is_height_width_channels() {
        let frame = gradient(4, 2);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 4, 3]);
        assert_eq!(arr[[1, 3, 0]], 1);
        assert_eq!(arr[[1, 3, 1]], 3);
    }

    #[test]
    fn test_crop_copies_requested_rectangle() {
        let frame = gradient(5, 5);
        let crop = frame.crop(1, 2, 2, 2).unwrap();
        assert_eq!((crop.width(), crop.height()), (2, 2));
        let arr = crop.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 2); // source row 2
        assert_eq!(arr[[0, 0, 1]], 1); // source col 1
        assert_eq!(arr[[1, 1, 1]], 2);
        assert_eq!(crop.sequence(), 7);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let frame = gradient(4, 4);
        let crop = frame.crop(3, 3, 10, 10).unwrap();
        assert_eq!((crop.width(), crop.height()), (1, 1));
    }

    #[test]
    fn test_crop_outside_returns_none() {
        let frame = gradient(4, 4);
        assert!(frame.crop(4, 0, 2, 2).is_none());
        assert!(frame.crop(0, 0, 0, 2).is_none());
    }
}
