use image::RgbImage;
use ndarray::{Array2, Array3, Axis, Zip};

use crate::error::{FilterError, Result};

/// Per-pixel selection, shape `(height, width)`.
pub type PixelMask = Array2<bool>;

/// Unclamped per-channel color used for averages and matrix products.
pub type ColorVector = [f64; 3];

pub const WHITE: [u8; 3] = [255, 255, 255];

/// Owned 8-bit RGB raster stored as a `(height, width, 3)` array.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    data: Array3<u8>,
}

impl ImageBuffer {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: Array3::zeros((height, width, 3)),
        }
    }

    /// Wraps row-major interleaved RGB bytes.
    pub fn from_raw(width: usize, height: usize, raw: Vec<u8>) -> Result<Self> {
        let len = raw.len();
        let data = Array3::from_shape_vec((height, width, 3), raw)
            .map_err(|_| FilterError::Shape { width, height, len })?;
        Ok(Self { data })
    }

    /// Builds an image from a row-major list of pixels.
    pub fn from_pixels(width: usize, height: usize, pixels: &[[u8; 3]]) -> Result<Self> {
        Self::from_raw(width, height, pixels.iter().flatten().copied().collect())
    }

    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> [u8; 3],
    ) -> Self {
        let data = Array3::from_shape_fn((height, width, 3), |(y, x, c)| f(x, y)[c]);
        Self { data }
    }

    pub(crate) fn from_array(data: Array3<u8>) -> Self {
        debug_assert_eq!(data.len_of(Axis(2)), 3);
        Self { data }
    }

    pub fn from_rgb_image(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::from_raw(width as usize, height as usize, image.into_raw())
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let raw: Vec<u8> = self.data.iter().copied().collect();
        let len = raw.len();
        RgbImage::from_raw(self.width() as u32, self.height() as u32, raw).ok_or(
            FilterError::Shape {
                width: self.width(),
                height: self.height(),
                len,
            },
        )
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        [
            self.data[[y, x, 0]],
            self.data[[y, x, 1]],
            self.data[[y, x, 2]],
        ]
    }

    pub fn put_pixel(&mut self, x: usize, y: usize, value: [u8; 3]) {
        for (c, v) in value.into_iter().enumerate() {
            self.data[[y, x, c]] = v;
        }
    }

    /// Pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data
            .lanes(Axis(2))
            .into_iter()
            .map(|px| [px[0], px[1], px[2]])
    }

    pub fn as_array(&self) -> &Array3<u8> {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    /// Returns a copy with every pixel selected by `mask` set to `color`.
    pub fn fill_masked(mut self, mask: &PixelMask, color: [u8; 3]) -> Self {
        Zip::from(self.data.lanes_mut(Axis(2)))
            .and(mask)
            .for_each(|mut px, &selected| {
                if selected {
                    px[0] = color[0];
                    px[1] = color[1];
                    px[2] = color[2];
                }
            });
        self
    }
}

fn mask_where(buffer: &ImageBuffer, test: impl Fn(u8) -> bool) -> PixelMask {
    buffer
        .data
        .map_axis(Axis(2), |px| px.iter().all(|&v| test(v)))
}

/// True where all three channels are strictly above `threshold`.
pub fn mask_greater_than(buffer: &ImageBuffer, threshold: u8) -> PixelMask {
    mask_where(buffer, |v| v > threshold)
}

/// True where all three channels are strictly below `threshold`.
pub fn mask_less_than(buffer: &ImageBuffer, threshold: u8) -> PixelMask {
    mask_where(buffer, |v| v < threshold)
}

/// True where the pixel equals `color` exactly.
pub fn mask_equals(buffer: &ImageBuffer, color: [u8; 3]) -> PixelMask {
    buffer
        .data
        .map_axis(Axis(2), |px| px.iter().zip(color).all(|(&v, c)| v == c))
}

pub fn count(mask: &PixelMask) -> usize {
    mask.iter().filter(|&&selected| selected).count()
}

/// Per-channel arithmetic mean over the selected pixels.
pub fn mean_color(buffer: &ImageBuffer, mask: &PixelMask) -> Result<ColorVector> {
    let mut sum = [0u64; 3];
    let mut n = 0u64;

    Zip::from(buffer.data.lanes(Axis(2)))
        .and(mask)
        .for_each(|px, &selected| {
            if selected {
                for c in 0..3 {
                    sum[c] += px[c] as u64;
                }
                n += 1;
            }
        });

    if n == 0 {
        return Err(FilterError::EmptySelection);
    }

    Ok(sum.map(|s| s as f64 / n as f64))
}
