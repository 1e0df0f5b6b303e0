//! Compositing primitives shared by the filters.
//!
//! Every operation takes its inputs by reference and returns a fresh buffer.
//! Results are written back into 8-bit channels through [`clamp`], which
//! truncates instead of rounding; [`gaussian_blur`] is the one exception,
//! see its docs.

use image::imageops::{self, FilterType};
use ndarray::{Array3, Axis, Zip};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::buffer::ImageBuffer;
use crate::error::{FilterError, Result};

/// Clamps into `[0, 255]` and truncates toward zero. NaN maps to 0.
#[inline]
pub fn clamp(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

fn ensure_same_size(a: &ImageBuffer, b: &ImageBuffer) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(FilterError::SizeMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }
    Ok(())
}

/// Per-channel `a * (1 - alpha) + b * alpha`.
pub fn blend(a: &ImageBuffer, b: &ImageBuffer, alpha: f64) -> Result<ImageBuffer> {
    ensure_same_size(a, b)?;
    if !(0.0..=1.0).contains(&alpha) {
        return Err(FilterError::invalid("alpha", format!("{alpha} is outside 0..=1")));
    }

    let data = Zip::from(a.as_array())
        .and(b.as_array())
        .map_collect(|&x, &y| clamp(x as f64 * (1.0 - alpha) + y as f64 * alpha));
    Ok(ImageBuffer::from_array(data))
}

/// Normalised 1-D Gaussian kernel with radius `ceil(3 * sigma)`.
///
/// `None` when `sigma` is so small that the variance underflows to zero;
/// such a kernel is the identity.
fn gaussian_kernel(sigma: f64) -> Option<Vec<f64>> {
    let two_var = 2.0 * sigma * sigma;
    if two_var == 0.0 {
        return None;
    }

    let radius = (3.0 * sigma).ceil() as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / two_var).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total == 0.0 {
        return None;
    }
    Some(weights.into_iter().map(|w| w / total).collect())
}

/// Separable Gaussian blur with edge-replicate borders.
///
/// The horizontal pass is kept in `f64`; the vertical pass rounds to nearest
/// before clamping, so flat regions come out unchanged. A `sigma` of zero
/// (or less) returns an unchanged copy.
pub fn gaussian_blur(buffer: &ImageBuffer, sigma: f64) -> ImageBuffer {
    if sigma <= 0.0 || buffer.is_empty() {
        return buffer.clone();
    }
    let Some(kernel) = gaussian_kernel(sigma) else {
        return buffer.clone();
    };
    let radius = (kernel.len() / 2) as isize;
    let (width, height) = buffer.dimensions();
    let src = buffer.as_array();

    let sample = |i: usize, k: usize, len: usize| -> usize {
        (i as isize + k as isize - radius).clamp(0, len as isize - 1) as usize
    };

    let mut horizontal = Array3::<f64>::zeros((height, width, 3));
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                horizontal[[y, x, c]] = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * src[[y, sample(x, k, width), c]] as f64)
                    .sum();
            }
        }
    }

    let data = Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
        let acc: f64 = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * horizontal[[sample(y, k, height), x, c]])
            .sum();
        clamp(acc.round())
    });

    ImageBuffer::from_array(data)
}

/// ITU-R 601 luma in fixed point, the same weights used for grayscale
/// conversion by most imaging libraries.
#[inline]
fn luma(px: [u8; 3]) -> u32 {
    (19595 * px[0] as u32 + 38470 * px[1] as u32 + 7471 * px[2] as u32 + 0x8000) >> 16
}

/// Rounded mean luma of the whole image.
pub fn mean_luma(buffer: &ImageBuffer) -> f64 {
    let n = buffer.width() * buffer.height();
    if n == 0 {
        return 0.0;
    }
    let total: u64 = buffer.pixels().map(|px| luma(px) as u64).sum();
    (total as f64 / n as f64 + 0.5).floor()
}

/// Scales every channel's distance from the image's mean luma by `factor`.
pub fn contrast(buffer: &ImageBuffer, factor: f64) -> ImageBuffer {
    let pivot = mean_luma(buffer);
    debug!(pivot, factor, "contrast");

    let data = buffer
        .as_array()
        .mapv(|v| clamp(pivot + factor * (v as f64 - pivot)));
    ImageBuffer::from_array(data)
}

/// Adds monochromatic grain: one `N(0, stddev)` sample per pixel, added to
/// all three channels. Samples are drawn in row-major order.
pub fn add_gaussian_noise<R: Rng + ?Sized>(
    buffer: &ImageBuffer,
    stddev: f64,
    rng: &mut R,
) -> Result<ImageBuffer> {
    let normal = Normal::new(0.0, stddev)
        .map_err(|e| FilterError::invalid("noise_amount", e.to_string()))?;

    let mut data = buffer.as_array().clone();
    for mut px in data.lanes_mut(Axis(2)) {
        let noise = normal.sample(rng);
        px.mapv_inplace(|v| clamp(v as f64 + noise));
    }
    Ok(ImageBuffer::from_array(data))
}

/// Applies a 3x3 color matrix to every pixel (`out = M * [r, g, b]`).
pub fn color_matrix(buffer: &ImageBuffer, matrix: &[[f64; 3]; 3]) -> ImageBuffer {
    let mut data = buffer.as_array().clone();
    for mut px in data.lanes_mut(Axis(2)) {
        let rgb = [px[0] as f64, px[1] as f64, px[2] as f64];
        for (c, row) in matrix.iter().enumerate() {
            px[c] = clamp(row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]);
        }
    }
    ImageBuffer::from_array(data)
}

/// Size that fits inside `max_dimension` on both sides, keeping the aspect
/// ratio. Never upscales.
pub fn fit_dimensions(width: usize, height: usize, max_dimension: usize) -> (usize, usize) {
    if width.max(height) <= max_dimension {
        return (width, height);
    }

    let scale = |side: usize, longer: usize| {
        ((side as f64 * max_dimension as f64 / longer as f64).round() as usize).max(1)
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Downscales with bicubic resampling so neither side exceeds `max_dimension`.
pub fn resize_to_fit(buffer: ImageBuffer, max_dimension: usize) -> Result<ImageBuffer> {
    let (width, height) = buffer.dimensions();
    let (new_width, new_height) = fit_dimensions(width, height, max_dimension);
    if (new_width, new_height) == (width, height) {
        return Ok(buffer);
    }

    debug!(width, height, new_width, new_height, "resizing");
    let resized = imageops::resize(
        &buffer.to_rgb_image()?,
        new_width as u32,
        new_height as u32,
        FilterType::CatmullRom,
    );
    ImageBuffer::from_rgb_image(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn gradient(width: usize, height: usize) -> ImageBuffer {
        ImageBuffer::from_fn(width, height, |x, y| {
            [(x * 37 % 256) as u8, (y * 53 % 256) as u8, ((x + y) * 11 % 256) as u8]
        })
    }

    #[test]
    fn clamp_truncates() {
        assert_eq!(clamp(50.95), 50);
        assert_eq!(clamp(-3.2), 0);
        assert_eq!(clamp(300.0), 255);
        assert_eq!(clamp(254.999), 254);
        assert_eq!(clamp(f64::NAN), 0);
    }

    #[test]
    fn blend_endpoints_return_inputs() {
        let a = gradient(7, 5);
        let b = ImageBuffer::from_fn(7, 5, |x, y| [200 - x as u8, 3 * y as u8, 90]);
        assert_eq!(blend(&a, &b, 0.0).unwrap(), a);
        assert_eq!(blend(&a, &b, 1.0).unwrap(), b);
    }

    #[test]
    fn blend_midpoint_truncates() {
        let a = ImageBuffer::from_pixels(1, 1, &[[100, 0, 255]]).unwrap();
        let b = ImageBuffer::from_pixels(1, 1, &[[101, 255, 0]]).unwrap();
        assert_eq!(blend(&a, &b, 0.5).unwrap().pixel(0, 0), [100, 127, 127]);
    }

    #[test]
    fn blend_rejects_mismatched_sizes_and_alpha() {
        let a = ImageBuffer::new(2, 2);
        let b = ImageBuffer::new(3, 2);
        assert!(matches!(blend(&a, &b, 0.5), Err(FilterError::SizeMismatch { .. })));
        assert!(matches!(
            blend(&a, &a, 1.5),
            Err(FilterError::InvalidConfig { field: "alpha", .. })
        ));
    }

    #[test]
    fn kernel_is_normalised_with_three_sigma_support() {
        let kernel = gaussian_kernel(0.5).unwrap();
        assert_eq!(kernel.len(), 5);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
        assert_eq!(gaussian_kernel(2.0).unwrap().len(), 13);
    }

    #[test]
    fn tiny_sigma_blur_is_identity() {
        assert!(gaussian_kernel(1e-200).is_none());

        let img = ImageBuffer::from_fn(4, 4, |_, _| [200, 150, 100]);
        assert_eq!(gaussian_blur(&img, 1e-200), img);

        let img = gradient(5, 3);
        assert_eq!(gaussian_blur(&img, 1e-170), img);
    }

    #[test]
    fn blur_keeps_flat_image() {
        let flat = ImageBuffer::from_fn(6, 4, |_, _| [123, 45, 200]);
        assert_eq!(gaussian_blur(&flat, 0.5), flat);
        assert_eq!(gaussian_blur(&flat, 3.0), flat);
    }

    #[test]
    fn blur_softens_a_single_bright_pixel() {
        let mut img = ImageBuffer::new(5, 5);
        img.put_pixel(2, 2, [255, 255, 255]);
        let out = gaussian_blur(&img, 0.5);
        let centre = out.pixel(2, 2)[0];
        let side = out.pixel(1, 2)[0];
        assert!(centre < 255 && centre > side);
        assert!(side > 0);
        assert_eq!(out.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn zero_sigma_blur_is_identity() {
        let img = gradient(4, 4);
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn contrast_pivots_on_mean_luma() {
        let img = ImageBuffer::from_pixels(2, 1, &[[0, 0, 0], [200, 200, 200]]).unwrap();
        assert_eq!(mean_luma(&img), 100.0);

        let out = contrast(&img, 0.5);
        assert_eq!(out.pixel(0, 0), [50, 50, 50]);
        assert_eq!(out.pixel(1, 0), [150, 150, 150]);
    }

    #[test]
    fn zero_contrast_is_flat_pivot() {
        let img = ImageBuffer::from_pixels(2, 1, &[[0, 0, 0], [200, 200, 200]]).unwrap();
        let out = contrast(&img, 0.0);
        assert!(out.pixels().all(|px| px == [100, 100, 100]));
    }

    #[test]
    fn unit_contrast_is_identity() {
        let img = gradient(9, 3);
        assert_eq!(contrast(&img, 1.0), img);
    }

    #[test]
    fn grain_is_the_same_on_every_channel() {
        let img = ImageBuffer::from_fn(16, 16, |_, _| [128, 128, 128]);
        let mut rng = StdRng::seed_from_u64(7);
        let out = add_gaussian_noise(&img, 10.0, &mut rng).unwrap();

        assert!(out.pixels().all(|[r, g, b]| r == g && g == b));
        assert!(out.pixels().any(|px| px != [128, 128, 128]));
    }

    #[test]
    fn grain_is_reproducible_with_a_seed() {
        let img = gradient(10, 10);
        let a = add_gaussian_noise(&img, 5.0, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = add_gaussian_noise(&img, 5.0, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_grain_is_identity() {
        let img = gradient(10, 10);
        let out = add_gaussian_noise(&img, 0.0, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn sepia_matrix_on_known_pixels() {
        let sepia = [
            [0.393, 0.769, 0.189],
            [0.349, 0.686, 0.168],
            [0.272, 0.534, 0.131],
        ];
        let img = ImageBuffer::from_pixels(2, 1, &[[100, 100, 100], [255, 255, 255]]).unwrap();
        let out = color_matrix(&img, &sepia);
        assert_eq!(out.pixel(0, 0), [135, 120, 93]);
        assert_eq!(out.pixel(1, 0), [255, 255, 238]);
    }

    #[test]
    fn fit_dimensions_keeps_aspect() {
        assert_eq!(fit_dimensions(3000, 2000, 1500), (1500, 1000));
        assert_eq!(fit_dimensions(1000, 4000, 1500), (375, 1500));
        assert_eq!(fit_dimensions(1500, 10, 1500), (1500, 10));
        assert_eq!(fit_dimensions(800, 600, 1500), (800, 600));
        assert_eq!(fit_dimensions(5000, 1, 100), (100, 1));
    }

    #[test]
    fn resize_never_upscales() {
        let img = gradient(30, 20);
        assert_eq!(resize_to_fit(img.clone(), 100).unwrap(), img);

        let small = resize_to_fit(img, 15).unwrap();
        assert_eq!(small.dimensions(), (15, 10));
    }
}
