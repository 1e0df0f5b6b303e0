use rand::{Rng, RngCore};
use tracing::{debug, instrument};

use super::Filter;
use crate::{
    buffer::{count, mask_equals, ImageBuffer, WHITE},
    error::{FilterError, Result},
    ops::{add_gaussian_noise, blend, color_matrix, contrast, gaussian_blur, resize_to_fit},
};

/// Row-major RGB -> sepia color matrix.
pub const SEPIA: [[f64; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VintageConfig {
    /// Weight of the faded sepia image against the original, 0..=1.
    pub sepia_amount: f64,
    /// Standard deviation of the grain.
    pub noise_amount: f64,
    /// Restore pixels that were pure white before filtering.
    pub preserve_white: bool,
    /// Longest allowed side; larger inputs are downscaled first.
    pub max_dimension: usize,
    pub contrast_factor: f64,
    pub blur_sigma: f64,
}

impl Default for VintageConfig {
    fn default() -> Self {
        Self {
            sepia_amount: 0.5,
            noise_amount: 5.0,
            preserve_white: true,
            max_dimension: 1500,
            contrast_factor: 0.85,
            blur_sigma: 0.5,
        }
    }
}

impl VintageConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sepia_amount) {
            return Err(FilterError::invalid(
                "sepia_amount",
                format!("{} is outside 0..=1", self.sepia_amount),
            ));
        }
        if !self.noise_amount.is_finite() || self.noise_amount < 0.0 {
            return Err(FilterError::invalid(
                "noise_amount",
                format!("{} must be a finite value >= 0", self.noise_amount),
            ));
        }
        if self.max_dimension == 0 {
            return Err(FilterError::invalid("max_dimension", "must be greater than 0"));
        }
        if !self.contrast_factor.is_finite() || self.contrast_factor < 0.0 {
            return Err(FilterError::invalid(
                "contrast_factor",
                format!("{} must be a finite value >= 0", self.contrast_factor),
            ));
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(FilterError::invalid(
                "blur_sigma",
                format!("{} must be a finite value >= 0", self.blur_sigma),
            ));
        }
        Ok(())
    }
}

/// Aged-photo look: sepia, soften, fade, mix the original back in, then grain.
///
/// The output has the size of the input after fitting it into
/// `max_dimension`. Grain is drawn from `rng`, so a seeded generator gives
/// byte-identical results.
#[instrument(skip(buffer, rng), fields(width = buffer.width(), height = buffer.height()))]
pub fn apply_vintage<R: Rng + ?Sized>(
    buffer: &ImageBuffer,
    config: &VintageConfig,
    rng: &mut R,
) -> Result<ImageBuffer> {
    config.validate()?;
    if buffer.is_empty() {
        return Err(FilterError::EmptyImage);
    }

    let original = resize_to_fit(buffer.clone(), config.max_dimension)?;

    let sepia = color_matrix(&original, &SEPIA);
    let faded = gaussian_blur(&sepia, config.blur_sigma);
    let faded = contrast(&faded, config.contrast_factor);
    let faded = blend(&faded, &original, 1.0 - config.sepia_amount)?;
    let grained = add_gaussian_noise(&faded, config.noise_amount, rng)?;

    if !config.preserve_white {
        return Ok(grained);
    }

    let white = mask_equals(&original, WHITE);
    debug!(preserved = count(&white), "restoring white pixels");
    Ok(grained.fill_masked(&white, WHITE))
}

pub struct Vintage {
    config: VintageConfig,
}

impl Vintage {
    pub fn new(config: VintageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VintageConfig {
        &self.config
    }
}

impl Filter for Vintage {
    fn name(&self) -> &'static str {
        "vintage"
    }

    fn transform_buffer(&self, buffer: &ImageBuffer, rng: &mut dyn RngCore) -> Result<ImageBuffer> {
        apply_vintage(buffer, &self.config, rng)
    }
}
