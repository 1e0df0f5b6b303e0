use rand::RngCore;
use tracing::{debug, instrument};

use super::Filter;
use crate::{
    buffer::{count, mask_greater_than, mask_less_than, mean_color, ImageBuffer},
    error::{FilterError, Result},
    ops::clamp,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineBlendConfig {
    /// Pixels with every channel below this are treated as line work.
    pub black_threshold: u8,
    /// Pixels with every channel above this are treated as paper.
    pub white_threshold: u8,
    /// Multiplier applied to the mid-tone average, 0..=1.
    pub saturation: f64,
}

impl Default for LineBlendConfig {
    fn default() -> Self {
        Self {
            black_threshold: 50,
            white_threshold: 230,
            saturation: 0.5,
        }
    }
}

impl LineBlendConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.saturation) {
            return Err(FilterError::invalid(
                "saturation",
                format!("{} is outside 0..=1", self.saturation),
            ));
        }
        Ok(())
    }
}

/// Replaces near-black pixels with a darkened average of the mid-tones.
#[instrument(skip(buffer), fields(width = buffer.width(), height = buffer.height()))]
pub fn apply_line_blend(buffer: &ImageBuffer, config: &LineBlendConfig) -> Result<ImageBuffer> {
    config.validate()?;
    if buffer.is_empty() {
        return Err(FilterError::EmptyImage);
    }

    let white = mask_greater_than(buffer, config.white_threshold);
    let black = mask_less_than(buffer, config.black_threshold);
    let midtones = ndarray::Zip::from(&white)
        .and(&black)
        .map_collect(|&w, &b| !(w || b));

    let avg = mean_color(buffer, &midtones).map_err(|e| match e {
        FilterError::EmptySelection => FilterError::NoMidtonePixels,
        other => other,
    })?;
    let replacement = avg.map(|v| clamp(v * config.saturation));

    debug!(
        black = count(&black),
        white = count(&white),
        midtones = count(&midtones),
        ?avg,
        ?replacement,
        "line blend"
    );

    Ok(buffer.clone().fill_masked(&black, replacement))
}

pub struct LineBlend {
    config: LineBlendConfig,
}

impl LineBlend {
    pub fn new(config: LineBlendConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LineBlendConfig {
        &self.config
    }
}

impl Filter for LineBlend {
    fn name(&self) -> &'static str {
        "line-blend"
    }

    fn transform_buffer(
        &self,
        buffer: &ImageBuffer,
        _rng: &mut dyn RngCore,
    ) -> Result<ImageBuffer> {
        apply_line_blend(buffer, &self.config)
    }
}
