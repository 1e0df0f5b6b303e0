mod line_blend;
mod vintage;

pub use line_blend::{apply_line_blend, LineBlend, LineBlendConfig};
pub use vintage::{apply_vintage, Vintage, VintageConfig, SEPIA};

use rand::RngCore;

use crate::{buffer::ImageBuffer, error::Result};

/// A single-image transform. Implementations hold a validated config and
/// never keep state between calls, so one instance can serve many threads.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform_buffer(&self, buffer: &ImageBuffer, rng: &mut dyn RngCore) -> Result<ImageBuffer>;
}
