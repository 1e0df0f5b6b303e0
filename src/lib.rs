//! Aged-photo and line-blending filters for RGB raster images.
//!
//! Both filters are pure functions of an [`ImageBuffer`], a validated config
//! and (for grain) an explicitly passed random source. Decoding, encoding and
//! directory traversal live in [`codec`] and [`batch`].

pub mod batch;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod filter;
pub mod ops;

pub use buffer::{ColorVector, ImageBuffer, PixelMask};
pub use error::{FilterError, Result};
pub use filter::{
    apply_line_blend, apply_vintage, Filter, LineBlend, LineBlendConfig, Vintage, VintageConfig,
};
