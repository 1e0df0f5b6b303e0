use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("pixel mask selects no pixels")]
    EmptySelection,

    #[error("no mid-tone pixels to calculate the replacement color from")]
    NoMidtonePixels,

    #[error("image has zero width or height")]
    EmptyImage,

    #[error("buffer of {len} bytes does not match a {width}x{height} RGB image")]
    Shape { width: usize, height: usize, len: usize },

    #[error("image sizes differ: {left:?} vs {right:?}")]
    SizeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl FilterError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = FilterError> = std::result::Result<T, E>;
