use std::path::Path;

use tracing::debug;

use crate::{
    buffer::ImageBuffer,
    error::{FilterError, Result},
};

/// Lowercase extensions the codec is expected to handle.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reads any supported format and flattens it to 8-bit RGB.
pub fn decode(path: impl AsRef<Path>) -> Result<ImageBuffer> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| FilterError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "decoded"
    );
    ImageBuffer::from_rgb_image(image.to_rgb8())
}

/// Writes the buffer; the format follows the file extension.
pub fn encode(buffer: &ImageBuffer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    buffer
        .to_rgb_image()?
        .save(path)
        .map_err(|source| FilterError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("retrotone-codec-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn recognises_image_extensions() {
        assert!(is_image_path(Path::new("a/b.PNG")));
        assert!(is_image_path(Path::new("scan.jpeg")));
        assert!(is_image_path(Path::new("x.webp")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("png")));
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let img = ImageBuffer::from_fn(9, 4, |x, y| [(x * 25) as u8, (y * 60) as u8, 17]);
        let path = scratch("round_trip.png");
        encode(&img, &path).unwrap();
        assert_eq!(decode(&path).unwrap(), img);
    }

    #[test]
    fn alpha_is_dropped_on_decode() {
        let path = scratch("alpha.png");
        let rgba = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 0]));
        rgba.save(&path).unwrap();

        let img = decode(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.pixel(2, 1), [10, 20, 30]);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = decode(scratch("does-not-exist.png")).unwrap_err();
        assert!(matches!(err, FilterError::Decode { .. }));
    }

    #[test]
    fn unknown_extension_is_an_encode_error() {
        let img = ImageBuffer::new(2, 2);
        let err = encode(&img, scratch("out.unknownext")).unwrap_err();
        assert!(matches!(err, FilterError::Encode { .. }));
    }
}
