//! Conversions between [RasterFrame] and standalone image formats like PNG and TGA.
//!
//! Encoding and decoding delegate to [image]. These conversions cover inputs
//! that hold a single frame directly instead of the mip chain in a
//! [Txtr](crate::txtr::Txtr).
use std::{io::Cursor, path::Path};

use image::ImageFormat;
use thiserror::Error;

use crate::{error::DecodeError, surface::RasterFrame};

#[derive(Debug, Error)]
pub enum StandaloneError {
    #[error("error encoding or decoding image: {0}")]
    Image(#[from] image::error::ImageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Decode a single frame image in the given format to an RGBA frame.
pub fn decode<T: AsRef<[u8]>>(bytes: T, format: ImageFormat) -> Result<RasterFrame, StandaloneError> {
    let image = image::load_from_memory_with_format(bytes.as_ref(), format)?;
    Ok(RasterFrame::from_image(&image.to_rgba8()))
}

/// Decode a single frame image from `path` using the extension to select the format.
///
/// Formats without a signature like TGA cannot be detected from file contents alone.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<RasterFrame, StandaloneError> {
    let image = image::open(path)?;
    Ok(RasterFrame::from_image(&image.to_rgba8()))
}

/// Encode `frame` losslessly to PNG for export.
pub fn encode_png(frame: &RasterFrame) -> Result<Vec<u8>, StandaloneError> {
    let image = frame.to_image()?;
    let mut writer = Cursor::new(Vec::new());
    image.write_to(&mut writer, ImageFormat::Png)?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_encode_decode_round_trip() {
        let frame = RasterFrame {
            width: 3,
            height: 2,
            pixels: (0u8..24).collect(),
        };

        let png = encode_png(&frame).unwrap();
        assert_eq!(frame, decode(png, ImageFormat::Png).unwrap());
    }

    #[test]
    fn encode_invalid_frame() {
        let frame = RasterFrame {
            width: 2,
            height: 2,
            pixels: vec![0u8; 3],
        };
        assert!(matches!(
            encode_png(&frame),
            Err(StandaloneError::Decode(
                DecodeError::UnexpectedSurfaceSize { .. }
            ))
        ));
    }
}
