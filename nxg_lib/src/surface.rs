//! Decoding of packed and block compressed surface data to RGBA frames.
//!
//! Uncompressed formats are a per texel channel reordering.
//! Block compressed formats store 4x4 texel blocks in a fixed byte count
//! and are expanded one block at a time.
//! Texels from partial blocks at the right and bottom edges are discarded
//! so the decoded frame is always exactly `width * height` texels.
use image::RgbaImage;

use crate::{error::DecodeError, txtr::ImageFormat};

/// One fully decoded image.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RasterFrame {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
    /// Row-major RGBA image data with `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl RasterFrame {
    /// Convert to an [RgbaImage] for encoding to formats like PNG.
    pub fn to_image(&self) -> Result<RgbaImage, DecodeError> {
        let expected = (self.width as u64 * self.height as u64).saturating_mul(4);
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or(
            DecodeError::UnexpectedSurfaceSize {
                expected,
                actual: self.pixels.len(),
            },
        )
    }

    pub fn from_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.as_raw().clone(),
        }
    }
}

/// Decode `data` for a single mip level to an RGBA frame.
///
/// `data` must contain exactly
/// [surface_size_in_bytes](ImageFormat::surface_size_in_bytes) bytes.
pub fn decode_surface(
    image_format: ImageFormat,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<RasterFrame, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    let expected = image_format.surface_size_in_bytes(width, height);
    if data.len() as u64 != expected {
        return Err(DecodeError::UnexpectedSurfaceSize {
            expected,
            actual: data.len(),
        });
    }

    // Adding a format only requires a new entry here and in ImageFormat.
    let frame = match image_format {
        ImageFormat::Rgba8Unorm => decode_rgba8(width, height, data),
        ImageFormat::Bgra8Unorm => decode_bgra8(width, height, data),
        ImageFormat::Bc1Unorm => decode_blocks(width, height, data, 8, decode_bc1_block),
        ImageFormat::Bc2Unorm => decode_blocks(width, height, data, 16, decode_bc2_block),
        ImageFormat::Bc3Unorm => decode_blocks(width, height, data, 16, decode_bc3_block),
    };
    Ok(frame)
}

fn decode_rgba8(width: u32, height: u32, data: &[u8]) -> RasterFrame {
    RasterFrame {
        width,
        height,
        pixels: data.to_vec(),
    }
}

fn decode_bgra8(width: u32, height: u32, data: &[u8]) -> RasterFrame {
    let mut pixels = Vec::with_capacity(data.len());
    for bgra in data.chunks_exact(4) {
        pixels.extend_from_slice(&[bgra[2], bgra[1], bgra[0], bgra[3]]);
    }
    RasterFrame {
        width,
        height,
        pixels,
    }
}

/// Expand 4x4 blocks and copy the texels in bounds to their row and column.
fn decode_blocks(
    width: u32,
    height: u32,
    data: &[u8],
    bytes_per_block: usize,
    decode_block: fn(&[u8]) -> [[u8; 4]; 16],
) -> RasterFrame {
    let width = width as usize;
    let height = height as usize;
    let blocks_x = width.div_ceil(4);

    let mut pixels = vec![0u8; width * height * 4];
    for (i, block) in data.chunks_exact(bytes_per_block).enumerate() {
        let block_x = (i % blocks_x) * 4;
        let block_y = (i / blocks_x) * 4;

        let texels = decode_block(block);
        for (t, texel) in texels.iter().enumerate() {
            let x = block_x + t % 4;
            let y = block_y + t / 4;
            if x < width && y < height {
                let offset = (y * width + x) * 4;
                pixels[offset..offset + 4].copy_from_slice(texel);
            }
        }
    }

    RasterFrame {
        width: width as u32,
        height: height as u32,
        pixels,
    }
}

fn decode_bc1_block(block: &[u8]) -> [[u8; 4]; 16] {
    let color0 = u16::from_le_bytes([block[0], block[1]]);
    let color1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let palette = color_palette(color0, color1, false);

    let mut texels = [[0u8; 4]; 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        *texel = palette[(indices >> (2 * i) & 0b11) as usize];
    }
    texels
}

fn decode_bc2_block(block: &[u8]) -> [[u8; 4]; 16] {
    let mut alphas = 0u64;
    for (i, byte) in block[0..8].iter().enumerate() {
        alphas |= (*byte as u64) << (8 * i);
    }

    let color0 = u16::from_le_bytes([block[8], block[9]]);
    let color1 = u16::from_le_bytes([block[10], block[11]]);
    let indices = u32::from_le_bytes([block[12], block[13], block[14], block[15]]);

    let palette = color_palette(color0, color1, true);

    let mut texels = [[0u8; 4]; 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        *texel = palette[(indices >> (2 * i) & 0b11) as usize];

        // Explicit 4 bit alpha expanded to 8 bits.
        let alpha = (alphas >> (4 * i) & 0xF) as u8;
        texel[3] = alpha << 4 | alpha;
    }
    texels
}

fn decode_bc3_block(block: &[u8]) -> [[u8; 4]; 16] {
    let alpha0 = block[0];
    let alpha1 = block[1];
    let mut alpha_indices = 0u64;
    for (i, byte) in block[2..8].iter().enumerate() {
        alpha_indices |= (*byte as u64) << (8 * i);
    }

    let color0 = u16::from_le_bytes([block[8], block[9]]);
    let color1 = u16::from_le_bytes([block[10], block[11]]);
    let indices = u32::from_le_bytes([block[12], block[13], block[14], block[15]]);

    let palette = color_palette(color0, color1, true);

    let mut texels = [[0u8; 4]; 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        *texel = palette[(indices >> (2 * i) & 0b11) as usize];
        texel[3] = interpolated_alpha(alpha0, alpha1, (alpha_indices >> (3 * i) & 0b111) as u16);
    }
    texels
}

fn interpolated_alpha(alpha0: u8, alpha1: u8, index: u16) -> u8 {
    if index == 0 {
        alpha0
    } else if index == 1 {
        alpha1
    } else if alpha0 > alpha1 {
        // 6 interpolated alpha values.
        (((8 - index) * alpha0 as u16 + (index - 1) * alpha1 as u16) / 7) as u8
    } else {
        // 4 interpolated alpha values plus fully transparent and fully opaque.
        match index {
            6 => 0,
            7 => 255,
            _ => (((6 - index) * alpha0 as u16 + (index - 1) * alpha1 as u16) / 5) as u8,
        }
    }
}

fn color_palette(color0: u16, color1: u16, always_opaque: bool) -> [[u8; 4]; 4] {
    let [r0, g0, b0] = rgb565(color0);
    let [r1, g1, b1] = rgb565(color1);

    if color0 > color1 || always_opaque {
        [
            [r0, g0, b0, 255],
            [r1, g1, b1, 255],
            [third(r0, r1), third(g0, g1), third(b0, b1), 255],
            [third(r1, r0), third(g1, g0), third(b1, b0), 255],
        ]
    } else {
        // Three color mode with a punch through alpha for the last entry.
        [
            [r0, g0, b0, 255],
            [r1, g1, b1, 255],
            [half(r0, r1), half(g0, g1), half(b0, b1), 255],
            [0, 0, 0, 0],
        ]
    }
}

fn rgb565(color: u16) -> [u8; 3] {
    let r = (color >> 11 & 0x1F) as u8;
    let g = (color >> 5 & 0x3F) as u8;
    let b = (color & 0x1F) as u8;
    // Replicate the high bits to use the full 8 bit range.
    [r << 3 | r >> 2, g << 2 | g >> 4, b << 3 | b >> 2]
}

fn half(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16) / 2) as u8
}

fn third(a: u8, b: u8) -> u8 {
    ((2 * a as u16 + b as u16) / 3) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;

    #[test]
    fn decode_surface_rgba8() {
        let data = hex!(01020304 05060708 090a0b0c 0d0e0f10);
        assert_eq!(
            RasterFrame {
                width: 2,
                height: 2,
                pixels: data.to_vec()
            },
            decode_surface(ImageFormat::Rgba8Unorm, 2, 2, &data).unwrap()
        );
    }

    #[test]
    fn decode_surface_bgra8_swaps_channels() {
        let data = hex!(01020304 05060708);
        assert_eq!(
            RasterFrame {
                width: 2,
                height: 1,
                pixels: hex!(03020104 07060508).to_vec()
            },
            decode_surface(ImageFormat::Bgra8Unorm, 2, 1, &data).unwrap()
        );
    }

    #[test]
    fn decode_surface_bc1_zero_block_is_opaque_black() {
        let frame = decode_surface(ImageFormat::Bc1Unorm, 4, 4, &[0u8; 8]).unwrap();
        assert_eq!(vec![[0, 0, 0, 255]; 16], texels(&frame));
    }

    #[test]
    fn decode_surface_bc1_four_color_mode() {
        // color0 = pure red, color1 = pure blue, one texel of each palette entry.
        let mut block = Vec::new();
        block.extend_from_slice(&0xF800u16.to_le_bytes());
        block.extend_from_slice(&0x001Fu16.to_le_bytes());
        block.extend_from_slice(&0b11100100u32.to_le_bytes());

        // Pad to a full 4x4 block.
        let frame = decode_surface(ImageFormat::Bc1Unorm, 4, 4, &block).unwrap();
        let texels = texels(&frame);
        assert_eq!([255, 0, 0, 255], texels[0]);
        assert_eq!([0, 0, 255, 255], texels[1]);
        assert_eq!([170, 0, 85, 255], texels[2]);
        assert_eq!([85, 0, 170, 255], texels[3]);
    }

    #[test]
    fn decode_surface_bc1_three_color_mode_punch_through() {
        // color0 <= color1 selects three color mode with a transparent entry.
        let mut block = Vec::new();
        block.extend_from_slice(&0x001Fu16.to_le_bytes());
        block.extend_from_slice(&0xF800u16.to_le_bytes());
        block.extend_from_slice(&0b11100100u32.to_le_bytes());

        let frame = decode_surface(ImageFormat::Bc1Unorm, 4, 4, &block).unwrap();
        let texels = texels(&frame);
        assert_eq!([0, 0, 255, 255], texels[0]);
        assert_eq!([255, 0, 0, 255], texels[1]);
        assert_eq!([127, 0, 127, 255], texels[2]);
        assert_eq!([0, 0, 0, 0], texels[3]);
    }

    #[test]
    fn decode_surface_bc2_explicit_alpha() {
        let mut block = vec![0x50, 0xFF];
        block.resize(8, 0u8);
        // White in both color endpoints.
        block.extend_from_slice(&0xFFFFu16.to_le_bytes());
        block.extend_from_slice(&0xFFFFu16.to_le_bytes());
        block.extend_from_slice(&0u32.to_le_bytes());

        let frame = decode_surface(ImageFormat::Bc2Unorm, 4, 4, &block).unwrap();
        let texels = texels(&frame);
        assert_eq!([255, 255, 255, 0x00], texels[0]);
        assert_eq!([255, 255, 255, 0x55], texels[1]);
        assert_eq!([255, 255, 255, 0xFF], texels[2]);
        assert_eq!([255, 255, 255, 0xFF], texels[3]);
    }

    #[test]
    fn decode_surface_bc3_interpolated_alpha() {
        let mut block = vec![255, 0];
        // Alpha indices 0, 1, 2, 3 for the first row.
        let alpha_indices = 0u64 | 1 << 3 | 2 << 6 | 3 << 9;
        block.extend_from_slice(&alpha_indices.to_le_bytes()[0..6]);
        block.extend_from_slice(&0xFFFFu16.to_le_bytes());
        block.extend_from_slice(&0xFFFFu16.to_le_bytes());
        block.extend_from_slice(&0u32.to_le_bytes());

        let frame = decode_surface(ImageFormat::Bc3Unorm, 4, 4, &block).unwrap();
        let texels = texels(&frame);
        assert_eq!(255, texels[0][3]);
        assert_eq!(0, texels[1][3]);
        assert_eq!(((6u16 * 255) / 7) as u8, texels[2][3]);
        assert_eq!(((5u16 * 255) / 7) as u8, texels[3][3]);
    }

    #[test]
    fn decode_surface_bc1_partial_edge_blocks() {
        // 5x3 texels still require 2x1 blocks.
        // Solid red blocks should fill the frame with no out of bounds texels.
        let mut block = Vec::new();
        block.extend_from_slice(&0xF800u16.to_le_bytes());
        block.extend_from_slice(&0xF800u16.to_le_bytes());
        block.extend_from_slice(&0u32.to_le_bytes());

        let data: Vec<_> = block.iter().chain(&block).copied().collect();
        let frame = decode_surface(ImageFormat::Bc1Unorm, 5, 3, &data).unwrap();

        assert_eq!(5 * 3 * 4, frame.pixels.len());
        assert_eq!(vec![[255, 0, 0, 255]; 15], texels(&frame));
    }

    #[test]
    fn decode_surface_wrong_data_size() {
        assert!(matches!(
            decode_surface(ImageFormat::Rgba8Unorm, 4, 4, &[0u8; 3]),
            Err(DecodeError::UnexpectedSurfaceSize {
                expected: 64,
                actual: 3
            })
        ));
    }

    #[test]
    fn decode_surface_zero_dimensions() {
        assert!(matches!(
            decode_surface(ImageFormat::Rgba8Unorm, 0, 4, &[]),
            Err(DecodeError::InvalidDimensions {
                width: 0,
                height: 4
            })
        ));
    }

    fn texels(frame: &RasterFrame) -> Vec<[u8; 4]> {
        frame
            .pixels
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect()
    }
}
