//! Textures in `.txtr` files or embedded in [Nxgt](crate::nxgt::Nxgt) archives.
//!
//! # Overview
//! A [Txtr] consists of a fixed size header describing the surface dimensions
//! and format followed by an image data section containing all mipmaps.
//! The image data is ordered largest mip first like
//! "Mip 0, Mip 1, ... Mip M-1" for M mipmaps.
//! This is the same ordering expected by DDS and modern graphics APIs.
//!
//! The header is fully validated before any mip level is decoded.
//! A corrupt header never produces a partial list of frames.
use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use log::trace;
use thiserror::Error;

use crate::{
    error::DecodeError,
    surface::{decode_surface, RasterFrame},
};

const HEADER_SIZE: usize = 20;
const MAGIC: [u8; 4] = *b"TXTR";

/// A multi mipmap image texture surface.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Txtr {
    /// The width of the base mip level in pixels.
    pub width: u32,
    /// The height of the base mip level in pixels.
    pub height: u32,
    /// The number of mip levels or 1 if there are no mipmaps.
    pub mipmap_count: u32,
    pub image_format: ImageFormat,
    /// The combined image data for all mip levels with the largest mip first.
    pub image_data: Vec<u8>,
}

/// Image format tags using the matching DXGI_FORMAT enumerants.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u32))]
pub enum ImageFormat {
    Rgba8Unorm = 28,
    Bc1Unorm = 71,
    Bc2Unorm = 74,
    Bc3Unorm = 77,
    Bgra8Unorm = 87,
}

impl ImageFormat {
    /// The width and height in pixels for a compression block.
    pub fn block_dim(&self) -> u32 {
        match self {
            ImageFormat::Rgba8Unorm => 1,
            ImageFormat::Bgra8Unorm => 1,
            ImageFormat::Bc1Unorm => 4,
            ImageFormat::Bc2Unorm => 4,
            ImageFormat::Bc3Unorm => 4,
        }
    }

    pub fn bytes_per_block(&self) -> u64 {
        match self {
            ImageFormat::Rgba8Unorm => 4,
            ImageFormat::Bgra8Unorm => 4,
            ImageFormat::Bc1Unorm => 8,
            ImageFormat::Bc2Unorm => 16,
            ImageFormat::Bc3Unorm => 16,
        }
    }

    /// The size in bytes of one mip level with the given dimensions.
    pub fn surface_size_in_bytes(&self, width: u32, height: u32) -> u64 {
        // Saturate so hostile dimensions fail the buffer length checks
        // instead of overflowing.
        let dim = self.block_dim() as u128;
        let blocks_x = (width as u128).div_ceil(dim);
        let blocks_y = (height as u128).div_ceil(dim);
        let size = blocks_x * blocks_y * self.bytes_per_block() as u128;
        size.min(u64::MAX as u128) as u64
    }
}

impl TryFrom<u32> for ImageFormat {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            28 => Ok(ImageFormat::Rgba8Unorm),
            71 => Ok(ImageFormat::Bc1Unorm),
            74 => Ok(ImageFormat::Bc2Unorm),
            77 => Ok(ImageFormat::Bc3Unorm),
            87 => Ok(ImageFormat::Bgra8Unorm),
            _ => Err(DecodeError::UnsupportedImageFormat(value)),
        }
    }
}

/// The dimension in pixels of a mip level with the usual halving rule.
pub fn mip_dimension(base_dimension: u32, mipmap: u32) -> u32 {
    (base_dimension >> mipmap).max(1)
}

#[derive(BinRead, BinWrite, Debug)]
struct TxtrHeader {
    magic: [u8; 4],
    width: u32,
    height: u32,
    mipmap_count: u32,
    image_format: u32,
}

impl Txtr {
    /// Parse and validate a texture from `bytes`.
    ///
    /// Bytes past the final mip level are ignored.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, DecodeError> {
        let bytes = bytes.as_ref();
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::HeaderTooShort {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let header = TxtrHeader::read_le(&mut Cursor::new(&bytes[..HEADER_SIZE]))?;
        if header.magic != MAGIC {
            return Err(DecodeError::InvalidMagic {
                expected: MAGIC,
                actual: header.magic,
            });
        }
        if header.width == 0 || header.height == 0 {
            return Err(DecodeError::InvalidDimensions {
                width: header.width,
                height: header.height,
            });
        }
        if header.mipmap_count == 0 {
            return Err(DecodeError::ZeroMipmaps);
        }
        let image_format = ImageFormat::try_from(header.image_format)?;

        // Check that every declared mip level fits before slicing any of them.
        let available = (bytes.len() - HEADER_SIZE) as u64;
        let mut required = 0u64;
        for mipmap in 0..header.mipmap_count {
            let width = mip_dimension(header.width, mipmap);
            let height = mip_dimension(header.height, mipmap);
            required = required.saturating_add(image_format.surface_size_in_bytes(width, height));
            if required > available {
                return Err(DecodeError::TruncatedMipmap {
                    mipmap,
                    required,
                    available,
                });
            }
        }

        trace!(
            "{}x{} {:?} with {} mipmaps",
            header.width,
            header.height,
            image_format,
            header.mipmap_count
        );

        Ok(Txtr {
            width: header.width,
            height: header.height,
            mipmap_count: header.mipmap_count,
            image_format,
            image_data: bytes[HEADER_SIZE..HEADER_SIZE + required as usize].to_vec(),
        })
    }

    /// Decode all mip levels to RGBA frames ordered largest mip first.
    pub fn mipmaps(&self) -> Result<Vec<RasterFrame>, DecodeError> {
        (0..self.mipmap_count).map(|m| self.mipmap(m)).collect()
    }

    /// Decode the mip level `mipmap` to an RGBA frame.
    pub fn mipmap(&self, mipmap: u32) -> Result<RasterFrame, DecodeError> {
        if mipmap >= self.mipmap_count {
            return Err(DecodeError::IndexOutOfRange {
                index: mipmap as usize,
                count: self.mipmap_count as usize,
            });
        }

        let mut offset = 0u64;
        for level in 0..mipmap {
            offset = offset.saturating_add(self.image_format.surface_size_in_bytes(
                mip_dimension(self.width, level),
                mip_dimension(self.height, level),
            ));
        }

        let width = mip_dimension(self.width, mipmap);
        let height = mip_dimension(self.height, mipmap);
        let size = self.image_format.surface_size_in_bytes(width, height);

        // Revalidate in case the fields were modified after parsing.
        let available = self.image_data.len() as u64;
        if offset.saturating_add(size) > available {
            return Err(DecodeError::TruncatedMipmap {
                mipmap,
                required: offset + size,
                available,
            });
        }

        decode_surface(
            self.image_format,
            width,
            height,
            &self.image_data[offset as usize..(offset + size) as usize],
        )
    }

    /// Create an uncompressed single mip texture from `frame`.
    pub fn from_frame(frame: &RasterFrame) -> Result<Self, CreateTxtrError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(CreateTxtrError::InvalidDimensions {
                width: frame.width,
                height: frame.height,
            });
        }
        let expected = (frame.width as u64 * frame.height as u64).saturating_mul(4);
        if frame.pixels.len() as u64 != expected {
            return Err(CreateTxtrError::UnexpectedPixelCount {
                expected,
                actual: frame.pixels.len(),
            });
        }

        Ok(Txtr {
            width: frame.width,
            height: frame.height,
            mipmap_count: 1,
            image_format: ImageFormat::Rgba8Unorm,
            image_data: frame.pixels.clone(),
        })
    }
}

impl BinWrite for Txtr {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        TxtrHeader {
            magic: MAGIC,
            width: self.width,
            height: self.height,
            mipmap_count: self.mipmap_count,
            image_format: self.image_format as u32,
        }
        .write_options(writer, endian, ())?;
        writer.write_all(&self.image_data)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CreateTxtrError {
    #[error("frame dimensions {width}x{height} must both be nonzero")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("frame of {actual} bytes does not contain {expected} bytes of RGBA data")]
    UnexpectedPixelCount { expected: u64, actual: usize },
}
