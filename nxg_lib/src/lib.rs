//! A library for reading and decoding TT Games texture file formats.
//!
//! [Txtr](crate::txtr::Txtr) image textures and
//! [Nxgt](crate::nxgt::Nxgt) texture archives are supported.
//!
//! # Getting Started
//! Each format has its own module based on the name of the type representing
//! the root of the file. Only these top level types support reading and
//! writing from files.
//!
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Read from disk.
//! let nxgt = nxg_lib::nxgt::Nxgt::from_file("levels_textures.nxg_textures")?;
//!
//! // Decode all entries to RGBA frames.
//! for (entry, texture) in nxgt.entries().iter().zip(nxgt.decode_textures()) {
//!     let txtr = texture?;
//!     let base_mip = txtr.mipmap(0)?;
//!     println!("{:?}: {}x{}", entry.name, base_mip.width, base_mip.height);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! Each file is parsed from an in memory buffer in a single pass with all
//! header and directory validation happening before any image data is touched.
//! Invalid input is rejected with a typed [DecodeError](crate::error::DecodeError)
//! rather than sanitized, and a failed parse never returns partial data.
//!
//! Parsing and decoding are pure functions of their input buffers.
//! Separate buffers can be processed from separate threads without any
//! synchronization, and decoded frames and extracted entries own their data
//! independently of the source buffer.
use std::{
    io::{BufWriter, Read, Seek, Write},
    path::Path,
};

use binrw::BinWrite;

use crate::error::DecodeError;

pub mod error;
pub mod nxgt;
pub mod standalone;
pub mod surface;
pub mod txtr;

macro_rules! file_read_impl {
    ($($type_name:path),*) => {
        $(
            impl $type_name {
                /// Read from `reader`, consuming it to the end.
                pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, DecodeError> {
                    let mut bytes = Vec::new();
                    reader.read_to_end(&mut bytes)?;
                    Self::from_bytes(bytes)
                }

                /// Read from `path` by loading the entire file into memory.
                pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
                    let bytes = std::fs::read(path)?;
                    Self::from_bytes(bytes)
                }
            }
        )*
    };
}

file_read_impl!(txtr::Txtr, nxgt::Nxgt);

macro_rules! file_write_impl {
    ($($type_name:path),*) => {
        $(
            impl $type_name {
                pub fn write<W: Write + Seek>(&self, writer: &mut W) -> binrw::BinResult<()> {
                    self.write_le(writer)
                }

                /// Write to `path` using a buffered writer for better performance.
                pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> binrw::BinResult<()> {
                    let mut writer = BufWriter::new(std::fs::File::create(path)?);
                    self.write_le(&mut writer)
                }
            }
        )*
    };
}

file_write_impl!(txtr::Txtr, nxgt::Nxgt);
