//! Texture archives in `.nxg_textures` files.
//!
//! # Overview
//! An [Nxgt] archive bundles many [Txtr](crate::txtr::Txtr) blobs into a
//! single buffer. A directory at the start of the file lists an optional name
//! and an absolute byte range for each entry. The directory is followed by a
//! data section holding the raw blobs.
//!
//! The parsed archive keeps the entire backing buffer and indexes it without
//! copying. [Nxgt::extract] copies the referenced range, so extracted blobs
//! remain valid after dropping the archive.
use std::io::{Cursor, Read};

use binrw::{BinRead, BinReaderExt, BinWrite};
use indexmap::IndexMap;
use log::trace;
use rayon::prelude::*;
use thiserror::Error;

use crate::{error::DecodeError, txtr::Txtr};

const HEADER_SIZE: usize = 8;
const MAGIC: [u8; 4] = *b"NXGT";

/// An archive of textures addressable by index or name.
#[derive(Debug, PartialEq, Clone)]
pub struct Nxgt {
    entries: Vec<Entry>,
    data: Vec<u8>,
}

/// A directory entry referencing a byte range in the archive.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Entry {
    /// The entry name or [None] if the entry is only addressable by index.
    pub name: Option<String>,
    /// The absolute byte offset of the entry data in the archive.
    pub offset: u32,
    /// The size of the entry data in bytes.
    pub size: u32,
}

#[derive(BinRead, BinWrite, Debug)]
struct NxgtHeader {
    magic: [u8; 4],
    entry_count: u32,
}

impl Nxgt {
    /// Parse and validate the archive directory in `bytes`.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, DecodeError> {
        let bytes = bytes.as_ref();
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::HeaderTooShort {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut reader = Cursor::new(bytes);
        let header = NxgtHeader::read_le(&mut reader)?;
        if header.magic != MAGIC {
            return Err(DecodeError::InvalidMagic {
                expected: MAGIC,
                actual: header.magic,
            });
        }

        let mut entries = Vec::new();
        for index in 0..header.entry_count as usize {
            entries.push(read_entry(&mut reader, bytes.len()).map_err(|error| {
                directory_error(error, index, header.entry_count)
            })?);
        }

        validate_ranges(&entries, bytes.len())?;

        trace!("parsed {} entries", entries.len());

        Ok(Nxgt {
            entries,
            data: bytes.to_vec(),
        })
    }

    /// The directory entries in their original archive order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The raw backing buffer for the entire archive.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn entry(&self, index: usize) -> Result<&Entry, DecodeError> {
        self.entries.get(index).ok_or(DecodeError::IndexOutOfRange {
            index,
            count: self.entries.len(),
        })
    }

    /// Find the first entry named `name` in archive order.
    pub fn entry_by_name(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
    }

    /// Build a name to entry index map for repeated lookups.
    ///
    /// The first occurrence wins if multiple entries share a name.
    pub fn name_index(&self) -> IndexMap<&str, usize> {
        let mut names = IndexMap::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(name) = &entry.name {
                names.entry(name.as_str()).or_insert(index);
            }
        }
        names
    }

    /// Copy the bytes for the entry at `index` out of the archive.
    pub fn extract(&self, index: usize) -> Result<Vec<u8>, DecodeError> {
        let entry = self.entry(index)?;
        let start = entry.offset as usize;
        Ok(self.data[start..start + entry.size as usize].to_vec())
    }

    /// Copy the bytes for the first entry named `name` out of the archive.
    pub fn extract_by_name(&self, name: &str) -> Option<Vec<u8>> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name.as_deref() == Some(name))?;
        self.extract(index).ok()
    }

    /// Decode every entry as [Txtr] in archive order.
    ///
    /// A corrupt entry produces an error at its position
    /// without affecting any other entries.
    pub fn decode_textures(&self) -> Vec<Result<Txtr, DecodeError>> {
        self.entries
            .par_iter()
            .map(|entry| {
                let start = entry.offset as usize;
                Txtr::from_bytes(&self.data[start..start + entry.size as usize])
            })
            .collect()
    }

    /// Create an archive from blobs laid out in the given order.
    pub fn from_entries<S, T>(items: &[(Option<S>, T)]) -> Result<Self, CreateNxgtError>
    where
        S: AsRef<str>,
        T: AsRef<[u8]>,
    {
        // The data section starts immediately after the directory.
        let mut offset = HEADER_SIZE as u64;
        for (name, _) in items {
            offset += 12 + name.as_ref().map(|n| n.as_ref().len()).unwrap_or_default() as u64;
        }

        let mut entries = Vec::with_capacity(items.len());
        for (name, blob) in items {
            let size = blob.as_ref().len() as u64;
            if offset + size > u32::MAX as u64 {
                return Err(CreateNxgtError::ArchiveTooLarge(offset + size));
            }
            entries.push(Entry {
                name: name.as_ref().map(|n| n.as_ref().to_string()),
                offset: offset as u32,
                size: size as u32,
            });
            offset += size;
        }

        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&(items.len() as u32).to_le_bytes());
        for entry in &entries {
            let name = entry.name.as_deref().unwrap_or_default();
            data.extend_from_slice(&(name.len() as u32).to_le_bytes());
            data.extend_from_slice(name.as_bytes());
            data.extend_from_slice(&entry.offset.to_le_bytes());
            data.extend_from_slice(&entry.size.to_le_bytes());
        }
        for (_, blob) in items {
            data.extend_from_slice(blob.as_ref());
        }

        Ok(Nxgt { entries, data })
    }
}

fn read_entry(reader: &mut Cursor<&[u8]>, archive_size: usize) -> Result<Entry, DecodeError> {
    let name_length: u32 = reader.read_le()?;
    if name_length as usize > archive_size {
        // Avoid allocating for name lengths the buffer can never satisfy.
        return Err(DecodeError::Io(std::io::Error::from(
            std::io::ErrorKind::UnexpectedEof,
        )));
    }

    let mut name_bytes = vec![0u8; name_length as usize];
    reader.read_exact(&mut name_bytes)?;
    let name = if name_bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8(name_bytes).map_err(|_| DecodeError::InvalidEntryName { index: 0 })?)
    };

    Ok(Entry {
        name,
        offset: reader.read_le()?,
        size: reader.read_le()?,
    })
}

/// Attribute a failure while reading the directory to the entry it occurred in.
fn directory_error(error: DecodeError, index: usize, declared: u32) -> DecodeError {
    match error {
        DecodeError::InvalidEntryName { .. } => DecodeError::InvalidEntryName { index },
        DecodeError::Io(_) | DecodeError::Binrw(_) => DecodeError::TruncatedDirectory {
            declared,
            parsed: index,
        },
        other => other,
    }
}

fn validate_ranges(entries: &[Entry], archive_size: usize) -> Result<(), DecodeError> {
    for (index, entry) in entries.iter().enumerate() {
        let start = entry.offset as u64;
        let end = start + entry.size as u64;
        if end > archive_size as u64 {
            return Err(DecodeError::EntryOutOfBounds {
                index,
                start,
                end,
                archive_size,
            });
        }
    }

    // Sorting by start offset reduces the overlap check to neighbors.
    let mut ranges: Vec<_> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.size > 0)
        .map(|(i, e)| (e.offset, e.offset as u64 + e.size as u64, i))
        .collect();
    ranges.sort();

    for pair in ranges.windows(2) {
        let (_, end, first) = pair[0];
        let (next_start, _, second) = pair[1];
        if (next_start as u64) < end {
            return Err(DecodeError::OverlappingEntries {
                first: first.min(second),
                second: first.max(second),
            });
        }
    }

    Ok(())
}

impl BinWrite for Nxgt {
    type Args<'a> = ();

    // The directory and data sections are preserved as parsed,
    // so writing just copies the backing buffer.
    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CreateNxgtError {
    #[error("archive data of {0} bytes exceeds the maximum addressable size")]
    ArchiveTooLarge(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;

    fn archive_bytes(entries: &[(&str, u32, u32)], data: &[u8]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for (name, offset, size) in entries {
            bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
            bytes.extend_from_slice(name.as_bytes());
            bytes.extend_from_slice(&offset.to_le_bytes());
            bytes.extend_from_slice(&size.to_le_bytes());
        }
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn read_entries_in_archive_order() {
        let nxgt = Nxgt::from_entries(&[
            (Some("b/second.txtr"), vec![4u8, 5, 6]),
            (Some("a/first.txtr"), vec![7u8]),
            (None, vec![8u8, 9]),
        ])
        .unwrap();

        let names: Vec<_> = nxgt.entries().iter().map(|e| e.name.clone()).collect();
        assert_eq!(
            vec![
                Some("b/second.txtr".to_string()),
                Some("a/first.txtr".to_string()),
                None
            ],
            names
        );
        assert_eq!(vec![4, 5, 6], nxgt.extract(0).unwrap());
        assert_eq!(vec![7], nxgt.extract(1).unwrap());
        assert_eq!(vec![8, 9], nxgt.extract(2).unwrap());
    }

    #[test]
    fn read_from_reader() {
        let bytes = archive_bytes(&[("a", 21, 2)], &[0u8; 5]);
        let nxgt = Nxgt::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(Nxgt::from_bytes(bytes).unwrap(), nxgt);
    }

    #[test]
    fn write_read_round_trip() {
        let nxgt = Nxgt::from_entries(&[
            (Some("one"), vec![1u8, 2, 3]),
            (None::<&str>, vec![4u8, 5]),
        ])
        .unwrap();

        let mut writer = Cursor::new(Vec::new());
        nxgt.write_le(&mut writer).unwrap();

        assert_eq!(nxgt, Nxgt::from_bytes(writer.into_inner()).unwrap());
    }

    #[test]
    fn extract_outlives_the_archive() {
        let nxgt = Nxgt::from_entries(&[(Some("a"), vec![1u8, 2, 3])]).unwrap();
        let blob = nxgt.extract(0).unwrap();
        drop(nxgt);
        assert_eq!(vec![1, 2, 3], blob);
    }

    #[test]
    fn extract_index_out_of_range() {
        let nxgt = Nxgt::from_entries(&[(Some("a"), vec![1u8])]).unwrap();
        assert!(matches!(
            nxgt.extract(1),
            Err(DecodeError::IndexOutOfRange { index: 1, count: 1 })
        ));
    }

    #[test]
    fn name_lookups_use_the_first_occurrence() {
        // Duplicate names resolve to the first entry in archive order.
        let bytes = archive_bytes(&[("dup", 30, 1), ("dup", 31, 2)], &[0u8; 10]);
        let nxgt = Nxgt::from_bytes(bytes).unwrap();

        assert_eq!(30, nxgt.entry_by_name("dup").unwrap().offset);
        assert_eq!(Some(&0), nxgt.name_index().get("dup"));
        assert_eq!(1, nxgt.extract_by_name("dup").unwrap().len());
    }

    #[test]
    fn read_rejects_overlapping_entries() {
        let bytes = archive_bytes(&[("a", 30, 4), ("b", 33, 4)], &[0u8; 29]);
        assert!(matches!(
            Nxgt::from_bytes(bytes),
            Err(DecodeError::OverlappingEntries {
                first: 0,
                second: 1
            })
        ));
    }

    #[test]
    fn read_rejects_out_of_bounds_entries() {
        let bytes = archive_bytes(&[("a", 30, 100)], &[0u8; 10]);
        assert!(matches!(
            Nxgt::from_bytes(bytes),
            Err(DecodeError::EntryOutOfBounds {
                index: 0,
                start: 30,
                end: 130,
                ..
            })
        ));
    }

    #[test]
    fn read_rejects_truncated_directory() {
        // The directory declares more entries than the buffer contains.
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&archive_bytes(&[("only", 21, 0)], &[])[8..]);

        assert!(matches!(
            Nxgt::from_bytes(bytes),
            Err(DecodeError::TruncatedDirectory {
                declared: 5,
                parsed: 1
            })
        ));
    }

    #[test]
    fn read_rejects_invalid_magic() {
        assert!(matches!(
            Nxgt::from_bytes(hex!(31524153 00000000)),
            Err(DecodeError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn read_rejects_short_header() {
        assert!(matches!(
            Nxgt::from_bytes(hex!(4e584754)),
            Err(DecodeError::HeaderTooShort {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn single_entry_matches_standalone_texture() {
        let mut txtr_bytes = b"TXTR".to_vec();
        txtr_bytes.extend_from_slice(&1u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&1u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&1u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&28u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&[1, 2, 3, 4]);

        let nxgt = Nxgt::from_entries(&[(Some("only.txtr"), &txtr_bytes)]).unwrap();

        assert_eq!(txtr_bytes, nxgt.extract(0).unwrap());
        assert_eq!(
            Txtr::from_bytes(&txtr_bytes).unwrap(),
            Txtr::from_bytes(nxgt.extract(0).unwrap()).unwrap()
        );
    }

    #[test]
    fn decode_textures_isolates_corrupt_entries() {
        let mut txtr_bytes = b"TXTR".to_vec();
        txtr_bytes.extend_from_slice(&1u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&1u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&1u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&28u32.to_le_bytes());
        txtr_bytes.extend_from_slice(&[1, 2, 3, 4]);

        let nxgt = Nxgt::from_entries(&[
            (Some("good.txtr"), txtr_bytes.clone()),
            (Some("bad.txtr"), b"not a texture at all....".to_vec()),
            (Some("also_good.txtr"), txtr_bytes),
        ])
        .unwrap();

        let decoded = nxgt.decode_textures();
        assert_eq!(3, decoded.len());
        assert!(decoded[0].is_ok());
        assert!(matches!(decoded[1], Err(DecodeError::InvalidMagic { .. })));
        assert!(decoded[2].is_ok());
    }

    #[test]
    fn read_rejects_invalid_entry_name() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(&18u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        assert!(matches!(
            Nxgt::from_bytes(bytes),
            Err(DecodeError::InvalidEntryName { index: 0 })
        ));
    }
}
