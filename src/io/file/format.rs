//! Container file layout.
//!
//! ```text
//! header   [magic "SOBIO"][frozen u8][version u16][root position u64]
//! data     [size u64][bytes]
//! group    [count u64][child offset u64]*
//! ```
//!
//! A child offset with the MSB set points at a data block, otherwise at a
//! group. Every directory is a group whose child 0 is its index block,
//! followed by one child per entry in index order.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::io::data_type::DataType;
use crate::io::traits::EntryType;
use crate::util::{Error, InternedString, Result};

/// Magic bytes at the start of a container file.
pub const MAGIC: &[u8; 5] = b"SOBIO";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Offset of the frozen flag in the header.
pub const FROZEN_OFFSET: usize = 5;

/// Offset of the version in the header.
pub const VERSION_OFFSET: usize = 6;

/// Offset of the root group position in the header.
pub const ROOT_POS_OFFSET: usize = 8;

/// Current format version.
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag value once the file has been closed cleanly.
pub const FROZEN_FLAG: u8 = 0xFF;

/// Frozen flag value while the file is still being written.
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// MSB set marks a data child.
pub const DATA_FLAG: u64 = 1 << 63;

/// Mask to extract the position from a child offset.
pub const OFFSET_MASK: u64 = !DATA_FLAG;

#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    offset & DATA_FLAG != 0
}

#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | DATA_FLAG
}

/// Build the 16-byte header.
pub fn header(frozen: bool, root_pos: u64) -> [u8; HEADER_SIZE] {
    let mut h = [0u8; HEADER_SIZE];
    h[..5].copy_from_slice(MAGIC);
    h[FROZEN_OFFSET] = if frozen { FROZEN_FLAG } else { NOT_FROZEN_FLAG };
    h[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&CURRENT_VERSION.to_le_bytes());
    h[ROOT_POS_OFFSET..].copy_from_slice(&root_pos.to_le_bytes());
    h
}

const FLAG_COMPRESSED: u8 = 1;
const FLAG_ARRAY: u8 = 2;

/// One row of a directory index block.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub name: InternedString,
    pub entry_type: EntryType,
    pub data_type: Option<DataType>,
    pub array_length: Option<usize>,
    pub compressed: bool,
}

/// Encode a directory index.
pub fn encode_index(entries: &[IndexEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    // Writes into a Vec cannot fail.
    let _ = write_index(&mut out, entries);
    out
}

fn write_index(out: &mut Vec<u8>, entries: &[IndexEntry]) -> std::io::Result<()> {
    out.write_u32::<LittleEndian>(entries.len() as u32)?;
    for e in entries {
        out.write_u32::<LittleEndian>(e.name.len() as u32)?;
        out.extend_from_slice(e.name.as_bytes());
        match e.entry_type {
            EntryType::Directory => {
                out.write_u8(0)?;
                out.write_u8(0)?;
                out.write_u8(0)?;
                out.write_u64::<LittleEndian>(0)?;
            }
            EntryType::File => {
                let mut flags = 0u8;
                if e.compressed {
                    flags |= FLAG_COMPRESSED;
                }
                if e.array_length.is_some() {
                    flags |= FLAG_ARRAY;
                }
                out.write_u8(1)?;
                out.write_u8(e.data_type.map(|d| d.code()).unwrap_or(0))?;
                out.write_u8(flags)?;
                out.write_u64::<LittleEndian>(e.array_length.unwrap_or(0) as u64)?;
            }
        }
    }
    Ok(())
}

/// Decode a directory index.
pub fn decode_index(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    let mut r = Cursor::new(bytes);
    let count = r.read_u32::<LittleEndian>()? as usize;
    let mut entries = Vec::with_capacity(count.min(bytes.len()));
    for _ in 0..count {
        let len = r.read_u32::<LittleEndian>()? as usize;
        if len > bytes.len() {
            return Err(Error::invalid(format!("index name length {} exceeds block", len)));
        }
        let mut name = vec![0u8; len];
        r.read_exact(&mut name)?;
        let name = InternedString::new(&String::from_utf8(name)?);
        let kind = r.read_u8()?;
        let code = r.read_u8()?;
        let flags = r.read_u8()?;
        let array_length = r.read_u64::<LittleEndian>()? as usize;
        let entry = match kind {
            0 => IndexEntry {
                name,
                entry_type: EntryType::Directory,
                data_type: None,
                array_length: None,
                compressed: false,
            },
            1 => IndexEntry {
                name,
                entry_type: EntryType::File,
                data_type: Some(DataType::from_code(code)?),
                array_length: (flags & FLAG_ARRAY != 0).then_some(array_length),
                compressed: flags & FLAG_COMPRESSED != 0,
            },
            other => return Err(Error::invalid(format!("unknown entry kind {}", other))),
        };
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ValueKind;

    #[test]
    fn test_offsets() {
        let group = make_group_offset(0x1234);
        assert!(!is_data_offset(group));
        assert_eq!(extract_offset(group), 0x1234);

        let data = make_data_offset(0x5678);
        assert!(is_data_offset(data));
        assert_eq!(extract_offset(data), 0x5678);
        assert_eq!(data, 0x8000_0000_0000_5678);
    }

    #[test]
    fn test_header_layout() {
        let h = header(true, 0x10);
        assert_eq!(&h[..5], MAGIC);
        assert_eq!(h[FROZEN_OFFSET], FROZEN_FLAG);
        assert_eq!(u16::from_le_bytes([h[6], h[7]]), CURRENT_VERSION);
        assert_eq!(h[8], 0x10);
    }

    #[test]
    fn test_index_round_trip() {
        let entries = vec![
            IndexEntry {
                name: "children".into(),
                entry_type: EntryType::Directory,
                data_type: None,
                array_length: None,
                compressed: false,
            },
            IndexEntry {
                name: "P".into(),
                entry_type: EntryType::File,
                data_type: Some(DataType::array(ValueKind::Float)),
                array_length: Some(12),
                compressed: true,
            },
            IndexEntry {
                name: "ioVersion".into(),
                entry_type: EntryType::File,
                data_type: Some(DataType::scalar(ValueKind::UInt)),
                array_length: None,
                compressed: false,
            },
        ];
        assert_eq!(decode_index(&encode_index(&entries)).unwrap(), entries);
    }

    #[test]
    fn test_truncated_index() {
        let bytes = encode_index(&[IndexEntry {
            name: "x".into(),
            entry_type: EntryType::Directory,
            data_type: None,
            array_length: None,
            compressed: false,
        }]);
        assert!(decode_index(&bytes[..bytes.len() - 1]).is_err());
    }
}
