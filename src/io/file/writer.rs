//! Append-only output stream for container files.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::format::*;
use crate::util::Result;

/// Buffered writer that tracks its own position.
#[derive(Debug)]
pub struct OStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl OStream {
    /// Create (truncating) the file and write a provisional header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut stream = Self {
            writer: BufWriter::with_capacity(1024 * 1024, file),
            pos: 0,
        };
        stream.write_bytes(&header(false, 0))?;
        Ok(stream)
    }

    /// Get the current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Write bytes and advance position.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    /// Write a data block and return its position.
    pub fn write_data(&mut self, payload: &[u8]) -> Result<u64> {
        let pos = self.pos;
        self.write_u64(payload.len() as u64)?;
        self.write_bytes(payload)?;
        Ok(pos)
    }

    /// Write a group of child offsets and return its position.
    pub fn write_group(&mut self, children: &[u64]) -> Result<u64> {
        let pos = self.pos;
        self.write_u64(children.len() as u64)?;
        for &child in children {
            self.write_u64(child)?;
        }
        Ok(pos)
    }

    /// Point the header at `root_pos`, mark the file frozen and flush.
    pub fn finish(mut self, root_pos: u64) -> Result<()> {
        self.writer.flush()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&header(true, root_pos))?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file::reader::IStreams;

    #[test]
    fn test_blocks_round_trip() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let mut out = OStream::create(file.path()).unwrap();
        assert_eq!(out.pos(), HEADER_SIZE as u64);

        let data = out.write_data(b"payload").unwrap();
        let group = out.write_group(&[make_data_offset(data)]).unwrap();
        out.finish(group).unwrap();

        let s = IStreams::open(file.path(), false).unwrap();
        assert!(s.is_frozen());
        let children = s.read_group(s.root_pos().unwrap()).unwrap();
        assert_eq!(s.read_data(extract_offset(children[0])).unwrap(), b"payload");
    }

    #[test]
    fn test_unfinished_file_is_not_frozen() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        {
            let mut out = OStream::create(file.path()).unwrap();
            out.write_data(b"x").unwrap();
            out.writer.flush().unwrap();
        }
        let s = IStreams::open(file.path(), true).unwrap();
        assert!(!s.is_frozen());
    }
}
