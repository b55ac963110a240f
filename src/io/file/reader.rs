//! Read access to a container file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;
use parking_lot::Mutex;

use super::format::*;
use crate::util::{Error, Result};

/// Random-access view of a container file.
/// Uses a memory map when possible, a locked file handle otherwise.
pub struct IStreams {
    inner: StreamsInner,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    Mmap(Mmap),
    File(Mutex<File>),
}

impl std::fmt::Debug for IStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IStreams")
            .field("mmap", &matches!(self.inner, StreamsInner::Mmap(_)))
            .field("version", &self.version)
            .field("frozen", &self.frozen)
            .field("size", &self.size)
            .finish()
    }
}

impl IStreams {
    /// Open a file with optional memory mapping.
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let inner = if use_mmap {
            // Safety: the file is opened read-only and not modified while mapped.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            StreamsInner::Mmap(mmap)
        } else {
            StreamsInner::File(Mutex::new(file))
        };

        let mut streams = Self { inner, version: 0, frozen: false, size };
        let mut header = [0u8; HEADER_SIZE];
        streams.read_into(0, &mut header)?;
        let (version, frozen) = Self::parse_header(&header)?;
        streams.version = version;
        streams.frozen = frozen;
        Ok(streams)
    }

    /// Validate the header and return (version, frozen).
    fn parse_header(data: &[u8; HEADER_SIZE]) -> Result<(u16, bool)> {
        if &data[0..5] != MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = u16::from_le_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
        if version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok((version, data[FROZEN_OFFSET] == FROZEN_FLAG))
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Root group position from the header.
    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    fn check_range(&self, pos: u64, len: u64) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::UnexpectedEof(pos.saturating_add(len))),
        }
    }

    /// Read bytes at a specific position.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(pos, buf.len() as u64)?;
        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                let start = pos as usize;
                buf.copy_from_slice(&mmap[start..start + buf.len()]);
                Ok(())
            }
            StreamsInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a data block: returns its payload.
    pub fn read_data(&self, pos: u64) -> Result<Vec<u8>> {
        let size = self.read_u64(pos)?;
        self.check_range(pos + 8, size)?;
        self.read_bytes(pos + 8, size as usize)
    }

    /// Read a group: returns its child offsets.
    pub fn read_group(&self, pos: u64) -> Result<Vec<u64>> {
        let count = self.read_u64(pos)?;
        let bytes = count
            .checked_mul(8)
            .ok_or_else(|| Error::invalid(format!("group at {} claims {} children", pos, count)))?;
        self.check_range(pos + 8, bytes)?;
        let mut children = Vec::with_capacity(count as usize);
        for i in 0..count {
            children.push(self.read_u64(pos + 8 + i * 8)?);
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rejects_bad_magic() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"Ogawa\xff\x01\x00\x10\0\0\0\0\0\0\0").unwrap();
        file.flush().unwrap();
        assert!(matches!(IStreams::open(file.path(), false), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_rejects_short_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"SOBIO").unwrap();
        file.flush().unwrap();
        assert!(matches!(IStreams::open(file.path(), true), Err(Error::UnexpectedEof(_))));
    }

    #[test]
    fn test_reads_header_and_blocks() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let mut bytes = header(true, 16).to_vec();
        // group at 16 with one data child at 32
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&make_data_offset(32).to_le_bytes());
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        for use_mmap in [true, false] {
            let s = IStreams::open(file.path(), use_mmap).unwrap();
            assert!(s.is_frozen());
            assert_eq!(s.version(), CURRENT_VERSION);
            let root = s.root_pos().unwrap();
            let children = s.read_group(root).unwrap();
            assert_eq!(children.len(), 1);
            assert_eq!(s.read_data(extract_offset(children[0])).unwrap(), b"abc");
            assert!(s.read_data(s.size()).is_err());
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = IStreams::open(dir.path().join("none.sob"), true).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
