//! Random-access, endian-aware byte reading over a file.
//!
//! Small files are memory-mapped; large files are read via buffered
//! seek-and-read. The choice is transparent to callers: both
//! realisations implement [`ByteReader`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use memmap2::Mmap;

use crate::error::{Error, Result};

/// Byte order for a typed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Positional, endian-explicit reads over a mesh file.
///
/// All typed reads advance the reader's position by the value's byte
/// width. `read_line` reads through the trailing LF and returns the
/// bytes before it, decoded as UTF-8.
pub trait ByteReader {
    fn seek_to(&mut self, absolute: u64) -> Result<()>;
    fn position(&self) -> u64;
    fn remaining(&self) -> u64;
    fn read_exact_bytes(&mut self, n: usize) -> Result<Vec<u8>>;

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact_bytes(1)?[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self, endian: Endian) -> Result<u16> {
        let b = self.read_exact_bytes(2)?;
        Ok(match endian {
            Endian::Little => u16::from_le_bytes([b[0], b[1]]),
            Endian::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn read_i16(&mut self, endian: Endian) -> Result<i16> {
        Ok(self.read_u16(endian)? as i16)
    }

    fn read_u32(&mut self, endian: Endian) -> Result<u32> {
        let b = self.read_exact_bytes(4)?;
        Ok(match endian {
            Endian::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            Endian::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    fn read_i32(&mut self, endian: Endian) -> Result<i32> {
        Ok(self.read_u32(endian)? as i32)
    }

    fn read_u64(&mut self, endian: Endian) -> Result<u64> {
        let b = self.read_exact_bytes(8)?;
        Ok(match endian {
            Endian::Little => u64::from_le_bytes(b.try_into().unwrap()),
            Endian::Big => u64::from_be_bytes(b.try_into().unwrap()),
        })
    }

    fn read_f32(&mut self, endian: Endian) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(endian)?))
    }

    fn read_f64(&mut self, endian: Endian) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64(endian)?))
    }

    /// Read bytes up to and including the next LF (0x0A), returning the
    /// text before it decoded as UTF-8. Returns `Ok(None)` at EOF with
    /// nothing read.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        loop {
            if self.remaining() == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                break;
            }
            let byte = self.read_u8()?;
            if byte == b'\n' {
                break;
            }
            buf.push(byte);
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(std::str::from_utf8(&buf)?.to_string()))
    }
}

/// Memory-mapped reader, used for files below the configured threshold.
pub struct MmapReader {
    map: Mmap,
    pos: usize,
}

impl MmapReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map, pos: 0 })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }
}

impl ByteReader for MmapReader {
    fn seek_to(&mut self, absolute: u64) -> Result<()> {
        if absolute > self.map.len() as u64 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "seek past end of mapped file",
            )));
        }
        self.pos = absolute as usize;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn remaining(&self) -> u64 {
        (self.map.len() - self.pos) as u64
    }

    fn read_exact_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.pos + n > self.map.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read past end of mapped file",
            )));
        }
        let out = self.map[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }
}

/// Buffered seek+read reader, used for files at or above the configured
/// mmap threshold.
pub struct StreamReader {
    file: File,
    len: u64,
    pos: u64,
}

impl StreamReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len, pos: 0 })
    }
}

impl ByteReader for StreamReader {
    fn seek_to(&mut self, absolute: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(absolute))?;
        self.pos = absolute;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    fn read_exact_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.file.read_exact(&mut buf)?;
        self.pos += n as u64;
        Ok(buf)
    }

    // Reading through a generic `Read` makes `byteorder::ReadBytesExt`
    // genuinely convenient here, unlike `MmapReader`'s direct slice
    // indexing; these overrides replace the trait's hand-rolled
    // `from_le_bytes`/`from_be_bytes` defaults for this realisation.
    fn read_u16(&mut self, endian: Endian) -> Result<u16> {
        let v = match endian {
            Endian::Little => self.file.read_u16::<LittleEndian>()?,
            Endian::Big => self.file.read_u16::<BigEndian>()?,
        };
        self.pos += 2;
        Ok(v)
    }

    fn read_u32(&mut self, endian: Endian) -> Result<u32> {
        let v = match endian {
            Endian::Little => self.file.read_u32::<LittleEndian>()?,
            Endian::Big => self.file.read_u32::<BigEndian>()?,
        };
        self.pos += 4;
        Ok(v)
    }

    fn read_u64(&mut self, endian: Endian) -> Result<u64> {
        let v = match endian {
            Endian::Little => self.file.read_u64::<LittleEndian>()?,
            Endian::Big => self.file.read_u64::<BigEndian>()?,
        };
        self.pos += 8;
        Ok(v)
    }

    fn read_f32(&mut self, endian: Endian) -> Result<f32> {
        let v = match endian {
            Endian::Little => self.file.read_f32::<LittleEndian>()?,
            Endian::Big => self.file.read_f32::<BigEndian>()?,
        };
        self.pos += 4;
        Ok(v)
    }

    fn read_f64(&mut self, endian: Endian) -> Result<f64> {
        let v = match endian {
            Endian::Little => self.file.read_f64::<LittleEndian>()?,
            Endian::Big => self.file.read_f64::<BigEndian>()?,
        };
        self.pos += 8;
        Ok(v)
    }
}

/// Opens `path` as either an [`MmapReader`] or a [`StreamReader`],
/// depending on file size relative to `mmap_threshold_bytes`.
pub fn open_reader(path: &Path, mmap_threshold_bytes: u64) -> Result<Box<dyn ByteReader + Send>> {
    let size = std::fs::metadata(path)?.len();
    if size < mmap_threshold_bytes {
        Ok(Box::new(MmapReader::open(path)?))
    } else {
        Ok(Box::new(StreamReader::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(bytes: &[u8]) -> tempfile_like::TempFile {
        tempfile_like::TempFile::new(bytes)
    }

    // Minimal self-contained temp-file helper so tests don't need an
    // extra dev-dependency just to exercise the two ByteReader impls.
    mod tempfile_like {
        use std::fs::File;
        use std::io::Write;
        use std::path::{Path, PathBuf};

        pub struct TempFile {
            path: PathBuf,
        }

        impl TempFile {
            pub fn new(bytes: &[u8]) -> Self {
                let path = std::env::temp_dir().join(format!(
                    "meshstream-test-{}-{}.bin",
                    std::process::id(),
                    bytes.len()
                ));
                let mut f = File::create(&path).unwrap();
                f.write_all(bytes).unwrap();
                Self { path }
            }

            pub fn path(&self) -> &Path {
                &self.path
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn mmap_reader_reads_typed_values() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());
        let tmp = write_temp(&bytes);
        let mut r = MmapReader::open(tmp.path()).unwrap();
        assert_eq!(r.read_u32(Endian::Little).unwrap(), 1);
        assert_eq!(r.read_u32(Endian::Big).unwrap(), 2);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn stream_reader_matches_mmap_reader() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&core::f32::consts::PI.to_le_bytes());
        let tmp = write_temp(&bytes);
        let mut r = StreamReader::open(tmp.path()).unwrap();
        assert!((r.read_f32(Endian::Little).unwrap() - core::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn read_line_strips_lf_and_cr() {
        let tmp = write_temp(b"hello\r\nworld\n");
        let mut r = MmapReader::open(tmp.path()).unwrap();
        assert_eq!(r.read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("world"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn open_reader_picks_mmap_below_threshold() {
        let tmp = write_temp(b"abcd");
        let reader = open_reader(tmp.path(), 1024).unwrap();
        assert_eq!(reader.remaining(), 4);
    }

    #[test]
    fn seek_past_end_fails() {
        let tmp = write_temp(b"ab");
        let mut r = MmapReader::open(tmp.path()).unwrap();
        assert!(r.seek_to(10).is_err());
    }
}
