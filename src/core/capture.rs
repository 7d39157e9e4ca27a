//! Capture file untuk traffic callback, dibaca via mmap
//!
//! Layout (semua XDR):
//! ┌──────────────────────────────────────────────┐
//! │ magic (u32, "CBXC") │ version (u32)          │
//! ├──────────────────────────────────────────────┤
//! │ direction (u32) │ body opaque<1MB> + pad     │  × N record
//! └──────────────────────────────────────────────┘
//!
//! Body adalah bytes CB_COMPOUND persis seperti dari transport.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::XdrError;
use crate::protocol::{padded_len, XdrDecoder, XdrEncoder};

const MAGIC: u32 = 0x4342_5843; // "CBXC"
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 8;
/// Maksimum ukuran body satu record
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Arah record: call dari server atau reply dari client
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Call = 0,
    Reply = 1,
}

impl Direction {
    #[inline(always)]
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Call),
            1 => Some(Self::Reply),
            _ => None,
        }
    }
}

fn invalid_data(err: XdrError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Writer untuk capture file baru
pub struct CaptureWriter {
    out: BufWriter<File>,
    encoder: XdrEncoder,
    records: usize,
}

impl CaptureWriter {
    /// Membuat capture file (truncate jika sudah ada)
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = Self {
            out: BufWriter::new(file),
            encoder: XdrEncoder::new(HEADER_SIZE + padded_len(MAX_RECORD_SIZE)),
            records: 0,
        };

        writer.encoder.put_u32(MAGIC).map_err(invalid_data)?;
        writer.encoder.put_u32(VERSION).map_err(invalid_data)?;
        writer.out.write_all(writer.encoder.as_bytes())?;
        Ok(writer)
    }

    /// Menulis satu record
    pub fn append(&mut self, direction: Direction, body: &[u8]) -> io::Result<()> {
        self.encoder.reset();
        self.encoder
            .put_u32(direction as u32)
            .map_err(invalid_data)?;
        self.encoder
            .put_opaque(body, MAX_RECORD_SIZE, "capture record")
            .map_err(invalid_data)?;
        self.out.write_all(self.encoder.as_bytes())?;
        self.records += 1;
        Ok(())
    }

    /// Jumlah record yang sudah ditulis
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush ke disk
    pub fn finish(mut self) -> io::Result<usize> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(self.records)
    }
}

/// Capture file read-only yang di-mmap
pub struct CaptureFile {
    mmap: Mmap,
}

impl CaptureFile {
    /// Membuka capture file dan validasi header
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() < HEADER_SIZE as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "capture file shorter than header",
            ));
        }

        // SAFETY: File dibuka read-only; capture tidak diubah selama dibaca
        let mmap = unsafe { Mmap::map(&file)? };

        let mut decoder = XdrDecoder::new(&mmap[..]);
        let magic = decoder.get_u32().map_err(invalid_data)?;
        let version = decoder.get_u32().map_err(invalid_data)?;
        if magic != MAGIC || version != VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("not a capture file (magic {magic:#010x}, version {version})"),
            ));
        }

        Ok(Self { mmap })
    }

    /// Ukuran bagian record dalam bytes, tanpa header
    pub fn len(&self) -> usize {
        self.mmap.len() - HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterasi record (zero-copy: body menunjuk langsung ke mmap region)
    pub fn records(&self) -> Records<'_> {
        Records {
            decoder: XdrDecoder::new(&self.mmap[HEADER_SIZE..]),
            index: 0,
            failed: false,
        }
    }
}

/// Satu record capture
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub index: usize,
    pub direction: Direction,
    pub body: &'a [u8],
}

/// Iterator record. Berhenti setelah error pertama.
pub struct Records<'a> {
    decoder: XdrDecoder<'a>,
    index: usize,
    failed: bool,
}

impl<'a> Records<'a> {
    fn read_record(&mut self) -> Result<Record<'a>, XdrError> {
        let value = self.decoder.get_u32()?;
        let direction = Direction::from_u32(value).ok_or(XdrError::UnknownDiscriminant {
            what: "capture direction",
            value,
        })?;
        let body = self.decoder.get_opaque(MAX_RECORD_SIZE, "capture record")?;
        Ok(Record {
            index: self.index,
            direction,
            body,
        })
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = io::Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.decoder.remaining() == 0 {
            return None;
        }

        match self.read_record() {
            Ok(record) => {
                self.index += 1;
                Some(Ok(record))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(invalid_data(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basic.cbcap");

        let mut writer = CaptureWriter::create(&path).unwrap();
        writer.append(Direction::Call, b"call-bytes").unwrap();
        writer.append(Direction::Reply, &[]).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let capture = CaptureFile::open(&path).unwrap();
        let records: Vec<_> = capture.records().collect::<io::Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::Call);
        assert_eq!(records[0].body, b"call-bytes");
        assert_eq!(records[1].direction, Direction::Reply);
        assert!(records[1].body.is_empty());
        assert_eq!(records[1].index, 1);
    }

    #[test]
    fn test_reject_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.bin");
        std::fs::write(&path, b"NOTCBXC!").unwrap();

        let err = CaptureFile::open(&path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_record_stops_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.cbcap");

        let mut writer = CaptureWriter::create(&path).unwrap();
        writer.append(Direction::Call, b"first").unwrap();
        writer.append(Direction::Call, b"second").unwrap();
        writer.finish().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, &bytes).unwrap();

        let capture = CaptureFile::open(&path).unwrap();
        let mut records = capture.records();
        assert_eq!(records.next().unwrap().unwrap().body, b"first");
        assert!(records.next().unwrap().is_err());
        assert!(records.next().is_none());
    }

    #[test]
    fn test_len_counts_record_bytes_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.cbcap");

        CaptureWriter::create(&path).unwrap().finish().unwrap();
        let capture = CaptureFile::open(&path).unwrap();
        assert_eq!(capture.len(), 0);
        assert!(capture.is_empty());
        assert!(capture.records().next().is_none());

        let mut writer = CaptureWriter::create(&path).unwrap();
        writer.append(Direction::Call, b"abcde").unwrap();
        writer.finish().unwrap();

        // direction + length + 5 bytes + 3 pad
        let capture = CaptureFile::open(&path).unwrap();
        assert_eq!(capture.len(), 16);
        assert!(!capture.is_empty());
    }
}
