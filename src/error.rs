//! Error types untuk callback XDR codec
//!
//! Setiap langkah codec menghasilkan sukses atau gagal. Tidak ada default
//! yang diganti diam-diam. Semua kegagalan masuk salah satu dari tiga jenis:
//! I/O (cursor habis), bound (length melebihi maksimum), atau discriminant
//! (tag union tidak dikenal).

use thiserror::Error;
use tracing::debug;

/// Result type alias untuk operasi codec
pub type Result<T> = std::result::Result<T, XdrError>;

/// Kategori kegagalan, dipakai caller yang hanya perlu klasifikasi kasar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cursor kehabisan bytes atau kapasitas buffer
    Io,
    /// Length/count hasil decode melebihi maksimum statis
    Bound,
    /// Tag union tanpa variant yang cocok
    Discriminant,
}

/// Error dari primitive, per-operation, dan compound codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XdrError {
    // ═══════════════════════════════════════════════════════════════
    // I/O
    // ═══════════════════════════════════════════════════════════════
    /// Decode buffer habis sebelum field selesai dibaca
    #[error("buffer truncated: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Encode buffer penuh
    #[error("encode buffer full: need {needed} bytes, {available} available")]
    BufferFull { needed: usize, available: usize },

    /// Reserve untuk sequence hasil decode gagal
    #[error("failed to allocate {count} elements for {what}")]
    Alloc { what: &'static str, count: usize },

    // ═══════════════════════════════════════════════════════════════
    // Bound violation
    // ═══════════════════════════════════════════════════════════════
    /// Length atau count melebihi maksimum statis
    #[error("{what} length {len} exceeds maximum {max}")]
    BoundExceeded {
        what: &'static str,
        len: usize,
        max: usize,
    },

    // ═══════════════════════════════════════════════════════════════
    // Discriminant mismatch
    // ═══════════════════════════════════════════════════════════════
    /// Discriminant tanpa codec dan tanpa default
    #[error("unknown {what} discriminant {value}")]
    UnknownDiscriminant { what: &'static str, value: u32 },

    /// Boolean selain 0 atau 1
    #[error("invalid boolean value {0}")]
    InvalidBool(u32),

    /// Status tidak cocok dengan branch union yang diminta
    #[error("{what} status {status} does not match its union arm")]
    StatusMismatch { what: &'static str, status: u32 },
}

impl XdrError {
    /// Klasifikasi error ke salah satu dari tiga jenis kegagalan
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated { .. } | Self::BufferFull { .. } | Self::Alloc { .. } => ErrorKind::Io,
            Self::BoundExceeded { .. } => ErrorKind::Bound,
            Self::UnknownDiscriminant { .. }
            | Self::InvalidBool(_)
            | Self::StatusMismatch { .. } => ErrorKind::Discriminant,
        }
    }
}

/// Menandai field yang gagal dengan dotted path untuk diagnostik.
///
/// Path hanya masuk log, tidak mengubah error yang dikembalikan.
pub(crate) trait Context<T> {
    fn at(self, path: &'static str) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    #[inline]
    fn at(self, path: &'static str) -> Result<T> {
        if let Err(ref err) = self {
            debug!(target: "cb-xdr", field = path, error = %err, "failed");
        }
        self
    }
}

/// Jalankan `f` dengan subscriber DEBUG yang menulis ke buffer,
/// lalu kembalikan baris log yang membawa field path.
#[cfg(test)]
pub(crate) fn field_logs(f: impl FnOnce()) -> Vec<String> {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = logs.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes)
        .lines()
        .filter(|line| line.contains("field="))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let io = XdrError::Truncated {
            needed: 4,
            remaining: 0,
        };
        let bound = XdrError::BoundExceeded {
            what: "fh",
            len: 129,
            max: 128,
        };
        let disc = XdrError::UnknownDiscriminant {
            what: "opcode",
            value: 99,
        };

        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(bound.kind(), ErrorKind::Bound);
        assert_eq!(disc.kind(), ErrorKind::Discriminant);
        assert_eq!(XdrError::InvalidBool(2).kind(), ErrorKind::Discriminant);
    }

    #[test]
    fn test_context_passes_error_through() {
        let res: Result<u32> = Err(XdrError::InvalidBool(7));
        assert_eq!(res.at("recall.truncate"), Err(XdrError::InvalidBool(7)));

        let ok: Result<u32> = Ok(5);
        assert_eq!(ok.at("getattr.target_highest_slotid"), Ok(5));
    }

    #[test]
    fn test_context_logs_field_path() {
        let logs = field_logs(|| {
            let res: Result<u32> = Err(XdrError::InvalidBool(3));
            let _ = res.at("recall.truncate");
            let ok: Result<u32> = Ok(1);
            let _ = ok.at("recall.stateid");
        });
        assert_eq!(logs.len(), 1);
        assert!(logs[0].contains("recall.truncate"));
    }
}
