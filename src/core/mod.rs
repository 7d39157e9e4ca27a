//! Core module: lifecycle hasil decode dan capture storage
//!
//! Prinsip desain:
//! - Owned: setiap decode membangun value tree sendiri, tidak ada sharing
//! - Bounded: count divalidasi sebelum alokasi, alokasi fallible
//! - Zero-Copy: capture file di-mmap, record dibaca langsung dari page cache

mod capture;
pub(crate) mod lifecycle;

pub use capture::{CaptureFile, CaptureWriter, Direction, Record, Records, MAX_RECORD_SIZE};
pub use lifecycle::{ReplyHandle, ReplyStore};
