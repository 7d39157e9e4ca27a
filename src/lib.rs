//! cbwire - NFSv4.1 Callback XDR Codec
//!
//! Arsitektur:
//! - Primitive codec: XDR encoder/decoder dengan buffer pre-allocated
//! - Per-operation codecs: satu codec args dan satu codec result per operasi
//! - Compound envelope: CB_COMPOUND request/response dengan union dispatch
//! - Lifecycle: alokasi bounded untuk sequence dan ownership reply yang eksplisit
//! - Capture: file rekaman traffic callback, dibaca via mmap

pub mod core;
pub mod error;
pub mod protocol;

pub use error::{ErrorKind, Result, XdrError};
