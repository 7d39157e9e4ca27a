//! XDR Encoder/Decoder (big-endian, 4-byte aligned)
//!
//! Encoder menulis langsung ke pre-allocated buffer dengan kapasitas tetap.
//! Decoder membaca dari borrowed slice tanpa copy.
//! Encode dan decode adalah dua operasi terpisah, tidak ada mode flag.

use crate::core::lifecycle;
use crate::error::{Context, Result, XdrError};

/// XDR unit: semua item di-pad ke kelipatan 4 bytes
pub const XDR_UNIT: usize = 4;

/// Panjang setelah padding ke XDR unit berikutnya
#[inline(always)]
pub const fn padded_len(len: usize) -> usize {
    (len + XDR_UNIT - 1) & !(XDR_UNIT - 1)
}

/// Tipe yang bisa ditulis ke wire
pub trait XdrEncode {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()>;
}

/// Tipe yang bisa dibaca dari wire sebagai owned value
pub trait XdrDecode: Sized {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self>;
}

/// Pre-allocated encoder buffer
///
/// Semua operasi encode dilakukan ke buffer internal,
/// tidak ada alokasi dinamis setelah `new`.
pub struct XdrEncoder {
    buffer: Box<[u8]>,
    write_pos: usize,
}

impl XdrEncoder {
    /// Membuat encoder dengan buffer size tertentu
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            write_pos: 0,
        }
    }

    /// Reset encoder untuk reuse
    #[inline(always)]
    pub fn reset(&mut self) {
        self.write_pos = 0;
    }

    /// Posisi tulis saat ini
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.write_pos
    }

    /// Buang semua bytes setelah `pos` (rollback encode yang gagal)
    #[inline(always)]
    pub fn truncate(&mut self, pos: usize) {
        self.write_pos = self.write_pos.min(pos);
    }

    /// Get current buffer content
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.write_pos]
    }

    /// Available space in buffer
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.write_pos
    }

    #[inline(always)]
    fn claim(&mut self, len: usize) -> Result<&mut [u8]> {
        let available = self.available();
        if len > available {
            return Err(XdrError::BufferFull {
                needed: len,
                available,
            });
        }
        let start = self.write_pos;
        self.write_pos += len;
        Ok(&mut self.buffer[start..self.write_pos])
    }

    #[inline(always)]
    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.claim(4)?.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Hyper: dua word 32-bit berurutan, high word dulu
    #[inline(always)]
    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.claim(8)?.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    #[inline(always)]
    pub fn put_bool(&mut self, value: bool) -> Result<()> {
        self.put_u32(u32::from(value))
    }

    /// Fixed-length opaque: tanpa length prefix, size adalah konstanta wire
    pub fn put_fixed_opaque(&mut self, bytes: &[u8]) -> Result<()> {
        let dst = self.claim(padded_len(bytes.len()))?;
        let (data, pad) = dst.split_at_mut(bytes.len());
        data.copy_from_slice(bytes);
        pad.fill(0);
        Ok(())
    }

    /// Variable-length opaque: length prefix, bytes, lalu zero padding
    pub fn put_opaque(&mut self, bytes: &[u8], max: usize, what: &'static str) -> Result<()> {
        if bytes.len() > max {
            return Err(XdrError::BoundExceeded {
                what,
                len: bytes.len(),
                max,
            });
        }
        self.put_u32(bytes.len() as u32)?;
        self.put_fixed_opaque(bytes)
    }

    /// Element count untuk bounded sequence
    pub fn put_count(&mut self, count: usize, max: usize, what: &'static str) -> Result<()> {
        if count > max {
            return Err(XdrError::BoundExceeded {
                what,
                len: count,
                max,
            });
        }
        self.put_u32(count as u32)
    }

    /// Bounded sequence: count lalu elemen berurutan, index 0 dulu.
    ///
    /// Elemen mencatat field-nya sendiri; di sini hanya count.
    pub fn put_array<T: XdrEncode>(
        &mut self,
        items: &[T],
        max: usize,
        what: &'static str,
    ) -> Result<()> {
        self.put_count(items.len(), max, what).at(what)?;
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }
}

/// Zero-copy decoder
pub struct XdrDecoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> XdrDecoder<'a> {
    /// Membuat decoder dari buffer
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }

    /// Posisi baca saat ini
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.read_pos
    }

    #[inline(always)]
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(XdrError::Truncated {
                needed: len,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += len;
        Ok(&self.buffer[start..self.read_pos])
    }

    #[inline(always)]
    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline(always)]
    pub fn get_u64(&mut self) -> Result<u64> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(word))
    }

    /// Boolean hanya boleh 0 atau 1
    #[inline(always)]
    pub fn get_bool(&mut self) -> Result<bool> {
        match self.get_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(XdrError::InvalidBool(other)),
        }
    }

    /// Fixed-length opaque (size implisit, tidak ada length prefix)
    pub fn get_fixed_opaque<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(padded_len(N))?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes[..N]);
        Ok(out)
    }

    /// Variable-length opaque. Length divalidasi sebelum byte apapun dibaca.
    ///
    /// Pad bytes dilewati tanpa diperiksa isinya.
    pub fn get_opaque(&mut self, max: usize, what: &'static str) -> Result<&'a [u8]> {
        let len = self.get_u32()? as usize;
        if len > max {
            return Err(XdrError::BoundExceeded { what, len, max });
        }
        let bytes = self.take(padded_len(len))?;
        Ok(&bytes[..len])
    }

    /// Element count, divalidasi terhadap maksimum statis
    pub fn get_count(&mut self, max: usize, what: &'static str) -> Result<usize> {
        let count = self.get_u32()? as usize;
        if count > max {
            return Err(XdrError::BoundExceeded {
                what,
                len: count,
                max,
            });
        }
        Ok(count)
    }

    /// Bounded sequence. Array yang sudah teralokasi di-drop kalau elemen gagal.
    pub fn get_array<T: XdrDecode>(&mut self, max: usize, what: &'static str) -> Result<Vec<T>> {
        let count = self.get_count(max, what).at(what)?;
        let mut items = lifecycle::alloc_seq(count, what).at(what)?;
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}

impl XdrEncode for u32 {
    #[inline(always)]
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(*self)
    }
}

impl XdrDecode for u32 {
    #[inline(always)]
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        dec.get_u32()
    }
}
