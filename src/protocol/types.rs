//! Wire types umum untuk callback protocol
//!
//! Layout:
//! ┌──────────────┬──────────────────────────────────────────┐
//! │ StateId      │ seqid (u32) + other (12 bytes, fixed)    │
//! │ SessionId    │ 16 bytes, fixed                          │
//! │ FileHandle   │ len (u32) + bytes (≤ 128) + pad          │
//! │ CompoundTag  │ len (u32) + bytes (≤ 64) + pad           │
//! │ Fsid         │ major (u64) + minor (u64)                │
//! └──────────────┴──────────────────────────────────────────┘
//!
//! Opaque dengan ukuran tetap tidak pernah membawa length prefix.

use std::fmt;

use super::encoder::{XdrDecode, XdrDecoder, XdrEncode, XdrEncoder};
use crate::error::{Result, XdrError};

/// Ukuran bagian opaque dari stateid
pub const STATEID_OTHER_SIZE: usize = 12;
/// Ukuran session id
pub const SESSIONID_SIZE: usize = 16;
/// Maksimum panjang file handle
pub const MAX_FH_SIZE: usize = 128;
/// Maksimum panjang compound tag
pub const MAX_TAG_SIZE: usize = 64;
/// Maksimum jumlah operasi per compound
pub const MAX_OPERATIONS: usize = 16;
/// Maksimum jumlah referring call list di CB_SEQUENCE
pub const MAX_REFERRING_LISTS: usize = 64;
/// Maksimum jumlah call per referring list
pub const MAX_REFERRING_CALLS: usize = 64;

/// Opcode callback operation
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    GetAttr = 3,
    Recall = 4,
    LayoutRecall = 5,
    Notify = 6,
    PushDeleg = 7,
    RecallAny = 8,
    RecallableObjAvail = 9,
    RecallSlot = 10,
    Sequence = 11,
    WantsCancelled = 12,
    NotifyLock = 13,
    NotifyDeviceId = 14,
    Illegal = 10044,
}

impl OpCode {
    /// Lookup exact-match dari nilai wire
    #[inline(always)]
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            3 => Some(Self::GetAttr),
            4 => Some(Self::Recall),
            5 => Some(Self::LayoutRecall),
            6 => Some(Self::Notify),
            7 => Some(Self::PushDeleg),
            8 => Some(Self::RecallAny),
            9 => Some(Self::RecallableObjAvail),
            10 => Some(Self::RecallSlot),
            11 => Some(Self::Sequence),
            12 => Some(Self::WantsCancelled),
            13 => Some(Self::NotifyLock),
            14 => Some(Self::NotifyDeviceId),
            10044 => Some(Self::Illegal),
            _ => None,
        }
    }

    /// Nama operasi seperti di log dan output dump
    pub fn name(self) -> &'static str {
        match self {
            Self::GetAttr => "CB_GETATTR",
            Self::Recall => "CB_RECALL",
            Self::LayoutRecall => "CB_LAYOUTRECALL",
            Self::Notify => "CB_NOTIFY",
            Self::PushDeleg => "CB_PUSH_DELEG",
            Self::RecallAny => "CB_RECALL_ANY",
            Self::RecallableObjAvail => "CB_RECALLABLE_OBJ_AVAIL",
            Self::RecallSlot => "CB_RECALL_SLOT",
            Self::Sequence => "CB_SEQUENCE",
            Self::WantsCancelled => "CB_WANTS_CANCELLED",
            Self::NotifyLock => "CB_NOTIFY_LOCK",
            Self::NotifyDeviceId => "CB_NOTIFY_DEVICEID",
            Self::Illegal => "CB_ILLEGAL",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Status operasi. Semua nilai 32-bit round-trip; hanya `OK` yang
/// punya arti struktural (branch union CB_SEQUENCE).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(pub u32);

impl Status {
    pub const OK: Self = Self(0);
    pub const INVAL: Self = Self(22);
    pub const BADHANDLE: Self = Self(10001);
    pub const BAD_STATEID: Self = Self(10025);
    pub const NOTSUPP: Self = Self(10004);
    pub const DELAY: Self = Self(10008);
    pub const RESOURCE: Self = Self(10018);
    pub const MINOR_VERS_MISMATCH: Self = Self(10021);
    pub const BADXDR: Self = Self(10036);
    pub const OP_ILLEGAL: Self = Self(10044);
    pub const BADSESSION: Self = Self(10052);
    pub const BADSLOT: Self = Self(10053);
    pub const NOMATCHING_LAYOUT: Self = Self(10060);
    pub const SEQ_MISORDERED: Self = Self(10063);
    pub const SEQUENCE_POS: Self = Self(10064);
    pub const REP_TOO_BIG: Self = Self(10066);
    pub const RETRY_UNCACHED_REP: Self = Self(10068);

    #[inline(always)]
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::OK => "NFS4_OK",
            Self::INVAL => "NFS4ERR_INVAL",
            Self::BADHANDLE => "NFS4ERR_BADHANDLE",
            Self::BAD_STATEID => "NFS4ERR_BAD_STATEID",
            Self::NOTSUPP => "NFS4ERR_NOTSUPP",
            Self::DELAY => "NFS4ERR_DELAY",
            Self::RESOURCE => "NFS4ERR_RESOURCE",
            Self::MINOR_VERS_MISMATCH => "NFS4ERR_MINOR_VERS_MISMATCH",
            Self::BADXDR => "NFS4ERR_BADXDR",
            Self::OP_ILLEGAL => "NFS4ERR_OP_ILLEGAL",
            Self::BADSESSION => "NFS4ERR_BADSESSION",
            Self::BADSLOT => "NFS4ERR_BADSLOT",
            Self::NOMATCHING_LAYOUT => "NFS4ERR_NOMATCHING_LAYOUT",
            Self::SEQ_MISORDERED => "NFS4ERR_SEQ_MISORDERED",
            Self::SEQUENCE_POS => "NFS4ERR_SEQUENCE_POS",
            Self::REP_TOO_BIG => "NFS4ERR_REP_TOO_BIG",
            Self::RETRY_UNCACHED_REP => "NFS4ERR_RETRY_UNCACHED_REP",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Status({})", self.0),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl XdrEncode for Status {
    #[inline(always)]
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.0)
    }
}

impl XdrDecode for Status {
    #[inline(always)]
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        dec.get_u32().map(Self)
    }
}

/// Stateid: sequence number + opaque tag dengan ukuran tetap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateId {
    pub seqid: u32,
    pub other: [u8; STATEID_OTHER_SIZE],
}

impl XdrEncode for StateId {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.seqid)?;
        enc.put_fixed_opaque(&self.other)
    }
}

impl XdrDecode for StateId {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            seqid: dec.get_u32()?,
            other: dec.get_fixed_opaque()?,
        })
    }
}

/// Session id, 16 bytes tanpa length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId(pub [u8; SESSIONID_SIZE]);

impl XdrEncode for SessionId {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_fixed_opaque(&self.0)
    }
}

impl XdrDecode for SessionId {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        dec.get_fixed_opaque().map(Self)
    }
}

/// Filesystem id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fsid {
    pub major: u64,
    pub minor: u64,
}

impl XdrEncode for Fsid {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u64(self.major)?;
        enc.put_u64(self.minor)
    }
}

impl XdrDecode for Fsid {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            major: dec.get_u64()?,
            minor: dec.get_u64()?,
        })
    }
}

/// Bounded opaque dengan storage inline (tidak ada alokasi heap).
///
/// Bytes setelah `len` selalu nol, jadi derived `PartialEq` cukup.
macro_rules! bounded_opaque {
    ($(#[$meta:meta])* $name:ident, $max:expr, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            len: u32,
            bytes: [u8; $max],
        }

        impl $name {
            pub const MAX_LEN: usize = $max;

            /// Gagal jika `bytes` lebih panjang dari maksimum
            pub fn new(bytes: &[u8]) -> Result<Self> {
                if bytes.len() > $max {
                    return Err(XdrError::BoundExceeded {
                        what: $what,
                        len: bytes.len(),
                        max: $max,
                    });
                }
                let mut out = Self::default();
                out.bytes[..bytes.len()].copy_from_slice(bytes);
                out.len = bytes.len() as u32;
                Ok(out)
            }

            #[inline(always)]
            pub fn len(&self) -> usize {
                self.len as usize
            }

            #[inline(always)]
            pub fn is_empty(&self) -> bool {
                self.len == 0
            }

            #[inline(always)]
            pub fn as_bytes(&self) -> &[u8] {
                &self.bytes[..self.len as usize]
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    len: 0,
                    bytes: [0u8; $max],
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.as_bytes()).finish()
            }
        }

        impl XdrEncode for $name {
            fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
                enc.put_opaque(self.as_bytes(), $max, $what)
            }
        }

        impl XdrDecode for $name {
            fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
                let bytes = dec.get_opaque($max, $what)?;
                let mut out = Self::default();
                out.bytes[..bytes.len()].copy_from_slice(bytes);
                out.len = bytes.len() as u32;
                Ok(out)
            }
        }
    };
}

bounded_opaque!(
    /// File handle, maksimum 128 bytes
    FileHandle,
    MAX_FH_SIZE,
    "fh"
);

bounded_opaque!(
    /// Tag compound, maksimum 64 bytes. Tidak harus UTF-8.
    CompoundTag,
    MAX_TAG_SIZE,
    "tag"
);

impl CompoundTag {
    /// Tag sebagai teks (lossy) untuk log
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_lookup() {
        assert_eq!(OpCode::from_u32(3), Some(OpCode::GetAttr));
        assert_eq!(OpCode::from_u32(11), Some(OpCode::Sequence));
        assert_eq!(OpCode::from_u32(10044), Some(OpCode::Illegal));
        assert_eq!(OpCode::from_u32(0), None);
        assert_eq!(OpCode::from_u32(15), None);

        for op in [OpCode::LayoutRecall, OpCode::NotifyDeviceId, OpCode::Illegal] {
            assert_eq!(OpCode::from_u32(op as u32), Some(op));
        }
    }

    #[test]
    fn test_stateid_wire_size() {
        let stateid = StateId {
            seqid: 7,
            other: [0xAB; STATEID_OTHER_SIZE],
        };
        let mut encoder = XdrEncoder::new(64);
        stateid.encode(&mut encoder).unwrap();

        // 4 seqid + 12 other, tanpa length prefix
        assert_eq!(encoder.as_bytes().len(), 16);
        assert_eq!(&encoder.as_bytes()[..4], &[0, 0, 0, 7]);

        let mut decoder = XdrDecoder::new(encoder.as_bytes());
        assert_eq!(StateId::decode(&mut decoder).unwrap(), stateid);
    }

    #[test]
    fn test_filehandle_bound() {
        assert!(FileHandle::new(&[1u8; MAX_FH_SIZE]).is_ok());
        let err = FileHandle::new(&[1u8; MAX_FH_SIZE + 1]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Bound);

        // Length field 129 lalu tidak ada bytes: gagal di bound, bukan truncation
        let buf = ((MAX_FH_SIZE + 1) as u32).to_be_bytes();
        let mut decoder = XdrDecoder::new(&buf);
        assert_eq!(
            FileHandle::decode(&mut decoder),
            Err(XdrError::BoundExceeded {
                what: "fh",
                len: MAX_FH_SIZE + 1,
                max: MAX_FH_SIZE
            })
        );
    }

    #[test]
    fn test_filehandle_bytes_exact() {
        let fh = FileHandle::new(&[9, 8, 7, 6, 5]).unwrap();
        let mut encoder = XdrEncoder::new(64);
        fh.encode(&mut encoder).unwrap();
        assert_eq!(encoder.as_bytes(), &[0, 0, 0, 5, 9, 8, 7, 6, 5, 0, 0, 0]);

        let mut decoder = XdrDecoder::new(encoder.as_bytes());
        let decoded = FileHandle::decode(&mut decoder).unwrap();
        assert_eq!(decoded.as_bytes(), &[9, 8, 7, 6, 5]);
        assert_eq!(decoded, fh);
    }

    #[test]
    fn test_fsid_two_hypers() {
        let fsid = Fsid {
            major: u64::MAX,
            minor: 1,
        };
        let mut encoder = XdrEncoder::new(32);
        fsid.encode(&mut encoder).unwrap();
        assert_eq!(encoder.as_bytes().len(), 16);

        let mut decoder = XdrDecoder::new(encoder.as_bytes());
        assert_eq!(Fsid::decode(&mut decoder).unwrap(), fsid);
    }

    #[test]
    fn test_status_debug_names() {
        assert_eq!(format!("{:?}", Status::OK), "NFS4_OK");
        assert_eq!(format!("{:?}", Status(4242)), "Status(4242)");
        assert!(Status::OK.is_ok());
        assert!(!Status::BADXDR.is_ok());
    }
}
