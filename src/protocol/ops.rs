//! Per-operation argument dan result codecs
//!
//! Setiap operasi punya codec args dan codec result sendiri. Codec di sini
//! hanya dipanggil lewat dispatcher di `compound`, tidak langsung.
//!
//! Gagal pada field pertama yang tidak bisa dibaca/ditulis. Tidak ada
//! recovery dan tidak ada nilai default pengganti.

use super::encoder::{XdrDecode, XdrDecoder, XdrEncode, XdrEncoder};
use super::types::{
    FileHandle, Fsid, SessionId, StateId, Status, MAX_REFERRING_CALLS, MAX_REFERRING_LISTS,
};
use crate::error::{Context, Result, XdrError};

// ═══════════════════════════════════════════════════════════════
// CB_RECALL
// ═══════════════════════════════════════════════════════════════

/// Recall delegation untuk satu file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecallArgs {
    pub stateid: StateId,
    pub truncate: bool,
    pub fh: FileHandle,
}

impl XdrEncode for RecallArgs {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        self.stateid.encode(enc).at("recall.stateid")?;
        enc.put_bool(self.truncate).at("recall.truncate")?;
        self.fh.encode(enc).at("recall.fh")
    }
}

impl XdrDecode for RecallArgs {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            stateid: StateId::decode(dec).at("recall.stateid")?,
            truncate: dec.get_bool().at("recall.truncate")?,
            fh: FileHandle::decode(dec).at("recall.fh")?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// CB_LAYOUTRECALL
// ═══════════════════════════════════════════════════════════════

/// Layout iomode
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutIoMode {
    #[default]
    Read = 1,
    ReadWrite = 2,
    Any = 3,
}

impl LayoutIoMode {
    #[inline(always)]
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Read),
            2 => Some(Self::ReadWrite),
            3 => Some(Self::Any),
            _ => None,
        }
    }
}

/// Discriminant target layout recall di wire
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutRecallKind {
    File = 1,
    Fsid = 2,
    All = 3,
}

impl LayoutRecallKind {
    #[inline(always)]
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::File),
            2 => Some(Self::Fsid),
            3 => Some(Self::All),
            _ => None,
        }
    }
}

/// Target recall untuk satu file: range byte dalam file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutRecallFile {
    pub fh: FileHandle,
    pub offset: u64,
    pub length: u64,
    pub stateid: StateId,
}

impl XdrEncode for LayoutRecallFile {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        self.fh.encode(enc).at("layoutrecall_file.fh")?;
        enc.put_u64(self.offset).at("layoutrecall_file.offset")?;
        enc.put_u64(self.length).at("layoutrecall_file.length")?;
        self.stateid.encode(enc).at("layoutrecall_file.stateid")
    }
}

impl XdrDecode for LayoutRecallFile {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            fh: FileHandle::decode(dec).at("layoutrecall_file.fh")?,
            offset: dec.get_u64().at("layoutrecall_file.offset")?,
            length: dec.get_u64().at("layoutrecall_file.length")?,
            stateid: StateId::decode(dec).at("layoutrecall_file.stateid")?,
        })
    }
}

/// Sub-union target layout recall. `All` membawa nol byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutRecall {
    File(LayoutRecallFile),
    Fsid(Fsid),
    All,
}

impl LayoutRecall {
    pub fn kind(&self) -> LayoutRecallKind {
        match self {
            Self::File(_) => LayoutRecallKind::File,
            Self::Fsid(_) => LayoutRecallKind::Fsid,
            Self::All => LayoutRecallKind::All,
        }
    }
}

impl XdrEncode for LayoutRecall {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.kind() as u32)
            .at("layoutrecall_args.recall.type")?;
        match self {
            Self::File(file) => file.encode(enc),
            Self::Fsid(fsid) => fsid.encode(enc).at("layoutrecall_fsid.fsid"),
            Self::All => Ok(()),
        }
    }
}

impl XdrDecode for LayoutRecall {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let value = dec.get_u32().at("layoutrecall_args.recall.type")?;
        match LayoutRecallKind::from_u32(value) {
            Some(LayoutRecallKind::File) => LayoutRecallFile::decode(dec).map(Self::File),
            Some(LayoutRecallKind::Fsid) => Fsid::decode(dec)
                .at("layoutrecall_fsid.fsid")
                .map(Self::Fsid),
            Some(LayoutRecallKind::All) => Ok(Self::All),
            None => Err::<Self, _>(XdrError::UnknownDiscriminant {
                what: "layoutrecall type",
                value,
            })
            .at("layoutrecall_args.recall.type"),
        }
    }
}

/// Argumen CB_LAYOUTRECALL.
///
/// `layout_type` tidak diinterpretasi di sini, hanya diteruskan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRecallArgs {
    pub layout_type: u32,
    pub iomode: LayoutIoMode,
    pub changed: bool,
    pub recall: LayoutRecall,
}

impl XdrEncode for LayoutRecallArgs {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.layout_type).at("layoutrecall_args.type")?;
        enc.put_u32(self.iomode as u32)
            .at("layoutrecall_args.iomode")?;
        enc.put_bool(self.changed).at("layoutrecall_args.changed")?;
        self.recall.encode(enc)
    }
}

impl XdrDecode for LayoutRecallArgs {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let layout_type = dec.get_u32().at("layoutrecall_args.type")?;
        let iomode = dec
            .get_u32()
            .and_then(|value| {
                LayoutIoMode::from_u32(value).ok_or(XdrError::UnknownDiscriminant {
                    what: "layout iomode",
                    value,
                })
            })
            .at("layoutrecall_args.iomode")?;
        let changed = dec.get_bool().at("layoutrecall_args.changed")?;
        let recall = LayoutRecall::decode(dec)?;

        Ok(Self {
            layout_type,
            iomode,
            changed,
            recall,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// CB_SEQUENCE
// ═══════════════════════════════════════════════════════════════

/// Satu (sequenceid, slotid) yang sudah di-ack peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferringCall {
    pub sequenceid: u32,
    pub slotid: u32,
}

impl XdrEncode for ReferringCall {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.sequenceid).at("sequence_ref.sequenceid")?;
        enc.put_u32(self.slotid).at("sequence_ref.slotid")
    }
}

impl XdrDecode for ReferringCall {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            sequenceid: dec.get_u32().at("sequence_ref.sequenceid")?,
            slotid: dec.get_u32().at("sequence_ref.slotid")?,
        })
    }
}

/// Referring calls per session. Peer memakai ini untuk membuang
/// reply yang sudah di-ack dari retry cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferringCallList {
    pub sessionid: SessionId,
    pub calls: Vec<ReferringCall>,
}

impl XdrEncode for ReferringCallList {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        self.sessionid
            .encode(enc)
            .at("sequence_ref_list.sessionid")?;
        enc.put_array(&self.calls, MAX_REFERRING_CALLS, "referring calls")
    }
}

impl XdrDecode for ReferringCallList {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            sessionid: SessionId::decode(dec).at("sequence_ref_list.sessionid")?,
            calls: dec.get_array(MAX_REFERRING_CALLS, "referring calls")?,
        })
    }
}

/// Argumen CB_SEQUENCE
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceArgs {
    pub sessionid: SessionId,
    pub sequenceid: u32,
    pub slotid: u32,
    pub highest_slotid: u32,
    pub cachethis: bool,
    pub ref_lists: Vec<ReferringCallList>,
}

impl XdrEncode for SequenceArgs {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        self.sessionid.encode(enc).at("sequence_args.sessionid")?;
        enc.put_u32(self.sequenceid)
            .at("sequence_args.sequenceid")?;
        enc.put_u32(self.slotid).at("sequence_args.slotid")?;
        enc.put_u32(self.highest_slotid)
            .at("sequence_args.highest_slotid")?;
        enc.put_bool(self.cachethis).at("sequence_args.cachethis")?;
        enc.put_array(&self.ref_lists, MAX_REFERRING_LISTS, "referring lists")
    }
}

impl XdrDecode for SequenceArgs {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            sessionid: SessionId::decode(dec).at("sequence_args.sessionid")?,
            sequenceid: dec.get_u32().at("sequence_args.sequenceid")?,
            slotid: dec.get_u32().at("sequence_args.slotid")?,
            highest_slotid: dec.get_u32().at("sequence_args.highest_slotid")?,
            cachethis: dec.get_bool().at("sequence_args.cachethis")?,
            ref_lists: dec.get_array(MAX_REFERRING_LISTS, "referring lists")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceResOk {
    pub sessionid: SessionId,
    pub sequenceid: u32,
    pub slotid: u32,
    pub highest_slotid: u32,
    pub target_highest_slotid: u32,
}

impl XdrEncode for SequenceResOk {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        self.sessionid.encode(enc).at("sequence_res.sessionid")?;
        enc.put_u32(self.sequenceid).at("sequence_res.sequenceid")?;
        enc.put_u32(self.slotid).at("sequence_res.slotid")?;
        enc.put_u32(self.highest_slotid)
            .at("sequence_res.highest_slotid")?;
        enc.put_u32(self.target_highest_slotid)
            .at("sequence_res.target_highest_slotid")
    }
}

impl XdrDecode for SequenceResOk {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            sessionid: SessionId::decode(dec).at("sequence_res.sessionid")?,
            sequenceid: dec.get_u32().at("sequence_res.sequenceid")?,
            slotid: dec.get_u32().at("sequence_res.slotid")?,
            highest_slotid: dec.get_u32().at("sequence_res.highest_slotid")?,
            target_highest_slotid: dec.get_u32().at("sequence_res.target_highest_slotid")?,
        })
    }
}

/// Result CB_SEQUENCE: union dengan dua arm.
///
/// `NFS4_OK` membawa `SequenceResOk`; status lain tidak membawa payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceRes {
    Ok(SequenceResOk),
    Err(Status),
}

impl SequenceRes {
    pub fn status(&self) -> Status {
        match self {
            Self::Ok(_) => Status::OK,
            Self::Err(status) => *status,
        }
    }
}

impl XdrEncode for SequenceRes {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        match self {
            Self::Ok(ok) => {
                Status::OK.encode(enc).at("sequence_res.status")?;
                ok.encode(enc)
            }
            // NFS4_OK di arm void akan terbaca balik sebagai arm ok
            Self::Err(status) if status.is_ok() => Err::<(), _>(XdrError::StatusMismatch {
                what: "sequence result",
                status: status.0,
            })
            .at("sequence_res.status"),
            Self::Err(status) => status.encode(enc).at("sequence_res.status"),
        }
    }
}

impl XdrDecode for SequenceRes {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let status = Status::decode(dec).at("sequence_res.status")?;
        if status.is_ok() {
            SequenceResOk::decode(dec).map(Self::Ok)
        } else {
            Ok(Self::Err(status))
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Operasi dengan bentuk wire yang sama
// ═══════════════════════════════════════════════════════════════

/// Argumen bersama untuk GETATTR, NOTIFY, PUSH_DELEG, RECALL_ANY,
/// RECALLABLE_OBJ_AVAIL, RECALL_SLOT, WANTS_CANCELLED, NOTIFY_LOCK,
/// dan NOTIFY_DEVICEID: satu word u32.
///
/// Nama field mengikuti bentuk wire yang diamati, bukan semantik
/// masing-masing operasi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetSlotArgs {
    pub target_highest_slotid: u32,
}

impl TargetSlotArgs {
    pub fn new(target_highest_slotid: u32) -> Self {
        Self {
            target_highest_slotid,
        }
    }
}

impl XdrEncode for TargetSlotArgs {
    #[inline(always)]
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.target_highest_slotid)
    }
}

impl XdrDecode for TargetSlotArgs {
    #[inline(always)]
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        dec.get_u32().map(Self::new)
    }
}
