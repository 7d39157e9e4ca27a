//! CB_COMPOUND envelope dan union dispatcher
//!
//! Request:
//! ┌─────────┬──────────────┬────────────────┬───────────────────────┐
//! │ tag     │ minorversion │ callback_ident │ argarray<16> (ArgOp)  │
//! └─────────┴──────────────┴────────────────┴───────────────────────┘
//!
//! Response:
//! ┌─────────┬─────────┬───────────────────────┐
//! │ status  │ tag     │ resarray<16> (ResOp)  │
//! └─────────┴─────────┴───────────────────────┘
//!
//! Satu pass linear. Elemen pertama yang gagal menghentikan seluruh
//! compound, dan semua elemen yang sudah di-decode ikut di-drop.

use tracing::trace;

use super::encoder::{XdrDecode, XdrDecoder, XdrEncode, XdrEncoder};
use super::ops::{LayoutRecallArgs, RecallArgs, SequenceArgs, SequenceRes, TargetSlotArgs};
use super::types::{CompoundTag, OpCode, Status, MAX_OPERATIONS};
use crate::error::{Context, Result, XdrError};

/// Satu operasi di argarray. Variant dipilih hanya oleh opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgOp {
    GetAttr(TargetSlotArgs),
    Recall(RecallArgs),
    LayoutRecall(LayoutRecallArgs),
    Notify(TargetSlotArgs),
    PushDeleg(TargetSlotArgs),
    RecallAny(TargetSlotArgs),
    RecallableObjAvail(TargetSlotArgs),
    RecallSlot(TargetSlotArgs),
    Sequence(SequenceArgs),
    WantsCancelled(TargetSlotArgs),
    NotifyLock(TargetSlotArgs),
    NotifyDeviceId(TargetSlotArgs),
    /// Void entry: nol byte payload
    Illegal,
}

impl ArgOp {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::GetAttr(_) => OpCode::GetAttr,
            Self::Recall(_) => OpCode::Recall,
            Self::LayoutRecall(_) => OpCode::LayoutRecall,
            Self::Notify(_) => OpCode::Notify,
            Self::PushDeleg(_) => OpCode::PushDeleg,
            Self::RecallAny(_) => OpCode::RecallAny,
            Self::RecallableObjAvail(_) => OpCode::RecallableObjAvail,
            Self::RecallSlot(_) => OpCode::RecallSlot,
            Self::Sequence(_) => OpCode::Sequence,
            Self::WantsCancelled(_) => OpCode::WantsCancelled,
            Self::NotifyLock(_) => OpCode::NotifyLock,
            Self::NotifyDeviceId(_) => OpCode::NotifyDeviceId,
            Self::Illegal => OpCode::Illegal,
        }
    }
}

impl XdrEncode for ArgOp {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        enc.put_u32(self.opcode() as u32).at("argop.opnum")?;
        match self {
            Self::GetAttr(args) => args.encode(enc).at("getattr.target_highest_slotid"),
            Self::Recall(args) => args.encode(enc),
            Self::LayoutRecall(args) => args.encode(enc),
            Self::Notify(args) => args.encode(enc).at("notify.target_highest_slotid"),
            Self::PushDeleg(args) => args.encode(enc).at("push_deleg.target_highest_slotid"),
            Self::RecallAny(args) => args.encode(enc).at("recall_any.target_highest_slotid"),
            Self::RecallableObjAvail(args) => args
                .encode(enc)
                .at("recallable_obj_avail.target_highest_slotid"),
            Self::RecallSlot(args) => args.encode(enc).at("recall_slot.target_highest_slotid"),
            Self::Sequence(args) => args.encode(enc),
            Self::WantsCancelled(args) => args
                .encode(enc)
                .at("wants_cancelled.target_highest_slotid"),
            Self::NotifyLock(args) => args.encode(enc).at("notify_lock.target_highest_slotid"),
            Self::NotifyDeviceId(args) => args
                .encode(enc)
                .at("notify_deviceid.target_highest_slotid"),
            Self::Illegal => Ok(()),
        }
    }
}

impl XdrDecode for ArgOp {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let value = dec.get_u32().at("argop.opnum")?;
        let Some(opcode) = OpCode::from_u32(value) else {
            return Err::<Self, _>(XdrError::UnknownDiscriminant {
                what: "argop opcode",
                value,
            })
            .at("argop.args");
        };

        let op = match opcode {
            OpCode::GetAttr => Self::GetAttr(
                TargetSlotArgs::decode(dec).at("getattr.target_highest_slotid")?,
            ),
            OpCode::Recall => Self::Recall(RecallArgs::decode(dec)?),
            OpCode::LayoutRecall => Self::LayoutRecall(LayoutRecallArgs::decode(dec)?),
            OpCode::Notify => {
                Self::Notify(TargetSlotArgs::decode(dec).at("notify.target_highest_slotid")?)
            }
            OpCode::PushDeleg => Self::PushDeleg(
                TargetSlotArgs::decode(dec).at("push_deleg.target_highest_slotid")?,
            ),
            OpCode::RecallAny => Self::RecallAny(
                TargetSlotArgs::decode(dec).at("recall_any.target_highest_slotid")?,
            ),
            OpCode::RecallableObjAvail => Self::RecallableObjAvail(
                TargetSlotArgs::decode(dec).at("recallable_obj_avail.target_highest_slotid")?,
            ),
            OpCode::RecallSlot => Self::RecallSlot(
                TargetSlotArgs::decode(dec).at("recall_slot.target_highest_slotid")?,
            ),
            OpCode::Sequence => Self::Sequence(SequenceArgs::decode(dec)?),
            OpCode::WantsCancelled => Self::WantsCancelled(
                TargetSlotArgs::decode(dec).at("wants_cancelled.target_highest_slotid")?,
            ),
            OpCode::NotifyLock => Self::NotifyLock(
                TargetSlotArgs::decode(dec).at("notify_lock.target_highest_slotid")?,
            ),
            OpCode::NotifyDeviceId => Self::NotifyDeviceId(
                TargetSlotArgs::decode(dec).at("notify_deviceid.target_highest_slotid")?,
            ),
            OpCode::Illegal => Self::Illegal,
        };
        Ok(op)
    }
}

/// Satu operasi di resarray
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResOp {
    GetAttr(Status),
    Recall(Status),
    LayoutRecall(Status),
    Notify(Status),
    PushDeleg(Status),
    RecallAny(Status),
    RecallableObjAvail(Status),
    RecallSlot(Status),
    Sequence(SequenceRes),
    WantsCancelled(Status),
    NotifyLock(Status),
    NotifyDeviceId(Status),
    Illegal,
}

impl ResOp {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::GetAttr(_) => OpCode::GetAttr,
            Self::Recall(_) => OpCode::Recall,
            Self::LayoutRecall(_) => OpCode::LayoutRecall,
            Self::Notify(_) => OpCode::Notify,
            Self::PushDeleg(_) => OpCode::PushDeleg,
            Self::RecallAny(_) => OpCode::RecallAny,
            Self::RecallableObjAvail(_) => OpCode::RecallableObjAvail,
            Self::RecallSlot(_) => OpCode::RecallSlot,
            Self::Sequence(_) => OpCode::Sequence,
            Self::WantsCancelled(_) => OpCode::WantsCancelled,
            Self::NotifyLock(_) => OpCode::NotifyLock,
            Self::NotifyDeviceId(_) => OpCode::NotifyDeviceId,
            Self::Illegal => OpCode::Illegal,
        }
    }

    /// Status operasi. `Illegal` tidak membawa status di wire.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Sequence(res) => Some(res.status()),
            Self::Illegal => None,
            Self::GetAttr(status)
            | Self::Recall(status)
            | Self::LayoutRecall(status)
            | Self::Notify(status)
            | Self::PushDeleg(status)
            | Self::RecallAny(status)
            | Self::RecallableObjAvail(status)
            | Self::RecallSlot(status)
            | Self::WantsCancelled(status)
            | Self::NotifyLock(status)
            | Self::NotifyDeviceId(status) => Some(*status),
        }
    }

    fn status_path(opcode: OpCode) -> &'static str {
        match opcode {
            OpCode::GetAttr => "getattr.status",
            OpCode::Recall => "recall.status",
            OpCode::LayoutRecall => "layoutrecall_res.status",
            OpCode::Notify => "notify.status",
            OpCode::PushDeleg => "push_deleg.status",
            OpCode::RecallAny => "recall_any.status",
            OpCode::RecallableObjAvail => "recallable_obj_avail.status",
            OpCode::RecallSlot => "recall_slot.status",
            OpCode::Sequence => "sequence_res.status",
            OpCode::WantsCancelled => "wants_cancelled.status",
            OpCode::NotifyLock => "notify_lock.status",
            OpCode::NotifyDeviceId => "notify_deviceid.status",
            OpCode::Illegal => "resop.res",
        }
    }
}

impl XdrEncode for ResOp {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        let opcode = self.opcode();
        enc.put_u32(opcode as u32).at("resop.opnum")?;
        match self {
            Self::Sequence(res) => res.encode(enc),
            Self::Illegal => Ok(()),
            Self::GetAttr(status)
            | Self::Recall(status)
            | Self::LayoutRecall(status)
            | Self::Notify(status)
            | Self::PushDeleg(status)
            | Self::RecallAny(status)
            | Self::RecallableObjAvail(status)
            | Self::RecallSlot(status)
            | Self::WantsCancelled(status)
            | Self::NotifyLock(status)
            | Self::NotifyDeviceId(status) => status.encode(enc).at(Self::status_path(opcode)),
        }
    }
}

impl XdrDecode for ResOp {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        let value = dec.get_u32().at("resop.opnum")?;
        let Some(opcode) = OpCode::from_u32(value) else {
            return Err::<Self, _>(XdrError::UnknownDiscriminant {
                what: "resop opcode",
                value,
            })
            .at("resop.res");
        };

        let path = Self::status_path(opcode);
        let op = match opcode {
            OpCode::Sequence => Self::Sequence(SequenceRes::decode(dec)?),
            OpCode::Illegal => Self::Illegal,
            OpCode::GetAttr => Self::GetAttr(Status::decode(dec).at(path)?),
            OpCode::Recall => Self::Recall(Status::decode(dec).at(path)?),
            OpCode::LayoutRecall => Self::LayoutRecall(Status::decode(dec).at(path)?),
            OpCode::Notify => Self::Notify(Status::decode(dec).at(path)?),
            OpCode::PushDeleg => Self::PushDeleg(Status::decode(dec).at(path)?),
            OpCode::RecallAny => Self::RecallAny(Status::decode(dec).at(path)?),
            OpCode::RecallableObjAvail => {
                Self::RecallableObjAvail(Status::decode(dec).at(path)?)
            }
            OpCode::RecallSlot => Self::RecallSlot(Status::decode(dec).at(path)?),
            OpCode::WantsCancelled => Self::WantsCancelled(Status::decode(dec).at(path)?),
            OpCode::NotifyLock => Self::NotifyLock(Status::decode(dec).at(path)?),
            OpCode::NotifyDeviceId => Self::NotifyDeviceId(Status::decode(dec).at(path)?),
        };
        Ok(op)
    }
}

/// CB_COMPOUND request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundArgs {
    pub tag: CompoundTag,
    pub minorversion: u32,
    /// Dibaca dan ditulis, tapi client harus mengabaikannya
    pub callback_ident: u32,
    pub argarray: Vec<ArgOp>,
}

impl CompoundArgs {
    /// Membuat request kosong. Gagal jika tag melebihi `MAX_TAG_SIZE`.
    pub fn new(tag: &[u8], minorversion: u32) -> Result<Self> {
        Ok(Self {
            tag: CompoundTag::new(tag)?,
            minorversion,
            callback_ident: 0,
            argarray: Vec::new(),
        })
    }

    /// Tambah operasi di akhir argarray, dibatasi `MAX_OPERATIONS`
    pub fn push(&mut self, op: ArgOp) -> Result<()> {
        if self.argarray.len() >= MAX_OPERATIONS {
            return Err(XdrError::BoundExceeded {
                what: "argarray",
                len: self.argarray.len() + 1,
                max: MAX_OPERATIONS,
            });
        }
        self.argarray.push(op);
        Ok(())
    }
}

impl XdrEncode for CompoundArgs {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        self.tag.encode(enc).at("compound.tag")?;
        enc.put_u32(self.minorversion).at("compound.minorversion")?;
        enc.put_u32(self.callback_ident)
            .at("compound.callback_ident")?;
        enc.put_array(&self.argarray, MAX_OPERATIONS, "argarray")
    }
}

impl XdrDecode for CompoundArgs {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            tag: CompoundTag::decode(dec).at("compound.tag")?,
            minorversion: dec.get_u32().at("compound.minorversion")?,
            callback_ident: dec.get_u32().at("compound.callback_ident")?,
            argarray: dec.get_array(MAX_OPERATIONS, "argarray")?,
        })
    }
}

/// CB_COMPOUND response, struktur cermin dari `CompoundArgs`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundRes {
    pub status: Status,
    pub tag: CompoundTag,
    pub resarray: Vec<ResOp>,
}

impl CompoundRes {
    /// Response untuk request tertentu: tag disalin dari request
    pub fn reply_to(args: &CompoundArgs, status: Status) -> Self {
        Self {
            status,
            tag: args.tag,
            resarray: Vec::with_capacity(args.argarray.len()),
        }
    }
}

impl XdrEncode for CompoundRes {
    fn encode(&self, enc: &mut XdrEncoder) -> Result<()> {
        self.status.encode(enc).at("compound_res.status")?;
        self.tag.encode(enc).at("compound_res.tag")?;
        enc.put_array(&self.resarray, MAX_OPERATIONS, "resarray")
    }
}

impl XdrDecode for CompoundRes {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self> {
        Ok(Self {
            status: Status::decode(dec).at("compound_res.status")?,
            tag: CompoundTag::decode(dec).at("compound_res.tag")?,
            resarray: dec.get_array(MAX_OPERATIONS, "resarray")?,
        })
    }
}

/// Decode request dari buffer transport.
///
/// Bytes setelah compound tidak diperiksa.
pub fn decode_compound_args(buf: &[u8]) -> Result<CompoundArgs> {
    let mut decoder = XdrDecoder::new(buf);
    match CompoundArgs::decode(&mut decoder) {
        Ok(args) => {
            trace!(
                target: "cb-xdr",
                tag = %args.tag.to_string_lossy(),
                minorversion = args.minorversion,
                ops = args.argarray.len(),
                "decoded compound args"
            );
            Ok(args)
        }
        Err(err) => {
            trace!(target: "cb-xdr", offset = decoder.position(), "compound args decode aborted");
            Err(err)
        }
    }
}

/// Decode response. Value dikembalikan ke caller, yang memegang ownership
/// sampai di-drop atau diserahkan ke `ReplyStore`.
pub fn decode_compound_res(buf: &[u8]) -> Result<CompoundRes> {
    let mut decoder = XdrDecoder::new(buf);
    match CompoundRes::decode(&mut decoder) {
        Ok(res) => {
            trace!(
                target: "cb-xdr",
                status = %res.status,
                ops = res.resarray.len(),
                "decoded compound res"
            );
            Ok(res)
        }
        Err(err) => {
            trace!(target: "cb-xdr", offset = decoder.position(), "compound res decode aborted");
            Err(err)
        }
    }
}

/// Encode request ke encoder. Jika gagal, encoder di-rollback ke posisi awal.
///
/// Returns jumlah bytes yang ditulis.
pub fn encode_compound_args(args: &CompoundArgs, enc: &mut XdrEncoder) -> Result<usize> {
    encode_rollback(args, enc, "compound args")
}

/// Encode response ke encoder, dengan rollback yang sama
pub fn encode_compound_res(res: &CompoundRes, enc: &mut XdrEncoder) -> Result<usize> {
    encode_rollback(res, enc, "compound res")
}

fn encode_rollback<T: XdrEncode>(
    value: &T,
    enc: &mut XdrEncoder,
    what: &'static str,
) -> Result<usize> {
    let start = enc.position();
    match value.encode(enc) {
        Ok(()) => Ok(enc.position() - start),
        Err(err) => {
            trace!(target: "cb-xdr", what, rolled_back_to = start, "encoder rolled back");
            enc.truncate(start);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::ops::{ReferringCall, ReferringCallList, SequenceResOk, TargetSlotArgs};
    use crate::protocol::types::SessionId;

    #[test]
    fn test_getattr_compound_bytes() {
        let mut args = CompoundArgs::new(b"abc", 1).unwrap();
        args.push(ArgOp::GetAttr(TargetSlotArgs::new(5))).unwrap();

        let mut encoder = XdrEncoder::new(256);
        let written = encode_compound_args(&args, &mut encoder).unwrap();

        #[rustfmt::skip]
        let expected: &[u8] = &[
            0, 0, 0, 3, b'a', b'b', b'c', 0, // tag + 1 pad
            0, 0, 0, 1,                      // minorversion
            0, 0, 0, 0,                      // callback_ident
            0, 0, 0, 1,                      // argarray count
            0, 0, 0, 3,                      // OP_CB_GETATTR
            0, 0, 0, 5,                      // target_highest_slotid
        ];
        assert_eq!(encoder.as_bytes(), expected);
        assert_eq!(written, expected.len());

        let decoded = decode_compound_args(encoder.as_bytes()).unwrap();
        assert_eq!(decoded.tag.as_bytes(), b"abc");
        assert_eq!(decoded.argarray.len(), 1);
        assert_eq!(decoded.argarray[0].opcode(), OpCode::GetAttr);
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_unknown_opcode_fails_whole_compound() {
        let mut encoder = XdrEncoder::new(256);
        let mut args = CompoundArgs::new(b"t", 1).unwrap();
        args.push(ArgOp::Notify(TargetSlotArgs::new(1))).unwrap();
        args.push(ArgOp::Notify(TargetSlotArgs::new(2))).unwrap();
        encode_compound_args(&args, &mut encoder).unwrap();

        // Ganti opcode elemen kedua dengan nilai yang tidak ada di tabel
        let mut bytes = encoder.as_bytes().to_vec();
        let second_opcode = bytes.len() - 8;
        bytes[second_opcode..second_opcode + 4].copy_from_slice(&99u32.to_be_bytes());

        let err = decode_compound_args(&bytes).unwrap_err();
        assert_eq!(
            err,
            XdrError::UnknownDiscriminant {
                what: "argop opcode",
                value: 99
            }
        );
    }

    #[test]
    fn test_illegal_is_void() {
        let mut args = CompoundArgs::new(b"", 1).unwrap();
        args.push(ArgOp::Illegal).unwrap();

        let mut encoder = XdrEncoder::new(64);
        encode_compound_args(&args, &mut encoder).unwrap();
        // tag len, minor, ident, count, opcode
        assert_eq!(encoder.as_bytes().len(), 20);
        assert_eq!(decode_compound_args(encoder.as_bytes()).unwrap(), args);
    }

    #[test]
    fn test_push_respects_max_operations() {
        let mut args = CompoundArgs::new(b"full", 1).unwrap();
        for i in 0..MAX_OPERATIONS {
            args.push(ArgOp::RecallSlot(TargetSlotArgs::new(i as u32)))
                .unwrap();
        }
        let err = args.push(ArgOp::Illegal).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bound);
    }

    #[test]
    fn test_operation_count_bound_on_decode() {
        let mut encoder = XdrEncoder::new(64);
        CompoundTag::new(b"x").unwrap().encode(&mut encoder).unwrap();
        encoder.put_u32(1).unwrap();
        encoder.put_u32(0).unwrap();
        encoder.put_u32((MAX_OPERATIONS + 1) as u32).unwrap();

        assert_eq!(
            decode_compound_args(encoder.as_bytes()),
            Err(XdrError::BoundExceeded {
                what: "argarray",
                len: MAX_OPERATIONS + 1,
                max: MAX_OPERATIONS
            })
        );
    }

    #[test]
    fn test_res_roundtrip_with_sequence() {
        let res = CompoundRes {
            status: Status::OK,
            tag: CompoundTag::new(b"reply").unwrap(),
            resarray: vec![
                ResOp::Sequence(SequenceRes::Ok(SequenceResOk {
                    sessionid: SessionId([0xC4; 16]),
                    sequenceid: 2,
                    slotid: 0,
                    highest_slotid: 0,
                    target_highest_slotid: 0,
                })),
                ResOp::Recall(Status::OK),
                ResOp::LayoutRecall(Status::NOMATCHING_LAYOUT),
            ],
        };

        let mut encoder = XdrEncoder::new(512);
        encode_compound_res(&res, &mut encoder).unwrap();
        let decoded = decode_compound_res(encoder.as_bytes()).unwrap();
        assert_eq!(decoded, res);
        assert_eq!(decoded.resarray[2].status(), Some(Status::NOMATCHING_LAYOUT));
    }

    #[test]
    fn test_encode_failure_rolls_back() {
        let mut args = CompoundArgs::new(b"rollback", 1).unwrap();
        args.push(ArgOp::Sequence(SequenceArgs::default())).unwrap();

        let mut encoder = XdrEncoder::new(40);
        encoder.put_u32(0xFEED).unwrap();
        let err = encode_compound_args(&args, &mut encoder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(encoder.as_bytes(), &[0, 0, 0xFE, 0xED]);
    }

    #[test]
    fn test_reply_to_copies_tag() {
        let args = CompoundArgs::new(b"cb-tag", 1).unwrap();
        let res = CompoundRes::reply_to(&args, Status::OK);
        assert_eq!(res.tag, args.tag);
        assert!(res.resarray.is_empty());
    }

    #[test]
    fn test_nested_failure_logged_once() {
        let mut args = CompoundArgs::new(b"nested", 1).unwrap();
        args.push(ArgOp::Sequence(SequenceArgs {
            ref_lists: vec![ReferringCallList {
                sessionid: SessionId([9; 16]),
                calls: vec![ReferringCall::default()],
            }],
            ..Default::default()
        }))
        .unwrap();
        let mut encoder = XdrEncoder::new(256);
        encode_compound_args(&args, &mut encoder).unwrap();

        // Potong di tengah sequenceid dari referring call terakhir
        let bytes = encoder.as_bytes();
        let cut = &bytes[..bytes.len() - 6];

        let logs = crate::error::field_logs(|| {
            assert!(decode_compound_args(cut).is_err());
        });
        assert_eq!(logs.len(), 1, "{logs:?}");
        assert!(logs[0].contains("sequence_ref.sequenceid"));
    }

    #[test]
    fn test_operation_count_failure_names_array() {
        let mut encoder = XdrEncoder::new(64);
        CompoundTag::new(b"x").unwrap().encode(&mut encoder).unwrap();
        encoder.put_u32(1).unwrap();
        encoder.put_u32(0).unwrap();
        encoder.put_u32((MAX_OPERATIONS + 1) as u32).unwrap();

        let logs = crate::error::field_logs(|| {
            assert!(decode_compound_args(encoder.as_bytes()).is_err());
        });
        assert_eq!(logs.len(), 1, "{logs:?}");
        assert!(logs[0].contains("argarray"));
    }
}
