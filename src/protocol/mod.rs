//! Protocol Layer: XDR codec untuk NFSv4.1 callback
//!
//! Prinsip desain:
//! - Big-endian, 4-byte aligned (XDR)
//! - Bound divalidasi sebelum bytes berikutnya dibaca
//! - Encode tidak pernah alokasi; decode menghasilkan owned value tree
//! - Union direpresentasikan sebagai enum, discriminant hanya di wire

mod compound;
mod encoder;
mod ops;
mod types;

pub use compound::{
    decode_compound_args, decode_compound_res, encode_compound_args, encode_compound_res, ArgOp,
    CompoundArgs, CompoundRes, ResOp,
};
pub use encoder::{padded_len, XdrDecode, XdrDecoder, XdrEncode, XdrEncoder, XDR_UNIT};
pub use ops::{
    LayoutIoMode, LayoutRecall, LayoutRecallArgs, LayoutRecallFile, LayoutRecallKind,
    RecallArgs, ReferringCall, ReferringCallList, SequenceArgs, SequenceRes, SequenceResOk,
    TargetSlotArgs,
};
pub use types::{
    CompoundTag, FileHandle, Fsid, OpCode, SessionId, StateId, Status, MAX_FH_SIZE,
    MAX_OPERATIONS, MAX_REFERRING_CALLS, MAX_REFERRING_LISTS, MAX_TAG_SIZE, SESSIONID_SIZE,
    STATEID_OTHER_SIZE,
};
