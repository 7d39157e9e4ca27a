//! Capture replay test
//!
//! Rekam traffic callback ke capture file, buka lagi via mmap, lalu
//! decode setiap record dengan compound codec.

use cbwire::core::{CaptureFile, CaptureWriter, Direction, ReplyStore};
use cbwire::protocol::{
    decode_compound_args, encode_compound_args, encode_compound_res, ArgOp, CompoundArgs,
    CompoundRes, OpCode, ResOp, SequenceRes, Status, TargetSlotArgs, XdrEncoder,
};

fn call(tag: &[u8], slots: &[u32]) -> CompoundArgs {
    let mut args = CompoundArgs::new(tag, 1).unwrap();
    for slot in slots {
        args.push(ArgOp::RecallSlot(TargetSlotArgs::new(*slot)))
            .unwrap();
    }
    args
}

#[test]
fn test_replay_calls_and_replies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traffic.cbcap");

    let calls = [call(b"first", &[1]), call(b"second", &[2, 3])];
    let mut encoder = XdrEncoder::new(4096);
    let mut writer = CaptureWriter::create(&path).unwrap();

    for args in &calls {
        encoder.reset();
        encode_compound_args(args, &mut encoder).unwrap();
        writer.append(Direction::Call, encoder.as_bytes()).unwrap();

        let mut reply = CompoundRes::reply_to(args, Status::OK);
        for _ in &args.argarray {
            reply.resarray.push(ResOp::RecallSlot(Status::OK));
        }
        encoder.reset();
        encode_compound_res(&reply, &mut encoder).unwrap();
        writer.append(Direction::Reply, encoder.as_bytes()).unwrap();
    }
    assert_eq!(writer.records(), 4);
    writer.finish().unwrap();

    let capture = CaptureFile::open(&path).unwrap();
    let mut store = ReplyStore::new();
    let mut decoded_calls = Vec::new();

    for record in capture.records() {
        let record = record.unwrap();
        match record.direction {
            Direction::Call => decoded_calls.push(decode_compound_args(record.body).unwrap()),
            Direction::Reply => {
                store.decode(record.body).unwrap();
            }
        }
    }

    assert_eq!(decoded_calls, calls);
    assert_eq!(store.live(), 2);

    let tags: Vec<Vec<u8>> = store
        .iter()
        .map(|(_, reply)| reply.tag.as_bytes().to_vec())
        .collect();
    assert_eq!(tags, vec![b"first".to_vec(), b"second".to_vec()]);
    for (_, reply) in store.iter() {
        assert!(reply
            .resarray
            .iter()
            .all(|op| op.opcode() == OpCode::RecallSlot));
    }
}

#[test]
fn test_corrupt_body_reported_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.cbcap");

    let mut writer = CaptureWriter::create(&path).unwrap();
    // Opcode 2 tidak ada di tabel callback
    let body: Vec<u8> = [0u32, 1, 0, 1, 2, 0]
        .iter()
        .flat_map(|word| word.to_be_bytes())
        .collect();
    writer.append(Direction::Call, &body).unwrap();

    let mut reply = CompoundRes::default();
    reply
        .resarray
        .push(ResOp::Sequence(SequenceRes::Err(Status::BADSLOT)));
    let mut encoder = XdrEncoder::new(256);
    encode_compound_res(&reply, &mut encoder).unwrap();
    writer.append(Direction::Reply, encoder.as_bytes()).unwrap();
    writer.finish().unwrap();

    let capture = CaptureFile::open(&path).unwrap();
    let records: Vec<_> = capture.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 2);

    assert!(decode_compound_args(records[0].body).is_err());

    let mut store = ReplyStore::new();
    let handle = store.decode(records[1].body).unwrap();
    assert_eq!(
        store.get(handle).unwrap().resarray[0].status(),
        Some(Status::BADSLOT)
    );
}
