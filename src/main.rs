//! cbdump - inspeksi capture traffic NFSv4.1 callback
//!
//! Usage:
//!   cbdump dump <CAPTURE> [--stop-on-error]
//!   cbdump sample <OUTPUT>
//!
//! Log level diatur lewat RUST_LOG; `--verbose` menaikkan default ke DEBUG.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cbwire::core::{CaptureFile, CaptureWriter, Direction};
use cbwire::protocol::{
    decode_compound_args, decode_compound_res, encode_compound_args, encode_compound_res, ArgOp,
    CompoundArgs, CompoundRes, FileHandle, Fsid, LayoutIoMode, LayoutRecall, LayoutRecallArgs,
    LayoutRecallFile, RecallArgs, ReferringCall, ReferringCallList, ResOp, SequenceArgs,
    SequenceRes, SequenceResOk, SessionId, StateId, Status, TargetSlotArgs, XdrEncoder,
};

#[derive(Parser, Debug)]
#[command(name = "cbdump", version, about = "Decode NFSv4.1 CB_COMPOUND capture files")]
struct Cli {
    /// Log decode failures per field (DEBUG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode every record of a capture file
    Dump(DumpArgs),
    /// Write a small capture with representative callback traffic
    Sample(SampleArgs),
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Capture file path
    capture: PathBuf,

    /// Stop at the first record that fails to decode
    #[arg(long)]
    stop_on_error: bool,
}

#[derive(Args, Debug)]
struct SampleArgs {
    /// Output path
    output: PathBuf,
}

/// Statistik dump
#[derive(Debug, Default)]
struct DumpStats {
    calls: usize,
    replies: usize,
    operations: usize,
    failures: usize,
}

impl DumpStats {
    fn print_stats(&self) {
        println!("\n📊 Capture Stats");
        println!("   Calls:       {}", self.calls);
        println!("   Replies:     {}", self.replies);
        println!("   Operations:  {}", self.operations);
        if self.failures > 0 {
            println!("   Failures:    {} ⚠️", self.failures);
        }
    }
}

fn describe_arg(op: &ArgOp) -> String {
    match op {
        ArgOp::Sequence(args) => format!(
            "seqid={} slot={} highest={} cachethis={} ref_lists={}",
            args.sequenceid,
            args.slotid,
            args.highest_slotid,
            args.cachethis,
            args.ref_lists.len()
        ),
        ArgOp::Recall(args) => format!(
            "stateid.seqid={} truncate={} fh_len={}",
            args.stateid.seqid,
            args.truncate,
            args.fh.len()
        ),
        ArgOp::LayoutRecall(args) => match &args.recall {
            LayoutRecall::File(file) => format!(
                "iomode={:?} changed={} file offset={} length={}",
                args.iomode, args.changed, file.offset, file.length
            ),
            LayoutRecall::Fsid(fsid) => format!(
                "iomode={:?} changed={} fsid={}:{}",
                args.iomode, args.changed, fsid.major, fsid.minor
            ),
            LayoutRecall::All => format!("iomode={:?} changed={} all", args.iomode, args.changed),
        },
        ArgOp::GetAttr(args)
        | ArgOp::Notify(args)
        | ArgOp::PushDeleg(args)
        | ArgOp::RecallAny(args)
        | ArgOp::RecallableObjAvail(args)
        | ArgOp::RecallSlot(args)
        | ArgOp::WantsCancelled(args)
        | ArgOp::NotifyLock(args)
        | ArgOp::NotifyDeviceId(args) => {
            format!("target_highest_slotid={}", args.target_highest_slotid)
        }
        ArgOp::Illegal => String::new(),
    }
}

fn describe_res(op: &ResOp) -> String {
    match op {
        ResOp::Sequence(SequenceRes::Ok(ok)) => format!(
            "NFS4_OK seqid={} slot={} highest={} target={}",
            ok.sequenceid, ok.slotid, ok.highest_slotid, ok.target_highest_slotid
        ),
        other => other
            .status()
            .map(|status| status.to_string())
            .unwrap_or_default(),
    }
}

fn cmd_dump(args: &DumpArgs) -> Result<DumpStats> {
    let capture = CaptureFile::open(&args.capture)
        .with_context(|| format!("opening capture {}", args.capture.display()))?;
    info!(target: "cbdump", path = %args.capture.display(), record_bytes = capture.len(), "capture opened");

    let mut stats = DumpStats::default();

    for record in capture.records() {
        let record = record.context("reading capture record")?;

        let decoded = match record.direction {
            Direction::Call => decode_compound_args(record.body).map(|call| {
                stats.calls += 1;
                stats.operations += call.argarray.len();
                println!(
                    "#{:<4} CALL  tag={:?} minor={} ops={}",
                    record.index,
                    call.tag.to_string_lossy(),
                    call.minorversion,
                    call.argarray.len()
                );
                for op in &call.argarray {
                    println!("        {:<24} {}", op.opcode(), describe_arg(op));
                }
            }),
            Direction::Reply => decode_compound_res(record.body).map(|reply| {
                stats.replies += 1;
                stats.operations += reply.resarray.len();
                println!(
                    "#{:<4} REPLY status={} tag={:?} ops={}",
                    record.index,
                    reply.status,
                    reply.tag.to_string_lossy(),
                    reply.resarray.len()
                );
                for op in &reply.resarray {
                    println!("        {:<24} {}", op.opcode(), describe_res(op));
                }
            }),
        };

        if let Err(err) = decoded {
            stats.failures += 1;
            warn!(target: "cbdump", record = record.index, direction = ?record.direction, error = %err, "record failed to decode");
            if args.stop_on_error {
                anyhow::bail!("record #{} failed to decode: {err}", record.index);
            }
        }
    }

    Ok(stats)
}

fn sample_traffic() -> Result<Vec<(CompoundArgs, CompoundRes)>> {
    let session = SessionId(*b"cbwire-session-1");
    let stateid = StateId {
        seqid: 1,
        other: *b"deleg-000001",
    };

    let sequence = |sequenceid: u32, ref_lists: Vec<ReferringCallList>| {
        ArgOp::Sequence(SequenceArgs {
            sessionid: session,
            sequenceid,
            slotid: 0,
            highest_slotid: 0,
            cachethis: false,
            ref_lists,
        })
    };
    let sequence_ok = |sequenceid: u32| {
        ResOp::Sequence(SequenceRes::Ok(SequenceResOk {
            sessionid: session,
            sequenceid,
            slotid: 0,
            highest_slotid: 0,
            target_highest_slotid: 0,
        }))
    };

    let mut recall = CompoundArgs::new(b"recall", 1)?;
    recall.push(sequence(1, Vec::new()))?;
    recall.push(ArgOp::Recall(RecallArgs {
        stateid,
        truncate: false,
        fh: FileHandle::new(&[0x01, 0x00, 0x00, 0x2A, 0xBE, 0xEF])?,
    }))?;
    let mut recall_reply = CompoundRes::reply_to(&recall, Status::OK);
    recall_reply.resarray.push(sequence_ok(1));
    recall_reply.resarray.push(ResOp::Recall(Status::OK));

    let mut layout = CompoundArgs::new(b"layoutrecall", 1)?;
    layout.push(sequence(
        2,
        vec![ReferringCallList {
            sessionid: session,
            calls: vec![ReferringCall {
                sequenceid: 1,
                slotid: 0,
            }],
        }],
    ))?;
    layout.push(ArgOp::LayoutRecall(LayoutRecallArgs {
        layout_type: 1,
        iomode: LayoutIoMode::ReadWrite,
        changed: true,
        recall: LayoutRecall::File(LayoutRecallFile {
            fh: FileHandle::new(&[0x01, 0x00, 0x00, 0x2A, 0xBE, 0xEF])?,
            offset: 0,
            length: u64::MAX,
            stateid,
        }),
    }))?;
    layout.push(ArgOp::LayoutRecall(LayoutRecallArgs {
        layout_type: 1,
        iomode: LayoutIoMode::Any,
        changed: false,
        recall: LayoutRecall::Fsid(Fsid { major: 7, minor: 0 }),
    }))?;
    let mut layout_reply = CompoundRes::reply_to(&layout, Status::NOMATCHING_LAYOUT);
    layout_reply.resarray.push(sequence_ok(2));
    layout_reply.resarray.push(ResOp::LayoutRecall(Status::OK));
    layout_reply
        .resarray
        .push(ResOp::LayoutRecall(Status::NOMATCHING_LAYOUT));

    let mut misordered = CompoundArgs::new(b"getattr", 1)?;
    misordered.push(sequence(9, Vec::new()))?;
    misordered.push(ArgOp::GetAttr(TargetSlotArgs::new(0)))?;
    let mut misordered_reply = CompoundRes::reply_to(&misordered, Status::SEQ_MISORDERED);
    misordered_reply
        .resarray
        .push(ResOp::Sequence(SequenceRes::Err(Status::SEQ_MISORDERED)));

    Ok(vec![
        (recall, recall_reply),
        (layout, layout_reply),
        (misordered, misordered_reply),
    ])
}

fn cmd_sample(args: &SampleArgs) -> Result<()> {
    let mut writer = CaptureWriter::create(&args.output)
        .with_context(|| format!("creating capture {}", args.output.display()))?;
    let mut encoder = XdrEncoder::new(64 * 1024);

    for (call, reply) in sample_traffic()? {
        encoder.reset();
        encode_compound_args(&call, &mut encoder)?;
        writer.append(Direction::Call, encoder.as_bytes())?;

        encoder.reset();
        encode_compound_res(&reply, &mut encoder)?;
        writer.append(Direction::Reply, encoder.as_bytes())?;
    }

    let records = writer.finish()?;
    info!(target: "cbdump", path = %args.output.display(), records, "sample capture written");
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .init();

    let result = match &cli.cmd {
        Commands::Dump(args) => cmd_dump(args).map(|stats| stats.print_stats()),
        Commands::Sample(args) => cmd_sample(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
