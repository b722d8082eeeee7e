//! Drives the netrace-dump binary on a generated trace.

use std::env;
use std::io::Write;
use std::process::Command;

use netrace::{writer, Header, Packet, Region};

fn netrace_dump() -> Command {
    let mut me = env::current_exe().unwrap();
    me.pop();
    if me.ends_with("deps") {
        me.pop();
    }
    Command::new(me.join("netrace-dump"))
}

fn write_trace() -> tempfile::NamedTempFile {
    let header = Header {
        version: 1.0,
        benchmark_name: "smoke".into(),
        num_nodes: 2,
        num_cycles: 20,
        num_packets: 2,
        notes: Some("generated for the smoke test".into()),
        regions: vec![Region {
            seek_offset: 0,
            num_cycles: 20,
            num_packets: 2,
        }],
    };
    let packets = [
        Packet {
            cycle: 10,
            id: 1,
            addr: 0x1000,
            kind: 1,
            src: 0,
            dst: 1,
            node_types: 0x03,
            deps: vec![2],
        },
        Packet {
            cycle: 15,
            id: 2,
            addr: 0x1000,
            kind: 2,
            src: 1,
            dst: 0,
            node_types: 0x30,
            deps: vec![],
        },
    ];

    let mut file = tempfile::Builder::new()
        .prefix("netrace-smoke")
        .suffix(".tr")
        .tempfile()
        .unwrap();
    writer::write_header(&mut file, &header).unwrap();
    for p in &packets {
        writer::write_packet(&mut file, p).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn dumps_header_and_packets() {
    let trace = write_trace();
    let out = netrace_dump().arg(trace.path()).output().unwrap();

    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("Benchmark: smoke"));
    assert!(stdout.contains("Tracefile Version: v1.0"));
    assert!(stdout.contains("Notes: generated for the smoke test"));
    assert!(stdout.contains("ID:1 CYC:10 SRC:0 DST:1 ADR:0x00001000 TYP:ReadReq NDEP:1 2"));
    assert!(stdout.contains("ID:2 CYC:15 SRC:1 DST:0 ADR:0x00001000 TYP:ReadResp NDEP:0"));
}

#[test]
fn header_only_flag_skips_packets() {
    let trace = write_trace();
    let out = netrace_dump()
        .arg("--header-only")
        .arg(trace.path())
        .output()
        .unwrap();

    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("Number of Program Regions: 1"));
    assert!(!stdout.contains("ID:1"));
}
