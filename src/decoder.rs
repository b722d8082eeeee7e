//! Wire-level decoding of trace headers and packet records.
//!
//! Every multi-byte field is read with an explicit width and
//! endianness; the on-disk format is little-endian with 1-byte
//! alignment and no implicit padding.

use std::io::{self, ErrorKind, Read};

use byteorder::{ByteOrder, LE};

use crate::error::{Error, Result};
use crate::header::{
    Header, Region, BENCHMARK_NAME_LENGTH, FIXED_HEADER_SIZE, MAX_NOTES_LENGTH, MAX_REGIONS,
    NT_MAGIC, REGION_SIZE,
};
use crate::packet::Packet;

/// Bytes of one packed packet record, before its dependency array.
pub(crate) const PACKET_RECORD_SIZE: usize = 21;

/// Bytes of one dependency array entry.
pub(crate) const DEPENDENCY_SIZE: usize = 4;

// Adapted from std::io::Read::read_exact: fill as much of `buf` as the
// stream can provide, retrying on interruption, and report how far we
// got instead of erroring at end of stream.
fn read_up_to<R: Read>(reader: &mut R, mut buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while !buf.is_empty() {
        match reader.read(buf) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                let tmp = buf;
                buf = &mut tmp[n..];
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Fill `buf` exactly; a stream that ends part-way is a torn record.
fn read_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    if read_up_to(reader, buf)? < buf.len() {
        return Err(Error::EofDuringRecord);
    }
    Ok(())
}

/// Probe the host byte order by building an integer from the byte
/// values `{1, 2, 3, 4}` and reading them back.
pub(crate) fn host_is_little_endian() -> bool {
    let mut probe: u32 = 0;
    for i in 0..4 {
        probe |= (i as u32 + 1) << (8 * i);
    }
    probe.to_ne_bytes() == [1, 2, 3, 4]
}

/// Interpret a NUL-padded fixed-width field or a NUL-terminated blob.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Decode the header at the start of a trace stream: the fixed
/// prelude, the notes blob, and the region index.
pub(crate) fn decode_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut fixed = [0u8; FIXED_HEADER_SIZE as usize];
    read_record(reader, &mut fixed)?;

    let magic = LE::read_u32(&fixed[0..4]);
    if magic != NT_MAGIC {
        if !host_is_little_endian() {
            return Err(Error::UnsupportedArch);
        }
        return Err(Error::BadMagic { magic });
    }
    let version = LE::read_f32(&fixed[4..8]);
    if version != 1.0 {
        return Err(Error::UnsupportedVersion { version });
    }

    let benchmark_name = c_string(&fixed[8..8 + BENCHMARK_NAME_LENGTH]);
    let num_nodes = fixed[38];
    // fixed[39] is padding
    let num_cycles = LE::read_u64(&fixed[40..48]);
    let num_packets = LE::read_u64(&fixed[48..56]);
    let notes_length = LE::read_u32(&fixed[56..60]);
    let num_regions = LE::read_u32(&fixed[60..64]);
    // fixed[64..72] is padding

    if notes_length >= MAX_NOTES_LENGTH {
        return Err(Error::OversizedNotes {
            length: notes_length,
        });
    }
    let notes = if notes_length > 0 {
        let mut blob = vec![0u8; notes_length as usize];
        read_record(reader, &mut blob)?;
        Some(c_string(&blob))
    } else {
        None
    };

    if num_regions > MAX_REGIONS {
        return Err(Error::OversizedRegionTable { count: num_regions });
    }
    let mut regions = Vec::with_capacity(num_regions as usize);
    let mut record = [0u8; REGION_SIZE as usize];
    for _ in 0..num_regions {
        read_record(reader, &mut record)?;
        regions.push(Region {
            seek_offset: LE::read_u64(&record[0..8]),
            num_cycles: LE::read_u64(&record[8..16]),
            num_packets: LE::read_u64(&record[16..24]),
        });
    }

    Ok(Header {
        version,
        benchmark_name,
        num_nodes,
        num_cycles,
        num_packets,
        notes,
        regions,
    })
}

/// Decode the next packet record, or `None` on a clean end of stream.
/// A stream that ends inside the record or its dependency array is a
/// torn trace.
pub(crate) fn decode_packet<R: Read>(reader: &mut R) -> Result<Option<Packet>> {
    let mut record = [0u8; PACKET_RECORD_SIZE];
    let n = read_up_to(reader, &mut record)?;
    if n == 0 {
        return Ok(None);
    }
    if n < PACKET_RECORD_SIZE {
        return Err(Error::EofDuringRecord);
    }

    let num_deps = record[20] as usize;
    let mut deps = Vec::with_capacity(num_deps);
    if num_deps > 0 {
        let mut blob = vec![0u8; num_deps * DEPENDENCY_SIZE];
        read_record(reader, &mut blob)?;
        for entry in blob.chunks_exact(DEPENDENCY_SIZE) {
            deps.push(LE::read_u32(entry));
        }
    }

    Ok(Some(Packet {
        cycle: LE::read_u64(&record[0..8]),
        id: LE::read_u32(&record[8..12]),
        addr: LE::read_u32(&record[12..16]),
        kind: record[16],
        src: record[17],
        dst: record[18],
        node_types: record[19],
        deps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;
    use std::io::Cursor;

    fn unit_header() -> Header {
        Header {
            version: 1.0,
            benchmark_name: "unit".into(),
            num_nodes: 4,
            num_cycles: 100,
            num_packets: 1,
            notes: Some("synthetic".into()),
            regions: vec![Region {
                seek_offset: 0,
                num_cycles: 100,
                num_packets: 1,
            }],
        }
    }

    #[test]
    fn header_round_trip() {
        let header = unit_header();
        let mut encoded = Vec::new();
        writer::write_header(&mut encoded, &header).unwrap();
        assert_eq!(encoded.len() as u64, header.size_on_disk());

        let decoded = decode_header(&mut Cursor::new(&encoded)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_bad_magic() {
        let mut encoded = Vec::new();
        writer::write_header(&mut encoded, &unit_header()).unwrap();
        encoded[0] ^= 0xFF;

        match decode_header(&mut Cursor::new(&encoded)) {
            Err(Error::BadMagic { .. }) | Err(Error::UnsupportedArch) => {}
            other => panic!("expected bad magic, got {:?}", other),
        }
    }

    #[test]
    fn header_unsupported_version() {
        let mut encoded = Vec::new();
        writer::write_header(&mut encoded, &unit_header()).unwrap();
        LE::write_f32(&mut encoded[4..8], 2.0);

        match decode_header(&mut Cursor::new(&encoded)) {
            Err(Error::UnsupportedVersion { version }) => assert_eq!(version, 2.0),
            other => panic!("expected version error, got {:?}", other),
        }
    }

    #[test]
    fn header_oversized_notes_rejected() {
        let mut encoded = Vec::new();
        writer::write_header(&mut encoded, &unit_header()).unwrap();
        LE::write_u32(&mut encoded[56..60], 8192);

        match decode_header(&mut Cursor::new(&encoded)) {
            Err(Error::OversizedNotes { length: 8192 }) => {}
            other => panic!("expected notes error, got {:?}", other),
        }
    }

    #[test]
    fn header_oversized_region_table_rejected() {
        let mut encoded = Vec::new();
        writer::write_header(&mut encoded, &unit_header()).unwrap();
        LE::write_u32(&mut encoded[60..64], 101);

        match decode_header(&mut Cursor::new(&encoded)) {
            Err(Error::OversizedRegionTable { count: 101 }) => {}
            other => panic!("expected region table error, got {:?}", other),
        }
    }

    #[test]
    fn header_torn_region_table() {
        let mut encoded = Vec::new();
        writer::write_header(&mut encoded, &unit_header()).unwrap();
        encoded.truncate(encoded.len() - 5);

        match decode_header(&mut Cursor::new(&encoded)) {
            Err(Error::EofDuringRecord) => {}
            other => panic!("expected torn record, got {:?}", other),
        }
    }

    #[test]
    fn packet_without_dependents_reads_no_extra_bytes() {
        let packet = Packet {
            cycle: 10,
            id: 7,
            addr: 0,
            kind: 1,
            src: 0,
            dst: 1,
            node_types: 0x02,
            deps: vec![],
        };
        let mut encoded = Vec::new();
        writer::write_packet(&mut encoded, &packet).unwrap();
        assert_eq!(encoded.len(), PACKET_RECORD_SIZE);

        let mut cursor = Cursor::new(&encoded);
        assert_eq!(decode_packet(&mut cursor).unwrap().unwrap(), packet);
        assert_eq!(decode_packet(&mut cursor).unwrap(), None);
    }

    #[test]
    fn packet_dependency_array_round_trips() {
        let packet = Packet {
            cycle: 42,
            id: 1,
            addr: 0x8000_0000,
            kind: 2,
            src: 3,
            dst: 0,
            node_types: 0x23,
            deps: vec![2, 3, 0xFFFF_FFFF],
        };
        let mut encoded = Vec::new();
        writer::write_packet(&mut encoded, &packet).unwrap();
        assert_eq!(encoded.len(), PACKET_RECORD_SIZE + 3 * DEPENDENCY_SIZE);

        let decoded = decode_packet(&mut Cursor::new(&encoded)).unwrap().unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn clean_eof_yields_none() {
        let mut cursor = Cursor::new(&[][..]);
        assert_eq!(decode_packet(&mut cursor).unwrap(), None);
    }

    #[test]
    fn torn_packet_record_is_an_error() {
        let mut encoded = Vec::new();
        writer::write_packet(
            &mut encoded,
            &Packet {
                cycle: 1,
                id: 1,
                addr: 0,
                kind: 1,
                src: 0,
                dst: 1,
                node_types: 0,
                deps: vec![],
            },
        )
        .unwrap();
        encoded.truncate(PACKET_RECORD_SIZE - 1);

        match decode_packet(&mut Cursor::new(&encoded)) {
            Err(Error::EofDuringRecord) => {}
            other => panic!("expected torn record, got {:?}", other),
        }
    }

    #[test]
    fn torn_dependency_array_is_an_error() {
        let mut encoded = Vec::new();
        writer::write_packet(
            &mut encoded,
            &Packet {
                cycle: 1,
                id: 1,
                addr: 0,
                kind: 1,
                src: 0,
                dst: 1,
                node_types: 0,
                deps: vec![9, 10],
            },
        )
        .unwrap();
        encoded.truncate(PACKET_RECORD_SIZE + DEPENDENCY_SIZE + 1);

        match decode_packet(&mut Cursor::new(&encoded)) {
            Err(Error::EofDuringRecord) => {}
            other => panic!("expected torn record, got {:?}", other),
        }
    }

    #[test]
    fn little_endian_probe_matches_target() {
        assert_eq!(host_is_little_endian(), cfg!(target_endian = "little"));
    }
}
