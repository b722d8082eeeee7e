//! Backend encoders for trace-generation tools.
//!
//! A thin inverse of the decoder: emits the exact on-disk layout the
//! library reads back, field by field, little-endian.

use std::io::Write;

use byteorder::{WriteBytesExt, LE};

use crate::error::{Error, Result};
use crate::header::{Header, BENCHMARK_NAME_LENGTH, NT_MAGIC};
use crate::packet::Packet;

/// Encode a trace header: fixed prelude, notes blob, region table.
pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> Result<()> {
    // The name field keeps a trailing NUL.
    if header.benchmark_name.len() >= BENCHMARK_NAME_LENGTH {
        return Err(Error::BenchmarkNameTooLong {
            name: header.benchmark_name.clone(),
            limit: BENCHMARK_NAME_LENGTH,
        });
    }

    writer.write_u32::<LE>(NT_MAGIC)?;
    writer.write_f32::<LE>(header.version)?;
    let mut name = [0u8; BENCHMARK_NAME_LENGTH];
    name[..header.benchmark_name.len()].copy_from_slice(header.benchmark_name.as_bytes());
    writer.write_all(&name)?;
    writer.write_u8(header.num_nodes)?;
    writer.write_u8(0)?;
    writer.write_u64::<LE>(header.num_cycles)?;
    writer.write_u64::<LE>(header.num_packets)?;
    writer.write_u32::<LE>(header.notes_length())?;
    writer.write_u32::<LE>(header.regions.len() as u32)?;
    writer.write_all(&[0u8; 8])?;

    if let Some(notes) = &header.notes {
        writer.write_all(notes.as_bytes())?;
        writer.write_u8(0)?;
    }

    for region in &header.regions {
        writer.write_u64::<LE>(region.seek_offset)?;
        writer.write_u64::<LE>(region.num_cycles)?;
        writer.write_u64::<LE>(region.num_packets)?;
    }

    Ok(())
}

/// Encode one packet record followed by its dependency array.
pub fn write_packet<W: Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    writer.write_u64::<LE>(packet.cycle)?;
    writer.write_u32::<LE>(packet.id)?;
    writer.write_u32::<LE>(packet.addr)?;
    writer.write_u8(packet.kind)?;
    writer.write_u8(packet.src)?;
    writer.write_u8(packet.dst)?;
    writer.write_u8(packet.node_types)?;
    writer.write_u8(packet.num_deps())?;
    for dep in &packet.deps {
        writer.write_u32::<LE>(*dep)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_name_must_fit_with_its_nul() {
        let header = Header {
            version: 1.0,
            benchmark_name: "x".repeat(BENCHMARK_NAME_LENGTH),
            num_nodes: 1,
            num_cycles: 0,
            num_packets: 0,
            notes: None,
            regions: vec![],
        };
        match write_header(&mut Vec::new(), &header) {
            Err(Error::BenchmarkNameTooLong { limit, .. }) => {
                assert_eq!(limit, BENCHMARK_NAME_LENGTH)
            }
            other => panic!("expected name error, got {:?}", other),
        }

        let mut header = header;
        header.benchmark_name = "x".repeat(BENCHMARK_NAME_LENGTH - 1);
        write_header(&mut Vec::new(), &header).unwrap();
    }
}
