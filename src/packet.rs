//! Trace packets and their classification tables.

use std::fmt;

/// Entries in the packet kind tables; kinds at or past this index fall
/// back to index 0 (`InvalidCmd`).
pub const NUM_PACKET_KINDS: usize = 31;

/// Display names of the memory-system commands a packet can carry.
pub const PACKET_KIND_NAMES: [&str; NUM_PACKET_KINDS] = [
    "InvalidCmd",
    "ReadReq",
    "ReadResp",
    "ReadRespWithInvalidate",
    "WriteReq",
    "WriteResp",
    "Writeback",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "UpgradeReq",
    "UpgradeResp",
    "ReadExReq",
    "ReadExResp",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "InvalidCmd",
    "BadAddressError",
    "InvalidCmd",
    "InvalidateReq",
    "InvalidateResp",
    "DowngradeReq",
    "DowngradeResp",
];

/// Payload sizes in bytes per packet kind; `-1` for invalid kinds.
pub const PACKET_KIND_SIZES: [i32; NUM_PACKET_KINDS] = [
    -1, 8, 72, 72, 72, 8, 72, -1, -1, -1, -1, -1, -1, 8, 8, 8, 72, -1, -1, -1, -1, -1, -1, -1, -1,
    8, -1, 8, 8, 8, 72,
];

/// Display names of the node classes; the last entry is the
/// out-of-range fallback.
pub const NODE_CLASS_NAMES: [&str; 5] = [
    "L1 Data Cache",
    "L1 Instruction Cache",
    "L2 Cache",
    "Memory Controller",
    "Invalid Node Type",
];

/// The class of a traced network endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeClass {
    L1Data,
    L1Instr,
    L2,
    MemoryController,
    /// Fallback for nibble values outside the known classes.
    Invalid,
}

impl NodeClass {
    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            0 => NodeClass::L1Data,
            1 => NodeClass::L1Instr,
            2 => NodeClass::L2,
            3 => NodeClass::MemoryController,
            _ => NodeClass::Invalid,
        }
    }

    /// Human-readable class name.
    pub fn name(self) -> &'static str {
        match self {
            NodeClass::L1Data => NODE_CLASS_NAMES[0],
            NodeClass::L1Instr => NODE_CLASS_NAMES[1],
            NodeClass::L2 => NODE_CLASS_NAMES[2],
            NodeClass::MemoryController => NODE_CLASS_NAMES[3],
            NodeClass::Invalid => NODE_CLASS_NAMES[4],
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit of traced network traffic.
///
/// `deps` holds the identifiers of the packets that depend on this one:
/// each of them may only be injected once this packet (and its other
/// predecessors) have been retired with
/// [`Context::clear_packet`](crate::Context::clear_packet).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    /// Simulated cycle at which the packet enters the network.
    pub cycle: u64,

    /// Trace-wide packet identifier.
    pub id: u32,

    /// Memory address the packet refers to.
    pub addr: u32,

    /// Command kind; an index into the packet kind tables.
    pub kind: u8,

    /// Source node number.
    pub src: u8,

    /// Destination node number.
    pub dst: u8,

    /// Source class in the high nibble, destination class in the low.
    pub node_types: u8,

    /// Identifiers of the packets that depend on this one.
    pub deps: Vec<u32>,
}

impl Packet {
    /// Number of dependents, as stored on disk.
    pub fn num_deps(&self) -> u8 {
        self.deps.len() as u8
    }

    /// Class of the source node.
    pub fn src_class(&self) -> NodeClass {
        NodeClass::from_raw(self.node_types >> 4)
    }

    /// Class of the destination node.
    pub fn dst_class(&self) -> NodeClass {
        NodeClass::from_raw(self.node_types & 0xF)
    }

    /// Display name of the packet's command kind.
    pub fn kind_name(&self) -> &'static str {
        PACKET_KIND_NAMES
            .get(self.kind as usize)
            .copied()
            .unwrap_or(PACKET_KIND_NAMES[0])
    }

    /// Payload size in bytes of the packet's command kind, `-1` when
    /// the kind is invalid.
    pub fn size_bytes(&self) -> i32 {
        PACKET_KIND_SIZES
            .get(self.kind as usize)
            .copied()
            .unwrap_or(PACKET_KIND_SIZES[0])
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID:{} CYC:{} SRC:{} DST:{} ADR:0x{:08x} TYP:{} NDEP:{}",
            self.id,
            self.cycle,
            self.src,
            self.dst,
            self.addr,
            self.kind_name(),
            self.num_deps()
        )?;
        for dep in &self.deps {
            write!(f, " {}", dep)?;
        }
        Ok(())
    }
}
