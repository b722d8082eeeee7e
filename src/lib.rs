//! # `netrace`
//!
//! A decoder and dependency-aware replay library for the netrace
//! network-on-chip trace format: a bzip2-compressed binary recording of
//! the packet-level memory traffic of a simulated multicore, annotated
//! with program-order dependencies between packets.
//!
//! Common abbreviations:
//!
//! - NoC: network-on-chip;
//! - MC: memory controller;
//! - L1D/L1I/L2: levels of the simulated cache hierarchy;
//!
//! The central type is [`Context`], one per open trace. It decodes the
//! trace header, then hands out packets in trace order while tracking
//! which packets are still blocked on unresolved predecessors. A packet
//! may be injected into the consumer's network model once
//! [`Context::dependencies_cleared`] reports true for it, and is retired
//! with [`Context::clear_packet`], which unblocks its dependents.
//!
//! Usage is simple:
//! ```no_run
//! use netrace::Context;
//!
//! let mut ctx = Context::new();
//! ctx.open("blackscholes_64c_simsmall.tr.bz2")?;
//! while let Some(packet) = ctx.read_packet()? {
//!     if ctx.dependencies_cleared(&packet)? {
//!         // inject, simulate, then eventually:
//!         ctx.clear_packet(packet)?;
//!     }
//! }
//! # Ok::<(), netrace::Error>(())
//! ```
//!
//! With [`Context::enable_self_throttling`] the library instead keeps a
//! queue of injectable packets filled by reading ahead in simulated
//! cycles; drain it with [`Context::take_cleared_packets`].
//!
//! Multiple contexts may be open in one process; each is single-threaded
//! and two threads must never drive the same context concurrently.

mod context;
mod decoder;
mod error;
mod header;
mod packet;
mod registry;
mod source;
pub mod writer;

pub use context::Context;
pub use error::{Error, Result};
pub use header::{Header, Region, MAX_NOTES_LENGTH, MAX_REGIONS, NT_MAGIC};
pub use packet::{
    NodeClass, Packet, NODE_CLASS_NAMES, NUM_PACKET_KINDS, PACKET_KIND_NAMES, PACKET_KIND_SIZES,
};

/// Cycles read ahead of the newest retired packet when self-throttling.
pub const READ_AHEAD_CYCLES: u64 = 1_000_000;
