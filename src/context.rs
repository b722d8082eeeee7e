//! The replay controller: the public surface of the library.

use std::collections::VecDeque;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::decoder;
use crate::error::{Error, Result};
use crate::header::{Header, Region};
use crate::packet::Packet;
use crate::registry::DepRegistry;
use crate::source::ByteSource;
use crate::READ_AHEAD_CYCLES;

/// A self-contained replay context for one trace file.
///
/// A fresh context holds no resources. [`Context::open`] attaches it to
/// a trace; every other operation requires an open trace and reports
/// [`Error::NotOpen`] otherwise. [`Context::close`] (or dropping the
/// context) releases the byte source, the registry and every pending
/// packet.
#[derive(Default)]
pub struct Context {
    state: Option<OpenState>,
}

struct OpenState {
    path: PathBuf,
    source: ByteSource,
    header: Header,
    registry: DepRegistry,
    cleared: VecDeque<Arc<Packet>>,
    dependencies_off: bool,
    self_throttling: bool,
    primed_self_throttle: bool,
    done_reading: bool,
    track_cleared_list: bool,
    num_active_packets: u64,
    latest_cycle: u64,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    /// Open a trace file, closing any previously open one first.
    ///
    /// Compressed traces (`.bz2`) are streamed through a `bzip2 -dc`
    /// subprocess; anything else is read as-is. The header is decoded
    /// eagerly, so a corrupt prelude fails here rather than at the
    /// first packet.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.close();
        let path = path.as_ref().to_owned();
        let mut source = ByteSource::open(&path)?;
        let header = decoder::decode_header(&mut source)?;
        debug!(
            "opened trace {} (benchmark {:?}, {} packets)",
            path.display(),
            header.benchmark_name,
            header.num_packets
        );
        self.state = Some(OpenState {
            path,
            source,
            header,
            registry: DepRegistry::new(),
            cleared: VecDeque::new(),
            dependencies_off: false,
            self_throttling: false,
            primed_self_throttle: false,
            done_reading: false,
            track_cleared_list: false,
            num_active_packets: 0,
            latest_cycle: 0,
        });
        Ok(())
    }

    /// Close the trace, terminating the decompressor and dropping the
    /// registry, the cleared list and the header. Safe to call on a
    /// never-opened context, and idempotent.
    pub fn close(&mut self) {
        self.state = None;
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// The decoded trace header.
    pub fn header(&self) -> Result<&Header> {
        Ok(&self.open_state()?.header)
    }

    /// The trace format version.
    pub fn version(&self) -> Result<f32> {
        Ok(self.open_state()?.header.version)
    }

    /// Number of packets handed out by [`Context::read_packet`] and not
    /// yet retired with [`Context::clear_packet`].
    pub fn num_active_packets(&self) -> u64 {
        self.state.as_ref().map_or(0, |st| st.num_active_packets)
    }

    /// True once the stream has reported end-of-trace to the
    /// self-throttle pump.
    pub fn done_reading(&self) -> bool {
        self.state.as_ref().map_or(false, |st| st.done_reading)
    }

    /// Stop tracking dependencies: packets are handed out without
    /// registry bookkeeping and every packet counts as cleared.
    /// Incompatible with cleared-list tracking.
    pub fn disable_dependencies(&mut self) -> Result<()> {
        let st = self.open_state_mut()?;
        if st.track_cleared_list {
            return Err(Error::TrackingEnabled);
        }
        st.dependencies_off = true;
        st.registry.clear();
        Ok(())
    }

    /// Collect packets onto the cleared list as their last predecessor
    /// retires. Requires dependency tracking.
    pub fn track_cleared_packets(&mut self) -> Result<()> {
        let st = self.open_state_mut()?;
        if st.dependencies_off {
            return Err(Error::DependenciesDisabled);
        }
        st.track_cleared_list = true;
        Ok(())
    }

    /// Enable self-throttling: the library reads ahead of the
    /// consumer's retire cycle and keeps the cleared list populated
    /// with every packet that is safe to inject. Implies cleared-list
    /// tracking.
    pub fn enable_self_throttling(&mut self) -> Result<()> {
        let st = self.open_state_mut()?;
        if st.dependencies_off {
            return Err(Error::DependenciesDisabled);
        }
        st.self_throttling = true;
        st.primed_self_throttle = false;
        st.track_cleared_list = true;
        Ok(())
    }

    /// Fast-forward to one of the header's advertised regions.
    ///
    /// The stream does not support seeking, so the byte source is torn
    /// down and re-created, then read forward to the region start. All
    /// replay state from before the seek is discarded; the caller is
    /// responsible for tracking cycle offsets across regions.
    pub fn seek_region(&mut self, region: Region) -> Result<()> {
        let st = self.open_state_mut()?;
        st.registry.clear();
        st.cleared.clear();
        st.num_active_packets = 0;
        st.done_reading = false;

        st.source = ByteSource::open(&st.path)?;
        let offset = st.header.size_on_disk() + region.seek_offset;
        st.source.skip(offset)?;
        debug!(
            "sought to region at offset {} ({} cycles, {} packets)",
            region.seek_offset, region.num_cycles, region.num_packets
        );

        if st.self_throttling {
            st.primed_self_throttle = false;
            st.prime_self_throttle()?;
        }
        Ok(())
    }

    /// [`Context::seek_region`] by index into the header's region
    /// table.
    pub fn seek_region_index(&mut self, index: usize) -> Result<()> {
        let regions = &self.open_state()?.header.regions;
        let region = *regions.get(index).ok_or(Error::InvalidRegion {
            index,
            count: regions.len(),
        })?;
        self.seek_region(region)
    }

    /// Decode the next packet in trace order, or `None` at the end of
    /// the stream. With dependencies enabled the packet is registered
    /// so its dependents stay blocked until it is retired.
    pub fn read_packet(&mut self) -> Result<Option<Arc<Packet>>> {
        self.open_state_mut()?.read_packet()
    }

    /// True when `packet` is safe to inject now: dependencies are
    /// disabled, or every predecessor has been retired.
    pub fn dependencies_cleared(&self, packet: &Packet) -> Result<bool> {
        Ok(self.open_state()?.dependencies_cleared(packet))
    }

    /// Retire a packet: unblock its dependents, drop its registry node
    /// and free it (once the caller's `Arc` goes away).
    ///
    /// Under self-throttling this also drives the read-ahead pump from
    /// the retired packet's cycle, so newly cleared packets show up on
    /// the cleared list without the consumer reading for them.
    pub fn clear_packet(&mut self, packet: Arc<Packet>) -> Result<()> {
        let st = self.open_state_mut()?;
        if st.self_throttling {
            st.read_ahead(packet.cycle)?;
        }

        for &dep in &packet.deps {
            match st.registry.find_mut(dep) {
                None => {
                    if !st.dependencies_off {
                        if cfg!(feature = "lenient") {
                            warn!(
                                "failed to find dependency node {} while retiring packet {}",
                                dep, packet.id
                            );
                        } else {
                            return Err(Error::MissingDependencyNode { id: dep });
                        }
                    }
                }
                Some(node) => {
                    if node.ref_count == 0 {
                        if cfg!(feature = "lenient") {
                            warn!("invalid reference count on dependency node {}", dep);
                            continue;
                        }
                        return Err(Error::RefCountUnderflow { id: dep });
                    }
                    node.ref_count -= 1;
                    if st.track_cleared_list && node.ref_count == 0 {
                        // A dependent can reach count zero before it has
                        // been read from the trace; only an owned packet
                        // goes onto the cleared list.
                        if let Some(owned) = &node.packet {
                            let owned = owned.clone();
                            st.cleared.push_back(owned);
                        }
                    }
                }
            }
        }

        st.registry.remove(packet.id);
        st.num_active_packets = st.num_active_packets.saturating_sub(1);
        Ok(())
    }

    /// Hand over the cleared list, leaving the library's copy empty.
    /// The packets stay alive until retired with
    /// [`Context::clear_packet`]. Under self-throttling the first call
    /// primes the read-ahead pump.
    pub fn take_cleared_packets(&mut self) -> Result<VecDeque<Arc<Packet>>> {
        let st = self.open_state_mut()?;
        if st.self_throttling && !st.primed_self_throttle {
            st.prime_self_throttle()?;
        }
        Ok(mem::take(&mut st.cleared))
    }

    fn open_state(&self) -> Result<&OpenState> {
        self.state.as_ref().ok_or(Error::NotOpen)
    }

    fn open_state_mut(&mut self) -> Result<&mut OpenState> {
        self.state.as_mut().ok_or(Error::NotOpen)
    }
}

impl OpenState {
    fn read_packet(&mut self) -> Result<Option<Arc<Packet>>> {
        let packet = match decoder::decode_packet(&mut self.source)? {
            Some(packet) => Arc::new(packet),
            None => return Ok(None),
        };

        if !self.dependencies_off {
            self.registry.find_or_insert(packet.id).packet = Some(packet.clone());
            for &dep in &packet.deps {
                self.registry.find_or_insert(dep).ref_count += 1;
            }
        }
        self.num_active_packets += 1;
        self.latest_cycle = packet.cycle;
        Ok(Some(packet))
    }

    fn dependencies_cleared(&self, packet: &Packet) -> bool {
        if self.dependencies_off {
            return true;
        }
        match self.registry.find(packet.id) {
            None => true,
            Some(node) => node.ref_count == 0,
        }
    }

    /// Read packets until the newest decoded cycle is more than
    /// `READ_AHEAD_CYCLES` past `current_cycle`, or the stream ends.
    /// Freshly read packets with no unresolved predecessors go straight
    /// onto the cleared list.
    fn read_ahead(&mut self, current_cycle: u64) -> Result<()> {
        let read_to_cycle = match current_cycle.checked_add(READ_AHEAD_CYCLES) {
            Some(cycle) => cycle,
            None => {
                if cfg!(feature = "lenient") {
                    // The wrapped target would lie below every decoded
                    // cycle, so there is nothing left to read ahead to.
                    warn!("read-ahead target overflowed from cycle {}", current_cycle);
                    return Ok(());
                }
                return Err(Error::ReadAheadOverflow {
                    cycle: current_cycle,
                });
            }
        };
        if read_to_cycle <= self.latest_cycle {
            return Ok(());
        }
        while self.latest_cycle <= read_to_cycle && !self.done_reading {
            match self.read_packet()? {
                None => {
                    debug!("reached end of trace stream at cycle {}", self.latest_cycle);
                    self.done_reading = true;
                }
                Some(packet) => {
                    if self.dependencies_cleared(&packet) {
                        self.cleared.push_back(packet);
                    }
                }
            }
        }
        Ok(())
    }

    /// First fill of the pump: read one packet, queue it if already
    /// injectable, then read ahead from its cycle. An exhausted stream
    /// latches `done_reading` and primes to an empty list.
    fn prime_self_throttle(&mut self) -> Result<()> {
        let packet = match self.read_packet()? {
            Some(packet) => packet,
            None => {
                self.done_reading = true;
                self.primed_self_throttle = true;
                return Ok(());
            }
        };
        if self.dependencies_cleared(&packet) {
            self.cleared.push_back(packet.clone());
        }
        self.primed_self_throttle = true;
        self.read_ahead(packet.cycle)
    }
}
