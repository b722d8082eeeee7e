//! The dependency registry: links every in-flight packet to the
//! packets still blocking its dependents.
//!
//! An open-chained hash table with a fixed bucket count, hashed by
//! packet identifier. Nodes live in a [`Slab`], so insert and remove
//! are O(1) slot operations with no per-node allocation, and chains
//! are linked by slab keys. Chains grow at the tail; removal preserves
//! the order of the remaining nodes.

use std::sync::Arc;

use slab::Slab;

use crate::packet::Packet;

const BUCKET_COUNT: usize = 200;

/// One registry node. `packet` is absent while only dependents of the
/// identifier have been read so far.
pub(crate) struct DepNode {
    pub packet: Option<Arc<Packet>>,
    pub packet_id: u32,
    /// Number of read-but-not-retired packets naming this identifier
    /// as a dependent, i.e. this packet's unresolved predecessors.
    pub ref_count: u32,
    next: Option<usize>,
}

pub(crate) struct DepRegistry {
    buckets: [Option<usize>; BUCKET_COUNT],
    nodes: Slab<DepNode>,
}

impl DepRegistry {
    pub(crate) fn new() -> Self {
        DepRegistry {
            buckets: [None; BUCKET_COUNT],
            nodes: Slab::new(),
        }
    }

    fn bucket(packet_id: u32) -> usize {
        packet_id as usize % BUCKET_COUNT
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn key_of(&self, packet_id: u32) -> Option<usize> {
        let mut cursor = self.buckets[Self::bucket(packet_id)];
        while let Some(key) = cursor {
            let node = &self.nodes[key];
            if node.packet_id == packet_id {
                return Some(key);
            }
            cursor = node.next;
        }
        None
    }

    pub(crate) fn find(&self, packet_id: u32) -> Option<&DepNode> {
        self.key_of(packet_id).map(|key| &self.nodes[key])
    }

    pub(crate) fn find_mut(&mut self, packet_id: u32) -> Option<&mut DepNode> {
        match self.key_of(packet_id) {
            Some(key) => Some(&mut self.nodes[key]),
            None => None,
        }
    }

    /// Append a fresh node for `packet_id` at its chain tail.
    pub(crate) fn insert(&mut self, packet_id: u32) -> &mut DepNode {
        let key = self.nodes.insert(DepNode {
            packet: None,
            packet_id,
            ref_count: 0,
            next: None,
        });

        let bucket = Self::bucket(packet_id);
        match self.buckets[bucket] {
            None => self.buckets[bucket] = Some(key),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = self.nodes[tail].next {
                    tail = next;
                }
                self.nodes[tail].next = Some(key);
            }
        }

        &mut self.nodes[key]
    }

    /// Look up `packet_id`, inserting an empty node when absent.
    pub(crate) fn find_or_insert(&mut self, packet_id: u32) -> &mut DepNode {
        match self.key_of(packet_id) {
            Some(key) => &mut self.nodes[key],
            None => self.insert(packet_id),
        }
    }

    /// Unlink the node for `packet_id`. The outer `Option` reports
    /// whether a node existed; the inner carries its owned packet.
    pub(crate) fn remove(&mut self, packet_id: u32) -> Option<Option<Arc<Packet>>> {
        let bucket = Self::bucket(packet_id);
        let mut prev: Option<usize> = None;
        let mut cursor = self.buckets[bucket];
        while let Some(key) = cursor {
            if self.nodes[key].packet_id == packet_id {
                let next = self.nodes[key].next;
                match prev {
                    None => self.buckets[bucket] = next,
                    Some(prev) => self.nodes[prev].next = next,
                }
                let node = self.nodes.remove(key);
                return Some(node.packet);
            }
            prev = Some(key);
            cursor = self.nodes[key].next;
        }
        None
    }

    /// Drop every node in every bucket.
    pub(crate) fn clear(&mut self) {
        self.buckets = [None; BUCKET_COUNT];
        self.nodes.clear();
    }

    /// Live nodes, in no particular order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &DepNode> + '_ {
        self.nodes.iter().map(|(_, node)| node)
    }

    #[cfg(test)]
    fn chain_ids(&self, bucket: usize) -> Vec<u32> {
        let mut ids = Vec::new();
        let mut cursor = self.buckets[bucket];
        while let Some(key) = cursor {
            ids.push(self.nodes[key].packet_id);
            cursor = self.nodes[key].next;
        }
        ids
    }
}
