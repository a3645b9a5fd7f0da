use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use parking_lot::RwLock;

use crate::constants::{K, NODE_FRESH_WINDOW};
use crate::node::{Contact, NodeId};

const NUM_BUCKETS: usize = 160;

#[derive(Debug, Clone)]
struct Entry {
    id: NodeId,
    addr: SocketAddr,
    last_seen: Instant,
}

impl Entry {
    fn new(id: NodeId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn is_good(&self) -> bool {
        self.last_seen.elapsed() < NODE_FRESH_WINDOW
    }

    fn contact(&self) -> Contact {
        Contact::new(self.id, self.addr)
    }
}

#[derive(Debug)]
struct Bucket {
    entries: VecDeque<Entry>,
    replacements: VecDeque<Entry>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(K),
            replacements: VecDeque::with_capacity(K),
        }
    }

    /// Returns true only when the node was previously unknown and actually
    /// entered the bucket. Refreshing a known node and spilling into the
    /// replacement cache both return false.
    fn add(&mut self, id: NodeId, addr: SocketAddr) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            if let Some(mut existing) = self.entries.remove(pos) {
                existing.touch();
                existing.addr = addr;
                self.entries.push_back(existing);
            }
            return false;
        }

        if self.entries.len() < K {
            self.entries.push_back(Entry::new(id, addr));
            return true;
        }

        if self.replacements.len() < K && !self.replacements.iter().any(|e| e.id == id) {
            self.replacements.push_back(Entry::new(id, addr));
        }

        false
    }

    fn remove(&mut self, id: &NodeId) {
        if let Some(pos) = self.entries.iter().position(|e| &e.id == id) {
            self.entries.remove(pos);

            if let Some(replacement) = self.replacements.pop_front() {
                self.entries.push_back(replacement);
            }
        }
    }

    fn get(&self, id: &NodeId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.id == id)
    }
}

/// The Kademlia routing table: 160 k-buckets keyed by the highest differing
/// bit against the local id.
pub struct RoutingTable {
    local_id: NodeId,
    buckets: Vec<RwLock<Bucket>>,
}

impl RoutingTable {
    pub fn new(local_id: NodeId) -> Self {
        let buckets = (0..NUM_BUCKETS).map(|_| RwLock::new(Bucket::new())).collect();

        Self { local_id, buckets }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    fn bucket_for(&self, id: &NodeId) -> &RwLock<Bucket> {
        &self.buckets[self.local_id.bucket_index(id)]
    }

    /// Inserts or refreshes a node. Returns true iff the node is new to the
    /// table; lookups use this to detect that the frontier stopped growing.
    pub fn insert(&self, id: NodeId, addr: SocketAddr) -> bool {
        if id == self.local_id {
            return false;
        }

        self.bucket_for(&id).write().add(id, addr)
    }

    pub fn remove(&self, id: &NodeId) {
        self.bucket_for(id).write().remove(id);
    }

    pub fn get(&self, id: &NodeId) -> Option<Contact> {
        self.bucket_for(id).read().get(id).map(Entry::contact)
    }

    /// The `count` good nodes nearest to `target` by XOR distance.
    pub fn closest(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        let mut near: Vec<(Contact, [u8; 20])> = Vec::new();

        for bucket in &self.buckets {
            let bucket = bucket.read();
            for entry in bucket.entries.iter().filter(|e| e.is_good()) {
                near.push((entry.contact(), entry.id.distance(target)));
            }
        }

        near.sort_by(|a, b| a.1.cmp(&b.1));
        near.truncate(count);
        near.into_iter().map(|(c, _)| c).collect()
    }

    /// Same as [`closest`](Self::closest), pre-encoded as compact node info
    /// for `find_node`/`get_peers` replies. IPv6 entries are skipped.
    pub fn closest_compact(&self, target: &NodeId, count: usize) -> Vec<[u8; 26]> {
        self.closest(target, count)
            .iter()
            .filter_map(Contact::to_compact)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.read().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buckets whose oldest member has not been heard from within the
    /// freshness window; candidates for a refresh lookup.
    pub fn stale_buckets(&self) -> Vec<usize> {
        let mut stale = Vec::new();

        for (i, bucket) in self.buckets.iter().enumerate() {
            let bucket = bucket.read();
            if let Some(oldest) = bucket.entries.front() {
                if !oldest.is_good() {
                    stale.push(i);
                }
            }
        }

        stale
    }

    /// A random id that would land in bucket `index`: the local id with bit
    /// `index` flipped and everything below it randomized.
    pub fn random_id_in_bucket(&self, index: usize) -> NodeId {
        if index >= NUM_BUCKETS {
            return NodeId::generate();
        }

        let mut id = self.local_id.0;
        let byte_idx = index / 8;
        let bit_idx = 7 - (index % 8);

        id[byte_idx] ^= 1 << bit_idx;

        if bit_idx > 0 {
            let random_byte: u8 = rand::random();
            let keep = !((1u8 << bit_idx) - 1);
            id[byte_idx] = (id[byte_idx] & keep) | (random_byte & !keep);
        }

        for byte in id.iter_mut().skip(byte_idx + 1) {
            *byte = rand::random();
        }

        NodeId(id)
    }
}
