use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;

use crate::constants::{ANNOUNCE_LIFETIME, MAX_PEERS_PER_HASH};
use crate::node::Peer;

struct Announced {
    peer: Peer,
    announced_at: Instant,
}

/// Peers announced to this node, grouped by info hash.
///
/// Entries expire after the announce lifetime unless re-announced; a
/// re-announce from the same address replaces the old entry.
#[derive(Default)]
pub struct PeerStore {
    by_hash: RwLock<HashMap<[u8; 20], Vec<Announced>>>,
}

impl PeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info_hash: [u8; 20], peer: Peer) {
        let mut by_hash = self.by_hash.write();
        let entries = by_hash.entry(info_hash).or_default();

        let now = Instant::now();
        entries.retain(|a| {
            now.duration_since(a.announced_at) < ANNOUNCE_LIFETIME && a.peer.addr != peer.addr
        });

        if entries.len() < MAX_PEERS_PER_HASH {
            entries.push(Announced {
                peer,
                announced_at: now,
            });
        }
    }

    /// Up to `limit` live peers for `info_hash`.
    pub fn get(&self, info_hash: &[u8; 20], limit: usize) -> Vec<Peer> {
        let mut by_hash = self.by_hash.write();

        let Some(entries) = by_hash.get_mut(info_hash) else {
            return Vec::new();
        };

        let now = Instant::now();
        entries.retain(|a| now.duration_since(a.announced_at) < ANNOUNCE_LIFETIME);

        entries.iter().take(limit).map(|a| a.peer.clone()).collect()
    }
}
