use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::constants::{
    BUCKET_REFRESH_INTERVAL, DEFAULT_PORT, K, MAX_INFLIGHT_PACKETS, PENDING_QUERIES, QUERY_TIMEOUT,
    QUERY_TRIES, TOKEN_ROTATE_INTERVAL,
};
use crate::node::NodeId;

/// Observer hook for inbound `get_peers`/`announce_peer` traffic:
/// `(info_hash, source ip, port)`.
pub type PeerEventHook = Box<dyn Fn([u8; 20], IpAddr, u16) + Send + Sync>;

/// Engine tuning. `Default` gives the standard Mainline parameters; tests
/// shrink the timeouts.
pub struct Config {
    /// Address the UDP socket binds to.
    pub bind_addr: SocketAddr,
    /// Fixed local id; generated at bind time when absent.
    pub local_id: Option<NodeId>,
    /// Total send attempts per query.
    pub tries: usize,
    /// Kademlia bucket size, and the fan-out of lookups and replies.
    pub k: usize,
    /// Per-attempt wait for a correlated reply.
    pub query_timeout: Duration,
    /// Capacity of the outbound query queue.
    pub pending_queries: usize,
    /// How many inbound packets may be in flight at once.
    pub max_inflight_packets: usize,
    /// Announce-token secret rotation period.
    pub token_rotate_interval: Duration,
    /// Stale-bucket probe period.
    pub bucket_refresh_interval: Duration,
    /// Fired for every valid inbound `get_peers`.
    pub on_get_peers: Option<PeerEventHook>,
    /// Fired for every accepted inbound `announce_peer`.
    pub on_announce_peer: Option<PeerEventHook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            local_id: None,
            tries: QUERY_TRIES,
            k: K,
            query_timeout: QUERY_TIMEOUT,
            pending_queries: PENDING_QUERIES,
            max_inflight_packets: MAX_INFLIGHT_PACKETS,
            token_rotate_interval: TOKEN_ROTATE_INTERVAL,
            bucket_refresh_interval: BUCKET_REFRESH_INTERVAL,
            on_get_peers: None,
            on_announce_peer: None,
        }
    }
}
