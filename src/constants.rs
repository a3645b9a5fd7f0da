//! Protocol constants and tuning parameters.
//!
//! Defaults follow the Mainline DHT conventions used by libtorrent and the
//! mainline reference client.

use std::time::Duration;

// ============================================================================
// Ports and packet sizes
// ============================================================================

/// Default DHT listen port.
pub const DEFAULT_PORT: u16 = 6881;

/// Largest datagram we will read off the socket.
pub const MAX_PACKET_SIZE: usize = 65535;

// ============================================================================
// Kademlia parameters
// ============================================================================

/// Bucket size: how many nodes a reply carries and a bucket holds.
pub const K: usize = 8;

/// Wire size of one compact node entry (20-byte id + IPv4 + port).
pub const COMPACT_NODE_LEN: usize = 26;

/// Wire size of one compact peer entry (IPv4 + port).
pub const COMPACT_PEER_LEN: usize = 6;

// ============================================================================
// Query behavior
// ============================================================================

/// Total send attempts per outbound query before the target is given up on.
pub const QUERY_TRIES: usize = 3;

/// How long one attempt waits for a correlated reply.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Capacity of the outbound query queue.
pub const PENDING_QUERIES: usize = 1024;

/// How many inbound packets may be decoding at once; the rest are dropped.
pub const MAX_INFLIGHT_PACKETS: usize = 256;

// ============================================================================
// Maintenance
// ============================================================================

/// Announce-token secret rotation period.
pub const TOKEN_ROTATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// How often stale buckets are probed with fresh lookups.
pub const BUCKET_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A node unseen for this long no longer counts as good.
pub const NODE_FRESH_WINDOW: Duration = Duration::from_secs(15 * 60);

/// How long an announced peer stays in the store without re-announcing.
pub const ANNOUNCE_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Cap on stored peers per info hash.
pub const MAX_PEERS_PER_HASH: usize = 1000;
