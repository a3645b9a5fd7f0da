use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::Bytes;
use rand::Rng as _;

use crate::constants::{COMPACT_NODE_LEN, COMPACT_PEER_LEN};
use crate::error::DhtError;

/// A 160-bit DHT identifier: a node id, or an info hash used as a lookup
/// target.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        rand::rng().fill(&mut id);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DhtError> {
        if bytes.len() != 20 {
            return Err(DhtError::InvalidNodeId);
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// XOR distance to another id, comparable bytewise.
    pub fn distance(&self, other: &NodeId) -> [u8; 20] {
        let mut dist = [0u8; 20];
        for (i, d) in dist.iter_mut().enumerate() {
            *d = self.0[i] ^ other.0[i];
        }
        dist
    }

    /// Index of the bucket `other` falls into relative to this id: the
    /// position of the highest differing bit.
    pub fn bucket_index(&self, other: &NodeId) -> usize {
        let dist = self.distance(other);

        for (i, &byte) in dist.iter().enumerate() {
            if byte != 0 {
                return i * 8 + byte.leading_zeros() as usize;
            }
        }

        159
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A queryable DHT endpoint.
///
/// The id is unknown until the node has answered at least once; bootstrap
/// routers in particular are addressed blind. A node that times out is only
/// evicted from the routing table when its id was known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub id: Option<NodeId>,
    pub addr: SocketAddr,
}

impl Contact {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        Self { id: Some(id), addr }
    }

    /// A contact whose id has not been learned yet.
    pub fn unidentified(addr: SocketAddr) -> Self {
        Self { id: None, addr }
    }

    /// Parses one 26-byte compact node entry: 20-byte id, IPv4, big-endian
    /// port.
    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != COMPACT_NODE_LEN {
            return None;
        }

        let id = NodeId::from_bytes(&data[..20]).ok()?;
        let ip = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let port = u16::from_be_bytes([data[24], data[25]]);

        Some(Self::new(id, SocketAddr::new(IpAddr::V4(ip), port)))
    }

    /// Compact wire form; `None` for id-less contacts and IPv6 addresses,
    /// which have no compact encoding here.
    pub fn to_compact(&self) -> Option<[u8; COMPACT_NODE_LEN]> {
        let id = self.id?;
        let mut out = [0u8; COMPACT_NODE_LEN];
        out[..20].copy_from_slice(id.as_bytes());

        match self.addr {
            SocketAddr::V4(v4) => {
                out[20..24].copy_from_slice(&v4.ip().octets());
                out[24..26].copy_from_slice(&v4.port().to_be_bytes());
                Some(out)
            }
            SocketAddr::V6(_) => None,
        }
    }
}

/// A peer announced for some info hash, together with the token that
/// accompanied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
    pub token: Bytes,
}

impl Peer {
    pub fn new(addr: SocketAddr, token: Bytes) -> Self {
        Self { addr, token }
    }

    /// Parses one 6-byte compact peer entry from a `get_peers` values list.
    pub fn from_compact(data: &[u8], token: Bytes) -> Option<Self> {
        if data.len() != COMPACT_PEER_LEN {
            return None;
        }

        let ip = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
        let port = u16::from_be_bytes([data[4], data[5]]);

        Some(Self::new(SocketAddr::new(IpAddr::V4(ip), port), token))
    }

    pub fn to_compact(&self) -> Option<[u8; COMPACT_PEER_LEN]> {
        match self.addr {
            SocketAddr::V4(v4) => {
                let mut out = [0u8; COMPACT_PEER_LEN];
                out[..4].copy_from_slice(&v4.ip().octets());
                out[4..6].copy_from_slice(&v4.port().to_be_bytes());
                Some(out)
            }
            SocketAddr::V6(_) => None,
        }
    }
}
