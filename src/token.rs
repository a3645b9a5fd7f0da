use std::net::SocketAddr;

use bytes::Bytes;
use parking_lot::RwLock;
use sha1::{Digest, Sha1};

struct Secrets {
    current: [u8; 16],
    previous: [u8; 16],
}

/// Issues and checks the opaque tokens that gate `announce_peer`.
///
/// A token is a truncated hash of a secret and the querier's IP, so it
/// proves the announcer recently reached us from that address. Secrets
/// rotate on a timer; a token from the previous generation still verifies,
/// which keeps the announce window at one to two rotation periods.
pub struct TokenStore {
    secrets: RwLock<Secrets>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            secrets: RwLock::new(Secrets {
                current: rand::random(),
                previous: rand::random(),
            }),
        }
    }

    pub fn issue(&self, addr: &SocketAddr) -> Bytes {
        token_for(&self.secrets.read().current, addr)
    }

    pub fn verify(&self, addr: &SocketAddr, token: &[u8]) -> bool {
        let secrets = self.secrets.read();

        token_for(&secrets.current, addr).as_ref() == token
            || token_for(&secrets.previous, addr).as_ref() == token
    }

    pub fn rotate(&self) {
        let mut secrets = self.secrets.write();
        secrets.previous = secrets.current;
        secrets.current = rand::random();
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn token_for(secret: &[u8; 16], addr: &SocketAddr) -> Bytes {
    let mut hasher = Sha1::new();
    hasher.update(secret);
    hasher.update(addr.ip().to_string().as_bytes());

    let digest = hasher.finalize();
    Bytes::copy_from_slice(&digest[..8])
}
