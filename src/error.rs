use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("invalid node id length")]
    InvalidNodeId,

    #[error("engine already running")]
    AlreadyRunning,
}
