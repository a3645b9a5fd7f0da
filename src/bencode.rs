//! Bencode encoding and decoding (BEP-3).
//!
//! The KRPC wire format is bencode: integers, byte strings, lists, and
//! dictionaries with byte-string keys. Messages are decoded into the dynamic
//! [`Value`] type and validated at the message boundary, so handlers work
//! with checked fields rather than raw bytes.

mod decode;
mod encode;
mod error;
mod value;

pub use decode::decode;
pub use encode::encode;
pub use error::BencodeError;
pub use value::Value;

#[cfg(test)]
mod tests;
