//! KRPC message envelope: parsing, field validation, and wire builders.
//!
//! Every KRPC message is a bencoded dictionary with a transaction id `t` and
//! a type tag `y` of `q` (query), `r` (response), or `e` (error). Anything
//! that fails these checks is dropped before it reaches a handler; the
//! handlers then pull their own typed fields out of the dictionary.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::bencode::{decode, Value};
use crate::error::DhtError;

/// KRPC error codes (BEP-5). Only the protocol error is ever sent by this
/// engine; the rest are accepted inbound.
pub const GENERIC_ERROR: i64 = 201;
pub const SERVER_ERROR: i64 = 202;
pub const PROTOCOL_ERROR: i64 = 203;
pub const METHOD_UNKNOWN_ERROR: i64 = 204;

pub(crate) type Dict = BTreeMap<Bytes, Value>;

/// The four query methods of BEP-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Ping,
    FindNode,
    GetPeers,
    AnnouncePeer,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Ping => "ping",
            QueryKind::FindNode => "find_node",
            QueryKind::GetPeers => "get_peers",
            QueryKind::AnnouncePeer => "announce_peer",
        }
    }
}

/// Message type, from the envelope's `y` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageKind {
    Query,
    Response,
    Error,
}

/// A validated envelope: transaction id, type tag, and the raw dictionary
/// for the handler to pick apart.
pub(crate) struct Envelope {
    pub tid: Bytes,
    pub kind: MessageKind,
    pub dict: Dict,
}

/// Decodes a datagram and checks the envelope shape.
///
/// A failure here means the packet is dropped without an error reply: the
/// sender's `t` cannot be trusted until the envelope itself parses.
pub(crate) fn parse(data: &[u8]) -> Result<Envelope, DhtError> {
    let dict = decode(data)?
        .into_dict()
        .ok_or_else(|| DhtError::Malformed("top level is not a dict".into()))?;

    let tid = str_field(&dict, "t")?.clone();

    let kind = match str_field(&dict, "y")?.as_ref() {
        b"q" => MessageKind::Query,
        b"r" => MessageKind::Response,
        b"e" => MessageKind::Error,
        _ => return Err(DhtError::Malformed("unknown message type".into())),
    };

    Ok(Envelope { tid, kind, dict })
}

// ============================================================================
// Typed field access
// ============================================================================

pub(crate) fn str_field<'a>(dict: &'a Dict, key: &str) -> Result<&'a Bytes, DhtError> {
    match dict.get(key.as_bytes()) {
        Some(Value::Bytes(b)) => Ok(b),
        Some(_) => Err(DhtError::Malformed(format!("key {key} is not a string"))),
        None => Err(DhtError::Malformed(format!("missing key {key}"))),
    }
}

pub(crate) fn int_field(dict: &Dict, key: &str) -> Result<i64, DhtError> {
    match dict.get(key.as_bytes()) {
        Some(Value::Int(i)) => Ok(*i),
        Some(_) => Err(DhtError::Malformed(format!("key {key} is not an int"))),
        None => Err(DhtError::Malformed(format!("missing key {key}"))),
    }
}

pub(crate) fn dict_field<'a>(dict: &'a Dict, key: &str) -> Result<&'a Dict, DhtError> {
    match dict.get(key.as_bytes()) {
        Some(Value::Dict(d)) => Ok(d),
        Some(_) => Err(DhtError::Malformed(format!("key {key} is not a dict"))),
        None => Err(DhtError::Malformed(format!("missing key {key}"))),
    }
}

pub(crate) fn list_field<'a>(dict: &'a Dict, key: &str) -> Result<&'a [Value], DhtError> {
    match dict.get(key.as_bytes()) {
        Some(Value::List(l)) => Ok(l),
        Some(_) => Err(DhtError::Malformed(format!("key {key} is not a list"))),
        None => Err(DhtError::Malformed(format!("missing key {key}"))),
    }
}

// ============================================================================
// Wire builders
// ============================================================================

pub(crate) fn query(tid: Bytes, kind: QueryKind, args: Dict) -> Value {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"t"), Value::Bytes(tid));
    dict.insert(Bytes::from_static(b"y"), Value::string("q"));
    dict.insert(Bytes::from_static(b"q"), Value::string(kind.as_str()));
    dict.insert(Bytes::from_static(b"a"), Value::Dict(args));
    Value::Dict(dict)
}

pub(crate) fn response(tid: Bytes, fields: Dict) -> Value {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"t"), Value::Bytes(tid));
    dict.insert(Bytes::from_static(b"y"), Value::string("r"));
    dict.insert(Bytes::from_static(b"r"), Value::Dict(fields));
    Value::Dict(dict)
}

pub(crate) fn error(tid: Bytes, code: i64, text: &str) -> Value {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"t"), Value::Bytes(tid));
    dict.insert(Bytes::from_static(b"y"), Value::string("e"));
    dict.insert(
        Bytes::from_static(b"e"),
        Value::List(vec![Value::Int(code), Value::string(text)]),
    );
    Value::Dict(dict)
}
