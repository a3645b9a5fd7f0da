//! Inbound message handling: requests, responses, and errors.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use bytes::Bytes;

use tracing::debug;

use crate::bencode::{encode, Value};
use crate::engine::Shared;
use crate::lookup;
use crate::message::{
    self, dict_field, int_field, list_field, str_field, Envelope, MessageKind, QueryKind,
    PROTOCOL_ERROR,
};
use crate::node::{NodeId, Peer};

/// Entry point for one decoded datagram: parse the envelope and route on
/// the message type. Undecodable packets are dropped without an answer;
/// their transaction id cannot be trusted.
pub(crate) async fn dispatch(dht: &Shared, data: &[u8], addr: SocketAddr) {
    let envelope = match message::parse(data) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(%addr, "dropping packet: {err}");
            return;
        }
    };

    match envelope.kind {
        MessageKind::Query => handle_request(dht, addr, &envelope).await,
        MessageKind::Response => handle_response(dht, addr, &envelope).await,
        MessageKind::Error => handle_error(dht, addr, &envelope),
    }
}

/// Handles an inbound query. Argument violations are answered with a
/// protocol error echoing the sender's `t`; a sender that passed
/// validation is recorded in the routing table afterwards.
async fn handle_request(dht: &Shared, addr: SocketAddr, envelope: &Envelope) {
    let tid = &envelope.tid;

    let (name, args) = match (
        str_field(&envelope.dict, "q"),
        dict_field(&envelope.dict, "a"),
    ) {
        (Ok(name), Ok(args)) => (name, args),
        (Err(err), _) | (_, Err(err)) => {
            reply_error(dht, addr, tid.clone(), &err.to_string()).await;
            return;
        }
    };

    let id = match str_field(args, "id") {
        Ok(id) => id,
        Err(err) => {
            reply_error(dht, addr, tid.clone(), &err.to_string()).await;
            return;
        }
    };

    // Our own queries reflected back at us.
    if id.as_ref() == dht.id.as_bytes() {
        return;
    }

    let sender = match NodeId::from_bytes(id) {
        Ok(sender) => sender,
        Err(_) => {
            reply_error(dht, addr, tid.clone(), "invalid id").await;
            return;
        }
    };

    match name.as_ref() {
        b"ping" => {
            let mut fields = BTreeMap::new();
            fields.insert(Bytes::from_static(b"id"), local_id(dht));
            reply(dht, addr, &message::response(tid.clone(), fields)).await;
        }
        b"find_node" => {
            let target = match str_field(args, "target") {
                Ok(target) => target,
                Err(err) => {
                    reply_error(dht, addr, tid.clone(), &err.to_string()).await;
                    return;
                }
            };
            let Ok(target) = NodeId::from_bytes(target) else {
                reply_error(dht, addr, tid.clone(), "invalid target").await;
                return;
            };

            // The exact node if we know it, otherwise the closest we have.
            let nodes = match dht.routing.get(&target).and_then(|c| c.to_compact()) {
                Some(exact) => exact.to_vec(),
                None => dht.routing.closest_compact(&target, dht.k).concat(),
            };

            let mut fields = BTreeMap::new();
            fields.insert(Bytes::from_static(b"id"), local_id(dht));
            fields.insert(Bytes::from_static(b"nodes"), Value::Bytes(Bytes::from(nodes)));
            reply(dht, addr, &message::response(tid.clone(), fields)).await;
        }
        b"get_peers" => {
            let info_hash = match str_field(args, "info_hash") {
                Ok(hash) => hash,
                Err(err) => {
                    reply_error(dht, addr, tid.clone(), &err.to_string()).await;
                    return;
                }
            };
            let info_hash = match <[u8; 20]>::try_from(info_hash.as_ref()) {
                Ok(hash) => hash,
                Err(_) => {
                    reply_error(dht, addr, tid.clone(), "invalid info_hash").await;
                    return;
                }
            };

            let mut fields = BTreeMap::new();
            fields.insert(Bytes::from_static(b"id"), local_id(dht));
            fields.insert(
                Bytes::from_static(b"token"),
                Value::Bytes(dht.tokens.issue(&addr)),
            );

            let peers = dht.peers.get(&info_hash, dht.k);
            if peers.is_empty() {
                let nodes = dht.routing.closest_compact(&NodeId(info_hash), dht.k);
                fields.insert(
                    Bytes::from_static(b"nodes"),
                    Value::Bytes(Bytes::from(nodes.concat())),
                );
            } else {
                let values = peers
                    .iter()
                    .filter_map(Peer::to_compact)
                    .map(|compact| Value::Bytes(Bytes::copy_from_slice(&compact)))
                    .collect();
                fields.insert(Bytes::from_static(b"values"), Value::List(values));
            }

            reply(dht, addr, &message::response(tid.clone(), fields)).await;

            if let Some(hook) = &dht.on_get_peers {
                hook(info_hash, addr.ip(), addr.port());
            }
        }
        b"announce_peer" => {
            let parsed = str_field(args, "info_hash").and_then(|hash| {
                let port = int_field(args, "port")?;
                let token = str_field(args, "token")?;
                Ok((hash, port, token))
            });
            let (info_hash, port, token) = match parsed {
                Ok(parsed) => parsed,
                Err(err) => {
                    reply_error(dht, addr, tid.clone(), &err.to_string()).await;
                    return;
                }
            };
            let info_hash = match <[u8; 20]>::try_from(info_hash.as_ref()) {
                Ok(hash) => hash,
                Err(_) => {
                    reply_error(dht, addr, tid.clone(), "invalid info_hash").await;
                    return;
                }
            };

            // An invalid token gets no reply and no state change.
            if !dht.tokens.verify(&addr, token) {
                debug!(%addr, "announce_peer with stale token");
                return;
            }

            let port = match int_field(args, "implied_port") {
                Ok(implied) if implied != 0 => addr.port(),
                _ => port as u16,
            };

            dht.peers.insert(
                info_hash,
                Peer::new(SocketAddr::new(addr.ip(), port), token.clone()),
            );

            let mut fields = BTreeMap::new();
            fields.insert(Bytes::from_static(b"id"), local_id(dht));
            reply(dht, addr, &message::response(tid.clone(), fields)).await;

            if let Some(hook) = &dht.on_announce_peer {
                hook(info_hash, addr.ip(), port);
            }
        }
        _ => return,
    }

    dht.routing.insert(sender, addr);
}

/// Handles an inbound response. Everything that fails to correlate or to
/// validate is dropped without firing the completion signal, so the runner
/// retries or expires on its own clock.
async fn handle_response(dht: &Shared, addr: SocketAddr, envelope: &Envelope) {
    let Some(txn) = dht.transactions.filter_one(&envelope.tid, &addr) else {
        return;
    };

    let Ok(fields) = dict_field(&envelope.dict, "r") else {
        return;
    };
    let Ok(id) = str_field(fields, "id") else {
        return;
    };
    let Ok(responder) = NodeId::from_bytes(id) else {
        return;
    };

    // The reply must come from the node we addressed, when we knew it.
    if matches!(txn.query.node.id, Some(expected) if expected != responder) {
        return;
    }

    match txn.query.kind {
        QueryKind::Ping | QueryKind::AnnouncePeer => {}
        QueryKind::FindNode => {
            let Some(target) = txn.query.target_id() else {
                return;
            };
            if lookup::find_on(dht, fields, &target, QueryKind::FindNode)
                .await
                .is_err()
            {
                return;
            }
        }
        QueryKind::GetPeers => {
            let Ok(token) = str_field(fields, "token") else {
                return;
            };
            let Some(info_hash) = txn.query.info_hash() else {
                return;
            };

            if let Ok(values) = list_field(fields, "values") {
                for value in values {
                    let Some(blob) = value.as_bytes() else {
                        continue;
                    };
                    let Some(peer) = Peer::from_compact(blob, token.clone()) else {
                        continue;
                    };
                    dht.peers.insert(info_hash, peer);
                }
            } else if lookup::find_on(dht, fields, &NodeId(info_hash), QueryKind::GetPeers)
                .await
                .is_err()
            {
                return;
            }
        }
    }

    txn.complete();
    dht.routing.insert(responder, addr);
}

/// Handles an inbound error: a well-formed error that correlates stops the
/// runner from retrying, and nothing more.
fn handle_error(dht: &Shared, addr: SocketAddr, envelope: &Envelope) {
    let Ok(error) = list_field(&envelope.dict, "e") else {
        return;
    };
    if error.len() != 2 {
        return;
    }

    if let Some(txn) = dht.transactions.filter_one(&envelope.tid, &addr) {
        txn.complete();
    }
}

fn local_id(dht: &Shared) -> Value {
    Value::Bytes(Bytes::copy_from_slice(dht.id.as_bytes()))
}

async fn reply(dht: &Shared, addr: SocketAddr, msg: &Value) {
    match encode(msg) {
        Ok(data) => {
            if let Err(err) = dht.socket.send_to(&data, addr).await {
                debug!(%addr, "failed to send reply: {err}");
            }
        }
        Err(err) => debug!("failed to encode reply: {err}"),
    }
}

async fn reply_error(dht: &Shared, addr: SocketAddr, tid: Bytes, text: &str) {
    reply(dht, addr, &message::error(tid, PROTOCOL_ERROR, text)).await;
}
