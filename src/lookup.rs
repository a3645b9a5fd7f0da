//! The iterative Kademlia walk toward a target id.

use crate::constants::COMPACT_NODE_LEN;
use crate::engine::Shared;
use crate::error::DhtError;
use crate::message::{self, Dict, QueryKind};
use crate::node::{Contact, NodeId};

/// Consumes the `nodes` blob of a `find_node`/`get_peers` response and
/// decides whether the lookup keeps going.
///
/// Every decoded contact is offered to the routing table. The walk stops
/// when the target itself showed up, or when no contact was new, meaning
/// the frontier stopped growing. Otherwise the same query is fanned out to
/// the closest known nodes; the dispatcher drops any that are already in
/// flight.
pub(crate) async fn find_on(
    dht: &Shared,
    response: &Dict,
    target: &NodeId,
    kind: QueryKind,
) -> Result<(), DhtError> {
    let nodes = message::str_field(response, "nodes")?;
    if nodes.len() % COMPACT_NODE_LEN != 0 {
        return Err(DhtError::Malformed("nodes blob is not 26-byte aligned".into()));
    }

    let mut found = false;
    let mut has_new = false;

    for chunk in nodes.chunks_exact(COMPACT_NODE_LEN) {
        let Some(contact) = Contact::from_compact(chunk) else {
            continue;
        };
        let Some(id) = contact.id else {
            continue;
        };

        if id == *target {
            found = true;
        }
        if dht.routing.insert(id, contact.addr) {
            has_new = true;
        }
    }

    if found || !has_new {
        return Ok(());
    }

    for node in dht.routing.closest(target, dht.k) {
        match kind {
            QueryKind::FindNode => dht.dispatcher.find_node(&node, target).await,
            QueryKind::GetPeers => dht.dispatcher.get_peers(&node, target.as_bytes()).await,
            QueryKind::Ping | QueryKind::AnnouncePeer => {}
        }
    }

    Ok(())
}
