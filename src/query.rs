//! Outbound queries: construction, dispatch, and the send-and-wait runner.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use crate::bencode::{encode, Value};
use crate::message::{self, Dict, QueryKind};
use crate::node::{Contact, NodeId};
use crate::routing::RoutingTable;
use crate::transaction::{Transaction, TransactionTable};

/// One outbound query: the node it goes to and the full wire dictionary
/// `{t, y:"q", q, a}`.
#[derive(Debug, Clone)]
pub(crate) struct Query {
    pub node: Contact,
    pub kind: QueryKind,
    pub tid: Bytes,
    pub payload: Value,
}

impl Query {
    fn args(&self) -> Option<&Dict> {
        self.payload.get(b"a")?.as_dict()
    }

    /// The `target` argument this query was sent with, for `find_node`.
    pub(crate) fn target_id(&self) -> Option<NodeId> {
        let bytes = self.args()?.get(b"target".as_slice())?.as_bytes()?;
        NodeId::from_bytes(bytes).ok()
    }

    /// The `info_hash` argument this query was sent with, for `get_peers`.
    pub(crate) fn info_hash(&self) -> Option<[u8; 20]> {
        let bytes = self.args()?.get(b"info_hash".as_slice())?.as_bytes()?;
        bytes.as_ref().try_into().ok()
    }
}

/// Builds queries and feeds them to the runner pool through a bounded
/// queue.
///
/// Two gates keep the queue clean: a query is never built for the local
/// node itself, and never while another query of the same method to the
/// same address is live. Racing callers therefore collapse to a single
/// network query.
pub(crate) struct Dispatcher {
    local_id: NodeId,
    transactions: Arc<TransactionTable>,
    queue: mpsc::Sender<Query>,
}

impl Dispatcher {
    pub(crate) fn new(
        local_id: NodeId,
        transactions: Arc<TransactionTable>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Query>) {
        let (queue, rx) = mpsc::channel(capacity);

        (
            Self {
                local_id,
                transactions,
                queue,
            },
            rx,
        )
    }

    async fn send_query(&self, node: &Contact, kind: QueryKind, mut args: Dict) {
        if node.id == Some(self.local_id) {
            return;
        }
        if self.transactions.get_by_index(kind, &node.addr).is_some() {
            return;
        }

        args.insert(
            Bytes::from_static(b"id"),
            Value::Bytes(Bytes::copy_from_slice(self.local_id.as_bytes())),
        );

        let tid = self.transactions.alloc_tid();
        let payload = message::query(tid.clone(), kind, args);

        let query = Query {
            node: *node,
            kind,
            tid,
            payload,
        };

        if self.queue.send(query).await.is_err() {
            debug!("query queue closed, dropping {}", kind.as_str());
        }
    }

    pub(crate) async fn ping(&self, node: &Contact) {
        self.send_query(node, QueryKind::Ping, BTreeMap::new()).await;
    }

    pub(crate) async fn find_node(&self, node: &Contact, target: &NodeId) {
        let mut args = BTreeMap::new();
        args.insert(
            Bytes::from_static(b"target"),
            Value::Bytes(Bytes::copy_from_slice(target.as_bytes())),
        );

        self.send_query(node, QueryKind::FindNode, args).await;
    }

    pub(crate) async fn get_peers(&self, node: &Contact, info_hash: &[u8; 20]) {
        let mut args = BTreeMap::new();
        args.insert(
            Bytes::from_static(b"info_hash"),
            Value::Bytes(Bytes::copy_from_slice(info_hash)),
        );

        self.send_query(node, QueryKind::GetPeers, args).await;
    }

    pub(crate) async fn announce_peer(
        &self,
        node: &Contact,
        info_hash: &[u8; 20],
        implied_port: bool,
        port: u16,
        token: Bytes,
    ) {
        let mut args = BTreeMap::new();
        args.insert(
            Bytes::from_static(b"info_hash"),
            Value::Bytes(Bytes::copy_from_slice(info_hash)),
        );
        args.insert(
            Bytes::from_static(b"implied_port"),
            Value::Int(i64::from(implied_port)),
        );
        args.insert(Bytes::from_static(b"port"), Value::Int(i64::from(port)));
        args.insert(Bytes::from_static(b"token"), Value::Bytes(token));

        self.send_query(node, QueryKind::AnnouncePeer, args).await;
    }
}

/// Runs one query to completion: send, wait, retry, clean up.
#[derive(Clone)]
pub(crate) struct QueryRunner {
    socket: Arc<UdpSocket>,
    transactions: Arc<TransactionTable>,
    routing: Arc<RoutingTable>,
    tries: usize,
    wait: Duration,
}

impl QueryRunner {
    pub(crate) fn new(
        socket: Arc<UdpSocket>,
        transactions: Arc<TransactionTable>,
        routing: Arc<RoutingTable>,
        tries: usize,
        wait: Duration,
    ) -> Self {
        Self {
            socket,
            transactions,
            routing,
            tries,
            wait,
        }
    }

    /// The retry loop for one query. All attempts reuse the same
    /// transaction id, so a late reply to an earlier attempt still counts.
    /// A send error ends the loop at once; the target is not evicted for a
    /// local socket fault.
    pub(crate) async fn run(&self, query: Query) {
        let data = match encode(&query.payload) {
            Ok(data) => data,
            Err(err) => {
                debug!("failed to encode query: {err}");
                return;
            }
        };

        let node = query.node;
        let tid = query.tid.clone();
        let (txn, mut done) = Transaction::new(query, self.tries);

        // A racing query to the same (method, address) beat us here.
        if !self.transactions.insert(txn) {
            return;
        }

        let mut answered = false;
        let mut send_failed = false;

        for _ in 0..self.tries {
            if let Err(err) = self.socket.send_to(&data, node.addr).await {
                debug!(addr = %node.addr, "query send failed: {err}");
                send_failed = true;
                break;
            }

            if timeout(self.wait, done.recv()).await.is_ok() {
                answered = true;
                break;
            }
        }

        self.transactions.remove(&tid);

        // Eviction is reserved for genuine retry exhaustion; a local send
        // fault says nothing about the target.
        if !answered && !send_failed {
            if let Some(id) = node.id {
                debug!(addr = %node.addr, "node unresponsive, evicting {id}");
                self.routing.remove(&id);
            }
        }
    }
}
