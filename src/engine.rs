//! The engine: socket intake, task wiring, and periodic maintenance.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::{Config, PeerEventHook};
use crate::constants::MAX_PACKET_SIZE;
use crate::error::DhtError;
use crate::handler;
use crate::node::{Contact, NodeId};
use crate::peers::PeerStore;
use crate::query::{Dispatcher, Query, QueryRunner};
use crate::routing::RoutingTable;
use crate::token::TokenStore;
use crate::transaction::TransactionTable;

/// Everything the handler and worker tasks share. The [`Dht`] handle owns
/// one of these; each spawned task holds its own `Arc`.
pub(crate) struct Shared {
    pub(crate) id: NodeId,
    pub(crate) socket: Arc<UdpSocket>,
    pub(crate) routing: Arc<RoutingTable>,
    pub(crate) peers: PeerStore,
    pub(crate) tokens: TokenStore,
    pub(crate) transactions: Arc<TransactionTable>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) k: usize,
    pub(crate) on_get_peers: Option<PeerEventHook>,
    pub(crate) on_announce_peer: Option<PeerEventHook>,
    local_addr: SocketAddr,
    works: Arc<Semaphore>,
    runner: QueryRunner,
    token_rotate_interval: Duration,
    bucket_refresh_interval: Duration,
    pub(crate) query_rx: Mutex<Option<mpsc::Receiver<Query>>>,
}

/// A Mainline DHT node engine.
///
/// `Dht` is a cheap clone over shared state; clone it freely into tasks.
/// [`bind`](Dht::bind) sets everything up, [`run`](Dht::run) drives the
/// socket, and the query methods enqueue outbound traffic.
#[derive(Clone)]
pub struct Dht {
    pub(crate) shared: Arc<Shared>,
}

impl Dht {
    /// Binds the UDP socket and wires up the engine. No traffic flows until
    /// [`run`](Dht::run) is started.
    pub async fn bind(config: Config) -> Result<Self, DhtError> {
        let Config {
            bind_addr,
            local_id,
            tries,
            k,
            query_timeout,
            pending_queries,
            max_inflight_packets,
            token_rotate_interval,
            bucket_refresh_interval,
            on_get_peers,
            on_announce_peer,
        } = config;

        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let local_addr = socket.local_addr()?;
        let id = local_id.unwrap_or_else(NodeId::generate);

        info!("dht engine bound to {local_addr} as {id}");

        let routing = Arc::new(RoutingTable::new(id));
        let transactions = Arc::new(TransactionTable::new());
        let (dispatcher, query_rx) = Dispatcher::new(id, transactions.clone(), pending_queries);
        let runner = QueryRunner::new(
            socket.clone(),
            transactions.clone(),
            routing.clone(),
            tries,
            query_timeout,
        );

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                socket,
                routing,
                peers: PeerStore::new(),
                tokens: TokenStore::new(),
                transactions,
                dispatcher,
                k,
                on_get_peers,
                on_announce_peer,
                local_addr,
                works: Arc::new(Semaphore::new(max_inflight_packets)),
                runner,
                token_rotate_interval,
                bucket_refresh_interval,
                query_rx: Mutex::new(Some(query_rx)),
            }),
        })
    }

    pub fn local_id(&self) -> NodeId {
        self.shared.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.shared.routing
    }

    pub fn peer_store(&self) -> &PeerStore {
        &self.shared.peers
    }

    /// How many queries are currently awaiting a reply.
    pub fn pending_queries(&self) -> usize {
        self.shared.transactions.len()
    }

    pub async fn ping(&self, node: &Contact) {
        self.shared.dispatcher.ping(node).await;
    }

    pub async fn find_node(&self, node: &Contact, target: &NodeId) {
        self.shared.dispatcher.find_node(node, target).await;
    }

    pub async fn get_peers(&self, node: &Contact, info_hash: &[u8; 20]) {
        self.shared.dispatcher.get_peers(node, info_hash).await;
    }

    pub async fn announce_peer(
        &self,
        node: &Contact,
        info_hash: &[u8; 20],
        implied_port: bool,
        port: u16,
        token: Bytes,
    ) {
        self.shared
            .dispatcher
            .announce_peer(node, info_hash, implied_port, port, token)
            .await;
    }

    /// Seeds the table by asking each router for nodes near our own id.
    /// Routers are addressed without an id, so they are never evicted when
    /// they fail to answer.
    pub async fn bootstrap(&self, routers: &[SocketAddr]) {
        info!("bootstrapping from {} routers", routers.len());

        for addr in routers {
            let router = Contact::unidentified(*addr);
            self.shared.dispatcher.find_node(&router, &self.shared.id).await;
        }
    }

    /// Drives the engine: consumes the query queue, reads the socket, and
    /// runs the maintenance timers. Transient socket errors are logged and
    /// skipped, so the loop runs for the life of the node.
    ///
    /// Each datagram must win a slot on the bounded work gate before it is
    /// decoded; when the gate is full the packet is dropped on the floor,
    /// which is the flood policy.
    pub async fn run(&self) -> Result<(), DhtError> {
        let mut query_rx = self
            .shared
            .query_rx
            .lock()
            .take()
            .ok_or(DhtError::AlreadyRunning)?;

        let runner = self.shared.runner.clone();
        tokio::spawn(async move {
            while let Some(query) = query_rx.recv().await {
                let runner = runner.clone();
                tokio::spawn(async move { runner.run(query).await });
            }
        });

        let mut rotate = interval(self.shared.token_rotate_interval);
        let mut refresh = interval(self.shared.bucket_refresh_interval);
        rotate.set_missed_tick_behavior(MissedTickBehavior::Skip);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        rotate.tick().await;
        refresh.tick().await;

        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                received = self.shared.socket.recv_from(&mut buf) => {
                    // Transient recv errors (an ICMP port-unreachable from an
                    // earlier send surfaces here) must not take the node down.
                    let (len, addr) = match received {
                        Ok(received) => received,
                        Err(err) => {
                            debug!("socket recv error: {err}");
                            continue;
                        }
                    };

                    let Ok(permit) = self.shared.works.clone().try_acquire_owned() else {
                        debug!(%addr, "work gate full, dropping packet");
                        continue;
                    };

                    let data = Bytes::copy_from_slice(&buf[..len]);
                    let shared = self.shared.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        handler::dispatch(&shared, &data, addr).await;
                    });
                }
                _ = rotate.tick() => {
                    self.shared.tokens.rotate();
                    debug!("announce token secret rotated");
                }
                _ = refresh.tick() => {
                    self.refresh_stale_buckets().await;
                }
            }
        }
    }

    /// Probes each stale bucket with a lookup toward a random id inside it.
    async fn refresh_stale_buckets(&self) {
        let stale = self.shared.routing.stale_buckets();
        if stale.is_empty() {
            return;
        }

        debug!("refreshing {} stale buckets", stale.len());

        for index in stale {
            let target = self.shared.routing.random_id_in_bucket(index);
            for node in self.shared.routing.closest(&target, self.shared.k) {
                self.shared.dispatcher.find_node(&node, &target).await;
            }
        }
    }
}
