//! The outstanding-query registry.
//!
//! Every in-flight query is registered under two keys at once: its
//! transaction id, and a `(method, peer address)` index. The id key
//! correlates replies; the index key suppresses duplicate queries to the
//! same peer. A table-wide lock keeps the two maps in step while reads stay
//! on the lock-free maps.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::message::QueryKind;
use crate::query::Query;

/// One in-flight query. The runner that created it holds the receiving end
/// of the completion channel; the table hands clones of this out to the
/// response and error handlers so they can fire it.
pub(crate) struct Transaction {
    pub query: Query,
    done: mpsc::Sender<()>,
}

impl Transaction {
    /// The channel is buffered so that every signaller a transaction can
    /// ever see (one per attempt, plus the error handler) fires without
    /// blocking, even after the runner has stopped reading.
    pub(crate) fn new(query: Query, attempts: usize) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (done, rx) = mpsc::channel(attempts + 1);
        (Arc::new(Self { query, done }), rx)
    }

    /// Signals the waiting runner. Never blocks; extra signals beyond the
    /// buffer are dropped.
    pub(crate) fn complete(&self) {
        let _ = self.done.try_send(());
    }

    fn index_key(&self) -> (QueryKind, SocketAddr) {
        (self.query.kind, self.query.node.addr)
    }
}

pub(crate) struct TransactionTable {
    by_tid: DashMap<Bytes, Arc<Transaction>>,
    by_index: DashMap<(QueryKind, SocketAddr), Arc<Transaction>>,
    next_tid: AtomicU32,
    // Serializes paired mutations of the two maps.
    lock: Mutex<()>,
}

impl TransactionTable {
    pub(crate) fn new() -> Self {
        Self {
            by_tid: DashMap::new(),
            by_index: DashMap::new(),
            next_tid: AtomicU32::new(0),
            lock: Mutex::new(()),
        }
    }

    /// Allocates a fresh transaction id: the ASCII decimal form of a
    /// wrapping 32-bit counter. An id still registered to a live
    /// transaction is skipped.
    pub(crate) fn alloc_tid(&self) -> Bytes {
        loop {
            let n = self.next_tid.fetch_add(1, Ordering::Relaxed);
            let tid = Bytes::from(n.to_string());
            if !self.by_tid.contains_key(tid.as_ref()) {
                return tid;
            }
        }
    }

    /// Registers a transaction under both keys. Returns false without
    /// registering anything when either key is already live; the caller
    /// must then drop the query rather than send it.
    pub(crate) fn insert(&self, txn: Arc<Transaction>) -> bool {
        let _guard = self.lock.lock();

        if self.by_tid.contains_key(txn.query.tid.as_ref())
            || self.by_index.contains_key(&txn.index_key())
        {
            return false;
        }

        self.by_tid.insert(txn.query.tid.clone(), txn.clone());
        self.by_index.insert(txn.index_key(), txn);
        true
    }

    /// Drops both registrations. A tid with no live transaction is a no-op.
    pub(crate) fn remove(&self, tid: &[u8]) {
        let _guard = self.lock.lock();

        if let Some((_, txn)) = self.by_tid.remove(tid) {
            self.by_index.remove(&txn.index_key());
        }
    }

    pub(crate) fn get(&self, tid: &[u8]) -> Option<Arc<Transaction>> {
        self.by_tid.get(tid).map(|entry| entry.value().clone())
    }

    pub(crate) fn get_by_index(
        &self,
        kind: QueryKind,
        addr: &SocketAddr,
    ) -> Option<Arc<Transaction>> {
        self.by_index
            .get(&(kind, *addr))
            .map(|entry| entry.value().clone())
    }

    /// The reply-correlation lookup: the transaction for `tid`, but only if
    /// it was sent to exactly `addr`. Guessing a live tid from a different
    /// address does not match.
    pub(crate) fn filter_one(&self, tid: &[u8], addr: &SocketAddr) -> Option<Arc<Transaction>> {
        self.get(tid).filter(|txn| txn.query.node.addr == *addr)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_tid.len()
    }

    #[cfg(test)]
    pub(crate) fn index_len(&self) -> usize {
        self.by_index.len()
    }
}
