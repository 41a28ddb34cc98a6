//! Event fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use parking_lot::RwLock;
use tandem_core::ids::ConnectionId;
use tandem_core::protocol::ServerEvent;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::{WS_BROADCAST_DROPS_TOTAL, WS_SLOW_CLIENT_EVICTIONS_TOTAL};
use crate::registry::EventSink;

/// Maximum total lifetime message drops before forcibly disconnecting a slow client.
const MAX_TOTAL_DROPS: u64 = 100;

/// Every open connection, addressable by ID.
///
/// Delivery is synchronous and non-blocking so it can run under the session
/// registry's lock.
pub struct BroadcastManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Connection count readable without taking the lock.
    active_count: AtomicUsize,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write();
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by ID.
    pub fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write();
        if conns.remove(connection_id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Serialize once, enqueue for each recipient, evict clients that keep
    /// falling behind.
    fn fan_out(&self, recipients: &[ConnectionId], event: &ServerEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to serialize event");
                return;
            }
        };

        let mut to_evict = Vec::new();
        {
            let conns = self.connections.read();
            let mut delivered = 0usize;
            for id in recipients {
                let Some(conn) = conns.get(id) else { continue };
                if conn.send(Arc::clone(&json)) {
                    delivered += 1;
                    continue;
                }
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                let drops = conn.drop_count();
                if drops >= MAX_TOTAL_DROPS {
                    warn!(conn_id = %conn.id, drops, "disconnecting slow client");
                    to_evict.push(Arc::clone(conn));
                } else {
                    warn!(conn_id = %conn.id, event = event.name(), total_drops = drops, "failed to send event to client (channel full)");
                }
            }
            debug!(event = event.name(), recipients = recipients.len(), delivered, "broadcast event");
        }

        if !to_evict.is_empty() {
            let mut conns = self.connections.write();
            for conn in to_evict {
                if conns.remove(&conn.id).is_some() {
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                    counter!(WS_SLOW_CLIENT_EVICTIONS_TOTAL).increment(1);
                }
                conn.close();
            }
        }
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastManager {
    fn deliver(&self, recipients: &[ConnectionId], event: &ServerEvent) {
        self.fan_out(recipients, event);
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn make_connection(id: &str, capacity: usize) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(ClientConnection::new(ConnectionId::from_raw(id), tx)), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push((*msg).clone());
        }
        out
    }

    #[test]
    fn add_remove_keeps_count_consistent() {
        let bm = BroadcastManager::new();
        let (c1, _rx1) = make_connection("c1", 4);
        let (c2, _rx2) = make_connection("c2", 4);
        let (c1_dup, _rx3) = make_connection("c1", 4);
        bm.add(c1);
        bm.add(c2);
        bm.add(c1_dup);
        assert_eq!(bm.connection_count(), 2);
        bm.remove(&ConnectionId::from_raw("c1"));
        bm.remove(&ConnectionId::from_raw("nope"));
        assert_eq!(bm.connection_count(), 1);
    }

    #[test]
    fn deliver_reaches_only_recipients() {
        let bm = BroadcastManager::new();
        let (a, mut rx_a) = make_connection("a", 4);
        let (b, mut rx_b) = make_connection("b", 4);
        let (c, mut rx_c) = make_connection("c", 4);
        bm.add(a.clone());
        bm.add(b);
        bm.add(c.clone());

        bm.deliver(&[a.id.clone(), c.id.clone()], &ServerEvent::TimerFinished);
        assert_eq!(drain(&mut rx_a), vec![r#"{"event":"timer-finished"}"#]);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(drain(&mut rx_c).len(), 1);
    }

    #[test]
    fn unknown_recipients_are_skipped() {
        let bm = BroadcastManager::new();
        let (a, mut rx_a) = make_connection("a", 4);
        bm.add(a.clone());
        bm.deliver(
            &[ConnectionId::from_raw("gone"), a.id.clone()],
            &ServerEvent::SessionEnded,
        );
        assert_eq!(drain(&mut rx_a).len(), 1);
    }

    #[test]
    fn frames_keep_delivery_order() {
        let bm = BroadcastManager::new();
        let (a, mut rx_a) = make_connection("a", 16);
        bm.add(a.clone());
        for remaining in [300, 200, 100] {
            bm.deliver(std::slice::from_ref(&a.id), &ServerEvent::TimerUpdate { remaining });
        }
        bm.deliver(std::slice::from_ref(&a.id), &ServerEvent::TimerFinished);

        let names: Vec<String> = drain(&mut rx_a)
            .iter()
            .map(|f| serde_json::from_str::<serde_json::Value>(f).unwrap()["event"].to_string())
            .collect();
        assert_eq!(
            names,
            [
                "\"timer-update\"",
                "\"timer-update\"",
                "\"timer-update\"",
                "\"timer-finished\""
            ]
        );
    }

    #[test]
    fn slow_client_is_evicted_after_threshold() {
        let bm = BroadcastManager::new();
        let (slow, _slow_rx) = make_connection("slow", 1);
        let (fast, mut fast_rx) = make_connection("fast", 4);
        bm.add(slow.clone());
        bm.add(fast.clone());
        let both = [slow.id.clone(), fast.id.clone()];

        // first send fills the slow buffer, the rest are drops
        for _ in 0..MAX_TOTAL_DROPS {
            bm.deliver(&both, &ServerEvent::TimerFinished);
            let _ = drain(&mut fast_rx);
        }
        assert_eq!(bm.connection_count(), 2);
        assert!(!slow.is_closed());

        bm.deliver(&both, &ServerEvent::TimerFinished);
        assert_eq!(bm.connection_count(), 1);
        assert!(slow.is_closed());
        assert!(!fast.is_closed());
        assert_eq!(drain(&mut fast_rx).len(), 1);
    }

    #[test]
    fn fast_client_is_never_evicted() {
        let bm = BroadcastManager::new();
        let (fast, mut rx) = make_connection("fast", 2);
        bm.add(fast.clone());
        for _ in 0..(MAX_TOTAL_DROPS * 2) {
            bm.deliver(std::slice::from_ref(&fast.id), &ServerEvent::TimerFinished);
            let _ = drain(&mut rx);
        }
        assert_eq!(bm.connection_count(), 1);
        assert_eq!(fast.drop_count(), 0);
    }
}
