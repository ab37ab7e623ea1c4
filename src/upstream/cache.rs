//! Per-port transport cache.
//!
//! # Responsibilities
//! - Create the forwarding transport for a dynamic port on first use
//! - Hand out the same instance for every later request to that port
//!
//! # Design Decisions
//! - Created once at startup and injected into the application state
//! - Entries are never evicted: at most one per allowed port
//! - `DashMap::entry` holds the shard lock while the factory runs, so two
//!   concurrent first requests still produce a single transport

use std::sync::Arc;

use dashmap::DashMap;

use crate::observability::metrics;

/// Builds the transport used to reach one dynamic port.
pub trait TransportFactory: Send + Sync + 'static {
    type Transport: Send + Sync + 'static;

    fn create(&self, port: u16) -> Self::Transport;
}

/// Process-wide map from port to its forwarding transport.
pub struct TransportCache<F: TransportFactory> {
    factory: F,
    entries: DashMap<u16, Arc<F::Transport>>,
}

impl<F: TransportFactory> TransportCache<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            entries: DashMap::new(),
        }
    }

    /// Return the transport for `port`, creating it if this is the first use.
    pub fn get_or_create(&self, port: u16) -> Arc<F::Transport> {
        if let Some(existing) = self.entries.get(&port) {
            return Arc::clone(existing.value());
        }

        let entry = self.entries.entry(port).or_insert_with(|| {
            tracing::info!(port, "Creating forwarding transport");
            metrics::record_transport_created();
            Arc::new(self.factory.create(port))
        });
        Arc::clone(entry.value())
    }

    /// Number of ports with a live transport.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.entries.contains_key(&port)
    }
}

impl<F: TransportFactory> std::fmt::Debug for TransportCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCache")
            .field("ports", &self.entries.len())
            .finish()
    }
}
