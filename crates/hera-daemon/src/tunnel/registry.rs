//! In-memory map of active tunnels keyed by container identity.
//!
//! Owned by the controller and only touched from its event loop, so it needs
//! no locking.

use std::collections::HashMap;

use super::Tunnel;

#[derive(Debug, Default)]
pub struct TunnelRegistry {
    tunnels: HashMap<String, Tunnel>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tunnel` under `id`.
    ///
    /// Any entry already holding the same public hostname under another id is
    /// evicted, since both would share one service directory. Returns the
    /// evicted container ids.
    pub fn insert(&mut self, id: impl Into<String>, tunnel: Tunnel) -> Vec<String> {
        let id = id.into();
        let evicted: Vec<String> = self
            .tunnels
            .iter()
            .filter(|(other, t)| **other != id && t.hostname() == tunnel.hostname())
            .map(|(other, _)| other.clone())
            .collect();
        for other in &evicted {
            self.tunnels.remove(other);
        }
        self.tunnels.insert(id, tunnel);
        evicted
    }

    pub fn get(&self, id: &str) -> Option<&Tunnel> {
        self.tunnels.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Tunnel> {
        self.tunnels.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Tunnel> {
        self.tunnels.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tunnels.contains_key(id)
    }

    /// Container id currently holding `hostname`, if any.
    pub fn id_for_hostname(&self, hostname: &str) -> Option<&str> {
        self.tunnels
            .iter()
            .find(|(_, t)| t.hostname() == hostname)
            .map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }
}
