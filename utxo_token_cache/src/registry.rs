// Pool registry
//
// The only structure shared across pools. Maps each pool key to the handle
// of the worker that exclusively owns that pool's cache state. Pool creation
// is insert-if-absent under the map's shard lock.

use crate::error::Result;
use crate::types::{TokenPoolEvent, TokenPoolKey, TokenPoolResponse};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

/// One event plus the channel its result goes back on
#[derive(Debug)]
pub struct PoolCommand {
    pub event: TokenPoolEvent,
    pub reply: oneshot::Sender<Result<TokenPoolResponse>>,
}

/// Sending side of a pool worker's queue
#[derive(Clone, Debug)]
pub struct PoolWorkerHandle {
    sender: mpsc::Sender<PoolCommand>,
}

impl PoolWorkerHandle {
    pub fn new(sender: mpsc::Sender<PoolCommand>) -> Self {
        Self { sender }
    }

    /// Queue a command. Gives the command back if the worker has stopped.
    pub async fn send(&self, command: PoolCommand) -> std::result::Result<(), PoolCommand> {
        self.sender.send(command).await.map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Lazily populated map of live pools
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: DashMap<TokenPoolKey, PoolWorkerHandle>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `pool_key`, spawning a worker if the pool has none or its
    /// worker has stopped. `spawn` runs at most once per call.
    pub fn get_or_spawn<F>(&self, pool_key: &TokenPoolKey, spawn: F) -> PoolWorkerHandle
    where
        F: FnOnce() -> PoolWorkerHandle,
    {
        match self.pools.entry(pool_key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    occupied.insert(spawn());
                }
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(spawn()).value().clone(),
        }
    }

    /// Forget a pool whose worker has stopped. Live workers are kept.
    pub fn remove_if_closed(&self, pool_key: &TokenPoolKey) -> bool {
        self.pools
            .remove_if(pool_key, |_, handle| handle.is_closed())
            .is_some()
    }

    /// Drop every handle; workers exit once their queues drain.
    pub fn clear(&self) {
        self.pools.clear();
    }

    pub fn contains(&self, pool_key: &TokenPoolKey) -> bool {
        self.pools.contains_key(pool_key)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn pool_keys(&self) -> Vec<TokenPoolKey> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(holder: &str) -> TokenPoolKey {
        TokenPoolKey::new(holder, "cash", "issuer", "notary", "USD").unwrap()
    }

    #[test]
    fn test_spawns_once_per_pool() {
        let registry = PoolRegistry::new();
        let mut receivers = Vec::new();
        let mut spawned = 0;

        for _ in 0..3 {
            registry.get_or_spawn(&key("alice"), || {
                spawned += 1;
                let (tx, rx) = mpsc::channel(4);
                receivers.push(rx);
                PoolWorkerHandle::new(tx)
            });
        }

        assert_eq!(spawned, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&key("alice")));
    }

    #[test]
    fn test_replaces_stopped_worker() {
        let registry = PoolRegistry::new();

        let (tx, rx) = mpsc::channel(4);
        registry.get_or_spawn(&key("alice"), || PoolWorkerHandle::new(tx));
        drop(rx);

        let (tx2, _rx2) = mpsc::channel(4);
        let handle = registry.get_or_spawn(&key("alice"), || PoolWorkerHandle::new(tx2));
        assert!(!handle.is_closed());
        assert!(!registry.remove_if_closed(&key("alice")));
    }

    #[test]
    fn test_remove_if_closed() {
        let registry = PoolRegistry::new();
        let (tx, rx) = mpsc::channel(4);
        registry.get_or_spawn(&key("bob"), || PoolWorkerHandle::new(tx));
        drop(rx);

        assert!(registry.remove_if_closed(&key("bob")));
        assert!(registry.is_empty());
    }
}
