//! In-memory configuration store: snapshot reads via `ArcSwap` for
//! hot-swappable state, and a `parking_lot::Mutex`-serialized apply+fanout
//! path so overlapping updates never interleave.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::patch::ConfigPatch;
use super::{merge, GatewayConfig, SafeGatewayConfig};

pub type ChangeListener = Arc<dyn Fn(&ConfigPatch, &GatewayConfig) + Send + Sync>;

pub struct ConfigStore {
    current: ArcSwap<GatewayConfig>,
    // Guards the apply-then-fanout sequence so two concurrent `update`
    // calls cannot interleave their listener notifications.
    write_lock: Mutex<()>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl ConfigStore {
    pub fn new(initial: GatewayConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// An immutable snapshot. Later `update` calls cannot mutate what's
    /// already been handed out here.
    pub fn get(&self) -> Arc<GatewayConfig> {
        self.current.load_full()
    }

    pub fn get_safe(&self) -> SafeGatewayConfig {
        self.current.load().to_safe()
    }

    /// Register a listener, invoked synchronously after every `update`
    /// with `(patch, new_config)`, in registration order.
    pub fn on_change(&self, listener: ChangeListener) {
        self.listeners.lock().push(listener);
    }

    /// Apply a validated partial patch and fan it out to every listener.
    /// Serialized against itself: only one `update` is ever "in the
    /// critical section" at a time.
    pub fn update(&self, patch: ConfigPatch) -> Arc<GatewayConfig> {
        let _guard = self.write_lock.lock();

        let current = self.current.load_full();
        let merged = merge::apply(&current, &patch);
        let next = Arc::new(merged);
        self.current.store(next.clone());

        let listeners = self.listeners.lock().clone();
        for listener in listeners.iter() {
            listener(&patch, &next);
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::patch::ServerPatch;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_and_get_safe_mask_secrets() {
        let mut cfg = GatewayConfig::default();
        cfg.openclaw_gateway_token = "super-secret".to_string();
        let store = ConfigStore::new(cfg);
        let safe = store.get_safe();
        assert_eq!(safe.openclaw_gateway_token, crate::config::SECRET_MASK);
    }

    #[test]
    fn update_invokes_every_listener_exactly_once_in_order() {
        let store = ConfigStore::new(GatewayConfig::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        store.on_change(Arc::new(move |_patch, _cfg| order_a.lock().push("a")));
        let order_b = order.clone();
        store.on_change(Arc::new(move |_patch, _cfg| order_b.lock().push("b")));

        store.update(ConfigPatch {
            server: Some(ServerPatch {
                port: Some(9000),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn empty_patch_update_still_fires_listeners_once() {
        let store = ConfigStore::new(GatewayConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        store.on_change(Arc::new(move |_patch, _cfg| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let before = store.get();
        store.update(ConfigPatch::default());
        let after = store.get();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*before, *after);
    }

    #[test]
    fn snapshots_are_unaffected_by_later_updates() {
        let store = ConfigStore::new(GatewayConfig::default());
        let before = store.get();
        store.update(ConfigPatch {
            server: Some(ServerPatch {
                port: Some(1234),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(before.server.port, 4400);
        assert_eq!(store.get().server.port, 1234);
    }
}
