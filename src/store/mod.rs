use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tracing::debug;

use crate::events::StateUpdate;

type Listener = Arc<dyn Fn(&StateUpdate) + Send + Sync>;

/// Handle returned by [`Store::add_listener`], used to detach it later.
/// Ids are unique for the lifetime of the store and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Shared {
    values: RwLock<Map<String, Value>>,
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

/// Shared keyed state store.
///
/// Values are named `serde_json::Value`s. Every mutation that actually
/// changes something publishes one [`StateUpdate`] to all listeners, after
/// the write lock is released and with the new values fully visible. Writing
/// a value equal to the stored one is a no-op and publishes nothing.
///
/// Cloning is cheap and yields a handle to the same state.
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::seeded(Map::new())
    }

    /// Create a store pre-populated with `entries`. Seeding publishes nothing.
    pub fn seeded(entries: Map<String, Value>) -> Self {
        Self {
            shared: Arc::new(Shared {
                values: RwLock::new(entries),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Current value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.shared.values.read().unwrap().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.shared.values.read().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shared.values.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.values.read().unwrap().is_empty()
    }

    /// Snapshot of the whole state.
    pub fn to_map(&self) -> Map<String, Value> {
        self.shared.values.read().unwrap().clone()
    }

    /// Store `value` under `key`, notifying listeners if the value changed.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let changed = {
            let mut values = self.shared.values.write().unwrap();
            if values.get(&key) == Some(&value) {
                false
            } else {
                values.insert(key.clone(), value);
                true
            }
        };
        if changed {
            self.dispatch(StateUpdate::dirty(vec![key]));
        }
    }

    /// Store many values at once. Listeners receive at most one update,
    /// carrying exactly the keys whose values changed.
    pub fn update(&self, entries: Map<String, Value>) {
        let mut changed = Vec::new();
        {
            let mut values = self.shared.values.write().unwrap();
            for (key, value) in entries {
                if values.get(&key) == Some(&value) {
                    continue;
                }
                values.insert(key.clone(), value);
                changed.push(key);
            }
        }
        if !changed.is_empty() {
            self.dispatch(StateUpdate::dirty(changed));
        }
    }

    /// Replace the whole state with `entries`, as after a full resync.
    /// Publishes a single clean-state update listing every key of the new map.
    pub fn replace(&self, entries: Map<String, Value>) {
        let keys: Vec<String> = entries.keys().cloned().collect();
        {
            let mut values = self.shared.values.write().unwrap();
            *values = entries;
        }
        if !keys.is_empty() {
            self.dispatch(StateUpdate::clean(keys));
        }
    }

    /// Return the value under `key`, inserting `value` first if the key is
    /// absent. Insertion counts as a change.
    pub fn set_default(&self, key: impl Into<String>, value: Value) -> Value {
        let key = key.into();
        let (current, inserted) = {
            let mut values = self.shared.values.write().unwrap();
            match values.get(&key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    values.insert(key.clone(), value.clone());
                    (value, true)
                }
            }
        };
        if inserted {
            self.dispatch(StateUpdate::dirty(vec![key]));
        }
        current
    }

    /// Atomic read-modify-write of a single key. `f` maps the current value
    /// (`Value::Null` when absent) to the new one while the write lock is
    /// held; listeners are notified after the lock drops, and only if the
    /// value changed.
    pub fn modify(&self, key: impl Into<String>, f: impl FnOnce(Value) -> Value) {
        let key = key.into();
        let changed = {
            let mut values = self.shared.values.write().unwrap();
            let current = values.get(&key).cloned().unwrap_or(Value::Null);
            let next = f(current);
            if values.get(&key) == Some(&next) {
                false
            } else {
                values.insert(key.clone(), next);
                true
            }
        };
        if changed {
            self.dispatch(StateUpdate::dirty(vec![key]));
        }
    }

    /// Register a listener, invoked synchronously and in registration order
    /// for every published update. No store lock is held during the call, so
    /// a listener may read from or mutate the store; nested mutations
    /// dispatch recursively.
    pub fn add_listener(&self, f: impl Fn(&StateUpdate) + Send + Sync + 'static) -> ListenerId {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners.write().unwrap().push((id, Arc::new(f)));
        ListenerId(id)
    }

    /// Detach a listener. Returns false if the id was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.write().unwrap();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id.0);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.read().unwrap().len()
    }

    fn dispatch(&self, update: StateUpdate) {
        debug!(kind = update.kind.as_str(), keys = ?update.keys, "state update");
        // Snapshot the registry so listeners can add or remove listeners
        // (including themselves) without deadlocking.
        let snapshot: Vec<Listener> = self
            .shared
            .listeners
            .read()
            .unwrap()
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        for listener in &snapshot {
            listener(&update);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
