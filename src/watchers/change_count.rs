use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::events::UpdateKind;
use crate::store::{ListenerId, Store};

/// Attach a change counter with the stock configuration: every mutation of
/// `msg` bumps the integer stored under `change_count` by one.
pub fn watch_message_changes(store: &Store) -> Result<ListenerId> {
    attach(store, ChangeCountSettings::default())
}

/// Attach a counter that increments every time the watched key is mutated.
///
/// The counter is initialised to 0 when absent, so the first qualifying
/// update never reads a missing value. Only dirty-state updates that touch
/// the watched key count; clean-state resyncs and unrelated keys leave the
/// counter alone. The increment is a single atomic read-modify-write through
/// the store, and the resulting write notifies downstream listeners like any
/// other mutation.
pub fn attach(store: &Store, settings: ChangeCountSettings) -> Result<ListenerId> {
    if settings.watched_key == settings.counter_key {
        // Counting into the watched key would have the counter feed itself.
        bail!(
            "watched key and counter key must differ (both are {:?})",
            settings.watched_key
        );
    }

    store.set_default(settings.counter_key.as_str(), Value::from(0));

    let ChangeCountSettings { watched_key, counter_key } = settings;
    debug!(
        watcher = super::ids::CHANGE_COUNT,
        watched = %watched_key,
        counter = %counter_key,
        "attached"
    );

    let inner = store.clone();
    Ok(store.add_listener(move |update| {
        if update.kind != UpdateKind::DirtyState || !update.touches(&watched_key) {
            return;
        }
        inner.modify(counter_key.as_str(), |current| {
            let base = match current.as_i64() {
                Some(n) => n,
                None => {
                    if !current.is_null() {
                        warn!(key = %counter_key, value = %current, "counter is not an integer, treating as 0");
                    }
                    0
                }
            };
            Value::from(base.saturating_add(1))
        });
    }))
}

// ── Settings ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeCountSettings {
    /// Key whose mutations are counted.
    pub watched_key: String,
    /// Key the running count is stored under.
    pub counter_key: String,
}

impl Default for ChangeCountSettings {
    fn default() -> Self {
        Self {
            watched_key: "msg".to_string(),
            counter_key: "change_count".to_string(),
        }
    }
}

pub fn parse_settings(v: &Map<String, Value>) -> ChangeCountSettings {
    let mut s = ChangeCountSettings::default();
    if let Some(k) = get_str(v, "watchedKey") {
        s.watched_key = k.to_string();
    }
    if let Some(k) = get_str(v, "counterKey") {
        s.counter_key = k.to_string();
    }
    s
}

fn get_str<'a>(v: &'a Map<String, Value>, k: &str) -> Option<&'a str> {
    v.get(k)?.as_str().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn count(store: &Store) -> i64 {
        store.get("change_count").and_then(|v| v.as_i64()).unwrap()
    }

    #[test]
    fn qualifying_update_increments_from_zero() {
        let store = Store::new();
        watch_message_changes(&store).unwrap();
        assert_eq!(count(&store), 0);

        store.set("msg", json!("hello"));
        assert_eq!(count(&store), 1);
    }

    #[test]
    fn unrelated_key_leaves_counter_alone() {
        let store = Store::new();
        store.set("change_count", json!(5));
        watch_message_changes(&store).unwrap();

        store.set("other", json!("hello"));
        assert_eq!(count(&store), 5);
    }

    #[test]
    fn clean_state_update_leaves_counter_alone() {
        let store = Store::new();
        store.set("change_count", json!(5));
        watch_message_changes(&store).unwrap();

        let mut full = Map::new();
        full.insert("msg".into(), json!("resynced"));
        full.insert("change_count".into(), json!(5));
        store.replace(full);

        assert_eq!(count(&store), 5);
    }

    #[test]
    fn two_qualifying_updates_count_twice() {
        let store = Store::new();
        watch_message_changes(&store).unwrap();

        store.set("msg", json!("first"));
        store.set("msg", json!("second"));
        assert_eq!(count(&store), 2);
    }

    #[test]
    fn batched_update_touching_the_key_counts_once() {
        let store = Store::new();
        watch_message_changes(&store).unwrap();

        let mut batch = Map::new();
        batch.insert("msg".into(), json!("hello"));
        batch.insert("other".into(), json!(1));
        store.update(batch);

        assert_eq!(count(&store), 1);
    }

    #[test]
    fn non_integer_counter_restarts_from_zero() {
        let store = Store::new();
        store.set("change_count", json!("not a number"));
        watch_message_changes(&store).unwrap();

        store.set("msg", json!("hello"));
        assert_eq!(count(&store), 1);
    }

    #[test]
    fn custom_keys_are_honoured() {
        let store = Store::new();
        let settings = ChangeCountSettings {
            watched_key: "status".into(),
            counter_key: "status_changes".into(),
        };
        attach(&store, settings).unwrap();

        store.set("msg", json!("ignored"));
        store.set("status", json!("ready"));

        let n = store.get("status_changes").and_then(|v| v.as_i64());
        assert_eq!(n, Some(1));
    }

    #[test]
    fn identical_keys_are_rejected() {
        let store = Store::new();
        let settings = ChangeCountSettings {
            watched_key: "n".into(),
            counter_key: "n".into(),
        };
        assert!(attach(&store, settings).is_err());
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn settings_parse_with_fallbacks() {
        let mut v = Map::new();
        v.insert("watchedKey".into(), json!("status"));
        v.insert("counterKey".into(), json!("  ")); // blank falls back
        let s = parse_settings(&v);
        assert_eq!(s.watched_key, "status");
        assert_eq!(s.counter_key, "change_count");

        let s = parse_settings(&Map::new());
        assert_eq!(s.watched_key, "msg");
    }
}
