use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::store::{ListenerId, Store};

/// Which keys to trace. An empty list traces every changed key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyLogSettings {
    pub keys: Vec<String>,
}

pub fn parse_settings(v: &Map<String, Value>) -> KeyLogSettings {
    let keys = v
        .get("keys")
        .and_then(|x| x.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    KeyLogSettings { keys }
}

/// Attach a tracer that logs `key = value` for every watched key that
/// changed. Pure observation, never mutates the store.
pub fn attach(store: &Store, settings: KeyLogSettings) -> ListenerId {
    let deps: HashSet<String> = settings.keys.into_iter().collect();
    let inner = store.clone();
    store.add_listener(move |update| {
        for key in &update.keys {
            // Skip if we have explicit deps and the changed key isn't one of them
            if !deps.is_empty() && !deps.contains(key) {
                continue;
            }
            let value = inner.get(key).unwrap_or(Value::Null);
            info!(
                watcher = super::ids::KEY_LOG,
                kind = update.kind.as_str(),
                %key,
                %value,
                "changed"
            );
        }
    })
}
