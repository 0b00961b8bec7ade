use serde::{Deserialize, Serialize};

/// Discriminator carried by every [`StateUpdate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    /// One or more keys were mutated in place.
    DirtyState,
    /// The whole state was replaced by a full resync.
    CleanState,
}

impl UpdateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateKind::DirtyState => "dirty-state",
            UpdateKind::CleanState => "clean-state",
        }
    }
}

/// Published to every listener after a store mutation lands.
/// Subscribed by `watchers::change_count` (to bump its counter)
/// and `watchers::key_log` (to trace changed values).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateUpdate {
    pub kind: UpdateKind,
    /// Names whose values changed, each listed exactly once.
    pub keys: Vec<String>,
}

impl StateUpdate {
    pub fn dirty(keys: Vec<String>) -> Self {
        Self { kind: UpdateKind::DirtyState, keys }
    }

    pub fn clean(keys: Vec<String>) -> Self {
        Self { kind: UpdateKind::CleanState, keys }
    }

    /// Whether `key` is among the changed names.
    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}
