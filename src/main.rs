use anyhow::Result;
use serde_json::{Map, json};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use statebus::Store;
use statebus::watchers::{change_count, key_log};

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting statebus demo");

    let store = Store::new();
    store.set("msg", json!("hello"));

    // Count every mutation of "msg" into "change_count".
    let counter = change_count::watch_message_changes(&store)?;
    key_log::attach(&store, key_log::KeyLogSettings::default());

    store.set("msg", json!("hello world"));
    store.set("msg", json!("hello again"));
    store.set("other", json!(42));

    let mut batch = Map::new();
    batch.insert("msg".into(), json!("batched"));
    batch.insert("other".into(), json!(43));
    store.update(batch);

    info!(change_count = ?store.get("change_count"), "Demo finished");

    store.remove_listener(counter);
    Ok(())
}
