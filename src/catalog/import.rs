use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::room::Room;
use super::store::RoomStore;

/// Read rooms from a JSON (array of objects) or YAML file.
pub fn load_rooms_file(path: &Path) -> Result<Vec<Room>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rooms file {}", path.display()))?;

    let rooms: Vec<Room> = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
    };
    Ok(rooms)
}

/// Upsert every room into the catalog, in order, embedding
/// [`Room::embedding_text`] in batches.
pub async fn import_rooms(store: &RoomStore, rooms: &[Room]) -> Result<usize> {
    let entries: Vec<(Room, String)> = rooms
        .iter()
        .map(|room| (room.clone(), room.embedding_text()))
        .collect();
    store
        .upsert_batch(&entries)
        .await
        .context("failed to import rooms")
}

/// Load a rooms file and import it. Returns the number of rooms written.
pub async fn import_rooms_file(store: &RoomStore, path: &Path) -> Result<usize> {
    let rooms = load_rooms_file(path)?;
    let count = import_rooms(store, &rooms).await?;
    info!(path = %path.display(), count, "rooms imported");
    Ok(count)
}
