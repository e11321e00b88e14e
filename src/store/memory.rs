//! In-memory album store, optionally seeded from a JSON library snapshot.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::{AlbumRow, AlbumStore};
use crate::album::{AlbumIcon, AlbumId, AlbumType};

/// Number of items directly inside one album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub album_type: AlbumType,
    pub id: AlbumId,
    pub count: i64,
}

/// On-disk layout of a library snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub albums: Vec<AlbumRow>,
    #[serde(default)]
    pub item_counts: Vec<ItemCount>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<(AlbumType, AlbumId), AlbumRow>,
    counts: HashMap<(AlbumType, AlbumId), i64>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = AlbumRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| ((row.album_type, row.id), row))
            .collect();
        Self {
            rows,
            counts: HashMap::new(),
            read_only: false,
        }
    }

    /// Load a snapshot written as `{ "albums": [ ... ], "item_counts": [ ... ] }`.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read library snapshot {:?}", path))?;
        let snapshot: LibrarySnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse library snapshot {:?}", path))?;

        let mut store = Self::from_rows(snapshot.albums);
        for item in snapshot.item_counts {
            store.set_item_count(item.album_type, item.id, item.count);
        }
        Ok(store)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut item_counts: Vec<ItemCount> = self
            .counts
            .iter()
            .map(|((album_type, id), count)| ItemCount {
                album_type: *album_type,
                id: *id,
                count: *count,
            })
            .collect();
        item_counts.sort_by_key(|c| (c.album_type, c.id));

        let snapshot = LibrarySnapshot {
            albums: self.rows.values().cloned().collect(),
            item_counts,
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write library snapshot {:?}", path))?;
        Ok(())
    }

    /// Reject every write, as a store on a read-only medium would.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn row(&self, album_type: AlbumType, id: AlbumId) -> Option<&AlbumRow> {
        self.rows.get(&(album_type, id))
    }

    pub fn set_item_count(&mut self, album_type: AlbumType, id: AlbumId, count: i64) {
        self.counts.insert((album_type, id), count);
    }

    /// Item counts by album, as loaded from the snapshot.
    pub fn item_counts(&self) -> &HashMap<(AlbumType, AlbumId), i64> {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            bail!("Album store is read-only");
        }
        Ok(())
    }

    fn row_mut(&mut self, album_type: AlbumType, id: AlbumId) -> Result<&mut AlbumRow> {
        self.rows
            .get_mut(&(album_type, id))
            .with_context(|| format!("No {} row with id {}", album_type.display_name(), id))
    }

    /// Rewrite container paths below `old` to live below `new`.
    fn rewrite_child_paths(&mut self, old: &str, new: &str) {
        let prefix = format!("{}/", old.trim_end_matches('/'));
        for ((album_type, _), row) in self.rows.iter_mut() {
            if *album_type != AlbumType::Container {
                continue;
            }
            if let Some(path) = row.path.as_mut() {
                if let Some(rest) = path.strip_prefix(&prefix) {
                    *path = format!("{}/{}", new.trim_end_matches('/'), rest);
                }
            }
        }
    }
}

fn replace_last_component(path: &str, title: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => format!("{}/{}", parent, title),
        _ => format!("/{}", title),
    }
}

impl AlbumStore for MemoryStore {
    fn list_album_rows(&self, album_type: AlbumType) -> Result<Vec<AlbumRow>> {
        Ok(self
            .rows
            .range((album_type, 0)..=(album_type, AlbumId::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn create_row(&mut self, row: &AlbumRow) -> Result<()> {
        self.check_writable()?;
        let key = (row.album_type, row.id);
        if self.rows.contains_key(&key) {
            bail!("{} row {} already exists", row.album_type.display_name(), row.id);
        }
        self.rows.insert(key, row.clone());
        Ok(())
    }

    fn delete_rows(&mut self, album_type: AlbumType, ids: &[AlbumId]) -> Result<()> {
        self.check_writable()?;
        for id in ids {
            self.rows.remove(&(album_type, *id));
        }
        Ok(())
    }

    fn rename_row(&mut self, album_type: AlbumType, id: AlbumId, title: &str) -> Result<()> {
        self.check_writable()?;
        let row = self.row_mut(album_type, id)?;
        row.title = title.to_string();

        let moved = match row.path.as_mut() {
            Some(path) => {
                let old = path.clone();
                *path = replace_last_component(&old, title);
                Some((old, path.clone()))
            }
            None => None,
        };

        if let Some((old, new)) = moved {
            self.rewrite_child_paths(&old, &new);
        }
        Ok(())
    }

    fn reparent_row(
        &mut self,
        album_type: AlbumType,
        id: AlbumId,
        parent_id: AlbumId,
        path: Option<&str>,
    ) -> Result<()> {
        self.check_writable()?;
        let row = self.row_mut(album_type, id)?;
        row.parent_id = parent_id;

        let moved = match (row.path.as_mut(), path) {
            (Some(current), Some(new)) => {
                let old = std::mem::replace(current, new.to_string());
                Some((old, new.to_string()))
            }
            _ => None,
        };

        if let Some((old, new)) = moved {
            self.rewrite_child_paths(&old, &new);
        }
        Ok(())
    }

    fn set_icon_row(&mut self, album_type: AlbumType, id: AlbumId, icon: Option<&AlbumIcon>) -> Result<()> {
        self.check_writable()?;
        self.row_mut(album_type, id)?.icon = icon.cloned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn containers() -> MemoryStore {
        MemoryStore::from_rows(vec![
            AlbumRow::new(AlbumType::Container, 1, 0, "2024").with_path("/2024"),
            AlbumRow::new(AlbumType::Container, 2, 1, "Holidays").with_path("/2024/Holidays"),
            AlbumRow::new(AlbumType::Container, 3, 2, "Beach").with_path("/2024/Holidays/Beach"),
            AlbumRow::new(AlbumType::Tag, 1, 0, "People"),
        ])
    }

    #[test]
    fn test_list_rows_by_type() {
        let store = containers();
        assert_eq!(store.list_album_rows(AlbumType::Container).unwrap().len(), 3);
        assert_eq!(store.list_album_rows(AlbumType::Tag).unwrap().len(), 1);
        assert!(store.list_album_rows(AlbumType::Search).unwrap().is_empty());
    }

    #[test]
    fn test_rename_rewrites_descendant_paths() {
        let mut store = containers();
        store.rename_row(AlbumType::Container, 2, "Trips").unwrap();

        assert_eq!(store.row(AlbumType::Container, 2).unwrap().path.as_deref(), Some("/2024/Trips"));
        assert_eq!(
            store.row(AlbumType::Container, 3).unwrap().path.as_deref(),
            Some("/2024/Trips/Beach")
        );
        assert_eq!(store.row(AlbumType::Container, 1).unwrap().path.as_deref(), Some("/2024"));
    }

    #[test]
    fn test_reparent_rewrites_descendant_paths() {
        let mut store = containers();
        store
            .reparent_row(AlbumType::Container, 2, 0, Some("/Holidays"))
            .unwrap();

        let row = store.row(AlbumType::Container, 2).unwrap();
        assert_eq!(row.parent_id, 0);
        assert_eq!(row.path.as_deref(), Some("/Holidays"));
        assert_eq!(
            store.row(AlbumType::Container, 3).unwrap().path.as_deref(),
            Some("/Holidays/Beach")
        );
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut store = containers();
        store.set_read_only(true);
        assert!(store.rename_row(AlbumType::Tag, 1, "Persons").is_err());
        assert!(store.delete_rows(AlbumType::Tag, &[1]).is_err());
        assert_eq!(store.row(AlbumType::Tag, 1).unwrap().title, "People");
    }

    #[test]
    fn test_duplicate_create_fails() {
        let mut store = containers();
        let row = AlbumRow::new(AlbumType::Tag, 1, 0, "Again");
        assert!(store.create_row(&row).is_err());
    }

    #[test]
    fn test_json_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.json");

        let mut store = containers();
        store.set_item_count(AlbumType::Container, 3, 12);
        store.save_json(&path).unwrap();
        let loaded = MemoryStore::load_json(&path).unwrap();

        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.row(AlbumType::Container, 3).unwrap().title, "Beach");
        assert_eq!(loaded.item_counts().get(&(AlbumType::Container, 3)), Some(&12));
    }

    #[test]
    fn test_snapshot_row_defaults() {
        let json = r#"{ "albums": [ { "album_type": "tag", "id": 5, "title": "Pets" } ] }"#;
        let snapshot: LibrarySnapshot = serde_json::from_str(json).unwrap();
        let row = &snapshot.albums[0];
        assert_eq!(row.parent_id, 0);
        assert_eq!(row.path, None);
        assert!(!row.trash);
        assert!(snapshot.item_counts.is_empty());
    }
}
