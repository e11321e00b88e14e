//! Per-observer state attached to albums without touching the shared nodes.

use std::collections::HashMap;

use super::{AlbumEvent, AlbumHandle, AlbumManager};

/// Values keyed by album handle, owned by whichever view or model needs them.
///
/// Feed it the manager's events through [`SideTable::album_event`] so entries
/// of removed albums do not linger.
#[derive(Debug, Clone)]
pub struct SideTable<T> {
    entries: HashMap<AlbumHandle, T>,
}

impl<T> SideTable<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, handle: AlbumHandle) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: AlbumHandle) -> Option<&mut T> {
        self.entries.get_mut(&handle)
    }

    pub fn insert(&mut self, handle: AlbumHandle, value: T) -> Option<T> {
        self.entries.insert(handle, value)
    }

    pub fn remove(&mut self, handle: AlbumHandle) -> Option<T> {
        self.entries.remove(&handle)
    }

    pub fn contains(&self, handle: AlbumHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlbumHandle, &T)> {
        self.entries.iter().map(|(h, v)| (*h, v))
    }

    /// Drop entries whose album no longer exists.
    pub fn retain_live(&mut self, manager: &AlbumManager) {
        self.entries.retain(|h, _| manager.contains(*h));
    }

    /// Purge the entry of a removed album. Moves keep their entries.
    pub fn album_event(&mut self, event: &AlbumEvent) {
        if let AlbumEvent::Removed { handle, .. } = event {
            self.entries.remove(handle);
        }
    }
}

impl<T> Default for SideTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
