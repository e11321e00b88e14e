//! The album registry: sole owner of the four album trees.
//!
//! All structural mutations go through [`AlbumManager`]. Each one is
//! validated first, applied in memory, mirrored to the [`AlbumStore`], and
//! rolled back if the store refuses it. Observers registered with
//! [`AlbumManager::subscribe`] are notified synchronously, in registration
//! order, once a mutation has succeeded.

use chrono::Datelike;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::arena::{AlbumArena, Ancestors, Children, Descendants, Links};
use super::{
    Album, AlbumHandle, AlbumIcon, AlbumId, AlbumKind, AlbumType, ContainerInfo, DateInfo,
    DateRange, GlobalId, SearchInfo, SearchKind, TagInfo, ID_SPACE_PER_TYPE,
};
use crate::error::{AlbumError, Result};
use crate::signal::{ListenerId, Listeners};
use crate::store::{AlbumRow, AlbumStore, MemoryStore};

/// Structural change notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum AlbumEvent {
    AboutToBeAdded {
        parent: AlbumHandle,
        album_type: AlbumType,
        id: AlbumId,
    },
    Added(AlbumHandle),
    /// Sent while the album is still readable through the manager.
    AboutToBeRemoved(AlbumHandle),
    /// Sent once per removed album, children before parents.
    Removed {
        handle: AlbumHandle,
        album_type: AlbumType,
        id: AlbumId,
    },
    Moved(AlbumHandle),
    Renamed(AlbumHandle),
    IconChanged(AlbumHandle),
    /// Query or kind of a temporary search was replaced.
    SearchUpdated(AlbumHandle),
    CurrentChanged(Vec<AlbumHandle>),
}

/// An album about to be inserted with an id assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub id: AlbumId,
    pub title: String,
    pub kind: AlbumKind,
}

impl NewAlbum {
    pub fn new(id: AlbumId, title: impl Into<String>, kind: AlbumKind) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
        }
    }
}

#[derive(Debug, Default)]
struct TypeIndex {
    root: Option<AlbumHandle>,
    /// Live albums in creation order.
    albums: Vec<AlbumHandle>,
    by_id: HashMap<AlbumId, AlbumHandle>,
    /// Next id handed out by `create_album`. Only ever grows.
    next_id: AlbumId,
}

pub struct AlbumManager {
    arena: AlbumArena,
    indices: [TypeIndex; 4],
    by_path: HashMap<String, AlbumHandle>,
    by_global_id: HashMap<GlobalId, AlbumHandle>,
    current: Vec<AlbumHandle>,
    store: Box<dyn AlbumStore>,
    listeners: Listeners<AlbumEvent>,
    generation: u64,
}

impl AlbumManager {
    pub fn new(store: impl AlbumStore + 'static) -> Self {
        Self {
            arena: AlbumArena::new(),
            indices: Default::default(),
            by_path: HashMap::new(),
            by_global_id: HashMap::new(),
            current: Vec::new(),
            store: Box::new(store),
            listeners: Listeners::new(),
            generation: 0,
        }
    }

    /// A manager backed by an empty [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn store(&self) -> &dyn AlbumStore {
        self.store.as_ref()
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn subscribe(&mut self, callback: impl FnMut(&AlbumEvent) + 'static) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn emit(&mut self, event: AlbumEvent) {
        self.listeners.emit(&event);
    }

    // ========================================================================
    // Look-ups
    // ========================================================================

    pub fn get(&self, handle: AlbumHandle) -> Option<&Album> {
        self.arena.get(handle)
    }

    pub fn contains(&self, handle: AlbumHandle) -> bool {
        self.arena.contains(handle)
    }

    pub fn root(&self, album_type: AlbumType) -> Option<AlbumHandle> {
        self.indices[album_type.index()].root
    }

    /// Live albums of a type, root included, in creation order.
    pub fn albums(&self, album_type: AlbumType) -> &[AlbumHandle] {
        &self.indices[album_type.index()].albums
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn find_by_id(&self, album_type: AlbumType, id: AlbumId) -> Option<AlbumHandle> {
        self.indices[album_type.index()].by_id.get(&id).copied()
    }

    pub fn find_by_global_id(&self, global_id: GlobalId) -> Option<AlbumHandle> {
        self.by_global_id.get(&global_id).copied()
    }

    /// Container album by its path. Redundant and trailing slashes are ignored.
    pub fn find_by_path(&self, path: &str) -> Option<AlbumHandle> {
        self.by_path.get(&normalize_path(path)).copied()
    }

    /// Tag by its slash-separated title path, e.g. `People/Family`.
    pub fn find_tag_by_path(&self, path: &str) -> Option<AlbumHandle> {
        let mut current = self.root(AlbumType::Tag)?;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = self.child_with_title(current, part, None)?;
        }
        Some(current)
    }

    /// Slash-separated titles from the top-level tag down to `handle`.
    pub fn tag_path(&self, handle: AlbumHandle) -> Option<String> {
        let album = self.get(handle)?;
        if album.album_type() != AlbumType::Tag {
            return None;
        }
        let mut parts = vec![album.title.as_str()];
        for ancestor in self.ancestors(handle) {
            match self.get(ancestor) {
                Some(a) if !a.is_root => parts.push(a.title.as_str()),
                _ => {}
            }
        }
        parts.reverse();
        Some(parts.join("/"))
    }

    pub fn children(&self, parent: AlbumHandle) -> Children<'_> {
        self.arena.children(parent)
    }

    /// Pre-order walk below `root`, not including it.
    pub fn descendants(&self, root: AlbumHandle) -> Descendants<'_> {
        self.arena.descendants(root)
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, handle: AlbumHandle) -> Ancestors<'_> {
        self.arena.ancestors(handle)
    }

    pub fn is_ancestor_of(&self, ancestor: AlbumHandle, descendant: AlbumHandle) -> bool {
        self.arena.is_ancestor_of(ancestor, descendant)
    }

    /// Changes whenever the tree shape or a title changes.
    pub fn structure_generation(&self) -> u64 {
        self.generation
    }

    pub fn has_child_with_title(&self, parent: AlbumHandle, title: &str) -> bool {
        self.child_with_title(parent, title, None).is_some()
    }

    fn child_with_title(
        &self,
        parent: AlbumHandle,
        title: &str,
        except: Option<AlbumHandle>,
    ) -> Option<AlbumHandle> {
        self.children(parent).find(|child| {
            Some(*child) != except && self.get(*child).is_some_and(|a| a.title == title)
        })
    }

    // ========================================================================
    // Current selection
    // ========================================================================

    pub fn current_selection(&self) -> &[AlbumHandle] {
        &self.current
    }

    /// Replace the active albums. Stale handles are dropped.
    pub fn set_current_selection(&mut self, albums: Vec<AlbumHandle>) {
        let albums: Vec<AlbumHandle> = albums.into_iter().filter(|h| self.contains(*h)).collect();
        if albums == self.current {
            return;
        }
        self.current = albums.clone();
        self.emit(AlbumEvent::CurrentChanged(albums));
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Return the root of a type, creating it on first use.
    pub fn create_root(&mut self, album_type: AlbumType) -> AlbumHandle {
        if let Some(root) = self.root(album_type) {
            return root;
        }

        let handle = self.arena.insert(|handle| Album {
            handle,
            id: 0,
            title: album_type.root_title().to_string(),
            is_root: true,
            kind: AlbumKind::root(album_type),
            links: Links::default(),
        });
        self.index_album(handle);

        let index = &mut self.indices[album_type.index()];
        index.root = Some(handle);
        index.next_id = index.next_id.max(1);
        self.generation += 1;

        debug!("Created root album for {:?}", album_type);
        self.emit(AlbumEvent::Added(handle));
        handle
    }

    /// Append an album with a store-assigned id as the last child of `parent`.
    ///
    /// This does not write to the store; it is what bulk loading and store
    /// driven updates use.
    pub fn insert(&mut self, parent: AlbumHandle, album: NewAlbum) -> Result<AlbumHandle> {
        self.validate_insert(parent, &album)?;

        let (album_type, id) = (album.kind.album_type(), album.id);
        self.emit(AlbumEvent::AboutToBeAdded {
            parent,
            album_type,
            id,
        });
        let handle = self.link_new(parent, album);
        self.generation += 1;
        self.emit(AlbumEvent::Added(handle));
        Ok(handle)
    }

    /// Create a new album below `parent` and persist it.
    ///
    /// The title must be non-empty, free of `/` and unique among the
    /// parent's children. Temporary searches are never persisted.
    pub fn create_album(
        &mut self,
        parent: AlbumHandle,
        title: &str,
        kind: AlbumKind,
    ) -> Result<AlbumHandle> {
        let title = title.trim();
        validate_title(title)?;

        let album_type = kind.album_type();
        let parent_album = self
            .get(parent)
            .ok_or_else(|| AlbumError::invalid("Parent album does not exist"))?;
        if parent_album.album_type() != album_type {
            return Err(AlbumError::invalid(format!(
                "Cannot create a {} below a {}",
                album_type.display_name(),
                parent_album.album_type().display_name()
            )));
        }
        if self.has_child_with_title(parent, title) {
            return Err(AlbumError::DuplicateName(title.to_string()));
        }

        let id = self.indices[album_type.index()].next_id.max(1);
        if id >= ID_SPACE_PER_TYPE {
            return Err(AlbumError::invalid(format!(
                "No {} ids left",
                album_type.display_name()
            )));
        }

        let mut kind = kind;
        self.inherit_from_parent(parent, &mut kind);
        if !is_temporary(&kind) {
            let parent_id = self.get(parent).map(|p| p.id).unwrap_or_default();
            let mut row = row_from_kind(id, parent_id, title, &kind);
            if row.album_type == AlbumType::Container {
                row.path = self
                    .get(parent)
                    .and_then(|p| p.path())
                    .map(|parent_path| join_path(parent_path, title));
            }
            if let Err(err) = self.store.create_row(&row) {
                warn!("Store refused new {} '{}': {:#}", album_type.display_name(), title, err);
                return Err(AlbumError::BackingStoreFailure(err));
            }
        }

        self.emit(AlbumEvent::AboutToBeAdded {
            parent,
            album_type,
            id,
        });
        let handle = self.link_new(parent, NewAlbum::new(id, title, kind));
        self.generation += 1;
        debug!("Created {} '{}' with id {}", album_type.display_name(), title, id);
        self.emit(AlbumEvent::Added(handle));
        Ok(handle)
    }

    pub fn create_tag(&mut self, parent: AlbumHandle, title: &str) -> Result<AlbumHandle> {
        self.create_album(parent, title, AlbumKind::tag())
    }

    pub fn create_container(&mut self, parent: AlbumHandle, title: &str) -> Result<AlbumHandle> {
        self.create_album(parent, title, AlbumKind::container())
    }

    /// Create or update an unsaved search below the search root.
    ///
    /// An existing temporary search with the same title gets the new query
    /// instead of a duplicate.
    pub fn create_temporary_search(
        &mut self,
        title: &str,
        query: &str,
        kind: SearchKind,
    ) -> Result<AlbumHandle> {
        let root = self
            .root(AlbumType::Search)
            .ok_or_else(|| AlbumError::invalid("The search root has not been created"))?;

        let existing = self.children(root).find(|child| {
            self.get(*child)
                .is_some_and(|a| a.title == title.trim() && a.as_search().is_some_and(|s| s.temporary))
        });

        if let Some(handle) = existing {
            if let Some(AlbumKind::Search(info)) = self.arena.get_mut(handle).map(|a| &mut a.kind) {
                info.query = query.to_string();
                info.kind = kind;
            }
            debug!("Updated temporary search '{}'", title);
            self.emit(AlbumEvent::SearchUpdated(handle));
            return Ok(handle);
        }

        let search = AlbumKind::Search(SearchInfo {
            query: query.to_string(),
            kind,
            temporary: true,
        });
        self.create_album(root, title, search)
    }

    /// Resolve tag paths like `People/Family/Anna`, creating missing tags.
    pub fn find_or_create_tags(&mut self, paths: &[&str]) -> Result<Vec<AlbumHandle>> {
        let root = self
            .root(AlbumType::Tag)
            .ok_or_else(|| AlbumError::invalid("The tag root has not been created"))?;

        let mut result = Vec::with_capacity(paths.len());
        for path in paths {
            let mut current = root;
            for part in path.split('/').map(str::trim).filter(|p| !p.is_empty()) {
                current = match self.child_with_title(current, part, None) {
                    Some(child) => child,
                    None => self.create_tag(current, part)?,
                };
            }
            if current == root {
                return Err(AlbumError::invalid(format!("Empty tag path '{}'", path)));
            }
            result.push(current);
        }
        Ok(result)
    }

    /// Remove an album and its whole subtree.
    ///
    /// Observers get `AboutToBeRemoved`/`Removed` for every node, children
    /// before parents. Removed albums are dropped from the current selection.
    pub fn remove(&mut self, handle: AlbumHandle) -> Result<()> {
        let album = self
            .get(handle)
            .ok_or_else(|| AlbumError::not_found("Album no longer exists"))?;
        if album.is_root {
            return Err(AlbumError::not_found(format!(
                "The root {} cannot be removed",
                album.album_type().display_name()
            )));
        }
        let album_type = album.album_type();
        let title = album.title.clone();

        let subtree = self.arena.post_order(handle);
        let ids: Vec<AlbumId> = subtree
            .iter()
            .filter_map(|h| self.get(*h))
            .filter(|a| !is_temporary(&a.kind))
            .map(|a| a.id)
            .collect();

        if !ids.is_empty() {
            if let Err(err) = self.store.delete_rows(album_type, &ids) {
                warn!("Store refused to delete {} '{}': {:#}", album_type.display_name(), title, err);
                return Err(AlbumError::BackingStoreFailure(err));
            }
        }

        self.generation += 1;
        let mut selection_changed = false;

        // Children go first so every event sees a consistent tree.
        for node in subtree {
            self.emit(AlbumEvent::AboutToBeRemoved(node));
            let id = self.get(node).map(|a| a.id).unwrap_or_default();
            self.unindex_album(node);
            if self.current.contains(&node) {
                self.current.retain(|c| *c != node);
                selection_changed = true;
            }
            self.arena.detach(node);
            self.arena.remove(node);
            self.emit(AlbumEvent::Removed {
                handle: node,
                album_type,
                id,
            });
        }

        debug!("Removed {} '{}' ({} albums)", album_type.display_name(), title, ids.len());

        if selection_changed {
            let current = self.current.clone();
            self.emit(AlbumEvent::CurrentChanged(current));
        }
        Ok(())
    }

    /// Re-link an album as the last child of `new_parent`.
    pub fn move_album(&mut self, handle: AlbumHandle, new_parent: AlbumHandle) -> Result<()> {
        let album = self
            .get(handle)
            .ok_or_else(|| AlbumError::not_found("Album no longer exists"))?;
        if album.is_root {
            return Err(AlbumError::invalid("Root albums cannot be moved"));
        }
        let target = self
            .get(new_parent)
            .ok_or_else(|| AlbumError::invalid("Target album does not exist"))?;
        if target.album_type() != album.album_type() {
            return Err(AlbumError::invalid(format!(
                "Cannot move a {} below a {}",
                album.album_type().display_name(),
                target.album_type().display_name()
            )));
        }
        if new_parent == handle || self.is_ancestor_of(handle, new_parent) {
            return Err(AlbumError::invalid(format!(
                "Cannot move '{}' into itself",
                album.title
            )));
        }
        if album.parent() == Some(new_parent) {
            return Ok(());
        }
        if self.has_child_with_title(new_parent, &album.title) {
            return Err(AlbumError::DuplicateName(album.title.clone()));
        }

        let (album_type, id, title) = (album.album_type(), album.id, album.title.clone());
        let temporary = is_temporary(&album.kind);
        let target_id = target.id;

        let old = self
            .arena
            .detach(handle)
            .ok_or_else(|| AlbumError::invalid("Album is not attached to a tree"))?;
        let old_parent_id = self.get(old.parent).map(|a| a.id).unwrap_or_default();

        self.arena.append_child(new_parent, handle);
        self.set_tag_parent(handle, target_id);
        self.reindex_paths(handle);

        if !temporary {
            let path = self.get(handle).and_then(|a| a.path().map(str::to_string));
            if let Err(err) = self
                .store
                .reparent_row(album_type, id, target_id, path.as_deref())
            {
                warn!("Store refused to move {} '{}': {:#}", album_type.display_name(), title, err);
                self.arena.detach(handle);
                self.arena.attach_after(old.parent, old.prev, handle);
                self.set_tag_parent(handle, old_parent_id);
                self.reindex_paths(handle);
                return Err(AlbumError::BackingStoreFailure(err));
            }
        }

        self.generation += 1;
        debug!("Moved {} '{}' below id {}", album_type.display_name(), title, target_id);
        self.emit(AlbumEvent::Moved(handle));
        Ok(())
    }

    /// Change an album's title. Container paths of the subtree follow.
    pub fn rename(&mut self, handle: AlbumHandle, new_title: &str) -> Result<()> {
        let title = new_title.trim();
        let album = self
            .get(handle)
            .ok_or_else(|| AlbumError::not_found("Album no longer exists"))?;
        if album.is_root {
            return Err(AlbumError::invalid("Root albums cannot be renamed"));
        }
        validate_title(title)?;
        if album.title == title {
            return Ok(());
        }
        if let Some(parent) = album.parent() {
            if self.child_with_title(parent, title, Some(handle)).is_some() {
                return Err(AlbumError::DuplicateName(title.to_string()));
            }
        }

        let (album_type, id) = (album.album_type(), album.id);
        let temporary = is_temporary(&album.kind);

        let old_title = self.replace_title(handle, title.to_string());
        self.reindex_paths(handle);

        if !temporary {
            if let Err(err) = self.store.rename_row(album_type, id, title) {
                warn!("Store refused to rename '{}' to '{}': {:#}", old_title, title, err);
                self.replace_title(handle, old_title);
                self.reindex_paths(handle);
                return Err(AlbumError::BackingStoreFailure(err));
            }
        }

        self.generation += 1;
        debug!("Renamed {} '{}' to '{}'", album_type.display_name(), old_title, title);
        self.emit(AlbumEvent::Renamed(handle));
        Ok(())
    }

    /// Set or clear the icon of a container album or tag.
    pub fn set_icon(&mut self, handle: AlbumHandle, icon: Option<AlbumIcon>) -> Result<()> {
        let album = self
            .get(handle)
            .ok_or_else(|| AlbumError::not_found("Album no longer exists"))?;
        if album.is_root {
            return Err(AlbumError::invalid("Root albums have no icon"));
        }
        let (album_type, id) = (album.album_type(), album.id);

        let old = self.replace_icon(handle, icon.clone())?;
        if let Err(err) = self.store.set_icon_row(album_type, id, icon.as_ref()) {
            warn!("Store refused icon change for {} {}: {:#}", album_type.display_name(), id, err);
            self.replace_icon(handle, old)?;
            return Err(AlbumError::BackingStoreFailure(err));
        }

        self.emit(AlbumEvent::IconChanged(handle));
        Ok(())
    }

    // ========================================================================
    // Bulk loading
    // ========================================================================

    /// Populate a tree from the store. The root must exist.
    ///
    /// Rows whose parent cannot be resolved are attached to the root.
    /// Returns the number of albums inserted.
    pub fn load(&mut self, album_type: AlbumType) -> Result<usize> {
        let root = self.root(album_type).ok_or_else(|| {
            AlbumError::invalid(format!(
                "The root {} has not been created",
                album_type.display_name()
            ))
        })?;
        let rows = self
            .store
            .list_album_rows(album_type)
            .map_err(AlbumError::BackingStoreFailure)?;

        let loaded = match album_type {
            AlbumType::Container => self.load_containers(root, rows),
            AlbumType::Tag => self.load_tags(root, rows),
            AlbumType::Date => self.load_dates(root, rows),
            AlbumType::Search => self.load_searches(root, rows),
        };

        debug!("Loaded {} {} albums", loaded, album_type.display_name());
        Ok(loaded)
    }

    fn load_containers(&mut self, root: AlbumHandle, rows: Vec<AlbumRow>) -> usize {
        let mut rows: Vec<(String, AlbumRow)> = rows
            .into_iter()
            .filter_map(|row| {
                let path = match &row.path {
                    Some(p) => normalize_path(p),
                    None => normalize_path(&row.title),
                };
                if path == "/" {
                    warn!("Skipping album row {} without a path", row.id);
                    return None;
                }
                Some((path, row))
            })
            .collect();
        rows.sort_by(|(a, _), (b, _)| path_depth(a).cmp(&path_depth(b)).then_with(|| a.cmp(b)));

        let mut loaded = 0;
        for (path, mut row) in rows {
            let (parent_path, name) = split_path(&path);
            let parent = match self.by_path.get(parent_path) {
                Some(p) => *p,
                None => {
                    warn!("No parent album for {}, attaching to the root", path);
                    root
                }
            };
            row.title = name.to_string();
            if self.insert_row(parent, row) {
                loaded += 1;
            }
        }
        loaded
    }

    fn load_tags(&mut self, root: AlbumHandle, mut rows: Vec<AlbumRow>) -> usize {
        rows.sort_by_key(|row| row.id);
        let mut pending = rows;
        let mut loaded = 0;

        // Parents may be listed after their children.
        loop {
            let mut progress = false;
            let mut rest = Vec::new();
            for row in pending {
                let parent = if row.parent_id == 0 {
                    Some(root)
                } else {
                    self.find_by_id(AlbumType::Tag, row.parent_id)
                };
                match parent {
                    Some(parent) => {
                        progress = true;
                        if self.insert_row(parent, row) {
                            loaded += 1;
                        }
                    }
                    None => rest.push(row),
                }
            }
            pending = rest;
            if pending.is_empty() || !progress {
                break;
            }
        }

        for row in pending {
            warn!("Tag {} has unknown parent {}, attaching to the root", row.id, row.parent_id);
            if self.insert_row(root, row) {
                loaded += 1;
            }
        }
        loaded
    }

    fn load_dates(&mut self, root: AlbumHandle, mut rows: Vec<AlbumRow>) -> usize {
        rows.sort_by_key(|row| (row.range != Some(DateRange::Year), row.date, row.id));

        let mut years: HashMap<i32, AlbumHandle> = self
            .children(root)
            .filter_map(|h| {
                let info = self.get(h)?.as_date()?;
                (info.range == DateRange::Year).then_some((info.date.year(), h))
            })
            .collect();

        let mut loaded = 0;
        for row in rows {
            let date = row.date.unwrap_or_default();
            let range = row.range.unwrap_or_default();
            let parent = match range {
                DateRange::Year => root,
                DateRange::Month => years.get(&date.year()).copied().unwrap_or(root),
            };
            let id = row.id;
            if self.insert_row(parent, row) {
                loaded += 1;
                if range == DateRange::Year {
                    if let Some(h) = self.find_by_id(AlbumType::Date, id) {
                        years.insert(date.year(), h);
                    }
                }
            }
        }
        loaded
    }

    fn load_searches(&mut self, root: AlbumHandle, mut rows: Vec<AlbumRow>) -> usize {
        rows.sort_by_key(|row| row.id);
        let mut loaded = 0;
        for row in rows {
            if self.insert_row(root, row) {
                loaded += 1;
            }
        }
        loaded
    }

    fn insert_row(&mut self, parent: AlbumHandle, row: AlbumRow) -> bool {
        let id = row.id;
        let album_type = row.album_type;
        match self.insert(parent, album_from_row(row)) {
            Ok(_) => true,
            Err(err) => {
                warn!("Skipping {} row {}: {}", album_type.display_name(), id, err);
                false
            }
        }
    }

    /// The store row describing an album.
    pub fn row_for(&self, handle: AlbumHandle) -> Option<AlbumRow> {
        let album = self.get(handle)?;
        let parent_id = album
            .parent()
            .and_then(|p| self.get(p))
            .map(|p| p.id)
            .unwrap_or_default();
        Some(row_from_kind(album.id, parent_id, &album.title, &album.kind))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn validate_insert(&self, parent: AlbumHandle, album: &NewAlbum) -> Result<()> {
        let parent_album = self
            .get(parent)
            .ok_or_else(|| AlbumError::invalid("Parent album does not exist"))?;
        let album_type = album.kind.album_type();
        if parent_album.album_type() != album_type {
            return Err(AlbumError::invalid(format!(
                "Cannot insert a {} below a {}",
                album_type.display_name(),
                parent_album.album_type().display_name()
            )));
        }
        if album.id == 0 || album.id >= ID_SPACE_PER_TYPE {
            return Err(AlbumError::invalid(format!("Album id {} is out of range", album.id)));
        }
        if self.indices[album_type.index()].by_id.contains_key(&album.id) {
            return Err(AlbumError::invalid(format!(
                "{} id {} is already in use",
                album_type.display_name(),
                album.id
            )));
        }
        Ok(())
    }

    /// Link and index a validated album without notifying anyone.
    fn link_new(&mut self, parent: AlbumHandle, album: NewAlbum) -> AlbumHandle {
        let NewAlbum { id, title, mut kind } = album;
        let album_type = kind.album_type();
        self.inherit_from_parent(parent, &mut kind);

        let handle = self.arena.insert(|handle| Album {
            handle,
            id,
            title,
            is_root: false,
            kind,
            links: Links::default(),
        });
        self.arena.append_child(parent, handle);
        if let Some(path) = self.derived_path(handle) {
            self.set_path(handle, path);
        }
        self.index_album(handle);

        let index = &mut self.indices[album_type.index()];
        index.next_id = index.next_id.max(id + 1);
        handle
    }

    /// Tag parent ids and container collections come from the parent.
    fn inherit_from_parent(&self, parent: AlbumHandle, kind: &mut AlbumKind) {
        let Some(parent_album) = self.get(parent) else {
            return;
        };
        match (kind, &parent_album.kind) {
            (AlbumKind::Tag(info), _) => info.parent_tag_id = parent_album.id,
            (AlbumKind::Container(info), AlbumKind::Container(parent_info))
                if info.collection.is_empty() =>
            {
                info.collection = parent_info.collection.clone();
            }
            _ => {}
        }
    }

    fn index_album(&mut self, handle: AlbumHandle) {
        let Some(album) = self.get(handle) else {
            return;
        };
        let (album_type, id, global_id) = (album.album_type(), album.id, album.global_id());
        let path = album.path().map(str::to_string);

        let index = &mut self.indices[album_type.index()];
        index.albums.push(handle);
        index.by_id.insert(id, handle);
        self.by_global_id.insert(global_id, handle);
        if let Some(path) = path {
            self.by_path.insert(path, handle);
        }
    }

    fn unindex_album(&mut self, handle: AlbumHandle) {
        let Some(album) = self.get(handle) else {
            return;
        };
        let (album_type, id, global_id) = (album.album_type(), album.id, album.global_id());
        let path = album.path().map(str::to_string);

        let index = &mut self.indices[album_type.index()];
        index.albums.retain(|h| *h != handle);
        index.by_id.remove(&id);
        self.by_global_id.remove(&global_id);
        if let Some(path) = path {
            if self.by_path.get(&path) == Some(&handle) {
                self.by_path.remove(&path);
            }
        }
    }

    /// Container path implied by the parent's path and the album's title.
    fn derived_path(&self, handle: AlbumHandle) -> Option<String> {
        let album = self.get(handle)?;
        album.as_container()?;
        if album.is_root {
            return Some("/".to_string());
        }
        let parent_path = album.parent().and_then(|p| self.get(p)).and_then(|p| p.path())?;
        Some(join_path(parent_path, &album.title))
    }

    fn set_path(&mut self, handle: AlbumHandle, path: String) -> Option<String> {
        match self.arena.get_mut(handle).map(|a| &mut a.kind) {
            Some(AlbumKind::Container(info)) => Some(std::mem::replace(&mut info.path, path)),
            _ => None,
        }
    }

    /// Recompute container paths of an album and its subtree.
    fn reindex_paths(&mut self, handle: AlbumHandle) {
        let is_container = self
            .get(handle)
            .is_some_and(|a| a.album_type() == AlbumType::Container);
        if !is_container {
            return;
        }

        let nodes: Vec<AlbumHandle> = std::iter::once(handle)
            .chain(self.descendants(handle))
            .collect();
        for node in nodes {
            let Some(new_path) = self.derived_path(node) else {
                continue;
            };
            if let Some(old_path) = self.set_path(node, new_path.clone()) {
                if old_path != new_path {
                    if self.by_path.get(&old_path) == Some(&node) {
                        self.by_path.remove(&old_path);
                    }
                    self.by_path.insert(new_path, node);
                }
            }
        }
    }

    fn replace_title(&mut self, handle: AlbumHandle, title: String) -> String {
        match self.arena.get_mut(handle) {
            Some(album) => std::mem::replace(&mut album.title, title),
            None => title,
        }
    }

    fn replace_icon(&mut self, handle: AlbumHandle, icon: Option<AlbumIcon>) -> Result<Option<AlbumIcon>> {
        match self.arena.get_mut(handle).map(|a| &mut a.kind) {
            Some(AlbumKind::Container(info)) => Ok(std::mem::replace(&mut info.icon, icon)),
            Some(AlbumKind::Tag(info)) => Ok(std::mem::replace(&mut info.icon, icon)),
            Some(_) => Err(AlbumError::invalid("Date and search albums have no icon")),
            None => Err(AlbumError::not_found("Album no longer exists")),
        }
    }

    fn set_tag_parent(&mut self, handle: AlbumHandle, parent_id: AlbumId) {
        if let Some(AlbumKind::Tag(info)) = self.arena.get_mut(handle).map(|a| &mut a.kind) {
            info.parent_tag_id = parent_id;
        }
    }

    /// Record every event into a shared vector.
    #[cfg(test)]
    pub(crate) fn record_events(&mut self) -> std::rc::Rc<std::cell::RefCell<Vec<AlbumEvent>>> {
        let events = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = events.clone();
        self.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }
}

impl std::fmt::Debug for AlbumManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlbumManager")
            .field("albums", &self.arena.len())
            .field("current", &self.current)
            .field("generation", &self.generation)
            .finish()
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(AlbumError::invalid("Album name cannot be empty"));
    }
    if title.contains('/') {
        return Err(AlbumError::invalid("Album name cannot contain '/'"));
    }
    Ok(())
}

fn row_from_kind(id: AlbumId, parent_id: AlbumId, title: &str, kind: &AlbumKind) -> AlbumRow {
    let mut row = AlbumRow::new(kind.album_type(), id, parent_id, title.to_string());
    match kind {
        AlbumKind::Container(info) => {
            row.path = Some(info.path.clone());
            row.collection = (!info.collection.is_empty()).then(|| info.collection.clone());
            row.caption = info.caption.clone();
            row.created = info.created;
            row.trash = info.trash;
            row.icon = info.icon.clone();
        }
        AlbumKind::Tag(info) => {
            row.icon = info.icon.clone();
        }
        AlbumKind::Date(info) => {
            row.date = Some(info.date);
            row.range = Some(info.range);
        }
        AlbumKind::Search(info) => {
            row.query = Some(info.query.clone());
            row.search_kind = Some(info.kind);
        }
    }
    row
}

fn is_temporary(kind: &AlbumKind) -> bool {
    matches!(kind, AlbumKind::Search(info) if info.temporary)
}

fn album_from_row(row: AlbumRow) -> NewAlbum {
    let kind = match row.album_type {
        AlbumType::Container => AlbumKind::Container(ContainerInfo {
            path: String::new(),
            collection: row.collection.unwrap_or_default(),
            caption: row.caption,
            created: row.created,
            icon: row.icon,
            trash: row.trash,
        }),
        AlbumType::Tag => AlbumKind::Tag(TagInfo {
            parent_tag_id: row.parent_id,
            icon: row.icon,
        }),
        AlbumType::Date => AlbumKind::Date(DateInfo {
            date: row.date.unwrap_or_default(),
            range: row.range.unwrap_or_default(),
        }),
        AlbumType::Search => AlbumKind::Search(SearchInfo {
            query: row.query.unwrap_or_default(),
            kind: row.search_kind.unwrap_or_default(),
            temporary: false,
        }),
    };
    NewAlbum::new(row.id, row.title, kind)
}

/// `/a//b/` and `a/b` both become `/a/b`; the empty path becomes `/`.
pub fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    format!("/{}", parts.join("/"))
}

fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Split a normalized path into its parent path and last component.
fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => ("/", path),
    }
}

fn path_depth(path: &str) -> usize {
    path.split('/').filter(|p| !p.is_empty()).count()
}
