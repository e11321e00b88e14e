//! Item counts shown next to album titles.

use std::collections::{HashMap, HashSet};
use tracing::trace;

use super::ModelEvent;
use crate::album::{AlbumEvent, AlbumHandle, AlbumId, AlbumManager, SideTable};
use crate::signal::{ListenerId, Listeners};
use crate::store::CountProvider;

/// Count value used for "not known".
pub const UNKNOWN_COUNT: i64 = -1;

/// Keeps a local item count per album of one tree.
///
/// Albums show their local count by default. Albums switched to "include
/// children" show the sum over their whole subtree instead; that sum is
/// computed on request and never cached.
pub struct CountingAlbumModel {
    root: AlbumHandle,
    show_count: bool,
    counts: SideTable<i64>,
    include_children: HashSet<AlbumHandle>,
    provider: Option<Box<dyn CountProvider>>,
    listeners: Listeners<ModelEvent>,
}

impl CountingAlbumModel {
    pub fn new(root: AlbumHandle) -> Self {
        Self {
            root,
            show_count: true,
            counts: SideTable::new(),
            include_children: HashSet::new(),
            provider: None,
            listeners: Listeners::new(),
        }
    }

    pub fn root(&self) -> AlbumHandle {
        self.root
    }

    /// True if `handle` is alive and lies in this model's tree.
    pub fn contains(&self, manager: &AlbumManager, handle: AlbumHandle) -> bool {
        manager.contains(handle) && (handle == self.root || manager.is_ancestor_of(self.root, handle))
    }

    /// The model's albums in pre-order, root first.
    pub fn nodes(&self, manager: &AlbumManager) -> Vec<AlbumHandle> {
        if !manager.contains(self.root) {
            return Vec::new();
        }
        std::iter::once(self.root)
            .chain(manager.descendants(self.root))
            .collect()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&ModelEvent) + 'static) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, event: ModelEvent) {
        self.listeners.emit(&event);
    }

    pub fn show_count(&self) -> bool {
        self.show_count
    }

    /// Every album's display text changes, so every album is refreshed.
    pub fn set_show_count(&mut self, manager: &AlbumManager, show: bool) {
        if self.show_count == show {
            return;
        }
        self.show_count = show;
        for node in self.nodes(manager) {
            self.emit(ModelEvent::DataChanged(node));
        }
    }

    /// Fallback source for albums without a local count.
    pub fn set_count_provider(&mut self, provider: impl CountProvider + 'static) {
        self.provider = Some(Box::new(provider));
    }

    pub fn set_count(&mut self, manager: &AlbumManager, handle: AlbumHandle, count: i64) {
        if !self.contains(manager, handle) {
            return;
        }
        if self.counts.insert(handle, count) == Some(count) {
            return;
        }
        trace!("Count of {:?} is now {}", handle, count);
        for node in self.affected_by(manager, handle) {
            self.emit(ModelEvent::DataChanged(node));
        }
    }

    /// Replace all local counts. Albums missing from `counts` become unknown.
    pub fn set_count_map(&mut self, manager: &AlbumManager, counts: &HashMap<AlbumId, i64>) {
        let mut changed = Vec::new();
        for node in self.nodes(manager) {
            let Some(album) = manager.get(node) else {
                continue;
            };
            let new = counts.get(&album.id()).copied();
            let old = self.counts.get(node).copied();
            if new == old {
                continue;
            }
            match new {
                Some(count) => self.counts.insert(node, count),
                None => self.counts.remove(node),
            };
            changed.push(node);
        }

        let mut seen = HashSet::new();
        let mut refresh = Vec::new();
        for node in changed {
            for affected in self.affected_by(manager, node) {
                if seen.insert(affected) {
                    refresh.push(affected);
                }
            }
        }
        for node in refresh {
            self.emit(ModelEvent::DataChanged(node));
        }
    }

    /// The album itself plus every ancestor currently summing its children.
    fn affected_by(&self, manager: &AlbumManager, handle: AlbumHandle) -> Vec<AlbumHandle> {
        let mut out = vec![handle];
        if handle == self.root {
            return out;
        }
        for ancestor in manager.ancestors(handle) {
            if self.include_children.contains(&ancestor) {
                out.push(ancestor);
            }
            if ancestor == self.root {
                break;
            }
        }
        out
    }

    pub fn include_children_count(&mut self, manager: &AlbumManager, handle: AlbumHandle) {
        if self.contains(manager, handle) && self.include_children.insert(handle) {
            self.emit(ModelEvent::DataChanged(handle));
        }
    }

    pub fn exclude_children_count(&mut self, manager: &AlbumManager, handle: AlbumHandle) {
        if self.contains(manager, handle) && self.include_children.remove(&handle) {
            self.emit(ModelEvent::DataChanged(handle));
        }
    }

    pub fn is_including_children(&self, handle: AlbumHandle) -> bool {
        self.include_children.contains(&handle)
    }

    /// The album's own count, falling back to the provider.
    pub fn local_count(&self, manager: &AlbumManager, handle: AlbumHandle) -> Option<i64> {
        if let Some(count) = self.counts.get(handle) {
            return Some(*count);
        }
        let album = manager.get(handle)?;
        self.provider.as_ref()?.count_for_album(album)
    }

    /// Displayed count, or [`UNKNOWN_COUNT`].
    pub fn count(&self, manager: &AlbumManager, handle: AlbumHandle) -> i64 {
        if !self.contains(manager, handle) {
            return UNKNOWN_COUNT;
        }
        if !self.include_children.contains(&handle) {
            return self.local_count(manager, handle).unwrap_or(UNKNOWN_COUNT);
        }

        let known: Vec<i64> = std::iter::once(handle)
            .chain(manager.descendants(handle))
            .filter_map(|node| self.local_count(manager, node))
            .collect();
        if known.is_empty() {
            UNKNOWN_COUNT
        } else {
            known.iter().sum()
        }
    }

    /// Title as a view shows it, e.g. `Holidays (12)`.
    pub fn display_text(&self, manager: &AlbumManager, handle: AlbumHandle) -> Option<String> {
        if !self.contains(manager, handle) {
            return None;
        }
        let album = manager.get(handle)?;
        let count = self.count(manager, handle);
        if self.show_count && !album.is_root() && count != UNKNOWN_COUNT {
            Some(format!("{} ({})", album.title(), count))
        } else {
            Some(album.title().to_string())
        }
    }

    /// Keep the side tables in step with the registry.
    pub fn album_event(&mut self, event: &AlbumEvent) {
        match event {
            AlbumEvent::Removed { handle, .. } => {
                self.counts.album_event(event);
                self.include_children.remove(handle);
            }
            AlbumEvent::Moved(_) => {
                // Subtree sums may have gained or lost the moved albums.
                let summing: Vec<AlbumHandle> = self.include_children.iter().copied().collect();
                for node in summing {
                    self.emit(ModelEvent::DataChanged(node));
                }
            }
            AlbumEvent::Renamed(handle) => self.emit(ModelEvent::DataChanged(*handle)),
            _ => {}
        }
    }
}

impl std::fmt::Debug for CountingAlbumModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingAlbumModel")
            .field("root", &self.root)
            .field("show_count", &self.show_count)
            .field("counts", &self.counts.len())
            .field("include_children", &self.include_children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::album::{Album, AlbumType};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        manager: AlbumManager,
        root: AlbumHandle,
        trips: AlbumHandle,
        beach: AlbumHandle,
        city: AlbumHandle,
        pets: AlbumHandle,
    }

    /// Albums -> Trips -> (Beach, City), Albums -> Pets
    fn fixture() -> Fixture {
        let mut manager = AlbumManager::in_memory();
        let root = manager.create_root(AlbumType::Container);
        let trips = manager.create_container(root, "Trips").unwrap();
        let beach = manager.create_container(trips, "Beach").unwrap();
        let city = manager.create_container(trips, "City").unwrap();
        let pets = manager.create_container(root, "Pets").unwrap();
        Fixture {
            manager,
            root,
            trips,
            beach,
            city,
            pets,
        }
    }

    fn record(model: &mut CountingAlbumModel) -> Rc<RefCell<Vec<ModelEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_exclude_children_is_default() {
        let f = fixture();
        let mut model = CountingAlbumModel::new(f.root);
        model.set_count(&f.manager, f.trips, 2);
        model.set_count(&f.manager, f.beach, 10);

        assert_eq!(model.count(&f.manager, f.trips), 2);
        assert_eq!(model.count(&f.manager, f.city), UNKNOWN_COUNT);
    }

    #[test]
    fn test_include_children_sums_subtree() {
        let f = fixture();
        let mut model = CountingAlbumModel::new(f.root);
        model.set_count(&f.manager, f.trips, 2);
        model.set_count(&f.manager, f.beach, 10);
        model.set_count(&f.manager, f.city, 5);
        model.set_count(&f.manager, f.pets, 7);

        let events = record(&mut model);
        model.include_children_count(&f.manager, f.trips);
        assert_eq!(model.count(&f.manager, f.trips), 17);
        // Only the switched album is refreshed.
        assert_eq!(*events.borrow(), vec![ModelEvent::DataChanged(f.trips)]);

        model.exclude_children_count(&f.manager, f.trips);
        assert_eq!(model.count(&f.manager, f.trips), 2);
    }

    #[test]
    fn test_set_count_refreshes_summing_ancestors() {
        let f = fixture();
        let mut model = CountingAlbumModel::new(f.root);
        model.include_children_count(&f.manager, f.trips);
        let events = record(&mut model);

        model.set_count(&f.manager, f.beach, 4);
        model.set_count(&f.manager, f.beach, 4);

        assert_eq!(
            *events.borrow(),
            vec![ModelEvent::DataChanged(f.beach), ModelEvent::DataChanged(f.trips)]
        );
    }

    #[test]
    fn test_set_count_map_replaces_counts() {
        let f = fixture();
        let mut model = CountingAlbumModel::new(f.root);
        model.set_count(&f.manager, f.pets, 3);

        let id = |h| f.manager.get(h).unwrap().id();
        let counts = HashMap::from([(id(f.beach), 1), (id(f.city), 2)]);
        let events = record(&mut model);
        model.set_count_map(&f.manager, &counts);

        assert_eq!(model.count(&f.manager, f.beach), 1);
        assert_eq!(model.count(&f.manager, f.pets), UNKNOWN_COUNT);
        assert_eq!(events.borrow().len(), 3);
    }

    #[test]
    fn test_display_text() {
        let f = fixture();
        let mut model = CountingAlbumModel::new(f.root);
        model.set_count(&f.manager, f.root, 99);
        model.set_count(&f.manager, f.beach, 4);

        assert_eq!(model.display_text(&f.manager, f.beach).as_deref(), Some("Beach (4)"));
        assert_eq!(model.display_text(&f.manager, f.city).as_deref(), Some("City"));
        // Roots never show a count.
        assert_eq!(model.display_text(&f.manager, f.root).as_deref(), Some("Albums"));

        model.set_show_count(&f.manager, false);
        assert_eq!(model.display_text(&f.manager, f.beach).as_deref(), Some("Beach"));
    }

    #[test]
    fn test_provider_is_consulted_lazily() {
        let f = fixture();
        let mut model = CountingAlbumModel::new(f.root);
        model.set_count_provider(|album: &Album| (album.title() == "Pets").then_some(8));
        model.set_count(&f.manager, f.beach, 1);

        assert_eq!(model.count(&f.manager, f.pets), 8);
        assert_eq!(model.count(&f.manager, f.beach), 1);
        assert_eq!(model.count(&f.manager, f.city), UNKNOWN_COUNT);
    }

    #[test]
    fn test_albums_outside_the_model_are_ignored() {
        let mut f = fixture();
        let tags = f.manager.create_root(AlbumType::Tag);
        let tag = f.manager.create_tag(tags, "People").unwrap();

        let mut model = CountingAlbumModel::new(f.trips);
        let events = record(&mut model);
        model.set_count(&f.manager, tag, 3);
        model.set_count(&f.manager, f.pets, 3);

        assert!(events.borrow().is_empty());
        assert_eq!(model.count(&f.manager, f.pets), UNKNOWN_COUNT);
        assert_eq!(model.display_text(&f.manager, tag), None);
    }

    #[test]
    fn test_removed_albums_are_purged() {
        let mut f = fixture();
        let model = Rc::new(RefCell::new(CountingAlbumModel::new(f.root)));
        {
            let mut m = model.borrow_mut();
            m.set_count(&f.manager, f.beach, 4);
            m.include_children_count(&f.manager, f.beach);
        }
        let observer = model.clone();
        f.manager.subscribe(move |e| observer.borrow_mut().album_event(e));

        f.manager.remove(f.trips).unwrap();

        let m = model.borrow();
        assert!(!m.is_including_children(f.beach));
        assert_eq!(m.count(&f.manager, f.beach), UNKNOWN_COUNT);
    }
}
