//! Back/forward navigation through previously viewed album selections.
//!
//! The current position is always the last entry of the backward stack.
//! Each distinct album set also remembers the item and sub-selection that
//! were last shown for it, so going back restores the view as it was left.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::album::{AlbumEvent, AlbumHandle, AlbumManager};
use crate::signal::{ListenerId, Listeners};

/// Opaque token naming the panel a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ViewContext(pub u32);

/// Id of an item (image) inside an album view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub i64);

/// Label filters active when browsing by labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LabelSelection {
    pub ratings: Vec<u8>,
    pub picks: Vec<u8>,
    pub colors: Vec<u8>,
}

impl LabelSelection {
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty() && self.picks.is_empty() && self.colors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub albums: Vec<AlbumHandle>,
    pub context: ViewContext,
    pub labels: Option<LabelSelection>,
}

impl HistoryEntry {
    pub fn new(albums: Vec<AlbumHandle>, context: ViewContext) -> Self {
        Self {
            albums,
            context,
            labels: None,
        }
    }

    /// Same album set and same labels. The context does not count.
    pub fn same_position(&self, other: &HistoryEntry) -> bool {
        self.albums == other.albums && self.labels == other.labels
    }
}

/// What a view showed for one album set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub current: Option<ItemId>,
    pub selection: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    CanGoBack(bool),
    CanGoForward(bool),
    /// Select these albums; sent by `back` and `forward`.
    Navigate(HistoryEntry),
    /// Show this item and sub-selection again.
    RestoreView {
        albums: Vec<AlbumHandle>,
        view: ViewState,
    },
}

#[derive(Debug, Default)]
pub struct AlbumHistory {
    backward: Vec<HistoryEntry>,
    forward: VecDeque<HistoryEntry>,
    views: HashMap<Vec<AlbumHandle>, ViewState>,
    /// Set while a back/forward step is being applied by the views.
    replaying: bool,
    listeners: Listeners<HistoryEvent>,
    can_go_back: bool,
    can_go_forward: bool,
}

impl AlbumHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&HistoryEvent) + 'static) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn emit(&mut self, event: HistoryEvent) {
        self.listeners.emit(&event);
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub fn visit(&mut self, albums: Vec<AlbumHandle>, context: ViewContext) {
        self.visit_entry(HistoryEntry::new(albums, context));
    }

    pub fn visit_labels(&mut self, albums: Vec<AlbumHandle>, labels: LabelSelection, context: ViewContext) {
        self.visit_entry(HistoryEntry {
            albums,
            context,
            labels: Some(labels),
        });
    }

    /// Record a selection made by the user.
    ///
    /// The first visit after `back`/`forward` is the views echoing the
    /// replayed selection and is ignored.
    pub fn visit_entry(&mut self, entry: HistoryEntry) {
        if self.replaying {
            self.replaying = false;
            return;
        }
        if entry.albums.is_empty() && entry.labels.is_none() {
            return;
        }
        if let Some(current) = self.backward.last_mut() {
            if current.same_position(&entry) {
                current.context = entry.context;
                return;
            }
        }

        debug!("History: visiting {} albums", entry.albums.len());
        let restore = self.views.get(&entry.albums).cloned();
        let albums = entry.albums.clone();
        self.backward.push(entry);
        self.forward.clear();
        self.emit_state();

        if let Some(view) = restore {
            self.emit(HistoryEvent::RestoreView { albums, view });
        }
    }

    /// Remember what is shown for an album set. Ignored during replay.
    pub fn remember_view(&mut self, albums: &[AlbumHandle], view: ViewState) {
        if self.replaying || albums.is_empty() {
            return;
        }
        self.views.insert(albums.to_vec(), view);
    }

    pub fn view_state(&self, albums: &[AlbumHandle]) -> Option<&ViewState> {
        self.views.get(albums)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Step back. Does nothing unless `steps` earlier entries exist.
    pub fn back(&mut self, steps: usize) {
        if steps == 0 || self.backward.len() < 2 || steps > self.backward.len() - 1 {
            return;
        }
        for _ in 0..steps {
            if let Some(entry) = self.backward.pop() {
                self.forward.push_front(entry);
            }
        }
        debug!("History: back {} steps", steps);
        self.replay();
    }

    pub fn forward(&mut self, steps: usize) {
        if steps == 0 || steps > self.forward.len() {
            return;
        }
        for _ in 0..steps {
            if let Some(entry) = self.forward.pop_front() {
                self.backward.push(entry);
            }
        }
        debug!("History: forward {} steps", steps);
        self.replay();
    }

    fn replay(&mut self) {
        if let Some(entry) = self.backward.last().cloned() {
            self.replaying = true;
            let restore = self.views.get(&entry.albums).cloned();
            let albums = entry.albums.clone();
            self.emit(HistoryEvent::Navigate(entry));
            if let Some(view) = restore {
                self.emit(HistoryEvent::RestoreView { albums, view });
            }
        }
        self.emit_state();
    }

    /// For views that apply a replayed selection without echoing it back.
    pub fn end_replay(&mut self) {
        self.replaying = false;
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Forget every entry that selected exactly `album`, and every
    /// remembered view of a set containing it.
    pub fn delete_album(&mut self, album: AlbumHandle) {
        let target = [album];
        let before = self.backward.len() + self.forward.len();

        self.backward.retain(|e| e.albums != target);
        self.backward.dedup_by(|a, b| a.same_position(b));

        let mut forward: Vec<HistoryEntry> = self
            .forward
            .drain(..)
            .filter(|e| e.albums != target)
            .collect();
        forward.dedup_by(|a, b| a.same_position(b));
        self.forward = forward.into();

        while let (Some(last), Some(first)) = (self.backward.last(), self.forward.front()) {
            if !last.same_position(first) {
                break;
            }
            self.forward.pop_front();
        }

        if self.backward.is_empty() {
            if let Some(first) = self.forward.pop_front() {
                self.backward.push(first);
            }
        }

        self.views.retain(|albums, _| !albums.contains(&album));

        let removed = before - (self.backward.len() + self.forward.len());
        if removed > 0 {
            debug!("History: dropped {} entries for a deleted album", removed);
        }
        self.emit_state();
    }

    /// Feed registry events to drop entries of removed albums.
    pub fn album_event(&mut self, event: &AlbumEvent) {
        if let AlbumEvent::Removed { handle, .. } = event {
            self.delete_album(*handle);
        }
    }

    pub fn clear(&mut self) {
        self.backward.clear();
        self.forward.clear();
        self.views.clear();
        self.replaying = false;
        self.emit_state();
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.backward.last()
    }

    /// True when there is nothing before the current entry.
    pub fn is_backward_empty(&self) -> bool {
        self.backward.len() <= 1
    }

    pub fn is_forward_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn backward_len(&self) -> usize {
        self.backward.len()
    }

    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    /// Titles of earlier entries, most recent first.
    pub fn backward_titles(&self, manager: &AlbumManager) -> Vec<String> {
        self.backward
            .iter()
            .rev()
            .skip(1)
            .filter_map(|e| entry_title(manager, e))
            .collect()
    }

    /// Titles of later entries, nearest first.
    pub fn forward_titles(&self, manager: &AlbumManager) -> Vec<String> {
        self.forward
            .iter()
            .filter_map(|e| entry_title(manager, e))
            .collect()
    }

    fn emit_state(&mut self) {
        let can_go_back = !self.is_backward_empty();
        let can_go_forward = !self.is_forward_empty();
        if can_go_back != self.can_go_back {
            self.can_go_back = can_go_back;
            self.emit(HistoryEvent::CanGoBack(can_go_back));
        }
        if can_go_forward != self.can_go_forward {
            self.can_go_forward = can_go_forward;
            self.emit(HistoryEvent::CanGoForward(can_go_forward));
        }
    }
}

fn entry_title(manager: &AlbumManager, entry: &HistoryEntry) -> Option<String> {
    let titles: Vec<&str> = entry
        .albums
        .iter()
        .filter_map(|h| manager.get(*h))
        .map(|a| a.title())
        .collect();
    if !titles.is_empty() {
        Some(titles.join(", "))
    } else if entry.labels.is_some() {
        Some("Labels".to_string())
    } else {
        None
    }
}
