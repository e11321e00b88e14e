//! Tri-state check marks over an album tree.
//!
//! In cascading mode checking or unchecking an album forces its whole
//! subtree to the same state, then every ancestor up to the model root is
//! recomputed from its children: all checked gives checked, all unchecked
//! gives unchecked, anything else gives partially checked.
//!
//! A mutation emits one [`ModelEvent::CheckStateChanged`] per album whose
//! final state differs from its state before the call, in the order the
//! albums were first touched.

use std::collections::HashSet;
use tracing::{debug, trace};

use super::counting::CountingAlbumModel;
use super::{CheckDecoration, CheckState, ModelEvent, TristateMode};
use crate::album::{AlbumEvent, AlbumHandle, AlbumManager, SideTable};
use crate::signal::ListenerId;

/// Original states of the albums touched by one operation.
#[derive(Default)]
struct ChangeSet {
    seen: HashSet<AlbumHandle>,
    touched: Vec<(AlbumHandle, CheckState)>,
}

impl ChangeSet {
    fn write(&mut self, states: &mut SideTable<CheckState>, handle: AlbumHandle, state: CheckState) {
        let old = states.get(handle).copied().unwrap_or_default();
        if self.seen.insert(handle) {
            self.touched.push((handle, old));
        }
        match state {
            CheckState::Unchecked => states.remove(handle),
            _ => states.insert(handle, state),
        };
    }
}

pub struct CheckableAlbumModel {
    counting: CountingAlbumModel,
    checkable: bool,
    root_checkable: bool,
    cascading: bool,
    tristate: TristateMode,
    states: SideTable<CheckState>,
    /// The tree changed shape since parents were last recomputed.
    stale: bool,
}

impl CheckableAlbumModel {
    pub fn new(root: AlbumHandle) -> Self {
        Self {
            counting: CountingAlbumModel::new(root),
            checkable: true,
            root_checkable: true,
            cascading: true,
            tristate: TristateMode::Partial,
            states: SideTable::new(),
            stale: false,
        }
    }

    pub fn root(&self) -> AlbumHandle {
        self.counting.root()
    }

    pub fn counting(&self) -> &CountingAlbumModel {
        &self.counting
    }

    pub fn counting_mut(&mut self) -> &mut CountingAlbumModel {
        &mut self.counting
    }

    pub fn contains(&self, manager: &AlbumManager, handle: AlbumHandle) -> bool {
        self.counting.contains(manager, handle)
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&ModelEvent) + 'static) -> ListenerId {
        self.counting.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.counting.unsubscribe(id)
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn is_checkable(&self) -> bool {
        self.checkable
    }

    /// Turning check marks off clears every mark.
    pub fn set_checkable(&mut self, manager: &AlbumManager, checkable: bool) {
        if !checkable {
            self.reset_all(manager);
        }
        self.checkable = checkable;
    }

    pub fn is_root_checkable(&self) -> bool {
        self.root_checkable
    }

    /// A non-checkable root stays unchecked and is skipped by propagation.
    pub fn set_root_checkable(&mut self, manager: &AlbumManager, root_checkable: bool) {
        self.root_checkable = root_checkable;
        if !root_checkable && manager.contains(self.root()) {
            let root = self.root();
            let mut changes = ChangeSet::default();
            changes.write(&mut self.states, root, CheckState::Unchecked);
            self.commit(changes);
        }
    }

    pub fn is_cascading(&self) -> bool {
        self.cascading
    }

    pub fn set_cascading(&mut self, cascading: bool) {
        self.cascading = cascading;
    }

    pub fn tristate_mode(&self) -> TristateMode {
        self.tristate
    }

    pub fn set_tristate_mode(&mut self, mode: TristateMode) {
        self.tristate = mode;
    }

    // ========================================================================
    // Reading
    // ========================================================================
    //
    // Reads first recompute parents if the tree changed shape since the last
    // call, so they take the manager and `&mut self`.

    pub fn check_state(&mut self, manager: &AlbumManager, handle: AlbumHandle) -> CheckState {
        self.resync(manager);
        self.state_of(handle)
    }

    pub fn is_checked(&mut self, manager: &AlbumManager, handle: AlbumHandle) -> bool {
        self.check_state(manager, handle) == CheckState::Checked
    }

    pub fn decoration(&mut self, manager: &AlbumManager, handle: AlbumHandle) -> CheckDecoration {
        match (self.tristate, self.check_state(manager, handle)) {
            (_, CheckState::Unchecked) => CheckDecoration::None,
            (TristateMode::Partial, CheckState::Checked) => CheckDecoration::None,
            (TristateMode::Partial, CheckState::PartiallyChecked) => CheckDecoration::Partial,
            (TristateMode::AddExclude, CheckState::Checked) => CheckDecoration::Add,
            (TristateMode::AddExclude, CheckState::PartiallyChecked) => CheckDecoration::Exclude,
        }
    }

    /// Checked albums in pre-order.
    pub fn checked_nodes(&mut self, manager: &AlbumManager) -> Vec<AlbumHandle> {
        self.nodes_in_state(manager, CheckState::Checked)
    }

    pub fn partially_checked_nodes(&mut self, manager: &AlbumManager) -> Vec<AlbumHandle> {
        self.nodes_in_state(manager, CheckState::PartiallyChecked)
    }

    fn nodes_in_state(&mut self, manager: &AlbumManager, state: CheckState) -> Vec<AlbumHandle> {
        self.resync(manager);
        self.counting
            .nodes(manager)
            .into_iter()
            .filter(|h| self.state_of(*h) == state)
            .collect()
    }

    /// Stored state, without recomputing parents. Callers resync first.
    pub(crate) fn state_of(&self, handle: AlbumHandle) -> CheckState {
        self.states.get(handle).copied().unwrap_or_default()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn set_checked(&mut self, manager: &AlbumManager, handle: AlbumHandle, checked: bool) {
        let state = if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        };
        self.set_check_state(manager, handle, state);
    }

    pub fn set_check_state(&mut self, manager: &AlbumManager, handle: AlbumHandle, state: CheckState) {
        if !self.accepts(manager, handle) {
            return;
        }
        let mut changes = self.resync_changes(manager);

        if self.cascading && state != CheckState::PartiallyChecked {
            for node in self.subtree(manager, handle) {
                changes.write(&mut self.states, node, state);
            }
            self.propagate_up(manager, handle, &mut changes);
        } else {
            changes.write(&mut self.states, handle, state);
        }

        trace!("Check state of {:?} set to {:?}", handle, state);
        self.commit(changes);
    }

    /// Flip checked and unchecked. Partially checked albums stay as they are.
    pub fn toggle(&mut self, manager: &AlbumManager, handle: AlbumHandle) {
        match self.check_state(manager, handle) {
            CheckState::Checked => self.set_check_state(manager, handle, CheckState::Unchecked),
            CheckState::Unchecked => self.set_check_state(manager, handle, CheckState::Checked),
            CheckState::PartiallyChecked => {}
        }
    }

    pub fn reset_all(&mut self, manager: &AlbumManager) {
        let mut changes = ChangeSet::default();
        for node in self.counting.nodes(manager) {
            if self.state_of(node) != CheckState::Unchecked {
                changes.write(&mut self.states, node, CheckState::Unchecked);
            }
        }
        // Marks of albums no longer in the tree go too.
        self.states.retain_live(manager);
        self.stale = false;
        debug!("Reset all check states");
        self.commit(changes);
    }

    pub fn reset_subtree(&mut self, manager: &AlbumManager, handle: AlbumHandle) {
        self.force_subtree(manager, handle, CheckState::Unchecked);
    }

    pub fn check_all_subtree(&mut self, manager: &AlbumManager, handle: AlbumHandle) {
        self.force_subtree(manager, handle, CheckState::Checked);
    }

    fn force_subtree(&mut self, manager: &AlbumManager, handle: AlbumHandle, state: CheckState) {
        if !self.accepts(manager, handle) {
            return;
        }
        let mut changes = self.resync_changes(manager);
        for node in self.subtree(manager, handle) {
            if !self.is_locked_root(node) {
                changes.write(&mut self.states, node, state);
            }
        }
        if self.cascading {
            self.propagate_up(manager, handle, &mut changes);
        }
        self.commit(changes);
    }

    /// Invert every mark below and including `handle`.
    ///
    /// In cascading mode only the leaves are flipped; inner albums are then
    /// recomputed from their children.
    pub fn invert_subtree(&mut self, manager: &AlbumManager, handle: AlbumHandle) {
        if !self.accepts(manager, handle) {
            return;
        }
        let mut changes = self.resync_changes(manager);
        let nodes = self.subtree(manager, handle);

        if self.cascading {
            for node in nodes.iter().rev() {
                let is_leaf = manager.get(*node).is_some_and(|a| !a.has_children());
                let state = if is_leaf {
                    match self.state_of(*node) {
                        CheckState::Checked => CheckState::Unchecked,
                        _ => CheckState::Checked,
                    }
                } else {
                    self.aggregate_children(manager, *node)
                };
                if !self.is_locked_root(*node) {
                    changes.write(&mut self.states, *node, state);
                }
            }
            self.propagate_up(manager, handle, &mut changes);
        } else {
            for node in nodes {
                let state = match self.state_of(node) {
                    CheckState::Checked => CheckState::Unchecked,
                    CheckState::Unchecked => CheckState::Checked,
                    CheckState::PartiallyChecked => continue,
                };
                if !self.is_locked_root(node) {
                    changes.write(&mut self.states, node, state);
                }
            }
        }
        self.commit(changes);
    }

    /// Set `handle` and every album below it, leaving ancestors alone.
    pub fn set_check_state_for_children(
        &mut self,
        manager: &AlbumManager,
        handle: AlbumHandle,
        state: CheckState,
    ) {
        if !self.checkable || !self.contains(manager, handle) {
            return;
        }
        let mut changes = self.resync_changes(manager);
        for node in self.subtree(manager, handle) {
            if !self.is_locked_root(node) {
                changes.write(&mut self.states, node, state);
            }
        }
        self.commit(changes);
    }

    /// Set `handle` and its ancestors, stopping below the model root.
    pub fn set_check_state_for_parents(
        &mut self,
        manager: &AlbumManager,
        handle: AlbumHandle,
        state: CheckState,
    ) {
        if !self.checkable || !self.contains(manager, handle) || handle == self.root() {
            return;
        }
        let mut changes = self.resync_changes(manager);
        let root = self.root();
        let path: Vec<AlbumHandle> = std::iter::once(handle)
            .chain(manager.ancestors(handle).take_while(|a| *a != root))
            .collect();
        for node in path {
            changes.write(&mut self.states, node, state);
        }
        self.commit(changes);
    }

    /// Recompute inner albums after the tree changed shape.
    ///
    /// Reads and mutations do this on their own; views call it to get the
    /// change events right after an add, move or remove.
    pub fn resync(&mut self, manager: &AlbumManager) {
        let changes = self.resync_changes(manager);
        self.commit(changes);
    }

    fn resync_changes(&mut self, manager: &AlbumManager) -> ChangeSet {
        let mut changes = ChangeSet::default();
        if !std::mem::take(&mut self.stale) || !self.cascading {
            return changes;
        }
        for node in self.counting.nodes(manager).into_iter().rev() {
            let has_children = manager.get(node).is_some_and(|a| a.has_children());
            if has_children && !self.is_locked_root(node) {
                let state = self.aggregate_children(manager, node);
                changes.write(&mut self.states, node, state);
            }
        }
        changes
    }

    /// Keep the side tables in step with the registry.
    pub fn album_event(&mut self, event: &AlbumEvent) {
        self.counting.album_event(event);
        self.states.album_event(event);
        if matches!(
            event,
            AlbumEvent::Added(_) | AlbumEvent::Removed { .. } | AlbumEvent::Moved(_)
        ) {
            self.stale = true;
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn accepts(&self, manager: &AlbumManager, handle: AlbumHandle) -> bool {
        self.checkable && self.contains(manager, handle) && !self.is_locked_root(handle)
    }

    fn is_locked_root(&self, handle: AlbumHandle) -> bool {
        handle == self.root() && !self.root_checkable
    }

    fn subtree(&self, manager: &AlbumManager, handle: AlbumHandle) -> Vec<AlbumHandle> {
        std::iter::once(handle)
            .chain(manager.descendants(handle))
            .collect()
    }

    fn aggregate_children(&self, manager: &AlbumManager, parent: AlbumHandle) -> CheckState {
        let mut all_checked = true;
        let mut all_unchecked = true;
        let mut any = false;
        for child in manager.children(parent) {
            any = true;
            match self.state_of(child) {
                CheckState::Checked => all_unchecked = false,
                CheckState::Unchecked => all_checked = false,
                CheckState::PartiallyChecked => return CheckState::PartiallyChecked,
            }
        }
        if !any {
            self.state_of(parent)
        } else if all_checked {
            CheckState::Checked
        } else if all_unchecked {
            CheckState::Unchecked
        } else {
            CheckState::PartiallyChecked
        }
    }

    fn propagate_up(&mut self, manager: &AlbumManager, handle: AlbumHandle, changes: &mut ChangeSet) {
        if handle == self.root() {
            return;
        }
        for ancestor in manager.ancestors(handle) {
            let is_model_root = ancestor == self.root();
            if !self.is_locked_root(ancestor) {
                let state = self.aggregate_children(manager, ancestor);
                changes.write(&mut self.states, ancestor, state);
            }
            if is_model_root {
                break;
            }
        }
    }

    fn commit(&mut self, changes: ChangeSet) {
        for (album, old) in changes.touched {
            let state = self.state_of(album);
            if state != old {
                self.counting
                    .emit(ModelEvent::CheckStateChanged { album, state });
            }
        }
    }
}

impl std::fmt::Debug for CheckableAlbumModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckableAlbumModel")
            .field("root", &self.root())
            .field("checkable", &self.checkable)
            .field("cascading", &self.cascading)
            .field("tristate", &self.tristate)
            .field("marked", &self.states.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::album::AlbumType;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Tag root with two children per album, three levels deep.
    fn binary_tree() -> (AlbumManager, Vec<AlbumHandle>) {
        let mut manager = AlbumManager::in_memory();
        let root = manager.create_root(AlbumType::Tag);
        let mut all = vec![root];
        let mut level = vec![root];
        for depth in 1..=3 {
            let mut next = Vec::new();
            for (i, parent) in level.iter().enumerate() {
                for side in ["l", "r"] {
                    let title = format!("{}{}{}", side, depth, i);
                    let child = manager.create_tag(*parent, &title).unwrap();
                    next.push(child);
                    all.push(child);
                }
            }
            level = next;
        }
        (manager, all)
    }

    fn record(model: &mut CheckableAlbumModel) -> Rc<RefCell<Vec<ModelEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_cascading_round_trip() {
        let (manager, all) = binary_tree();
        let root = all[0];
        let mut model = CheckableAlbumModel::new(root);

        model.set_checked(&manager, root, true);
        let mut checked = model.checked_nodes(&manager);
        checked.sort();
        let mut expected = all.clone();
        expected.sort();
        assert_eq!(checked, expected);

        let leaf = *all.last().unwrap();
        let ancestors: Vec<AlbumHandle> = manager.ancestors(leaf).collect();
        model.set_checked(&manager, leaf, false);

        for ancestor in &ancestors {
            assert_eq!(model.check_state(&manager, *ancestor), CheckState::PartiallyChecked);
        }
        for node in &all {
            if *node != leaf && !ancestors.contains(node) {
                assert_eq!(model.check_state(&manager, *node), CheckState::Checked);
            }
        }
        assert_eq!(model.partially_checked_nodes(&manager), {
            let mut expected = ancestors.clone();
            expected.reverse();
            expected
        });
    }

    #[test]
    fn test_one_event_per_changed_album() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        model.set_checked(&manager, all[0], true);

        let events = record(&mut model);
        let leaf = *all.last().unwrap();
        model.set_checked(&manager, leaf, false);
        // The leaf and its three ancestors.
        assert_eq!(events.borrow().len(), 4);
        assert_eq!(
            events.borrow()[0],
            ModelEvent::CheckStateChanged {
                album: leaf,
                state: CheckState::Unchecked
            }
        );

        events.borrow_mut().clear();
        model.set_checked(&manager, leaf, false);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_all_children_checked_checks_parent() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        let parent = all[1];
        let children: Vec<AlbumHandle> = manager.children(parent).collect();

        model.set_checked(&manager, children[0], true);
        assert_eq!(model.check_state(&manager, parent), CheckState::PartiallyChecked);
        model.set_checked(&manager, children[1], true);
        assert_eq!(model.check_state(&manager, parent), CheckState::Checked);
        model.set_checked(&manager, children[0], false);
        model.set_checked(&manager, children[1], false);
        assert_eq!(model.check_state(&manager, parent), CheckState::Unchecked);
        assert_eq!(model.check_state(&manager, all[0]), CheckState::Unchecked);
    }

    #[test]
    fn test_non_cascading_touches_only_the_album() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        model.set_cascading(false);

        model.set_checked(&manager, all[1], true);
        assert_eq!(model.checked_nodes(&manager), vec![all[1]]);

        model.set_check_state(&manager, all[2], CheckState::PartiallyChecked);
        assert_eq!(model.partially_checked_nodes(&manager), vec![all[2]]);
    }

    #[test]
    fn test_toggle_skips_partial() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        let leaf = *all.last().unwrap();

        model.toggle(&manager, leaf);
        assert!(model.is_checked(&manager, leaf));
        let parent = manager.get(leaf).unwrap().parent().unwrap();
        assert_eq!(model.check_state(&manager, parent), CheckState::PartiallyChecked);

        model.toggle(&manager, parent);
        assert_eq!(model.check_state(&manager, parent), CheckState::PartiallyChecked);

        model.toggle(&manager, leaf);
        assert!(!model.is_checked(&manager, leaf));
    }

    #[test]
    fn test_reset_and_check_subtree() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        let branch = all[1];

        model.check_all_subtree(&manager, branch);
        assert_eq!(model.checked_nodes(&manager).len(), 7);
        assert_eq!(model.check_state(&manager, all[0]), CheckState::PartiallyChecked);

        model.reset_subtree(&manager, branch);
        assert!(model.checked_nodes(&manager).is_empty());
        assert_eq!(model.check_state(&manager, all[0]), CheckState::Unchecked);

        model.set_checked(&manager, all[0], true);
        model.reset_all(&manager);
        assert!(model.checked_nodes(&manager).is_empty());
        assert!(model.partially_checked_nodes(&manager).is_empty());
    }

    #[test]
    fn test_invert_subtree_flips_leaves() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        let branch = all[1];
        let leaves: Vec<AlbumHandle> = manager
            .descendants(branch)
            .filter(|h| !manager.get(*h).unwrap().has_children())
            .collect();
        model.set_checked(&manager, leaves[0], true);

        model.invert_subtree(&manager, branch);

        assert!(!model.is_checked(&manager, leaves[0]));
        for leaf in &leaves[1..] {
            assert!(model.is_checked(&manager, *leaf));
        }
        assert_eq!(model.check_state(&manager, branch), CheckState::PartiallyChecked);

        // Inverting twice restores the marks.
        model.invert_subtree(&manager, branch);
        assert_eq!(model.checked_nodes(&manager), vec![leaves[0]]);
    }

    #[test]
    fn test_root_not_checkable() {
        let (manager, all) = binary_tree();
        let root = all[0];
        let mut model = CheckableAlbumModel::new(root);
        model.set_checked(&manager, root, true);
        assert!(model.is_checked(&manager, root));

        model.set_root_checkable(&manager, false);
        assert_eq!(model.check_state(&manager, root), CheckState::Unchecked);

        model.set_checked(&manager, root, true);
        assert_eq!(model.check_state(&manager, root), CheckState::Unchecked);

        // Propagation stops below the root.
        model.check_all_subtree(&manager, all[1]);
        model.check_all_subtree(&manager, all[2]);
        assert_eq!(model.check_state(&manager, root), CheckState::Unchecked);
    }

    #[test]
    fn test_set_checkable_false_resets() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        model.set_checked(&manager, all[0], true);

        model.set_checkable(&manager, false);
        assert!(model.checked_nodes(&manager).is_empty());

        model.set_checked(&manager, all[1], true);
        assert!(model.checked_nodes(&manager).is_empty());
    }

    #[test]
    fn test_children_and_parents_helpers() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        let branch = all[1];
        let leaf = manager.descendants(branch).last().unwrap();

        model.set_check_state_for_children(&manager, branch, CheckState::Checked);
        assert!(model.is_checked(&manager, branch));
        assert_eq!(model.checked_nodes(&manager).len(), 7);
        // Ancestors are left alone.
        assert_eq!(model.check_state(&manager, all[0]), CheckState::Unchecked);

        model.reset_all(&manager);
        model.set_check_state_for_parents(&manager, leaf, CheckState::Checked);
        let middle = manager.get(leaf).unwrap().parent().unwrap();
        assert_eq!(model.checked_nodes(&manager), vec![branch, middle, leaf]);
        assert!(!model.is_checked(&manager, all[0]));

        // Starting at the model root changes nothing.
        model.reset_all(&manager);
        model.set_check_state_for_parents(&manager, all[0], CheckState::Checked);
        assert!(model.checked_nodes(&manager).is_empty());
    }

    #[test]
    fn test_decoration_by_mode() {
        let (manager, all) = binary_tree();
        let mut model = CheckableAlbumModel::new(all[0]);
        model.set_cascading(false);
        model.set_checked(&manager, all[1], true);
        model.set_check_state(&manager, all[2], CheckState::PartiallyChecked);

        assert_eq!(model.decoration(&manager, all[1]), CheckDecoration::None);
        assert_eq!(model.decoration(&manager, all[2]), CheckDecoration::Partial);

        model.set_tristate_mode(TristateMode::AddExclude);
        assert_eq!(model.decoration(&manager, all[1]), CheckDecoration::Add);
        assert_eq!(model.decoration(&manager, all[2]), CheckDecoration::Exclude);
        assert_eq!(model.decoration(&manager, all[3]), CheckDecoration::None);
    }

    #[test]
    fn test_stale_and_foreign_albums_are_ignored() {
        let (mut manager, all) = binary_tree();
        let model = Rc::new(RefCell::new(CheckableAlbumModel::new(all[1])));
        let observer = model.clone();
        manager.subscribe(move |e| observer.borrow_mut().album_event(e));

        let leaf = *all.last().unwrap();
        let foreign = all[2];
        model.borrow_mut().set_checked(&manager, foreign, true);
        assert!(!model.borrow_mut().is_checked(&manager, foreign));

        let inside = manager.descendants(all[1]).last().unwrap();
        model.borrow_mut().set_checked(&manager, inside, true);
        manager.remove(inside).unwrap();
        assert!(!model.borrow_mut().is_checked(&manager, inside));

        model.borrow_mut().set_checked(&manager, inside, true);
        assert!(model.borrow_mut().checked_nodes(&manager).is_empty());
        assert!(manager.contains(leaf));
    }

    #[test]
    fn test_resync_after_add() {
        let (mut manager, all) = binary_tree();
        let model = Rc::new(RefCell::new(CheckableAlbumModel::new(all[0])));
        let observer = model.clone();
        manager.subscribe(move |e| observer.borrow_mut().album_event(e));

        model.borrow_mut().set_checked(&manager, all[0], true);
        let leaf = *all.last().unwrap();
        manager.create_tag(leaf, "fresh").unwrap();

        let events = record(&mut model.borrow_mut());
        model.borrow_mut().resync(&manager);

        let mut m = model.borrow_mut();
        assert_eq!(m.check_state(&manager, leaf), CheckState::Unchecked);
        for ancestor in manager.ancestors(leaf) {
            assert_eq!(m.check_state(&manager, ancestor), CheckState::PartiallyChecked);
        }
        assert_eq!(events.borrow().len(), 4);
    }

    #[test]
    fn test_parent_recomputed_after_sibling_removed() {
        let mut manager = AlbumManager::in_memory();
        let root = manager.create_root(AlbumType::Tag);
        let a = manager.create_tag(root, "a").unwrap();
        let a1 = manager.create_tag(a, "a1").unwrap();
        let a2 = manager.create_tag(a, "a2").unwrap();

        let model = Rc::new(RefCell::new(CheckableAlbumModel::new(root)));
        let observer = model.clone();
        manager.subscribe(move |e| observer.borrow_mut().album_event(e));

        model.borrow_mut().set_checked(&manager, a1, true);
        assert_eq!(model.borrow_mut().check_state(&manager, a), CheckState::PartiallyChecked);

        let events = record(&mut model.borrow_mut());
        manager.remove(a2).unwrap();

        let mut m = model.borrow_mut();
        assert_eq!(m.check_state(&manager, a), CheckState::Checked);
        assert_eq!(m.check_state(&manager, root), CheckState::Checked);
        assert_eq!(m.checked_nodes(&manager), vec![root, a, a1]);
        assert!(events.borrow().contains(&ModelEvent::CheckStateChanged {
            album: a,
            state: CheckState::Checked,
        }));
    }
}
