//! Match classification of albums under a live query.
//!
//! Every album gets a [`MatchResult`]. An album stays visible when it
//! matches itself, sits below a matching album (full filtering only), has a
//! matching album below it, or is a root or otherwise protected album.

pub mod sort;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::album::{Album, AlbumHandle, AlbumManager, AlbumType};
use crate::model::{CheckState, CheckableAlbumModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchResult {
    NoMatch,
    /// The album itself satisfies the predicate.
    DirectMatch,
    /// A strict, non-root ancestor satisfies the predicate.
    AncestorMatch,
    /// Some album in the subtree satisfies the predicate.
    DescendantMatch,
    /// Roots and protected albums.
    AlwaysVisible,
}

impl MatchResult {
    pub fn is_visible(self) -> bool {
        self != MatchResult::NoMatch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterBehavior {
    /// Albums below a match stay visible.
    #[default]
    Full,
    /// Only matches and the path down to them stay visible.
    Simple,
}

/// Text query as typed into a search box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTextSettings {
    pub text: String,
    pub case_sensitive: bool,
}

impl SearchTextSettings {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            case_sensitive: false,
        }
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Substring match. An empty query matches everything.
    pub fn matches_text(&self, haystack: &str) -> bool {
        if self.text.is_empty() {
            return true;
        }
        if self.case_sensitive {
            haystack.contains(&self.text)
        } else {
            haystack.to_lowercase().contains(&self.text.to_lowercase())
        }
    }
}

/// Decides whether a single album matches, ignoring its relatives.
pub trait AlbumPredicate {
    fn matches(&self, album: &Album) -> bool;
}

impl<F> AlbumPredicate for F
where
    F: Fn(&Album) -> bool,
{
    fn matches(&self, album: &Album) -> bool {
        self(album)
    }
}

impl AlbumPredicate for SearchTextSettings {
    fn matches(&self, album: &Album) -> bool {
        self.matches_text(album.title())
    }
}

/// Matches checked albums, and optionally partially checked ones.
pub struct CheckStatePredicate<'a> {
    model: &'a CheckableAlbumModel,
    include_partial: bool,
}

impl<'a> CheckStatePredicate<'a> {
    /// Brings the model's parent states up to date before borrowing it.
    pub fn new(
        model: &'a mut CheckableAlbumModel,
        manager: &AlbumManager,
        include_partial: bool,
    ) -> Self {
        model.resync(manager);
        Self {
            model,
            include_partial,
        }
    }
}

impl AlbumPredicate for CheckStatePredicate<'_> {
    fn matches(&self, album: &Album) -> bool {
        match self.model.state_of(album.handle()) {
            CheckState::Checked => true,
            CheckState::PartiallyChecked => self.include_partial,
            CheckState::Unchecked => false,
        }
    }
}

pub struct TypePredicate(pub AlbumType);

impl AlbumPredicate for TypePredicate {
    fn matches(&self, album: &Album) -> bool {
        album.album_type() == self.0
    }
}

/// Classify one album by walking its ancestors and subtree.
///
/// Linear in the subtree size; prefer [`filter_tree`] for whole views.
pub fn classify(
    manager: &AlbumManager,
    handle: AlbumHandle,
    predicate: &dyn AlbumPredicate,
    behavior: FilterBehavior,
    protected: &HashSet<AlbumHandle>,
) -> MatchResult {
    let Some(album) = manager.get(handle) else {
        return MatchResult::NoMatch;
    };
    if album.is_root() || protected.contains(&handle) {
        return MatchResult::AlwaysVisible;
    }
    if predicate.matches(album) {
        return MatchResult::DirectMatch;
    }
    if behavior == FilterBehavior::Full && ancestor_matches(manager, handle, predicate) {
        return MatchResult::AncestorMatch;
    }
    let descendant_match = manager
        .descendants(handle)
        .filter_map(|h| manager.get(h))
        .any(|a| predicate.matches(a));
    if descendant_match {
        return MatchResult::DescendantMatch;
    }
    MatchResult::NoMatch
}

fn ancestor_matches(manager: &AlbumManager, handle: AlbumHandle, predicate: &dyn AlbumPredicate) -> bool {
    manager
        .ancestors(handle)
        .filter_map(|h| manager.get(h))
        .filter(|a| !a.is_root())
        .any(|a| predicate.matches(a))
}

/// Match results for a whole subtree.
#[derive(Debug, Clone, Default)]
pub struct FilterResults {
    /// Albums in pre-order.
    order: Vec<AlbumHandle>,
    results: HashMap<AlbumHandle, MatchResult>,
    /// Albums with at least one direct match somewhere below them.
    with_matching_descendant: HashSet<AlbumHandle>,
}

impl FilterResults {
    /// Result for an album; albums outside the filtered subtree are `NoMatch`.
    pub fn get(&self, handle: AlbumHandle) -> MatchResult {
        self.results
            .get(&handle)
            .copied()
            .unwrap_or(MatchResult::NoMatch)
    }

    pub fn is_visible(&self, handle: AlbumHandle) -> bool {
        self.get(handle).is_visible()
    }

    /// Visible albums in pre-order.
    pub fn visible(&self) -> Vec<AlbumHandle> {
        self.order
            .iter()
            .copied()
            .filter(|h| self.is_visible(*h))
            .collect()
    }

    pub fn has_matching_descendant(&self, handle: AlbumHandle) -> bool {
        self.with_matching_descendant.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Classify `root` and its whole subtree in one pass each way.
///
/// Gives the same results as calling [`classify`] on every album.
pub fn filter_tree(
    manager: &AlbumManager,
    root: AlbumHandle,
    behavior: FilterBehavior,
    predicate: &dyn AlbumPredicate,
    protected: &HashSet<AlbumHandle>,
) -> FilterResults {
    if !manager.contains(root) {
        return FilterResults::default();
    }
    let order: Vec<AlbumHandle> = std::iter::once(root)
        .chain(manager.descendants(root))
        .collect();

    let direct: HashSet<AlbumHandle> = order
        .iter()
        .copied()
        .filter(|h| manager.get(*h).is_some_and(|a| predicate.matches(a)))
        .collect();

    // Bottom-up: children come after their parent in pre-order.
    let mut with_matching_descendant = HashSet::new();
    for handle in order.iter().rev() {
        let hit = manager
            .children(*handle)
            .any(|c| direct.contains(&c) || with_matching_descendant.contains(&c));
        if hit {
            with_matching_descendant.insert(*handle);
        }
    }

    // Top-down: seed with the ancestors above the filtered subtree.
    let mut under_match: HashSet<AlbumHandle> = HashSet::new();
    if behavior == FilterBehavior::Full {
        if ancestor_matches(manager, root, predicate) {
            under_match.insert(root);
        }
        for handle in &order[1..] {
            let Some(parent) = manager.get(*handle).and_then(|a| a.parent()) else {
                continue;
            };
            let parent_is_root = manager.get(parent).is_some_and(|a| a.is_root());
            let parent_counts = !parent_is_root && direct.contains(&parent);
            if parent_counts || under_match.contains(&parent) {
                under_match.insert(*handle);
            }
        }
    }

    let results = order
        .iter()
        .map(|handle| {
            let is_root = manager.get(*handle).is_some_and(|a| a.is_root());
            let result = if is_root || protected.contains(handle) {
                MatchResult::AlwaysVisible
            } else if direct.contains(handle) {
                MatchResult::DirectMatch
            } else if under_match.contains(handle) {
                MatchResult::AncestorMatch
            } else if with_matching_descendant.contains(handle) {
                MatchResult::DescendantMatch
            } else {
                MatchResult::NoMatch
            };
            (*handle, result)
        })
        .collect();

    FilterResults {
        order,
        results,
        with_matching_descendant,
    }
}

/// Text filter over one album tree, with cached results.
///
/// The cache is rebuilt when the tree shape or titles change (tracked
/// through [`AlbumManager::structure_generation`]) or the query changes.
#[derive(Debug)]
pub struct AlbumFilterModel {
    root: AlbumHandle,
    behavior: FilterBehavior,
    settings: SearchTextSettings,
    protected: HashSet<AlbumHandle>,
    revision: u64,
    cache: Option<(u64, u64, FilterResults)>,
}

impl AlbumFilterModel {
    pub fn new(root: AlbumHandle, behavior: FilterBehavior) -> Self {
        Self {
            root,
            behavior,
            settings: SearchTextSettings::default(),
            protected: HashSet::new(),
            revision: 0,
            cache: None,
        }
    }

    pub fn root(&self) -> AlbumHandle {
        self.root
    }

    pub fn behavior(&self) -> FilterBehavior {
        self.behavior
    }

    pub fn set_behavior(&mut self, behavior: FilterBehavior) {
        if self.behavior != behavior {
            self.behavior = behavior;
            self.invalidate();
        }
    }

    pub fn search_text(&self) -> &SearchTextSettings {
        &self.settings
    }

    pub fn set_search_text(&mut self, settings: SearchTextSettings) {
        if self.settings != settings {
            debug!("Filter text changed to {:?}", settings.text);
            self.settings = settings;
            self.invalidate();
        }
    }

    pub fn is_filtering(&self) -> bool {
        !self.settings.is_empty()
    }

    /// Keep an album visible whatever the query.
    pub fn protect(&mut self, handle: AlbumHandle) {
        if self.protected.insert(handle) {
            self.invalidate();
        }
    }

    pub fn unprotect(&mut self, handle: AlbumHandle) {
        if self.protected.remove(&handle) {
            self.invalidate();
        }
    }

    /// Drop cached results.
    pub fn invalidate(&mut self) {
        self.revision += 1;
        self.cache = None;
    }

    /// Results for the whole tree, recomputed only when stale.
    pub fn results(&mut self, manager: &AlbumManager) -> &FilterResults {
        let generation = manager.structure_generation();
        let revision = self.revision;
        let fresh = matches!(&self.cache, Some((g, r, _)) if *g == generation && *r == revision);
        if !fresh {
            self.cache = None;
        }
        let cache = self.cache.get_or_insert_with(|| {
            let results = filter_tree(
                manager,
                self.root,
                self.behavior,
                &self.settings,
                &self.protected,
            );
            (generation, revision, results)
        });
        &cache.2
    }

    pub fn match_result(&mut self, manager: &AlbumManager, handle: AlbumHandle) -> MatchResult {
        self.results(manager).get(handle)
    }

    pub fn is_visible(&mut self, manager: &AlbumManager, handle: AlbumHandle) -> bool {
        self.match_result(manager, handle).is_visible()
    }

    /// Albums a view has to expand to reveal every match, in pre-order.
    /// Nothing needs expanding while no query is set.
    pub fn expand_matches(&mut self, manager: &AlbumManager) -> Vec<AlbumHandle> {
        if !self.is_filtering() {
            return Vec::new();
        }
        let results = self.results(manager);
        results
            .order
            .iter()
            .copied()
            .filter(|h| results.is_visible(*h) && results.has_matching_descendant(*h))
            .collect()
    }
}
