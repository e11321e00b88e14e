//! Slot arena holding every album, with the tree links stored as handles.
//!
//! Sibling order is insertion order. All link updates are O(1) except the
//! subtree walks, which are linear in the subtree size.

use super::{Album, AlbumHandle};

/// Parent, child and sibling links of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Links {
    pub parent: Option<AlbumHandle>,
    pub first_child: Option<AlbumHandle>,
    pub last_child: Option<AlbumHandle>,
    pub next: Option<AlbumHandle>,
    pub prev: Option<AlbumHandle>,
}

/// Where a detached node used to sit, so it can be put back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Position {
    pub parent: AlbumHandle,
    pub prev: Option<AlbumHandle>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    album: Option<Album>,
}

#[derive(Debug, Default)]
pub struct AlbumArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl AlbumArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot and store the album built by `build`.
    /// The album starts without any links.
    pub(crate) fn insert(&mut self, build: impl FnOnce(AlbumHandle) -> Album) -> AlbumHandle {
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                AlbumHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    album: None,
                });
                AlbumHandle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        let mut album = build(handle);
        album.handle = handle;
        album.links = Links::default();
        self.slots[handle.index as usize].album = Some(album);
        self.len += 1;
        handle
    }

    /// Free the slot of a node. The caller is responsible for unlinking first.
    pub(crate) fn remove(&mut self, handle: AlbumHandle) -> Option<Album> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let album = slot.album.take()?;
        self.free.push(handle.index);
        self.len -= 1;
        Some(album)
    }

    pub fn get(&self, handle: AlbumHandle) -> Option<&Album> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.album.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: AlbumHandle) -> Option<&mut Album> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.album.as_mut()
    }

    pub fn contains(&self, handle: AlbumHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn links(&self, handle: AlbumHandle) -> Links {
        self.get(handle).map(|a| a.links).unwrap_or_default()
    }

    fn links_mut(&mut self, handle: AlbumHandle) -> Option<&mut Links> {
        self.get_mut(handle).map(|a| &mut a.links)
    }

    /// Link `child` as the last child of `parent`.
    pub(crate) fn append_child(&mut self, parent: AlbumHandle, child: AlbumHandle) {
        let last = self.links(parent).last_child;
        self.attach_after(parent, last, child);
    }

    /// Link `child` under `parent`, right after `prev`, or as first child when
    /// `prev` is `None`.
    pub(crate) fn attach_after(
        &mut self,
        parent: AlbumHandle,
        prev: Option<AlbumHandle>,
        child: AlbumHandle,
    ) {
        let next = match prev {
            Some(p) => self.links(p).next,
            None => self.links(parent).first_child,
        };

        if let Some(links) = self.links_mut(child) {
            links.parent = Some(parent);
            links.prev = prev;
            links.next = next;
        }

        match prev {
            Some(p) => {
                if let Some(links) = self.links_mut(p) {
                    links.next = Some(child);
                }
            }
            None => {
                if let Some(links) = self.links_mut(parent) {
                    links.first_child = Some(child);
                }
            }
        }

        match next {
            Some(n) => {
                if let Some(links) = self.links_mut(n) {
                    links.prev = Some(child);
                }
            }
            None => {
                if let Some(links) = self.links_mut(parent) {
                    links.last_child = Some(child);
                }
            }
        }
    }

    /// Unlink a node (and with it its subtree) from its parent.
    /// Returns the position it occupied, or `None` for unparented nodes.
    pub(crate) fn detach(&mut self, handle: AlbumHandle) -> Option<Position> {
        let links = self.get(handle)?.links;
        let parent = links.parent?;

        match links.prev {
            Some(p) => {
                if let Some(l) = self.links_mut(p) {
                    l.next = links.next;
                }
            }
            None => {
                if let Some(l) = self.links_mut(parent) {
                    l.first_child = links.next;
                }
            }
        }

        match links.next {
            Some(n) => {
                if let Some(l) = self.links_mut(n) {
                    l.prev = links.prev;
                }
            }
            None => {
                if let Some(l) = self.links_mut(parent) {
                    l.last_child = links.prev;
                }
            }
        }

        if let Some(l) = self.links_mut(handle) {
            l.parent = None;
            l.next = None;
            l.prev = None;
        }

        Some(Position {
            parent,
            prev: links.prev,
        })
    }

    /// True iff `descendant` lies strictly below `ancestor`.
    pub fn is_ancestor_of(&self, ancestor: AlbumHandle, descendant: AlbumHandle) -> bool {
        if !self.contains(ancestor) {
            return false;
        }
        let mut current = self.get(descendant).and_then(|a| a.links.parent);
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            current = self.get(h).and_then(|a| a.links.parent);
        }
        false
    }

    pub fn children(&self, parent: AlbumHandle) -> Children<'_> {
        Children {
            arena: self,
            next: self.get(parent).and_then(|a| a.links.first_child),
        }
    }

    /// Pre-order walk of the subtree below `root`, not including `root`.
    pub fn descendants(&self, root: AlbumHandle) -> Descendants<'_> {
        Descendants {
            arena: self,
            root,
            next: self.get(root).and_then(|a| a.links.first_child),
        }
    }

    /// Strict ancestors of a node, nearest first.
    pub fn ancestors(&self, handle: AlbumHandle) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.get(handle).and_then(|a| a.links.parent),
        }
    }

    /// The node and its whole subtree, children before parents.
    pub fn post_order(&self, root: AlbumHandle) -> Vec<AlbumHandle> {
        let mut out = Vec::new();
        if self.contains(root) {
            self.collect_post_order(root, &mut out);
        }
        out
    }

    fn collect_post_order(&self, handle: AlbumHandle, out: &mut Vec<AlbumHandle>) {
        let children: Vec<AlbumHandle> = self.children(handle).collect();
        for child in children {
            self.collect_post_order(child, out);
        }
        out.push(handle);
    }
}

pub struct Children<'a> {
    arena: &'a AlbumArena,
    next: Option<AlbumHandle>,
}

impl Iterator for Children<'_> {
    type Item = AlbumHandle;

    fn next(&mut self) -> Option<AlbumHandle> {
        let current = self.next?;
        self.next = self.arena.get(current).and_then(|a| a.links.next);
        Some(current)
    }
}

pub struct Descendants<'a> {
    arena: &'a AlbumArena,
    root: AlbumHandle,
    next: Option<AlbumHandle>,
}

impl Iterator for Descendants<'_> {
    type Item = AlbumHandle;

    fn next(&mut self) -> Option<AlbumHandle> {
        let current = self.next?;
        let album = self.arena.get(current)?;

        self.next = if let Some(child) = album.links.first_child {
            Some(child)
        } else {
            // Climb until a node with a next sibling, stopping at the root.
            let mut node = current;
            loop {
                if node == self.root {
                    break None;
                }
                let links = match self.arena.get(node) {
                    Some(a) => a.links,
                    None => break None,
                };
                if let Some(sibling) = links.next {
                    break Some(sibling);
                }
                match links.parent {
                    Some(p) if p != self.root => node = p,
                    _ => break None,
                }
            }
        };

        Some(current)
    }
}

pub struct Ancestors<'a> {
    arena: &'a AlbumArena,
    next: Option<AlbumHandle>,
}

impl Iterator for Ancestors<'_> {
    type Item = AlbumHandle;

    fn next(&mut self) -> Option<AlbumHandle> {
        let current = self.next?;
        self.next = self.arena.get(current).and_then(|a| a.links.parent);
        Some(current)
    }
}
