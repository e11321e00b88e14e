//! Backing store abstraction for album rows.
//!
//! The album trees are rebuilt from rows at startup and every validated
//! mutation is mirrored back through [`AlbumStore`]. A failing store call makes
//! the manager roll the in-memory change back.

pub mod memory;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::album::{Album, AlbumIcon, AlbumId, AlbumType, DateRange, SearchKind};

pub use memory::MemoryStore;

/// One persisted album row, as exchanged with the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRow {
    pub album_type: AlbumType,
    pub id: AlbumId,
    /// Parent album id; 0 means the root of the type.
    #[serde(default)]
    pub parent_id: AlbumId,
    #[serde(default)]
    pub title: String,
    /// Container path relative to the collection root.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub created: Option<NaiveDate>,
    #[serde(default)]
    pub trash: bool,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub range: Option<DateRange>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub search_kind: Option<SearchKind>,
    #[serde(default)]
    pub icon: Option<AlbumIcon>,
}

impl AlbumRow {
    /// A row with only the identifying fields set.
    pub fn new(album_type: AlbumType, id: AlbumId, parent_id: AlbumId, title: impl Into<String>) -> Self {
        Self {
            album_type,
            id,
            parent_id,
            title: title.into(),
            path: None,
            collection: None,
            caption: None,
            created: None,
            trash: false,
            date: None,
            range: None,
            query: None,
            search_kind: None,
            icon: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate, range: DateRange) -> Self {
        self.date = Some(date);
        self.range = Some(range);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>, kind: SearchKind) -> Self {
        self.query = Some(query.into());
        self.search_kind = Some(kind);
        self
    }
}

/// Persistence collaborator for the album trees.
pub trait AlbumStore {
    // === Loading ===

    /// All rows of one album type, in any order.
    fn list_album_rows(&self, album_type: AlbumType) -> Result<Vec<AlbumRow>>;

    // === Mutations ===

    /// Persist a newly created album.
    fn create_row(&mut self, row: &AlbumRow) -> Result<()>;

    /// Delete the rows of an album and its whole subtree.
    fn delete_rows(&mut self, album_type: AlbumType, ids: &[AlbumId]) -> Result<()>;

    /// Change the title of an album. Container stores also update the
    /// derived paths of the album and its descendants.
    fn rename_row(&mut self, album_type: AlbumType, id: AlbumId, title: &str) -> Result<()>;

    /// Move an album under a new parent. `path` is the new container path.
    fn reparent_row(
        &mut self,
        album_type: AlbumType,
        id: AlbumId,
        parent_id: AlbumId,
        path: Option<&str>,
    ) -> Result<()>;

    fn set_icon_row(&mut self, album_type: AlbumType, id: AlbumId, icon: Option<&AlbumIcon>) -> Result<()>;
}

/// Shared stores let callers keep inspecting a store the manager writes to.
impl<S: AlbumStore> AlbumStore for Rc<RefCell<S>> {
    fn list_album_rows(&self, album_type: AlbumType) -> Result<Vec<AlbumRow>> {
        self.borrow().list_album_rows(album_type)
    }

    fn create_row(&mut self, row: &AlbumRow) -> Result<()> {
        self.borrow_mut().create_row(row)
    }

    fn delete_rows(&mut self, album_type: AlbumType, ids: &[AlbumId]) -> Result<()> {
        self.borrow_mut().delete_rows(album_type, ids)
    }

    fn rename_row(&mut self, album_type: AlbumType, id: AlbumId, title: &str) -> Result<()> {
        self.borrow_mut().rename_row(album_type, id, title)
    }

    fn reparent_row(
        &mut self,
        album_type: AlbumType,
        id: AlbumId,
        parent_id: AlbumId,
        path: Option<&str>,
    ) -> Result<()> {
        self.borrow_mut().reparent_row(album_type, id, parent_id, path)
    }

    fn set_icon_row(&mut self, album_type: AlbumType, id: AlbumId, icon: Option<&AlbumIcon>) -> Result<()> {
        self.borrow_mut().set_icon_row(album_type, id, icon)
    }
}

/// Supplies the number of items directly inside an album.
pub trait CountProvider {
    /// `None` when the count is not known (yet).
    fn count_for_album(&self, album: &Album) -> Option<i64>;
}

impl<F> CountProvider for F
where
    F: Fn(&Album) -> Option<i64>,
{
    fn count_for_album(&self, album: &Album) -> Option<i64> {
        self(album)
    }
}
