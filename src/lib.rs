//! Album hierarchies for a photo library: the four album trees, per-view
//! check and count models, query filtering and navigation history.
//!
//! Everything runs on the caller's thread. [`AlbumManager`] owns the trees;
//! models, filters and the history hold [`AlbumHandle`]s and are kept in
//! step by feeding them the manager's [`AlbumEvent`]s.

pub mod album;
pub mod config;
pub mod error;
pub mod filter;
pub mod history;
pub mod logging;
pub mod model;
pub mod signal;
pub mod store;

pub use album::{
    Album, AlbumEvent, AlbumHandle, AlbumIcon, AlbumId, AlbumKind, AlbumManager, AlbumType,
    GlobalId, NewAlbum, SideTable,
};
pub use error::{AlbumError, Result};
pub use filter::{AlbumFilterModel, FilterBehavior, MatchResult, SearchTextSettings};
pub use history::{AlbumHistory, HistoryEntry, HistoryEvent, ViewContext};
pub use model::{CheckState, CheckableAlbumModel, CountingAlbumModel, ModelEvent};
pub use store::{AlbumRow, AlbumStore, CountProvider, MemoryStore};
