//! Per-view models layered over one album tree.
//!
//! A model never stores anything inside the shared albums: counts and check
//! marks live in side tables keyed by handle, so the same tree can back any
//! number of independent models.

pub mod checkable;
pub mod counting;

use serde::{Deserialize, Serialize};

use crate::album::AlbumHandle;

pub use checkable::CheckableAlbumModel;
pub use counting::CountingAlbumModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckState {
    #[default]
    Unchecked,
    Checked,
    PartiallyChecked,
}

/// How the third check state is presented.
///
/// Both modes share the same propagation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TristateMode {
    /// Generic partial-check mark.
    #[default]
    Partial,
    /// Tag filters: checked means "include", the third state means "exclude".
    AddExclude,
}

/// Glyph a view draws next to an album.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDecoration {
    None,
    Partial,
    Add,
    Exclude,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    CheckStateChanged { album: AlbumHandle, state: CheckState },
    /// Count or display text of an album changed.
    DataChanged(AlbumHandle),
}
