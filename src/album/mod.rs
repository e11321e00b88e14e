//! Album entities for the four album hierarchies.
//!
//! Albums live in an arena owned by [`AlbumManager`]. Everything outside the
//! manager refers to them through [`AlbumHandle`]s, which go stale (look-ups
//! return `None`) once the album is removed.

pub mod arena;
pub mod manager;
pub mod side_table;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use arena::AlbumArena;
pub use manager::{AlbumEvent, AlbumManager, NewAlbum};
pub use side_table::SideTable;

use arena::Links;

/// Numeric album id, unique within its [`AlbumType`]. Roots use id 0.
pub type AlbumId = u32;

/// Id space reserved for every album type inside the global id range.
pub const ID_SPACE_PER_TYPE: u32 = 1 << 28;

/// The four album hierarchies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    /// Physical albums (folders inside a collection).
    Container,
    Tag,
    Date,
    Search,
}

impl AlbumType {
    pub const ALL: [AlbumType; 4] = [
        AlbumType::Container,
        AlbumType::Tag,
        AlbumType::Date,
        AlbumType::Search,
    ];

    /// Position of the type in the global id layout.
    pub fn index(self) -> usize {
        match self {
            AlbumType::Container => 0,
            AlbumType::Tag => 1,
            AlbumType::Date => 2,
            AlbumType::Search => 3,
        }
    }

    /// Title given to the root album of this type.
    pub fn root_title(self) -> &'static str {
        match self {
            AlbumType::Container => "Albums",
            AlbumType::Tag => "Tags",
            AlbumType::Date => "Dates",
            AlbumType::Search => "Searches",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AlbumType::Container => "album",
            AlbumType::Tag => "tag",
            AlbumType::Date => "date album",
            AlbumType::Search => "search",
        }
    }
}

/// Id unique across all album types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u64);

impl GlobalId {
    pub fn new(album_type: AlbumType, id: AlbumId) -> Self {
        GlobalId(album_type.index() as u64 * ID_SPACE_PER_TYPE as u64 + id as u64)
    }

    pub fn album_type(self) -> Option<AlbumType> {
        AlbumType::ALL
            .get((self.0 / ID_SPACE_PER_TYPE as u64) as usize)
            .copied()
    }

    pub fn id(self) -> AlbumId {
        (self.0 % ID_SPACE_PER_TYPE as u64) as AlbumId
    }
}

/// Stable reference to an album in the arena.
///
/// Slots are reused after removal, but with a new generation, so a handle to
/// a removed album never aliases a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Album or tag icon: either an image from the library or a named theme icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumIcon {
    Image(i64),
    Named(String),
}

/// Granularity of a date album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    #[default]
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Normal,
    Advanced,
    Keyword,
    Timeline,
    /// Fuzzy similarity search on image fingerprints.
    Haar,
    Map,
    Duplicates,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainerInfo {
    /// Path relative to the collection root, always starting with `/`.
    /// Derived from the titles of the album and its ancestors.
    pub path: String,
    /// Collection label (category) used when sorting by category.
    pub collection: String,
    pub caption: Option<String>,
    pub created: Option<NaiveDate>,
    pub icon: Option<AlbumIcon>,
    /// The pseudo-album holding removed items.
    pub trash: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagInfo {
    /// Id of the parent tag, 0 for top-level tags. Kept in sync with the tree.
    pub parent_tag_id: AlbumId,
    pub icon: Option<AlbumIcon>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DateInfo {
    pub date: NaiveDate,
    pub range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchInfo {
    pub query: String,
    pub kind: SearchKind,
    /// Unsaved live-preview search; never written to the store.
    pub temporary: bool,
}

/// Variant payload of an album. The variant decides the album's type.
#[derive(Debug, Clone, PartialEq)]
pub enum AlbumKind {
    Container(ContainerInfo),
    Tag(TagInfo),
    Date(DateInfo),
    Search(SearchInfo),
}

impl AlbumKind {
    pub fn album_type(&self) -> AlbumType {
        match self {
            AlbumKind::Container(_) => AlbumType::Container,
            AlbumKind::Tag(_) => AlbumType::Tag,
            AlbumKind::Date(_) => AlbumType::Date,
            AlbumKind::Search(_) => AlbumType::Search,
        }
    }

    /// Payload used for the root album of a type.
    pub fn root(album_type: AlbumType) -> Self {
        match album_type {
            AlbumType::Container => AlbumKind::Container(ContainerInfo {
                path: "/".to_string(),
                ..Default::default()
            }),
            AlbumType::Tag => AlbumKind::Tag(TagInfo::default()),
            AlbumType::Date => AlbumKind::Date(DateInfo {
                range: DateRange::Year,
                ..Default::default()
            }),
            AlbumType::Search => AlbumKind::Search(SearchInfo::default()),
        }
    }

    pub fn container() -> Self {
        AlbumKind::Container(ContainerInfo::default())
    }

    pub fn tag() -> Self {
        AlbumKind::Tag(TagInfo::default())
    }

    pub fn date(date: NaiveDate, range: DateRange) -> Self {
        AlbumKind::Date(DateInfo { date, range })
    }

    pub fn search(query: impl Into<String>, kind: SearchKind) -> Self {
        AlbumKind::Search(SearchInfo {
            query: query.into(),
            kind,
            temporary: false,
        })
    }

    pub fn icon(&self) -> Option<&AlbumIcon> {
        match self {
            AlbumKind::Container(info) => info.icon.as_ref(),
            AlbumKind::Tag(info) => info.icon.as_ref(),
            AlbumKind::Date(_) | AlbumKind::Search(_) => None,
        }
    }
}

/// A node in one of the album trees.
#[derive(Debug, Clone)]
pub struct Album {
    pub(crate) handle: AlbumHandle,
    pub(crate) id: AlbumId,
    pub(crate) title: String,
    pub(crate) is_root: bool,
    pub(crate) kind: AlbumKind,
    pub(crate) links: Links,
}

impl Album {
    pub fn handle(&self) -> AlbumHandle {
        self.handle
    }

    pub fn album_type(&self) -> AlbumType {
        self.kind.album_type()
    }

    pub fn id(&self) -> AlbumId {
        self.id
    }

    pub fn global_id(&self) -> GlobalId {
        GlobalId::new(self.album_type(), self.id)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn kind(&self) -> &AlbumKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<AlbumHandle> {
        self.links.parent
    }

    pub fn first_child(&self) -> Option<AlbumHandle> {
        self.links.first_child
    }

    pub fn last_child(&self) -> Option<AlbumHandle> {
        self.links.last_child
    }

    pub fn next(&self) -> Option<AlbumHandle> {
        self.links.next
    }

    pub fn prev(&self) -> Option<AlbumHandle> {
        self.links.prev
    }

    pub fn has_children(&self) -> bool {
        self.links.first_child.is_some()
    }

    pub fn icon(&self) -> Option<&AlbumIcon> {
        self.kind.icon()
    }

    pub fn is_trash(&self) -> bool {
        matches!(&self.kind, AlbumKind::Container(info) if info.trash)
    }

    pub fn as_container(&self) -> Option<&ContainerInfo> {
        match &self.kind {
            AlbumKind::Container(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&TagInfo> {
        match &self.kind {
            AlbumKind::Tag(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateInfo> {
        match &self.kind {
            AlbumKind::Date(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_search(&self) -> Option<&SearchInfo> {
        match &self.kind {
            AlbumKind::Search(info) => Some(info),
            _ => None,
        }
    }

    /// Path of a container album, e.g. `/2024/Holidays`.
    pub fn path(&self) -> Option<&str> {
        self.as_container().map(|info| info.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_id_layout() {
        let tag = GlobalId::new(AlbumType::Tag, 42);
        assert_eq!(tag.album_type(), Some(AlbumType::Tag));
        assert_eq!(tag.id(), 42);

        // The largest container id still sorts below the first tag id.
        let last_container = GlobalId::new(AlbumType::Container, ID_SPACE_PER_TYPE - 1);
        let first_tag = GlobalId::new(AlbumType::Tag, 0);
        assert!(last_container < first_tag);
    }

    #[test]
    fn test_global_ids_differ_across_types() {
        let ids: Vec<GlobalId> = AlbumType::ALL
            .iter()
            .map(|t| GlobalId::new(*t, 7))
            .collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_kind_decides_type() {
        assert_eq!(AlbumKind::tag().album_type(), AlbumType::Tag);
        assert_eq!(
            AlbumKind::search("beach", SearchKind::Keyword).album_type(),
            AlbumType::Search
        );
        assert_eq!(AlbumKind::root(AlbumType::Date).album_type(), AlbumType::Date);
    }
}
