//! Sibling ordering for album views.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use crate::album::{Album, AlbumHandle, AlbumKind, AlbumManager};

/// Sort key for container albums. Other album types sort by title (tags,
/// searches) or by date (date albums).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumSortOrder {
    /// By folder name.
    #[default]
    Folder,
    /// By collection, then folder name.
    Category,
    /// By creation date, undated albums last.
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringComparison {
    /// Digit runs compare by value: `img2` < `img10`.
    #[default]
    Natural,
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSettings {
    pub albums: AlbumSortOrder,
    pub comparison: StringComparison,
    pub case_sensitive: bool,
}

/// Compare strings treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let l = take_digits(&mut left);
                let r = take_digits(&mut right);
                let ord = compare_digit_runs(&l, &r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                left.next();
                right.next();
                let ord = fold_case(x, case_sensitive).cmp(&fold_case(y, case_sensitive));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        // "01" after "1"
        .then_with(|| a.len().cmp(&b.len()))
}

fn fold_case(c: char, case_sensitive: bool) -> char {
    if case_sensitive {
        c
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

/// Total order on strings. Ties left by case folding fall back to a literal
/// comparison so sorting is deterministic.
pub fn compare_strings(a: &str, b: &str, settings: &SortSettings) -> Ordering {
    let ord = match settings.comparison {
        StringComparison::Natural => natural_cmp(a, b, settings.case_sensitive),
        StringComparison::Literal if settings.case_sensitive => a.cmp(b),
        StringComparison::Literal => a.to_lowercase().cmp(&b.to_lowercase()),
    };
    ord.then_with(|| a.cmp(b))
}

/// Sibling order. The trash album always sorts last.
pub fn compare_albums(a: &Album, b: &Album, settings: &SortSettings) -> Ordering {
    let by_title = || compare_strings(a.title(), b.title(), settings);

    a.is_trash()
        .cmp(&b.is_trash())
        .then_with(|| match (a.kind(), b.kind()) {
            (AlbumKind::Container(x), AlbumKind::Container(y)) => match settings.albums {
                AlbumSortOrder::Folder => by_title(),
                AlbumSortOrder::Category => {
                    compare_strings(&x.collection, &y.collection, settings).then_with(by_title)
                }
                AlbumSortOrder::Date => (x.created.is_none(), x.created)
                    .cmp(&(y.created.is_none(), y.created))
                    .then_with(by_title),
            },
            (AlbumKind::Date(x), AlbumKind::Date(y)) => x.date.cmp(&y.date).then_with(by_title),
            _ => by_title(),
        })
}

/// Children of `parent`, sorted.
pub fn sort_children(manager: &AlbumManager, parent: AlbumHandle, settings: &SortSettings) -> Vec<AlbumHandle> {
    let mut children: Vec<&Album> = manager
        .children(parent)
        .filter_map(|h| manager.get(h))
        .collect();
    children.sort_by(|a, b| compare_albums(a, b, settings));
    children.iter().map(|a| a.handle()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::album::{AlbumType, ContainerInfo, DateRange, NewAlbum};
    use chrono::NaiveDate;

    fn sorted(items: &[&str], settings: &SortSettings) -> Vec<String> {
        let mut items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        items.sort_by(|a, b| compare_strings(a, b, settings));
        items
    }

    #[test]
    fn test_natural_order() {
        let settings = SortSettings::default();
        assert_eq!(
            sorted(&["img10", "img2", "IMG1", "img02"], &settings),
            vec!["IMG1", "img2", "img02", "img10"]
        );
        assert_eq!(natural_cmp("a", "a1", false), Ordering::Less);
        assert_eq!(natural_cmp("Beach", "beach", false), Ordering::Equal);
        assert_eq!(natural_cmp("Beach", "beach", true), Ordering::Less);
    }

    #[test]
    fn test_literal_order() {
        let settings = SortSettings {
            comparison: StringComparison::Literal,
            ..Default::default()
        };
        assert_eq!(sorted(&["img2", "img10"], &settings), vec!["img10", "img2"]);

        let strict = SortSettings {
            case_sensitive: true,
            ..settings
        };
        assert_eq!(sorted(&["b", "B", "a"], &strict), vec!["B", "a", "b"]);
    }

    fn container(info: ContainerInfo) -> AlbumKind {
        AlbumKind::Container(info)
    }

    #[test]
    fn test_trash_sorts_last_for_every_order() {
        let mut manager = AlbumManager::in_memory();
        let root = manager.create_root(AlbumType::Container);
        let trash = manager
            .insert(
                root,
                NewAlbum::new(
                    1,
                    "000 Trash",
                    container(ContainerInfo {
                        trash: true,
                        ..Default::default()
                    }),
                ),
            )
            .unwrap();
        manager.create_container(root, "Zoo").unwrap();
        manager.create_container(root, "Beach").unwrap();

        for albums in [AlbumSortOrder::Folder, AlbumSortOrder::Category, AlbumSortOrder::Date] {
            let settings = SortSettings {
                albums,
                ..Default::default()
            };
            let order = sort_children(&manager, root, &settings);
            assert_eq!(order.last(), Some(&trash));
        }
    }

    #[test]
    fn test_category_and_date_orders() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d);
        let mut manager = AlbumManager::in_memory();
        let root = manager.create_root(AlbumType::Container);
        let mut add = |id, title: &str, collection: &str, created| {
            manager
                .insert(
                    root,
                    NewAlbum::new(
                        id,
                        title,
                        container(ContainerInfo {
                            collection: collection.to_string(),
                            created,
                            ..Default::default()
                        }),
                    ),
                )
                .unwrap()
        };
        let a = add(1, "A", "Work", day(3));
        let b = add(2, "B", "Family", None);
        let c = add(3, "C", "Family", day(1));

        let by_category = SortSettings {
            albums: AlbumSortOrder::Category,
            ..Default::default()
        };
        assert_eq!(sort_children(&manager, root, &by_category), vec![b, c, a]);

        let by_date = SortSettings {
            albums: AlbumSortOrder::Date,
            ..Default::default()
        };
        assert_eq!(sort_children(&manager, root, &by_date), vec![c, a, b]);
    }

    #[test]
    fn test_date_albums_sort_by_date() {
        let mut manager = AlbumManager::in_memory();
        let root = manager.create_root(AlbumType::Date);
        let ymd = |y| NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
        let later = manager
            .insert(root, NewAlbum::new(1, "2024", AlbumKind::date(ymd(2024), DateRange::Year)))
            .unwrap();
        let earlier = manager
            .insert(root, NewAlbum::new(2, "2023", AlbumKind::date(ymd(2023), DateRange::Year)))
            .unwrap();

        assert_eq!(
            sort_children(&manager, root, &SortSettings::default()),
            vec![earlier, later]
        );
    }
}
