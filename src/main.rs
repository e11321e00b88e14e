use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use albumtree::album::{Album, AlbumHandle, AlbumManager, AlbumType};
use albumtree::config::Config;
use albumtree::filter::sort::{sort_children, SortSettings};
use albumtree::filter::{AlbumFilterModel, FilterBehavior, MatchResult, SearchTextSettings};
use albumtree::logging;
use albumtree::model::CountingAlbumModel;
use albumtree::store::MemoryStore;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    library: Option<PathBuf>,
    filter: Option<String>,
    simple: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("albumtree {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--simple" => parsed.simple = true,
            flag @ ("--config" | "-c" | "--library" | "-l" | "--filter" | "-f") => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: {} requires an argument", flag);
                    std::process::exit(1);
                };
                match flag {
                    "--config" | "-c" => parsed.config = Some(PathBuf::from(value)),
                    "--library" | "-l" => parsed.library = Some(PathBuf::from(value)),
                    _ => parsed.filter = Some(value.clone()),
                }
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"albumtree - inspect the album trees of a photo library

USAGE:
    albumtree [OPTIONS]

OPTIONS:
    --config, -c PATH    Path to config file
    --library, -l FILE   JSON library snapshot (overrides `library` in the config)
    --filter, -f TEXT    Show only albums matching TEXT, with their match class
    --simple             Do not keep albums below a match visible
    --version, -V        Show version
    --help, -h           Show this help message

ENVIRONMENT:
    ALBUMTREE_CONFIG     Path to config file (overrides default location)
    ALBUMTREE_LOG        Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/albumtree/config.toml"#
    );
}

struct Printer<'a> {
    manager: &'a AlbumManager,
    counts: CountingAlbumModel,
    filter: Option<AlbumFilterModel>,
    sort: SortSettings,
}

impl Printer<'_> {
    fn print(&mut self, handle: AlbumHandle, depth: usize) {
        let result = match self.filter.as_mut() {
            Some(filter) => Some(filter.match_result(self.manager, handle)),
            None => None,
        };
        if result == Some(MatchResult::NoMatch) {
            return;
        }

        let text = self
            .counts
            .display_text(self.manager, handle)
            .unwrap_or_default();
        match result {
            Some(result) => println!("{}{}  [{:?}]", "  ".repeat(depth), text, result),
            None => println!("{}{}", "  ".repeat(depth), text),
        }

        for child in sort_children(self.manager, handle, &self.sort) {
            self.print(child, depth + 1);
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let Some(library) = args.library.clone().or_else(|| config.library.clone()) else {
        bail!("No library snapshot given; use --library or set `library` in the config");
    };
    let store = MemoryStore::load_json(&library)?;
    let item_counts = store.item_counts().clone();

    let mut manager = AlbumManager::new(store);
    for album_type in AlbumType::ALL {
        manager.create_root(album_type);
        manager
            .load(album_type)
            .with_context(|| format!("Failed to load {} albums", album_type.display_name()))?;
    }

    let behavior = if args.simple {
        FilterBehavior::Simple
    } else {
        config.filter.behavior
    };

    for album_type in AlbumType::ALL {
        let Some(root) = manager.root(album_type) else {
            continue;
        };

        let mut counts = CountingAlbumModel::new(root);
        counts.set_show_count(&manager, config.model.show_count);
        let provided = item_counts.clone();
        counts.set_count_provider(move |album: &Album| {
            provided.get(&(album.album_type(), album.id())).copied()
        });

        let filter = args.filter.as_ref().map(|text| {
            let mut filter = AlbumFilterModel::new(root, behavior);
            filter.set_search_text(
                SearchTextSettings::new(text.as_str()).with_case_sensitive(config.filter.case_sensitive),
            );
            filter
        });

        let mut printer = Printer {
            manager: &manager,
            counts,
            filter,
            sort: config.sort.settings(),
        };
        printer.print(root, 0);
    }

    Ok(())
}
