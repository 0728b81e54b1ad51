use std::path::{Path, PathBuf};

use clap::{App, Arg, ArgMatches};
use rootcause::prelude::*;
use rootcause::{Report, report};
use tracing::{Level, info, warn};

use wows_minimap_video::assets::AssetStore;
use wows_minimap_video::catalog::StaticShipCatalog;
use wows_minimap_video::config::RendererConfig;
use wows_minimap_video::pipeline::render_replay;
use wows_minimap_video::video::DumpMode;

/// Catalog file looked up in the asset directory.
const CATALOG_FILE: &str = "ships.json";

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, Report> {
    matches
        .value_of(name)
        .ok_or_else(|| report!("missing required argument {}", name))
}

fn load_catalog(assets_dir: &Path) -> Result<StaticShipCatalog, Report> {
    let path = assets_dir.join(CATALOG_FILE);
    if !path.exists() {
        warn!(
            "No {} in {}, ships will be drawn without class icons or names",
            CATALOG_FILE,
            assets_dir.display()
        );
        return Ok(StaticShipCatalog::new());
    }
    let catalog = StaticShipCatalog::from_file(&path).context("Failed to load ship catalog")?;
    info!("Loaded {} ships from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn main() -> Result<(), Report> {
    let matches = App::new("Minimap Renderer")
        .about("Generates a minimap timelapse video from a WoWS replay")
        .arg(
            Arg::with_name("ASSETS")
                .help("Directory holding map, ship icon and font assets")
                .short("a")
                .long("assets")
                .takes_value(true)
                .required_unless("GENERATE_CONFIG"),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Output MP4 file path")
                .short("o")
                .long("output")
                .takes_value(true)
                .required_unless("GENERATE_CONFIG"),
        )
        .arg(
            Arg::with_name("CONFIG")
                .help("TOML config file")
                .short("c")
                .long("config")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("GENERATE_CONFIG")
                .help("Print a commented default config and exit")
                .long("generate-config"),
        )
        .arg(
            Arg::with_name("DUMP_FRAME")
                .help("Dump a single frame as PNG instead of rendering video (specify frame number or 'mid' for midpoint)")
                .long("dump-frame")
                .takes_value(true),
        )
        .arg(Arg::with_name("NO_SHIP_NAMES").long("no-ship-names").help("Hide ship names"))
        .arg(
            Arg::with_name("NO_CAPTURE_POINTS")
                .long("no-capture-points")
                .help("Hide capture points"),
        )
        .arg(Arg::with_name("NO_DEAD_SHIPS").long("no-dead-ships").help("Hide sunk ships"))
        .arg(
            Arg::with_name("NO_HIDDEN_SHIPS")
                .long("no-hidden-ships")
                .help("Hide ships that are out of sight"),
        )
        .arg(Arg::with_name("NO_GRID").long("no-grid").help("Hide the map grid"))
        .arg(
            Arg::with_name("VERBOSE")
                .help("Enable debug logging")
                .short("v")
                .long("verbose"),
        )
        .arg(
            Arg::with_name("REPLAY")
                .help("The replay file to process")
                .required_unless("GENERATE_CONFIG")
                .index(1),
        )
        .get_matches();

    if matches.is_present("GENERATE_CONFIG") {
        print!("{}", RendererConfig::generate_default_toml());
        return Ok(());
    }

    let level = if matches.is_present("VERBOSE") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let assets_dir = PathBuf::from(required(&matches, "ASSETS")?);
    let output = PathBuf::from(required(&matches, "OUTPUT")?);
    let replay_path = PathBuf::from(required(&matches, "REPLAY")?);

    let dump_mode = match matches.value_of("DUMP_FRAME") {
        Some("mid") => Some(DumpMode::Midpoint),
        Some(n) => Some(DumpMode::Frame(
            n.parse::<usize>().context("Invalid --dump-frame value")?,
        )),
        None => None,
    };

    let mut config = match matches.value_of("CONFIG") {
        Some(path) => RendererConfig::load(Path::new(path))?,
        None => RendererConfig::default(),
    };
    config.apply_cli_overrides(&matches);

    let catalog = load_catalog(&assets_dir)?;
    let assets = AssetStore::new(&assets_dir);

    info!("Parsing replay {}", replay_path.display());
    let replay = std::fs::read(&replay_path).context("Failed to read replay file")?;

    let written = render_replay(&replay, &assets, &catalog, &config, &output, dump_mode)
        .context("Failed to render replay")?;

    info!("Done! Wrote {}", written.display());
    Ok(())
}
