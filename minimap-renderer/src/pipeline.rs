use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::FontArc;
use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, info};
use wows_replay_core::DecodedBattle;
use wows_replay_core::analyzer::battle_controller::Snapshot;

use crate::assets::{AssetStore, MapAssets, ShipIcons};
use crate::catalog::ShipCatalog;
use crate::config::RendererConfig;
use crate::draw_command::RenderTarget;
use crate::drawing::ImageTarget;
use crate::error::RenderError;
use crate::renderer::MinimapRenderer;
use crate::video::{DumpMode, VideoEncoder};

/// Per-map assets every frame is drawn from. Loaded once, shared read-only
/// by all compositing workers.
#[derive(Clone)]
pub struct FrameResources {
    pub map: MapAssets,
    pub ship_icons: Arc<ShipIcons>,
    pub font: Option<FontArc>,
}

impl FrameResources {
    /// Load the map, ship icons and font. Fails before any frame is drawn
    /// if one of them is unavailable.
    pub fn load(assets: &AssetStore, map_name: &str) -> Result<Self, RenderError> {
        let map = assets.load_map(map_name)?;
        let ship_icons = assets.load_ship_icons()?;
        let font = assets.load_font()?;
        Ok(Self {
            map,
            ship_icons: Arc::new(ship_icons),
            font: Some(font),
        })
    }
}

/// Decode `replay` and render it to `output`.
///
/// Returns the written path: the MP4 itself, or the PNG when `dump_mode` is set.
pub fn render_replay(
    replay: &[u8],
    assets: &AssetStore,
    catalog: &dyn ShipCatalog,
    config: &RendererConfig,
    output: &Path,
    dump_mode: Option<DumpMode>,
) -> Result<PathBuf, RenderError> {
    let battle = wows_replay_core::decode_battle(replay, config.sample_interval_seconds)?;
    info!(
        "Decoded {} on {} into {} snapshots",
        battle.packet_stats.total,
        battle.map_name,
        battle.snapshots.len()
    );

    let assets = assets.clone().with_font_file(&config.font_file);
    let resources = FrameResources::load(&assets, &battle.map_name)?;
    render_battle(&battle, &resources, catalog, config, output, dump_mode)
}

/// Composite every snapshot of an already decoded battle and encode the frames.
pub fn render_battle(
    battle: &DecodedBattle,
    resources: &FrameResources,
    catalog: &dyn ShipCatalog,
    config: &RendererConfig,
    output: &Path,
    dump_mode: Option<DumpMode>,
) -> Result<PathBuf, RenderError> {
    let renderer = MinimapRenderer::new(
        resources.map.geometry,
        catalog,
        battle.owner_team_id,
        config.render_options(),
    );
    let template = ImageTarget::new(
        &resources.map.image,
        Arc::clone(&resources.ship_icons),
        resources.font.clone(),
        config.show_grid,
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build()
        .map_err(|e| RenderError::WorkerPool(e.to_string()))?;
    info!(
        "Compositing {} frames on {} threads",
        battle.snapshots.len(),
        pool.current_num_threads()
    );

    let mut encoder = VideoEncoder::new(
        output,
        config.fps,
        config.bitrate_bps,
        battle.snapshots.len(),
        dump_mode,
    );

    let batch_size = config.frame_batch.max(1);
    for (batch_idx, batch) in battle.snapshots.chunks(batch_size).enumerate() {
        let frames: Vec<RgbImage> = pool.install(|| {
            batch
                .par_iter()
                .map(|snapshot| composite(&renderer, template.clone(), snapshot))
                .collect()
        });

        let first = batch_idx * batch_size;
        debug!("Encoding frames {}..{}", first, first + frames.len());
        for (offset, frame) in frames.iter().enumerate() {
            encoder.push_frame(first + offset, frame)?;
        }
    }

    Ok(encoder.finish()?)
}

fn composite(renderer: &MinimapRenderer<'_>, mut target: ImageTarget, snapshot: &Snapshot) -> RgbImage {
    target.begin_frame();
    for cmd in renderer.draw_frame(snapshot) {
        target.draw(&cmd);
    }
    target.end_frame();
    target.take_frame()
}
