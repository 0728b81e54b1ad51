use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use image::{RgbImage, RgbaImage};
use tracing::{debug, info, warn};
use wows_replay_core::strum::IntoEnumIterator;
use wows_replay_core::types::Species;

use crate::MINIMAP_SIZE;
use crate::error::RenderError;
use crate::map_data::MapGeometry;

/// Icon size in pixels for rasterized ship icons.
pub const ICON_SIZE: u32 = 24;

pub const DEFAULT_FONT_FILE: &str = "fonts/Warhelios_Bold.ttf";

/// Pre-rasterized ship icons keyed by `"{Species}{variant}"`, e.g.
/// `"Destroyer"`, `"Destroyer_dead"`, `"Destroyer_invisible"`, `"Destroyer_self"`.
pub type ShipIcons = HashMap<String, RgbaImage>;

/// Icon variants per species: (file suffix, key suffix)
const ICON_VARIANTS: &[(&str, &str)] = &[
    ("", ""),
    ("_dead", "_dead"),
    ("_invisible", "_invisible"),
    ("_self", "_self"),
];

/// Everything needed to draw one map.
#[derive(Debug, Clone)]
pub struct MapAssets {
    pub geometry: MapGeometry,
    /// Water and land composited, resized to `MINIMAP_SIZE` square.
    pub image: RgbImage,
}

/// Read-only view of an asset directory laid out as:
///
/// ```text
/// spaces/<map>/minimap_water.png
/// spaces/<map>/minimap.png
/// spaces/<map>/space.settings
/// ship_icons/minimap_<species>[_dead|_invisible|_self].{svg,png}
/// fonts/<font>.ttf
/// ```
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    font_file: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            font_file: PathBuf::from(DEFAULT_FONT_FILE),
        }
    }

    /// Font path relative to the asset root.
    pub fn with_font_file(mut self, font_file: impl Into<PathBuf>) -> Self {
        self.font_file = font_file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_dir(&self, map_name: &str) -> PathBuf {
        // map_name from meta is e.g. "spaces/28_naval_mission"
        let bare_name = map_name.strip_prefix("spaces/").unwrap_or(map_name);
        self.root.join("spaces").join(bare_name)
    }

    pub fn load_map(&self, map_name: &str) -> Result<MapAssets, RenderError> {
        let dir = self.map_dir(map_name);
        let geometry = self.load_geometry(&dir)?;
        let image = load_map_image(&dir)?;
        Ok(MapAssets { geometry, image })
    }

    fn load_geometry(&self, dir: &Path) -> Result<MapGeometry, RenderError> {
        let path = dir.join("space.settings");
        let content =
            std::fs::read(&path).map_err(|e| RenderError::missing(&path, e.to_string()))?;
        let content = String::from_utf8_lossy(&content);
        let geometry = MapGeometry::from_space_settings(&content)
            .ok_or_else(|| RenderError::missing(&path, "no usable bounds in space.settings"))?;
        info!(
            "Map bounds ({},{})..({},{}), chunk_size={}, world size {}x{}",
            geometry.min_x,
            geometry.min_y,
            geometry.max_x,
            geometry.max_y,
            geometry.chunk_size,
            geometry.world_width(),
            geometry.world_height()
        );
        Ok(geometry)
    }

    /// Load and rasterize ship icons. At least one species must have its
    /// base icon; species without one are drawn as plain circles.
    pub fn load_ship_icons(&self) -> Result<ShipIcons, RenderError> {
        let dir = self.root.join("ship_icons");
        let mut icons = HashMap::new();
        for species in Species::iter() {
            let lower = species.name().to_ascii_lowercase();
            for &(file_suffix, key_suffix) in ICON_VARIANTS {
                let stem = format!("minimap_{lower}{file_suffix}");
                match load_icon(&dir, &stem) {
                    Some(icon) => {
                        icons.insert(format!("{}{}", species.name(), key_suffix), icon);
                    }
                    None if file_suffix.is_empty() => {
                        warn!("No minimap icon for {}, using fallback circles", species.name());
                    }
                    None => debug!("No {stem} icon, falling back to the base icon"),
                }
            }
        }

        if !Species::iter().any(|s| icons.contains_key(s.name())) {
            return Err(RenderError::missing(dir, "no ship class icons found"));
        }
        info!("Loaded {} ship icon variants", icons.len());
        Ok(icons)
    }

    pub fn load_font(&self) -> Result<FontArc, RenderError> {
        let path = self.root.join(&self.font_file);
        let data = std::fs::read(&path).map_err(|e| RenderError::missing(&path, e.to_string()))?;
        FontArc::try_from_vec(data).map_err(|e| RenderError::missing(&path, e.to_string()))
    }
}

fn load_image(path: &Path) -> Option<image::DynamicImage> {
    let buf = std::fs::read(path).ok()?;
    match image::load_from_memory(&buf) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Could not decode {}: {e}", path.display());
            None
        }
    }
}

/// Composite the land layer over the water layer and scale to the minimap size.
fn load_map_image(dir: &Path) -> Result<RgbImage, RenderError> {
    let water = load_image(&dir.join("minimap_water.png"));
    let land = load_image(&dir.join("minimap.png"));

    let result = match (water, land) {
        (Some(water_img), Some(land_img)) => {
            let mut base = water_img.to_rgba8();
            let mut overlay = land_img.to_rgba8();
            if overlay.dimensions() != base.dimensions() {
                overlay = image::imageops::resize(
                    &overlay,
                    base.width(),
                    base.height(),
                    image::imageops::FilterType::Lanczos3,
                );
            }
            image::imageops::overlay(&mut base, &overlay, 0, 0);
            debug!(
                "Loaded map image: {}x{} (water + land composited)",
                base.width(),
                base.height()
            );
            image::DynamicImage::ImageRgba8(base).to_rgb8()
        }
        (Some(water_img), None) => {
            debug!("Loaded map image: water only");
            water_img.to_rgb8()
        }
        (None, Some(land_img)) => {
            debug!("Loaded map image: land only (no water background)");
            land_img.to_rgb8()
        }
        (None, None) => {
            return Err(RenderError::missing(
                dir.join("minimap_water.png"),
                "neither minimap_water.png nor minimap.png could be loaded",
            ));
        }
    };

    if result.width() != MINIMAP_SIZE || result.height() != MINIMAP_SIZE {
        return Ok(image::imageops::resize(
            &result,
            MINIMAP_SIZE,
            MINIMAP_SIZE,
            image::imageops::FilterType::Lanczos3,
        ));
    }
    Ok(result)
}

/// Loads `<stem>.svg`, falling back to `<stem>.png`.
fn load_icon(dir: &Path, stem: &str) -> Option<RgbaImage> {
    let svg = dir.join(format!("{stem}.svg"));
    if let Ok(buf) = std::fs::read(&svg) {
        if let Some(img) = rasterize_svg(&buf, ICON_SIZE) {
            return Some(img);
        }
        warn!("Could not rasterize {}", svg.display());
    }

    let img = load_image(&dir.join(format!("{stem}.png")))?;
    Some(image::imageops::resize(
        &img.to_rgba8(),
        ICON_SIZE,
        ICON_SIZE,
        image::imageops::FilterType::Lanczos3,
    ))
}

/// Rasterize an SVG byte buffer to an RGBA image at the given size.
pub fn rasterize_svg(svg_data: &[u8], size: u32) -> Option<RgbaImage> {
    let opt = resvg::usvg::Options::default();
    let tree = resvg::usvg::Tree::from_data(svg_data, &opt).ok()?;

    let tree_size = tree.size();
    let sx = size as f32 / tree_size.width();
    let sy = size as f32 / tree_size.height();
    let scale = sx.min(sy);

    let mut pixmap = tiny_skia::Pixmap::new(size, size)?;

    // Center the icon in the output
    let offset_x = (size as f32 - tree_size.width() * scale) / 2.0;
    let offset_y = (size as f32 - tree_size.height() * scale) / 2.0;
    let transform =
        tiny_skia::Transform::from_scale(scale, scale).post_translate(offset_x, offset_y);

    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let data = pixmap.data().to_vec();
    RgbaImage::from_raw(size, size, data)
}
