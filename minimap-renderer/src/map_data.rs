pub use wows_replay_core::types::{GameClock, WorldPos};

/// Map bounds in chunks, as stored in a map's `space.settings`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapGeometry {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub chunk_size: f64,
}

/// Pixel position on the minimap image.
/// (0,0) is top-left, positive X = right, positive Y = down.
/// Does NOT include HUD offset; that's applied at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimapPos {
    pub x: i32,
    pub y: i32,
}

impl MapGeometry {
    /// Playable width in world units. Every map carries a two-chunk
    /// unrendered border on each side, hence the 4 chunks trimmed.
    pub fn world_width(&self) -> f64 {
        ((self.max_x - self.min_x + 1) as f64 - 4.0) * self.chunk_size
    }

    pub fn world_height(&self) -> f64 {
        ((self.max_y - self.min_y + 1) as f64 - 4.0) * self.chunk_size
    }

    /// Parses the `bounds` and `chunkSize` out of a `space.settings` document.
    ///
    /// Bounds may be given as attributes (`<bounds minX="-9" .../>`) or as
    /// child elements. `chunkSize` may live anywhere and defaults to 100.
    pub fn from_space_settings(xml: &str) -> Option<Self> {
        let doc = roxmltree::Document::parse(xml).ok()?;

        let read_value = |parent: &roxmltree::Node, name: &str| -> Option<String> {
            if let Some(v) = parent.attribute(name) {
                return Some(v.trim().to_string());
            }
            parent
                .children()
                .find(|c| c.has_tag_name(name))
                .and_then(|c| c.text())
                .map(|t| t.trim().to_string())
        };

        let bounds = doc.descendants().find(|n| n.has_tag_name("bounds"))?;
        let min_x: i32 = read_value(&bounds, "minX")?.parse().ok()?;
        let max_x: i32 = read_value(&bounds, "maxX")?.parse().ok()?;
        let min_y: i32 = read_value(&bounds, "minY")?.parse().ok()?;
        let max_y: i32 = read_value(&bounds, "maxY")?.parse().ok()?;

        let chunk_size: f64 = doc
            .descendants()
            .find(|n| n.has_tag_name("chunkSize"))
            .and_then(|n| n.text().and_then(|t| t.trim().parse().ok()))
            .unwrap_or(100.0);

        let geometry = MapGeometry {
            min_x,
            min_y,
            max_x,
            max_y,
            chunk_size,
        };
        if geometry.world_width() <= 0.0 || geometry.world_height() <= 0.0 {
            return None;
        }
        Some(geometry)
    }

    /// A square geometry whose playable area is `world_size` units across.
    pub fn square(world_size: f64) -> Self {
        // 5 chunks wide, 4 of them trimmed
        MapGeometry {
            min_x: -2,
            min_y: -2,
            max_x: 2,
            max_y: 2,
            chunk_size: world_size,
        }
    }

    /// Convert world coordinates to minimap pixel coordinates.
    pub fn world_to_minimap(&self, pos: WorldPos, width: u32, height: u32) -> MinimapPos {
        world_to_pixel(pos.x as f64, pos.z as f64, self, width, height)
    }
}

/// Maps a world-plane point onto an image of `width` x `height` pixels.
///
/// World Y (the game's Z) points north while image Y points down, so it is
/// negated. Fractional pixels are floored, so points just off the left or
/// top edge land on negative pixels. Out-of-range results saturate.
pub fn world_to_pixel(x: f64, y: f64, geometry: &MapGeometry, width: u32, height: u32) -> MinimapPos {
    let w = width as f64;
    let h = height as f64;
    MinimapPos {
        x: (x * w / geometry.world_width() + w / 2.0).floor() as i32,
        y: (-y * h / geometry.world_height() + h / 2.0).floor() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS_ATTRS: &str = r#"<space.settings>
        <bounds minX="-9" maxX="8" minY="-9" maxY="8"/>
        <chunkSize>100.0</chunkSize>
    </space.settings>"#;

    const SETTINGS_CHILDREN: &str = r#"<space.settings>
        <bounds>
            <minX> -4 </minX>
            <maxX> 3 </maxX>
            <minY> -4 </minY>
            <maxY> 3 </maxY>
        </bounds>
        <terrain><chunkSize>50</chunkSize></terrain>
    </space.settings>"#;

    #[test]
    fn parses_bounds_as_attributes() {
        let geometry = MapGeometry::from_space_settings(SETTINGS_ATTRS).unwrap();
        assert_eq!(geometry.min_x, -9);
        assert_eq!(geometry.max_y, 8);
        assert_eq!(geometry.world_width(), 1400.0);
        assert_eq!(geometry.world_height(), 1400.0);
    }

    #[test]
    fn parses_bounds_as_children() {
        let geometry = MapGeometry::from_space_settings(SETTINGS_CHILDREN).unwrap();
        assert_eq!(geometry.chunk_size, 50.0);
        assert_eq!(geometry.world_width(), 200.0);
    }

    #[test]
    fn chunk_size_defaults_to_100() {
        let xml = r#"<root><bounds minX="-5" maxX="4" minY="-5" maxY="4"/></root>"#;
        let geometry = MapGeometry::from_space_settings(xml).unwrap();
        assert_eq!(geometry.world_width(), 600.0);
    }

    #[test]
    fn rejects_missing_or_degenerate_bounds() {
        assert!(MapGeometry::from_space_settings("<root/>").is_none());
        assert!(MapGeometry::from_space_settings("not xml").is_none());
        let tiny = r#"<root><bounds minX="0" maxX="1" minY="0" maxY="1"/></root>"#;
        assert!(MapGeometry::from_space_settings(tiny).is_none());
    }

    #[test]
    fn center_and_corners() {
        let geometry = MapGeometry::square(1000.0);
        assert_eq!(geometry.world_width(), 1000.0);

        let at = |x: f64, y: f64| world_to_pixel(x, y, &geometry, 768, 768);
        assert_eq!(at(0.0, 0.0), MinimapPos { x: 384, y: 384 });
        assert_eq!(at(-500.0, 500.0), MinimapPos { x: 0, y: 0 });
        assert_eq!(at(500.0, 500.0), MinimapPos { x: 768, y: 0 });
        assert_eq!(at(-500.0, -500.0), MinimapPos { x: 0, y: 768 });
        assert_eq!(at(500.0, -500.0), MinimapPos { x: 768, y: 768 });
    }

    #[test]
    fn floors_on_both_sides_of_the_edge() {
        let geometry = MapGeometry::square(1000.0);
        // -500.5 * 0.768 + 384 = -0.384, 500.5 * 0.768 + 384 = 768.384
        assert_eq!(
            world_to_pixel(-500.5, -500.5, &geometry, 768, 768),
            MinimapPos { x: -1, y: 768 }
        );
        assert_eq!(
            world_to_pixel(500.5, 500.5, &geometry, 768, 768),
            MinimapPos { x: 768, y: -1 }
        );
        assert_eq!(
            world_to_pixel(0.0, -1e30, &geometry, 768, 768),
            MinimapPos { x: 384, y: i32::MAX }
        );
    }

    #[test]
    fn floors_fractional_pixels() {
        let geometry = MapGeometry::square(1000.0);
        // 100 * 768 / 1000 + 384 = 460.8, -200 * 768 / 1000 + 384 = 230.4
        assert_eq!(
            world_to_pixel(100.0, 200.0, &geometry, 768, 768),
            MinimapPos { x: 460, y: 230 }
        );
    }

    #[test]
    fn non_square_images_scale_per_axis() {
        let geometry = MapGeometry::square(1000.0);
        let pos = geometry.world_to_minimap(WorldPos { x: 250.0, z: 250.0 }, 400, 200);
        assert_eq!(pos, MinimapPos { x: 300, y: 50 });
    }
}
