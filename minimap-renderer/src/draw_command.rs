use wows_replay_core::types::{EntityId, Species};

use crate::map_data::MinimapPos;

/// How a live ship should be rendered based on its visibility state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShipVisibility {
    /// Ship is currently spotted. Tinted icon.
    Visible,
    /// Ship has gone undetected. Gray, semi-transparent at last known position.
    Hidden,
}

/// Ring style of a capture zone.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ZoneStyle {
    /// Held by a team: filled disc plus solid ring.
    Owned,
    /// Nobody holds it: thin white ring, no fill.
    Neutral,
    /// Being captured: dashed ring in the invader's color.
    Contested,
}

/// A high-level draw command emitted by the renderer.
///
/// The renderer reads a snapshot and produces a sequence of these commands.
/// A `RenderTarget` implementation consumes them to produce visual output.
///
/// All visual properties (colors, opacity, etc.) are fully resolved by the renderer,
/// so backends don't need to duplicate game logic.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Capture zone circle with team coloring and letter label
    CapturePoint {
        pos: MinimapPos,
        /// Zone radius in pixels
        radius: i32,
        /// Team color (green/red/white) for the owning team
        color: [u8; 3],
        /// Fill transparency, 0 for no fill
        alpha: f32,
        style: ZoneStyle,
        /// Zone label (e.g. "A", "B", "C")
        label: String,
        /// Capture progress 0.0..1.0 (0 = no capture in progress)
        progress: f32,
        /// Color of the invading team
        invader_color: Option<[u8; 3]>,
    },
    /// Live ship with icon, rotation, color, visibility
    Ship {
        entity_id: EntityId,
        pos: MinimapPos,
        yaw: f32,
        /// Ship class for icon lookup; `None` draws a plain circle
        species: Option<Species>,
        /// Tint color. None = use the icon's native colors (for invisible variants)
        color: Option<[u8; 3]>,
        visibility: ShipVisibility,
        opacity: f32,
        /// Whether this is the player's own ship (uses `_self` icon variant)
        is_self: bool,
        /// Short ship name to render below the icon
        ship_name: Option<String>,
    },
    /// Sunk ship marker
    DeadShip {
        entity_id: EntityId,
        pos: MinimapPos,
        yaw: f32,
        species: Option<Species>,
        /// Tint color. None = use the icon's native colors
        color: Option<[u8; 3]>,
        is_self: bool,
    },
    /// Match clock in the HUD strip
    Timer {
        /// Seconds since the first packet of the replay
        elapsed: f32,
    },
}

/// Trait for rendering backends that consume `DrawCommand`s.
///
/// Implementations produce visual output from high-level draw commands.
pub trait RenderTarget {
    /// Prepare a fresh frame (clear canvas, draw background map + grid).
    fn begin_frame(&mut self);

    /// Execute a single draw command.
    fn draw(&mut self, cmd: &DrawCommand);

    /// Finalize the current frame. After this call, the frame is ready to read/encode.
    fn end_frame(&mut self);
}
