pub mod assets;
pub mod catalog;
pub mod config;
pub mod draw_command;
pub mod drawing;
pub mod error;
pub mod map_data;
pub mod pipeline;
pub mod renderer;
pub mod video;

/// Minimap image size in pixels (square). Multiple of 16 for H.264 macroblock alignment.
pub const MINIMAP_SIZE: u32 = 768;
/// Top margin for HUD elements (match timer).
pub const HUD_HEIGHT: u32 = 32;
/// Total canvas height: minimap + HUD.
pub const CANVAS_HEIGHT: u32 = MINIMAP_SIZE + HUD_HEIGHT;

pub use assets::AssetStore;
pub use catalog::{ShipCatalog, StaticShipCatalog};
pub use config::RendererConfig;
pub use draw_command::{DrawCommand, RenderTarget, ShipVisibility};
pub use drawing::ImageTarget;
pub use error::{RenderError, VideoError};
pub use map_data::{MapGeometry, MinimapPos};
pub use pipeline::{FrameResources, render_battle, render_replay};
pub use renderer::MinimapRenderer;
pub use video::{DumpMode, VideoEncoder};
