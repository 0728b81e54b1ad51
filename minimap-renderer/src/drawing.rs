use std::sync::Arc;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use wows_replay_core::types::Species;

use crate::assets::ShipIcons;
use crate::draw_command::{DrawCommand, RenderTarget, ShipVisibility, ZoneStyle};
use crate::{CANVAS_HEIGHT, HUD_HEIGHT, MINIMAP_SIZE};

const COLOR_DEAD: Rgb<u8> = Rgb([128, 128, 128]);
const COLOR_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const COLOR_TEXT_SHADOW: Rgb<u8> = Rgb([0, 0, 0]);
const COLOR_BACKGROUND: Rgb<u8> = Rgb([20, 25, 35]);
const COLOR_HUD: Rgb<u8> = Rgb([12, 15, 22]);

/// Radius of the circle drawn when a ship class has no icon.
const FALLBACK_RADIUS: i32 = 5;

/// Markers further than this from the map edge, or zones wider than it, are not drawn.
const MAX_OFFSCREEN: i32 = MINIMAP_SIZE as i32;

fn within_reach(cmd: &DrawCommand) -> bool {
    let (pos, extent) = match cmd {
        DrawCommand::CapturePoint { pos, radius, .. } => (pos, *radius),
        DrawCommand::Ship { pos, .. } | DrawCommand::DeadShip { pos, .. } => (pos, 0),
        DrawCommand::Timer { .. } => return true,
    };
    let span = -MAX_OFFSCREEN..=MINIMAP_SIZE as i32 + MAX_OFFSCREEN;
    (0..=MAX_OFFSCREEN).contains(&extent) && span.contains(&pos.x) && span.contains(&pos.y)
}

fn blend(bg: Rgb<u8>, fg: Rgb<u8>, alpha: f32) -> Rgb<u8> {
    Rgb([
        (fg[0] as f32 * alpha + bg[0] as f32 * (1.0 - alpha)) as u8,
        (fg[1] as f32 * alpha + bg[1] as f32 * (1.0 - alpha)) as u8,
        (fg[2] as f32 * alpha + bg[2] as f32 * (1.0 - alpha)) as u8,
    ])
}

fn blend_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, alpha: f32) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    let bg = *image.get_pixel(x as u32, y as u32);
    image.put_pixel(x as u32, y as u32, blend(bg, color, alpha));
}

/// Draw a ship as a filled circle with a heading line.
fn draw_ship(image: &mut RgbImage, x: i32, y: i32, yaw: f32, color: Rgb<u8>, radius: i32) {
    let w = image.width() as i32;
    let h = image.height() as i32;
    if x < -radius || x >= w + radius || y < -radius || y >= h + radius {
        return;
    }
    draw_filled_circle_mut(image, (x, y), radius, color);

    // Heading line
    let line_len = (radius + 4) as f32;
    let end_x = x as f32 + yaw.cos() * line_len;
    let end_y = y as f32 - yaw.sin() * line_len;
    draw_line_segment_mut(image, (x as f32, y as f32), (end_x, end_y), color);
}

/// Draw a ship as a semi-transparent circle (hidden ships without an icon).
fn draw_ship_faded(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    yaw: f32,
    color: Rgb<u8>,
    opacity: f32,
    radius: i32,
) {
    fill_circle_blended(image, x, y, radius, color, opacity);

    let line_len = (radius + 4) as f32;
    let end_x = x as f32 + yaw.cos() * line_len;
    let end_y = y as f32 - yaw.sin() * line_len;
    draw_line_segment_mut(image, (x as f32, y as f32), (end_x, end_y), color);
}

/// Draw a dead ship marker (X shape).
fn draw_dead_ship(image: &mut RgbImage, x: i32, y: i32) {
    let size = 4.0f32;
    draw_line_segment_mut(
        image,
        (x as f32 - size, y as f32 - size),
        (x as f32 + size, y as f32 + size),
        COLOR_DEAD,
    );
    draw_line_segment_mut(
        image,
        (x as f32 + size, y as f32 - size),
        (x as f32 - size, y as f32 + size),
        COLOR_DEAD,
    );
}

fn fill_circle_blended(image: &mut RgbImage, x: i32, y: i32, radius: i32, color: Rgb<u8>, alpha: f32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            blend_pixel(image, x + dx, y + dy, color, alpha);
        }
    }
}

/// Ring made of alternating drawn and skipped arcs.
fn draw_dashed_ring(image: &mut RgbImage, x: i32, y: i32, radius: i32, color: Rgb<u8>) {
    const DASHES: f32 = 16.0;
    let dash_angle = std::f32::consts::TAU / (DASHES * 2.0);
    let steps = (std::f32::consts::TAU * radius.max(1) as f32 * 2.0) as i32;
    for step in 0..steps {
        let angle = step as f32 / steps as f32 * std::f32::consts::TAU;
        if (angle / dash_angle) as i32 % 2 == 1 {
            continue;
        }
        for r in [radius - 1, radius] {
            let px = x + (angle.cos() * r as f32).round() as i32;
            let py = y + (angle.sin() * r as f32).round() as i32;
            blend_pixel(image, px, py, color, 1.0);
        }
    }
}

/// Draw text horizontally centered on `x` with a 1px drop shadow.
fn draw_centered_text(image: &mut RgbImage, font: &FontArc, x: i32, y: i32, scale: f32, text: &str) {
    let scale = PxScale::from(scale);
    let (w, _) = text_size(scale, font, text);
    let left = x - w as i32 / 2;
    draw_text_mut(image, COLOR_TEXT_SHADOW, left + 1, y + 1, scale, font, text);
    draw_text_mut(image, COLOR_TEXT, left, y, scale, font, text);
}

/// Picks the icon for a ship, falling back to the species' base icon.
/// The flag tells whether the requested variant itself was found.
fn ship_icon<'i>(
    icons: &'i ShipIcons,
    species: Option<Species>,
    variant: &str,
) -> Option<(&'i RgbaImage, bool)> {
    let name = species?.name();
    if !variant.is_empty() {
        if let Some(icon) = icons.get(&format!("{name}{variant}")) {
            return Some((icon, true));
        }
    }
    icons.get(name).map(|icon| (icon, false))
}

/// Software renderer that draws to an `RgbImage`.
///
/// The base canvas and icons are shared, so cloning a target for another
/// worker thread only allocates the frame buffer.
#[derive(Clone)]
pub struct ImageTarget {
    canvas: RgbImage,
    /// Pre-built background: HUD strip, map image and grid overlay. Cloned at start of each frame.
    base_canvas: Arc<RgbImage>,
    font: Option<FontArc>,
    ship_icons: Arc<ShipIcons>,
}

impl ImageTarget {
    /// `map_image` is expected to be `MINIMAP_SIZE` square. Without a font,
    /// text (grid labels, ship names, timer) is skipped.
    pub fn new(
        map_image: &RgbImage,
        ship_icons: Arc<ShipIcons>,
        font: Option<FontArc>,
        show_grid: bool,
    ) -> Self {
        let mut base = RgbImage::from_pixel(MINIMAP_SIZE, CANVAS_HEIGHT, COLOR_BACKGROUND);
        draw_filled_rect_mut(
            &mut base,
            Rect::at(0, 0).of_size(MINIMAP_SIZE, HUD_HEIGHT),
            COLOR_HUD,
        );
        for y in 0..map_image.height().min(MINIMAP_SIZE) {
            for x in 0..map_image.width().min(MINIMAP_SIZE) {
                base.put_pixel(x, y + HUD_HEIGHT, *map_image.get_pixel(x, y));
            }
        }
        if show_grid {
            draw_grid(&mut base, MINIMAP_SIZE, HUD_HEIGHT, font.as_ref());
        }

        Self {
            canvas: RgbImage::new(MINIMAP_SIZE, CANVAS_HEIGHT),
            base_canvas: Arc::new(base),
            font,
            ship_icons,
        }
    }

    /// Access the current frame image.
    pub fn frame(&self) -> &RgbImage {
        &self.canvas
    }

    /// Hand out the finished frame, leaving an empty canvas behind.
    pub fn take_frame(&mut self) -> RgbImage {
        std::mem::take(&mut self.canvas)
    }

    /// Canvas dimensions.
    pub fn canvas_size(&self) -> (u32, u32) {
        (MINIMAP_SIZE, CANVAS_HEIGHT)
    }

    fn draw_label(&mut self, x: i32, y: i32, text: &str) {
        if let Some(font) = &self.font {
            draw_centered_text(&mut self.canvas, font, x, y, 11.0, text);
        }
    }
}

impl RenderTarget for ImageTarget {
    fn begin_frame(&mut self) {
        // Clone the pre-built base canvas (map + grid)
        self.canvas = (*self.base_canvas).clone();
    }

    fn draw(&mut self, cmd: &DrawCommand) {
        if !within_reach(cmd) {
            return;
        }
        let y_off = HUD_HEIGHT as i32;
        match cmd {
            DrawCommand::CapturePoint {
                pos,
                radius,
                color,
                alpha,
                style,
                label,
                progress,
                invader_color,
            } => {
                let x = pos.x;
                let y = pos.y + y_off;
                let rgb = Rgb(*color);
                if *alpha > 0.0 {
                    fill_circle_blended(&mut self.canvas, x, y, *radius, rgb, *alpha);
                }
                match style {
                    ZoneStyle::Owned => {
                        draw_hollow_circle_mut(&mut self.canvas, (x, y), *radius, rgb);
                        draw_hollow_circle_mut(&mut self.canvas, (x, y), *radius - 1, rgb);
                    }
                    ZoneStyle::Neutral => {
                        draw_hollow_circle_mut(&mut self.canvas, (x, y), *radius, rgb);
                    }
                    ZoneStyle::Contested => {
                        let ring = invader_color.map(Rgb).unwrap_or(rgb);
                        draw_dashed_ring(&mut self.canvas, x, y, *radius, ring);
                        // Inner disc grows with capture progress
                        let inner = (*radius as f32 * progress.clamp(0.0, 1.0)) as i32;
                        if inner > 0 {
                            fill_circle_blended(&mut self.canvas, x, y, inner, ring, 0.25);
                        }
                    }
                }
                self.draw_label(x, y - 7, label);
            }
            DrawCommand::Ship {
                pos,
                yaw,
                species,
                color,
                visibility,
                opacity,
                is_self,
                ship_name,
                ..
            } => {
                let x = pos.x;
                let y = pos.y + y_off;
                let rgb = color.map(Rgb).unwrap_or(COLOR_DEAD);
                let variant = match (visibility, is_self) {
                    (ShipVisibility::Hidden, _) => "_invisible",
                    (ShipVisibility::Visible, true) => "_self",
                    (ShipVisibility::Visible, false) => "",
                };

                match ship_icon(&self.ship_icons, *species, variant) {
                    Some((icon, _)) => {
                        draw_ship_icon(&mut self.canvas, icon, x, y, *yaw, Some(rgb), *opacity);
                    }
                    None if *opacity < 1.0 => {
                        draw_ship_faded(&mut self.canvas, x, y, *yaw, rgb, *opacity, FALLBACK_RADIUS);
                    }
                    None => draw_ship(&mut self.canvas, x, y, *yaw, rgb, FALLBACK_RADIUS),
                }

                if let Some(name) = ship_name {
                    self.draw_label(x, y + FALLBACK_RADIUS + 6, name);
                }
            }
            DrawCommand::DeadShip {
                pos,
                yaw,
                species,
                color,
                ..
            } => {
                let x = pos.x;
                let y = pos.y + y_off;
                match ship_icon(&self.ship_icons, *species, "_dead") {
                    // Dedicated wreck icons carry their own colors
                    Some((icon, true)) => {
                        let tint = color.map(Rgb);
                        draw_ship_icon(&mut self.canvas, icon, x, y, *yaw, tint, 1.0);
                    }
                    Some((icon, false)) => {
                        let tint = color.map(Rgb).unwrap_or(COLOR_DEAD);
                        draw_ship_icon(&mut self.canvas, icon, x, y, *yaw, Some(tint), 0.6);
                    }
                    None => draw_dead_ship(&mut self.canvas, x, y),
                }
            }
            DrawCommand::Timer { elapsed } => {
                if let Some(font) = &self.font {
                    draw_timer(&mut self.canvas, *elapsed, font);
                }
            }
        }
    }

    fn end_frame(&mut self) {
        // No-op; frame is ready to read via frame()
    }
}

/// Draw the game timer centered in the HUD strip.
fn draw_timer(image: &mut RgbImage, game_time_secs: f32, font: &FontArc) {
    let total_secs = game_time_secs.max(0.0) as u32;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    let text = format!("{:02}:{:02}", minutes, seconds);

    let x = (image.width() / 2) as i32;
    draw_centered_text(image, font, x, 8, 16.0, &text);
}

/// Draw A-J / 1-10 grid lines and labels over the minimap area.
///
/// `y_off` is the vertical offset from the top of the canvas to the start of the map.
fn draw_grid(image: &mut RgbImage, minimap_size: u32, y_off: u32, font: Option<&FontArc>) {
    let grid_color = Rgb([255u8, 255, 255]);
    let alpha = 0.25f32;
    let cell = minimap_size as f32 / 10.0;

    // 9 vertical and 9 horizontal interior lines (blended for transparency)
    for i in 1..10 {
        let pos = (i as f32 * cell).round() as i32;
        for t in 0..minimap_size as i32 {
            blend_pixel(image, pos, t + y_off as i32, grid_color, alpha);
            blend_pixel(image, t, pos + y_off as i32, grid_color, alpha);
        }
    }

    let Some(font) = font else {
        return;
    };

    // Labels: numbers 1-10 across the top, letters A-J down the left
    let label_scale = PxScale::from(11.0);
    for i in 0..10 {
        let label = format!("{}", i + 1);
        let x = (i as f32 * cell + cell / 2.0 - 3.0) as i32;
        let y = y_off as i32 + 2;
        draw_text_mut(image, COLOR_TEXT_SHADOW, x + 1, y + 1, label_scale, font, &label);
        draw_text_mut(image, COLOR_TEXT, x, y, label_scale, font, &label);
    }
    for (i, ch) in ('A'..='J').enumerate() {
        let label = ch.to_string();
        let x = 3i32;
        let y = y_off as i32 + (i as f32 * cell + cell / 2.0 - 5.0) as i32;
        draw_text_mut(image, COLOR_TEXT_SHADOW, x + 1, y + 1, label_scale, font, &label);
        draw_text_mut(image, COLOR_TEXT, x, y, label_scale, font, &label);
    }
}

/// Draw a ship icon (pre-rasterized SVG) rotated by yaw.
///
/// With a `color`, the icon is treated as a white/alpha mask and tinted.
/// Without one, the icon's own colors are used.
/// The icon is rotated about its center by `yaw` radians (game convention: 0=east, CCW positive).
fn draw_ship_icon(
    image: &mut RgbImage,
    icon: &RgbaImage,
    x: i32,
    y: i32,
    yaw: f32,
    color: Option<Rgb<u8>>,
    opacity: f32,
) {
    let iw = icon.width() as i32;
    let ih = icon.height() as i32;
    let cx = iw as f32 / 2.0;
    let cy = ih as f32 / 2.0;
    let img_w = image.width() as i32;
    let img_h = image.height() as i32;

    // The SVG icons point upward (north = -Y in screen coords). In game coordinates,
    // yaw=0 means east (+X) and increases counter-clockwise. The screen-space rotation
    // angle R that maps icon-north (0,-1) to heading (cos(yaw), -sin(yaw)) is R = PI/2 - yaw.
    // For inverse sampling we use cos(R) and sin(R) directly:
    let cos_r = yaw.sin(); // cos(PI/2 - yaw) = sin(yaw)
    let sin_r = yaw.cos(); // sin(PI/2 - yaw) = cos(yaw)

    for dy in -ih / 2..=ih / 2 {
        for dx in -iw / 2..=iw / 2 {
            let dest_x = x + dx;
            let dest_y = y + dy;
            if dest_x < 0 || dest_x >= img_w || dest_y < 0 || dest_y >= img_h {
                continue;
            }

            // Inverse-rotate to find source pixel in the icon
            let fdx = dx as f32;
            let fdy = dy as f32;
            let src_x = fdx * cos_r + fdy * sin_r + cx;
            let src_y = -fdx * sin_r + fdy * cos_r + cy;

            let sx = src_x.round() as i32;
            let sy = src_y.round() as i32;
            if sx < 0 || sx >= iw || sy < 0 || sy >= ih {
                continue;
            }

            let pixel = icon.get_pixel(sx as u32, sy as u32);
            let alpha = pixel[3] as f32 / 255.0 * opacity;
            if alpha < 0.05 {
                continue;
            }

            let fg = match color {
                Some(tint) => {
                    // Tint: use the icon's luminance as intensity, apply team color
                    let luminance = (pixel[0] as f32 * 0.299
                        + pixel[1] as f32 * 0.587
                        + pixel[2] as f32 * 0.114)
                        / 255.0;
                    Rgb([
                        (tint[0] as f32 * luminance).round() as u8,
                        (tint[1] as f32 * luminance).round() as u8,
                        (tint[2] as f32 * luminance).round() as u8,
                    ])
                }
                None => Rgb([pixel[0], pixel[1], pixel[2]]),
            };

            blend_pixel(image, dest_x, dest_y, fg, alpha);
        }
    }
}
