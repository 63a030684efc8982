use std::io::Cursor;
use std::path::Path;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::{ImageFormat, Rgb, RgbImage};
use tracing::{debug, warn};

use crate::error::Result;
use crate::scene::Scene;

/// Longest description drawn on a placeholder, ellipsis included.
pub const MAX_CAPTION_CHARS: usize = 60;

const PALETTE: [([u8; 3], [u8; 3]); 6] = [
    ([0x1e, 0x3c, 0x72], [0x2a, 0x52, 0x98]),
    ([0x42, 0x27, 0x5a], [0x73, 0x4b, 0x6d]),
    ([0x13, 0x4e, 0x5e], [0x71, 0xb2, 0x80]),
    ([0xcb, 0x35, 0x6b], [0xbd, 0x3f, 0x32]),
    ([0x0f, 0x20, 0x27], [0x2c, 0x53, 0x64]),
    ([0xff, 0x7e, 0x5f], [0xfe, 0xb4, 0x7b]),
];

/// Caption face used when no override is configured.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Text drawn on a placeholder frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderCaption {
    pub title: String,
    pub description: String,
}

impl PlaceholderCaption {
    pub fn for_scene(scene: &Scene) -> Self {
        Self {
            title: format!("Scene {}", scene.index + 1),
            description: truncate(&scene.visual_description, MAX_CAPTION_CHARS),
        }
    }
}

/// Offline stand-in for the image service: a gradient card per scene.
pub struct PlaceholderRenderer {
    width: u32,
    height: u32,
    font: Option<Font>,
}

impl PlaceholderRenderer {
    pub fn new(width: u32, height: u32, font_path: Option<&Path>) -> Self {
        Self {
            width,
            height,
            font: load_font(font_path),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Render the frame for `scene`. Colours depend only on the scene index.
    pub fn render(&self, scene: &Scene) -> RgbImage {
        let (from, to) = PALETTE[scene.index % PALETTE.len()];
        let mut canvas = gradient(self.width, self.height, from, to);

        let caption = PlaceholderCaption::for_scene(scene);
        if let Some(font) = &self.font {
            let title_size = (self.height as f32 / 8.0).max(12.0);
            let body_size = (self.height as f32 / 20.0).max(10.0);
            let margin = self.width as f32 / 12.0;
            let max_width = self.width as f32 - 2.0 * margin;

            draw_text(
                &mut canvas,
                font,
                &caption.title,
                title_size,
                (margin, self.height as f32 * 0.3),
                max_width,
            );
            draw_text(
                &mut canvas,
                font,
                &caption.description,
                body_size,
                (margin, self.height as f32 * 0.3 + title_size * 1.6),
                max_width,
            );
        }

        canvas
    }

    pub fn render_png(&self, scene: &Scene) -> Result<Vec<u8>> {
        let canvas = self.render(scene);
        let mut png = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}

fn load_font(explicit: Option<&Path>) -> Option<Font> {
    if let Some(path) = explicit {
        match std::fs::read(path) {
            Ok(bytes) => match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => {
                    debug!("Placeholder font: {}", path.display());
                    return Some(font);
                }
                Err(e) => warn!("Failed to parse font {}: {}", path.display(), e),
            },
            Err(e) => warn!("Failed to read font {}: {}", path.display(), e),
        }
        warn!("Falling back to the bundled placeholder font");
    }

    match Font::from_bytes(BUNDLED_FONT, FontSettings::default()) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Bundled font unusable ({}); placeholders will have no captions", e);
            None
        }
    }
}

fn gradient(width: u32, height: u32, from: [u8; 3], to: [u8; 3]) -> RgbImage {
    let span = (width + height).saturating_sub(2).max(1) as f32;
    RgbImage::from_fn(width, height, |x, y| {
        let t = (x + y) as f32 / span;
        Rgb(std::array::from_fn(|c| {
            (from[c] as f32 + (to[c] as f32 - from[c] as f32) * t).round() as u8
        }))
    })
}

fn draw_text(
    canvas: &mut RgbImage,
    font: &Font,
    text: &str,
    size: f32,
    (x, y): (f32, f32),
    max_width: f32,
) {
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        x,
        y,
        max_width: Some(max_width),
        ..LayoutSettings::default()
    });
    layout.append(&[font], &TextStyle::new(text, size, 0));

    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (_, bitmap) = font.rasterize_config(glyph.key);
        let origin_x = glyph.x.round() as i64;
        let origin_y = glyph.y.round() as i64;

        for row in 0..glyph.height {
            for col in 0..glyph.width {
                let coverage = bitmap[row * glyph.width + col];
                if coverage == 0 {
                    continue;
                }
                let px = origin_x + col as i64;
                let py = origin_y + row as i64;
                if px < 0 || py < 0 || px >= canvas.width() as i64 || py >= canvas.height() as i64 {
                    continue;
                }
                let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                let alpha = coverage as u32;
                for channel in pixel.0.iter_mut() {
                    *channel = ((*channel as u32 * (255 - alpha) + 255 * alpha) / 255) as u8;
                }
            }
        }
    }
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
