// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use pincab_model::Color;
use tracing::{debug, warn};

use crate::gfx::{GfxContext, Texture};

pub fn load_font(path: &str) -> Option<fontdue::Font> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path, error = %e, "failed to read font file");
            return None;
        }
    };

    match fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default()) {
        Ok(font) => {
            debug!(path, "loaded font");
            Some(font)
        }
        Err(e) => {
            warn!(path, error = %e, "failed to parse font");
            None
        }
    }
}

/// A rasterised block of text: per-pixel alpha coverage.
pub struct RasterText {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

/// Lays out and rasterises multi-line text at the given pixel size.
pub fn rasterize(font: &fontdue::Font, text: &str, px: f32) -> Option<RasterText> {
    let line_metrics = font.horizontal_line_metrics(px)?;
    let line_height = line_metrics.new_line_size.ceil().max(1.0);
    let ascent = line_metrics.ascent;

    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let line_width = |line: &str| -> f32 {
        line.chars()
            .map(|c| font.metrics(c, px).advance_width)
            .sum()
    };

    let width = lines
        .iter()
        .map(|l| line_width(l).ceil() as u32)
        .max()
        .unwrap_or(0)
        .max(1);
    let height = (line_height * lines.len() as f32).ceil() as u32;

    let mut coverage = vec![0u8; (width * height) as usize];

    for (row, line) in lines.iter().enumerate() {
        let baseline = (row as f32 * line_height + ascent).round() as i32;
        let mut pen_x = 0.0f32;

        for c in line.chars() {
            let (metrics, bitmap) = font.rasterize(c, px);

            let left = pen_x.round() as i32 + metrics.xmin;
            let top = baseline - metrics.ymin - metrics.height as i32;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let x = left + gx as i32;
                    let y = top + gy as i32;
                    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                        continue;
                    }

                    let dst = (y as u32 * width + x as u32) as usize;
                    let src = gy * metrics.width + gx;
                    coverage[dst] = coverage[dst].max(bitmap[src]);
                }
            }

            pen_x += metrics.advance_width;
        }
    }

    Some(RasterText {
        width,
        height,
        coverage,
    })
}

/// Renders text into a texture with a transparent background. Returns `None`
/// when the text cannot be rasterised; callers degrade by skipping the
/// title.
pub fn render_text(
    gfx: &GfxContext,
    font: &fontdue::Font,
    text: &str,
    px: f32,
    color: Color,
) -> Option<Texture> {
    let raster = rasterize(font, text, px)?;

    let mut rgba = vec![0u8; (raster.width * raster.height * 4) as usize];
    for (i, alpha) in raster.coverage.iter().enumerate() {
        let a = (*alpha as u16 * color.a as u16 / 255) as u8;
        rgba[i * 4] = color.r;
        rgba[i * 4 + 1] = color.g;
        rgba[i * 4 + 2] = color.b;
        rgba[i * 4 + 3] = a;
    }

    Some(gfx.create_texture_rgba("pincab-text", raster.width, raster.height, &rgba))
}

/// Renders a filled panel of the given size with the text centred in it.
/// Used by the generated-art player. Works without a font, yielding a plain
/// panel.
#[allow(clippy::too_many_arguments)]
pub fn render_panel(
    gfx: &GfxContext,
    font: Option<&fontdue::Font>,
    text: &str,
    px: f32,
    fg: Color,
    bg: Color,
    width: u32,
    height: u32,
) -> Option<Texture> {
    if width == 0 || height == 0 {
        return None;
    }

    let mut rgba = vec![0u8; (width * height * 4) as usize];
    for pixel in rgba.chunks_exact_mut(4) {
        pixel.copy_from_slice(&[bg.r, bg.g, bg.b, bg.a]);
    }

    if let Some(raster) = font.and_then(|f| rasterize(f, text, px)) {
        let off_x = (width.saturating_sub(raster.width) / 2) as i64;
        let off_y = (height.saturating_sub(raster.height) / 2) as i64;

        for y in 0..raster.height as i64 {
            for x in 0..raster.width as i64 {
                let dx = x + off_x;
                let dy = y + off_y;
                if dx < 0 || dy < 0 || dx >= width as i64 || dy >= height as i64 {
                    continue;
                }

                let alpha = raster.coverage[(y as u32 * raster.width + x as u32) as usize];
                if alpha == 0 {
                    continue;
                }

                let dst = ((dy as u32 * width + dx as u32) * 4) as usize;
                // Straight alpha blend of the glyph over the panel fill.
                let blend = |under: u8, over: u8| -> u8 {
                    let a = alpha as u32;
                    ((over as u32 * a + under as u32 * (255 - a)) / 255) as u8
                };
                rgba[dst] = blend(rgba[dst], fg.r);
                rgba[dst + 1] = blend(rgba[dst + 1], fg.g);
                rgba[dst + 2] = blend(rgba[dst + 2], fg.b);
            }
        }
    }

    Some(gfx.create_texture_rgba("pincab-generated-art", width, height, &rgba))
}
