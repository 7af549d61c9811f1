// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! Per-frame composition for one cabinet window: media (video frame or
//! image) with rotation, wheel art, title text, and the playfield overlay.

use pincab_model::{Role, Settings};

use crate::assets::ActiveSlot;
use crate::gfx::{GfxContext, Texture, Vertex};
use crate::overlay::Shape;
use crate::windows::CabWindow;

/// A batch of vertices drawn with one texture bind group.
struct DrawList<'a> {
    vertices: Vec<Vertex>,
    batches: Vec<(&'a wgpu::BindGroup, std::ops::Range<u32>)>,
    width: f32,
    height: f32,
}

impl<'a> DrawList<'a> {
    fn new(width: u32, height: u32) -> Self {
        DrawList {
            vertices: Vec::new(),
            batches: Vec::new(),
            width: width as f32,
            height: height as f32,
        }
    }

    fn to_ndc(&self, x: f32, y: f32) -> [f32; 2] {
        [
            2.0 * x / self.width - 1.0,
            1.0 - 2.0 * y / self.height,
        ]
    }

    fn push(&mut self, bind_group: &'a wgpu::BindGroup, vertices: impl IntoIterator<Item = Vertex>) {
        let start = self.vertices.len() as u32;
        self.vertices.extend(vertices);
        let end = self.vertices.len() as u32;

        // Extend the previous batch when the texture is unchanged.
        if let Some((last, range)) = self.batches.last_mut() {
            if std::ptr::eq(*last, bind_group) && range.end == start {
                range.end = end;
                return;
            }
        }

        self.batches.push((bind_group, start..end));
    }

    /// A textured quad with rotation about its centre, in window pixels.
    fn push_quad(
        &mut self,
        bind_group: &'a wgpu::BindGroup,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        rotation_deg: i32,
        color: [f32; 4],
    ) {
        let cx = x + w / 2.0;
        let cy = y + h / 2.0;
        let angle = (rotation_deg as f32).to_radians();
        let (sin, cos) = angle.sin_cos();

        let rotate = |px: f32, py: f32| -> [f32; 2] {
            let dx = px - cx;
            let dy = py - cy;
            [cx + dx * cos - dy * sin, cy + dx * sin + dy * cos]
        };

        let corners = [
            (rotate(x, y), [0.0, 0.0]),
            (rotate(x + w, y), [1.0, 0.0]),
            (rotate(x + w, y + h), [1.0, 1.0]),
            (rotate(x, y + h), [0.0, 1.0]),
        ];

        let vertex = |i: usize| Vertex {
            position: self.to_ndc(corners[i].0[0], corners[i].0[1]),
            uv: corners[i].1,
            color,
        };

        self.push(
            bind_group,
            [vertex(0), vertex(1), vertex(2), vertex(0), vertex(2), vertex(3)],
        );
    }
}

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Draws one frame for a role window per the fixed composite order, then
/// presents.
pub fn render_window(
    gfx: &GfxContext,
    cab: &CabWindow,
    slot: &mut ActiveSlot,
    settings: &Settings,
    role: Role,
    shapes: &[Shape],
    metadata_texture: Option<&Texture>,
) -> Result<(), wgpu::SurfaceError> {
    // Advance the video (non-blocking) before any borrows for drawing.
    if let Some(player) = &mut slot.video_player {
        player.update(gfx);
    }

    let (width, height) = cab.size();
    let mut list = DrawList::new(width, height);

    let (mx, my, mw, mh, rotation) = settings.media_rect(role);
    let media = (mx as f32, my as f32, mw as f32, mh as f32);

    // Video takes precedence over the still image.
    let media_texture = slot
        .video_player
        .as_ref()
        .and_then(|p| p.texture())
        .or(slot.texture.as_deref());

    if let Some(texture) = media_texture {
        list.push_quad(
            &texture.bind_group,
            media.0,
            media.1,
            media.2,
            media.3,
            rotation,
            WHITE,
        );
    }

    if settings.show_wheel && settings.wheel_window_role() == role {
        if let Some(wheel) = slot.wheel_texture.as_deref() {
            list.push_quad(
                &wheel.bind_group,
                settings.wheel_media_x as f32,
                settings.wheel_media_y as f32,
                settings.wheel_media_width as f32,
                settings.wheel_media_height as f32,
                0,
                WHITE,
            );
        }
    }

    if settings.show_title && settings.title_window_role() == role {
        if let Some(title) = slot.title_texture.as_ref() {
            let x = settings.title_x as f32;
            let y = settings.title_y as f32;
            let w = title.width as f32;
            let h = title.height as f32;

            // Title background, inflated by 5px around the text.
            list.push_quad(
                &gfx.white.bind_group,
                x - 5.0,
                y - 5.0,
                w + 10.0,
                h + 10.0,
                0,
                settings.font_bg_color.to_f32(),
            );
            list.push_quad(&title.bind_group, x, y, w, h, 0, WHITE);
        }
    }

    for shape in shapes {
        match shape {
            Shape::Rect { rect, color } => {
                list.push_quad(
                    &gfx.white.bind_group,
                    rect.x,
                    rect.y,
                    rect.w,
                    rect.h,
                    0,
                    *color,
                );
            }
            Shape::Triangle { points, color } => {
                let vertices = points.map(|[x, y]| Vertex {
                    position: list.to_ndc(x, y),
                    uv: [0.5, 0.5],
                    color: *color,
                });
                list.push(&gfx.white.bind_group, vertices);
            }
        }
    }

    if let Some(panel_text) = metadata_texture {
        let (w, h) = (panel_text.width as f32, panel_text.height as f32);
        list.push_quad(
            &panel_text.bind_group,
            (list.width - w) / 2.0,
            (list.height - h) / 2.0,
            w,
            h,
            0,
            WHITE,
        );
    }

    gfx.render_frame(&cab.gfx, &list.vertices, &list.batches)
}
