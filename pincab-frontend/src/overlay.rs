// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! The playfield overlay: scrollbar, navigation-arrow hints and the
//! metadata panel. A pure view over the current table and settings; it
//! emits shapes for the renderer to draw.

use pincab_model::settings::Color;
use pincab_model::{Settings, TableRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect { rect: Rect, color: [f32; 4] },
    Triangle { points: [[f32; 2]; 3], color: [f32; 4] },
}

/// Arrow alpha oscillates sinusoidally between 0.2 and 1.0 once per second.
pub fn arrow_alpha(seconds: f32) -> f32 {
    0.6 + 0.4 * (seconds * std::f32::consts::TAU).sin()
}

fn tinted(color: Color, alpha: f32) -> [f32; 4] {
    let [r, g, b, a] = color.to_f32();
    [r, g, b, a * alpha]
}

/// Builds the overlay shapes for one frame of the playfield window.
pub fn build(
    settings: &Settings,
    table: &TableRecord,
    index: usize,
    count: usize,
    width: f32,
    height: f32,
    seconds: f32,
    show_metadata: bool,
) -> Vec<Shape> {
    let mut shapes = Vec::new();

    if settings.show_scrollbar && count > 1 {
        shapes.extend(scrollbar(settings, index, count, width));
    }

    if settings.show_arrow_hint {
        shapes.extend(arrows(settings, width, height, seconds));
    }

    if show_metadata {
        shapes.extend(metadata_panel(settings, table, width, height));
    }

    shapes
}

fn scrollbar(settings: &Settings, index: usize, count: usize, width: f32) -> Vec<Shape> {
    let length = width * settings.scrollbar_length;
    let x = (width - length) / 2.0;
    let y = 8.0;

    let track = Rect {
        x,
        y,
        w: length,
        h: settings.scrollbar_width,
    };

    // Thumb position is proportional to the navigation progress.
    let progress = index as f32 / (count - 1) as f32;
    let thumb_w = settings.scrollbar_thumb_width;
    let thumb = Rect {
        x: x + progress * (length - thumb_w),
        y,
        w: thumb_w,
        h: settings.scrollbar_width,
    };

    vec![
        Shape::Rect {
            rect: track,
            color: settings.scrollbar_color.to_f32(),
        },
        Shape::Rect {
            rect: thumb,
            color: settings.scrollbar_thumb_color.to_f32(),
        },
    ]
}

fn arrows(settings: &Settings, width: f32, height: f32, seconds: f32) -> Vec<Shape> {
    let alpha = arrow_alpha(seconds) * settings.arrow_alpha;
    let h = settings.arrow_hint_height;
    let w = settings.arrow_hint_width;
    let glow = settings.arrow_glow;
    let mid_y = height / 2.0;

    let mut shapes = Vec::new();

    // Chevrons as filled triangles, one pointing out of each edge, with a
    // slightly larger glow triangle underneath.
    let mut chevron = |tip_x: f32, base_x: f32| {
        shapes.push(Shape::Triangle {
            points: [
                [tip_x, mid_y],
                [base_x, mid_y - h / 2.0 - glow],
                [base_x, mid_y + h / 2.0 + glow],
            ],
            color: tinted(settings.arrow_glow_color, alpha),
        });
        shapes.push(Shape::Triangle {
            points: [
                [tip_x, mid_y],
                [base_x, mid_y - h / 2.0],
                [base_x, mid_y],
            ],
            color: tinted(settings.arrow_color_top, alpha),
        });
        shapes.push(Shape::Triangle {
            points: [
                [tip_x, mid_y],
                [base_x, mid_y],
                [base_x, mid_y + h / 2.0],
            ],
            color: tinted(settings.arrow_color_bottom, alpha),
        });
    };

    let margin = 10.0;
    chevron(margin, margin + w);
    chevron(width - margin, width - margin - w);

    shapes
}

fn metadata_panel(
    settings: &Settings,
    table: &TableRecord,
    width: f32,
    height: f32,
) -> Vec<Shape> {
    let w = width * settings.metadata_panel_width;
    let h = height * settings.metadata_panel_height;
    let rect = Rect {
        x: (width - w) / 2.0,
        y: (height - h) / 2.0,
        w,
        h,
    };

    let mut shapes = vec![Shape::Rect {
        rect,
        color: [0.06, 0.08, 0.11, settings.metadata_panel_alpha],
    }];

    // Broken tables get a distinct badge strip along the panel top.
    if table.is_broken {
        shapes.push(Shape::Rect {
            rect: Rect {
                x: rect.x,
                y: rect.y,
                w: rect.w,
                h: 6.0,
            },
            color: [0.8, 0.15, 0.15, settings.metadata_panel_alpha.max(0.8)],
        });
    }

    shapes
}

/// The text lines shown in the metadata panel.
pub fn metadata_lines(table: &TableRecord) -> Vec<String> {
    let mut lines = vec![table.title.clone()];

    if !table.manufacturer.is_empty() || !table.year.is_empty() {
        lines.push(format!("{} {}", table.manufacturer, table.year).trim().to_owned());
    }
    if !table.author.is_empty() {
        lines.push(format!("by {}", table.author));
    }

    lines.push(format!(
        "played {} times, {:.0}s total",
        table.play_count, table.play_time_total
    ));

    if table.is_broken {
        lines.push("BROKEN".to_owned());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> TableRecord {
        TableRecord {
            title: "Medieval Madness".into(),
            manufacturer: "Williams".into(),
            year: "1997".into(),
            ..Default::default()
        }
    }

    #[test]
    fn arrow_alpha_stays_in_range() {
        for i in 0..100 {
            let a = arrow_alpha(i as f32 * 0.037);
            assert!((0.2..=1.0).contains(&a), "alpha {} out of range", a);
        }

        // Peak-to-peak within one second.
        assert!((arrow_alpha(0.25) - 1.0).abs() < 1e-3);
        assert!((arrow_alpha(0.75) - 0.2).abs() < 1e-3);
    }

    #[test]
    fn scrollbar_thumb_tracks_navigation() {
        let settings = Settings::default();

        let first = scrollbar(&settings, 0, 10, 1000.0);
        let last = scrollbar(&settings, 9, 10, 1000.0);

        let thumb_x = |shapes: &[Shape]| match &shapes[1] {
            Shape::Rect { rect, .. } => rect.x,
            _ => unreachable!(),
        };

        let length = 1000.0 * settings.scrollbar_length;
        let track_x = (1000.0 - length) / 2.0;

        assert_eq!(thumb_x(&first), track_x);
        assert_eq!(
            thumb_x(&last),
            track_x + length - settings.scrollbar_thumb_width
        );
    }

    #[test]
    fn hidden_widgets_emit_nothing() {
        let settings = Settings {
            show_scrollbar: false,
            show_arrow_hint: false,
            ..Default::default()
        };

        let shapes = build(&settings, &table(), 0, 5, 1000.0, 2000.0, 0.0, false);
        assert_eq!(shapes, vec![]);
    }

    #[test]
    fn broken_table_gets_a_badge() {
        let settings = Settings::default();
        let mut t = table();

        let plain = metadata_panel(&settings, &t, 1000.0, 2000.0);
        t.is_broken = true;
        let badged = metadata_panel(&settings, &t, 1000.0, 2000.0);

        assert_eq!(plain.len() + 1, badged.len());
        assert!(metadata_lines(&t).contains(&"BROKEN".to_owned()));
    }
}
