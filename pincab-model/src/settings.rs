// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One of the four physical cabinet windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Playfield,
    Backglass,
    Dmd,
    Topper,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Playfield, Role::Backglass, Role::Dmd, Role::Topper];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Playfield => "playfield",
            Role::Backglass => "backglass",
            Role::Dmd => "dmd",
            Role::Topper => "topper",
        }
    }

    pub fn from_name(s: &str) -> Option<Role> {
        match s {
            "playfield" => Some(Role::Playfield),
            "backglass" => Some(Role::Backglass),
            "dmd" => Some(Role::Dmd),
            "topper" => Some(Role::Topper),
            _ => None,
        }
    }
}

/// RGBA8 color, persisted as `"r,g,b,a"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    pub fn to_f32(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = s.split(',').map(|p| p.trim().parse::<u8>()).collect();
        match parts.as_slice() {
            [Ok(r), Ok(g), Ok(b), Ok(a)] => Ok(Color::rgba(*r, *g, *b, *a)),
            _ => Err(()),
        }
    }
}

/// The flat settings record. Field semantics (type, default, reload effect)
/// are declared once in [`crate::schema`]; this struct is just the typed
/// storage the schema reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    // [VPX]
    pub vpx_tables_path: String,
    pub vpinball_x_path: String,
    pub vpx_ini_path: String,
    pub vpx_start_args: String,
    pub vpx_end_args: String,

    // [DPISettings]
    pub dpi_scale: f32,
    pub enable_dpi_scaling: bool,

    // [DefaultMedia]
    pub default_playfield_image: String,
    pub default_backglass_image: String,
    pub default_dmd_image: String,
    pub default_wheel_image: String,
    pub default_topper_image: String,
    pub default_playfield_video: String,
    pub default_backglass_video: String,
    pub default_dmd_video: String,
    pub default_topper_video: String,

    // [CustomMedia] -- per-table relative paths, resolved by the scanner.
    pub custom_playfield_image: String,
    pub custom_backglass_image: String,
    pub custom_dmd_image: String,
    pub custom_wheel_image: String,
    pub custom_topper_image: String,
    pub custom_playfield_video: String,
    pub custom_backglass_video: String,
    pub custom_dmd_video: String,
    pub custom_topper_video: String,
    pub table_music: String,
    pub custom_launch_sound: String,

    // [WindowSettings]
    pub video_backend: String,
    pub show_backglass: bool,
    pub show_dmd: bool,
    pub show_topper: bool,
    pub playfield_window_width: i32,
    pub playfield_window_height: i32,
    pub playfield_x: i32,
    pub playfield_y: i32,
    pub backglass_window_width: i32,
    pub backglass_window_height: i32,
    pub backglass_x: i32,
    pub backglass_y: i32,
    pub dmd_window_width: i32,
    pub dmd_window_height: i32,
    pub dmd_x: i32,
    pub dmd_y: i32,
    pub topper_window_width: i32,
    pub topper_window_height: i32,
    pub topper_x: i32,
    pub topper_y: i32,

    // [MediaDimensions]
    pub force_images_only: bool,
    pub use_generated_art: bool,
    pub playfield_media_width: i32,
    pub playfield_media_height: i32,
    pub playfield_media_x: i32,
    pub playfield_media_y: i32,
    pub playfield_rotation: i32,
    pub backglass_media_width: i32,
    pub backglass_media_height: i32,
    pub backglass_media_x: i32,
    pub backglass_media_y: i32,
    pub backglass_rotation: i32,
    pub dmd_media_width: i32,
    pub dmd_media_height: i32,
    pub dmd_media_x: i32,
    pub dmd_media_y: i32,
    pub dmd_rotation: i32,
    pub topper_media_width: i32,
    pub topper_media_height: i32,
    pub topper_media_x: i32,
    pub topper_media_y: i32,
    pub topper_rotation: i32,
    pub wheel_media_width: i32,
    pub wheel_media_height: i32,
    pub wheel_media_x: i32,
    pub wheel_media_y: i32,

    // [TitleDisplay]
    pub show_title: bool,
    pub show_wheel: bool,
    pub title_window: String,
    pub wheel_window: String,
    pub font_path: String,
    pub font_color: Color,
    pub font_bg_color: Color,
    pub font_size: i32,
    pub title_x: i32,
    pub title_y: i32,

    // [TableMetadata]
    pub show_metadata: bool,
    pub metadata_panel_width: f32,
    pub metadata_panel_height: f32,
    pub metadata_panel_alpha: f32,

    // [UIWidgets]
    pub show_arrow_hint: bool,
    pub arrow_hint_width: f32,
    pub arrow_hint_height: f32,
    pub arrow_thickness: f32,
    pub arrow_alpha: f32,
    pub arrow_glow: f32,
    pub arrow_glow_color: Color,
    pub arrow_color_top: Color,
    pub arrow_color_bottom: Color,
    pub show_scrollbar: bool,
    pub scrollbar_width: f32,
    pub scrollbar_thumb_width: f32,
    pub scrollbar_length: f32,
    pub scrollbar_color: Color,
    pub scrollbar_thumb_color: Color,

    // [AudioSettings]
    pub master_vol: f32,
    pub master_mute: bool,
    pub media_audio_vol: f32,
    pub media_audio_mute: bool,
    pub table_music_vol: f32,
    pub table_music_mute: bool,
    pub interface_audio_vol: f32,
    pub interface_audio_mute: bool,
    pub interface_ambience_vol: f32,
    pub interface_ambience_mute: bool,

    // [UISounds]
    pub scroll_normal_sound: String,
    pub scroll_fast_sound: String,
    pub scroll_jump_sound: String,
    pub scroll_random_sound: String,
    pub launch_table_sound: String,
    pub launch_screenshot_sound: String,
    pub panel_toggle_sound: String,
    pub screenshot_take_sound: String,
    pub ambience_sound: String,

    // [Internal]
    pub vpx_sub_cmd: String,
    pub screenshot_wait: i32,
    pub launcher_healthy_exit_codes: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            vpx_tables_path: String::new(),
            vpinball_x_path: String::new(),
            vpx_ini_path: String::new(),
            vpx_start_args: String::new(),
            vpx_end_args: String::new(),

            dpi_scale: 1.0,
            enable_dpi_scaling: true,

            default_playfield_image: "img/default_table.png".into(),
            default_backglass_image: "img/default_backglass.png".into(),
            default_dmd_image: "img/default_dmd.png".into(),
            default_wheel_image: "img/default_wheel.png".into(),
            default_topper_image: "img/default_topper.png".into(),
            default_playfield_video: "img/default_table.mp4".into(),
            default_backglass_video: "img/default_backglass.mp4".into(),
            default_dmd_video: "img/default_dmd.mp4".into(),
            default_topper_video: "img/default_topper.mp4".into(),

            custom_playfield_image: "images/table.png".into(),
            custom_backglass_image: "images/backglass.png".into(),
            custom_dmd_image: "images/dmd.png".into(),
            custom_wheel_image: "images/wheel.png".into(),
            custom_topper_image: "images/topper.png".into(),
            custom_playfield_video: "video/table.mp4".into(),
            custom_backglass_video: "video/backglass.mp4".into(),
            custom_dmd_video: "video/dmd.mp4".into(),
            custom_topper_video: "video/topper.mp4".into(),
            table_music: "audio/music.mp3".into(),
            custom_launch_sound: "audio/launch.mp3".into(),

            video_backend: "vlc".into(),
            show_backglass: true,
            show_dmd: true,
            show_topper: false,
            playfield_window_width: 1080,
            playfield_window_height: 1920,
            playfield_x: -1,
            playfield_y: -1,
            backglass_window_width: 1024,
            backglass_window_height: 768,
            backglass_x: -1,
            backglass_y: -1,
            dmd_window_width: 1024,
            dmd_window_height: 256,
            dmd_x: -1,
            dmd_y: -1,
            topper_window_width: 512,
            topper_window_height: 128,
            topper_x: -1,
            topper_y: -1,

            force_images_only: false,
            use_generated_art: true,
            playfield_media_width: 1080,
            playfield_media_height: 1920,
            playfield_media_x: 0,
            playfield_media_y: 0,
            playfield_rotation: 0,
            backglass_media_width: 1024,
            backglass_media_height: 768,
            backglass_media_x: 0,
            backglass_media_y: 0,
            backglass_rotation: 0,
            dmd_media_width: 1024,
            dmd_media_height: 256,
            dmd_media_x: 0,
            dmd_media_y: 0,
            dmd_rotation: 0,
            topper_media_width: 512,
            topper_media_height: 128,
            topper_media_x: 0,
            topper_media_y: 0,
            topper_rotation: 0,
            wheel_media_width: 350,
            wheel_media_height: 350,
            wheel_media_x: 720,
            wheel_media_y: 1550,

            show_title: true,
            show_wheel: true,
            title_window: "playfield".into(),
            wheel_window: "playfield".into(),
            font_path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".into(),
            font_color: Color::rgba(255, 255, 255, 255),
            font_bg_color: Color::rgba(0, 0, 0, 128),
            font_size: 28,
            title_x: 12,
            title_y: 12,

            show_metadata: false,
            metadata_panel_width: 0.7,
            metadata_panel_height: 0.5,
            metadata_panel_alpha: 0.6,

            show_arrow_hint: true,
            arrow_hint_width: 20.0,
            arrow_hint_height: 100.0,
            arrow_thickness: 4.0,
            arrow_alpha: 0.6,
            arrow_glow: 1.5,
            arrow_glow_color: Color::rgba(200, 200, 200, 255),
            arrow_color_top: Color::rgba(100, 100, 100, 255),
            arrow_color_bottom: Color::rgba(150, 150, 150, 255),
            show_scrollbar: true,
            scrollbar_width: 12.0,
            scrollbar_thumb_width: 15.0,
            scrollbar_length: 0.5,
            scrollbar_color: Color::rgba(50, 50, 50, 200),
            scrollbar_thumb_color: Color::rgba(50, 150, 150, 255),

            master_vol: 100.0,
            master_mute: false,
            media_audio_vol: 60.0,
            media_audio_mute: false,
            table_music_vol: 60.0,
            table_music_mute: false,
            interface_audio_vol: 60.0,
            interface_audio_mute: false,
            interface_ambience_vol: 60.0,
            interface_ambience_mute: false,

            scroll_normal_sound: "snd/scroll_normal.mp3".into(),
            scroll_fast_sound: "snd/scroll_fast.mp3".into(),
            scroll_jump_sound: "snd/scroll_jump.mp3".into(),
            scroll_random_sound: "snd/scroll_random.mp3".into(),
            launch_table_sound: "snd/launch_table.mp3".into(),
            launch_screenshot_sound: "snd/launch_screenshot.mp3".into(),
            panel_toggle_sound: "snd/panel_toggle.mp3".into(),
            screenshot_take_sound: "snd/screenshot_take.mp3".into(),
            ambience_sound: "snd/ambience.mp3".into(),

            vpx_sub_cmd: "-Play".into(),
            screenshot_wait: 4,
            launcher_healthy_exit_codes: "0,130,143".into(),
        }
    }
}

impl Settings {
    /// Clamps out-of-range values back into their documented domains. Applied
    /// after every load so the rest of the system never sees an invalid
    /// record.
    pub fn sanitize(&mut self) {
        if !(0.5..=3.0).contains(&self.dpi_scale) {
            warn!(dpi_scale = self.dpi_scale, "dpi_scale out of range, clamping");
            self.dpi_scale = self.dpi_scale.clamp(0.5, 3.0);
        }

        for rotation in [
            &mut self.playfield_rotation,
            &mut self.backglass_rotation,
            &mut self.dmd_rotation,
            &mut self.topper_rotation,
        ] {
            if !matches!(*rotation, 0 | 90 | 180 | 270) {
                warn!(rotation = *rotation, "invalid rotation, resetting to 0");
                *rotation = 0;
            }
        }

        for vol in [
            &mut self.master_vol,
            &mut self.media_audio_vol,
            &mut self.table_music_vol,
            &mut self.interface_audio_vol,
            &mut self.interface_ambience_vol,
        ] {
            if !(0.0..=100.0).contains(vol) {
                warn!(volume = *vol, "volume out of range, clamping");
                *vol = vol.clamp(0.0, 100.0);
            }
        }

        for window in [&mut self.title_window, &mut self.wheel_window] {
            if Role::from_name(window).is_none() {
                warn!(window = %window, "unknown window role, resetting to playfield");
                *window = "playfield".into();
            }
        }
    }

    /// Font size with the DPI post-processing pass applied. The persisted
    /// value stays raw so that save/load round-trips.
    pub fn effective_font_size(&self) -> f32 {
        if self.enable_dpi_scaling {
            self.font_size as f32 * self.dpi_scale
        } else {
            self.font_size as f32
        }
    }

    pub fn title_window_role(&self) -> Role {
        Role::from_name(&self.title_window).unwrap_or(Role::Playfield)
    }

    pub fn wheel_window_role(&self) -> Role {
        Role::from_name(&self.wheel_window).unwrap_or(Role::Playfield)
    }

    pub fn show_role(&self, role: Role) -> bool {
        match role {
            Role::Playfield => true,
            Role::Backglass => self.show_backglass,
            Role::Dmd => self.show_dmd,
            Role::Topper => self.show_topper,
        }
    }

    pub fn window_rect(&self, role: Role) -> (i32, i32, i32, i32) {
        match role {
            Role::Playfield => (
                self.playfield_x,
                self.playfield_y,
                self.playfield_window_width,
                self.playfield_window_height,
            ),
            Role::Backglass => (
                self.backglass_x,
                self.backglass_y,
                self.backglass_window_width,
                self.backglass_window_height,
            ),
            Role::Dmd => (
                self.dmd_x,
                self.dmd_y,
                self.dmd_window_width,
                self.dmd_window_height,
            ),
            Role::Topper => (
                self.topper_x,
                self.topper_y,
                self.topper_window_width,
                self.topper_window_height,
            ),
        }
    }

    /// `(x, y, w, h, rotation)` of the media rect for a role.
    pub fn media_rect(&self, role: Role) -> (i32, i32, i32, i32, i32) {
        match role {
            Role::Playfield => (
                self.playfield_media_x,
                self.playfield_media_y,
                self.playfield_media_width,
                self.playfield_media_height,
                self.playfield_rotation,
            ),
            Role::Backglass => (
                self.backglass_media_x,
                self.backglass_media_y,
                self.backglass_media_width,
                self.backglass_media_height,
                self.backglass_rotation,
            ),
            Role::Dmd => (
                self.dmd_media_x,
                self.dmd_media_y,
                self.dmd_media_width,
                self.dmd_media_height,
                self.dmd_rotation,
            ),
            Role::Topper => (
                self.topper_media_x,
                self.topper_media_y,
                self.topper_media_width,
                self.topper_media_height,
                self.topper_rotation,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn color_round_trip() {
        let c = Color::rgba(12, 34, 56, 255);
        assert_eq!(c.to_string().parse::<Color>().unwrap(), c);
        assert!("1,2,3".parse::<Color>().is_err());
        assert!("1,2,3,4,5".parse::<Color>().is_err());
        assert!("1,2,3,x".parse::<Color>().is_err());
    }

    #[test]
    fn sanitize_clamps_domains() {
        let mut s = Settings {
            dpi_scale: 9.0,
            playfield_rotation: 45,
            master_vol: 250.0,
            title_window: "marquee".into(),
            ..Default::default()
        };
        s.sanitize();

        assert_eq!(s.dpi_scale, 3.0);
        assert_eq!(s.playfield_rotation, 0);
        assert_eq!(s.master_vol, 100.0);
        assert_eq!(s.title_window, "playfield");
    }

    #[test]
    fn dpi_scaling_only_applies_when_enabled() {
        let mut s = Settings {
            font_size: 20,
            dpi_scale: 2.0,
            enable_dpi_scaling: true,
            ..Default::default()
        };
        assert_eq!(s.effective_font_size(), 40.0);

        s.enable_dpi_scaling = false;
        assert_eq!(s.effective_font_size(), 20.0);
    }
}
