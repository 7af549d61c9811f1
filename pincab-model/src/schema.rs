// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! The settings schema. Every persisted field is declared exactly once in
//! [`struct@SCHEMA`] with its storage section, reload effect and typed
//! accessors; load, save and diff are all driven from this table.

use lazy_static::lazy_static;
use thiserror::Error;

use crate::reload::ReloadType;
use crate::settings::{Color, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Vpx,
    DpiSettings,
    DefaultMedia,
    CustomMedia,
    WindowSettings,
    MediaDimensions,
    TableMetadata,
    UiWidgets,
    TitleDisplay,
    AudioSettings,
    UiSounds,
    Internal,
}

impl Section {
    /// Storage order of the sections in the persisted document. `Keybinds`
    /// is appended separately by the store.
    pub const ORDER: [Section; 12] = [
        Section::Vpx,
        Section::DpiSettings,
        Section::DefaultMedia,
        Section::CustomMedia,
        Section::WindowSettings,
        Section::MediaDimensions,
        Section::TableMetadata,
        Section::UiWidgets,
        Section::TitleDisplay,
        Section::AudioSettings,
        Section::UiSounds,
        Section::Internal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Section::Vpx => "VPX",
            Section::DpiSettings => "DPISettings",
            Section::DefaultMedia => "DefaultMedia",
            Section::CustomMedia => "CustomMedia",
            Section::WindowSettings => "WindowSettings",
            Section::MediaDimensions => "MediaDimensions",
            Section::TableMetadata => "TableMetadata",
            Section::UiWidgets => "UIWidgets",
            Section::TitleDisplay => "TitleDisplay",
            Section::AudioSettings => "AudioSettings",
            Section::UiSounds => "UISounds",
            Section::Internal => "Internal",
        }
    }
}

/// A typed snapshot of one field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i32),
    Float(f32),
    Bool(bool),
    Color(Color),
}

impl FieldValue {
    /// The string representation used in the persisted document.
    pub fn to_persist_string(&self) -> String {
        match self {
            FieldValue::Str(v) => v.clone(),
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Bool(v) => v.to_string(),
            FieldValue::Color(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid value {value:?} for settings key {key}")]
pub struct FieldParseError {
    pub key: &'static str,
    pub value: String,
}

impl FieldParseError {
    fn new(key: &'static str, value: &str) -> Self {
        FieldParseError {
            key,
            value: value.to_owned(),
        }
    }
}

pub struct FieldSpec {
    pub key: &'static str,
    pub section: Section,
    pub reload: ReloadType,
    pub get: fn(&Settings) -> FieldValue,
    pub set: fn(&mut Settings, &str) -> Result<(), FieldParseError>,
}

macro_rules! get_value {
    (str, $f:expr) => {
        FieldValue::Str($f.clone())
    };
    (int, $f:expr) => {
        FieldValue::Int($f)
    };
    (float, $f:expr) => {
        FieldValue::Float($f)
    };
    (bool, $f:expr) => {
        FieldValue::Bool($f)
    };
    (color, $f:expr) => {
        FieldValue::Color($f)
    };
}

macro_rules! set_value {
    (str, $f:expr, $raw:expr, $key:expr) => {{
        $f = $raw.to_owned();
        Ok(())
    }};
    (int, $f:expr, $raw:expr, $key:expr) => {{
        $f = $raw
            .trim()
            .parse::<i32>()
            .map_err(|_| FieldParseError::new($key, $raw))?;
        Ok(())
    }};
    (float, $f:expr, $raw:expr, $key:expr) => {{
        $f = $raw
            .trim()
            .parse::<f32>()
            .map_err(|_| FieldParseError::new($key, $raw))?;
        Ok(())
    }};
    (bool, $f:expr, $raw:expr, $key:expr) => {{
        $f = $raw
            .trim()
            .parse::<bool>()
            .map_err(|_| FieldParseError::new($key, $raw))?;
        Ok(())
    }};
    (color, $f:expr, $raw:expr, $key:expr) => {{
        $f = $raw
            .trim()
            .parse::<Color>()
            .map_err(|_| FieldParseError::new($key, $raw))?;
        Ok(())
    }};
}

macro_rules! schema {
    ($($section:ident / $key:literal => $field:ident : $kind:ident, $reload:ident;)+) => {
        vec![$(
            FieldSpec {
                key: $key,
                section: Section::$section,
                reload: ReloadType::$reload,
                get: |s| get_value!($kind, s.$field),
                set: |s, raw| set_value!($kind, s.$field, raw, $key),
            },
        )+]
    };
}

lazy_static! {
    pub static ref SCHEMA: Vec<FieldSpec> = build_schema();
}

pub fn field(key: &str) -> Option<&'static FieldSpec> {
    SCHEMA.iter().find(|f| f.key == key)
}

fn build_schema() -> Vec<FieldSpec> {
    schema![
        Vpx / "VPXTablesPath" => vpx_tables_path: str, Tables;
        Vpx / "VPinballXPath" => vpinball_x_path: str, None;
        Vpx / "VPXIniPath" => vpx_ini_path: str, None;
        Vpx / "StartArgs" => vpx_start_args: str, None;
        Vpx / "EndArgs" => vpx_end_args: str, None;

        DpiSettings / "DpiScale" => dpi_scale: float, Font;
        DpiSettings / "EnableDpiScaling" => enable_dpi_scaling: bool, Font;

        DefaultMedia / "DefaultPlayfieldImage" => default_playfield_image: str, Tables;
        DefaultMedia / "DefaultBackglassImage" => default_backglass_image: str, Tables;
        DefaultMedia / "DefaultDmdImage" => default_dmd_image: str, Tables;
        DefaultMedia / "DefaultWheelImage" => default_wheel_image: str, Tables;
        DefaultMedia / "DefaultTopperImage" => default_topper_image: str, Tables;
        DefaultMedia / "DefaultPlayfieldVideo" => default_playfield_video: str, Tables;
        DefaultMedia / "DefaultBackglassVideo" => default_backglass_video: str, Tables;
        DefaultMedia / "DefaultDmdVideo" => default_dmd_video: str, Tables;
        DefaultMedia / "DefaultTopperVideo" => default_topper_video: str, Tables;

        CustomMedia / "PlayfieldImage" => custom_playfield_image: str, Tables;
        CustomMedia / "BackglassImage" => custom_backglass_image: str, Tables;
        CustomMedia / "DmdImage" => custom_dmd_image: str, Tables;
        CustomMedia / "WheelImage" => custom_wheel_image: str, Tables;
        CustomMedia / "TopperImage" => custom_topper_image: str, Tables;
        CustomMedia / "PlayfieldVideo" => custom_playfield_video: str, Tables;
        CustomMedia / "BackglassVideo" => custom_backglass_video: str, Tables;
        CustomMedia / "DmdVideo" => custom_dmd_video: str, Tables;
        CustomMedia / "TopperVideo" => custom_topper_video: str, Tables;
        CustomMedia / "TableMusic" => table_music: str, Tables;
        CustomMedia / "CustomLaunchSound" => custom_launch_sound: str, Tables;

        WindowSettings / "VideoBackend" => video_backend: str, Assets;
        WindowSettings / "ShowBackglass" => show_backglass: bool, Windows;
        WindowSettings / "ShowDMD" => show_dmd: bool, Windows;
        WindowSettings / "ShowTopper" => show_topper: bool, Windows;
        WindowSettings / "PlayfieldWidth" => playfield_window_width: int, Windows;
        WindowSettings / "PlayfieldHeight" => playfield_window_height: int, Windows;
        WindowSettings / "PlayfieldX" => playfield_x: int, Windows;
        WindowSettings / "PlayfieldY" => playfield_y: int, Windows;
        WindowSettings / "BackglassWidth" => backglass_window_width: int, Windows;
        WindowSettings / "BackglassHeight" => backglass_window_height: int, Windows;
        WindowSettings / "BackglassX" => backglass_x: int, Windows;
        WindowSettings / "BackglassY" => backglass_y: int, Windows;
        WindowSettings / "DMDWidth" => dmd_window_width: int, Windows;
        WindowSettings / "DMDHeight" => dmd_window_height: int, Windows;
        WindowSettings / "DMDX" => dmd_x: int, Windows;
        WindowSettings / "DMDY" => dmd_y: int, Windows;
        WindowSettings / "TopperWidth" => topper_window_width: int, Windows;
        WindowSettings / "TopperHeight" => topper_window_height: int, Windows;
        WindowSettings / "TopperX" => topper_x: int, Windows;
        WindowSettings / "TopperY" => topper_y: int, Windows;

        MediaDimensions / "ForceImagesOnly" => force_images_only: bool, Assets;
        MediaDimensions / "UseGeneratedArt" => use_generated_art: bool, Assets;
        MediaDimensions / "PlayfieldMediaWidth" => playfield_media_width: int, Assets;
        MediaDimensions / "PlayfieldMediaHeight" => playfield_media_height: int, Assets;
        MediaDimensions / "PlayfieldMediaX" => playfield_media_x: int, Assets;
        MediaDimensions / "PlayfieldMediaY" => playfield_media_y: int, Assets;
        MediaDimensions / "PlayfieldRotation" => playfield_rotation: int, Assets;
        MediaDimensions / "BackglassMediaWidth" => backglass_media_width: int, Assets;
        MediaDimensions / "BackglassMediaHeight" => backglass_media_height: int, Assets;
        MediaDimensions / "BackglassMediaX" => backglass_media_x: int, Assets;
        MediaDimensions / "BackglassMediaY" => backglass_media_y: int, Assets;
        MediaDimensions / "BackglassRotation" => backglass_rotation: int, Assets;
        MediaDimensions / "DMDMediaWidth" => dmd_media_width: int, Assets;
        MediaDimensions / "DMDMediaHeight" => dmd_media_height: int, Assets;
        MediaDimensions / "DMDMediaX" => dmd_media_x: int, Assets;
        MediaDimensions / "DMDMediaY" => dmd_media_y: int, Assets;
        MediaDimensions / "DMDRotation" => dmd_rotation: int, Assets;
        MediaDimensions / "TopperMediaWidth" => topper_media_width: int, Assets;
        MediaDimensions / "TopperMediaHeight" => topper_media_height: int, Assets;
        MediaDimensions / "TopperMediaX" => topper_media_x: int, Assets;
        MediaDimensions / "TopperMediaY" => topper_media_y: int, Assets;
        MediaDimensions / "TopperRotation" => topper_rotation: int, Assets;
        MediaDimensions / "WheelMediaWidth" => wheel_media_width: int, Assets;
        MediaDimensions / "WheelMediaHeight" => wheel_media_height: int, Assets;
        MediaDimensions / "WheelMediaX" => wheel_media_x: int, Assets;
        MediaDimensions / "WheelMediaY" => wheel_media_y: int, Assets;

        TitleDisplay / "ShowTitle" => show_title: bool, Assets;
        TitleDisplay / "ShowWheel" => show_wheel: bool, Assets;
        TitleDisplay / "TitleWindow" => title_window: str, Assets;
        TitleDisplay / "WheelWindow" => wheel_window: str, Assets;
        TitleDisplay / "FontPath" => font_path: str, Font;
        TitleDisplay / "FontColor" => font_color: color, Font;
        TitleDisplay / "FontBgColor" => font_bg_color: color, Font;
        TitleDisplay / "FontSize" => font_size: int, Font;
        TitleDisplay / "TitleX" => title_x: int, Title;
        TitleDisplay / "TitleY" => title_y: int, Title;

        TableMetadata / "ShowMetadata" => show_metadata: bool, Overlay;
        TableMetadata / "MetadataPanelWidth" => metadata_panel_width: float, Overlay;
        TableMetadata / "MetadataPanelHeight" => metadata_panel_height: float, Overlay;
        TableMetadata / "MetadataPanelAlpha" => metadata_panel_alpha: float, Overlay;

        UiWidgets / "ShowArrowHint" => show_arrow_hint: bool, Overlay;
        UiWidgets / "ArrowHintWidth" => arrow_hint_width: float, Overlay;
        UiWidgets / "ArrowHintHeight" => arrow_hint_height: float, Overlay;
        UiWidgets / "ArrowThickness" => arrow_thickness: float, Overlay;
        UiWidgets / "ArrowAlpha" => arrow_alpha: float, Overlay;
        UiWidgets / "ArrowGlow" => arrow_glow: float, Overlay;
        UiWidgets / "ArrowGlowColor" => arrow_glow_color: color, Overlay;
        UiWidgets / "ArrowColorTop" => arrow_color_top: color, Overlay;
        UiWidgets / "ArrowColorBottom" => arrow_color_bottom: color, Overlay;
        UiWidgets / "ShowScrollbar" => show_scrollbar: bool, Overlay;
        UiWidgets / "ScrollbarWidth" => scrollbar_width: float, Overlay;
        UiWidgets / "ScrollbarThumbWidth" => scrollbar_thumb_width: float, Overlay;
        UiWidgets / "ScrollbarLength" => scrollbar_length: float, Overlay;
        UiWidgets / "ScrollbarColor" => scrollbar_color: color, Overlay;
        UiWidgets / "ScrollbarThumbColor" => scrollbar_thumb_color: color, Overlay;

        AudioSettings / "MasterVol" => master_vol: float, Audio;
        AudioSettings / "MasterMute" => master_mute: bool, Audio;
        AudioSettings / "MediaAudioVol" => media_audio_vol: float, Audio;
        AudioSettings / "MediaAudioMute" => media_audio_mute: bool, Audio;
        AudioSettings / "TableMusicVol" => table_music_vol: float, Audio;
        AudioSettings / "TableMusicMute" => table_music_mute: bool, Audio;
        AudioSettings / "InterfaceAudioVol" => interface_audio_vol: float, Audio;
        AudioSettings / "InterfaceAudioMute" => interface_audio_mute: bool, Audio;
        AudioSettings / "InterfaceAmbienceVol" => interface_ambience_vol: float, Audio;
        AudioSettings / "InterfaceAmbienceMute" => interface_ambience_mute: bool, Audio;

        UiSounds / "ScrollNormalSound" => scroll_normal_sound: str, Audio;
        UiSounds / "ScrollFastSound" => scroll_fast_sound: str, Audio;
        UiSounds / "ScrollJumpSound" => scroll_jump_sound: str, Audio;
        UiSounds / "ScrollRandomSound" => scroll_random_sound: str, Audio;
        UiSounds / "LaunchTableSound" => launch_table_sound: str, Audio;
        UiSounds / "LaunchScreenshotSound" => launch_screenshot_sound: str, Audio;
        UiSounds / "PanelToggleSound" => panel_toggle_sound: str, Audio;
        UiSounds / "ScreenshotTakeSound" => screenshot_take_sound: str, Audio;
        UiSounds / "AmbienceSound" => ambience_sound: str, Audio;

        Internal / "SubCmd" => vpx_sub_cmd: str, None;
        Internal / "ScreenshotWait" => screenshot_wait: int, None;
        Internal / "LauncherHealthyExitCodes" => launcher_healthy_exit_codes: str, None;
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::ReloadSet;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let mut seen = HashSet::new();
        for f in SCHEMA.iter() {
            assert!(seen.insert(f.key), "duplicate schema key {}", f.key);
        }
        assert_eq!(SCHEMA.len(), 124);
    }

    #[test]
    fn every_field_round_trips_through_its_string_form() {
        let reference = Settings::default();
        let mut rebuilt = Settings::default();

        for f in SCHEMA.iter() {
            let persisted = (f.get)(&reference).to_persist_string();
            (f.set)(&mut rebuilt, &persisted).expect(f.key);
            assert_eq!((f.get)(&rebuilt), (f.get)(&reference), "{}", f.key);
        }
        assert_eq!(rebuilt, reference);
    }

    #[test]
    fn float_string_form_round_trips_precisely() {
        let mut s = Settings {
            metadata_panel_alpha: 0.1234567,
            ..Default::default()
        };
        let f = field("MetadataPanelAlpha").unwrap();
        let persisted = (f.get)(&s).to_persist_string();
        s.metadata_panel_alpha = 0.0;
        (f.set)(&mut s, &persisted).unwrap();
        assert_eq!(s.metadata_panel_alpha, 0.1234567);
    }

    #[test]
    fn parse_failure_reports_the_key() {
        let mut s = Settings::default();
        let f = field("PlayfieldWidth").unwrap();
        let err = (f.set)(&mut s, "wide").unwrap_err();
        assert_eq!(err.key, "PlayfieldWidth");
    }

    #[test]
    fn diffing_a_mutation_yields_its_reload_effect() {
        let base = Settings::default();
        let mut changed = base.clone();
        changed.show_dmd = false;
        changed.master_vol = 40.0;

        let mut effects = ReloadSet::default();
        for f in SCHEMA.iter() {
            if (f.get)(&base) != (f.get)(&changed) {
                effects.insert(f.reload);
            }
        }

        assert!(effects.contains(ReloadType::Windows));
        assert!(effects.contains(ReloadType::Audio));
        assert!(!effects.contains(ReloadType::Assets));
    }
}
