// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time;

use anyhow::Context as _;
use pincab_model::Settings;
use rand::Rng;
use rodio::source::Source;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, error, info, warn};

/// What the music channel is currently carrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicKind {
    None,
    Ambience,
    Table,
    Launch,
}

/// The short UI effect sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiSound {
    ScrollNormal,
    ScrollFast,
    ScrollJump,
    ScrollRandom,
    LaunchTable,
    LaunchScreenshot,
    PanelToggle,
    ScreenshotTake,
}

impl UiSound {
    pub const ALL: [UiSound; 8] = [
        UiSound::ScrollNormal,
        UiSound::ScrollFast,
        UiSound::ScrollJump,
        UiSound::ScrollRandom,
        UiSound::LaunchTable,
        UiSound::LaunchScreenshot,
        UiSound::PanelToggle,
        UiSound::ScreenshotTake,
    ];

    pub fn path(&self, settings: &Settings) -> String {
        match self {
            UiSound::ScrollNormal => settings.scroll_normal_sound.clone(),
            UiSound::ScrollFast => settings.scroll_fast_sound.clone(),
            UiSound::ScrollJump => settings.scroll_jump_sound.clone(),
            UiSound::ScrollRandom => settings.scroll_random_sound.clone(),
            UiSound::LaunchTable => settings.launch_table_sound.clone(),
            UiSound::LaunchScreenshot => settings.launch_screenshot_sound.clone(),
            UiSound::PanelToggle => settings.panel_toggle_sound.clone(),
            UiSound::ScreenshotTake => settings.screenshot_take_sound.clone(),
        }
    }
}

/// Effective channel gain: master and channel combine multiplicatively, and
/// either mute silences the channel outright.
pub fn effective_volume(
    master_vol: f32,
    master_mute: bool,
    channel_vol: f32,
    channel_mute: bool,
) -> f32 {
    if master_mute || channel_mute {
        return 0.0;
    }

    (master_vol / 100.0) * (channel_vol / 100.0)
}

/// C5: UI effect sounds, ambience, per-table music and the launch jingle,
/// over one audio output device.
pub struct SoundManager {
    // Dropping the stream kills every sink, so it rides along unused.
    _stream: OutputStream,
    handle: OutputStreamHandle,

    chunks: HashMap<UiSound, Arc<[u8]>>,
    chunk_paths: HashMap<UiSound, String>,
    music_bytes: HashMap<String, Arc<[u8]>>,

    ui_sinks: Vec<Sink>,
    music: Option<Sink>,
    kind: MusicKind,

    settings: AudioSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
struct AudioSnapshot {
    master_vol: f32,
    master_mute: bool,
    table_music_vol: f32,
    table_music_mute: bool,
    interface_audio_vol: f32,
    interface_audio_mute: bool,
    interface_ambience_vol: f32,
    interface_ambience_mute: bool,
    ambience_sound: String,
}

impl AudioSnapshot {
    fn of(settings: &Settings) -> Self {
        AudioSnapshot {
            master_vol: settings.master_vol,
            master_mute: settings.master_mute,
            table_music_vol: settings.table_music_vol,
            table_music_mute: settings.table_music_mute,
            interface_audio_vol: settings.interface_audio_vol,
            interface_audio_mute: settings.interface_audio_mute,
            interface_ambience_vol: settings.interface_ambience_vol,
            interface_ambience_mute: settings.interface_ambience_mute,
            ambience_sound: settings.ambience_sound.clone(),
        }
    }
}

impl SoundManager {
    /// Opens the default output device. Failure here is fatal at startup;
    /// afterwards individual playback failures only log.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().context("unable to open audio output device")?;

        info!("audio output device ready");

        let mut this = SoundManager {
            _stream: stream,
            handle,
            chunks: HashMap::new(),
            chunk_paths: HashMap::new(),
            music_bytes: HashMap::new(),
            ui_sinks: Vec::new(),
            music: None,
            kind: MusicKind::None,
            settings: AudioSnapshot::of(settings),
        };
        this.reload_chunks(settings);

        Ok(this)
    }

    pub fn music_kind(&self) -> MusicKind {
        self.kind
    }

    fn reload_chunks(&mut self, settings: &Settings) {
        self.chunks.clear();
        self.chunk_paths.clear();

        for sound in UiSound::ALL {
            let path = sound.path(settings);
            self.chunk_paths.insert(sound, path.clone());
            if path.is_empty() {
                continue;
            }

            match std::fs::read(&path) {
                Ok(bytes) => {
                    self.chunks.insert(sound, bytes.into());
                }
                Err(e) => warn!(path = %path, error = %e, "failed to load UI sound"),
            }
        }

        debug!(count = self.chunks.len(), "loaded UI sound chunks");
    }

    fn music_data(&mut self, path: &str) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.music_bytes.get(path) {
            return Some(bytes.clone());
        }

        match std::fs::read(path) {
            Ok(bytes) => {
                let bytes: Arc<[u8]> = bytes.into();
                self.music_bytes.insert(path.to_owned(), bytes.clone());
                Some(bytes)
            }
            Err(e) => {
                info!(path, error = %e, "music file unavailable");
                None
            }
        }
    }

    fn ui_volume(&self) -> f32 {
        effective_volume(
            self.settings.master_vol,
            self.settings.master_mute,
            self.settings.interface_audio_vol,
            self.settings.interface_audio_mute,
        )
    }

    fn music_volume(&self, kind: MusicKind) -> f32 {
        match kind {
            MusicKind::Ambience => effective_volume(
                self.settings.master_vol,
                self.settings.master_mute,
                self.settings.interface_ambience_vol,
                self.settings.interface_ambience_mute,
            ),
            MusicKind::Table => effective_volume(
                self.settings.master_vol,
                self.settings.master_mute,
                self.settings.table_music_vol,
                self.settings.table_music_mute,
            ),
            // The launch jingle shares the UI effects channel.
            MusicKind::Launch => self.ui_volume(),
            MusicKind::None => 0.0,
        }
    }

    /// Plays a short UI effect on a free channel.
    pub fn play_ui(&mut self, sound: UiSound) {
        self.ui_sinks.retain(|s| !s.empty());

        let Some(bytes) = self.chunks.get(&sound).cloned() else {
            return;
        };

        let decoder = match Decoder::new(Cursor::new(bytes)) {
            Ok(d) => d,
            Err(e) => {
                error!(sound = ?sound, error = %e, "failed to decode UI sound");
                return;
            }
        };

        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.set_volume(self.ui_volume());
                sink.append(decoder);
                self.ui_sinks.push(sink);
            }
            Err(e) => error!(error = %e, "failed to open UI sound channel"),
        }
    }

    /// Starts looping ambience, seeded at a random playback position so
    /// every session doesn't open on the same intro.
    pub fn play_ambience(&mut self, path: &str) {
        self.stop_music();

        if path.is_empty() || !Path::new(path).is_file() {
            info!(path, "no ambience music to play");
            return;
        }

        let Some(bytes) = self.music_data(path) else {
            return;
        };

        let decoder = match Decoder::new(Cursor::new(bytes)) {
            Ok(d) => d,
            Err(e) => {
                error!(path, error = %e, "failed to decode ambience music");
                return;
            }
        };

        let duration = decoder.total_duration();

        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.set_volume(self.music_volume(MusicKind::Ambience));
                sink.append(decoder.repeat_infinite());

                if let Some(duration) = duration.filter(|d| !d.is_zero()) {
                    let position = rand::thread_rng().gen_range(0.0..duration.as_secs_f64());
                    if let Err(e) = sink.try_seek(time::Duration::from_secs_f64(position)) {
                        debug!(error = %e, "ambience seek unsupported, starting from zero");
                    }
                }

                self.music = Some(sink);
                self.kind = MusicKind::Ambience;
                debug!(path, "playing ambience");
            }
            Err(e) => error!(error = %e, "failed to open music channel"),
        }
    }

    /// Plays a table's music, looping from the start. An empty or missing
    /// path falls back to ambience.
    pub fn play_table_music(&mut self, path: &str) {
        self.stop_music();

        if path.is_empty() || !Path::new(path).is_file() {
            let ambience = self.settings.ambience_sound.clone();
            self.play_ambience(&ambience);
            return;
        }

        let Some(bytes) = self.music_data(path) else {
            return;
        };

        let decoder = match Decoder::new(Cursor::new(bytes)) {
            Ok(d) => d,
            Err(e) => {
                error!(path, error = %e, "failed to decode table music");
                return;
            }
        };

        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.set_volume(self.music_volume(MusicKind::Table));
                sink.append(decoder.repeat_infinite());
                self.music = Some(sink);
                self.kind = MusicKind::Table;
                debug!(path, "playing table music");
            }
            Err(e) => error!(error = %e, "failed to open music channel"),
        }
    }

    /// Plays a table's custom launch audio once.
    pub fn play_custom_launch(&mut self, path: &str) {
        self.stop_music();

        let Some(bytes) = self.music_data(path) else {
            return;
        };

        let decoder = match Decoder::new(Cursor::new(bytes)) {
            Ok(d) => d,
            Err(e) => {
                error!(path, error = %e, "failed to decode launch audio");
                return;
            }
        };

        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.set_volume(self.music_volume(MusicKind::Launch));
                sink.append(decoder);
                self.music = Some(sink);
                self.kind = MusicKind::Launch;
            }
            Err(e) => error!(error = %e, "failed to open music channel"),
        }
    }

    pub fn stop_music(&mut self) {
        if let Some(sink) = self.music.take() {
            sink.stop();
        }
        self.kind = MusicKind::None;
    }

    /// Re-applies channel volumes to whatever is currently audible.
    pub fn apply_audio_settings(&mut self, settings: &Settings) {
        self.settings = AudioSnapshot::of(settings);

        let ui_volume = self.ui_volume();
        for sink in &self.ui_sinks {
            sink.set_volume(ui_volume);
        }

        if let Some(music) = &self.music {
            music.set_volume(self.music_volume(self.kind));
        }
    }

    /// Applies a settings change: reloads UI chunks when any path changed,
    /// restarts ambience when its path changed while playing, and always
    /// re-applies volumes.
    pub fn update_settings(&mut self, settings: &Settings) {
        let chunk_paths_changed = UiSound::ALL
            .iter()
            .any(|s| self.chunk_paths.get(s) != Some(&s.path(settings)));

        let old_ambience = self.settings.ambience_sound.clone();
        self.apply_audio_settings(settings);

        if chunk_paths_changed {
            self.reload_chunks(settings);
        }

        if old_ambience != settings.ambience_sound && self.kind == MusicKind::Ambience {
            let ambience = settings.ambience_sound.clone();
            self.play_ambience(&ambience);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn effective_volume_is_multiplicative() {
        assert_eq!(effective_volume(100.0, false, 60.0, false), 0.6);
        assert_eq!(effective_volume(50.0, false, 50.0, false), 0.25);
    }

    #[test]
    fn either_mute_silences() {
        assert_eq!(effective_volume(100.0, true, 100.0, false), 0.0);
        assert_eq!(effective_volume(100.0, false, 100.0, true), 0.0);
        assert_eq!(effective_volume(0.0, false, 100.0, false), 0.0);
    }

    #[test]
    fn ui_sound_paths_come_from_settings() {
        let settings = Settings {
            scroll_fast_sound: "/tmp/fast.mp3".into(),
            ..Default::default()
        };
        assert_eq!(UiSound::ScrollFast.path(&settings), "/tmp/fast.mp3");
    }
}
