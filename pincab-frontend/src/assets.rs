// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::path::Path;
use std::rc::Rc;

use pincab_model::{Role, Settings, TableRecord};
use tracing::{debug, info, warn};

use crate::gfx::{GfxContext, Texture};
use crate::sound::SoundManager;
use crate::texture_cache::TextureCache;
use crate::title;
use crate::video::{
    self, GeneratedArtPlayer, PlayerCache, VideoBackend, VideoPlayer, MAX_VIDEO_CACHE,
};
use crate::windows::WindowSet;

/// The per-role holder of whatever is currently on screen. Textures are
/// borrows from the texture cache; the video player is owned while active
/// and handed back to the player cache on table change.
#[derive(Default)]
pub struct ActiveSlot {
    pub texture: Option<Rc<Texture>>,
    pub wheel_texture: Option<Rc<Texture>>,
    pub title_texture: Option<Texture>,
    pub video_player: Option<Box<dyn VideoPlayer>>,

    pub current_image_path: String,
    pub current_wheel_path: String,
    pub current_video_path: String,
    current_video_key: String,
    pub current_media_w: u32,
    pub current_media_h: u32,
}

impl ActiveSlot {
    fn clear(&mut self) {
        self.texture = None;
        self.wheel_texture = None;
        self.title_texture = None;
        self.video_player = None;
        self.current_image_path.clear();
        self.current_wheel_path.clear();
        self.current_video_path.clear();
        self.current_video_key.clear();
        self.current_media_w = 0;
        self.current_media_h = 0;
    }
}

/// The settings subset whose change invalidates loaded assets. Navigating
/// back to the same table with this subset unchanged must not touch the
/// caches at all.
#[derive(Debug, Clone, PartialEq)]
struct AssetSubset {
    force_images_only: bool,
    use_generated_art: bool,
    video_backend: String,
    show_backglass: bool,
    show_dmd: bool,
    show_topper: bool,
    show_title: bool,
    show_wheel: bool,
    title_window: String,
    wheel_window: String,
}

impl AssetSubset {
    fn of(settings: &Settings) -> Self {
        AssetSubset {
            force_images_only: settings.force_images_only,
            use_generated_art: settings.use_generated_art,
            video_backend: settings.video_backend.clone(),
            show_backglass: settings.show_backglass,
            show_dmd: settings.show_dmd,
            show_topper: settings.show_topper,
            show_title: settings.show_title,
            show_wheel: settings.show_wheel,
            title_window: settings.title_window.clone(),
            wheel_window: settings.wheel_window.clone(),
        }
    }
}

/// C3: owns the four active slots and drives both caches.
pub struct AssetManager {
    slots: [ActiveSlot; 4],
    pub textures: TextureCache,
    pub players: PlayerCache,
    font: Option<fontdue::Font>,

    last_index: Option<usize>,
    last_subset: Option<AssetSubset>,
}

impl AssetManager {
    pub fn new(font: Option<fontdue::Font>) -> Self {
        AssetManager {
            slots: Default::default(),
            textures: TextureCache::new(),
            players: PlayerCache::new(MAX_VIDEO_CACHE),
            font,
            last_index: None,
            last_subset: None,
        }
    }

    pub fn slot(&self, role: Role) -> &ActiveSlot {
        &self.slots[slot_index(role)]
    }

    pub fn slot_mut(&mut self, role: Role) -> &mut ActiveSlot {
        &mut self.slots[slot_index(role)]
    }

    pub fn set_font(&mut self, font: Option<fontdue::Font>) {
        self.font = font;
    }

    /// Loads the assets for a table. On repeat calls with the same index and
    /// an unchanged relevant-settings subset this only resumes paused
    /// players.
    pub fn load_table(
        &mut self,
        gfx: &GfxContext,
        windows: &WindowSet,
        settings: &Settings,
        tables: &[TableRecord],
        index: usize,
        sound: &mut SoundManager,
    ) {
        if tables.is_empty() {
            debug!("tables not loaded yet, skipping asset load");
            return;
        }
        let Some(table) = tables.get(index) else {
            warn!(index, count = tables.len(), "invalid table index");
            return;
        };

        let subset = AssetSubset::of(settings);

        // Fast path: same table, same relevant settings. Resume playback and
        // leave the caches untouched.
        if self.last_index == Some(index) && self.last_subset.as_ref() == Some(&subset) {
            for slot in &mut self.slots {
                if let Some(player) = &mut slot.video_player {
                    if !player.is_playing() {
                        player.play();
                    }
                }
            }
            info!(table = %table.title, "table already loaded, resumed playback");
            return;
        }

        let start = std::time::Instant::now();
        let generation = windows.generation;

        // Stop everything before any player changes hands.
        self.stop_all_players();

        // Cache the previous table's players (or retire them when no cache
        // key applies).
        for role in Role::ALL {
            let slot = &mut self.slots[slot_index(role)];
            if let Some(player) = slot.video_player.take() {
                if !slot.current_video_key.is_empty()
                    && slot.current_media_w > 0
                    && slot.current_media_h > 0
                {
                    let key = slot.current_video_key.clone();
                    self.players.put(
                        &key,
                        generation,
                        slot.current_media_w,
                        slot.current_media_h,
                        player,
                    );
                } else {
                    self.players.retire(player);
                }
            }

            slot.clear();
        }

        // With the four slots quiesced and handed off, retired players can
        // be destroyed without racing a frame.
        self.players.drain_discard();

        self.last_index = Some(index);
        self.last_subset = Some(subset);

        let backend = VideoBackend::parse(&settings.video_backend);

        for role in Role::ALL {
            if !settings.show_role(role) || windows.get(role).is_none() {
                debug!(role = role.name(), "skipping hidden role");
                continue;
            }

            self.load_role(gfx, settings, table, role, backend, generation);
        }

        self.apply_audio_settings(settings);
        sound.play_table_music(&table.music);

        info!(
            table = %table.title,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded table assets"
        );
    }

    fn load_role(
        &mut self,
        gfx: &GfxContext,
        settings: &Settings,
        table: &TableRecord,
        role: Role,
        backend: VideoBackend,
        generation: u64,
    ) {
        let (image_path, video_path) = table_media(table, role);
        let (_, _, media_w, media_h, _) = settings.media_rect(role);
        let media_w = media_w.max(0) as u32;
        let media_h = media_h.max(0) as u32;

        // Title text renders fresh each load; its content depends on font
        // and settings, not just a path, so it bypasses the texture cache.
        if settings.show_title && settings.title_window_role() == role {
            let text = if table.title.is_empty() {
                "Unknown Title"
            } else {
                table.title.as_str()
            };
            self.slots[slot_index(role)].title_texture = self.font.as_ref().and_then(|font| {
                title::render_text(
                    gfx,
                    font,
                    text,
                    settings.effective_font_size(),
                    settings.font_color,
                )
            });
        }

        if settings.show_wheel
            && settings.wheel_window_role() == role
            && !table.wheel_image.is_empty()
        {
            let wheel = self.textures.get(gfx, &table.wheel_image);
            let slot = &mut self.slots[slot_index(role)];
            if wheel.is_some() {
                slot.current_wheel_path = table.wheel_image.clone();
            }
            slot.wheel_texture = wheel;
        }

        // Video takes precedence over the still image.
        let mut video_bound = false;
        if !settings.force_images_only
            && !video_path.is_empty()
            && Path::new(&video_path).is_file()
            && media_w > 0
            && media_h > 0
        {
            let key = video::cache_key(backend.name(), role, &video_path, media_w, media_h);

            let player = match self.players.get(&key, generation, media_w, media_h) {
                Some(player) => Some(player),
                None => video::create_player(backend, gfx, &video_path, media_w, media_h),
            };

            if let Some(mut player) = player {
                player.play();
                let slot = &mut self.slots[slot_index(role)];
                slot.video_player = Some(player);
                slot.current_video_path = video_path.clone();
                slot.current_video_key = key;
                slot.current_media_w = media_w;
                slot.current_media_h = media_h;
                video_bound = true;
            }
        }

        if !video_bound && !image_path.is_empty() && Path::new(&image_path).is_file() {
            let texture = self.textures.get(gfx, &image_path);
            let slot = &mut self.slots[slot_index(role)];
            if texture.is_some() {
                slot.current_image_path = image_path.clone();
            }
            slot.texture = texture;
        }

        // Still nothing? Synthesise placeholder art. The generated player is
        // cacheable like any other, keyed by a sentinel.
        let empty = {
            let slot = &self.slots[slot_index(role)];
            slot.video_player.is_none() && slot.texture.is_none()
        };
        if empty && settings.use_generated_art && media_w > 0 && media_h > 0 {
            let key = video::cache_key("generated", role, &table.title, media_w, media_h);

            let mut player = match self.players.get(&key, generation, media_w, media_h) {
                Some(player) => player,
                None => Box::new(GeneratedArtPlayer::new(
                    gfx,
                    self.font.as_ref(),
                    role,
                    table,
                    media_w,
                    media_h,
                )),
            };

            player.play();
            let slot = &mut self.slots[slot_index(role)];
            slot.video_player = Some(player);
            slot.current_video_path = table.title.clone();
            slot.current_video_key = key;
            slot.current_media_w = media_w;
            slot.current_media_h = media_h;
        }
    }

    /// Regenerates the title textures, after a font or title-position
    /// change.
    pub fn reload_title_textures(
        &mut self,
        gfx: &GfxContext,
        settings: &Settings,
        table: Option<&TableRecord>,
    ) {
        for role in Role::ALL {
            self.slots[slot_index(role)].title_texture = None;
        }

        let Some(table) = table else {
            return;
        };

        if !settings.show_title {
            return;
        }

        let role = settings.title_window_role();
        let text = if table.title.is_empty() {
            "Unknown Title"
        } else {
            table.title.as_str()
        };

        self.slots[slot_index(role)].title_texture = self.font.as_ref().and_then(|font| {
            title::render_text(
                gfx,
                font,
                text,
                settings.effective_font_size(),
                settings.font_color,
            )
        });
    }

    pub fn stop_all_players(&mut self) {
        for slot in &mut self.slots {
            if let Some(player) = &mut slot.video_player {
                player.stop();
            }
        }
    }

    pub fn resume_all_players(&mut self) {
        for slot in &mut self.slots {
            if let Some(player) = &mut slot.video_player {
                player.play();
            }
        }
    }

    /// Applies media-channel volume and mute to the active players.
    pub fn apply_audio_settings(&mut self, settings: &Settings) {
        let volume = crate::sound::effective_volume(
            settings.master_vol,
            settings.master_mute,
            settings.media_audio_vol,
            settings.media_audio_mute,
        );
        let mute = settings.master_mute || settings.media_audio_mute;

        for slot in &mut self.slots {
            if let Some(player) = &mut slot.video_player {
                player.set_volume(volume * 100.0);
                player.set_mute(mute);
            }
        }
    }

    /// Invalidates everything bound to the old renderers. Called after a
    /// `Windows` reload recreated them.
    pub fn handle_windows_recreated(&mut self) {
        self.stop_all_players();
        for slot in &mut self.slots {
            if let Some(player) = slot.video_player.take() {
                self.players.retire(player);
            }
            slot.clear();
        }
        self.players.clear_all();
        self.textures.clear();
        self.last_index = None;
        self.last_subset = None;
    }

    /// Stops and caches the active players, then tears the cache down.
    /// Called at shutdown.
    pub fn cleanup_video_players(&mut self) {
        self.stop_all_players();
        for slot in &mut self.slots {
            if let Some(player) = slot.video_player.take() {
                self.players.retire(player);
            }
            slot.clear();
        }
        self.players.clear_all();
    }

    /// Forces the next `load_table` down the slow path.
    pub fn invalidate(&mut self) {
        self.last_index = None;
        self.last_subset = None;
    }
}

fn slot_index(role: Role) -> usize {
    match role {
        Role::Playfield => 0,
        Role::Backglass => 1,
        Role::Dmd => 2,
        Role::Topper => 3,
    }
}

fn table_media(table: &TableRecord, role: Role) -> (String, String) {
    match role {
        Role::Playfield => (table.playfield_image.clone(), table.playfield_video.clone()),
        Role::Backglass => (table.backglass_image.clone(), table.backglass_video.clone()),
        Role::Dmd => (table.dmd_image.clone(), table.dmd_video.clone()),
        Role::Topper => (table.topper_image.clone(), table.topper_video.clone()),
    }
}
