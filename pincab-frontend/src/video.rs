// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! Video players and the player cache. The concrete decode backends (VLC,
//! FFmpeg, GStreamer) are external collaborators; this module owns the
//! capability trait, the generated-art fallback player, and the LRU cache
//! with its deferred-destruction queue.

use std::collections::{HashMap, VecDeque};

use pincab_model::settings::Color;
use pincab_model::{Role, TableRecord};
use tracing::{debug, trace, warn};

use crate::gfx::{GfxContext, Texture};
use crate::title;

pub const MAX_VIDEO_CACHE: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoBackend {
    Vlc,
    Ffmpeg,
    Gstreamer,
    NoVideo,
}

impl VideoBackend {
    pub fn parse(s: &str) -> VideoBackend {
        match s {
            "vlc" => VideoBackend::Vlc,
            "ffmpeg" => VideoBackend::Ffmpeg,
            "gstreamer" => VideoBackend::Gstreamer,
            "novideo" => VideoBackend::NoVideo,
            other => {
                warn!(backend = other, "unknown video backend, using vlc");
                VideoBackend::Vlc
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoBackend::Vlc => "vlc",
            VideoBackend::Ffmpeg => "ffmpeg",
            VideoBackend::Gstreamer => "gstreamer",
            VideoBackend::NoVideo => "novideo",
        }
    }
}

/// The capability set the frontend needs from any video backend.
pub trait VideoPlayer {
    fn play(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
    /// Advances one frame if one is due. Must not block.
    fn update(&mut self, gfx: &GfxContext);
    fn texture(&self) -> Option<&Texture>;
    fn set_volume(&mut self, volume: f32);
    fn set_mute(&mut self, mute: bool);
}

/// Cache key for a concrete player instance.
pub fn cache_key(backend: &str, role: Role, path: &str, width: u32, height: u32) -> String {
    format!("{}_{}_{}_{}x{}", backend, role.name(), path, width, height)
}

/// Instantiates a player for a table video. The decode backends are not
/// linked into this build, so everything except `novideo` reports
/// unavailable and the caller falls through to the image path.
pub fn create_player(
    backend: VideoBackend,
    _gfx: &GfxContext,
    path: &str,
    width: u32,
    height: u32,
) -> Option<Box<dyn VideoPlayer>> {
    match backend {
        VideoBackend::NoVideo => None,
        _ => {
            warn!(
                backend = backend.name(),
                path, width, height, "video backend unavailable in this build"
            );
            None
        }
    }
}

/// The synthetic placeholder player used when a role has no media at all.
/// It produces a single role-appropriate text frame; `update` has nothing
/// further to do.
pub struct GeneratedArtPlayer {
    texture: Option<Texture>,
    playing: bool,
}

impl GeneratedArtPlayer {
    pub fn new(
        gfx: &GfxContext,
        font: Option<&fontdue::Font>,
        role: Role,
        table: &TableRecord,
        width: u32,
        height: u32,
    ) -> Self {
        let text = generated_text(role, table);
        let texture = title::render_panel(
            gfx,
            font,
            &text,
            (height as f32 * 0.12).clamp(12.0, 64.0),
            Color::rgba(220, 220, 220, 255),
            Color::rgba(16, 20, 28, 255),
            width,
            height,
        );

        GeneratedArtPlayer {
            texture,
            playing: false,
        }
    }
}

impl VideoPlayer for GeneratedArtPlayer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn update(&mut self, _gfx: &GfxContext) {}

    fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn set_mute(&mut self, _mute: bool) {}
}

/// The text a role shows when synthesising placeholder art.
pub fn generated_text(role: Role, table: &TableRecord) -> String {
    let fallback = || {
        if table.title.is_empty() {
            "Unknown Table".to_owned()
        } else {
            table.title.clone()
        }
    };

    match role {
        Role::Dmd => {
            if table.manufacturer.is_empty() {
                fallback()
            } else {
                table.manufacturer.clone()
            }
        }
        Role::Topper => {
            if table.year.is_empty() {
                fallback()
            } else {
                table.year.clone()
            }
        }
        Role::Backglass => fallback(),
        Role::Playfield => {
            let mut text = fallback();
            if !table.manufacturer.is_empty() || !table.year.is_empty() {
                text.push('\n');
                text.push_str(table.manufacturer.trim());
                if !table.year.is_empty() {
                    if !table.manufacturer.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&table.year);
                }
            }
            text
        }
    }
}

struct CachedPlayer {
    generation: u64,
    width: u32,
    height: u32,
    player: Box<dyn VideoPlayer>,
}

/// C2: the video-player cache. Players move between here and the active
/// slots; retired players go through the discard queue and are only dropped
/// at explicit drain points, never mid-frame.
pub struct PlayerCache {
    entries: HashMap<String, CachedPlayer>,
    lru: VecDeque<String>,
    capacity: usize,
    discard: VecDeque<Box<dyn VideoPlayer>>,
}

impl PlayerCache {
    pub fn new(capacity: usize) -> Self {
        PlayerCache {
            entries: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
            discard: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.entries.len(), self.lru.len());
        self.entries.len()
    }

    pub fn discard_len(&self) -> usize {
        self.discard.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Moves a cached player out to the caller. A key that matches but was
    /// built against a stale renderer or other dimensions is retired
    /// instead.
    pub fn get(
        &mut self,
        key: &str,
        generation: u64,
        width: u32,
        height: u32,
    ) -> Option<Box<dyn VideoPlayer>> {
        let entry = self.entries.get(key)?;
        let matches =
            entry.generation == generation && entry.width == width && entry.height == height;

        let entry = self.entries.remove(key).unwrap();
        self.remove_lru(key);

        if matches {
            trace!(key, "player cache hit");
            Some(entry.player)
        } else {
            debug!(key, "cached player is stale, retiring");
            self.retire(entry.player);
            None
        }
    }

    /// Inserts a stopped player. A duplicate key keeps the cached entry and
    /// sends the new insertion to the discard queue; this is defensive
    /// against two paths producing the same key.
    pub fn put(
        &mut self,
        key: &str,
        generation: u64,
        width: u32,
        height: u32,
        player: Box<dyn VideoPlayer>,
    ) {
        if self.entries.contains_key(key) {
            warn!(key, "duplicate player cache key, discarding new insertion");
            self.retire(player);
            return;
        }

        self.entries.insert(
            key.to_owned(),
            CachedPlayer {
                generation,
                width,
                height,
                player,
            },
        );
        self.lru.push_front(key.to_owned());

        if self.entries.len() > self.capacity {
            if let Some(evicted) = self.lru.pop_back() {
                debug!(key = %evicted, "evicting cached player");
                if let Some(entry) = self.entries.remove(&evicted) {
                    self.retire(entry.player);
                }
            }
        }
    }

    /// Appends a player to the discard queue. Destruction only happens at
    /// drain points; the queue is bounded at twice the cache capacity, with
    /// the oldest entries dropped past that.
    pub fn retire(&mut self, mut player: Box<dyn VideoPlayer>) {
        player.stop();
        self.discard.push_back(player);

        while self.discard.len() > self.capacity * 2 {
            self.discard.pop_front();
        }
    }

    /// Destroys everything in the discard queue. Safe only when no frame is
    /// in flight: the top of `load_table` after the active players were
    /// stopped, and shutdown.
    pub fn drain_discard(&mut self) {
        if !self.discard.is_empty() {
            debug!(count = self.discard.len(), "draining retired players");
        }
        self.discard.clear();
    }

    /// Retires every cached player and drains. Used at shutdown and when
    /// the renderers are recreated.
    pub fn clear_all(&mut self) {
        let keys: Vec<_> = self.lru.drain(..).collect();
        for key in keys {
            if let Some(entry) = self.entries.remove(&key) {
                self.retire(entry.player);
            }
        }
        self.entries.clear();
        self.drain_discard();
    }

    fn remove_lru(&mut self, key: &str) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A `VideoPlayer` double that records state transitions and drops.
    pub struct FakePlayer {
        pub playing: bool,
        drops: Arc<AtomicUsize>,
    }

    impl FakePlayer {
        pub fn new(drops: Arc<AtomicUsize>) -> Box<dyn VideoPlayer> {
            Box::new(FakePlayer {
                playing: false,
                drops,
            })
        }
    }

    impl Drop for FakePlayer {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl VideoPlayer for FakePlayer {
        fn play(&mut self) {
            self.playing = true;
        }

        fn stop(&mut self) {
            self.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn update(&mut self, _gfx: &GfxContext) {}

        fn texture(&self) -> Option<&Texture> {
            None
        }

        fn set_volume(&mut self, _volume: f32) {}

        fn set_mute(&mut self, _mute: bool) {}
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakePlayer;
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn drops() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn cache_key_format() {
        assert_eq!(
            cache_key("vlc", Role::Dmd, "/media/t.mp4", 1024, 256),
            "vlc_dmd_/media/t.mp4_1024x256"
        );
    }

    #[test]
    fn get_moves_the_player_out() {
        let counter = drops();
        let mut cache = PlayerCache::new(4);
        cache.put("k", 0, 64, 64, FakePlayer::new(counter.clone()));

        assert!(cache.contains("k"));
        let player = cache.get("k", 0, 64, 64);
        assert!(player.is_some());
        assert!(!cache.contains("k"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn mismatched_dimensions_are_a_miss() {
        let counter = drops();
        let mut cache = PlayerCache::new(4);
        cache.put("k", 0, 64, 64, FakePlayer::new(counter.clone()));

        assert!(cache.get("k", 0, 128, 64).is_none());
        assert!(!cache.contains("k"));
        // The stale player waits in the discard queue, not destroyed inline.
        assert_eq!(cache.discard_len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_put_discards_the_new_player() {
        let counter = drops();
        let mut cache = PlayerCache::new(4);
        cache.put("k", 0, 64, 64, FakePlayer::new(counter.clone()));
        cache.put("k", 0, 64, 64, FakePlayer::new(counter.clone()));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.discard_len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn eviction_goes_through_the_discard_queue() {
        let counter = drops();
        let mut cache = PlayerCache::new(2);
        cache.put("a", 0, 64, 64, FakePlayer::new(counter.clone()));
        cache.put("b", 0, 64, 64, FakePlayer::new(counter.clone()));
        cache.put("c", 0, 64, 64, FakePlayer::new(counter.clone()));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"), "LRU-back entry should be evicted");
        assert_eq!(cache.discard_len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        cache.drain_discard();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn discard_queue_is_bounded() {
        let counter = drops();
        let mut cache = PlayerCache::new(2);
        for _ in 0..10 {
            cache.retire(FakePlayer::new(counter.clone()));
        }

        assert_eq!(cache.discard_len(), 4);
        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn clear_all_retires_and_drains() {
        let counter = drops();
        let mut cache = PlayerCache::new(4);
        cache.put("a", 0, 64, 64, FakePlayer::new(counter.clone()));
        cache.put("b", 0, 64, 64, FakePlayer::new(counter.clone()));

        cache.clear_all();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.discard_len(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    // A→B→C→D→A with a two-entry cache, the way the asset manager drives
    // it: cache the outgoing player, drain, then look up the incoming one.
    #[test]
    fn navigation_cycle_with_small_cache() {
        let counter = drops();
        let mut cache = PlayerCache::new(2);
        let mut active: Option<(String, Box<dyn VideoPlayer>)> = None;
        let mut created = 0;

        for table in ["A", "B", "C", "D", "A"] {
            let key = cache_key("vlc", Role::Playfield, table, 64, 64);

            if let Some((prev_key, player)) = active.take() {
                cache.put(&prev_key, 0, 64, 64, player);
            }
            cache.drain_discard();

            let player = cache.get(&key, 0, 64, 64).unwrap_or_else(|| {
                created += 1;
                FakePlayer::new(counter.clone())
            });
            active = Some((key, player));
        }

        // A and B were evicted along the way, so arriving back at A needs a
        // fresh player while C and D stayed resident.
        assert_eq!(created, 5);
        assert!(cache.contains(&cache_key("vlc", Role::Playfield, "C", 64, 64)));
        assert!(cache.contains(&cache_key("vlc", Role::Playfield, "D", 64, 64)));
        assert_eq!(cache.len(), 2);
    }

    // Returning to a table whose player is still cached must not build a
    // new one.
    #[test]
    fn revisit_resolves_from_cache() {
        let counter = drops();
        let mut cache = PlayerCache::new(8);
        let key = cache_key("vlc", Role::Backglass, "T2", 128, 128);

        cache.put(&key, 0, 128, 128, FakePlayer::new(counter.clone()));
        let player = cache.get(&key, 0, 128, 128);
        assert!(player.is_some());
        assert_eq!(counter.load(Ordering::SeqCst), 0, "no player was destroyed");
    }

    #[test]
    fn generated_text_is_role_appropriate() {
        let table = TableRecord {
            title: "Medieval Madness".into(),
            manufacturer: "Williams".into(),
            year: "1997".into(),
            ..Default::default()
        };

        assert_eq!(generated_text(Role::Dmd, &table), "Williams");
        assert_eq!(generated_text(Role::Topper, &table), "1997");
        assert_eq!(generated_text(Role::Backglass, &table), "Medieval Madness");
        assert_eq!(
            generated_text(Role::Playfield, &table),
            "Medieval Madness\nWilliams 1997"
        );
    }
}
