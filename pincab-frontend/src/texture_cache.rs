// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, error, trace};

use crate::gfx::{GfxContext, Texture};

pub const MAX_TEXTURE_CACHE: usize = 100;

struct CacheEntry<T> {
    generation: u64,
    resource: Rc<T>,
}

/// An LRU map of shared resources keyed by path. The cache holds the owning
/// handle; consumers get `Rc` borrows, and an entry is never evicted while a
/// borrow is live.
pub struct LruCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    lru: VecDeque<String>,
    capacity: usize,
    generation: u64,
}

impl<T> LruCache<T> {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            entries: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.entries.len(), self.lru.len());
        self.entries.len()
    }

    /// Invalidates every entry. Used when the renderers backing the cached
    /// resources are recreated.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.generation += 1;
    }

    pub fn get_with(
        &mut self,
        key: &str,
        load: impl FnOnce() -> Option<T>,
    ) -> Option<Rc<T>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.generation == self.generation {
                let resource = entry.resource.clone();
                self.touch(key);
                trace!(key, "texture cache hit");
                return Some(resource);
            }

            // Stale generation; reload below.
            self.remove(key);
        }

        let resource = Rc::new(load()?);
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                generation: self.generation,
                resource: resource.clone(),
            },
        );
        self.lru.push_front(key.to_owned());
        self.evict_overflow();

        Some(resource)
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            let key = self.lru.remove(pos).unwrap();
            self.lru.push_front(key);
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
    }

    /// Evicts least-recently-used entries past capacity, skipping any whose
    /// resource is still borrowed by an active slot.
    fn evict_overflow(&mut self) {
        let mut excess = self.entries.len().saturating_sub(self.capacity);
        let mut idx = self.lru.len();

        while excess > 0 && idx > 0 {
            idx -= 1;
            let key = &self.lru[idx];
            let borrowed = self
                .entries
                .get(key)
                .map(|e| Rc::strong_count(&e.resource) > 1)
                .unwrap_or(false);

            if borrowed {
                continue;
            }

            let key = self.lru.remove(idx).unwrap();
            debug!(key = %key, "evicting cached texture");
            self.entries.remove(&key);
            excess -= 1;
        }
    }
}

/// C1: path-to-GPU-texture cache, tied to the current renderer generation.
pub struct TextureCache {
    cache: LruCache<Texture>,
}

impl TextureCache {
    pub fn new() -> Self {
        TextureCache {
            cache: LruCache::new(MAX_TEXTURE_CACHE),
        }
    }

    pub fn get(&mut self, gfx: &GfxContext, path: &str) -> Option<Rc<Texture>> {
        if path.is_empty() {
            return None;
        }

        self.cache.get_with(path, || load_image_texture(gfx, path))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes an image file into a GPU texture. Decode failures are absorbed
/// here: the frontend stays navigable, and the failure is visible only as a
/// structured log line.
fn load_image_texture(gfx: &GfxContext, path: &str) -> Option<Texture> {
    if !Path::new(path).is_file() {
        error!(path, "texture file does not exist");
        return None;
    }

    let decoded = match image::open(path) {
        Ok(img) => img.into_rgba8(),
        Err(e) => {
            error!(path, error = %e, "failed to decode image");
            return None;
        }
    };

    let (width, height) = decoded.dimensions();
    debug!(path, width, height, "loaded texture");

    Some(gfx.create_texture_rgba(path, width, height, decoded.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn caches_and_reuses() {
        let mut cache: LruCache<u32> = LruCache::new(4);
        let mut loads = 0;

        let a = cache.get_with("a", || {
            loads += 1;
            Some(1)
        });
        assert_eq!(a.as_deref(), Some(&1));
        drop(a);

        let a = cache.get_with("a", || {
            loads += 1;
            Some(2)
        });
        assert_eq!(a.as_deref(), Some(&1));
        assert_eq!(loads, 1);
    }

    #[test]
    fn load_failure_is_not_cached() {
        let mut cache: LruCache<u32> = LruCache::new(4);
        assert_eq!(cache.get_with("a", || None), None);
        assert_eq!(cache.len(), 0);

        assert_eq!(cache.get_with("a", || Some(7)).as_deref(), Some(&7));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache: LruCache<u32> = LruCache::new(2);
        cache.get_with("a", || Some(1));
        cache.get_with("b", || Some(2));

        // Touch "a" so "b" is the LRU entry.
        cache.get_with("a", || unreachable!());
        cache.get_with("c", || Some(3));

        assert_eq!(cache.len(), 2);
        let mut reloaded = false;
        cache.get_with("b", || {
            reloaded = true;
            Some(2)
        });
        assert!(reloaded, "LRU entry should have been evicted");
    }

    #[test]
    fn borrowed_entries_survive_eviction() {
        let mut cache: LruCache<u32> = LruCache::new(1);
        let held = cache.get_with("held", || Some(1)).unwrap();

        cache.get_with("other", || Some(2));
        assert_eq!(cache.len(), 2, "borrowed entry must not be evicted");

        drop(held);
        cache.get_with("third", || Some(3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_invalidates_generation() {
        let mut cache: LruCache<u32> = LruCache::new(4);
        cache.get_with("a", || Some(1));
        cache.clear();
        assert_eq!(cache.len(), 0);

        let mut reloaded = false;
        cache.get_with("a", || {
            reloaded = true;
            Some(9)
        });
        assert!(reloaded);
    }
}
