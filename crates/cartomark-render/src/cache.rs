//! Per-layer offscreen buffer cache keyed by content version.

use cartomark_core::{LayerId, VersionKey};
use std::collections::HashMap;
use tiny_skia::Pixmap;

/// A cached layer buffer and the version it was rasterized at.
pub struct CacheEntry {
    pub pixmap: Pixmap,
    pub version: VersionKey,
}

/// Cache of rasterized layer buffers, owned by the compositor.
///
/// Entries are reused while a layer's version key matches and are
/// otherwise regenerated. The key is count-based, so in-place content
/// mutations must be flushed through [`RenderCache::remove`] or
/// [`RenderCache::clear`] by whoever performed them.
#[derive(Default)]
pub struct RenderCache {
    entries: HashMap<LayerId, CacheEntry>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cached buffer for a layer, if its version still matches.
    pub fn get_fresh(&self, id: LayerId, version: VersionKey) -> Option<&CacheEntry> {
        self.entries
            .get(&id)
            .filter(|entry| entry.version == version)
    }

    pub fn insert(&mut self, id: LayerId, pixmap: Pixmap, version: VersionKey) {
        self.entries.insert(id, CacheEntry { pixmap, version });
    }

    pub fn remove(&mut self, id: LayerId) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop entries for layers that no longer exist.
    pub fn retain_layers(&mut self, alive: impl Fn(LayerId) -> bool) {
        self.entries.retain(|id, _| alive(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(strokes: usize) -> VersionKey {
        VersionKey {
            strokes,
            markers: 0,
            texts: 0,
            visible: true,
        }
    }

    #[test]
    fn test_fresh_lookup_requires_matching_version() {
        let mut cache = RenderCache::new();
        let id = LayerId::new_v4();
        cache.insert(id, Pixmap::new(8, 8).unwrap(), key(1));

        assert!(cache.get_fresh(id, key(1)).is_some());
        assert!(cache.get_fresh(id, key(2)).is_none());
        assert!(cache.get_fresh(LayerId::new_v4(), key(1)).is_none());
    }

    #[test]
    fn test_retain_purges_dead_layers() {
        let mut cache = RenderCache::new();
        let kept = LayerId::new_v4();
        let dropped = LayerId::new_v4();
        cache.insert(kept, Pixmap::new(8, 8).unwrap(), key(0));
        cache.insert(dropped, Pixmap::new(8, 8).unwrap(), key(0));

        cache.retain_layers(|id| id == kept);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_fresh(kept, key(0)).is_some());
    }
}
