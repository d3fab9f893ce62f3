//! Compiled regions keyed by entry address, and the entries that failed to compile.

use crate::compile::CompiledRegion;
use crate::error::CompileError;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::info;

pub struct RegionCache {
    regions: LruCache<u32, CompiledRegion>,
    failed: HashMap<u32, CompileError>,
}

impl RegionCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            regions: LruCache::new(capacity),
            failed: HashMap::new(),
        }
    }

    /// Returns the region entered at `addr` and marks it as most recently used.
    pub fn get(&mut self, addr: u32) -> Option<&CompiledRegion> {
        self.regions.get(&addr)
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.regions.contains(&addr)
    }

    /// Caches `region`. Returns the entry address of the region that was evicted to make room.
    pub fn insert(&mut self, region: CompiledRegion) -> Option<u32> {
        let entry = region.entry();
        self.failed.remove(&entry);
        match self.regions.push(entry, region) {
            Some((evicted, _)) if evicted != entry => {
                info!("evicted region {evicted:#010x}");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Remembers that the region at `addr` can't be compiled. It is never built again.
    pub fn mark_failed(&mut self, addr: u32, err: CompileError) {
        self.regions.pop(&addr);
        self.failed.insert(addr, err);
    }

    pub fn is_failed(&self, addr: u32) -> bool {
        self.failed.contains_key(&addr)
    }

    pub fn failure(&self, addr: u32) -> Option<&CompileError> {
        self.failed.get(&addr)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn failed_len(&self) -> usize {
        self.failed.len()
    }

    pub fn capacity(&self) -> usize {
        self.regions.cap().get()
    }

    /// Entry addresses of the cached regions, most recently used first.
    pub fn entries(&self) -> impl Iterator<Item = u32> + '_ {
        self.regions.iter().map(|(&entry, _)| entry)
    }
}

impl std::fmt::Debug for RegionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionCache")
            .field("regions", &self.entries().collect::<Vec<_>>())
            .field("failed", &self.failed)
            .finish()
    }
}
