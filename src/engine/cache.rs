//! Bounded cache of compiled patterns
//!
//! A [`PatternCache`] is owned by the caller and shared by reference; there
//! is no global instance. Entries are keyed by the full [`RegexSource`]
//! (pattern, flags, flavor, encoding) and evicted least-recently-used once
//! the capacity is reached.
//!
//! Compilation runs outside the lock. Two threads missing on the same key
//! both compile; the second insert wins and both results are valid.

use super::compiler::{compile_source, CompiledMatcher};
use super::error::RegexError;
use super::options::{CompilerOptions, DEFAULT_CACHE_CAPACITY};
use super::source::RegexSource;
use hashbrown::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to compile
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
}

struct Entry {
    matcher: Arc<CompiledMatcher>,
    last_used: u64,
}

struct Inner {
    entries: HashMap<RegexSource, Entry, ahash::RandomState>,
    tick: u64,
    stats: CacheStats,
}

/// Thread-safe LRU cache of compiled matchers
pub struct PatternCache {
    inner: Mutex<Inner>,
    capacity: usize,
    options: CompilerOptions,
}

impl PatternCache {
    /// Create a cache with the default capacity
    pub fn new(options: CompilerOptions) -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY, options)
    }

    /// Create a cache holding at most `capacity` matchers (at least one)
    pub fn with_capacity(capacity: usize, options: CompilerOptions) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_hasher(ahash::RandomState::new()),
                tick: 0,
                stats: CacheStats::default(),
            }),
            capacity: capacity.max(1),
            options,
        }
    }

    /// Options every cached matcher was compiled with
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Compile a pattern string, reusing a cached matcher when possible
    pub fn get_or_compile(&self, pattern: &str, flags: &str) -> Result<Arc<CompiledMatcher>, RegexError> {
        let source = RegexSource::parse(pattern, flags)?;
        self.get_or_compile_source(source)
    }

    /// Look up or compile a source
    ///
    /// Syntax errors are returned to the caller and never cached.
    pub fn get_or_compile_source(&self, source: RegexSource) -> Result<Arc<CompiledMatcher>, RegexError> {
        {
            let mut inner = self.lock();
            inner.tick += 1;
            let tick = inner.tick;
            if let Some(entry) = inner.entries.get_mut(&source) {
                entry.last_used = tick;
                let matcher = Arc::clone(&entry.matcher);
                inner.stats.hits += 1;
                return Ok(matcher);
            }
            inner.stats.misses += 1;
        }

        log_debug!("pattern cache miss for {}", source);
        let matcher = Arc::new(compile_source(source.clone(), self.options, None)?);

        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;
        if !inner.entries.contains_key(&source) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
            }
        }
        inner.entries.insert(
            source,
            Entry {
                matcher: Arc::clone(&matcher),
                last_used: tick,
            },
        );
        Ok(matcher)
    }

    /// Recover the guard even if another thread panicked while holding it;
    /// entries are only ever replaced whole.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

impl std::fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
