//! Scratch buffers for one compilation request
//!
//! Subset construction and path enumeration repeatedly need a "visited" set
//! over NFA states and a list of interval breakpoints. Allocating these once
//! per request and resetting them between uses keeps the inner loops free of
//! allocation.

/// Reusable scratch storage owned by a single compilation request
#[derive(Debug, Default)]
pub struct CompilationBuffer {
    /// Visited bits, one per NFA state
    visited: Vec<u64>,
    /// Interval breakpoints for alphabet partitioning
    breakpoints: Vec<u32>,
    /// Number of times the visited set was cleared
    resets: usize,
}

impl CompilationBuffer {
    /// Create an empty buffer
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a buffer sized for `states` NFA states
    #[inline]
    pub fn with_capacity(states: usize) -> Self {
        Self {
            visited: Vec::with_capacity(states.div_ceil(64)),
            breakpoints: Vec::with_capacity(64),
            resets: 0,
        }
    }

    /// Clear the visited set and size it for `universe` ids
    pub fn begin_visit(&mut self, universe: usize) {
        let words = universe.div_ceil(64);
        self.visited.clear();
        self.visited.resize(words, 0);
        self.resets += 1;
    }

    /// Mark `id` visited; returns `false` if it already was
    #[inline]
    pub fn visit(&mut self, id: u32) -> bool {
        let (word, bit) = ((id / 64) as usize, id % 64);
        if word >= self.visited.len() {
            self.visited.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let fresh = self.visited[word] & mask == 0;
        self.visited[word] |= mask;
        fresh
    }

    /// Breakpoint scratch list, cleared
    pub fn breakpoints(&mut self) -> &mut Vec<u32> {
        self.breakpoints.clear();
        &mut self.breakpoints
    }

    /// Number of visited-set resets since creation
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Bytes currently reserved
    pub fn memory_usage(&self) -> usize {
        self.visited.capacity() * std::mem::size_of::<u64>()
            + self.breakpoints.capacity() * std::mem::size_of::<u32>()
    }
}
