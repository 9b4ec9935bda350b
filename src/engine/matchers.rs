//! Range matchers for automaton transitions
//!
//! A [`CharMatcher`] is the executable form of a [`CodePointSet`]. Small sets
//! become a single comparison; larger ones a range list searched linearly or
//! by binary search. When more than `bitset_threshold` ranges fall inside the
//! same 256-code-point block (same high byte), that block is compacted into a
//! 256-bit bitset segment.

use super::charset::CodePointSet;
use serde::Serialize;
use std::fmt;

/// Range lists at or below this length are scanned linearly
const LINEAR_SCAN_LIMIT: usize = 8;

/// One piece of a segmented matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Segment {
    /// Inclusive range
    Range(u32, u32),
    /// All members inside the block `high << 8 ..= high << 8 | 0xFF`
    Bitset {
        /// Shared high bits (`cp >> 8`)
        high: u32,
        /// 256 membership bits
        bits: [u64; 4],
    },
}

impl Segment {
    fn lo(&self) -> u32 {
        match self {
            Segment::Range(lo, _) => *lo,
            Segment::Bitset { high, .. } => high << 8,
        }
    }

    fn hi(&self) -> u32 {
        match self {
            Segment::Range(_, hi) => *hi,
            Segment::Bitset { high, .. } => (high << 8) | 0xFF,
        }
    }

    #[inline]
    fn contains(&self, cp: u32) -> bool {
        match self {
            Segment::Range(lo, hi) => *lo <= cp && cp <= *hi,
            Segment::Bitset { high, bits } => {
                if cp >> 8 != *high {
                    return false;
                }
                let low = cp & 0xFF;
                bits[(low >> 6) as usize] & (1u64 << (low & 63)) != 0
            }
        }
    }
}

/// Executable code point predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CharMatcher {
    /// Matches nothing
    Empty,
    /// Matches exactly one code point
    Single(u32),
    /// Matches one inclusive range
    Range(u32, u32),
    /// Matches any of several ranges
    Ranges(Vec<(u32, u32)>),
    /// Sorted ranges and bitset blocks
    Segmented(Vec<Segment>),
}

impl CharMatcher {
    /// Build the cheapest matcher for `set`
    pub fn build(set: &CodePointSet, bitset_threshold: usize) -> Self {
        let ranges = set.ranges();
        match ranges {
            [] => return CharMatcher::Empty,
            [(lo, hi)] if lo == hi => return CharMatcher::Single(*lo),
            [(lo, hi)] => return CharMatcher::Range(*lo, *hi),
            _ => {}
        }

        // Count ranges confined to a single 256-block
        let mut dense_blocks: Vec<u32> = Vec::new();
        let mut current: Option<(u32, usize)> = None;
        for &(lo, hi) in ranges {
            if lo >> 8 != hi >> 8 {
                current = None;
                continue;
            }
            let high = lo >> 8;
            current = match current {
                Some((h, n)) if h == high => Some((h, n + 1)),
                _ => Some((high, 1)),
            };
            if let Some((h, n)) = current {
                if n == bitset_threshold + 1 {
                    dense_blocks.push(h);
                }
            }
        }

        if dense_blocks.is_empty() {
            return CharMatcher::Ranges(ranges.to_vec());
        }

        let mut segments: Vec<Segment> = Vec::new();
        for &(lo, hi) in ranges {
            let high = lo >> 8;
            if lo >> 8 == hi >> 8 && dense_blocks.binary_search(&high).is_ok() {
                if let Some(Segment::Bitset { high: h, bits }) = segments.last_mut() {
                    if *h == high {
                        set_bits(bits, lo, hi);
                        continue;
                    }
                }
                let mut bits = [0u64; 4];
                set_bits(&mut bits, lo, hi);
                segments.push(Segment::Bitset { high, bits });
            } else {
                segments.push(Segment::Range(lo, hi));
            }
        }
        CharMatcher::Segmented(segments)
    }

    /// Membership test
    #[inline]
    pub fn matches(&self, cp: u32) -> bool {
        match self {
            CharMatcher::Empty => false,
            CharMatcher::Single(c) => *c == cp,
            CharMatcher::Range(lo, hi) => *lo <= cp && cp <= *hi,
            CharMatcher::Ranges(ranges) => {
                if ranges.len() <= LINEAR_SCAN_LIMIT {
                    ranges.iter().any(|&(lo, hi)| lo <= cp && cp <= hi)
                } else {
                    let idx = ranges.partition_point(|r| r.1 < cp);
                    idx < ranges.len() && ranges[idx].0 <= cp
                }
            }
            CharMatcher::Segmented(segments) => {
                // a block-crossing range may overlap the bitset just before it
                let idx = segments.partition_point(|s| s.hi() < cp);
                segments[idx..]
                    .iter()
                    .take(2)
                    .any(|s| s.lo() <= cp && s.contains(cp))
            }
        }
    }

    /// Number of comparisons/segments, used in statistics
    pub fn cost(&self) -> usize {
        match self {
            CharMatcher::Empty => 0,
            CharMatcher::Single(_) | CharMatcher::Range(..) => 1,
            CharMatcher::Ranges(ranges) => ranges.len(),
            CharMatcher::Segmented(segments) => segments.len(),
        }
    }

    /// Whether any segment is a bitset
    pub fn uses_bitset(&self) -> bool {
        matches!(self, CharMatcher::Segmented(segments)
            if segments.iter().any(|s| matches!(s, Segment::Bitset { .. })))
    }
}

fn set_bits(bits: &mut [u64; 4], lo: u32, hi: u32) {
    for cp in lo..=hi {
        let low = cp & 0xFF;
        bits[(low >> 6) as usize] |= 1u64 << (low & 63);
    }
}

impl fmt::Display for CharMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharMatcher::Empty => write!(f, "[]"),
            CharMatcher::Single(c) => write!(f, "{}", CodePointSet::single(*c)),
            CharMatcher::Range(lo, hi) => write!(f, "{}", CodePointSet::range(*lo, *hi)),
            CharMatcher::Ranges(ranges) => {
                write!(f, "{}", CodePointSet::from_ranges(ranges.iter().copied()))
            }
            CharMatcher::Segmented(segments) => {
                write!(f, "[")?;
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match segment {
                        Segment::Range(..) => write!(f, "{:x}-{:x}", segment.lo(), segment.hi())?,
                        Segment::Bitset { high, .. } => write!(f, "bitset({:x}xx)", high)?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}
