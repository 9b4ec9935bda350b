//! Code point sets
//!
//! A [`CodePointSet`] is a sorted list of disjoint, non-adjacent inclusive
//! ranges. Every character class in the AST, NFA and DFA is one of these.
//!
//! # ClassEscape
//!
//! This module also provides [`ClassEscape`], the predefined classes reachable
//! through `\d \D \w \W \s \S`, plus an ASCII word-character table used by the
//! backtracking executor for `\b` and `\B`.

use serde::Serialize;
use std::fmt;

/// Code points above this have no simple case mappings
const CASE_FOLD_LIMIT: u32 = 0x1E944;

/// Set of code points as sorted disjoint ranges
///
/// # Example
///
/// ```rust
/// use retrace::engine::charset::CodePointSet;
///
/// let set = CodePointSet::from_ranges([('a' as u32, 'c' as u32), ('b' as u32, 'f' as u32)]);
/// assert_eq!(set.ranges(), &[('a' as u32, 'f' as u32)]);
/// assert!(set.contains('d' as u32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct CodePointSet {
    ranges: Vec<(u32, u32)>,
}

impl CodePointSet {
    /// The empty set
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Every code point up to and including `max`
    pub fn full(max: u32) -> Self {
        Self {
            ranges: vec![(0, max)],
        }
    }

    /// A single code point
    pub fn single(cp: u32) -> Self {
        Self {
            ranges: vec![(cp, cp)],
        }
    }

    /// An inclusive range
    pub fn range(lo: u32, hi: u32) -> Self {
        Self::from_ranges([(lo, hi)])
    }

    /// Build from arbitrary (possibly overlapping, unordered) ranges
    pub fn from_ranges(ranges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut collected: Vec<(u32, u32)> = ranges
            .into_iter()
            .map(|(lo, hi)| if lo <= hi { (lo, hi) } else { (hi, lo) })
            .collect();
        collected.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(collected.len());
        for (lo, hi) in collected {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => {
                    last.1 = last.1.max(hi);
                }
                _ => merged.push((lo, hi)),
            }
        }
        Self { ranges: merged }
    }

    /// Build from individual code points
    pub fn from_code_points(cps: impl IntoIterator<Item = u32>) -> Self {
        Self::from_ranges(cps.into_iter().map(|cp| (cp, cp)))
    }

    /// The sorted ranges
    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    /// Whether no code point is included
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The only member, if the set has exactly one
    pub fn single_code_point(&self) -> Option<u32> {
        match self.ranges.as_slice() {
            [(lo, hi)] if lo == hi => Some(*lo),
            _ => None,
        }
    }

    /// Number of code points in the set
    pub fn size(&self) -> u64 {
        self.ranges
            .iter()
            .map(|(lo, hi)| (*hi - *lo) as u64 + 1)
            .sum()
    }

    /// Smallest member
    pub fn min(&self) -> Option<u32> {
        self.ranges.first().map(|r| r.0)
    }

    /// Largest member
    pub fn max(&self) -> Option<u32> {
        self.ranges.last().map(|r| r.1)
    }

    /// Membership test
    #[inline]
    pub fn contains(&self, cp: u32) -> bool {
        let idx = self.ranges.partition_point(|r| r.1 < cp);
        idx < self.ranges.len() && self.ranges[idx].0 <= cp
    }

    /// Set union
    pub fn union(&self, other: &Self) -> Self {
        Self::from_ranges(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    /// Set intersection
    pub fn intersection(&self, other: &Self) -> Self {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo <= hi {
                result.push((lo, hi));
            }
            if a_hi < b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self { ranges: result }
    }

    /// Whether the two sets share a member
    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Every code point in `0..=max` not in this set
    pub fn complement(&self, max: u32) -> Self {
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        let mut next = 0u32;
        for &(lo, hi) in &self.ranges {
            if lo > max {
                break;
            }
            if lo > next {
                result.push((next, lo - 1));
            }
            next = match hi.checked_add(1) {
                Some(n) => n,
                None => return Self { ranges: result },
            };
        }
        if next <= max {
            result.push((next, max));
        }
        Self { ranges: result }
    }

    /// Members of this set that are not in `other`
    pub fn difference(&self, other: &Self) -> Self {
        let max = self.max().unwrap_or(0);
        self.intersection(&other.complement(max))
    }

    /// Close the set under simple case folding
    ///
    /// Without `unicode`, a non-ASCII code point never maps onto an ASCII one
    /// (so `ſ` does not match `s`).
    pub fn case_fold(&self, unicode: bool) -> Self {
        let mut extra = Vec::new();
        for &(lo, hi) in &self.ranges {
            if lo >= CASE_FOLD_LIMIT {
                break;
            }
            for cp in lo..=hi.min(CASE_FOLD_LIMIT) {
                push_case_variants(cp, unicode, &mut extra);
            }
        }
        if extra.is_empty() {
            return self.clone();
        }
        self.union(&Self::from_code_points(extra))
    }
}

fn push_case_variants(cp: u32, unicode: bool, out: &mut Vec<u32>) {
    let Some(c) = char::from_u32(cp) else {
        return;
    };
    let mut push = |v: char| {
        let v = v as u32;
        if v != cp && (unicode || cp < 0x80 || v >= 0x80) {
            out.push(v);
        }
    };
    let lower = single_mapping(c.to_lowercase());
    let upper = single_mapping(c.to_uppercase());
    if let Some(l) = lower {
        push(l);
    }
    if let Some(u) = upper {
        push(u);
        if let Some(ul) = single_mapping(u.to_lowercase()) {
            push(ul);
        }
    }
}

fn single_mapping(mut iter: impl Iterator<Item = char>) -> Option<char> {
    let first = iter.next()?;
    match iter.next() {
        None => Some(first),
        Some(_) => None,
    }
}

impl fmt::Display for CodePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for &(lo, hi) in &self.ranges {
            write_code_point(f, lo)?;
            if hi > lo {
                write!(f, "-")?;
                write_code_point(f, hi)?;
            }
        }
        write!(f, "]")
    }
}

fn write_code_point(f: &mut fmt::Formatter<'_>, cp: u32) -> fmt::Result {
    match char::from_u32(cp) {
        Some(c) if c.is_ascii_alphanumeric() => write!(f, "{}", c),
        _ => write!(f, "\\u{{{:x}}}", cp),
    }
}

// ============================================================================
// Predefined classes
// ============================================================================

/// Line terminators recognized by `.`, `^` and `$`
pub const LINE_TERMINATORS: [u32; 4] = [0x0A, 0x0D, 0x2028, 0x2029];

const WHITESPACE_RANGES: [(u32, u32); 10] = [
    (0x09, 0x0D),
    (0x20, 0x20),
    (0xA0, 0xA0),
    (0x1680, 0x1680),
    (0x2000, 0x200A),
    (0x2028, 0x2029),
    (0x202F, 0x202F),
    (0x205F, 0x205F),
    (0x3000, 0x3000),
    (0xFEFF, 0xFEFF),
];

/// Whether `cp` is a line terminator
#[inline]
pub fn is_line_terminator(cp: u32) -> bool {
    LINE_TERMINATORS.contains(&cp)
}

/// The set matched by `.`
pub fn dot_set(dot_all: bool, max: u32) -> CodePointSet {
    let full = CodePointSet::full(max);
    if dot_all {
        full
    } else {
        full.difference(&CodePointSet::from_code_points(LINE_TERMINATORS))
    }
}

/// Predefined class escapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassEscape {
    /// `\d`
    Digit,
    /// `\D`
    NonDigit,
    /// `\w`
    Word,
    /// `\W`
    NonWord,
    /// `\s`
    Space,
    /// `\S`
    NonSpace,
}

impl ClassEscape {
    /// Recognize the letter following a backslash
    pub fn from_escape(c: char) -> Option<Self> {
        match c {
            'd' => Some(Self::Digit),
            'D' => Some(Self::NonDigit),
            'w' => Some(Self::Word),
            'W' => Some(Self::NonWord),
            's' => Some(Self::Space),
            'S' => Some(Self::NonSpace),
            _ => None,
        }
    }

    /// Whether this class is the complement of `other`
    pub fn is_negation_of(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Digit, Self::NonDigit)
                | (Self::NonDigit, Self::Digit)
                | (Self::Word, Self::NonWord)
                | (Self::NonWord, Self::Word)
                | (Self::Space, Self::NonSpace)
                | (Self::NonSpace, Self::Space)
        )
    }

    /// Materialize the class within `0..=max`
    ///
    /// With both `unicode` and `ignore_case`, `\w` also contains the code
    /// points that fold onto ASCII word characters.
    pub fn to_set(&self, max: u32, unicode_ignore_case: bool) -> CodePointSet {
        let positive = match self {
            Self::Digit | Self::NonDigit => CodePointSet::range('0' as u32, '9' as u32),
            Self::Word | Self::NonWord => {
                let word = CodePointSet::from_ranges([
                    ('0' as u32, '9' as u32),
                    ('A' as u32, 'Z' as u32),
                    ('_' as u32, '_' as u32),
                    ('a' as u32, 'z' as u32),
                ]);
                if unicode_ignore_case {
                    word.case_fold(true)
                } else {
                    word
                }
            }
            Self::Space | Self::NonSpace => CodePointSet::from_ranges(WHITESPACE_RANGES),
        };
        let positive = positive.intersection(&CodePointSet::full(max));
        match self {
            Self::Digit | Self::Word | Self::Space => positive,
            _ => positive.complement(max),
        }
    }
}

/// Unicode property classes reachable through `\p{...}` in unicode mode
pub fn property_set(name: &str, max: u32) -> Option<CodePointSet> {
    let predicate: fn(char) -> bool = match name {
        "Any" => |_| true,
        "ASCII" => |c| c.is_ascii(),
        "L" | "Letter" | "Alphabetic" | "Alpha" => char::is_alphabetic,
        "Lu" | "Uppercase_Letter" | "Uppercase" => char::is_uppercase,
        "Ll" | "Lowercase_Letter" | "Lowercase" => char::is_lowercase,
        "N" | "Number" => char::is_numeric,
        "Nd" | "Decimal_Number" | "digit" => |c| c.is_numeric() && c.to_digit(10).is_some(),
        "White_Space" | "space" => char::is_whitespace,
        "Cc" | "Control" => char::is_control,
        _ => return None,
    };
    let mut ranges = Vec::new();
    let mut open: Option<u32> = None;
    for cp in 0..=max {
        let inside = char::from_u32(cp).is_some_and(predicate);
        match (inside, open) {
            (true, None) => open = Some(cp),
            (false, Some(lo)) => {
                ranges.push((lo, cp - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(lo) = open {
        ranges.push((lo, max));
    }
    Some(CodePointSet { ranges })
}

// ============================================================================
// Word character table
// ============================================================================

/// ASCII word-character lookup table for `\b`
pub struct WordTable {
    word: [bool; 128],
}

impl WordTable {
    /// Build the table at compile time
    pub const fn new() -> Self {
        let mut word = [false; 128];
        let mut i = b'0';
        while i <= b'9' {
            word[i as usize] = true;
            i += 1;
        }
        i = b'a';
        while i <= b'z' {
            word[i as usize] = true;
            word[(i - 32) as usize] = true;
            i += 1;
        }
        word[b'_' as usize] = true;
        Self { word }
    }

    /// Whether `c` is a word character
    #[inline]
    pub fn is_word(&self, c: char) -> bool {
        (c as u32) < 128 && self.word[c as usize]
    }
}

impl Default for WordTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Global word table
pub static WORD_CHARS: WordTable = WordTable::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let set = CodePointSet::from_ranges([(10, 20), (5, 9), (30, 40), (21, 22)]);
        assert_eq!(set.ranges(), &[(5, 22), (30, 40)]);
        assert_eq!(set.size(), 18 + 11);
        assert!(set.contains(22));
        assert!(!set.contains(23));
        assert!(!set.contains(4));
    }

    #[test]
    fn test_complement_and_intersection() {
        let set = CodePointSet::from_ranges([(0x61, 0x63), (0x78, 0x7A)]);
        let comp = set.complement(0xFF);
        assert_eq!(comp.ranges(), &[(0, 0x60), (0x64, 0x77), (0x7B, 0xFF)]);
        assert!(comp.intersection(&set).is_empty());
        assert_eq!(comp.union(&set), CodePointSet::full(0xFF));
        assert!(CodePointSet::full(0x10FFFF).complement(0x10FFFF).is_empty());
    }

    #[test]
    fn test_case_fold() {
        let set = CodePointSet::single('k' as u32).case_fold(false);
        assert!(set.contains('K' as u32));
        assert!(!set.contains(0x212A));

        let set = CodePointSet::single('k' as u32).case_fold(true);
        assert!(set.contains('K' as u32));

        let set = CodePointSet::single(0xE9).case_fold(false);
        assert!(set.contains(0xC9));
    }

    #[test]
    fn test_class_escapes() {
        let digit = ClassEscape::Digit.to_set(0x10FFFF, false);
        let non_digit = ClassEscape::NonDigit.to_set(0x10FFFF, false);
        assert!(digit.contains('7' as u32));
        assert!(!non_digit.contains('7' as u32));
        assert!(ClassEscape::Digit.is_negation_of(&ClassEscape::NonDigit));
        assert_eq!(ClassEscape::from_escape('s'), Some(ClassEscape::Space));
        assert!(ClassEscape::Space.to_set(0xFF, false).contains(0xA0));
        assert!(!ClassEscape::Space.to_set(0xFF, false).contains(0x2028));
    }

    #[test]
    fn test_dot_set() {
        assert!(!dot_set(false, 0x10FFFF).contains('\n' as u32));
        assert!(dot_set(true, 0x10FFFF).contains('\n' as u32));
        assert_eq!(dot_set(true, 0xFF).max(), Some(0xFF));
    }

    #[test]
    fn test_word_table() {
        assert!(WORD_CHARS.is_word('a'));
        assert!(WORD_CHARS.is_word('Z'));
        assert!(WORD_CHARS.is_word('_'));
        assert!(!WORD_CHARS.is_word('-'));
        assert!(!WORD_CHARS.is_word('é'));
    }

    #[test]
    fn test_property_set() {
        let ascii = property_set("ASCII", 0xFF).unwrap();
        assert_eq!(ascii.ranges(), &[(0, 0x7F)]);
        assert!(property_set("Bogus", 0xFF).is_none());
    }
}
