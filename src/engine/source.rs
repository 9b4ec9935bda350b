//! Pattern source: text, flags, flavor and encoding
//!
//! A [`RegexSource`] is immutable once built and identifies a compilation
//! request (and a [`PatternCache`](super::cache::PatternCache) entry).

use super::error::SyntaxError;
use serde::Serialize;
use std::fmt;

/// ECMAScript-style flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct RegexFlags {
    /// `g`
    pub global: bool,
    /// `i`
    pub ignore_case: bool,
    /// `m`
    pub multiline: bool,
    /// `s`
    pub dot_all: bool,
    /// `u`
    pub unicode: bool,
    /// `y`
    pub sticky: bool,
}

impl RegexFlags {
    /// Parse a flag string such as `"gi"`
    ///
    /// Unknown and repeated letters are rejected.
    pub fn parse(flags: &str) -> Result<Self, SyntaxError> {
        let mut result = Self::default();
        for (position, c) in flags.chars().enumerate() {
            let slot = match c {
                'g' => &mut result.global,
                'i' => &mut result.ignore_case,
                'm' => &mut result.multiline,
                's' => &mut result.dot_all,
                'u' => &mut result.unicode,
                'y' => &mut result.sticky,
                _ => return Err(SyntaxError::invalid_flags(flags, position)),
            };
            if *slot {
                return Err(SyntaxError::invalid_flags(flags, position));
            }
            *slot = true;
        }
        Ok(result)
    }

    /// Set the ignore-case flag
    pub fn with_ignore_case(mut self, value: bool) -> Self {
        self.ignore_case = value;
        self
    }

    /// Set the multiline flag
    pub fn with_multiline(mut self, value: bool) -> Self {
        self.multiline = value;
        self
    }

    /// Set the unicode flag
    pub fn with_unicode(mut self, value: bool) -> Self {
        self.unicode = value;
        self
    }

    /// Set the sticky flag
    pub fn with_sticky(mut self, value: bool) -> Self {
        self.sticky = value;
        self
    }
}

impl fmt::Display for RegexFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters = [
            (self.global, 'g'),
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.unicode, 'u'),
            (self.sticky, 'y'),
        ];
        for (set, letter) in letters {
            if set {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// Pattern syntax dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Flavor {
    /// ECMAScript syntax
    #[default]
    EcmaScript,
    /// ECMAScript syntax plus Python's `(?P<name>...)`, `(?P=name)`, `\A`, `\Z`,
    /// inline flags, `(?#...)` comments and verbose mode
    Python,
}

/// Character encoding of the subject strings
///
/// Determines the largest code point a class may contain and the number of
/// bytes each code point occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Encoding {
    /// One byte per code point, U+0000..=U+00FF
    Latin1,
    /// Two bytes per BMP code point, four for supplementary planes
    Utf16,
    /// Four bytes per code point
    Utf32,
    /// One to four bytes per code point
    #[default]
    Utf8,
}

impl Encoding {
    /// Largest representable code point
    pub fn max_code_point(&self) -> u32 {
        match self {
            Encoding::Latin1 => 0xFF,
            _ => 0x10FFFF,
        }
    }

    /// Encoded size in bytes of a single code point
    pub fn encoded_len(&self, cp: u32) -> usize {
        match self {
            Encoding::Latin1 => 1,
            Encoding::Utf32 => 4,
            Encoding::Utf16 => {
                if cp < 0x10000 {
                    2
                } else {
                    4
                }
            }
            Encoding::Utf8 => match cp {
                0..=0x7F => 1,
                0x80..=0x7FF => 2,
                0x800..=0xFFFF => 3,
                _ => 4,
            },
        }
    }

    /// Code points at which the encoded size changes
    pub fn width_boundaries(&self) -> &'static [u32] {
        match self {
            Encoding::Latin1 | Encoding::Utf32 => &[],
            Encoding::Utf16 => &[0x10000],
            Encoding::Utf8 => &[0x80, 0x800, 0x10000],
        }
    }
}

/// A pattern with everything needed to compile it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegexSource {
    /// Pattern text
    pub pattern: String,
    /// Parsed flags
    pub flags: RegexFlags,
    /// Syntax dialect
    pub flavor: Flavor,
    /// Subject encoding
    pub encoding: Encoding,
}

impl RegexSource {
    /// Create a source with default flavor and encoding
    pub fn new(pattern: impl Into<String>, flags: RegexFlags) -> Self {
        Self {
            pattern: pattern.into(),
            flags,
            flavor: Flavor::default(),
            encoding: Encoding::default(),
        }
    }

    /// Create a source from a flag string
    pub fn parse(pattern: impl Into<String>, flags: &str) -> Result<Self, SyntaxError> {
        Ok(Self::new(pattern, RegexFlags::parse(flags)?))
    }

    /// Set the flavor
    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set the encoding
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

impl fmt::Display for RegexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let flags = RegexFlags::parse("gimsuy").unwrap();
        assert!(flags.global && flags.ignore_case && flags.multiline);
        assert!(flags.dot_all && flags.unicode && flags.sticky);
        assert_eq!(flags.to_string(), "gimsuy");
        assert_eq!(RegexFlags::parse("").unwrap(), RegexFlags::default());
    }

    #[test]
    fn test_parse_flags_rejects_unknown_and_duplicates() {
        let err = RegexFlags::parse("gx").unwrap_err();
        assert_eq!(err.position, 1);
        assert!(RegexFlags::parse("ii").is_err());
    }

    #[test]
    fn test_encoding_widths() {
        assert_eq!(Encoding::Utf8.encoded_len('a' as u32), 1);
        assert_eq!(Encoding::Utf8.encoded_len(0xE9), 2);
        assert_eq!(Encoding::Utf8.encoded_len(0x20AC), 3);
        assert_eq!(Encoding::Utf8.encoded_len(0x1F600), 4);
        assert_eq!(Encoding::Utf16.encoded_len(0x1F600), 4);
        assert_eq!(Encoding::Utf16.encoded_len(0x20AC), 2);
        assert_eq!(Encoding::Latin1.max_code_point(), 0xFF);
    }

    #[test]
    fn test_source_display() {
        let source = RegexSource::parse("a+b", "gi").unwrap();
        assert_eq!(source.to_string(), "/a+b/gi");
        assert_eq!(source.flavor, Flavor::EcmaScript);
    }
}
