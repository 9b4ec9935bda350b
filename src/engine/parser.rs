//! Regex pattern parser
//!
//! Turns pattern text into a [`RegexAst`]. Parsing is iterative: open groups
//! live on an explicit stack, so deeply nested patterns cannot overflow the
//! native stack. Capture groups are numbered in order of their opening
//! parenthesis; a pre-scan counts them so that `\N` can be told apart from a
//! legacy octal escape before the group is seen.
//!
//! # Supported Syntax
//!
//! | Construct | Meaning |
//! |-----------|---------|
//! | `.` `[...]` `[^...]` | character classes |
//! | `\d \D \w \W \s \S` | predefined classes |
//! | `\n \r \t \f \v \0 \xHH \uHHHH \u{H..} \cX` | character escapes |
//! | `(...)` `(?:...)` `(?<name>...)` | groups |
//! | `(?=...)` `(?!...)` `(?<=...)` `(?<!...)` | lookarounds |
//! | `\N` `\k<name>` | back references |
//! | `* + ? {n} {n,} {n,m}` (+ `?` for lazy) | quantifiers |
//! | `^ $ \b \B` | anchors |
//! | `(?P<name>...)` `(?P=name)` `\A` `\Z` | Python flavor only |
//! | `(?aiLmsux)` `(?imsx-imsx:...)` `(?#...)` | Python flavor only |
//!
//! Python inline flags without a colon apply to the whole pattern, wherever
//! they appear. When one is found the pattern is parsed again with the flag
//! switched on from the start. Scoped flags only last until the group closes.
//! Verbose mode (`x`) skips whitespace and `#` comments outside classes.

use super::ast::{
    AnchorKind, LookAroundKind, NodeId, NodeKind, Quantifier, RegexAst, SubtreeId, ROOT_SUBTREE,
};
use super::charset::{dot_set, property_set, ClassEscape, CodePointSet};
use super::error::SyntaxError;
use super::source::{Flavor, RegexFlags, RegexSource};

/// Characters that may be escaped in unicode mode
const SYNTAX_CHARACTERS: &str = "^$\\.*+?()[]{}|/";

/// Whitespace skipped in verbose mode
const VERBOSE_WHITESPACE: [char; 6] = [' ', '\t', '\n', '\r', '\u{0B}', '\u{0C}'];

/// Flags that inline groups can switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ModeFlags {
    ignore_case: bool,
    multiline: bool,
    dot_all: bool,
    verbose: bool,
}

impl ModeFlags {
    fn from_flags(flags: &RegexFlags) -> Self {
        Self {
            ignore_case: flags.ignore_case,
            multiline: flags.multiline,
            dot_all: flags.dot_all,
            verbose: false,
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            ignore_case: self.ignore_case || other.ignore_case,
            multiline: self.multiline || other.multiline,
            dot_all: self.dot_all || other.dot_all,
            verbose: self.verbose || other.verbose,
        }
    }

    /// `flags` with these modes switched on
    fn apply(self, flags: RegexFlags) -> RegexFlags {
        RegexFlags {
            ignore_case: self.ignore_case,
            multiline: self.multiline,
            dot_all: self.dot_all,
            ..flags
        }
    }

    /// Set or clear the mode named by a Python flag letter
    ///
    /// The type flags `a`, `u` and `L` carry no mode: predefined classes are
    /// ASCII-only in every flavor.
    fn set(&mut self, letter: char, value: bool) {
        match letter {
            'i' => self.ignore_case = value,
            'm' => self.multiline = value,
            's' => self.dot_all = value,
            'x' => self.verbose = value,
            _ => {}
        }
    }
}

/// A group whose closing parenthesis has not been seen yet
#[derive(Debug, Clone, Copy)]
struct OpenGroup {
    /// The `Group` node receiving alternatives
    group: NodeId,
    /// The alternative currently receiving terms
    sequence: NodeId,
    /// Subtree that terms of this group belong to
    subtree: SubtreeId,
    /// `LookAround` node to append to the parent when the group closes
    look_around: Option<NodeId>,
    /// Position of the opening parenthesis
    start: usize,
    /// Flags in effect outside the group
    outer_mode: ModeFlags,
}

/// Result of parsing an escape sequence
#[derive(Debug)]
enum Escape {
    Char(u32),
    Class(CodePointSet),
    Anchor(AnchorKind),
    BackReference(usize),
    NamedReference(String),
}

/// One side of a class range
#[derive(Debug)]
enum ClassAtom {
    Char(u32),
    Set(CodePointSet),
}

/// Pattern parser
pub struct RegexParser<'a> {
    source: &'a RegexSource,
    chars: Vec<char>,
    pos: usize,
    ast: RegexAst,
    stack: Vec<OpenGroup>,
    total_groups: usize,
    has_named_groups: bool,
    next_group: usize,
    named_references: Vec<(String, NodeId, usize)>,
    max_code_point: u32,
    mode: ModeFlags,
    global_mode: ModeFlags,
}

impl<'a> RegexParser<'a> {
    /// Create a parser for `source`
    pub fn new(source: &'a RegexSource) -> Self {
        Self::with_mode(source, ModeFlags::from_flags(&source.flags))
    }

    fn with_mode(source: &'a RegexSource, mode: ModeFlags) -> Self {
        let chars: Vec<char> = source.pattern.chars().collect();
        let (total_groups, has_named_groups) = scan_groups(&chars, source.flavor);
        Self {
            source,
            chars,
            pos: 0,
            ast: RegexAst::new(mode.apply(source.flags), source.flavor, source.encoding),
            stack: Vec::new(),
            total_groups,
            has_named_groups,
            next_group: 1,
            named_references: Vec::new(),
            max_code_point: source.encoding.max_code_point(),
            mode,
            global_mode: ModeFlags::default(),
        }
    }

    /// Parse the whole pattern in a single pass
    ///
    /// Python global flags found along the way do not affect the text
    /// before them; [`parse`] reruns the parser until they are stable.
    pub fn parse(self) -> Result<RegexAst, SyntaxError> {
        self.run().map(|(ast, _)| ast)
    }

    /// Parse, also returning the global flags the pattern switched on
    fn run(mut self) -> Result<(RegexAst, ModeFlags), SyntaxError> {
        let root = self.new_group(Some(0), 0);
        let root_sequence = self.first_alternative(root);
        self.ast.add_subtree(root, None, None);
        self.stack.push(OpenGroup {
            group: root,
            sequence: root_sequence,
            subtree: ROOT_SUBTREE,
            look_around: None,
            start: 0,
            outer_mode: self.mode,
        });

        while let Some(c) = self.peek() {
            let start = self.pos;
            if self.mode.verbose && self.skip_verbose(c) {
                continue;
            }
            match c {
                '|' => {
                    self.pos += 1;
                    let sequence = self.ast.add(NodeKind::Sequence(Vec::new()), self.pos);
                    let top = self.top_mut();
                    top.sequence = sequence;
                    let group = top.group;
                    if let NodeKind::Group { alternatives, .. } = &mut self.ast.node_mut(group).kind {
                        alternatives.push(sequence);
                    }
                }
                '(' => self.open_group()?,
                ')' => self.close_group()?,
                '*' | '+' | '?' => {
                    self.pos += 1;
                    let quantifier = match c {
                        '*' => Quantifier::star(true),
                        '+' => Quantifier::plus(true),
                        _ => Quantifier::optional(true),
                    };
                    self.apply_quantifier(quantifier, start)?;
                }
                '{' => match self.try_parse_braces()? {
                    Some(quantifier) => self.apply_quantifier(quantifier, start)?,
                    None if self.unicode() => {
                        return Err(self.error("Lone quantifier brackets", start));
                    }
                    None => {
                        self.pos += 1;
                        self.push_literal('{' as u32, start);
                    }
                },
                '}' | ']' if self.unicode() => {
                    return Err(self.error("Lone quantifier brackets", start));
                }
                '[' => {
                    let (set, negated) = self.parse_class()?;
                    self.push_class(set, negated, true, start);
                }
                '^' => {
                    self.pos += 1;
                    let kind = if self.mode.multiline {
                        AnchorKind::LineStart
                    } else {
                        AnchorKind::Start
                    };
                    self.push_term(NodeKind::Anchor(kind), start);
                }
                '$' => {
                    self.pos += 1;
                    let kind = if self.mode.multiline {
                        AnchorKind::LineEnd
                    } else {
                        AnchorKind::End
                    };
                    self.push_term(NodeKind::Anchor(kind), start);
                }
                '.' => {
                    self.pos += 1;
                    let set = dot_set(self.mode.dot_all, self.max_code_point);
                    self.push_class(set, false, false, start);
                }
                '\\' => {
                    self.pos += 1;
                    match self.parse_escape(false)? {
                        Escape::Char(cp) => self.push_literal(cp, start),
                        Escape::Class(set) => self.push_class(set, false, true, start),
                        Escape::Anchor(kind) => {
                            self.push_term(NodeKind::Anchor(kind), start);
                        }
                        Escape::BackReference(group) => {
                            self.push_back_reference(group, start);
                        }
                        Escape::NamedReference(name) => {
                            let node = self.push_back_reference(0, start);
                            self.named_references.push((name, node, start));
                        }
                    }
                }
                _ => {
                    self.pos += 1;
                    self.push_literal(c as u32, start);
                }
            }
        }

        if self.stack.len() > 1 {
            let start = self.top().start;
            return Err(self.error("Unterminated group", start));
        }

        self.resolve_named_references()?;
        self.ast.set_capture_groups(self.next_group);
        Ok((self.ast, self.global_mode))
    }

    /// Skip whitespace or a `#` comment in verbose mode
    fn skip_verbose(&mut self, c: char) -> bool {
        if VERBOSE_WHITESPACE.contains(&c) {
            self.pos += 1;
            return true;
        }
        if c != '#' {
            return false;
        }
        while let Some(c) = self.next() {
            if c == '\\' {
                self.pos += 1;
            } else if c == '\n' {
                break;
            }
        }
        self.pos = self.pos.min(self.chars.len());
        true
    }

    // ========================================================================
    // Groups
    // ========================================================================

    fn open_group(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;

        if !self.eat('?') {
            let index = self.next_group;
            self.next_group += 1;
            self.push_group(Some(index as u16), None, start);
            return Ok(());
        }

        match self.next() {
            Some(':') => self.push_group(None, None, start),
            Some('=') => self.push_group(None, Some((LookAroundKind::LookAhead, false)), start),
            Some('!') => self.push_group(None, Some((LookAroundKind::LookAhead, true)), start),
            Some('<') if self.eat('=') => {
                self.push_group(None, Some((LookAroundKind::LookBehind, false)), start)
            }
            Some('<') if self.eat('!') => {
                self.push_group(None, Some((LookAroundKind::LookBehind, true)), start)
            }
            Some('<') => {
                let name = self.parse_group_name('>')?;
                self.open_named_group(name, start)?;
            }
            Some('P') if self.source.flavor == Flavor::Python => match self.next() {
                Some('<') => {
                    let name = self.parse_group_name('>')?;
                    self.open_named_group(name, start)?;
                }
                Some('=') => {
                    let name = self.parse_group_name(')')?;
                    let Some(&group) = self.ast.named_groups().get(&name) else {
                        return Err(self.error(format!("unknown group name '{}'", name), start));
                    };
                    self.push_back_reference(group, start);
                }
                _ => return Err(self.error("unknown extension ?P", start)),
            },
            Some('#') if self.source.flavor == Flavor::Python => {
                while let Some(c) = self.next() {
                    if c == ')' {
                        return Ok(());
                    }
                }
                return Err(self.error("missing ), unterminated comment", start));
            }
            Some(c) if self.source.flavor == Flavor::Python && (is_python_flag(c) || c == '-') => {
                self.pos -= 1;
                self.inline_flags(start)?;
            }
            _ => return Err(self.error("Invalid group", start)),
        }
        Ok(())
    }

    /// Parse `(?flags)`, `(?flags:` or `(?flags-flags:` after the `(?`
    fn inline_flags(&mut self, start: usize) -> Result<(), SyntaxError> {
        let on = self.flag_letters()?;
        match self.next() {
            Some(')') => {
                for &letter in &on {
                    self.global_mode.set(letter, true);
                    self.mode.set(letter, true);
                }
                Ok(())
            }
            Some(':') => {
                self.check_scoped(&on, &[])?;
                self.open_scoped(&on, &[], start);
                Ok(())
            }
            Some('-') => {
                let off = self.flag_letters()?;
                if off.is_empty() {
                    return Err(self.error("missing flag", self.pos));
                }
                if off.iter().any(|c| matches!(c, 'a' | 'u')) {
                    return Err(self.error("bad inline flags: cannot turn off flags 'a', 'u' and 'L'", self.pos));
                }
                if !self.eat(':') {
                    return Err(self.error("missing :", self.pos));
                }
                if on.iter().any(|c| off.contains(c)) {
                    return Err(self.error("bad inline flags: flag turned on and off", self.pos));
                }
                self.check_scoped(&on, &off)?;
                self.open_scoped(&on, &off, start);
                Ok(())
            }
            Some(c) if c.is_alphabetic() => Err(self.error("unknown flag", self.pos - 1)),
            _ => Err(self.error("missing -, : or )", self.pos)),
        }
    }

    /// Collect flag letters, rejecting incompatible type flags
    fn flag_letters(&mut self) -> Result<Vec<char>, SyntaxError> {
        let mut letters = Vec::new();
        while let Some(c) = self.peek().filter(|&c| is_python_flag(c)) {
            self.pos += 1;
            if c == 'L' {
                return Err(self.error("bad inline flags: cannot use 'L' flag with a str pattern", self.pos));
            }
            letters.push(c);
            if letters.contains(&'a') && letters.contains(&'u') {
                return Err(self.error("bad inline flags: flags 'a', 'u' and 'L' are incompatible", self.pos));
            }
        }
        Ok(letters)
    }

    fn check_scoped(&self, on: &[char], off: &[char]) -> Result<(), SyntaxError> {
        if on.contains(&'t') || off.contains(&'t') {
            let verb = if on.contains(&'t') { "on" } else { "off" };
            return Err(self.error(format!("bad inline flags: cannot turn {} global flag", verb), self.pos));
        }
        Ok(())
    }

    /// Open a non-capturing group with `on`/`off` applied until it closes
    fn open_scoped(&mut self, on: &[char], off: &[char], start: usize) {
        self.push_group(None, None, start);
        for &letter in on {
            self.mode.set(letter, true);
        }
        for &letter in off {
            self.mode.set(letter, false);
        }
    }

    fn open_named_group(&mut self, name: String, start: usize) -> Result<(), SyntaxError> {
        let index = self.next_group;
        if !self.ast.add_named_group(name, index) {
            return Err(self.error("Duplicate capture group name", start));
        }
        self.next_group += 1;
        self.push_group(Some(index as u16), None, start);
        Ok(())
    }

    fn push_group(
        &mut self,
        capture: Option<u16>,
        look_around: Option<(LookAroundKind, bool)>,
        start: usize,
    ) {
        let group = self.new_group(capture, start);
        let sequence = self.first_alternative(group);
        let parent_subtree = self.top().subtree;
        let (subtree, look_around_node) = match look_around {
            Some((kind, negated)) => {
                let subtree = self
                    .ast
                    .add_subtree(group, Some(parent_subtree), Some((kind, negated)));
                let node = self.ast.add(
                    NodeKind::LookAround {
                        subtree,
                        kind,
                        negated,
                    },
                    start,
                );
                (subtree, Some(node))
            }
            None => (parent_subtree, None),
        };
        self.stack.push(OpenGroup {
            group,
            sequence,
            subtree,
            look_around: look_around_node,
            start,
            outer_mode: self.mode,
        });
    }

    fn close_group(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        if self.stack.len() <= 1 {
            return Err(self.error("Unmatched ')'", start));
        }
        self.pos += 1;
        let Some(closed) = self.stack.pop() else {
            return Err(self.error("Unmatched ')'", start));
        };
        self.mode = closed.outer_mode;
        let term = closed.look_around.unwrap_or(closed.group);
        let sequence = self.top().sequence;
        self.append(sequence, term);
        Ok(())
    }

    fn parse_group_name(&mut self, terminator: char) -> Result<String, SyntaxError> {
        let start = self.pos;
        let mut name = String::new();
        loop {
            match self.next() {
                Some(c) if c == terminator => break,
                Some(c) => name.push(c),
                None => return Err(self.error("Invalid capture group name", start)),
            }
        }
        let valid = match self.source.flavor {
            Flavor::Python => is_python_identifier(&name),
            Flavor::EcmaScript => is_ecmascript_identifier(&name),
        };
        if !valid {
            return Err(self.error("Invalid capture group name", start));
        }
        Ok(name)
    }

    fn resolve_named_references(&mut self) -> Result<(), SyntaxError> {
        let references = std::mem::take(&mut self.named_references);
        for (name, node, position) in references {
            let Some(&group) = self.ast.named_groups().get(&name) else {
                return Err(self.error("Invalid named capture referenced", position));
            };
            if let NodeKind::BackReference { group: target, .. } = &mut self.ast.node_mut(node).kind {
                *target = group as u16;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Quantifiers
    // ========================================================================

    fn try_parse_braces(&mut self) -> Result<Option<Quantifier>, SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let Some(min) = self.parse_decimal() else {
            self.pos = start;
            return Ok(None);
        };
        let max = if self.eat(',') {
            if self.peek() == Some('}') {
                None
            } else {
                match self.parse_decimal() {
                    Some(max) => Some(max),
                    None => {
                        self.pos = start;
                        return Ok(None);
                    }
                }
            }
        } else {
            Some(min)
        };
        if !self.eat('}') {
            self.pos = start;
            return Ok(None);
        }
        if let Some(max) = max {
            if max < min {
                return Err(self.error("numbers out of order in {} quantifier", start));
            }
        }
        Ok(Some(Quantifier::new(min, max, true)))
    }

    fn apply_quantifier(&mut self, mut quantifier: Quantifier, start: usize) -> Result<(), SyntaxError> {
        if self.eat('?') {
            quantifier.greedy = false;
        }
        let sequence = self.top().sequence;
        let last = match self.ast.kind(sequence) {
            NodeKind::Sequence(terms) => terms.last().copied(),
            _ => None,
        };
        let Some(last) = last else {
            return Err(self.error("Nothing to repeat", start));
        };
        let repeatable = match self.ast.kind(last) {
            NodeKind::Anchor(_) | NodeKind::Quantified { .. } => false,
            NodeKind::LookAround { kind, .. } => {
                *kind == LookAroundKind::LookAhead && !self.unicode()
            }
            _ => true,
        };
        if !repeatable {
            return Err(self.error("Nothing to repeat", start));
        }
        let quantified = self.ast.add(
            NodeKind::Quantified {
                term: last,
                quantifier,
            },
            start,
        );
        if let NodeKind::Sequence(terms) = &mut self.ast.node_mut(sequence).kind {
            if let Some(slot) = terms.last_mut() {
                *slot = quantified;
            }
        }
        Ok(())
    }

    fn parse_decimal(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            self.pos += 1;
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(d));
        }
        value
    }

    // ========================================================================
    // Character classes
    // ========================================================================

    fn parse_class(&mut self) -> Result<(CodePointSet, bool), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let negated = self.eat('^');
        let mut ranges: Vec<(u32, u32)> = Vec::new();
        let mut sets: Vec<CodePointSet> = Vec::new();

        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated character class", start)),
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }
            let atom_start = self.pos;
            let lo = self.parse_class_atom()?;
            let is_range = self.peek() == Some('-')
                && self.peek_at(1).is_some()
                && self.peek_at(1) != Some(']');
            if !is_range {
                push_atom(lo, &mut ranges, &mut sets);
                continue;
            }
            self.pos += 1;
            let hi = self.parse_class_atom()?;
            match (lo, hi) {
                (ClassAtom::Char(a), ClassAtom::Char(b)) => {
                    if a > b {
                        return Err(self.error("Range out of order in character class", atom_start));
                    }
                    ranges.push((a, b));
                }
                (lo, hi) => {
                    if self.unicode() {
                        return Err(self.error("Invalid character class", atom_start));
                    }
                    push_atom(lo, &mut ranges, &mut sets);
                    ranges.push(('-' as u32, '-' as u32));
                    push_atom(hi, &mut ranges, &mut sets);
                }
            }
        }

        let mut set = CodePointSet::from_ranges(ranges);
        for other in &sets {
            set = set.union(other);
        }
        Ok((set, negated))
    }

    fn parse_class_atom(&mut self) -> Result<ClassAtom, SyntaxError> {
        let start = self.pos;
        let Some(c) = self.next() else {
            return Err(self.error("Unterminated character class", start));
        };
        if c != '\\' {
            return Ok(ClassAtom::Char(c as u32));
        }
        match self.parse_escape(true)? {
            Escape::Char(cp) => Ok(ClassAtom::Char(cp)),
            Escape::Class(set) => Ok(ClassAtom::Set(set)),
            _ => Err(self.error("Invalid class escape", start)),
        }
    }

    // ========================================================================
    // Escapes
    // ========================================================================

    /// Parse the escape following a backslash (already consumed)
    fn parse_escape(&mut self, in_class: bool) -> Result<Escape, SyntaxError> {
        let start = self.pos.saturating_sub(1);
        let Some(c) = self.next() else {
            return Err(self.error("\\ at end of pattern", start));
        };
        let unicode = self.unicode();

        if let Some(class) = ClassEscape::from_escape(c) {
            let fold = unicode && self.mode.ignore_case;
            return Ok(Escape::Class(class.to_set(self.max_code_point, fold)));
        }

        let escape = match c {
            'b' if in_class => Escape::Char(0x08),
            'b' => Escape::Anchor(AnchorKind::WordBoundary),
            'B' if !in_class => Escape::Anchor(AnchorKind::NonWordBoundary),
            'n' => Escape::Char(0x0A),
            'r' => Escape::Char(0x0D),
            't' => Escape::Char(0x09),
            'f' => Escape::Char(0x0C),
            'v' => Escape::Char(0x0B),
            '0' if !self.peek().is_some_and(|d| d.is_ascii_digit()) => Escape::Char(0),
            '0'..='9' => self.parse_decimal_escape(c, in_class, start)?,
            'k' if !in_class && (unicode || self.has_named_groups) => {
                if !self.eat('<') {
                    return Err(self.error("Invalid named reference", start));
                }
                Escape::NamedReference(self.parse_group_name('>')?)
            }
            'x' => match self.parse_hex_digits(2) {
                Some(value) => Escape::Char(value),
                None if unicode => return Err(self.error("Invalid escape", start)),
                None => Escape::Char('x' as u32),
            },
            'u' => match self.parse_unicode_escape() {
                Some(value) => Escape::Char(value),
                None if unicode => return Err(self.error("Invalid Unicode escape", start)),
                None => Escape::Char('u' as u32),
            },
            'c' => match self.peek() {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    self.pos += 1;
                    Escape::Char(letter as u32 % 32)
                }
                _ if unicode => return Err(self.error("Invalid unicode escape", start)),
                _ => {
                    // `\c` without a letter is a literal backslash; `c` is re-read
                    self.pos -= 1;
                    Escape::Char('\\' as u32)
                }
            },
            'p' | 'P' if unicode => {
                let negated = c == 'P';
                if !self.eat('{') {
                    return Err(self.error("Invalid property name", start));
                }
                let mut name = String::new();
                loop {
                    match self.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(self.error("Invalid property name", start)),
                    }
                }
                let Some(set) = property_set(&name, self.max_code_point) else {
                    return Err(self.error("Invalid property name", start));
                };
                if negated {
                    Escape::Class(set.complement(self.max_code_point))
                } else {
                    Escape::Class(set)
                }
            }
            'A' if !in_class && self.source.flavor == Flavor::Python => {
                Escape::Anchor(AnchorKind::Start)
            }
            'Z' if !in_class && self.source.flavor == Flavor::Python => {
                Escape::Anchor(AnchorKind::End)
            }
            _ => {
                let allowed = SYNTAX_CHARACTERS.contains(c) || (in_class && c == '-');
                if unicode && !allowed {
                    return Err(self.error("Invalid escape", start));
                }
                Escape::Char(c as u32)
            }
        };
        Ok(escape)
    }

    fn parse_decimal_escape(
        &mut self,
        first: char,
        in_class: bool,
        start: usize,
    ) -> Result<Escape, SyntaxError> {
        let digits_start = self.pos - 1;
        if !in_class && first != '0' {
            self.pos = digits_start;
            if let Some(n) = self.parse_decimal() {
                if (n as usize) < self.total_groups {
                    return Ok(Escape::BackReference(n as usize));
                }
            }
            self.pos = digits_start + 1;
        }
        if self.unicode() {
            return Err(self.error("Invalid decimal escape", start));
        }
        if first >= '8' {
            return Ok(Escape::Char(first as u32));
        }
        // legacy octal: up to three digits, value at most 0o377
        let mut value = first.to_digit(8).unwrap_or(0);
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) if value * 8 + d <= 0o377 => {
                    value = value * 8 + d;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        Ok(Escape::Char(value))
    }

    fn parse_hex_digits(&mut self, count: usize) -> Option<u32> {
        let start = self.pos;
        let mut value = 0u32;
        for _ in 0..count {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    value = value * 16 + d;
                    self.pos += 1;
                }
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }
        Some(value)
    }

    fn parse_unicode_escape(&mut self) -> Option<u32> {
        let start = self.pos;
        if self.unicode() && self.eat('{') {
            let mut value = 0u32;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                self.pos += 1;
                digits += 1;
                value = value.saturating_mul(16).saturating_add(d);
            }
            if digits == 0 || value > 0x10FFFF || !self.eat('}') {
                self.pos = start;
                return None;
            }
            return Some(value);
        }
        let high = self.parse_hex_digits(4)?;
        if self.unicode() && (0xD800..=0xDBFF).contains(&high) {
            let save = self.pos;
            if self.eat('\\') && self.eat('u') {
                if let Some(low) = self.parse_hex_digits(4) {
                    if (0xDC00..=0xDFFF).contains(&low) {
                        return Some(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00));
                    }
                }
            }
            self.pos = save;
        }
        Some(high)
    }

    // ========================================================================
    // Tree building
    // ========================================================================

    fn new_group(&mut self, capture: Option<u16>, position: usize) -> NodeId {
        self.ast.add(
            NodeKind::Group {
                alternatives: Vec::new(),
                capture,
            },
            position,
        )
    }

    fn first_alternative(&mut self, group: NodeId) -> NodeId {
        let position = self.ast.node(group).position as usize;
        let sequence = self.ast.add(NodeKind::Sequence(Vec::new()), position);
        if let NodeKind::Group { alternatives, .. } = &mut self.ast.node_mut(group).kind {
            alternatives.push(sequence);
        }
        sequence
    }

    fn append(&mut self, sequence: NodeId, term: NodeId) {
        if let NodeKind::Sequence(terms) = &mut self.ast.node_mut(sequence).kind {
            terms.push(term);
        }
    }

    fn push_term(&mut self, kind: NodeKind, position: usize) -> NodeId {
        let node = self.ast.add(kind, position);
        let sequence = self.top().sequence;
        self.append(sequence, node);
        node
    }

    fn push_back_reference(&mut self, group: usize, position: usize) -> NodeId {
        let kind = NodeKind::BackReference {
            group: group as u16,
            ignore_case: self.mode.ignore_case,
        };
        self.push_term(kind, position)
    }

    fn push_literal(&mut self, cp: u32, position: usize) {
        self.push_class(CodePointSet::single(cp), false, true, position);
    }

    /// Append a class term, applying case folding, negation and the encoding range
    fn push_class(&mut self, set: CodePointSet, negated: bool, fold: bool, position: usize) {
        let mut set = if fold && self.mode.ignore_case {
            set.case_fold(self.unicode())
        } else {
            set
        };
        if negated {
            set = set.complement(self.max_code_point);
        }
        let set = set.intersection(&CodePointSet::full(self.max_code_point));
        self.push_term(NodeKind::CharClass(set), position);
    }

    // ========================================================================
    // Cursor helpers
    // ========================================================================

    #[inline]
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    #[inline]
    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    #[inline]
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unicode(&self) -> bool {
        self.source.flags.unicode
    }

    fn top(&self) -> &OpenGroup {
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut OpenGroup {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn error(&self, message: impl Into<String>, position: usize) -> SyntaxError {
        SyntaxError::new(message, self.source.pattern.clone(), position)
    }
}

/// Parse `source` into an AST
pub fn parse(source: &RegexSource) -> Result<RegexAst, SyntaxError> {
    let mut mode = ModeFlags::from_flags(&source.flags);
    loop {
        let (ast, global) = RegexParser::with_mode(source, mode).run()?;
        let merged = mode.union(global);
        if merged == mode {
            return Ok(ast);
        }
        log_debug!("global inline flags {:?}, parsing {} again", global, source);
        mode = merged;
    }
}

fn is_python_flag(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'L' | 'm' | 's' | 't' | 'u' | 'x')
}

fn push_atom(atom: ClassAtom, ranges: &mut Vec<(u32, u32)>, sets: &mut Vec<CodePointSet>) {
    match atom {
        ClassAtom::Char(cp) => ranges.push((cp, cp)),
        ClassAtom::Set(set) => sets.push(set),
    }
}

/// Count capture groups (including group 0) and detect named groups
fn scan_groups(chars: &[char], flavor: Flavor) -> (usize, bool) {
    let mut count = 1;
    let mut named = false;
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class && flavor == Flavor::Python && chars[i + 1..].starts_with(&['?', '#']) => {
                while i < chars.len() && chars[i] != ')' {
                    i += 1;
                }
            }
            '(' if !in_class => {
                let next = chars.get(i + 1).copied();
                let after = chars.get(i + 2).copied();
                let third = chars.get(i + 3).copied();
                if next != Some('?') {
                    count += 1;
                } else if after == Some('<') && third != Some('=') && third != Some('!') {
                    count += 1;
                    named = true;
                } else if flavor == Flavor::Python && after == Some('P') && third == Some('<') {
                    count += 1;
                    named = true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    (count, named)
}

fn is_ecmascript_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '$' || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '$' | '_' | '\u{200C}' | '\u{200D}'))
}

fn is_python_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(pattern: &str, flags: &str) -> Result<RegexAst, SyntaxError> {
        let source = RegexSource::parse(pattern, flags).unwrap();
        parse(&source)
    }

    fn root_terms(ast: &RegexAst) -> Vec<NodeId> {
        match ast.kind(ast.root()) {
            NodeKind::Group { alternatives, .. } => match ast.kind(alternatives[0]) {
                NodeKind::Sequence(terms) => terms.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_literal_sequence() {
        let ast = parse_str("abc", "").unwrap();
        let terms = root_terms(&ast);
        assert_eq!(terms.len(), 3);
        assert!(matches!(ast.kind(terms[1]), NodeKind::CharClass(set) if set.single_code_point() == Some('b' as u32)));
        assert_eq!(ast.capture_groups(), 1);
    }

    #[test]
    fn test_alternation_and_groups() {
        let ast = parse_str("a(b|c)(?:d)", "").unwrap();
        assert_eq!(ast.capture_groups(), 2);
        let terms = root_terms(&ast);
        assert!(matches!(ast.kind(terms[1]), NodeKind::Group { alternatives, capture: Some(1) } if alternatives.len() == 2));
        assert!(matches!(ast.kind(terms[2]), NodeKind::Group { capture: None, .. }));
    }

    #[test]
    fn test_quantifiers() {
        let ast = parse_str("a*?b{2,5}c{3,}", "").unwrap();
        let terms = root_terms(&ast);
        assert!(matches!(ast.kind(terms[0]), NodeKind::Quantified { quantifier, .. } if quantifier == &Quantifier::star(false)));
        assert!(matches!(ast.kind(terms[1]), NodeKind::Quantified { quantifier, .. } if quantifier.min == 2 && quantifier.max == Some(5)));
        assert!(matches!(ast.kind(terms[2]), NodeKind::Quantified { quantifier, .. } if quantifier.min == 3 && quantifier.max.is_none()));
    }

    #[test]
    fn test_lone_brace_is_literal_without_unicode() {
        let ast = parse_str("a{,5}", "").unwrap();
        assert_eq!(root_terms(&ast).len(), 5);
        assert!(parse_str("a{,5}", "u").is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_str("a(b", "").unwrap_err().message, "Unterminated group");
        assert_eq!(parse_str("a)", "").unwrap_err().message, "Unmatched ')'");
        assert_eq!(parse_str("*a", "").unwrap_err().message, "Nothing to repeat");
        assert_eq!(parse_str("a**", "").unwrap_err().message, "Nothing to repeat");
        assert_eq!(
            parse_str("a{5,2}", "").unwrap_err().message,
            "numbers out of order in {} quantifier"
        );
        assert_eq!(parse_str("[a-", "").unwrap_err().message, "Unterminated character class");
        assert_eq!(
            parse_str("[z-a]", "").unwrap_err().message,
            "Range out of order in character class"
        );
        assert_eq!(parse_str("\\q", "u").unwrap_err().message, "Invalid escape");
        assert_eq!(
            parse_str("(?<a>x)(?<a>y)", "").unwrap_err().message,
            "Duplicate capture group name"
        );
        assert_eq!(
            parse_str("\\k<nope>(?<a>x)", "").unwrap_err().message,
            "Invalid named capture referenced"
        );
        assert_eq!(parse_str("(?<1a>x)", "").unwrap_err().message, "Invalid capture group name");
    }

    #[test]
    fn test_error_position() {
        let err = parse_str("ab(cd", "").unwrap_err();
        assert_eq!(err.position, 2);
        let err = parse_str("abc[", "").unwrap_err();
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_escapes() {
        let ast = parse_str("\\x41\\u0042\\n\\cJ\\0", "").unwrap();
        let cps: Vec<u32> = root_terms(&ast)
            .into_iter()
            .filter_map(|t| match ast.kind(t) {
                NodeKind::CharClass(set) => set.single_code_point(),
                _ => None,
            })
            .collect();
        assert_eq!(cps, vec![0x41, 0x42, 0x0A, 0x0A, 0]);

        let ast = parse_str("\\u{1F600}\\uD83D\\uDE00", "u").unwrap();
        let cps: Vec<u32> = root_terms(&ast)
            .into_iter()
            .filter_map(|t| match ast.kind(t) {
                NodeKind::CharClass(set) => set.single_code_point(),
                _ => None,
            })
            .collect();
        assert_eq!(cps, vec![0x1F600, 0x1F600]);
    }

    #[test]
    fn test_anchor_escapes() {
        let ast = parse_str("\\ba\\B", "").unwrap();
        let kinds: Vec<_> = root_terms(&ast).into_iter().map(|t| ast.kind(t).clone()).collect();
        assert!(matches!(kinds[0], NodeKind::Anchor(AnchorKind::WordBoundary)));
        assert!(matches!(kinds[1], NodeKind::CharClass(_)));
        assert!(matches!(kinds[2], NodeKind::Anchor(AnchorKind::NonWordBoundary)));
    }

    #[test]
    fn test_back_references_and_octal() {
        let ast = parse_str("(a)\\1", "").unwrap();
        assert!(matches!(ast.kind(root_terms(&ast)[1]), NodeKind::BackReference { group: 1, .. }));

        // no group 2: legacy octal escape
        let ast = parse_str("(a)\\2", "").unwrap();
        assert!(matches!(ast.kind(root_terms(&ast)[1]), NodeKind::CharClass(set) if set.single_code_point() == Some(2)));

        // forward reference to a later group
        let ast = parse_str("\\1(a)", "").unwrap();
        assert!(matches!(ast.kind(root_terms(&ast)[0]), NodeKind::BackReference { group: 1, .. }));
    }

    #[test]
    fn test_named_groups_and_references() {
        let ast = parse_str("(?<x>a)(?<y>b)\\k<x>", "").unwrap();
        assert_eq!(ast.named_groups()["x"], 1);
        assert_eq!(ast.named_groups()["y"], 2);
        assert!(matches!(ast.kind(root_terms(&ast)[2]), NodeKind::BackReference { group: 1, .. }));
    }

    #[test]
    fn test_look_arounds_create_subtrees() {
        let ast = parse_str("a(?=b(?<!c))", "").unwrap();
        assert_eq!(ast.subtrees().len(), 3);
        assert_eq!(ast.subtree(1).parent, Some(0));
        assert_eq!(ast.subtree(2).parent, Some(1));
        assert_eq!(ast.subtree(2).look_around, Some((LookAroundKind::LookBehind, true)));
        assert_eq!(ast.child_subtrees(0), vec![1]);
    }

    #[test]
    fn test_classes() {
        let ast = parse_str("[a-c\\d-]", "").unwrap();
        let NodeKind::CharClass(set) = ast.kind(root_terms(&ast)[0]) else {
            panic!("expected class");
        };
        assert!(set.contains('b' as u32));
        assert!(set.contains('5' as u32));
        assert!(set.contains('-' as u32));
        assert!(!set.contains('d' as u32));

        let ast = parse_str("[^a]", "i").unwrap();
        let NodeKind::CharClass(set) = ast.kind(root_terms(&ast)[0]) else {
            panic!("expected class");
        };
        assert!(!set.contains('A' as u32));
        assert!(set.contains('b' as u32));
    }

    #[test]
    fn test_ignore_case_folds_literals() {
        let ast = parse_str("k", "i").unwrap();
        let NodeKind::CharClass(set) = ast.kind(root_terms(&ast)[0]) else {
            panic!("expected class");
        };
        assert!(set.contains('K' as u32));
    }

    #[test]
    fn test_python_flavor() {
        let source = RegexSource::parse("(?P<word>a+)(?P=word)\\Z", "")
            .unwrap()
            .with_flavor(Flavor::Python);
        let ast = parse(&source).unwrap();
        assert_eq!(ast.named_groups()["word"], 1);
        let terms = root_terms(&ast);
        assert!(matches!(ast.kind(terms[1]), NodeKind::BackReference { group: 1, .. }));
        assert!(matches!(ast.kind(terms[2]), NodeKind::Anchor(AnchorKind::End)));

        let source = RegexSource::parse("(?P=missing)", "")
            .unwrap()
            .with_flavor(Flavor::Python);
        assert_eq!(parse(&source).unwrap_err().message, "unknown group name 'missing'");
    }

    fn parse_python(pattern: &str) -> Result<RegexAst, SyntaxError> {
        let source = RegexSource::parse(pattern, "")
            .unwrap()
            .with_flavor(Flavor::Python);
        parse(&source)
    }

    fn folds(ast: &RegexAst, term: NodeId, upper: char) -> bool {
        match ast.kind(term) {
            NodeKind::CharClass(set) => set.contains(upper as u32),
            _ => false,
        }
    }

    #[test]
    fn test_python_global_flags_apply_to_whole_pattern() {
        let ast = parse_python("ab(?i)c").unwrap();
        assert!(ast.flags.ignore_case);
        let terms = root_terms(&ast);
        assert_eq!(terms.len(), 3);
        assert!(folds(&ast, terms[0], 'A'));
        assert!(folds(&ast, terms[2], 'C'));

        let ast = parse_python("(?ms)^a.").unwrap();
        assert!(ast.flags.multiline && ast.flags.dot_all);
        assert!(matches!(ast.kind(root_terms(&ast)[0]), NodeKind::Anchor(AnchorKind::LineStart)));
    }

    #[test]
    fn test_python_scoped_flags() {
        let ast = parse_python("a(?i:b)c").unwrap();
        assert!(!ast.flags.ignore_case);
        let terms = root_terms(&ast);
        assert!(!folds(&ast, terms[0], 'A'));
        assert!(!folds(&ast, terms[2], 'C'));
        let NodeKind::Group { alternatives, capture: None } = ast.kind(terms[1]) else {
            panic!("expected group");
        };
        let NodeKind::Sequence(inner) = ast.kind(alternatives[0]) else {
            panic!("expected sequence");
        };
        assert!(folds(&ast, inner[0], 'B'));

        let ast = parse_python("(?i)a(?-i:(b)\\1)").unwrap();
        assert!(folds(&ast, root_terms(&ast)[0], 'A'));
        let back_reference = ast
            .preorder(ast.root(), true)
            .into_iter()
            .find(|&id| matches!(ast.kind(id), NodeKind::BackReference { .. }));
        assert!(matches!(
            back_reference.map(|id| ast.kind(id)),
            Some(NodeKind::BackReference { ignore_case: false, .. })
        ));
    }

    #[test]
    fn test_python_verbose_mode() {
        let ast = parse_python("(?x) a b # trailing comment (x)\n c\\ ").unwrap();
        let terms = root_terms(&ast);
        assert_eq!(terms.len(), 4);
        assert_eq!(ast.capture_groups(), 1);
        assert!(matches!(ast.kind(terms[3]), NodeKind::CharClass(set) if set.single_code_point() == Some(' ' as u32)));

        let ast = parse_python("a(?#note [b)c").unwrap();
        assert_eq!(root_terms(&ast).len(), 2);
        assert_eq!(ast.capture_groups(), 1);
    }

    #[test]
    fn test_python_flag_errors() {
        let message = |pattern: &str| parse_python(pattern).unwrap_err().message;
        assert_eq!(message("(?i"), "missing -, : or )");
        assert_eq!(message("(?iz)"), "unknown flag");
        assert_eq!(message("(?i-i:a)"), "bad inline flags: flag turned on and off");
        assert_eq!(message("(?-:a)"), "missing flag");
        assert_eq!(message("(?L)"), "bad inline flags: cannot use 'L' flag with a str pattern");
        assert_eq!(message("(?au)"), "bad inline flags: flags 'a', 'u' and 'L' are incompatible");
        assert_eq!(message("(?t:a)"), "bad inline flags: cannot turn on global flag");
        assert_eq!(message("(?#open"), "missing ), unterminated comment");
        assert_eq!(parse_str("(?i)a", "").unwrap_err().message, "Invalid group");
    }

    #[test]
    fn test_deep_nesting_is_iterative() {
        let pattern = format!("{}a{}", "(?:".repeat(5000), ")".repeat(5000));
        let ast = parse_str(&pattern, "").unwrap();
        assert!(ast.len() > 10000);
    }
}
