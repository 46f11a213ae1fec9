// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{iter::Peekable, str::CharIndices};

use super::{QueryError, keywords::match_phrase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanState {
    Default,
    InSingleQuote,
    InDoubleQuote,
    InBacktick,
    InLineComment,
    InBlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Group {
    Paren,
    Bracket,
}

impl Group {
    fn close(self) -> char {
        match self {
            Group::Paren => ')',
            Group::Bracket => ']',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepKind {
    Code,
    Quoted,
    Comment,
}

/// One character as seen by the lexer. `depth` is the nesting level of the
/// context the character belongs to, so an opening `(` and its matching `)`
/// both report the depth outside the group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Step {
    pub(crate) offset: usize,
    pub(crate) ch: char,
    pub(crate) depth: usize,
    pub(crate) kind: StepKind,
}

impl Step {
    pub(crate) fn is_top_level(&self) -> bool {
        self.kind == StepKind::Code && self.depth == 0
    }
}

pub(crate) struct Lexer<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
    state: ScanState,
    state_start: usize,
    escape_next: bool,
    closing_comment: bool,
    groups: Vec<(Group, usize)>,
    error: Option<QueryError>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
            state: ScanState::Default,
            state_start: 0,
            escape_next: false,
            closing_comment: false,
            groups: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn step(&mut self) -> Option<Step> {
        let (offset, ch) = self.chars.next()?;
        let step = match self.state {
            ScanState::Default => self.code(offset, ch),
            ScanState::InSingleQuote => self.quoted(offset, ch, '\''),
            ScanState::InDoubleQuote => self.quoted(offset, ch, '"'),
            ScanState::InBacktick => self.quoted(offset, ch, '`'),
            ScanState::InLineComment => self.line_comment(offset, ch),
            ScanState::InBlockComment => self.block_comment(offset, ch),
        };
        Some(step)
    }

    /// Reports the first structural problem seen so far, or an unterminated
    /// quote, comment or group at end of input.
    pub(crate) fn finish(self) -> Result<(), QueryError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let rest = &self.text[self.state_start..];
        match self.state {
            ScanState::InSingleQuote | ScanState::InDoubleQuote => {
                return Err(QueryError::parse("unterminated quoted string", rest));
            }
            ScanState::InBacktick => {
                return Err(QueryError::parse("unterminated quoted identifier", rest));
            }
            ScanState::InBlockComment => {
                return Err(QueryError::parse("unterminated comment", rest));
            }
            ScanState::Default | ScanState::InLineComment => {}
        }
        if let Some((group, start)) = self.groups.last() {
            return Err(QueryError::parse(
                format!("missing closing `{}`", group.close()),
                &self.text[*start..],
            ));
        }
        Ok(())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn enter(&mut self, state: ScanState, offset: usize) {
        self.state = state;
        self.state_start = offset;
    }

    fn make(&self, offset: usize, ch: char, depth: usize, kind: StepKind) -> Step {
        Step {
            offset,
            ch,
            depth,
            kind,
        }
    }

    fn code(&mut self, offset: usize, ch: char) -> Step {
        let depth = self.groups.len();
        match ch {
            '\'' => {
                self.enter(ScanState::InSingleQuote, offset);
                self.make(offset, ch, depth, StepKind::Quoted)
            }
            '"' => {
                self.enter(ScanState::InDoubleQuote, offset);
                self.make(offset, ch, depth, StepKind::Quoted)
            }
            '`' => {
                self.enter(ScanState::InBacktick, offset);
                self.make(offset, ch, depth, StepKind::Quoted)
            }
            '-' if self.peek() == Some('-') => {
                self.enter(ScanState::InLineComment, offset);
                self.make(offset, ch, depth, StepKind::Comment)
            }
            '/' if self.peek() == Some('*') => {
                self.enter(ScanState::InBlockComment, offset);
                self.make(offset, ch, depth, StepKind::Comment)
            }
            '(' => {
                self.groups.push((Group::Paren, offset));
                self.make(offset, ch, depth, StepKind::Code)
            }
            '[' => {
                self.groups.push((Group::Bracket, offset));
                self.make(offset, ch, depth, StepKind::Code)
            }
            ')' | ']' => {
                match self.groups.last() {
                    Some((group, _)) if group.close() == ch => {
                        self.groups.pop();
                    }
                    _ => {
                        if self.error.is_none() {
                            self.error = Some(QueryError::parse(
                                format!("unexpected `{ch}`"),
                                &self.text[offset..],
                            ));
                        }
                    }
                }
                let depth = self.groups.len();
                self.make(offset, ch, depth, StepKind::Code)
            }
            _ => self.make(offset, ch, depth, StepKind::Code),
        }
    }

    fn quoted(&mut self, offset: usize, ch: char, quote: char) -> Step {
        let step = self.make(offset, ch, self.groups.len(), StepKind::Quoted);
        if self.escape_next {
            self.escape_next = false;
        } else if ch == '\\' {
            self.escape_next = true;
        } else if ch == quote {
            if self.peek() == Some(quote) {
                self.escape_next = true;
            } else {
                self.state = ScanState::Default;
            }
        }
        step
    }

    fn line_comment(&mut self, offset: usize, ch: char) -> Step {
        if ch == '\n' {
            self.state = ScanState::Default;
            return self.make(offset, ch, self.groups.len(), StepKind::Code);
        }
        self.make(offset, ch, self.groups.len(), StepKind::Comment)
    }

    fn block_comment(&mut self, offset: usize, ch: char) -> Step {
        if self.closing_comment {
            self.closing_comment = false;
            self.state = ScanState::Default;
        } else if ch == '*' && offset > self.state_start + 1 && self.peek() == Some('/') {
            self.closing_comment = true;
        }
        self.make(offset, ch, self.groups.len(), StepKind::Comment)
    }
}

/// Replaces every comment with a single space, leaving quoted text intact.
pub(crate) fn strip_comments(text: &str) -> Result<String, QueryError> {
    let mut lexer = Lexer::new(text);
    let mut out = String::with_capacity(text.len());
    let mut in_comment = false;
    while let Some(step) = lexer.step() {
        if step.kind == StepKind::Comment {
            if !in_comment {
                out.push(' ');
                in_comment = true;
            }
            continue;
        }
        in_comment = false;
        out.push(step.ch);
    }
    lexer.finish()?;
    Ok(out)
}

/// Splits on commas that sit at nesting depth zero, outside quotes and
/// outside `CASE … END` blocks. Each piece is trimmed; empty pieces are
/// dropped.
pub fn split_top_level(text: &str) -> Result<Vec<String>, QueryError> {
    let mut lexer = Lexer::new(text);
    let mut parts = Vec::new();
    let mut start = 0;
    let mut case_depth = 0usize;
    while let Some(step) = lexer.step() {
        if !step.is_top_level() {
            continue;
        }
        if step.ch == ',' && case_depth == 0 {
            push_part(&mut parts, &text[start..step.offset]);
            start = step.offset + 1;
        } else if starts_word(text, step.offset) {
            let word = word_at(text, step.offset);
            if word.eq_ignore_ascii_case("case") {
                case_depth += 1;
            } else if word.eq_ignore_ascii_case("end") && case_depth > 0 {
                case_depth -= 1;
            }
        }
    }
    lexer.finish()?;
    push_part(&mut parts, &text[start..]);
    Ok(parts)
}

fn push_part(parts: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
}

/// Finds the first top-level occurrence of a keyword phrase, returning the
/// byte range it covers.
pub(crate) fn find_keyword(
    text: &str,
    words: &[&str],
) -> Result<Option<(usize, usize)>, QueryError> {
    let mut lexer = Lexer::new(text);
    while let Some(step) = lexer.step() {
        if !step.is_top_level() || !at_keyword_start(text, step.offset) {
            continue;
        }
        if let Some(len) = match_phrase(&text[step.offset..], words) {
            return Ok(Some((step.offset, step.offset + len)));
        }
    }
    lexer.finish()?;
    Ok(None)
}

/// Given the offset of an opening `(`, returns the offset of its match.
pub(crate) fn matching_paren(text: &str, open: usize) -> Result<usize, QueryError> {
    let slice = &text[open..];
    let mut lexer = Lexer::new(slice);
    while let Some(step) = lexer.step() {
        if step.offset > 0 && step.is_top_level() && step.ch == ')' {
            return Ok(open + step.offset);
        }
    }
    lexer.finish()?;
    Err(QueryError::parse("missing closing `)`", slice))
}

pub(crate) fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn starts_word(text: &str, offset: usize) -> bool {
    let current = text[offset..].chars().next();
    let previous = text[..offset].chars().next_back();
    current.is_some_and(|ch| ch.is_ascii_alphabetic()) && !previous.is_some_and(is_ident_char)
}

fn word_at(text: &str, offset: usize) -> &str {
    let rest = &text[offset..];
    let end = rest.find(|ch: char| !is_ident_char(ch)).unwrap_or(rest.len());
    &rest[..end]
}

/// Keywords must be preceded by whitespace, a parenthesis or the start of
/// input.
pub(crate) fn at_keyword_start(text: &str, offset: usize) -> bool {
    let current = text[offset..].chars().next();
    let previous = text[..offset].chars().next_back();
    current.is_some_and(|ch| ch.is_ascii_alphabetic())
        && previous.is_none_or(is_keyword_boundary)
}

pub(crate) fn is_keyword_boundary(ch: char) -> bool {
    ch.is_whitespace() || ch == '(' || ch == ')'
}
