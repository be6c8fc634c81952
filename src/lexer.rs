// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::*;
use core::cmp;
use core::fmt;

use anyhow::{anyhow, bail, Result};

struct SourceText {
    file: String,
    contents: String,
    // Byte offset at which each line starts.
    line_starts: Vec<usize>,
}

/// A configuration file, or a snippet of one, holding expressions.
#[derive(Clone)]
pub struct Source {
    src: Rc<SourceText>,
}

// Sources are identities: two loads of the same text are different sources.
impl cmp::PartialEq for Source {
    fn eq(&self, other: &Source) -> bool {
        Rc::ptr_eq(&self.src, &other.src)
    }
}

impl cmp::Eq for Source {}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.src.file, f)
    }
}

impl Source {
    pub fn from_contents(file: String, contents: String) -> Result<Source> {
        // Spans store offsets as u32.
        if u32::try_from(contents.len()).is_err() {
            bail!("{file} is too large to be parsed");
        }

        let line_starts = core::iter::once(0)
            .chain(contents.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Ok(Self {
            src: Rc::new(SourceText {
                file,
                contents,
                line_starts,
            }),
        })
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Source> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("could not read {}: {e}", path.display()))?;
        Self::from_contents(path.display().to_string(), contents)
    }

    pub fn file(&self) -> &str {
        &self.src.file
    }

    pub fn contents(&self) -> &str {
        &self.src.contents
    }

    /// Text of the 1-based `line`, without its line terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.src.line_starts.get(idx)?;
        let end = match self.src.line_starts.get(idx + 1) {
            Some(next) => next - 1,
            None => self.src.contents.len(),
        };
        let text = &self.src.contents[start..end];
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Renders `msg` pointing at `line`:`col`, with the source line and a caret.
    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        let file = &self.src.file;
        let Some(text) = self.line_text(line) else {
            return format!("{file}: {kind}: {msg}");
        };
        let number = line.to_string();
        let gutter = " ".repeat(number.len());
        let indent = " ".repeat(col.saturating_sub(1) as usize);
        format!("\n--> {file}:{line}:{col}\n{gutter} |\n{number} | {text}\n{gutter} | {indent}^\n{kind}: {msg}")
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(line, col, "error", msg))
    }
}

/// Location of a token or expression within its source.
#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.line, self.col, msg)
    }
}

// Spans compare by position so that diagnostics built from the same
// expression compare equal.
impl cmp::PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.start == other.start && self.end == other.end
    }
}

impl cmp::Eq for Span {}

// Shown in logs, so long expressions are cut to their first characters.
impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SHOWN: usize = 32;
        let text = self.text();
        let mut shown: String = text.chars().take(SHOWN).collect();
        if shown.len() < text.len() {
            shown.push_str("...");
        }
        write!(f, "{}:{}:{}:{}, {shown:?}", self.line, self.col, self.start, self.end)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    Symbol,
    /// A string literal. The span covers the text between the quotes.
    String,
    Number,
    Ident,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

/// Replaces the escape sequences accepted by the lexer in the text of a
/// string literal.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => (),
        }
    }
    out
}

/// Splits the text of a [`Source`] into tokens.
///
/// Whitespace and line comments (`#` or `//`) are skipped. Columns count
/// characters, starting at 1.
#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    text: &'source str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            text: source.contents(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn rest(&self) -> &'source str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        match ch {
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            _ => self.col += 1,
        }
        Some(ch)
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn token(&self, kind: TokenKind, col: u32, start: usize) -> Token {
        Token(
            kind,
            Span {
                source: self.source.clone(),
                line: self.line,
                col,
                start: start as u32,
                end: self.pos as u32,
            },
        )
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(' ' | '\t' | '\r' | '\n'), _) => {
                    self.bump();
                }
                (Some('#'), _) | (Some('/'), Some('/')) => self.bump_while(|c| c != '\n'),
                _ => break,
            }
        }
    }

    // Identifiers may contain dashes after the first character, as in
    // resource names like `web-server`. `set` directly followed by `()`
    // is the empty set and lexes as the single token `set(`.
    fn read_ident(&mut self) -> Token {
        let (start, col) = (self.pos, self.col);
        self.bump_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        let is_empty_set = &self.text[start..self.pos] == "set"
            && self
                .rest()
                .strip_prefix('(')
                .is_some_and(|r| r.trim_start().starts_with(')'));
        if is_empty_set {
            self.bump();
        }
        self.token(TokenKind::Ident, col, start)
    }

    // Digits with an optional fraction and exponent. The value is parsed by
    // the parser; here only the extent of the literal is decided.
    fn read_number(&mut self) -> Result<Token> {
        let (start, col) = (self.pos, self.col);
        self.bump_while(|c| c.is_ascii_digit());

        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.bump_while(|c| c.is_ascii_digit());
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.source.error(self.line, self.col, "exponent requires digits"));
            }
            self.bump_while(|c| c.is_ascii_digit());
        }

        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(self.source.error(self.line, col, "invalid number"));
        }
        Ok(self.token(TokenKind::Number, col, start))
    }

    // Strings are single line. The escapes are \" \\ \n \r and \t.
    fn read_string(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.source.error(line, col, "unterminated string")),
                Some('"') => break,
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some('"' | '\\' | 'n' | 'r' | 't') => {
                            self.bump();
                        }
                        _ => return Err(self.source.error(self.line, self.col, "invalid escape sequence")),
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let token = self.token(TokenKind::String, col + 1, start);
        self.bump();
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();
        let (start, col) = (self.pos, self.col);
        let Some(ch) = self.peek() else {
            return Ok(self.token(TokenKind::Eof, col, start));
        };

        match ch {
            '{' | '}' | '[' | ']' | '(' | ')' | ',' | '.' | ':' | '=' | '-' => {
                self.bump();
                Ok(self.token(TokenKind::Symbol, col, start))
            }
            '"' => self.read_string(),
            '0'..='9' => self.read_number(),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_ident()),
            c => Err(self.source.error(self.line, col, &format!("unexpected character `{c}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Result<Vec<(TokenKind, String)>> {
        let source = Source::from_contents("test.tf".to_string(), text.to_string())?;
        let mut lexer = Lexer::new(&source);
        let mut out = vec![];
        loop {
            let Token(kind, span) = lexer.next_token()?;
            if kind == TokenKind::Eof {
                return Ok(out);
            }
            out.push((kind, span.text().to_string()));
        }
    }

    #[test]
    fn term_tokens() -> Result<()> {
        let toks = tokens("toset([\"a\", 1.5e3, web-1]) # trailing\n// another")?;
        let kinds: Vec<_> = toks.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Symbol,
                TokenKind::Symbol,
                TokenKind::String,
                TokenKind::Symbol,
                TokenKind::Number,
                TokenKind::Symbol,
                TokenKind::Ident,
                TokenKind::Symbol,
                TokenKind::Symbol,
            ]
        );
        assert_eq!(toks[3].1, "a");
        assert_eq!(toks[5].1, "1.5e3");
        assert_eq!(toks[7].1, "web-1");
        Ok(())
    }

    #[test]
    fn empty_set_token() -> Result<()> {
        assert_eq!(tokens("set( )")?[0].1, "set(");
        assert_eq!(tokens("set(x)")?[0].1, "set");
        Ok(())
    }

    #[test]
    fn strings() -> Result<()> {
        assert_eq!(unescape(&tokens(r#""a\"b\\c\n""#)?[0].1), "a\"b\\c\n");
        assert_eq!(tokens("\"héllo\"")?[0].1, "héllo");
        assert!(tokens(r#""\q""#).is_err());
        assert!(tokens("\"open").is_err());
        assert!(tokens("\"a\nb\"").is_err());
        Ok(())
    }

    #[test]
    fn bad_input() {
        assert!(tokens("12abc").is_err());
        assert!(tokens("1e").is_err());
        assert!(tokens("@").is_err());
    }

    #[test]
    fn locations() -> Result<()> {
        let source = Source::from_contents("test.tf".to_string(), "\r\n  \"é\" x".to_string())?;
        let mut lexer = Lexer::new(&source);
        let Token(_, s) = lexer.next_token()?;
        assert_eq!((s.line, s.col), (2, 4));
        let Token(_, x) = lexer.next_token()?;
        assert_eq!((x.line, x.col), (2, 7));

        let message = x.message("error", "oops");
        assert!(message.contains("--> test.tf:2:7"), "{message}");
        assert!(message.contains("2 |   \"é\" x"), "{message}");
        Ok(())
    }

    #[test]
    fn debug_cuts_long_text_at_characters() -> Result<()> {
        let text = format!("\"{}é\"", "a".repeat(30));
        let source = Source::from_contents("test.tf".to_string(), text)?;
        let span = Span {
            source: source.clone(),
            line: 1,
            col: 1,
            start: 0,
            end: source.contents().len() as u32,
        };
        let shown = format!("{span:?}");
        assert!(shown.ends_with("aé...\""), "{shown}");
        Ok(())
    }
}
