//! Tokenizer for Swift-like source.
//!
//! Only as much as the extractor needs: identifiers, punctuation, comments.
//! Literals are kept as opaque tokens so their contents never leak into
//! brace matching or directive scanning.

use crate::domain::error::ExtractionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// `@name` attribute
    Attribute(String),
    Punct(char),
    Arrow,
    Literal,
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == name)
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Attribute(s) => format!("@{s}"),
            TokenKind::Punct(c) => c.to_string(),
            TokenKind::Arrow => "->".to_string(),
            TokenKind::Literal => "literal".to_string(),
            TokenKind::Comment(_) => "comment".to_string(),
        }
    }
}

pub fn tokenize(source: &str, file: &str) -> Result<Vec<Token>, ExtractionError> {
    Lexer::new(source, file).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    file: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(source: &str, file: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            file,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn run(mut self) -> Result<Vec<Token>, ExtractionError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek(0) {
            let line = self.line;
            let kind = match c {
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                '/' if self.peek(1) == Some('/') => self.line_comment(),
                '/' if self.peek(1) == Some('*') => self.block_comment()?,
                '"' => self.string()?,
                '-' if self.peek(1) == Some('>') => {
                    self.pos += 2;
                    TokenKind::Arrow
                }
                '@' => {
                    self.bump();
                    TokenKind::Attribute(self.word())
                }
                '`' => {
                    self.bump();
                    let word = self.word();
                    if self.peek(0) == Some('`') {
                        self.bump();
                    }
                    TokenKind::Ident(word)
                }
                c if c.is_alphabetic() || c == '_' || c == '$' => TokenKind::Ident(self.word()),
                c if c.is_ascii_digit() => {
                    while self
                        .peek(0)
                        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
                    {
                        self.bump();
                    }
                    TokenKind::Literal
                }
                other => {
                    self.bump();
                    TokenKind::Punct(other)
                }
            };
            tokens.push(Token { kind, line });
        }
        Ok(tokens)
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek(0) {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn line_comment(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
        }
        TokenKind::Comment(text)
    }

    fn block_comment(&mut self) -> Result<TokenKind, ExtractionError> {
        let start = self.line;
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some('/'), Some('*')) => {
                    depth += 1;
                    text.push_str("/*");
                    self.pos += 2;
                }
                (Some('*'), Some('/')) => {
                    depth -= 1;
                    text.push_str("*/");
                    self.pos += 2;
                    if depth == 0 {
                        return Ok(TokenKind::Comment(text));
                    }
                }
                (Some(c), _) => {
                    text.push(c);
                    self.bump();
                }
                (None, _) => {
                    return Err(ExtractionError::UnterminatedComment {
                        file: self.file.to_string(),
                        line: start,
                    })
                }
            }
        }
    }

    fn string(&mut self) -> Result<TokenKind, ExtractionError> {
        let start = self.line;
        let unterminated = |file: &str| ExtractionError::UnterminatedString {
            file: file.to_string(),
            line: start,
        };
        if self.peek(1) == Some('"') && self.peek(2) == Some('"') {
            self.pos += 3;
            loop {
                match self.peek(0) {
                    Some('"') if self.peek(1) == Some('"') && self.peek(2) == Some('"') => {
                        self.pos += 3;
                        return Ok(TokenKind::Literal);
                    }
                    Some('\\') => {
                        self.bump();
                        self.bump();
                    }
                    Some(_) => {
                        self.bump();
                    }
                    None => return Err(unterminated(self.file)),
                }
            }
        }
        self.bump();
        loop {
            match self.peek(0) {
                Some('"') => {
                    self.bump();
                    return Ok(TokenKind::Literal);
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('\n') | None => return Err(unterminated(self.file)),
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}
