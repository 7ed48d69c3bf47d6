//! Declaration extractor: source text → declaration records.
//!
//! A structural recognizer for type, member and initializer headers. Bodies
//! are skipped by brace matching; nothing is filtered here, members carry
//! their visibility and `static` tags for later stages.

use tracing::{debug, instrument};

use crate::domain::directive::DirectiveParser;
use crate::domain::entities::{
    Declaration, DeclarationKind, Directives, Initializer, Member, MemberKind, Parameter,
    TypeUsage, Visibility,
};
use crate::domain::error::ExtractionError;
use crate::domain::lexer::{tokenize, Token, TokenKind};

const DECLARATION_MODIFIERS: &[&str] = &[
    "open",
    "public",
    "internal",
    "fileprivate",
    "private",
    "static",
    "final",
    "lazy",
    "weak",
    "unowned",
    "override",
    "required",
    "convenience",
    "mutating",
    "nonmutating",
    "dynamic",
    "optional",
    "indirect",
    "nonisolated",
];

const ACCESS_MODIFIERS: &[&str] = &["open", "public", "internal", "fileprivate", "private"];

/// Turns source files into declaration records.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    directives: DirectiveParser,
}

impl Extractor {
    pub fn new(directives: DirectiveParser) -> Self {
        Self { directives }
    }

    /// Extract all declarations from one source unit.
    ///
    /// Nested types are reported with dotted names (`Outer.Inner`), in the
    /// order their headers appear.
    #[instrument(level = "debug", skip(self, source))]
    pub fn extract(&self, source: &str, file: &str) -> Result<Vec<Declaration>, ExtractionError> {
        let tokens = tokenize(source, file)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            file,
            directives: &self.directives,
            out: Vec::new(),
        };
        parser.parse_items(None, false)?;
        debug!("extracted {} declarations from {}", parser.out.len(), file);
        Ok(parser.out)
    }
}

#[derive(Debug, Default)]
struct Body {
    members: Vec<Member>,
    initializers: Vec<Initializer>,
}

#[derive(Debug, Default)]
struct Modifiers {
    visibility: Visibility,
    is_static: bool,
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a str,
    directives: &'a DirectiveParser,
    out: Vec<Declaration>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_punct(c))
    }

    fn at_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.at_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eof(&self, expected: &str) -> ExtractionError {
        ExtractionError::UnexpectedEof {
            file: self.file.to_string(),
            expected: expected.to_string(),
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ExtractionError {
        ExtractionError::UnexpectedToken {
            file: self.file.to_string(),
            line: token.line,
            expected: expected.to_string(),
            found: token.describe(),
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ExtractionError> {
        match self.next() {
            Some(t) if t.is_punct(c) => Ok(()),
            Some(t) => Err(self.unexpected(&t, &format!("`{c}`"))),
            None => Err(self.eof(&format!("`{c}`"))),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, usize), ExtractionError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Ident(name),
                line,
            }) => Ok((name, line)),
            Some(t) => Err(self.unexpected(&t, what)),
            None => Err(self.eof(what)),
        }
    }

    /// Parse a sequence of declarations, either the whole file or a type
    /// body (when `in_body`, stops after the closing brace).
    fn parse_items(&mut self, owner: Option<&str>, in_body: bool) -> Result<Body, ExtractionError> {
        let mut body = Body::default();
        let mut pending: Vec<(String, usize)> = Vec::new();

        loop {
            let Some(token) = self.peek().cloned() else {
                if in_body {
                    return Err(self.eof("`}`"));
                }
                break;
            };

            match &token.kind {
                TokenKind::Comment(text) => {
                    pending.push((text.clone(), token.line));
                    self.pos += 1;
                    continue;
                }
                TokenKind::Punct('}') => {
                    self.pos += 1;
                    if in_body {
                        break;
                    }
                    pending.clear();
                    continue;
                }
                TokenKind::Punct(';') => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let modifiers = self.parse_modifiers();
            let Some(keyword) = self.peek().cloned() else {
                continue;
            };
            let comments = std::mem::take(&mut pending);

            match &keyword.kind {
                TokenKind::Ident(word) => match word.as_str() {
                    "protocol" | "class" | "struct" | "enum" | "actor" | "extension" => {
                        let directives = self.collect_directives(&comments)?;
                        self.parse_type_declaration(owner, directives)?;
                    }
                    "typealias" => {
                        let directives = self.collect_directives(&comments)?;
                        self.parse_alias(owner, directives)?;
                    }
                    "let" | "var" => {
                        let properties = self.parse_properties(&modifiers)?;
                        body.members.extend(properties);
                    }
                    "func" => {
                        if let Some(method) = self.parse_function(&modifiers)? {
                            body.members.push(method);
                        }
                    }
                    "init" => {
                        let directives = self.collect_directives(&comments)?;
                        let initializer = self.parse_initializer(&modifiers, directives)?;
                        body.initializers.push(initializer);
                    }
                    _ => self.skip_unknown(),
                },
                _ => self.skip_unknown(),
            }
        }

        Ok(body)
    }

    fn collect_directives(&self, comments: &[(String, usize)]) -> Result<Directives, ExtractionError> {
        self.directives.collect(
            comments.iter().map(|(text, line)| (text.as_str(), *line)),
            self.file,
        )
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        loop {
            let Some(token) = self.peek().cloned() else {
                return modifiers;
            };
            match &token.kind {
                TokenKind::Attribute(_) => {
                    self.pos += 1;
                    if self.at_punct('(') {
                        self.skip_balanced('(', ')');
                    }
                }
                TokenKind::Ident(word) if word == "class" => {
                    // `class func` / `class var` is a static member
                    let next_is_member = self.peek_at(1).is_some_and(|t| match &t.kind {
                        TokenKind::Ident(w) => {
                            matches!(w.as_str(), "func" | "var" | "let" | "subscript")
                                || DECLARATION_MODIFIERS.contains(&w.as_str())
                        }
                        _ => false,
                    });
                    if !next_is_member {
                        return modifiers;
                    }
                    modifiers.is_static = true;
                    self.pos += 1;
                }
                TokenKind::Ident(word) if DECLARATION_MODIFIERS.contains(&word.as_str()) => {
                    self.pos += 1;
                    if ACCESS_MODIFIERS.contains(&word.as_str()) && self.at_punct('(') {
                        // `private(set)` only narrows the setter
                        self.skip_balanced('(', ')');
                        continue;
                    }
                    match word.as_str() {
                        "open" => modifiers.visibility = Visibility::Open,
                        "public" => modifiers.visibility = Visibility::Public,
                        "internal" => modifiers.visibility = Visibility::Internal,
                        "fileprivate" => modifiers.visibility = Visibility::FilePrivate,
                        "private" => modifiers.visibility = Visibility::Private,
                        "static" => modifiers.is_static = true,
                        _ => {}
                    }
                }
                _ => return modifiers,
            }
        }
    }

    fn parse_type_declaration(
        &mut self,
        owner: Option<&str>,
        directives: Directives,
    ) -> Result<(), ExtractionError> {
        let (keyword, line) = self.expect_ident("declaration keyword")?;
        let (kind, name) = if keyword == "extension" {
            let extended = self.parse_type()?;
            (DeclarationKind::Extension, extended.base_name())
        } else {
            let kind = match keyword.as_str() {
                "protocol" => DeclarationKind::Protocol,
                "class" | "actor" => DeclarationKind::Class,
                _ => DeclarationKind::Struct,
            };
            let (name, _) = self.expect_ident("type name")?;
            let name = match owner {
                Some(owner) => format!("{owner}.{name}"),
                None => name,
            };
            (kind, name)
        };

        if self.at_punct('<') {
            self.skip_balanced('<', '>');
        }
        let mut inherited = Vec::new();
        if self.eat_punct(':') {
            loop {
                inherited.push(self.parse_type()?);
                if !self.eat_punct(',') {
                    break;
                }
            }
        }
        self.skip_until_punct('{');
        self.expect_punct('{')?;

        debug!("{} `{}` at line {}", keyword, name, line);
        let index = self.out.len();
        let mut declaration = Declaration::new(name.clone(), kind);
        declaration.inherited = inherited;
        declaration.directives = directives;
        declaration.line = line;
        self.out.push(declaration);

        let body = self.parse_items(Some(&name), true)?;
        let declaration = &mut self.out[index];
        declaration.members = body.members;
        declaration.initializers = body.initializers;
        Ok(())
    }

    fn parse_alias(&mut self, owner: Option<&str>, directives: Directives) -> Result<(), ExtractionError> {
        let (_, line) = self.expect_ident("`typealias`")?;
        let (name, _) = self.expect_ident("alias name")?;
        if self.at_punct('<') {
            self.skip_balanced('<', '>');
        }
        self.expect_punct('=')?;
        let target = self.parse_type()?;
        let name = match owner {
            Some(owner) => format!("{owner}.{name}"),
            None => name,
        };
        let mut declaration = Declaration::new(name, DeclarationKind::Alias { target });
        declaration.directives = directives;
        declaration.line = line;
        self.out.push(declaration);
        Ok(())
    }

    fn parse_properties(&mut self, modifiers: &Modifiers) -> Result<Vec<Member>, ExtractionError> {
        self.pos += 1; // let / var
        let mut members = Vec::new();
        loop {
            let (name, line) = match self.peek() {
                Some(Token {
                    kind: TokenKind::Ident(name),
                    line,
                }) => (name.clone(), *line),
                // tuple destructuring and similar patterns
                _ => {
                    self.skip_unknown();
                    return Ok(members);
                }
            };
            self.pos += 1;
            let ty = if self.eat_punct(':') {
                Some(self.parse_type()?)
            } else {
                None
            };
            if self.eat_punct('=') {
                self.skip_expression();
            }
            if self.at_punct('{') {
                self.skip_balanced('{', '}');
            }
            match ty {
                Some(ty) => members.push(Member {
                    name,
                    kind: MemberKind::Property { ty },
                    visibility: modifiers.visibility,
                    is_static: modifiers.is_static,
                    line,
                }),
                None => debug!("skipping untyped property `{}` at line {}", name, line),
            }
            if !self.eat_punct(',') {
                return Ok(members);
            }
        }
    }

    fn parse_function(&mut self, modifiers: &Modifiers) -> Result<Option<Member>, ExtractionError> {
        let (_, line) = self.expect_ident("`func`")?;
        let name = match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Some(name.clone()),
            _ => None,
        };
        let Some(name) = name else {
            // operator functions
            self.skip_until_punct('(');
            self.skip_function_tail()?;
            return Ok(None);
        };
        self.pos += 1;
        if self.at_punct('<') {
            self.skip_balanced('<', '>');
        }
        let params = self.parse_parameters()?;
        self.skip_effects();
        let returns = if self.peek().is_some_and(|t| t.kind == TokenKind::Arrow) {
            self.pos += 1;
            let ty = self.parse_type()?;
            (ty.name != "Void" && ty.name != "()").then_some(ty)
        } else {
            None
        };
        self.skip_where_clause();
        if self.at_punct('{') {
            self.skip_balanced('{', '}');
        }
        Ok(Some(Member {
            name,
            kind: MemberKind::Method { params, returns },
            visibility: modifiers.visibility,
            is_static: modifiers.is_static,
            line,
        }))
    }

    fn skip_function_tail(&mut self) -> Result<(), ExtractionError> {
        if self.at_punct('(') {
            self.skip_balanced('(', ')');
        }
        self.skip_effects();
        if self.peek().is_some_and(|t| t.kind == TokenKind::Arrow) {
            self.pos += 1;
            self.parse_type()?;
        }
        self.skip_where_clause();
        if self.at_punct('{') {
            self.skip_balanced('{', '}');
        }
        Ok(())
    }

    fn parse_initializer(
        &mut self,
        modifiers: &Modifiers,
        directives: Directives,
    ) -> Result<Initializer, ExtractionError> {
        let (_, line) = self.expect_ident("`init`")?;
        let is_failable = self.eat_punct('?') || self.eat_punct('!');
        if self.at_punct('<') {
            self.skip_balanced('<', '>');
        }
        let params = self.parse_parameters()?;
        self.skip_effects();
        self.skip_where_clause();
        if self.at_punct('{') {
            self.skip_balanced('{', '}');
        }
        Ok(Initializer {
            params,
            is_failable,
            visibility: modifiers.visibility,
            directives,
            line,
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, ExtractionError> {
        self.expect_punct('(')?;
        let mut params = Vec::new();
        loop {
            while matches!(
                self.peek().map(|t| &t.kind),
                Some(TokenKind::Attribute(_) | TokenKind::Comment(_))
            ) {
                self.pos += 1;
            }
            if self.eat_punct(')') {
                return Ok(params);
            }
            let (first, _) = self.expect_ident("parameter name")?;
            let (label, name) = match self.peek() {
                Some(Token {
                    kind: TokenKind::Ident(second),
                    ..
                }) => {
                    let second = second.clone();
                    self.pos += 1;
                    ((first != "_").then_some(first), second)
                }
                _ => (Some(first.clone()), first),
            };
            self.expect_punct(':')?;
            let ty = self.parse_type()?;
            // variadic `...`
            while self.eat_punct('.') {}
            if self.eat_punct('=') {
                self.skip_default_value();
            }
            params.push(Parameter { label, name, ty });
            if !self.eat_punct(',') {
                self.expect_punct(')')?;
                return Ok(params);
            }
        }
    }

    /// Parse a type reference.
    fn parse_type(&mut self) -> Result<TypeUsage, ExtractionError> {
        loop {
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Attribute(_)) => {
                    self.pos += 1;
                }
                Some(TokenKind::Ident(w)) if matches!(w.as_str(), "inout" | "some" | "any") => {
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let mut usage = match self.peek().cloned() {
            None => return Err(self.eof("type")),
            Some(token) if token.is_punct('(') => {
                let start = self.pos;
                self.skip_balanced('(', ')');
                let mut text = self.text_between(start, self.pos);
                self.skip_effects();
                if self.peek().is_some_and(|t| t.kind == TokenKind::Arrow) {
                    self.pos += 1;
                    let returns = self.parse_type()?;
                    text = format!("{text} -> {}", returns.full_name());
                }
                TypeUsage::new(text)
            }
            Some(token) if token.is_punct('[') => {
                self.pos += 1;
                let element = self.parse_type()?;
                let text = if self.eat_punct(':') {
                    let value = self.parse_type()?;
                    format!("[{}: {}]", element.full_name(), value.full_name())
                } else {
                    format!("[{}]", element.full_name())
                };
                self.expect_punct(']')?;
                TypeUsage::new(text)
            }
            Some(Token {
                kind: TokenKind::Ident(first),
                ..
            }) => {
                self.pos += 1;
                let mut name = first;
                let mut generics = Vec::new();
                loop {
                    if self.at_punct('<') {
                        self.pos += 1;
                        generics.clear();
                        loop {
                            generics.push(self.parse_type()?);
                            if !self.eat_punct(',') {
                                break;
                            }
                        }
                        self.expect_punct('>')?;
                    }
                    let dotted = self.at_punct('.')
                        && matches!(
                            self.peek_at(1).map(|t| &t.kind),
                            Some(TokenKind::Ident(_))
                        );
                    if !dotted {
                        break;
                    }
                    self.pos += 1;
                    let (segment, _) = self.expect_ident("type name")?;
                    name = format!("{name}.{segment}");
                }
                TypeUsage::new(name).with_generics(generics)
            }
            Some(token) => return Err(self.unexpected(&token, "type")),
        };

        loop {
            if self.eat_punct('?') {
                usage.is_optional = true;
            } else if self.eat_punct('!') {
                usage.is_unwrapped = true;
            } else if self.eat_punct('&') {
                let other = self.parse_type()?;
                usage = TypeUsage::new(format!("{} & {}", usage.full_name(), other.full_name()));
            } else {
                return Ok(usage);
            }
        }
    }

    fn text_between(&self, start: usize, end: usize) -> String {
        let mut text = String::new();
        for token in &self.tokens[start..end] {
            let piece = token.describe();
            let glue = matches!(
                &token.kind,
                TokenKind::Punct(')' | ',' | ':' | '?' | '!' | '>' | ']' | '.')
            ) || text.ends_with(['(', '<', '[', '.']);
            if !glue && !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&piece);
        }
        text
    }

    fn skip_effects(&mut self) {
        while self.peek().is_some_and(|t| {
            t.is_ident("async") || t.is_ident("throws") || t.is_ident("rethrows")
        }) {
            self.pos += 1;
            // typed throws: `throws(MyError)`
            if self.at_punct('(') {
                self.skip_balanced('(', ')');
            }
        }
    }

    fn skip_where_clause(&mut self) {
        if self.at_ident("where") {
            self.skip_until_punct('{');
        }
    }

    /// Skip a balanced `open ... close` group starting at the current token.
    fn skip_balanced(&mut self, open: char, close: char) {
        let mut depth = 0usize;
        while let Some(token) = self.next() {
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Advance to the next `target` at nesting depth zero, without consuming it.
    fn skip_until_punct(&mut self, target: char) {
        while let Some(token) = self.peek() {
            if token.is_punct(target) {
                return;
            }
            match &token.kind {
                TokenKind::Punct('(') => self.skip_balanced('(', ')'),
                TokenKind::Punct('[') => self.skip_balanced('[', ']'),
                _ => self.pos += 1,
            }
        }
    }

    /// Skip an initial-value expression up to the end of its statement.
    fn skip_expression(&mut self) {
        let mut last_line = self.peek().map_or(0, |t| t.line);
        let mut first = true;
        while let Some(token) = self.peek().cloned() {
            let continues = first
                || token.line == last_line
                || token.is_punct('.')
                || matches!(token.kind, TokenKind::Arrow);
            if !continues || token.is_punct('}') || token.is_punct(';') || token.is_punct(',') {
                return;
            }
            first = false;
            match &token.kind {
                TokenKind::Punct('(') => self.skip_balanced('(', ')'),
                TokenKind::Punct('[') => self.skip_balanced('[', ']'),
                TokenKind::Punct('{') => self.skip_balanced('{', '}'),
                _ => self.pos += 1,
            }
            last_line = self
                .tokens
                .get(self.pos.saturating_sub(1))
                .map_or(last_line, |t| t.line);
        }
    }

    /// Skip a default parameter value up to `,` or `)` at depth zero.
    fn skip_default_value(&mut self) {
        while let Some(token) = self.peek() {
            if token.is_punct(',') || token.is_punct(')') {
                return;
            }
            match &token.kind {
                TokenKind::Punct('(') => self.skip_balanced('(', ')'),
                TokenKind::Punct('[') => self.skip_balanced('[', ']'),
                TokenKind::Punct('{') => self.skip_balanced('{', '}'),
                _ => self.pos += 1,
            }
        }
    }

    /// Consume one unrecognized token (or a whole bracketed group).
    fn skip_unknown(&mut self) {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Punct('{')) => self.skip_balanced('{', '}'),
            Some(TokenKind::Punct('(')) => self.skip_balanced('(', ')'),
            Some(TokenKind::Punct('[')) => self.skip_balanced('[', ']'),
            Some(_) => self.pos += 1,
            None => {}
        }
    }
}
