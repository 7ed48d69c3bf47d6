//! Directive micro-grammar for annotation comments.
//!
//! A directive is `<prefix><key>` or `<prefix><key>(<arg>, <arg>...)` found
//! anywhere inside a comment, e.g. `// @saber.externals(AppExternals)`.

use regex::Regex;
use tracing::debug;

use crate::domain::entities::{Directives, TypeUsage};
use crate::domain::error::ExtractionError;

/// Default annotation prefix.
pub const DEFAULT_PREFIX: &str = "@saber.";

/// A recognized directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Container(String),
    Scope(String),
    Externals(Vec<TypeUsage>),
    BindTo(TypeUsage),
    Cached,
    Inject,
}

/// Scans comment text for directives with a given prefix.
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    prefix: String,
    key_regex: Regex,
}

impl Default for DirectiveParser {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Position and text of a directive, for error reporting.
struct Site<'a> {
    file: &'a str,
    line: usize,
    text: String,
}

impl Site<'_> {
    fn malformed(&self, reason: impl Into<String>) -> ExtractionError {
        ExtractionError::MalformedDirective {
            file: self.file.to_string(),
            line: self.line,
            text: self.text.clone(),
            reason: reason.into(),
        }
    }
}

impl DirectiveParser {
    pub fn new(prefix: &str) -> Self {
        let pattern = format!(r"{}([A-Za-z_][A-Za-z0-9_]*)?", regex::escape(prefix));
        Self {
            prefix: prefix.to_string(),
            key_regex: Regex::new(&pattern).expect("escaped prefix is a valid pattern"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parse all directives in one comment token.
    ///
    /// `line` is the line the comment starts on; directives on later lines of
    /// a block comment are reported with their own line.
    pub fn parse_comment(
        &self,
        text: &str,
        line: usize,
        file: &str,
    ) -> Result<Vec<Directive>, ExtractionError> {
        let mut found = Vec::new();
        for caps in self.key_regex.captures_iter(text) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let directive_line = line + text[..whole.start].matches('\n').count();
            let rest = &text[whole.end..];
            let rest_of_line = rest.split('\n').next().unwrap_or("");

            let Some(key) = caps.get(1).map(|m| m.as_str()) else {
                let site = Site {
                    file,
                    line: directive_line,
                    text: format!("{}{}", self.prefix, first_word(rest_of_line)),
                };
                return Err(site.malformed("missing directive name"));
            };

            let (args, raw) = if rest_of_line.starts_with('(') {
                let Some(close) = rest_of_line.find(')') else {
                    let site = Site {
                        file,
                        line: directive_line,
                        text: format!("{}{}{}", self.prefix, key, rest_of_line.trim_end()),
                    };
                    return Err(site.malformed("missing closing parenthesis"));
                };
                let inner = &rest_of_line[1..close];
                (Some(split_args(inner)), &rest_of_line[..=close])
            } else {
                (None, "")
            };

            let site = Site {
                file,
                line: directive_line,
                text: format!("{}{}{}", self.prefix, key, raw),
            };
            if let Some(directive) = interpret(key, args, &site)? {
                found.push(directive);
            }
        }
        Ok(found)
    }

    /// Parse a sequence of comments and fold them into `Directives`.
    pub fn collect<'c>(
        &self,
        comments: impl IntoIterator<Item = (&'c str, usize)>,
        file: &str,
    ) -> Result<Directives, ExtractionError> {
        let mut directives = Directives::default();
        for (text, line) in comments {
            for directive in self.parse_comment(text, line, file)? {
                apply(&mut directives, directive).map_err(|reason| {
                    ExtractionError::MalformedDirective {
                        file: file.to_string(),
                        line,
                        text: text.trim().to_string(),
                        reason,
                    }
                })?;
            }
        }
        Ok(directives)
    }
}

fn first_word(s: &str) -> &str {
    s.split(|c: char| c.is_whitespace()).next().unwrap_or("")
}

/// Split on commas outside `<...>` and `[...]`.
fn split_args(inner: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' | '[' => {
                depth += 1;
                current.push(c);
            }
            '>' | ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());
    args
}

fn interpret(
    key: &str,
    args: Option<Vec<String>>,
    site: &Site<'_>,
) -> Result<Option<Directive>, ExtractionError> {
    if let Some(args) = &args {
        if args.iter().any(|a| a.is_empty()) {
            return Err(site.malformed("empty argument"));
        }
    }
    let single = |args: Option<Vec<String>>| -> Result<String, ExtractionError> {
        match args {
            Some(mut args) if args.len() == 1 => Ok(args.remove(0)),
            _ => Err(site.malformed(format!("`{key}` takes exactly one argument"))),
        }
    };
    let directive = match key {
        "container" => Directive::Container(identifier(single(args)?, site)?),
        "scope" => Directive::Scope(identifier(single(args)?, site)?),
        "bindTo" => Directive::BindTo(type_usage(&single(args)?, site)?),
        "externals" => match args {
            Some(args) => Directive::Externals(
                args.iter()
                    .map(|a| type_usage(a, site))
                    .collect::<Result<_, _>>()?,
            ),
            None => return Err(site.malformed("`externals` requires at least one argument")),
        },
        "cached" | "inject" => {
            if args.is_some() {
                return Err(site.malformed(format!("`{key}` takes no arguments")));
            }
            if key == "cached" {
                Directive::Cached
            } else {
                Directive::Inject
            }
        }
        other => {
            debug!("ignoring unknown directive `{}` at line {}", other, site.line);
            return Ok(None);
        }
    };
    Ok(Some(directive))
}

fn identifier(arg: String, site: &Site<'_>) -> Result<String, ExtractionError> {
    let valid = arg
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && arg.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(arg)
    } else {
        Err(site.malformed(format!("`{arg}` is not an identifier")))
    }
}

fn type_usage(arg: &str, site: &Site<'_>) -> Result<TypeUsage, ExtractionError> {
    parse_type_text(arg).ok_or_else(|| site.malformed(format!("`{arg}` is not a type name")))
}

/// Parse `Name`, `A.B`, `Name<T, U>` with an optional `?`/`!` suffix.
pub fn parse_type_text(text: &str) -> Option<TypeUsage> {
    let text = text.trim();
    let (text, is_optional, is_unwrapped) = if let Some(t) = text.strip_suffix('?') {
        (t, true, false)
    } else if let Some(t) = text.strip_suffix('!') {
        (t, false, true)
    } else {
        (text, false, false)
    };
    let (name, generics) = match text.find('<') {
        Some(open) => {
            let inner = text[open + 1..].strip_suffix('>')?;
            let generics = split_args(inner)
                .iter()
                .map(|g| parse_type_text(g))
                .collect::<Option<Vec<_>>>()?;
            (&text[..open], generics)
        }
        None => (text, Vec::new()),
    };
    let valid_name = !name.is_empty()
        && name.split('.').all(|segment| {
            segment
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
                && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
        });
    if !valid_name {
        return None;
    }
    Some(TypeUsage {
        name: name.to_string(),
        generics,
        is_optional,
        is_unwrapped,
    })
}

/// Fold one directive into a declaration's directive set.
pub fn apply(directives: &mut Directives, directive: Directive) -> Result<(), String> {
    fn set_once<T: PartialEq + std::fmt::Display>(
        slot: &mut Option<T>,
        value: T,
        key: &str,
    ) -> Result<(), String> {
        match slot {
            Some(existing) if *existing != value => Err(format!(
                "conflicting `{key}` values `{existing}` and `{value}`"
            )),
            _ => {
                *slot = Some(value);
                Ok(())
            }
        }
    }

    match directive {
        Directive::Container(name) => set_once(&mut directives.container, name, "container"),
        Directive::Scope(scope) => set_once(&mut directives.scope, scope, "scope"),
        Directive::BindTo(ty) => set_once(&mut directives.bind_to, ty, "bindTo"),
        Directive::Externals(types) => {
            directives.externals.extend(types);
            Ok(())
        }
        Directive::Cached => {
            directives.cached = true;
            Ok(())
        }
        Directive::Inject => {
            directives.inject = true;
            Ok(())
        }
    }
}
