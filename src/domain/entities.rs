//! Domain entities: declarations as extracted from source

use std::fmt;

/// A reference to a type by name, as written in source.
///
/// May name an alias until it has been canonicalized by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeUsage {
    /// Base name, e.g. `Foo` or `Outer.Inner`
    pub name: String,
    /// Generic arguments, e.g. `[Int]` for `Box<Int>`
    pub generics: Vec<TypeUsage>,
    /// `Foo?`
    pub is_optional: bool,
    /// `Foo!`
    pub is_unwrapped: bool,
}

impl TypeUsage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generics: Vec::new(),
            is_optional: false,
            is_unwrapped: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn with_generics(mut self, generics: Vec<TypeUsage>) -> Self {
        self.generics = generics;
        self
    }

    /// Rendering without the optional/unwrapped suffix.
    pub fn base_name(&self) -> String {
        if self.generics.is_empty() {
            return self.name.clone();
        }
        let args: Vec<String> = self.generics.iter().map(|g| g.full_name()).collect();
        format!("{}<{}>", self.name, args.join(", "))
    }

    /// Rendering as it would appear in source, e.g. `Box<Int>?`.
    pub fn full_name(&self) -> String {
        let mut name = self.base_name();
        if self.is_optional {
            name.push('?');
        } else if self.is_unwrapped {
            name.push('!');
        }
        name
    }
}

impl fmt::Display for TypeUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Member/initializer visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Open,
    Public,
    #[default]
    Internal,
    FilePrivate,
    Private,
}

impl Visibility {
    /// Whether code outside the declaring file can see the member.
    pub fn is_accessible(self) -> bool {
        !matches!(self, Visibility::FilePrivate | Visibility::Private)
    }
}

/// Function or initializer parameter: `label name: Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// External label, `None` for `_`
    pub label: Option<String>,
    /// Internal name
    pub name: String,
    pub ty: TypeUsage,
}

impl Parameter {
    /// Parameter where label and name coincide (`name: Type`).
    pub fn named(name: impl Into<String>, ty: TypeUsage) -> Self {
        let name = name.into();
        Self {
            label: Some(name.clone()),
            name,
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Property {
        ty: TypeUsage,
    },
    Method {
        params: Vec<Parameter>,
        /// `None` for `Void` functions
        returns: Option<TypeUsage>,
    },
}

/// A property or method declared in a type body or extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub visibility: Visibility,
    /// `static` or `class` members
    pub is_static: bool,
    pub line: usize,
}

/// Directives read from the comment block preceding a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directives {
    pub container: Option<String>,
    pub scope: Option<String>,
    pub externals: Vec<TypeUsage>,
    pub bind_to: Option<TypeUsage>,
    pub cached: bool,
    pub inject: bool,
}

impl Directives {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initializer {
    pub params: Vec<Parameter>,
    /// `init?` / `init!`
    pub is_failable: bool,
    pub visibility: Visibility,
    pub directives: Directives,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    Class,
    Struct,
    Protocol,
    Alias { target: TypeUsage },
    Extension,
}

/// A named type unit produced by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Reference identity (class)
    pub is_reference: bool,
    pub inherited: Vec<TypeUsage>,
    pub members: Vec<Member>,
    pub initializers: Vec<Initializer>,
    pub directives: Directives,
    pub line: usize,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind) -> Self {
        let is_reference = matches!(kind, DeclarationKind::Class);
        Self {
            name: name.into(),
            kind,
            is_reference,
            inherited: Vec::new(),
            members: Vec::new(),
            initializers: Vec::new(),
            directives: Directives::default(),
            line: 0,
        }
    }

    pub fn is_constructible_kind(&self) -> bool {
        matches!(self.kind, DeclarationKind::Class | DeclarationKind::Struct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_generic_optional_usage_when_rendering_then_includes_suffix() {
        let usage = TypeUsage::new("Box")
            .with_generics(vec![TypeUsage::new("Int")])
            .optional();
        assert_eq!(usage.full_name(), "Box<Int>?");
        assert_eq!(usage.base_name(), "Box<Int>");
    }

    #[test]
    fn given_unwrapped_usage_when_rendering_then_uses_bang() {
        let mut usage = TypeUsage::new("Foo");
        usage.is_unwrapped = true;
        assert_eq!(usage.to_string(), "Foo!");
    }

    #[test]
    fn given_class_kind_when_creating_declaration_then_is_reference() {
        assert!(Declaration::new("Foo", DeclarationKind::Class).is_reference);
        assert!(!Declaration::new("Bar", DeclarationKind::Struct).is_reference);
    }

    #[test]
    fn given_private_visibility_then_not_accessible() {
        assert!(!Visibility::Private.is_accessible());
        assert!(!Visibility::FilePrivate.is_accessible());
        assert!(Visibility::Internal.is_accessible());
        assert!(Visibility::Open.is_accessible());
    }
}
