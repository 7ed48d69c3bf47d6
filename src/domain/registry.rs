//! Type registry: canonical, alias-resolved view of all declarations.

use std::collections::HashMap;

use generational_arena::{Arena, Index};
use tracing::{debug, instrument};

use crate::domain::entities::{Declaration, DeclarationKind, TypeUsage};
use crate::domain::error::RegistryError;

/// Stable identifier of a declaration inside a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(Index);

/// Read-only index of declarations, built once per run.
///
/// Aliases are resolved to their terminal target and extensions are merged
/// into the type they extend, so lookups always see the canonical
/// declaration.
#[derive(Debug)]
pub struct TypeRegistry {
    arena: Arena<Declaration>,
    /// Discovery order of named (non-alias, non-extension) declarations
    order: Vec<TypeId>,
    by_name: HashMap<String, TypeId>,
    /// Alias name → canonical target usage
    aliases: HashMap<String, TypeUsage>,
}

impl TypeRegistry {
    #[instrument(level = "debug", skip_all, fields(count = declarations.len()))]
    pub fn build(declarations: Vec<Declaration>) -> Result<Self, RegistryError> {
        let mut arena = Arena::new();
        let mut order = Vec::new();
        let mut by_name: HashMap<String, TypeId> = HashMap::new();
        let mut lines: HashMap<String, usize> = HashMap::new();
        let mut raw_aliases: HashMap<String, TypeUsage> = HashMap::new();
        let mut alias_order = Vec::new();
        let mut extensions = Vec::new();

        for declaration in declarations {
            if declaration.kind == DeclarationKind::Extension {
                extensions.push(declaration);
                continue;
            }
            if let Some(first_line) = lines.get(&declaration.name) {
                return Err(RegistryError::DuplicateDeclaration {
                    name: declaration.name.clone(),
                    first_line: *first_line,
                    second_line: declaration.line,
                });
            }
            lines.insert(declaration.name.clone(), declaration.line);

            if let DeclarationKind::Alias { target } = &declaration.kind {
                raw_aliases.insert(declaration.name.clone(), target.clone());
                alias_order.push(declaration.name.clone());
                continue;
            }
            let name = declaration.name.clone();
            let id = TypeId(arena.insert(declaration));
            order.push(id);
            by_name.insert(name, id);
        }

        let mut aliases = HashMap::new();
        for name in &alias_order {
            let target = resolve_alias_chain(name, &raw_aliases)?;
            debug!("alias `{}` -> `{}`", name, target.full_name());
            aliases.insert(name.clone(), target);
        }

        let mut registry = Self {
            arena,
            order,
            by_name,
            aliases,
        };
        for extension in extensions {
            registry.merge_extension(extension);
        }
        debug!("registry: {} types, {} aliases", registry.order.len(), registry.aliases.len());
        Ok(registry)
    }

    fn merge_extension(&mut self, extension: Declaration) {
        let target = self.canonical(&TypeUsage::new(extension.name.clone()));
        let Some(id) = self.by_name.get(&target.name).copied() else {
            debug!("ignoring extension of undeclared type `{}`", extension.name);
            return;
        };
        let Some(declaration) = self.arena.get_mut(id.0) else {
            return;
        };
        if !declaration.is_constructible_kind() {
            debug!("ignoring extension of `{}` ({:?})", declaration.name, declaration.kind);
            return;
        }
        declaration.members.extend(extension.members);
        declaration.initializers.extend(extension.initializers);
        declaration.inherited.extend(extension.inherited);
    }

    /// Alias-resolved lookup by name.
    pub fn resolve(&self, name: &str) -> Option<&Declaration> {
        self.id_of(name).map(|id| self.get(id))
    }

    /// Alias-resolved identifier lookup by name.
    pub fn id_of(&self, name: &str) -> Option<TypeId> {
        let name = self.aliases.get(name).map_or(name, |target| target.name.as_str());
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> &Declaration {
        // ids are only handed out by this registry and nothing is ever removed
        &self.arena[id.0]
    }

    /// Canonical form of a usage: alias chains are replaced by their target,
    /// keeping optionality from either side.
    pub fn canonical(&self, usage: &TypeUsage) -> TypeUsage {
        let generics: Vec<TypeUsage> = usage.generics.iter().map(|g| self.canonical(g)).collect();
        match self.aliases.get(&usage.name) {
            Some(target) => {
                let mut resolved = target.clone();
                if !generics.is_empty() {
                    resolved.generics = generics;
                }
                resolved.is_optional |= usage.is_optional;
                resolved.is_unwrapped |= usage.is_unwrapped && !resolved.is_optional;
                resolved
            }
            None => TypeUsage {
                name: usage.name.clone(),
                generics,
                is_optional: usage.is_optional,
                is_unwrapped: usage.is_unwrapped,
            },
        }
    }

    /// Named declarations in discovery order.
    pub fn declarations(&self) -> impl Iterator<Item = (TypeId, &Declaration)> + '_ {
        self.order.iter().map(move |&id| (id, self.get(id)))
    }

    /// Declarations carrying a `container` directive, in discovery order.
    pub fn containers(&self) -> impl Iterator<Item = (TypeId, &Declaration)> + '_ {
        self.declarations()
            .filter(|(_, declaration)| declaration.directives.container.is_some())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Follow an alias to its terminal, non-alias target.
///
/// A target that is not itself an alias terminates the chain, whether or not
/// it is declared (`typealias UserId = String`).
fn resolve_alias_chain(
    name: &str,
    aliases: &HashMap<String, TypeUsage>,
) -> Result<TypeUsage, RegistryError> {
    let mut chain = vec![name.to_string()];
    let mut current = aliases
        .get(name)
        .cloned()
        .ok_or_else(|| RegistryError::UnresolvedAlias {
            name: name.to_string(),
            chain: chain.clone(),
        })?;
    let mut is_optional = current.is_optional;
    while let Some(next) = aliases.get(&current.name) {
        chain.push(current.name.clone());
        if chain[..chain.len() - 1].contains(&current.name) {
            return Err(RegistryError::UnresolvedAlias {
                name: name.to_string(),
                chain,
            });
        }
        let generics = if next.generics.is_empty() {
            current.generics.clone()
        } else {
            next.generics.clone()
        };
        current = TypeUsage {
            generics,
            ..next.clone()
        };
        is_optional |= current.is_optional;
    }
    current.is_optional = is_optional;
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(name: &str, target: TypeUsage) -> Declaration {
        Declaration::new(name, DeclarationKind::Alias { target })
    }

    #[test]
    fn given_alias_chain_when_resolving_then_follows_to_terminal() {
        let registry = TypeRegistry::build(vec![
            Declaration::new("Foo", DeclarationKind::Class),
            alias("Bar", TypeUsage::new("Foo")),
            alias("Baz", TypeUsage::new("Bar")),
        ])
        .unwrap();

        assert_eq!(registry.resolve("Baz").unwrap().name, "Foo");
        assert_eq!(registry.id_of("Baz"), registry.id_of("Foo"));
        assert_eq!(registry.canonical(&TypeUsage::new("Baz")), TypeUsage::new("Foo"));
    }

    #[test]
    fn given_alias_to_optional_when_canonicalizing_then_keeps_optional() {
        let registry = TypeRegistry::build(vec![
            Declaration::new("Foo", DeclarationKind::Class),
            alias("MaybeFoo", TypeUsage::new("Foo").optional()),
            alias("AlsoMaybeFoo", TypeUsage::new("MaybeFoo")),
        ])
        .unwrap();

        assert_eq!(
            registry.canonical(&TypeUsage::new("AlsoMaybeFoo")).full_name(),
            "Foo?"
        );
    }

    #[test]
    fn given_alias_cycle_when_building_then_errors_with_chain() {
        let result = TypeRegistry::build(vec![
            alias("A", TypeUsage::new("B")),
            alias("B", TypeUsage::new("A")),
        ]);
        match result {
            Err(RegistryError::UnresolvedAlias { name, chain }) => {
                assert_eq!(name, "A");
                assert_eq!(chain, vec!["A", "B", "A"]);
            }
            other => panic!("expected alias cycle, got {other:?}"),
        }
    }

    #[test]
    fn given_self_alias_when_building_then_errors() {
        let result = TypeRegistry::build(vec![alias("A", TypeUsage::new("A"))]);
        assert!(matches!(result, Err(RegistryError::UnresolvedAlias { .. })));
    }

    #[test]
    fn given_alias_to_foreign_type_when_building_then_canonicalizes_to_it() {
        let registry =
            TypeRegistry::build(vec![alias("UserId", TypeUsage::new("String"))]).unwrap();
        assert_eq!(registry.canonical(&TypeUsage::new("UserId")), TypeUsage::new("String"));
        assert!(registry.resolve("UserId").is_none());
    }

    #[test]
    fn given_duplicate_names_when_building_then_errors() {
        let mut first = Declaration::new("Foo", DeclarationKind::Class);
        first.line = 3;
        let mut second = alias("Foo", TypeUsage::new("Bar"));
        second.line = 9;
        let result = TypeRegistry::build(vec![first, second]);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateDeclaration {
                name: "Foo".into(),
                first_line: 3,
                second_line: 9,
            }
        );
    }

    #[test]
    fn given_extension_when_building_then_merges_into_type() {
        use crate::domain::entities::{Initializer, Visibility};

        let mut extension = Declaration::new("FooAlias", DeclarationKind::Extension);
        extension.initializers.push(Initializer {
            params: vec![],
            is_failable: false,
            visibility: Visibility::Internal,
            directives: Default::default(),
            line: 7,
        });
        let registry = TypeRegistry::build(vec![
            extension,
            Declaration::new("Foo", DeclarationKind::Struct),
            alias("FooAlias", TypeUsage::new("Foo")),
        ])
        .unwrap();

        assert_eq!(registry.resolve("Foo").unwrap().initializers.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn given_declarations_when_iterating_then_keeps_discovery_order() {
        let registry = TypeRegistry::build(vec![
            Declaration::new("Zeta", DeclarationKind::Class),
            Declaration::new("Alpha", DeclarationKind::Struct),
        ])
        .unwrap();
        let names: Vec<&str> = registry.declarations().map(|(_, d)| d.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }
}
