//! Render-ready projection of a resolved container.
//!
//! Flattens resolvers into invocation expressions and derives every accessor
//! name once, so the renderer only concatenates strings.

use itertools::Itertools;

use crate::config::{AccessLevel, Settings};
use crate::domain::{
    Container, ExternalCapability, FunctionInvocationArgument, Service, StoragePolicy,
    TypeResolver, TypeUsage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalData {
    pub accessor: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceData {
    pub accessor: String,
    /// `makeFoo`
    pub maker: String,
    /// `cached_foo`, present only for cached services
    pub cached_field: Option<String>,
    /// Rendered type, optional when the initializer is failable
    pub type_name: String,
    /// `Foo(bar: self.bar)`
    pub invocation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundAccessorData {
    pub accessor: String,
    pub type_name: String,
    pub target_accessor: String,
}

/// Everything the renderer needs, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRenderData {
    pub name: String,
    pub protocol_name: String,
    pub access_level: AccessLevel,
    pub imports: Vec<String>,
    pub externals: Vec<ExternalData>,
    pub services: Vec<ServiceData>,
    pub bound_accessors: Vec<BoundAccessorData>,
}

impl ServiceData {
    /// Backing field type: the service type with exactly one trailing `?`.
    pub fn cached_type_name(&self) -> String {
        format!("{}?", self.type_name.trim_end_matches(['?', '!']))
    }
}

pub struct ContainerDataFactory<'s> {
    settings: &'s Settings,
}

impl<'s> ContainerDataFactory<'s> {
    pub fn new(settings: &'s Settings) -> Self {
        Self { settings }
    }

    pub fn make(&self, container: &Container) -> ContainerRenderData {
        let imports = std::iter::once("Foundation".to_string())
            .chain(self.settings.imports.iter().map(|i| i.trim().to_string()))
            .filter(|i| !i.is_empty())
            .sorted()
            .dedup()
            .collect();

        let externals = container
            .externals
            .iter()
            .map(|external| ExternalData {
                accessor: lower_camel(&external.provider.name),
                type_name: external.provider.full_name(),
            })
            .collect();

        let services = container.services.iter().map(make_service).collect();

        let bound_accessors = container
            .services
            .iter()
            .filter_map(|service| {
                service.bound_to.as_ref().map(|protocol| BoundAccessorData {
                    accessor: lower_camel(&protocol.name),
                    type_name: protocol.full_name(),
                    target_accessor: lower_camel(&service.type_usage.name),
                })
            })
            .collect();

        ContainerRenderData {
            name: container.name.clone(),
            protocol_name: container.protocol.full_name(),
            access_level: self.settings.access_level,
            imports,
            externals,
            services,
            bound_accessors,
        }
    }
}

fn make_service(service: &Service) -> ServiceData {
    let accessor = lower_camel(&service.type_usage.name);
    let mut type_name = service.type_usage.full_name();
    if service.constructor.is_failable && !service.type_usage.is_optional {
        type_name = format!("{}?", service.type_usage.base_name());
    }
    ServiceData {
        maker: format!("make{}", upper_camel(&service.type_usage.name)),
        cached_field: (service.storage == StoragePolicy::Cached)
            .then(|| format!("cached_{accessor}")),
        type_name,
        invocation: format!(
            "{}({})",
            service.type_usage.base_name(),
            arguments(&service.constructor.args)
        ),
        accessor,
    }
}

fn arguments(args: &[FunctionInvocationArgument]) -> String {
    args.iter()
        .map(|arg| {
            let value = expression(&arg.resolver);
            match &arg.name {
                Some(label) => format!("{label}: {value}"),
                None => value,
            }
        })
        .join(", ")
}

fn expression(resolver: &TypeResolver) -> String {
    match resolver {
        TypeResolver::Explicit(usage) => format!("self.{}", lower_camel(&usage.name)),
        TypeResolver::External { from, capability } => {
            let provider = provider_accessor(from);
            match capability {
                ExternalCapability::Property { name } => format!("self.{provider}.{name}"),
                ExternalCapability::Method { name, args } => {
                    format!("self.{provider}.{name}({})", arguments(args))
                }
            }
        }
        TypeResolver::Provider(provider) => format!("self.{}", provider_accessor(provider)),
    }
}

fn provider_accessor(provider: &TypeUsage) -> String {
    lower_camel(&provider.name)
}

fn segments(name: &str) -> impl Iterator<Item = &str> {
    name.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|s| !s.is_empty())
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `Outer.Inner` → `OuterInner`
pub fn upper_camel(name: &str) -> String {
    segments(name).map(capitalize).collect()
}

/// Accessor name for a type: `URLSession` → `urlSession`,
/// `FooProtocol` → `fooProtocol`, `Outer.Inner` → `outerInner`.
pub fn lower_camel(name: &str) -> String {
    let joined: Vec<char> = upper_camel(name).chars().collect();
    let run = joined.iter().take_while(|c| c.is_uppercase()).count();
    let lowered = match joined.get(run) {
        // the last capital starts the next word
        Some(next) if run > 1 && next.is_lowercase() => run - 1,
        _ => run,
    };
    joined
        .iter()
        .enumerate()
        .flat_map(|(i, c)| {
            if i < lowered {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                vec![*c]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContainerExternal, ServiceConstructor};
    use rstest::rstest;

    #[rstest]
    #[case("Foo", "foo")]
    #[case("FooProtocol", "fooProtocol")]
    #[case("URLSession", "urlSession")]
    #[case("URL", "url")]
    #[case("HTTP2Client", "http2Client")]
    #[case("Outer.Inner", "outerInner")]
    #[case("listAPI", "listAPI")]
    fn given_type_name_when_lower_camel_then_accessor(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(lower_camel(input), expected);
    }

    fn service(name: &str, args: Vec<FunctionInvocationArgument>) -> Service {
        Service {
            type_usage: TypeUsage::new(name),
            is_reference: true,
            constructor: ServiceConstructor {
                args,
                is_failable: false,
            },
            storage: StoragePolicy::None,
            bound_to: None,
        }
    }

    #[test]
    fn given_resolvers_when_making_then_invocation_uses_accessors() {
        // Arrange
        let env = TypeUsage::new("AppExternals");
        let container = Container {
            name: "AppContainer".into(),
            protocol: TypeUsage::new("AppContaining"),
            scope: "Singleton".into(),
            externals: vec![ContainerExternal {
                provider: env.clone(),
                capabilities: vec![],
            }],
            services: vec![service(
                "ListAPI",
                vec![
                    FunctionInvocationArgument {
                        name: Some("storage".into()),
                        resolver: TypeResolver::Explicit(TypeUsage::new("UserStorage")),
                    },
                    FunctionInvocationArgument {
                        name: None,
                        resolver: TypeResolver::External {
                            from: env.clone(),
                            capability: ExternalCapability::Method {
                                name: "networkManager".into(),
                                args: vec![FunctionInvocationArgument {
                                    name: Some("userStorage".into()),
                                    resolver: TypeResolver::Explicit(TypeUsage::new(
                                        "UserStorage",
                                    )),
                                }],
                            },
                        },
                    },
                ],
            )],
        };

        // Act
        let data = ContainerDataFactory::new(&Settings::default()).make(&container);

        // Assert
        assert_eq!(
            data.externals,
            vec![ExternalData {
                accessor: "appExternals".into(),
                type_name: "AppExternals".into()
            }]
        );
        let list = &data.services[0];
        assert_eq!(list.accessor, "listAPI");
        assert_eq!(list.maker, "makeListAPI");
        assert_eq!(list.cached_field, None);
        assert_eq!(
            list.invocation,
            "ListAPI(storage: self.userStorage, self.appExternals.networkManager(userStorage: self.userStorage))"
        );
    }

    #[test]
    fn given_failable_cached_bound_service_when_making_then_optional_names() {
        let mut foo = service("Foo", vec![]);
        foo.constructor.is_failable = true;
        foo.storage = StoragePolicy::Cached;
        foo.bound_to = Some(TypeUsage::new("FooProtocol"));
        let container = Container {
            name: "AppContainer".into(),
            protocol: TypeUsage::new("AppContaining"),
            scope: "Singleton".into(),
            externals: vec![],
            services: vec![foo],
        };

        let data = ContainerDataFactory::new(&Settings::default()).make(&container);

        let foo = &data.services[0];
        assert_eq!(foo.type_name, "Foo?");
        assert_eq!(foo.cached_type_name(), "Foo?");
        assert_eq!(foo.cached_field.as_deref(), Some("cached_foo"));
        assert_eq!(
            data.bound_accessors,
            vec![BoundAccessorData {
                accessor: "fooProtocol".into(),
                type_name: "FooProtocol".into(),
                target_accessor: "foo".into(),
            }]
        );
    }

    #[test]
    fn given_extra_imports_when_making_then_sorted_and_deduplicated() {
        let settings = Settings {
            imports: vec!["UIKit".into(), "Combine".into(), "Foundation".into()],
            ..Settings::default()
        };
        let container = Container {
            name: "C".into(),
            protocol: TypeUsage::new("P"),
            scope: "S".into(),
            externals: vec![],
            services: vec![],
        };

        let data = ContainerDataFactory::new(&settings).make(&container);

        assert_eq!(data.imports, vec!["Combine", "Foundation", "UIKit"]);
    }
}
