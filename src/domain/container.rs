//! Resolved container model produced by the graph builder.

use std::fmt;

use crate::domain::entities::TypeUsage;

/// How a dependency value is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeResolver {
    /// Constructed by the container through the service for this type.
    Explicit(TypeUsage),
    /// Read from an externally supplied provider instance.
    External {
        from: TypeUsage,
        capability: ExternalCapability,
    },
    /// The provider instance itself, as passed to the container initializer.
    Provider(TypeUsage),
}

/// A single argument passed to an initializer or capability method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInvocationArgument {
    /// Argument label, `None` when unlabeled
    pub name: Option<String>,
    pub resolver: TypeResolver,
}

/// A member of a provider type usable to satisfy dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalCapability {
    Property {
        name: String,
    },
    Method {
        name: String,
        args: Vec<FunctionInvocationArgument>,
    },
}

impl ExternalCapability {
    pub fn name(&self) -> &str {
        match self {
            ExternalCapability::Property { name } | ExternalCapability::Method { name, .. } => name,
        }
    }
}

/// A provider type registered for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerExternal {
    pub provider: TypeUsage,
    pub capabilities: Vec<ExternalCapability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoragePolicy {
    /// Reconstructed on every access
    #[default]
    None,
    /// Computed once and kept in a backing field
    Cached,
}

/// How the container constructs a service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceConstructor {
    pub args: Vec<FunctionInvocationArgument>,
    /// Failable initializer (`init?`), the constructed value is optional
    pub is_failable: bool,
}

/// One resolved, deduplicated dependency inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Canonical type of the service; dependents refer to it through
    /// `TypeResolver::Explicit` with this exact usage.
    pub type_usage: TypeUsage,
    pub is_reference: bool,
    pub constructor: ServiceConstructor,
    pub storage: StoragePolicy,
    /// Protocol exposed through an extra forwarding accessor
    pub bound_to: Option<TypeUsage>,
}

impl Service {
    pub fn resolver(&self) -> TypeResolver {
        TypeResolver::Explicit(self.type_usage.clone())
    }
}

/// A fully resolved container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Name of the generated type
    pub name: String,
    /// Protocol the generated type implements
    pub protocol: TypeUsage,
    pub scope: String,
    pub externals: Vec<ContainerExternal>,
    pub services: Vec<Service>,
}

impl Container {
    pub fn service(&self, type_name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.type_usage.name == type_name)
    }
}

impl fmt::Display for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeResolver::Explicit(usage) => write!(f, "{usage}"),
            TypeResolver::External { from, capability } => match capability {
                ExternalCapability::Property { name } => write!(f, "{from}.{name}"),
                ExternalCapability::Method { name, .. } => write!(f, "{from}.{name}()"),
            },
            TypeResolver::Provider(provider) => write!(f, "external {provider}"),
        }
    }
}
