//! Container graph builder.
//!
//! Walks initializer-argument chains for each declared container and turns
//! them into a deduplicated, cycle-checked [`Container`]. Resolution state is
//! owned per container: a three-state map keyed by [`TypeId`] plus a path
//! stack used to report cycles. A type that is already done is returned from
//! the map and never re-entered.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::container::{
    Container, ContainerExternal, ExternalCapability, FunctionInvocationArgument, Service,
    ServiceConstructor, StoragePolicy, TypeResolver,
};
use crate::domain::entities::{
    Declaration, DeclarationKind, Initializer, MemberKind, Parameter, TypeUsage,
};
use crate::domain::error::GraphError;
use crate::domain::registry::{TypeId, TypeRegistry};

/// Builds containers from an immutable registry.
pub struct ContainerGraphBuilder<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> ContainerGraphBuilder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Build every container declared in the registry, in discovery order.
    ///
    /// The first failure aborts the whole run.
    #[instrument(level = "debug", skip(self))]
    pub fn build_all(&self) -> Result<Vec<Container>, GraphError> {
        let mut names = HashSet::new();
        let mut containers = Vec::new();
        for (_, declaration) in self.registry.containers() {
            if let Some(name) = &declaration.directives.container {
                if !names.insert(name.clone()) {
                    return Err(GraphError::DuplicateContainer(name.clone()));
                }
            }
            containers.push(self.build(declaration)?);
        }
        Ok(containers)
    }

    /// Build the container declared on `declaration`.
    #[instrument(level = "debug", skip_all, fields(declaration = %declaration.name))]
    pub fn build(&self, declaration: &Declaration) -> Result<Container, GraphError> {
        let invalid = |container: &str, reason: &str| GraphError::InvalidContainer {
            container: container.to_string(),
            declaration: declaration.name.clone(),
            reason: reason.to_string(),
        };
        let name = declaration
            .directives
            .container
            .clone()
            .ok_or_else(|| invalid("", "missing container directive"))?;
        if declaration.kind != DeclarationKind::Protocol {
            return Err(invalid(&name, "containers must be declared on a protocol"));
        }
        let scope = declaration
            .directives
            .scope
            .clone()
            .ok_or_else(|| invalid(&name, "missing scope directive"))?;

        let mut resolution = Resolution::new(self.registry, name, scope);
        resolution.register_externals(&declaration.directives.externals)?;
        resolution.resolve_roots()?;
        let container = resolution.finish(TypeUsage::new(declaration.name.clone()))?;
        debug!(
            "container `{}`: {} externals, {} services",
            container.name,
            container.externals.len(),
            container.services.len()
        );
        Ok(container)
    }
}

enum State {
    InProgress,
    Done(Service),
}

enum CapabilityState {
    InProgress,
    Done(ExternalCapability),
}

/// Index of a capability: (provider, member)
type CapabilityKey = (usize, usize);

/// Capability candidate as enumerated from the provider's members.
struct RawCapability {
    name: String,
    /// Canonical property type or method return type
    ty: TypeUsage,
    /// `None` for properties
    params: Option<Vec<Parameter>>,
}

struct Provider {
    usage: TypeUsage,
    capabilities: Vec<RawCapability>,
}

/// Per-container resolution state.
struct Resolution<'r> {
    registry: &'r TypeRegistry,
    container: String,
    scope: String,
    providers: Vec<Provider>,
    states: HashMap<TypeId, State>,
    capabilities: HashMap<CapabilityKey, CapabilityState>,
    path: Vec<String>,
}

impl<'r> Resolution<'r> {
    fn new(registry: &'r TypeRegistry, container: String, scope: String) -> Self {
        Self {
            registry,
            container,
            scope,
            providers: Vec::new(),
            states: HashMap::new(),
            capabilities: HashMap::new(),
            path: Vec::new(),
        }
    }

    fn register_externals(&mut self, externals: &[TypeUsage]) -> Result<(), GraphError> {
        let mut seen = HashSet::new();
        for external in externals {
            let usage = self.registry.canonical(external);
            if !seen.insert(usage.full_name()) {
                return Err(GraphError::DuplicateExternal {
                    container: self.container.clone(),
                    external: usage.full_name(),
                });
            }
            let declaration =
                self.registry
                    .resolve(&usage.name)
                    .ok_or_else(|| GraphError::UnknownExternal {
                        container: self.container.clone(),
                        external: usage.full_name(),
                    })?;

            let capabilities: Vec<RawCapability> = declaration
                .members
                .iter()
                .filter(|m| !m.is_static && m.visibility.is_accessible())
                .filter_map(|m| match &m.kind {
                    MemberKind::Property { ty } => Some(RawCapability {
                        name: m.name.clone(),
                        ty: self.registry.canonical(ty),
                        params: None,
                    }),
                    MemberKind::Method { params, returns } => {
                        returns.as_ref().map(|returns| RawCapability {
                            name: m.name.clone(),
                            ty: self.registry.canonical(returns),
                            params: Some(params.clone()),
                        })
                    }
                })
                .collect();
            debug!(
                "external `{}`: {} capabilities",
                usage,
                capabilities.len()
            );
            self.providers.push(Provider {
                usage,
                capabilities,
            });
        }
        Ok(())
    }

    /// Capability parameters first, then every declaration scoped to this
    /// container. Providers are supplied from outside and never constructed.
    fn resolve_roots(&mut self) -> Result<(), GraphError> {
        for provider in 0..self.providers.len() {
            for capability in 0..self.providers[provider].capabilities.len() {
                self.resolve_capability((provider, capability))?;
            }
        }
        let scoped: Vec<TypeId> = self
            .registry
            .declarations()
            .filter(|(_, d)| {
                d.is_constructible_kind()
                    && d.directives.scope.as_deref() == Some(self.scope.as_str())
                    && self.provider(&d.name).is_none()
            })
            .map(|(id, _)| id)
            .collect();
        for id in scoped {
            self.resolve_service(id)?;
        }
        Ok(())
    }

    fn finish(mut self, protocol: TypeUsage) -> Result<Container, GraphError> {
        let registry = self.registry;
        let mut externals = Vec::with_capacity(self.providers.len());
        for (p, provider) in self.providers.iter().enumerate() {
            let mut capabilities = Vec::with_capacity(provider.capabilities.len());
            for c in 0..provider.capabilities.len() {
                if let Some(CapabilityState::Done(capability)) = self.capabilities.remove(&(p, c)) {
                    capabilities.push(capability);
                }
            }
            externals.push(ContainerExternal {
                provider: provider.usage.clone(),
                capabilities,
            });
        }

        let mut services = Vec::new();
        let mut bindings: HashMap<String, String> = HashMap::new();
        for (id, _) in registry.declarations() {
            let Some(State::Done(service)) = self.states.remove(&id) else {
                continue;
            };
            if let Some(protocol) = &service.bound_to {
                let name = service.type_usage.name.clone();
                if let Some(first) = bindings.insert(protocol.full_name(), name.clone()) {
                    return Err(GraphError::DuplicateBinding {
                        container: self.container,
                        protocol: protocol.full_name(),
                        first,
                        second: name,
                    });
                }
            }
            services.push(service);
        }

        Ok(Container {
            name: self.container,
            protocol,
            scope: self.scope,
            externals,
            services,
        })
    }

    fn resolve_capability(&mut self, key: CapabilityKey) -> Result<ExternalCapability, GraphError> {
        let label = self.capability_label(key);
        match self.capabilities.get(&key) {
            Some(CapabilityState::Done(capability)) => return Ok(capability.clone()),
            Some(CapabilityState::InProgress) => return Err(self.cycle(label)),
            None => {}
        }

        let raw = &self.providers[key.0].capabilities[key.1];
        let name = raw.name.clone();
        let capability = match raw.params.clone() {
            None => ExternalCapability::Property { name },
            Some(params) => {
                self.capabilities.insert(key, CapabilityState::InProgress);
                self.path.push(label.clone());
                let args = self.resolve_arguments(&label, Some(key), &params)?;
                self.path.pop();
                ExternalCapability::Method { name, args }
            }
        };
        debug!("capability `{}` resolved", label);
        self.capabilities
            .insert(key, CapabilityState::Done(capability.clone()));
        Ok(capability)
    }

    fn resolve_service(&mut self, id: TypeId) -> Result<TypeUsage, GraphError> {
        let registry = self.registry;
        let declaration = registry.get(id);
        match self.states.get(&id) {
            Some(State::Done(service)) => return Ok(service.type_usage.clone()),
            Some(State::InProgress) => return Err(self.cycle(declaration.name.clone())),
            None => {}
        }

        self.states.insert(id, State::InProgress);
        self.path.push(declaration.name.clone());
        let constructor = match self.designated_initializer(declaration)? {
            Some(initializer) => ServiceConstructor {
                args: self.resolve_arguments(&declaration.name, None, &initializer.params)?,
                is_failable: initializer.is_failable,
            },
            None => ServiceConstructor::default(),
        };
        self.path.pop();

        let service = Service {
            type_usage: TypeUsage::new(declaration.name.clone()),
            is_reference: declaration.is_reference,
            constructor,
            storage: if declaration.directives.cached {
                StoragePolicy::Cached
            } else {
                StoragePolicy::None
            },
            bound_to: declaration
                .directives
                .bind_to
                .as_ref()
                .map(|protocol| registry.canonical(protocol)),
        };
        debug!("service `{}` resolved", declaration.name);
        let usage = service.type_usage.clone();
        self.states.insert(id, State::Done(service));
        Ok(usage)
    }

    fn designated_initializer<'d>(
        &self,
        declaration: &'d Declaration,
    ) -> Result<Option<&'d Initializer>, GraphError> {
        let accessible: Vec<&Initializer> = declaration
            .initializers
            .iter()
            .filter(|i| i.visibility.is_accessible())
            .collect();
        match accessible.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(single)),
            several => {
                let mut injected = several.iter().filter(|i| i.directives.inject);
                match (injected.next(), injected.next()) {
                    (Some(initializer), None) => Ok(Some(initializer)),
                    _ => Err(GraphError::AmbiguousInitializer {
                        container: self.container.clone(),
                        type_name: declaration.name.clone(),
                        count: several.len(),
                    }),
                }
            }
        }
    }

    fn resolve_arguments(
        &mut self,
        dependent: &str,
        owner: Option<CapabilityKey>,
        params: &[Parameter],
    ) -> Result<Vec<FunctionInvocationArgument>, GraphError> {
        params
            .iter()
            .map(|param| {
                Ok(FunctionInvocationArgument {
                    name: param.label.clone(),
                    resolver: self.resolve_parameter(dependent, owner, param)?,
                })
            })
            .collect()
    }

    /// External capabilities take precedence over the provider instances,
    /// which take precedence over constructible types.
    fn resolve_parameter(
        &mut self,
        dependent: &str,
        owner: Option<CapabilityKey>,
        param: &Parameter,
    ) -> Result<TypeResolver, GraphError> {
        let canonical = self.registry.canonical(&param.ty);

        if let Some(key) = self.match_capability(dependent, owner, param, &canonical)? {
            let capability = self.resolve_capability(key)?;
            return Ok(TypeResolver::External {
                from: self.providers[key.0].usage.clone(),
                capability,
            });
        }

        if let Some(provider) = self.provider(&canonical.name) {
            return Ok(TypeResolver::Provider(provider.clone()));
        }

        if let Some(id) = self.constructible(&canonical.name) {
            return Ok(TypeResolver::Explicit(self.resolve_service(id)?));
        }

        if let Some(id) = self.bound_implementation(&canonical.name)? {
            return Ok(TypeResolver::Explicit(self.resolve_service(id)?));
        }

        Err(GraphError::UnresolvableDependency {
            container: self.container.clone(),
            dependent: dependent.to_string(),
            parameter: param.name.clone(),
            type_name: canonical.full_name(),
        })
    }

    fn match_capability(
        &self,
        dependent: &str,
        owner: Option<CapabilityKey>,
        param: &Parameter,
        canonical: &TypeUsage,
    ) -> Result<Option<CapabilityKey>, GraphError> {
        let wanted = canonical.full_name();
        let mut candidates: Vec<CapabilityKey> = Vec::new();
        for (p, provider) in self.providers.iter().enumerate() {
            for (c, raw) in provider.capabilities.iter().enumerate() {
                let matches = raw.name == param.name && raw.ty.full_name() == wanted;
                if matches && Some((p, c)) != owner {
                    candidates.push((p, c));
                }
            }
        }

        match candidates.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(*single)),
            several => Err(GraphError::AmbiguousExternal {
                container: self.container.clone(),
                dependent: dependent.to_string(),
                parameter: param.name.clone(),
                type_name: wanted,
                candidates: several
                    .iter()
                    .map(|key| self.capability_label(*key))
                    .collect(),
            }),
        }
    }

    /// Registered provider whose type is `name`.
    fn provider(&self, name: &str) -> Option<&TypeUsage> {
        self.providers
            .iter()
            .map(|p| &p.usage)
            .find(|usage| usage.name == name)
    }

    /// A class or struct that is transient or scoped to this container and
    /// not one of its providers.
    fn constructible(&self, name: &str) -> Option<TypeId> {
        if self.provider(name).is_some() {
            return None;
        }
        let id = self.registry.id_of(name)?;
        let declaration = self.registry.get(id);
        let in_scope = declaration
            .directives
            .scope
            .as_deref()
            .map_or(true, |scope| scope == self.scope);
        (declaration.is_constructible_kind() && in_scope).then_some(id)
    }

    /// The single constructible declaration bound to protocol `name`.
    fn bound_implementation(&self, name: &str) -> Result<Option<TypeId>, GraphError> {
        let Some(protocol) = self.registry.resolve(name) else {
            return Ok(None);
        };
        if protocol.kind != DeclarationKind::Protocol {
            return Ok(None);
        }
        let mut bound = self.registry.declarations().filter(|(id, d)| {
            d.directives
                .bind_to
                .as_ref()
                .is_some_and(|target| self.registry.canonical(target).name == protocol.name)
                && self.constructible(&d.name) == Some(*id)
        });
        match (bound.next(), bound.next()) {
            (None, _) => Ok(None),
            (Some((id, _)), None) => Ok(Some(id)),
            (Some((_, first)), Some((_, second))) => Err(GraphError::DuplicateBinding {
                container: self.container.clone(),
                protocol: protocol.name.clone(),
                first: first.name.clone(),
                second: second.name.clone(),
            }),
        }
    }

    /// `Env.token` for properties, `Env.client(api:_:)` for methods.
    fn capability_label(&self, (p, c): CapabilityKey) -> String {
        let provider = &self.providers[p];
        let raw = &provider.capabilities[c];
        match &raw.params {
            None => format!("{}.{}", provider.usage.name, raw.name),
            Some(params) => {
                let labels: String = params
                    .iter()
                    .map(|param| format!("{}:", param.label.as_deref().unwrap_or("_")))
                    .collect();
                format!("{}.{}({labels})", provider.usage.name, raw.name)
            }
        }
    }

    /// Cycle from the first occurrence of `label` on the path back to it.
    fn cycle(&self, label: String) -> GraphError {
        let start = self.path.iter().position(|p| *p == label).unwrap_or(0);
        let mut chain = self.path[start..].to_vec();
        chain.push(label);
        GraphError::CyclicDependency {
            container: self.container.clone(),
            chain,
        }
    }
}
