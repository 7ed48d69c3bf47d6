//! Integration tests: sources through extraction, registry and graph building.

use saber::domain::{
    Container, ContainerGraphBuilder, Declaration, ExternalCapability, Extractor, GraphError,
    RegistryError, StoragePolicy, TypeRegistry, TypeResolver, TypeUsage,
};
use saber::util::testing::init_test_setup;

fn extract_all(files: &[(&str, &str)]) -> Vec<Declaration> {
    let extractor = Extractor::default();
    files
        .iter()
        .flat_map(|(file, source)| extractor.extract(source, file).unwrap())
        .collect()
}

fn build(files: &[(&str, &str)]) -> Result<Vec<Container>, GraphError> {
    let registry = TypeRegistry::build(extract_all(files)).unwrap();
    ContainerGraphBuilder::new(&registry).build_all()
}

fn service_names(container: &Container) -> Vec<String> {
    container
        .services
        .iter()
        .map(|s| s.type_usage.name.clone())
        .collect()
}

const CONTAINERS: &str = "
// @saber.container(AppContainer)
// @saber.scope(Singleton)
// @saber.externals(Env)
protocol AppContaining {}

// @saber.container(RequestContainer)
// @saber.scope(Request)
protocol RequestContaining {}
";

const SERVICES: &str = "
typealias Token = String

class Env {
    let token: Token
}

// @saber.scope(Singleton)
// @saber.cached
class Storage {
    init() {}
}

// @saber.scope(Singleton)
class Api {
    init(token: String, storage: Storage, clock: Clock) {}
}

struct Clock {
    init() {}
}

// @saber.scope(Request)
class Handler {
    init(clock: Clock) {}
}
";

#[test]
fn given_sources_in_several_files_when_building_then_each_container_resolved() {
    // Arrange
    init_test_setup();
    let files = [("Containers.swift", CONTAINERS), ("Services.swift", SERVICES)];

    // Act
    let containers = build(&files).expect("build");

    // Assert
    assert_eq!(containers.len(), 2);
    let app = &containers[0];
    assert_eq!(app.name, "AppContainer");
    assert_eq!(app.protocol, TypeUsage::new("AppContaining"));
    assert_eq!(service_names(app), vec!["Storage", "Api", "Clock"]);
    assert_eq!(app.service("Storage").unwrap().storage, StoragePolicy::Cached);
    assert!(!app.service("Clock").unwrap().is_reference);

    let request = &containers[1];
    assert_eq!(request.name, "RequestContainer");
    assert!(request.externals.is_empty());
    assert_eq!(service_names(request), vec!["Clock", "Handler"]);
}

#[test]
fn given_alias_param_when_building_then_matches_external_by_canonical_type() {
    init_test_setup();
    let files = [("Containers.swift", CONTAINERS), ("Services.swift", SERVICES)];

    let containers = build(&files).expect("build");

    let api = containers[0].service("Api").unwrap();
    assert_eq!(
        api.constructor.args[0].resolver,
        TypeResolver::External {
            from: TypeUsage::new("Env"),
            capability: ExternalCapability::Property {
                name: "token".into()
            },
        }
    );
    assert_eq!(
        api.constructor.args[1].resolver,
        TypeResolver::Explicit(TypeUsage::new("Storage"))
    );
}

#[test]
fn given_reordered_files_when_building_then_order_follows_discovery() {
    init_test_setup();
    let files = [("Services.swift", SERVICES), ("Containers.swift", CONTAINERS)];

    let containers = build(&files).expect("build");

    assert_eq!(service_names(&containers[0]), vec!["Storage", "Api", "Clock"]);
}

#[test]
fn given_singleton_dependency_from_request_scope_when_building_then_unresolvable() {
    // Arrange
    init_test_setup();
    let extra = "
// @saber.scope(Request)
class Presenter {
    init(api: Api) {}
}
";
    let files = [
        ("Containers.swift", CONTAINERS),
        ("Services.swift", SERVICES),
        ("Presenter.swift", extra),
    ];

    // Act
    let err = build(&files).unwrap_err();

    // Assert
    assert_eq!(
        err,
        GraphError::UnresolvableDependency {
            container: "RequestContainer".into(),
            dependent: "Presenter".into(),
            parameter: "api".into(),
            type_name: "Api".into(),
        }
    );
}

#[test]
fn given_cycle_across_files_when_building_then_reports_chain() {
    init_test_setup();
    let container = "
// @saber.container(App)
// @saber.scope(Main)
protocol AppContaining {}
";
    let first = "
// @saber.scope(Main)
class Router {
    init(coordinator: Coordinator) {}
}
";
    let second = "
// @saber.scope(Main)
class Coordinator {
    init(router: Router) {}
}
";

    let err = build(&[
        ("App.swift", container),
        ("Router.swift", first),
        ("Coordinator.swift", second),
    ])
    .unwrap_err();

    assert_eq!(
        err,
        GraphError::CyclicDependency {
            container: "App".into(),
            chain: vec!["Router".into(), "Coordinator".into(), "Router".into()],
        }
    );
    assert!(err.to_string().contains("Router -> Coordinator -> Router"));
}

#[test]
fn given_same_type_in_two_files_when_building_registry_then_duplicate() {
    init_test_setup();
    let declarations = extract_all(&[
        ("A.swift", "class Foo {}\n"),
        ("B.swift", "\n\nclass Foo {}\n"),
    ]);

    let err = TypeRegistry::build(declarations).unwrap_err();

    assert!(matches!(
        err,
        RegistryError::DuplicateDeclaration { ref name, .. } if name == "Foo"
    ));
}
