//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Errors raised while turning source text into declarations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("{file}:{line}: malformed directive `{text}`: {reason}")]
    MalformedDirective {
        file: String,
        line: usize,
        text: String,
        reason: String,
    },

    #[error("{file}:{line}: unterminated block comment")]
    UnterminatedComment { file: String, line: usize },

    #[error("{file}:{line}: unterminated string literal")]
    UnterminatedString { file: String, line: usize },

    #[error("{file}:{line}: expected {expected}, found `{found}`")]
    UnexpectedToken {
        file: String,
        line: usize,
        expected: String,
        found: String,
    },

    #[error("{file}: unexpected end of input, expected {expected}")]
    UnexpectedEof { file: String, expected: String },
}

/// Errors raised while building the type registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate declaration `{name}` (lines {first_line} and {second_line})")]
    DuplicateDeclaration {
        name: String,
        first_line: usize,
        second_line: usize,
    },

    #[error("unresolved alias `{name}`: {}", chain.join(" -> "))]
    UnresolvedAlias { name: String, chain: Vec<String> },
}

/// Errors raised while building a container graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("invalid container `{container}` declared on `{declaration}`: {reason}")]
    InvalidContainer {
        container: String,
        declaration: String,
        reason: String,
    },

    #[error("container `{0}` is declared more than once")]
    DuplicateContainer(String),

    #[error("container `{container}`: external `{external}` is registered more than once")]
    DuplicateExternal { container: String, external: String },

    #[error("container `{container}`: external `{external}` is not declared")]
    UnknownExternal { container: String, external: String },

    #[error("container `{container}`: cyclic dependency {}", chain.join(" -> "))]
    CyclicDependency {
        container: String,
        chain: Vec<String>,
    },

    #[error(
        "container `{container}`: cannot resolve `{parameter}: {type_name}` required by `{dependent}`"
    )]
    UnresolvableDependency {
        container: String,
        dependent: String,
        parameter: String,
        type_name: String,
    },

    #[error(
        "container `{container}`: `{parameter}: {type_name}` required by `{dependent}` matches several externals: {}",
        candidates.join(", ")
    )]
    AmbiguousExternal {
        container: String,
        dependent: String,
        parameter: String,
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("container `{container}`: `{type_name}` has {count} initializers and none is marked `inject`")]
    AmbiguousInitializer {
        container: String,
        type_name: String,
        count: usize,
    },

    #[error("container `{container}`: `{protocol}` is bound by both `{first}` and `{second}`")]
    DuplicateBinding {
        container: String,
        protocol: String,
        first: String,
        second: String,
    },
}

/// Domain errors: any failure of the extraction/registry/graph pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_cycle_error_when_displaying_then_shows_full_chain() {
        let err = GraphError::CyclicDependency {
            container: "App".into(),
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(
            err.to_string(),
            "container `App`: cyclic dependency A -> B -> A"
        );
    }

    #[test]
    fn given_alias_cycle_when_displaying_then_shows_chain() {
        let err = RegistryError::UnresolvedAlias {
            name: "A".into(),
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "unresolved alias `A`: A -> B -> A");
    }
}
