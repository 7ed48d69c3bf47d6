//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod container;
pub mod directive;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod lexer;
pub mod registry;

pub use container::*;
pub use entities::*;
pub use error::{DomainError, ExtractionError, GraphError, RegistryError};
pub use extractor::Extractor;
pub use graph::ContainerGraphBuilder;
pub use registry::{TypeId, TypeRegistry};
