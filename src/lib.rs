//! saber: generates dependency-injection containers from annotated sources.
//!
//! Layers, leaves first: `domain` (extraction, registry, graph), `application`
//! (view, renderer, generator service), `infrastructure` (filesystem,
//! discovery, wiring) and `cli`.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
