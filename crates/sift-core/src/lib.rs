//! Configuration loading and component bootstrap.

pub mod bootstrap;
pub mod config;

pub use bootstrap::{
    Backend, build_backend, build_manager, build_searcher, chunkable_kinds, default_embedder,
    index_options, resolve_config_path,
};
pub use config::{BackendKind, Config};
