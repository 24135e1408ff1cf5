//! Client configuration
//!
//! Loaded once at startup from `config.toml`, the environment and CLI flags;
//! never changed while running.

mod defaults;
mod loader;
mod schema;

pub use defaults::DEFAULT_CONFIG_TOML;
pub use loader::ConfigLoader;
pub use schema::{AppConfig, PipelineConfig, SelectorConfig, SessionConfig, UiConfig};
