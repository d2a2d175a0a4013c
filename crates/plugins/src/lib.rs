//! Plugin descriptors, availability filtering, and the plugin registry.
//!
//! A [`PluginSpec`] is immutable after construction; the registry holds an
//! ordered snapshot of specs and is swapped wholesale on reload, never
//! mutated in place.

pub mod availability;
pub mod config;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod runner;

pub use {
    availability::plugin_available,
    config::{MatcherConfig, PluginConfig, compile_plugins, load_plugin_set},
    error::{Error, Result},
    plugin::{InputMatcher, PluginSpec},
    registry::PluginRegistry,
    runner::{Invocation, PluginRunner},
};
