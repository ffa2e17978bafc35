//! Host-Subsystem fuer WASM-Plugins
//!
//! Stellt Runtime, Host-API, Sandbox und den Plugin-Adapter bereit.

pub mod api;
pub mod runtime;
pub mod sandbox;
pub mod wasm_plugin;
