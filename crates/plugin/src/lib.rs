//! devkit-plugin – Validierung und sicheres Laden von Plugins
//!
//! Plugins liegen als Verzeichnis mit `manifest.json` und `plugin.wasm` in
//! einem der Suchpfade. Bevor Plugin-Code laeuft werden Manifest, Pruefsumme
//! und Schnittstelle geprueft; danach wird jedes Plugin in einem eigenen
//! wasmtime-Store instanziiert.
//!
//! # Architektur
//! - [`manifest::PluginManifest`] – Manifest lesen, Schema und Pruefsumme pruefen
//! - [`validator::VerzeichnisValidator`] – Verzeichnis und Einstiegspunkt pruefen
//! - [`manager::PluginManager`] – Entdecken, Laden, Registrieren
//! - [`manager::PluginSystem`] – fertiges System: Abfragen und Hook-Ausfuehrung
//! - [`hooks::HookDispatcher`] – Hooks pro Stage in Ladereihenfolge
//! - [`host`] – WASM Runtime, Sandbox und Host-API

pub mod error;
pub mod hooks;
pub mod host;
pub mod manager;
pub mod manifest;
pub mod plugin;
pub mod registry;
pub mod trust;
pub mod types;
pub mod validator;

#[cfg(test)]
mod tests;

/// Log-Target fuer Sicherheitsereignisse (Manipulation, verweigerte Zugriffe, Limits)
pub const SICHERHEIT_TARGET: &str = "devkit::sicherheit";

// Bequeme Re-Exporte
pub use error::{PluginError, Result};
pub use hooks::HookDispatcher;
pub use manager::{EntdecktesPlugin, ManagerKonfiguration, PluginManager, PluginSystem};
pub use manifest::{manifest_datei_validieren, PluginManifest, SchemaFehler};
pub use plugin::{EingebauterHook, Hook, HookTabelle, Plugin};
pub use registry::{PluginRecord, PluginRegistry};
pub use types::{Berechtigung, HookKontext, HookStatus, PluginInfo, Stage};
pub use validator::{GeprueftesPlugin, VerzeichnisValidator};
