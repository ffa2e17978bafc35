//! Sandbox-Konfiguration fuer WASM-Plugins
//!
//! Ein Plugin bekommt keinen WASI-Kontext. Alles was es ueber seinen
//! linearen Speicher hinaus erreichen kann, laeuft ueber die Host-API und
//! wird dort gegen die deklarierten Berechtigungen geprueft.

use std::collections::BTreeSet;

use crate::types::Berechtigung;

/// Standard-Speicherlimit pro Plugin (64 MB)
pub const STANDARD_SPEICHER_BYTES: u64 = 64 * 1024 * 1024;

/// Standard-Fuel pro Aufruf
pub const STANDARD_INSTRUKTIONEN: u64 = 1_000_000_000;

/// Sandbox-Konfiguration die aus den Manifest-Berechtigungen abgeleitet wird
#[derive(Debug, Clone)]
pub struct SandboxKonfiguration {
    /// Deklarierte Berechtigungen
    pub berechtigungen: BTreeSet<Berechtigung>,
    /// Maximale Speichernutzung in Bytes
    pub max_speicher_bytes: u64,
    /// Maximales Fuel pro Aufruf (0 = unbegrenzt)
    pub max_instruktionen: u64,
}

impl SandboxKonfiguration {
    /// Standard-Sandbox – keine Berechtigungen
    pub fn minimal() -> Self {
        Self {
            berechtigungen: BTreeSet::new(),
            max_speicher_bytes: STANDARD_SPEICHER_BYTES,
            max_instruktionen: STANDARD_INSTRUKTIONEN,
        }
    }

    /// Erstellt Sandbox-Konfiguration aus Berechtigungen und Limits
    pub fn aus_berechtigungen(
        berechtigungen: BTreeSet<Berechtigung>,
        max_speicher_bytes: u64,
        max_instruktionen: u64,
    ) -> Self {
        Self {
            berechtigungen,
            max_speicher_bytes,
            max_instruktionen,
        }
    }

    pub fn erlaubt(&self, berechtigung: Berechtigung) -> bool {
        self.berechtigungen.contains(&berechtigung)
    }
}

impl Default for SandboxKonfiguration {
    fn default() -> Self {
        Self::minimal()
    }
}
