//! Fehlertypen fuer das Plugin-System
//!
//! Jede Stufe der Lade-Pipeline (Entdeckt → Validiert → Geladen → Registriert)
//! meldet ihren Fehler ueber eine eigene Variante. Kein Fehler ist fuer den
//! Host fatal: der Manager wandelt ihn in "Plugin ueberspringen" um.

use thiserror::Error;

use crate::manifest::SchemaFehler;

/// Alle moeglichen Fehler im Plugin-System
#[derive(Debug, Error)]
pub enum PluginError {
    // --- Verzeichnis / Manifest ---
    #[error("Plugin-Verzeichnis nicht gefunden: {0}")]
    VerzeichnisFehlt(String),

    #[error("manifest.json fehlt: {0}")]
    ManifestFehlt(String),

    #[error("Ungueltiges Manifest-JSON: {0}")]
    ManifestUngueltig(String),

    #[error("Manifest-Validierung fehlgeschlagen: {}", fehler_verbinden(.0))]
    ManifestSchema(Vec<SchemaFehler>),

    // --- Integritaet ---
    #[error("Integritaets-Pruefsumme fehlt im Manifest")]
    PruefsummeFehlt,

    #[error(
        "Manifest-Integritaetspruefung fehlgeschlagen, Plugin wurde moeglicherweise manipuliert \
         (erwartet: {erwartet}, berechnet: {berechnet})"
    )]
    IntegritaetVerletzt { erwartet: String, berechnet: String },

    // --- Einstiegspunkt ---
    #[error("Einstiegspunkt fehlt: {0}")]
    EinstiegspunktFehlt(String),

    #[error("Einstiegspunkt ist leer: {0}")]
    EinstiegspunktLeer(String),

    #[error("Plugin-Schnittstelle unvollstaendig, fehlende Operationen: {}", .0.join(", "))]
    SchnittstelleUnvollstaendig(Vec<String>),

    // --- WASM Laufzeit ---
    #[error("WASM Kompilierungsfehler: {0}")]
    WasmKompilierung(String),

    #[error("WASM Instanziierungsfehler: {0}")]
    WasmInstanziierung(String),

    #[error("WASM Ausfuehrungsfehler: {0}")]
    WasmAusfuehrung(String),

    #[error("Keine Plugin-Implementierung gefunden: {0}")]
    KeineImplementierung(String),

    // --- Lifecycle ---
    #[error("Plugin Initialisierung fehlgeschlagen: {0}")]
    Initialisierung(String),

    #[error("Plugin '{name}' hat sich selbst abgelehnt: {}", .fehler.join("; "))]
    SelbstvalidierungFehlgeschlagen { name: String, fehler: Vec<String> },

    #[error("Plugin bereits geladen: {0}")]
    BereitsGeladen(String),

    // --- Hooks ---
    #[error("Hook-Ausfuehrung fehlgeschlagen: {0}")]
    HookAusfuehrung(String),

    // --- IO ---
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    // --- Intern ---
    #[error("Interner Plugin-Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PluginError {
    /// Gibt true zurueck wenn der Fehler auf Manipulation oder Beschaedigung hindeutet
    pub fn ist_sicherheitsrelevant(&self) -> bool {
        matches!(self, Self::IntegritaetVerletzt { .. } | Self::PruefsummeFehlt)
    }
}

fn fehler_verbinden(fehler: &[SchemaFehler]) -> String {
    fehler
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result-Alias fuer das Plugin-System
pub type Result<T> = std::result::Result<T, PluginError>;
