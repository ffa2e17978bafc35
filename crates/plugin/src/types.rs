//! Grundlegende Typen fuer das Plugin-System

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle-Punkt an dem Hooks laufen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreSetup,
    PostSetup,
    PreRole,
    PostRole,
}

impl Stage {
    /// Alle Stages in Lifecycle-Reihenfolge
    pub const ALLE: [Stage; 4] = [
        Stage::PreSetup,
        Stage::PostSetup,
        Stage::PreRole,
        Stage::PostRole,
    ];

    pub fn als_str(&self) -> &'static str {
        match self {
            Stage::PreSetup => "pre_setup",
            Stage::PostSetup => "post_setup",
            Stage::PreRole => "pre_role",
            Stage::PostRole => "post_role",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    /// Akzeptiert `pre_setup` ebenso wie `pre-setup`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "pre_setup" => Ok(Stage::PreSetup),
            "post_setup" => Ok(Stage::PostSetup),
            "pre_role" => Ok(Stage::PreRole),
            "post_role" => Ok(Stage::PostRole),
            _ => Err(format!("Unbekannte Stage: {s}")),
        }
    }
}

/// Zustand eines Hook-Durchlaufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookStatus {
    #[serde(rename = "running")]
    Laeuft,
    #[serde(rename = "success")]
    Erfolg,
    #[serde(rename = "failed")]
    Fehlgeschlagen,
}

impl std::fmt::Display for HookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookStatus::Laeuft => write!(f, "running"),
            HookStatus::Erfolg => write!(f, "success"),
            HookStatus::Fehlgeschlagen => write!(f, "failed"),
        }
    }
}

/// Kontext der durch einen Dispatch-Aufruf gereicht wird.
///
/// Pro Aufruf frisch erzeugt, von Dispatcher und Hooks veraendert und danach
/// verworfen. Die Feldnamen auf dem Draht (JSON fuer WASM-Hooks) sind englisch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookKontext {
    pub stage: Stage,
    #[serde(rename = "role", default, skip_serializing_if = "Option::is_none")]
    pub rolle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub status: HookStatus,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub fehler: Option<String>,
    #[serde(rename = "metadata", default)]
    pub metadaten: serde_json::Map<String, serde_json::Value>,
}

impl HookKontext {
    /// Neuer Kontext mit Status `running`
    pub fn neu(stage: Stage) -> Self {
        Self {
            stage,
            rolle: None,
            task: None,
            status: HookStatus::Laeuft,
            fehler: None,
            metadaten: serde_json::Map::new(),
        }
    }

    pub fn mit_rolle(mut self, rolle: impl Into<String>) -> Self {
        self.rolle = Some(rolle.into());
        self
    }

    pub fn mit_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

/// Deklarierte Zugriffskategorie eines Plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Berechtigung {
    /// Dateien lesen/schreiben
    Filesystem,
    /// Netzwerkanfragen
    Network,
    /// Systembefehle ausfuehren
    System,
    /// Umgebungsvariablen lesen
    Environment,
}

impl Berechtigung {
    /// Die vollstaendige Allow-Liste
    pub const ALLE: [Berechtigung; 4] = [
        Berechtigung::Filesystem,
        Berechtigung::Network,
        Berechtigung::System,
        Berechtigung::Environment,
    ];

    pub fn als_str(&self) -> &'static str {
        match self {
            Berechtigung::Filesystem => "filesystem",
            Berechtigung::Network => "network",
            Berechtigung::System => "system",
            Berechtigung::Environment => "environment",
        }
    }
}

impl std::fmt::Display for Berechtigung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl FromStr for Berechtigung {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Berechtigung::ALLE
            .into_iter()
            .find(|b| b.als_str() == s)
            .ok_or_else(|| format!("Unbekannte Berechtigung: {s}"))
    }
}

/// Oeffentliche Informationen ueber ein geladenes Plugin (fuer CLI/API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub version: String,
    pub description: String,
    pub roles: usize,
    pub hooks: usize,
    pub permissions: BTreeSet<Berechtigung>,
    pub geladen_am: DateTime<Utc>,
}
