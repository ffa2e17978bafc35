//! Plugin Registry – haelt die registrierten Plugins und ihre Metadaten

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{PluginError, Result};
use crate::plugin::{HookTabelle, Plugin};
use crate::types::{Berechtigung, PluginInfo};

/// Eintrag fuer ein erfolgreich geladenes Plugin.
///
/// Rollen und Hooks werden beim Erstellen einmal abgefragt und danach nicht
/// mehr veraendert.
pub struct PluginRecord {
    name: String,
    version: String,
    beschreibung: String,
    berechtigungen: BTreeSet<Berechtigung>,
    verzeichnis: Option<PathBuf>,
    plugin: Box<dyn Plugin>,
    rollen: HashMap<String, PathBuf>,
    hooks: HookTabelle,
    geladen_am: DateTime<Utc>,
}

impl PluginRecord {
    /// Erstellt den Eintrag und sammelt Rollen und Hooks des Plugins ein
    pub fn neu(plugin: Box<dyn Plugin>, verzeichnis: Option<PathBuf>) -> Result<Self> {
        let rollen = plugin.rollen()?;
        let hooks = plugin.hooks()?;
        Ok(Self {
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
            beschreibung: plugin.beschreibung().to_string(),
            berechtigungen: plugin.berechtigungen(),
            verzeichnis,
            plugin,
            rollen,
            hooks,
            geladen_am: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn beschreibung(&self) -> &str {
        &self.beschreibung
    }

    pub fn berechtigungen(&self) -> &BTreeSet<Berechtigung> {
        &self.berechtigungen
    }

    /// Quellverzeichnis (`None` bei eingebauten Plugins)
    pub fn verzeichnis(&self) -> Option<&Path> {
        self.verzeichnis.as_deref()
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn rollen(&self) -> &HashMap<String, PathBuf> {
        &self.rollen
    }

    pub fn hooks(&self) -> &HookTabelle {
        &self.hooks
    }

    pub fn geladen_am(&self) -> DateTime<Utc> {
        self.geladen_am
    }

    /// Anzahl aller Hooks ueber alle Stages
    pub fn hook_anzahl(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            version: self.version.clone(),
            description: self.beschreibung.clone(),
            roles: self.rollen.len(),
            hooks: self.hook_anzahl(),
            permissions: self.berechtigungen.clone(),
            geladen_am: self.geladen_am,
        }
    }
}

impl std::fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRecord")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("verzeichnis", &self.verzeichnis)
            .field("rollen", &self.rollen.len())
            .field("hooks", &self.hook_anzahl())
            .field("geladen_am", &self.geladen_am)
            .finish_non_exhaustive()
    }
}

/// Plugin Registry – Eintraege in Registrierungsreihenfolge plus Namensindex
#[derive(Debug, Default)]
pub struct PluginRegistry {
    eintraege: Vec<PluginRecord>,
    /// Name -> Position Lookup
    name_index: HashMap<String, usize>,
}

impl PluginRegistry {
    /// Erstellt eine neue leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert ein Plugin; ein bereits vergebener Name wird abgelehnt
    pub(crate) fn registrieren(&mut self, eintrag: PluginRecord) -> Result<()> {
        if self.name_index.contains_key(&eintrag.name) {
            return Err(PluginError::BereitsGeladen(eintrag.name));
        }
        self.name_index.insert(eintrag.name.clone(), self.eintraege.len());
        self.eintraege.push(eintrag);
        Ok(())
    }

    /// Prueft ob ein Name bereits vergeben ist
    pub fn enthaelt(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Sucht ein Plugin per Name
    pub fn per_name(&self, name: &str) -> Option<&PluginRecord> {
        self.name_index.get(name).map(|&i| &self.eintraege[i])
    }

    /// Alle Eintraege in Registrierungsreihenfolge
    pub fn alle(&self) -> impl Iterator<Item = &PluginRecord> {
        self.eintraege.iter()
    }

    /// Namen aller Plugins in Registrierungsreihenfolge
    pub fn namen(&self) -> Vec<String> {
        self.eintraege.iter().map(|e| e.name.clone()).collect()
    }

    /// Vereinigung aller Rollen; spaeter registrierte Plugins gewinnen bei gleichem Rollennamen
    pub fn rollen(&self) -> HashMap<String, PathBuf> {
        let mut alle = HashMap::new();
        for eintrag in &self.eintraege {
            alle.extend(eintrag.rollen.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        alle
    }

    /// Metadaten aller Plugins, nach Name sortiert
    pub fn info(&self) -> BTreeMap<String, PluginInfo> {
        self.eintraege
            .iter()
            .map(|e| (e.name.clone(), e.info()))
            .collect()
    }

    /// Anzahl registrierter Plugins
    pub fn anzahl(&self) -> usize {
        self.eintraege.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.is_empty()
    }
}
