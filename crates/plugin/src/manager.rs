//! PluginManager – Entdecken, Laden und Registrieren von Plugins
//!
//! Zentrale Komponente die alle anderen Teile des Plugin-Systems zusammenfuehrt.
//! Ein Plugin durchlaeuft beim Laden die Stufen
//! Entdeckt → Validiert → Integritaet → Instanziiert → Initialisiert →
//! Selbstvalidiert → Registriert. Jede Stufe kann das Plugin ablehnen; der
//! Host laeuft dann ohne dieses Plugin weiter.
//!
//! Nach [`PluginManager::fertigstellen`] gibt es nur noch das lesende
//! [`PluginSystem`] – Registrieren und Hook-Ausfuehrung ueberschneiden sich nie.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{PluginError, Result};
use crate::hooks::HookDispatcher;
use crate::host::runtime::PluginEngine;
use crate::host::sandbox::{SandboxKonfiguration, STANDARD_INSTRUKTIONEN, STANDARD_SPEICHER_BYTES};
use crate::host::wasm_plugin::WasmPlugin;
use crate::plugin::Plugin;
use crate::registry::{PluginRecord, PluginRegistry};
use crate::types::{HookKontext, PluginInfo, Stage};
use crate::validator::{VerzeichnisValidator, EINSTIEGSPUNKT};

/// Konfiguration fuer den PluginManager
#[derive(Debug, Clone)]
pub struct ManagerKonfiguration {
    /// Plugins ohne Pruefsumme im Manifest werden abgelehnt
    pub pruefsumme_erforderlich: bool,
    /// Speicherlimit pro Plugin in Bytes
    pub max_speicher_bytes: u64,
    /// Fuel pro Aufruf (0 = unbegrenzt)
    pub max_instruktionen: u64,
}

impl Default for ManagerKonfiguration {
    fn default() -> Self {
        Self {
            pruefsumme_erforderlich: false,
            max_speicher_bytes: STANDARD_SPEICHER_BYTES,
            max_instruktionen: STANDARD_INSTRUKTIONEN,
        }
    }
}

/// Kandidat aus der Suche in den Suchpfaden
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntdecktesPlugin {
    pub pfad: PathBuf,
    pub name: String,
}

/// PluginManager – laedt Plugins und baut Registry und Dispatcher auf
pub struct PluginManager {
    konfiguration: ManagerKonfiguration,
    engine: PluginEngine,
    suchpfade: Vec<PathBuf>,
    registry: PluginRegistry,
    dispatcher: HookDispatcher,
}

impl PluginManager {
    /// Erstellt einen neuen PluginManager
    pub fn neu(konfiguration: ManagerKonfiguration) -> Result<Self> {
        Ok(Self {
            konfiguration,
            engine: PluginEngine::neu()?,
            suchpfade: Vec::new(),
            registry: PluginRegistry::neu(),
            dispatcher: HookDispatcher::neu(),
        })
    }

    pub fn konfiguration(&self) -> &ManagerKonfiguration {
        &self.konfiguration
    }

    pub fn engine(&self) -> &PluginEngine {
        &self.engine
    }

    /// Fuegt einen Suchpfad hinzu. Nicht existierende Pfade und Duplikate werden ignoriert.
    pub fn suchpfad_hinzufuegen(&mut self, pfad: impl AsRef<Path>) -> bool {
        let pfad = pfad.as_ref();
        if !pfad.is_dir() {
            warn!(pfad = %pfad.display(), "Plugin-Suchpfad existiert nicht");
            return false;
        }

        let kanonisch = pfad.canonicalize().unwrap_or_else(|_| pfad.to_path_buf());
        if self.suchpfade.contains(&kanonisch) {
            return false;
        }
        debug!(pfad = %kanonisch.display(), "Plugin-Suchpfad hinzugefuegt");
        self.suchpfade.push(kanonisch);
        true
    }

    /// Aktive Suchpfade in Einfuegereihenfolge
    pub fn suchpfade(&self) -> &[PathBuf] {
        &self.suchpfade
    }

    /// Sucht Plugin-Kandidaten in allen Suchpfaden.
    ///
    /// Pro Pfad werden die direkten Eintraege nach Dateiname sortiert.
    /// Namen mit `_` am Anfang werden uebersprungen. Kandidaten sind
    /// `*.wasm` Dateien und Verzeichnisse mit `plugin.wasm`.
    pub fn plugins_entdecken(&self) -> Vec<EntdecktesPlugin> {
        let mut gefunden = Vec::new();

        for suchpfad in &self.suchpfade {
            let mut eintraege: Vec<_> = match std::fs::read_dir(suchpfad) {
                Ok(e) => e.flatten().collect(),
                Err(e) => {
                    warn!(pfad = %suchpfad.display(), "Suchpfad nicht lesbar: {}", e);
                    continue;
                }
            };
            eintraege.sort_by_key(|e| e.file_name());

            for eintrag in eintraege {
                let pfad = eintrag.path();
                let Ok(dateiname) = eintrag.file_name().into_string() else {
                    continue;
                };
                if dateiname.starts_with('_') {
                    continue;
                }

                if pfad.is_file() && pfad.extension().is_some_and(|ext| ext == "wasm") {
                    let name = pfad
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or(&dateiname)
                        .to_string();
                    gefunden.push(EntdecktesPlugin { pfad, name });
                } else if pfad.is_dir() && pfad.join(EINSTIEGSPUNKT).is_file() {
                    gefunden.push(EntdecktesPlugin {
                        pfad,
                        name: dateiname,
                    });
                }
            }
        }

        debug!(anzahl = gefunden.len(), "Plugin-Kandidaten entdeckt");
        gefunden
    }

    /// Laedt ein einzelnes Plugin. Schlaegt nie fehl: jeder Fehler wird
    /// protokolliert und ergibt `None`.
    pub fn plugin_laden(&self, pfad: &Path, name: &str) -> Option<PluginRecord> {
        match self.laden(pfad, name) {
            Ok(eintrag) => {
                info!(
                    plugin = %eintrag.name(),
                    version = %eintrag.version(),
                    rollen = eintrag.rollen().len(),
                    hooks = eintrag.hook_anzahl(),
                    "Plugin geladen"
                );
                Some(eintrag)
            }
            Err(e) => {
                if e.ist_sicherheitsrelevant() {
                    error!(
                        target: crate::SICHERHEIT_TARGET,
                        plugin = %name,
                        pfad = %pfad.display(),
                        "Plugin aus Sicherheitsgruenden abgelehnt: {}",
                        e
                    );
                } else {
                    warn!(plugin = %name, pfad = %pfad.display(), "Plugin uebersprungen: {}", e);
                }
                None
            }
        }
    }

    pub(crate) fn laden(&self, pfad: &Path, name: &str) -> Result<PluginRecord> {
        // Validiert: Einzeldateien haben kein Manifest-Verzeichnis
        if !pfad.is_dir() {
            return Err(PluginError::VerzeichnisFehlt(pfad.display().to_string()));
        }
        let (Some(wurzel), Some(verzeichnis_name)) =
            (pfad.parent(), pfad.file_name().and_then(|n| n.to_str()))
        else {
            return Err(PluginError::VerzeichnisFehlt(pfad.display().to_string()));
        };
        let validator = VerzeichnisValidator::neu(wurzel, self.engine.clone());
        let geprueft = validator.plugin_validieren(verzeichnis_name)?;

        // Integritaet: Pruefsumme wurde vom Validator bereits verifiziert falls vorhanden
        if !geprueft.manifest.hat_pruefsumme() && self.konfiguration.pruefsumme_erforderlich {
            return Err(PluginError::PruefsummeFehlt);
        }

        // Instanziiert: eigener Store, Schnittstelle aufgeloest
        let sandbox = SandboxKonfiguration::aus_berechtigungen(
            geprueft.manifest.berechtigungen(),
            self.konfiguration.max_speicher_bytes,
            self.konfiguration.max_instruktionen,
        );
        let mut plugin = WasmPlugin::instanziieren(&self.engine, &geprueft, &sandbox)?;
        debug!(plugin = %name, "Plugin instanziiert");

        plugin.initialisieren()?;
        plugin
            .validieren()
            .map_err(|fehler| PluginError::SelbstvalidierungFehlgeschlagen {
                name: plugin.name().to_string(),
                fehler,
            })?;

        PluginRecord::neu(Box::new(plugin), Some(pfad.to_path_buf()))
    }

    /// Fuegt Suchpfade hinzu, entdeckt und laedt alle Plugins nacheinander.
    /// Gibt die Anzahl neu registrierter Plugins zurueck.
    pub fn alle_laden<P: AsRef<Path>>(&mut self, pfade: &[P]) -> usize {
        for pfad in pfade {
            self.suchpfad_hinzufuegen(pfad);
        }

        let mut geladen = 0;
        for kandidat in self.plugins_entdecken() {
            let Some(eintrag) = self.plugin_laden(&kandidat.pfad, &kandidat.name) else {
                continue;
            };
            match self.registrieren(eintrag) {
                Ok(()) => geladen += 1,
                Err(e) => warn!(plugin = %kandidat.name, pfad = %kandidat.pfad.display(), "{}", e),
            }
        }

        info!(
            geladen,
            gesamt = self.registry.anzahl(),
            "Plugins geladen"
        );
        geladen
    }

    /// Registriert einen geladenen Eintrag und haengt seine Hooks an den Dispatcher an
    pub fn registrieren(&mut self, eintrag: PluginRecord) -> Result<()> {
        if self.registry.enthaelt(eintrag.name()) {
            return Err(PluginError::BereitsGeladen(eintrag.name().to_string()));
        }
        for stage in Stage::ALLE {
            if let Some(hooks) = eintrag.hooks().get(&stage) {
                self.dispatcher.registrieren(eintrag.name(), stage, hooks);
            }
        }
        self.registry.registrieren(eintrag)
    }

    /// Registriert ein eingebautes Plugin (ohne Verzeichnis und Manifest)
    pub fn eingebaut_registrieren(&mut self, mut plugin: Box<dyn Plugin>) -> Result<()> {
        plugin.initialisieren()?;
        plugin
            .validieren()
            .map_err(|fehler| PluginError::SelbstvalidierungFehlgeschlagen {
                name: plugin.name().to_string(),
                fehler,
            })?;

        let eintrag = PluginRecord::neu(plugin, None)?;
        info!(plugin = %eintrag.name(), "Eingebautes Plugin registriert");
        self.registrieren(eintrag)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginRecord> {
        self.registry.per_name(name)
    }

    pub fn plugins_auflisten(&self) -> Vec<String> {
        self.registry.namen()
    }

    pub fn plugin_rollen(&self) -> HashMap<String, PathBuf> {
        self.registry.rollen()
    }

    pub fn plugin_info(&self) -> BTreeMap<String, PluginInfo> {
        self.registry.info()
    }

    /// Schliesst die Ladephase ab. Danach sind nur noch Lesen und Hook-Ausfuehrung moeglich.
    pub fn fertigstellen(self) -> PluginSystem {
        info!(plugins = self.registry.anzahl(), "Plugin-System bereit");
        PluginSystem {
            registry: self.registry,
            dispatcher: self.dispatcher,
        }
    }
}

/// Fertiges Plugin-System: lesender Zugriff und Hook-Ausfuehrung
pub struct PluginSystem {
    registry: PluginRegistry,
    dispatcher: HookDispatcher,
}

impl PluginSystem {
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &HookDispatcher {
        &self.dispatcher
    }

    /// Plugin per Name
    pub fn plugin(&self, name: &str) -> Option<&PluginRecord> {
        self.registry.per_name(name)
    }

    /// Namen aller Plugins in Ladereihenfolge
    pub fn plugins_auflisten(&self) -> Vec<String> {
        self.registry.namen()
    }

    /// Alle Rollen aller Plugins (Name -> Pfad)
    pub fn plugin_rollen(&self) -> HashMap<String, PathBuf> {
        self.registry.rollen()
    }

    /// Metadaten aller Plugins
    pub fn plugin_info(&self) -> BTreeMap<String, PluginInfo> {
        self.registry.info()
    }

    /// Fuehrt alle Hooks einer Stage gegen den gegebenen Kontext aus
    pub fn hooks_ausfuehren(&self, stage: Stage, kontext: &mut HookKontext) -> bool {
        self.dispatcher.ausfuehren(stage, kontext)
    }

    /// Fuehrt alle Hooks einer Stage mit frischem Kontext aus
    pub fn stage_ausfuehren(&self, stage: Stage) -> (bool, HookKontext) {
        self.dispatcher.stage_ausfuehren(stage)
    }
}
