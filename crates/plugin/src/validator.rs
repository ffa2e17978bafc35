//! Verzeichnis-Validator – prueft ein Plugin-Verzeichnis bevor Code ausgefuehrt wird
//!
//! Harte Pruefungen in fester Reihenfolge:
//! 1. Verzeichnis existiert
//! 2. `manifest.json` existiert und ist gueltiges JSON
//! 3. Manifest-Schema
//! 4. Pruefsumme (falls vorhanden)
//! 5. `plugin.wasm` existiert und ist nicht leer
//! 6. Modul kompiliert und exportiert alle Pflicht-Operationen
//!
//! Kein Schritt fuehrt Plugin-Code aus.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use wasmtime::{ExternType, Module};

use crate::error::{PluginError, Result};
use crate::host::runtime::PluginEngine;
use crate::host::wasm_plugin::SCHNITTSTELLE;
use crate::manifest::{manifest_pfad, PluginManifest};

/// Dateiname des Einstiegspunkts in einem Plugin-Verzeichnis
pub const EINSTIEGSPUNKT: &str = "plugin.wasm";

/// Ergebnis einer erfolgreichen Pruefung: Manifest plus kompiliertes Modul
#[derive(Debug, Clone)]
pub struct GeprueftesPlugin {
    pub name: String,
    pub verzeichnis: PathBuf,
    pub manifest: PluginManifest,
    pub modul: Module,
}

/// Prueft Plugins unterhalb eines Wurzelverzeichnisses
pub struct VerzeichnisValidator {
    wurzel: PathBuf,
    engine: PluginEngine,
}

impl VerzeichnisValidator {
    pub fn neu(wurzel: impl Into<PathBuf>, engine: PluginEngine) -> Self {
        Self {
            wurzel: wurzel.into(),
            engine,
        }
    }

    pub fn wurzel(&self) -> &Path {
        &self.wurzel
    }

    /// Prueft das Plugin `<wurzel>/<name>`
    pub fn plugin_validieren(&self, name: &str) -> Result<GeprueftesPlugin> {
        let verzeichnis = self.wurzel.join(name);
        if !verzeichnis.is_dir() {
            return Err(PluginError::VerzeichnisFehlt(verzeichnis.display().to_string()));
        }

        let manifest = PluginManifest::aus_datei(&manifest_pfad(&verzeichnis))?;
        manifest.validieren().map_err(PluginError::ManifestSchema)?;

        if manifest.hat_pruefsumme() {
            if let Err(e) = manifest.integritaet_pruefen() {
                error!(
                    target: crate::SICHERHEIT_TARGET,
                    plugin = %name,
                    verzeichnis = %verzeichnis.display(),
                    "Integritaetspruefung fehlgeschlagen: {}",
                    e
                );
                return Err(e);
            }
            debug!(plugin = %name, "Pruefsumme bestaetigt");
        }

        let modul = self.einstiegspunkt_pruefen(&verzeichnis)?;
        debug!(plugin = %name, "Plugin-Verzeichnis gueltig");

        Ok(GeprueftesPlugin {
            name: name.to_string(),
            verzeichnis,
            manifest,
            modul,
        })
    }

    /// Prueft alle direkten Unterverzeichnisse (versteckte ausgenommen)
    pub fn alle_validieren(&self) -> BTreeMap<String, Result<GeprueftesPlugin>> {
        let mut ergebnisse = BTreeMap::new();

        let eintraege = match std::fs::read_dir(&self.wurzel) {
            Ok(e) => e,
            Err(e) => {
                warn!(
                    wurzel = %self.wurzel.display(),
                    "Plugin-Verzeichnis nicht lesbar: {}",
                    e
                );
                return ergebnisse;
            }
        };

        for eintrag in eintraege.flatten() {
            let Ok(name) = eintrag.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !eintrag.path().is_dir() {
                continue;
            }
            let ergebnis = self.plugin_validieren(&name);
            ergebnisse.insert(name, ergebnis);
        }

        let gueltig = ergebnisse.values().filter(|r| r.is_ok()).count();
        info!(
            wurzel = %self.wurzel.display(),
            gueltig,
            gesamt = ergebnisse.len(),
            "Plugin-Verzeichnisse geprueft"
        );
        ergebnisse
    }

    fn einstiegspunkt_pruefen(&self, verzeichnis: &Path) -> Result<Module> {
        let pfad = verzeichnis.join(EINSTIEGSPUNKT);
        if !pfad.is_file() {
            return Err(PluginError::EinstiegspunktFehlt(pfad.display().to_string()));
        }

        // Nur eine Datei ohne Inhalt gilt als leer, alles andere muss kompilieren
        let bytes = std::fs::read(&pfad)?;
        if bytes.is_empty() {
            return Err(PluginError::EinstiegspunktLeer(pfad.display().to_string()));
        }

        let modul = self.engine.kompilieren(&bytes)?;
        let fehlend = fehlende_exporte(&modul);
        if !fehlend.is_empty() {
            return Err(PluginError::SchnittstelleUnvollstaendig(fehlend));
        }
        Ok(modul)
    }
}

/// Namen der Pflicht-Operationen die nicht als Funktion exportiert werden
fn fehlende_exporte(modul: &Module) -> Vec<String> {
    SCHNITTSTELLE
        .iter()
        .filter(|&&operation| {
            !modul
                .exports()
                .any(|e| e.name() == operation && matches!(e.ty(), ExternType::Func(_)))
        })
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{manifest_schreiben, plugin_anlegen, MINIMAL_WAT};

    fn validator(wurzel: &Path) -> VerzeichnisValidator {
        VerzeichnisValidator::neu(wurzel, PluginEngine::neu().unwrap())
    }

    #[test]
    fn gueltiges_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        plugin_anlegen(tmp.path(), "gut", MINIMAL_WAT);

        let geprueft = validator(tmp.path()).plugin_validieren("gut").unwrap();
        assert_eq!(geprueft.name, "gut");
        assert_eq!(geprueft.manifest.name(), Some("gut"));
        assert_eq!(geprueft.verzeichnis, tmp.path().join("gut"));
    }

    #[test]
    fn verzeichnis_fehlt() {
        let tmp = tempfile::tempdir().unwrap();
        let err = validator(tmp.path()).plugin_validieren("nirgends").unwrap_err();
        assert!(matches!(err, PluginError::VerzeichnisFehlt(_)));
    }

    #[test]
    fn manifest_fehlt() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("leer")).unwrap();
        let err = validator(tmp.path()).plugin_validieren("leer").unwrap_err();
        assert!(matches!(err, PluginError::ManifestFehlt(_)));
    }

    #[test]
    fn schema_fehler_werden_gesammelt() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("kaputt");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("manifest.json"), r#"{"name": "kaputt", "version": "1.0"}"#).unwrap();
        std::fs::write(dir.join(EINSTIEGSPUNKT), MINIMAL_WAT).unwrap();

        match validator(tmp.path()).plugin_validieren("kaputt").unwrap_err() {
            PluginError::ManifestSchema(fehler) => assert_eq!(fehler.len(), 3),
            andere => panic!("unerwarteter Fehler: {andere}"),
        }
    }

    #[test]
    fn leerer_einstiegspunkt() {
        let tmp = tempfile::tempdir().unwrap();
        plugin_anlegen(tmp.path(), "leer", "");
        let err = validator(tmp.path()).plugin_validieren("leer").unwrap_err();
        assert!(matches!(err, PluginError::EinstiegspunktLeer(_)));
    }

    #[test]
    fn nur_leerzeichen_ist_nicht_leer() {
        let tmp = tempfile::tempdir().unwrap();
        plugin_anlegen(tmp.path(), "luft", " \n\t\n");
        let err = validator(tmp.path()).plugin_validieren("luft").unwrap_err();
        assert!(!matches!(err, PluginError::EinstiegspunktLeer(_)));
        assert!(matches!(
            err,
            PluginError::WasmKompilierung(_) | PluginError::SchnittstelleUnvollstaendig(_)
        ));
    }

    #[test]
    fn einstiegspunkt_fehlt() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ohne");
        std::fs::create_dir(&dir).unwrap();
        manifest_schreiben(&dir, "ohne", "1.0.0", true);
        let err = validator(tmp.path()).plugin_validieren("ohne").unwrap_err();
        assert!(matches!(err, PluginError::EinstiegspunktFehlt(_)));
    }

    #[test]
    fn kein_wasm() {
        let tmp = tempfile::tempdir().unwrap();
        plugin_anlegen(tmp.path(), "text", "das ist kein modul");
        let err = validator(tmp.path()).plugin_validieren("text").unwrap_err();
        assert!(matches!(err, PluginError::WasmKompilierung(_)));
    }

    #[test]
    fn fehlende_schnittstelle_wird_benannt() {
        let tmp = tempfile::tempdir().unwrap();
        let wat = r#"(module
            (memory (export "memory") 1)
            (func (export "initialize"))
            (func (export "get_roles") (result i64) i64.const 0)
            (func (export "validate") (result i64) i64.const 0))"#;
        plugin_anlegen(tmp.path(), "halb", wat);

        match validator(tmp.path()).plugin_validieren("halb").unwrap_err() {
            PluginError::SchnittstelleUnvollstaendig(fehlend) => {
                assert_eq!(fehlend, vec!["get_hooks".to_string()])
            }
            andere => panic!("unerwarteter Fehler: {andere}"),
        }
    }

    #[test]
    fn manipuliertes_manifest_wird_abgelehnt() {
        let tmp = tempfile::tempdir().unwrap();
        plugin_anlegen(tmp.path(), "signiert", MINIMAL_WAT);
        let pfad = tmp.path().join("signiert").join("manifest.json");
        let mut manifest = PluginManifest::aus_datei(&pfad).unwrap();
        manifest.pruefsumme_setzen().unwrap();
        manifest.feld_setzen("description", serde_json::json!("veraendert"));
        manifest.speichern(&pfad).unwrap();

        let err = validator(tmp.path()).plugin_validieren("signiert").unwrap_err();
        assert!(matches!(err, PluginError::IntegritaetVerletzt { .. }));
        assert!(err.ist_sicherheitsrelevant());
    }

    #[test]
    fn alle_validieren_ueberspringt_versteckte() {
        let tmp = tempfile::tempdir().unwrap();
        plugin_anlegen(tmp.path(), "gut", MINIMAL_WAT);
        plugin_anlegen(tmp.path(), "leer", "");
        plugin_anlegen(tmp.path(), ".versteckt", MINIMAL_WAT);
        std::fs::write(tmp.path().join("datei.txt"), "x").unwrap();

        let ergebnisse = validator(tmp.path()).alle_validieren();
        assert_eq!(ergebnisse.len(), 2);
        assert!(ergebnisse["gut"].is_ok());
        assert!(ergebnisse["leer"].is_err());
    }

    #[test]
    fn alle_validieren_ohne_wurzel() {
        let tmp = tempfile::tempdir().unwrap();
        let ergebnisse = validator(&tmp.path().join("fehlt")).alle_validieren();
        assert!(ergebnisse.is_empty());
    }
}
