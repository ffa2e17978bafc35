//! Gemeinsame Test-Hilfen: Plugin-Verzeichnisse, WAT-Module und ein eingebautes Testplugin

mod wasm_tests;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{PluginError, Result};
use crate::manifest::{manifest_pfad, PluginManifest};
use crate::plugin::{EingebauterHook, Hook, HookTabelle, Plugin};
use crate::types::Stage;
use crate::validator::EINSTIEGSPUNKT;

/// Kleinstes gueltiges Plugin: keine Rollen, keine Hooks, validate = `{"valid": true}`
pub(crate) const MINIMAL_WAT: &str = r#"(module
  (memory (export "memory") 1)
  (data (i32.const 1024) "{\"valid\": true}")
  (func (export "initialize"))
  (func (export "get_roles") (result i64) i64.const 0)
  (func (export "get_hooks") (result i64) i64.const 0)
  (func (export "validate") (result i64) i64.const 4398046511119))"#;

/// Standard-Manifest fuer Testplugins
pub(crate) fn test_manifest(name: &str, version: &str) -> Value {
    json!({
        "name": name,
        "version": version,
        "author": "Devkit Team",
        "description": format!("Testplugin {name}"),
    })
}

/// Schreibt `manifest.json` in ein Verzeichnis, optional mit Pruefsumme
pub(crate) fn manifest_schreiben(
    verzeichnis: &Path,
    name: &str,
    version: &str,
    mit_pruefsumme: bool,
) -> PluginManifest {
    let mut manifest =
        PluginManifest::aus_wert(test_manifest(name, version)).expect("Manifest muss ein Objekt sein");
    if mit_pruefsumme {
        manifest.pruefsumme_setzen().expect("Pruefsumme berechnen");
    }
    manifest
        .speichern(&manifest_pfad(verzeichnis))
        .expect("Manifest schreiben");
    manifest
}

/// Legt `<wurzel>/<name>/` mit Manifest (ohne Pruefsumme) und Einstiegspunkt an
pub(crate) fn plugin_anlegen(wurzel: &Path, name: &str, einstieg: &str) -> PathBuf {
    plugin_mit_manifest(wurzel, name, einstieg, test_manifest(name, "1.0.0"))
}

/// Legt ein Plugin-Verzeichnis mit beliebigem Manifest-Inhalt an
pub(crate) fn plugin_mit_manifest(wurzel: &Path, name: &str, einstieg: &str, manifest: Value) -> PathBuf {
    let verzeichnis = wurzel.join(name);
    std::fs::create_dir_all(&verzeichnis).expect("Plugin-Verzeichnis anlegen");
    let manifest = PluginManifest::aus_wert(manifest).expect("Manifest muss ein Objekt sein");
    manifest
        .speichern(&manifest_pfad(&verzeichnis))
        .expect("Manifest schreiben");
    std::fs::write(verzeichnis.join(EINSTIEGSPUNKT), einstieg).expect("Einstiegspunkt schreiben");
    verzeichnis
}

/// Baut Plugin-Module im WAT-Textformat.
///
/// JSON-Antworten liegen ab Offset 1024 im Speicher, weitere Texte koennen
/// per [`WatModul::text`] an feste Offsets gelegt werden. Alle Host-Imports
/// sind als `$log`, `$context`, `$set_error`, `$set_metadata`, `$env_var`
/// verfuegbar.
pub(crate) struct WatModul {
    rollen: Option<String>,
    hooks: Option<String>,
    validierung: Option<String>,
    initialisierung: String,
    funktionen: Vec<(String, String)>,
    texte: Vec<(u32, String)>,
    felder: Vec<String>,
}

impl WatModul {
    pub(crate) fn neu() -> Self {
        Self {
            rollen: None,
            hooks: None,
            validierung: Some(r#"{"valid": true}"#.into()),
            initialisierung: String::new(),
            funktionen: Vec::new(),
            texte: Vec::new(),
            felder: Vec::new(),
        }
    }

    pub(crate) fn rollen(mut self, json: Value) -> Self {
        self.rollen = Some(json.to_string());
        self
    }

    pub(crate) fn hooks(mut self, json: Value) -> Self {
        self.hooks = Some(json.to_string());
        self
    }

    /// `None` laesst `validate` 0 zurueckgeben
    pub(crate) fn validierung(mut self, json: Option<Value>) -> Self {
        self.validierung = json.map(|j| j.to_string());
        self
    }

    pub(crate) fn initialisierung(mut self, rumpf: &str) -> Self {
        self.initialisierung = rumpf.to_string();
        self
    }

    /// Hook-Export `() -> i32` mit dem gegebenen Rumpf
    pub(crate) fn hook(mut self, name: &str, rumpf: &str) -> Self {
        self.funktionen.push((name.to_string(), rumpf.to_string()));
        self
    }

    /// Legt einen Text an einen festen Offset (ab 16384 frei)
    pub(crate) fn text(mut self, offset: u32, text: &str) -> Self {
        self.texte.push((offset, text.to_string()));
        self
    }

    /// Beliebiges weiteres Modulfeld, z.B. ein `(global ...)`
    pub(crate) fn feld(mut self, feld: &str) -> Self {
        self.felder.push(feld.to_string());
        self
    }

    pub(crate) fn bauen(&self) -> String {
        let mut wat = String::from(
            r#"(module
  (import "devkit" "log" (func $log (param i32 i32 i32)))
  (import "devkit" "context" (func $context (param i32 i32) (result i32)))
  (import "devkit" "set_error" (func $set_error (param i32 i32) (result i32)))
  (import "devkit" "set_metadata" (func $set_metadata (param i32 i32 i32 i32) (result i32)))
  (import "devkit" "env_var" (func $env_var (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
"#,
        );

        let antworten = [
            ("get_roles", &self.rollen, 1024u32),
            ("get_hooks", &self.hooks, 4096),
            ("validate", &self.validierung, 8192),
        ];
        for (export, json, offset) in antworten {
            let gepackt = match json {
                Some(json) => {
                    let _ = writeln!(wat, "  (data (i32.const {offset}) \"{}\")", wat_escape(json));
                    ((offset as i64) << 32) | json.len() as i64
                }
                None => 0,
            };
            let _ = writeln!(wat, "  (func (export \"{export}\") (result i64) i64.const {gepackt})");
        }

        for feld in &self.felder {
            let _ = writeln!(wat, "  {feld}");
        }
        for (offset, text) in &self.texte {
            let _ = writeln!(wat, "  (data (i32.const {offset}) \"{}\")", wat_escape(text));
        }
        let _ = writeln!(wat, "  (func (export \"initialize\") {})", self.initialisierung);
        for (name, rumpf) in &self.funktionen {
            let _ = writeln!(wat, "  (func (export \"{name}\") (result i32) {rumpf})");
        }
        wat.push(')');
        wat
    }
}

fn wat_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Eingebautes Plugin fuer Tests, komplett konfigurierbar
pub(crate) struct TestPlugin {
    name: String,
    version: String,
    beschreibung: String,
    rollen: HashMap<String, PathBuf>,
    hooks: Vec<(Stage, String, bool)>,
    validierungsfehler: Vec<String>,
    init_fehler: Option<String>,
    initialisiert: bool,
}

impl TestPlugin {
    pub(crate) fn neu(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".into(),
            beschreibung: format!("Testplugin {name}"),
            rollen: HashMap::new(),
            hooks: Vec::new(),
            validierungsfehler: Vec::new(),
            init_fehler: None,
            initialisiert: false,
        }
    }

    pub(crate) fn mit_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub(crate) fn mit_rolle(mut self, rolle: &str, pfad: &str) -> Self {
        self.rollen.insert(rolle.to_string(), PathBuf::from(pfad));
        self
    }

    pub(crate) fn mit_hook(mut self, stage: Stage, name: &str, ergebnis: bool) -> Self {
        self.hooks.push((stage, name.to_string(), ergebnis));
        self
    }

    pub(crate) fn mit_validierungsfehler(mut self, fehler: &str) -> Self {
        self.validierungsfehler.push(fehler.to_string());
        self
    }

    pub(crate) fn mit_init_fehler(mut self, fehler: &str) -> Self {
        self.init_fehler = Some(fehler.to_string());
        self
    }
}

impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn beschreibung(&self) -> &str {
        &self.beschreibung
    }

    fn initialisieren(&mut self) -> Result<()> {
        if let Some(fehler) = &self.init_fehler {
            return Err(PluginError::Initialisierung(fehler.clone()));
        }
        self.initialisiert = true;
        Ok(())
    }

    fn rollen(&self) -> Result<HashMap<String, PathBuf>> {
        Ok(self.rollen.clone())
    }

    fn hooks(&self) -> Result<HookTabelle> {
        let mut tabelle = HookTabelle::new();
        for (stage, name, ergebnis) in &self.hooks {
            let ergebnis = *ergebnis;
            let plugin = self.name.clone();
            let hook: Arc<dyn Hook> = Arc::new(EingebauterHook::neu(name.clone(), move |k| {
                k.metadaten.insert("letzter".into(), Value::String(plugin.clone()));
                Ok(ergebnis)
            }));
            tabelle.entry(*stage).or_default().push(hook);
        }
        Ok(tabelle)
    }

    fn validieren(&self) -> std::result::Result<(), Vec<String>> {
        if !self.initialisiert {
            return Err(vec!["nicht initialisiert".into()]);
        }
        if self.validierungsfehler.is_empty() {
            Ok(())
        } else {
            Err(self.validierungsfehler.clone())
        }
    }
}
