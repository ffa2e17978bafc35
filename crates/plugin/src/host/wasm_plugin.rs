//! WASM-Plugin – ein instanziiertes Modul hinter der [`Plugin`]-Schnittstelle
//!
//! Jedes Plugin besitzt seinen eigenen `Store`; Plugin und seine Hooks teilen
//! sich die Instanz ueber einen Mutex. Alle Aufrufe laufen mit frisch
//! aufgefuelltem Fuel-Budget, ein Trap ist ein Fehler genau dieses Aufrufs.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use wasmtime::{Instance, Memory, Store, TypedFunc};

use crate::error::{PluginError, Result};
use crate::host::api::{linker_erstellen, ApiKontext};
use crate::host::runtime::{fuel_auffuellen, store_erstellen, HostDaten, PluginEngine};
use crate::host::sandbox::SandboxKonfiguration;
use crate::plugin::{Hook, HookTabelle, Plugin};
use crate::types::{Berechtigung, HookKontext, Stage};
use crate::validator::GeprueftesPlugin;

/// Die vier Pflicht-Exporte eines Plugin-Moduls
pub const SCHNITTSTELLE: [&str; 4] = ["initialize", "get_roles", "get_hooks", "validate"];

/// Aufgeloeste Pflicht-Exporte
struct Schnittstelle {
    initialize: TypedFunc<(), ()>,
    get_roles: TypedFunc<(), i64>,
    get_hooks: TypedFunc<(), i64>,
    validate: TypedFunc<(), i64>,
}

/// Laufende Instanz mit eigenem Store
pub struct WasmInstanz {
    store: Store<HostDaten>,
    instanz: Instance,
    speicher: Memory,
    schnittstelle: Schnittstelle,
}

impl WasmInstanz {
    /// Ruft einen `() -> i64` Export auf und liest das JSON-Dokument bei `(ptr << 32) | len`
    fn json_abrufen(&mut self, funktion: &TypedFunc<(), i64>, export: &str) -> Result<Option<Value>> {
        fuel_auffuellen(&mut self.store)?;
        let gepackt = funktion
            .call(&mut self.store, ())
            .map_err(|e| PluginError::WasmAusfuehrung(format!("{}: {}", export, e)))?;
        if gepackt == 0 {
            return Ok(None);
        }

        let gepackt = gepackt as u64;
        let start = (gepackt >> 32) as usize;
        let laenge = (gepackt & 0xffff_ffff) as usize;
        let daten = start
            .checked_add(laenge)
            .and_then(|ende| self.speicher.data(&self.store).get(start..ende))
            .ok_or_else(|| {
                PluginError::WasmAusfuehrung(format!("{}: Ergebnis ausserhalb des Speichers", export))
            })?;

        serde_json::from_slice(daten)
            .map(Some)
            .map_err(|e| PluginError::WasmAusfuehrung(format!("{}: ungueltiges JSON: {}", export, e)))
    }
}

/// Ergebnis des `validate` Exports
#[derive(Debug, Deserialize)]
struct Selbstpruefung {
    valid: bool,
    #[serde(default)]
    errors: Vec<String>,
}

/// Plugin das aus einem WASM-Modul instanziiert wurde
pub struct WasmPlugin {
    name: String,
    version: String,
    beschreibung: String,
    berechtigungen: BTreeSet<Berechtigung>,
    verzeichnis: PathBuf,
    instanz: Arc<Mutex<WasmInstanz>>,
}

impl WasmPlugin {
    /// Instanziiert ein geprueftes Modul in einem neuen, nur diesem Plugin gehoerenden Store
    pub fn instanziieren(
        engine: &PluginEngine,
        geprueft: &GeprueftesPlugin,
        sandbox: &SandboxKonfiguration,
    ) -> Result<Self> {
        let name = geprueft
            .manifest
            .name()
            .unwrap_or(&geprueft.name)
            .to_string();
        let api = ApiKontext::aus_sandbox(&name, sandbox);
        let mut store = store_erstellen(engine, sandbox, api)?;
        let linker = linker_erstellen(engine)?;

        let instanz = linker
            .instantiate(&mut store, &geprueft.modul)
            .map_err(|e| PluginError::WasmInstanziierung(e.to_string()))?;
        debug!(plugin = %name, "Modul instanziiert");

        let speicher = instanz
            .get_memory(&mut store, "memory")
            .ok_or_else(|| PluginError::KeineImplementierung("Export 'memory' fehlt".into()))?;
        let schnittstelle = Schnittstelle {
            initialize: export_aufloesen(&instanz, &mut store, "initialize")?,
            get_roles: export_aufloesen(&instanz, &mut store, "get_roles")?,
            get_hooks: export_aufloesen(&instanz, &mut store, "get_hooks")?,
            validate: export_aufloesen(&instanz, &mut store, "validate")?,
        };

        let manifest = &geprueft.manifest;
        Ok(Self {
            version: manifest.version().unwrap_or_default().to_string(),
            beschreibung: manifest.beschreibung().unwrap_or_default().to_string(),
            berechtigungen: manifest.berechtigungen(),
            verzeichnis: geprueft.verzeichnis.clone(),
            name,
            instanz: Arc::new(Mutex::new(WasmInstanz {
                store,
                instanz,
                speicher,
                schnittstelle,
            })),
        })
    }

    pub fn verzeichnis(&self) -> &Path {
        &self.verzeichnis
    }
}

fn export_aufloesen<P, R>(
    instanz: &Instance,
    store: &mut Store<HostDaten>,
    export: &str,
) -> Result<TypedFunc<P, R>>
where
    P: wasmtime::WasmParams,
    R: wasmtime::WasmResults,
{
    instanz
        .get_typed_func::<P, R>(&mut *store, export)
        .map_err(|e| PluginError::KeineImplementierung(format!("{}: {}", export, e)))
}

impl Plugin for WasmPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn beschreibung(&self) -> &str {
        &self.beschreibung
    }

    fn berechtigungen(&self) -> BTreeSet<Berechtigung> {
        self.berechtigungen.clone()
    }

    fn initialisieren(&mut self) -> Result<()> {
        let mut guard = self.instanz.lock();
        let instanz = &mut *guard;
        fuel_auffuellen(&mut instanz.store)?;
        instanz
            .schnittstelle
            .initialize
            .call(&mut instanz.store, ())
            .map_err(|e| PluginError::Initialisierung(e.to_string()))
    }

    fn rollen(&self) -> Result<HashMap<String, PathBuf>> {
        let mut guard = self.instanz.lock();
        let instanz = &mut *guard;
        let funktion = instanz.schnittstelle.get_roles.clone();
        let Some(wert) = instanz.json_abrufen(&funktion, "get_roles")? else {
            return Ok(HashMap::new());
        };

        let Value::Object(eintraege) = wert else {
            return Err(PluginError::WasmAusfuehrung("get_roles: Objekt erwartet".into()));
        };
        eintraege
            .into_iter()
            .map(|(rolle, pfad)| match pfad {
                Value::String(p) => Ok((rolle, self.verzeichnis.join(p))),
                _ => Err(PluginError::WasmAusfuehrung(format!(
                    "get_roles: Pfad fuer Rolle '{}' ist kein String",
                    rolle
                ))),
            })
            .collect()
    }

    fn hooks(&self) -> Result<HookTabelle> {
        let mut guard = self.instanz.lock();
        let instanz = &mut *guard;
        let funktion = instanz.schnittstelle.get_hooks.clone();
        let Some(wert) = instanz.json_abrufen(&funktion, "get_hooks")? else {
            return Ok(HookTabelle::new());
        };

        let tabelle: HashMap<String, Vec<String>> = serde_json::from_value(wert)
            .map_err(|e| PluginError::WasmAusfuehrung(format!("get_hooks: {}", e)))?;

        let mut hooks = HookTabelle::new();
        for (stage_name, exporte) in tabelle {
            let stage: Stage = stage_name
                .parse()
                .map_err(|e: String| PluginError::WasmAusfuehrung(format!("get_hooks: {}", e)))?;
            for export in exporte {
                let funktion = instanz
                    .instanz
                    .get_typed_func::<(), i32>(&mut instanz.store, &export)
                    .map_err(|e| {
                        PluginError::KeineImplementierung(format!("Hook-Export '{}': {}", export, e))
                    })?;
                let hook: Arc<dyn Hook> = Arc::new(WasmHook {
                    plugin: self.name.clone(),
                    name: export,
                    funktion,
                    instanz: Arc::clone(&self.instanz),
                });
                hooks.entry(stage).or_default().push(hook);
            }
        }
        Ok(hooks)
    }

    fn validieren(&self) -> std::result::Result<(), Vec<String>> {
        let mut guard = self.instanz.lock();
        let instanz = &mut *guard;
        let funktion = instanz.schnittstelle.validate.clone();
        let wert = match instanz.json_abrufen(&funktion, "validate") {
            Ok(Some(w)) => w,
            Ok(None) => return Err(vec!["validate lieferte kein Ergebnis".into()]),
            Err(e) => return Err(vec![e.to_string()]),
        };

        let pruefung: Selbstpruefung =
            serde_json::from_value(wert).map_err(|e| vec![format!("validate: {}", e)])?;
        match (pruefung.valid, pruefung.errors) {
            (true, _) => Ok(()),
            (false, fehler) if fehler.is_empty() => Err(vec!["Plugin meldet sich als ungueltig".into()]),
            (false, fehler) => Err(fehler),
        }
    }
}

impl std::fmt::Debug for WasmPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmPlugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("verzeichnis", &self.verzeichnis)
            .finish_non_exhaustive()
    }
}

/// Hook-Export `() -> i32` eines WASM-Plugins (ungleich 0 = Erfolg)
pub struct WasmHook {
    plugin: String,
    name: String,
    funktion: TypedFunc<(), i32>,
    instanz: Arc<Mutex<WasmInstanz>>,
}

impl Hook for WasmHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn ausfuehren(&self, kontext: &mut HookKontext) -> Result<bool> {
        let mut guard = self.instanz.lock();
        let instanz = &mut *guard;

        instanz.store.data_mut().kontext = Some(kontext.clone());
        fuel_auffuellen(&mut instanz.store)?;
        let ergebnis = self.funktion.call(&mut instanz.store, ());

        // Aenderungen ueber set_error/set_metadata zurueckholen, auch nach einem Trap
        if let Some(aktualisiert) = instanz.store.data_mut().kontext.take() {
            *kontext = aktualisiert;
        }

        let rc = ergebnis.map_err(|e| {
            PluginError::WasmAusfuehrung(format!("{}::{}: {}", self.plugin, self.name, e))
        })?;
        Ok(rc != 0)
    }
}
