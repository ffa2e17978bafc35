//! wasmtime Runtime Setup und Engine-Konfiguration

use tracing::{debug, info};
use wasmtime::{Engine, Module, Store};

use crate::error::{PluginError, Result};
use crate::host::api::ApiKontext;
use crate::host::sandbox::SandboxKonfiguration;
use crate::types::HookKontext;

/// Fuel wenn kein Instruktionslimit gesetzt ist
const FUEL_UNBEGRENZT: u64 = u64::MAX / 2;

/// Gemeinsame wasmtime Engine (Clone ist billig, thread-safe)
#[derive(Clone)]
pub struct PluginEngine {
    engine: Engine,
}

impl PluginEngine {
    /// Erstellt eine neue synchrone Engine mit Fuel-Zaehlung
    pub fn neu() -> Result<Self> {
        let mut config = wasmtime::Config::new();
        // Fuel-basierte CPU-Begrenzung aktivieren
        config.consume_fuel(true);

        let engine = Engine::new(&config)
            .map_err(|e| PluginError::Intern(format!("Engine-Erstellung fehlgeschlagen: {}", e)))?;

        info!("wasmtime Engine initialisiert");
        Ok(Self { engine })
    }

    /// Gibt Referenz auf die interne Engine zurueck
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Kompiliert WASM-Binaer- oder Textformat zu einem Modul
    pub fn kompilieren(&self, wasm_bytes: &[u8]) -> Result<Module> {
        debug!("Kompiliere WASM-Modul ({} Bytes)", wasm_bytes.len());
        Module::new(&self.engine, wasm_bytes)
            .map_err(|e| PluginError::WasmKompilierung(e.to_string()))
    }
}

impl std::fmt::Debug for PluginEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEngine").finish_non_exhaustive()
    }
}

/// Host-Daten im Store eines Plugins
pub struct HostDaten {
    /// Rechte des Plugins gegenueber der Host-API
    pub api: ApiKontext,
    /// Kontext des gerade laufenden Hooks (nur waehrend eines Hook-Aufrufs gesetzt)
    pub kontext: Option<HookKontext>,
    pub(crate) limiter: SpeicherLimiter,
    fuel: u64,
}

impl HostDaten {
    /// Fuel-Budget das vor jedem Aufruf in den Store geladen wird
    pub fn fuel_budget(&self) -> u64 {
        self.fuel
    }
}

/// Erstellt einen Store fuer genau ein Plugin mit Sandbox-Grenzen
pub fn store_erstellen(
    engine: &PluginEngine,
    sandbox: &SandboxKonfiguration,
    api: ApiKontext,
) -> Result<Store<HostDaten>> {
    let fuel = if sandbox.max_instruktionen == 0 {
        FUEL_UNBEGRENZT
    } else {
        sandbox.max_instruktionen
    };
    let host = HostDaten {
        api,
        kontext: None,
        limiter: SpeicherLimiter {
            max_bytes: sandbox.max_speicher_bytes,
        },
        fuel,
    };
    let mut store = Store::new(engine.engine(), host);

    // Speicherlimit setzen – Referenz auf Feld in Host-Daten
    store.limiter(|host| &mut host.limiter);
    fuel_auffuellen(&mut store)?;

    Ok(store)
}

/// Setzt das Fuel des Stores auf das volle Budget zurueck (vor jedem Aufruf)
pub fn fuel_auffuellen(store: &mut Store<HostDaten>) -> Result<()> {
    let budget = store.data().fuel_budget();
    store
        .set_fuel(budget)
        .map_err(|e| PluginError::Intern(format!("Fuel setzen fehlgeschlagen: {}", e)))
}

/// Speicherlimiter fuer WASM-Instanzen
pub(crate) struct SpeicherLimiter {
    max_bytes: u64,
}

impl wasmtime::ResourceLimiter for SpeicherLimiter {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        if desired as u64 > self.max_bytes {
            tracing::warn!(
                target: crate::SICHERHEIT_TARGET,
                "Plugin ueberschreitet Speicherlimit: {} > {}",
                desired,
                self.max_bytes
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        _desired: usize,
        _maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        Ok(true)
    }
}
