//! Plugin- und Hook-Schnittstelle
//!
//! Jede Plugin-Implementierung (WASM-Modul oder eingebautes Rust-Plugin)
//! erfuellt [`Plugin`]. Hooks sind einzelne Faehigkeiten die an einer
//! [`Stage`] ausgefuehrt werden.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Berechtigung, HookKontext, Stage};

/// Hooks eines Plugins, nach Stage gruppiert und in Registrierungsreihenfolge
pub type HookTabelle = HashMap<Stage, Vec<Arc<dyn Hook>>>;

/// Ein Hook mit genau einer Operation
pub trait Hook: Send + Sync {
    /// Name fuer Logs
    fn name(&self) -> &str;

    /// Fuehrt den Hook aus. `Ok(false)` und `Err` gelten beide als Fehlschlag.
    fn ausfuehren(&self, kontext: &mut HookKontext) -> Result<bool>;
}

/// Schnittstelle die jedes Plugin implementiert
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn beschreibung(&self) -> &str;

    /// Deklarierte Berechtigungen (eingebaute Plugins deklarieren keine)
    fn berechtigungen(&self) -> BTreeSet<Berechtigung> {
        BTreeSet::new()
    }

    /// Einmalige Initialisierung nach dem Instanziieren
    fn initialisieren(&mut self) -> Result<()>;

    /// Rollen die das Plugin bereitstellt (Name -> Verzeichnis)
    fn rollen(&self) -> Result<HashMap<String, PathBuf>>;

    /// Hooks pro Stage
    fn hooks(&self) -> Result<HookTabelle>;

    /// Selbstpruefung; `Err` enthaelt die gemeldeten Probleme
    fn validieren(&self) -> std::result::Result<(), Vec<String>>;
}

type HookFn = dyn Fn(&mut HookKontext) -> anyhow::Result<bool> + Send + Sync;

/// Hook aus einer Closure, fuer eingebaute Plugins und Host-Code
pub struct EingebauterHook {
    name: String,
    funktion: Box<HookFn>,
}

impl EingebauterHook {
    pub fn neu<F>(name: impl Into<String>, funktion: F) -> Self
    where
        F: Fn(&mut HookKontext) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            funktion: Box::new(funktion),
        }
    }

    /// Hook der immer erfolgreich ist
    pub fn leer(name: impl Into<String>) -> Self {
        Self::neu(name, |_| Ok(true))
    }
}

impl Hook for EingebauterHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn ausfuehren(&self, kontext: &mut HookKontext) -> Result<bool> {
        Ok((self.funktion)(kontext)?)
    }
}

impl std::fmt::Debug for EingebauterHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EingebauterHook")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
