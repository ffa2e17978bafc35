//! Hook-Dispatcher – fuehrt die Hooks einer Stage der Reihe nach aus
//!
//! Regeln:
//! - Hooks laufen strikt in Registrierungsreihenfolge
//! - Erster Fehlschlag (`false` oder Fehler) beendet die Kette, Status `failed`
//! - Alle erfolgreich (oder keine Hooks) → Status `success`

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::plugin::Hook;
use crate::types::{HookKontext, HookStatus, Stage};

/// Registrierter Hook mit dem Namen des besitzenden Plugins
#[derive(Clone)]
struct HookEintrag {
    plugin: String,
    hook: Arc<dyn Hook>,
}

/// Haelt die Hook-Listen pro Stage
#[derive(Default, Clone)]
pub struct HookDispatcher {
    hooks: HashMap<Stage, Vec<HookEintrag>>,
}

impl HookDispatcher {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt Hooks eines Plugins an die Liste der Stage an
    pub(crate) fn registrieren(&mut self, plugin: &str, stage: Stage, hooks: &[Arc<dyn Hook>]) {
        let liste = self.hooks.entry(stage).or_default();
        liste.extend(hooks.iter().map(|hook| HookEintrag {
            plugin: plugin.to_string(),
            hook: Arc::clone(hook),
        }));
    }

    /// Anzahl registrierter Hooks fuer eine Stage
    pub fn anzahl(&self, stage: Stage) -> usize {
        self.hooks.get(&stage).map_or(0, Vec::len)
    }

    /// Fuehrt alle Hooks einer Stage gegen einen frischen Kontext aus
    pub fn stage_ausfuehren(&self, stage: Stage) -> (bool, HookKontext) {
        let mut kontext = HookKontext::neu(stage);
        let ok = self.ausfuehren(stage, &mut kontext);
        (ok, kontext)
    }

    /// Fuehrt alle Hooks einer Stage gegen den gegebenen Kontext aus
    pub fn ausfuehren(&self, stage: Stage, kontext: &mut HookKontext) -> bool {
        let hooks = self.hooks.get(&stage).map(Vec::as_slice).unwrap_or_default();
        if !hooks.is_empty() {
            debug!(stage = %stage, anzahl = hooks.len(), "Fuehre Hooks aus");
        }

        for eintrag in hooks {
            match eintrag.hook.ausfuehren(kontext) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        stage = %stage,
                        plugin = %eintrag.plugin,
                        hook = %eintrag.hook.name(),
                        fehler = kontext.fehler.as_deref().unwrap_or(""),
                        "Hook fehlgeschlagen"
                    );
                    kontext.status = HookStatus::Fehlgeschlagen;
                    return false;
                }
                Err(e) => {
                    tracing::error!(
                        stage = %stage,
                        plugin = %eintrag.plugin,
                        hook = %eintrag.hook.name(),
                        "Hook-Ausfuehrungsfehler: {}",
                        e
                    );
                    kontext.fehler = Some(e.to_string());
                    kontext.status = HookStatus::Fehlgeschlagen;
                    return false;
                }
            }
        }

        kontext.status = HookStatus::Erfolg;
        true
    }
}
