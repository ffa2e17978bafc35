//! Host-API Funktionen die WASM-Plugins aufrufen koennen
//!
//! Diese Funktionen werden als Imports im Modul `devkit` bereitgestellt.
//! Die eigentliche Logik steckt in den `host_*` Funktionen, die Closures im
//! Linker kuemmern sich nur um den linearen Speicher.

use tracing::{debug, warn};
use wasmtime::{Caller, Linker, Memory};

use crate::error::{PluginError, Result};
use crate::host::runtime::{HostDaten, PluginEngine};
use crate::host::sandbox::SandboxKonfiguration;
use crate::types::{Berechtigung, HookKontext};

/// Import-Modul unter dem die Host-Funktionen liegen
pub const IMPORT_MODUL: &str = "devkit";

/// Log-Level fuer `devkit.log`
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            4 => Self::Error,
            _ => Self::Info,
        }
    }
}

/// Ergebnis eines Host-API Aufrufs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErgebnis {
    /// Aufruf erfolgreich
    Ok,
    /// Aufruf abgelehnt (fehlende Berechtigung)
    ZugriffVerweigert,
    /// Ungueltige Parameter (Zeiger ausserhalb des Speichers, kein UTF-8)
    UngueltigeParameter,
    /// Zielpuffer des Plugins ist zu klein
    PufferZuKlein,
    /// Angefragter Wert existiert nicht
    NichtVorhanden,
    /// Aufruf ausserhalb eines Hooks
    KeinKontext,
    /// Interner Fehler
    Fehler(String),
}

impl ApiErgebnis {
    /// Konvertiert Ergebnis in i32 fuer WASM-Rueckgabe
    pub fn als_i32(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::ZugriffVerweigert => -1,
            Self::UngueltigeParameter => -2,
            Self::PufferZuKlein => -3,
            Self::NichtVorhanden => -4,
            Self::KeinKontext => -5,
            Self::Fehler(_) => -6,
        }
    }
}

/// Kontext fuer Host-API Aufrufe – Plugin-Name und freigegebene Rechte
#[derive(Debug, Clone)]
pub struct ApiKontext {
    pub plugin_name: String,
    pub umgebung: bool,
}

impl ApiKontext {
    pub fn neu(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            umgebung: false,
        }
    }

    pub fn aus_sandbox(plugin_name: impl Into<String>, sandbox: &SandboxKonfiguration) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            umgebung: sandbox.erlaubt(Berechtigung::Environment),
        }
    }
}

/// Verarbeitet einen `devkit.log` Aufruf vom Plugin
pub fn host_log(kontext: &ApiKontext, level: i32, nachricht: &str) {
    let lvl = LogLevel::from_i32(level);
    match lvl {
        LogLevel::Trace | LogLevel::Debug => {
            debug!(plugin = %kontext.plugin_name, "[Plugin] {}", nachricht)
        }
        LogLevel::Info => {
            tracing::info!(plugin = %kontext.plugin_name, "[Plugin] {}", nachricht)
        }
        LogLevel::Warn => {
            warn!(plugin = %kontext.plugin_name, "[Plugin] {}", nachricht)
        }
        LogLevel::Error => {
            tracing::error!(plugin = %kontext.plugin_name, "[Plugin] {}", nachricht)
        }
    }
}

/// Serialisiert den aktiven Hook-Kontext fuer `devkit.context`
pub fn host_kontext_json(hook: Option<&HookKontext>) -> std::result::Result<Vec<u8>, ApiErgebnis> {
    let hook = hook.ok_or(ApiErgebnis::KeinKontext)?;
    serde_json::to_vec(hook).map_err(|e| ApiErgebnis::Fehler(e.to_string()))
}

/// Verarbeitet einen `devkit.set_error` Aufruf
pub fn host_fehler_setzen(hook: Option<&mut HookKontext>, text: &str) -> ApiErgebnis {
    match hook {
        Some(k) => {
            k.fehler = Some(text.to_string());
            ApiErgebnis::Ok
        }
        None => ApiErgebnis::KeinKontext,
    }
}

/// Verarbeitet einen `devkit.set_metadata` Aufruf.
/// Werte die kein gueltiges JSON sind werden als String abgelegt.
pub fn host_metadaten_setzen(hook: Option<&mut HookKontext>, schluessel: &str, wert: &str) -> ApiErgebnis {
    let Some(k) = hook else {
        return ApiErgebnis::KeinKontext;
    };
    if schluessel.is_empty() {
        return ApiErgebnis::UngueltigeParameter;
    }
    let wert = serde_json::from_str(wert)
        .unwrap_or_else(|_| serde_json::Value::String(wert.to_string()));
    k.metadaten.insert(schluessel.to_string(), wert);
    ApiErgebnis::Ok
}

/// Verarbeitet einen `devkit.env_var` Aufruf
pub fn host_umgebungsvariable(kontext: &ApiKontext, name: &str) -> std::result::Result<String, ApiErgebnis> {
    if !kontext.umgebung {
        warn!(
            target: crate::SICHERHEIT_TARGET,
            plugin = %kontext.plugin_name,
            variable = %name,
            "Zugriff verweigert: environment nicht deklariert"
        );
        return Err(ApiErgebnis::ZugriffVerweigert);
    }
    std::env::var(name).map_err(|_| ApiErgebnis::NichtVorhanden)
}

/// Erstellt einen Linker mit allen Host-Funktionen
pub fn linker_erstellen(engine: &PluginEngine) -> Result<Linker<HostDaten>> {
    let mut linker = Linker::new(engine.engine());

    linker
        .func_wrap(
            IMPORT_MODUL,
            "log",
            |mut caller: Caller<'_, HostDaten>, level: i32, ptr: i32, len: i32| {
                if let Some(text) = text_lesen(&mut caller, ptr, len) {
                    host_log(&caller.data().api, level, &text);
                }
            },
        )
        .map_err(link_fehler)?;

    linker
        .func_wrap(
            IMPORT_MODUL,
            "context",
            |mut caller: Caller<'_, HostDaten>, ptr: i32, cap: i32| -> i32 {
                match host_kontext_json(caller.data().kontext.as_ref()) {
                    Ok(json) => bytes_schreiben(&mut caller, ptr, cap, &json),
                    Err(e) => e.als_i32(),
                }
            },
        )
        .map_err(link_fehler)?;

    linker
        .func_wrap(
            IMPORT_MODUL,
            "set_error",
            |mut caller: Caller<'_, HostDaten>, ptr: i32, len: i32| -> i32 {
                let Some(text) = text_lesen(&mut caller, ptr, len) else {
                    return ApiErgebnis::UngueltigeParameter.als_i32();
                };
                host_fehler_setzen(caller.data_mut().kontext.as_mut(), &text).als_i32()
            },
        )
        .map_err(link_fehler)?;

    linker
        .func_wrap(
            IMPORT_MODUL,
            "set_metadata",
            |mut caller: Caller<'_, HostDaten>, kptr: i32, klen: i32, vptr: i32, vlen: i32| -> i32 {
                let (Some(schluessel), Some(wert)) = (
                    text_lesen(&mut caller, kptr, klen),
                    text_lesen(&mut caller, vptr, vlen),
                ) else {
                    return ApiErgebnis::UngueltigeParameter.als_i32();
                };
                host_metadaten_setzen(caller.data_mut().kontext.as_mut(), &schluessel, &wert).als_i32()
            },
        )
        .map_err(link_fehler)?;

    linker
        .func_wrap(
            IMPORT_MODUL,
            "env_var",
            |mut caller: Caller<'_, HostDaten>, nptr: i32, nlen: i32, optr: i32, ocap: i32| -> i32 {
                let Some(name) = text_lesen(&mut caller, nptr, nlen) else {
                    return ApiErgebnis::UngueltigeParameter.als_i32();
                };
                match host_umgebungsvariable(&caller.data().api, &name) {
                    Ok(wert) => bytes_schreiben(&mut caller, optr, ocap, wert.as_bytes()),
                    Err(e) => e.als_i32(),
                }
            },
        )
        .map_err(link_fehler)?;

    Ok(linker)
}

fn link_fehler(e: impl std::fmt::Display) -> PluginError {
    PluginError::Intern(format!("Host-Funktion konnte nicht registriert werden: {}", e))
}

fn speicher(caller: &mut Caller<'_, HostDaten>) -> Option<Memory> {
    caller.get_export("memory").and_then(|e| e.into_memory())
}

fn bytes_lesen(caller: &mut Caller<'_, HostDaten>, ptr: i32, len: i32) -> Option<Vec<u8>> {
    if ptr < 0 || len < 0 {
        return None;
    }
    let memory = speicher(caller)?;
    let start = ptr as usize;
    let ende = start.checked_add(len as usize)?;
    memory.data(&*caller).get(start..ende).map(<[u8]>::to_vec)
}

fn text_lesen(caller: &mut Caller<'_, HostDaten>, ptr: i32, len: i32) -> Option<String> {
    String::from_utf8(bytes_lesen(caller, ptr, len)?).ok()
}

/// Schreibt `daten` in den Plugin-Speicher, gibt die Laenge oder einen Fehlercode zurueck
fn bytes_schreiben(caller: &mut Caller<'_, HostDaten>, ptr: i32, cap: i32, daten: &[u8]) -> i32 {
    if ptr < 0 || cap < 0 {
        return ApiErgebnis::UngueltigeParameter.als_i32();
    }
    if daten.len() > cap as usize {
        return ApiErgebnis::PufferZuKlein.als_i32();
    }
    let Some(memory) = speicher(caller) else {
        return ApiErgebnis::UngueltigeParameter.als_i32();
    };
    match memory.write(&mut *caller, ptr as usize, daten) {
        Ok(()) => daten.len() as i32,
        Err(_) => ApiErgebnis::UngueltigeParameter.als_i32(),
    }
}
