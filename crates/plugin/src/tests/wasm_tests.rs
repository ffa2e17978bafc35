//! Tests der WASM-Plugin-Schnittstelle: Host-Imports, Berechtigungen, Limits

use serde_json::json;

use super::{plugin_anlegen, plugin_mit_manifest, test_manifest, WatModul};
use crate::error::PluginError;
use crate::manager::{ManagerKonfiguration, PluginManager};
use crate::registry::PluginRecord;
use crate::types::{HookKontext, HookStatus, Stage};

fn laden(wat: &str) -> (PluginRecord, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
    let pfad = plugin_anlegen(tmp.path(), "wasm", wat);
    let m = PluginManager::neu(ManagerKonfiguration::default()).unwrap();
    let eintrag = m.laden(&pfad, "wasm").expect("Plugin muss laden");
    (eintrag, tmp)
}

/// Fuehrt den ersten pre_setup Hook des Plugins aus
fn hook_ausfuehren(eintrag: &PluginRecord, kontext: &mut HookKontext) -> crate::error::Result<bool> {
    eintrag.hooks()[&Stage::PreSetup][0].ausfuehren(kontext)
}

fn ein_hook(rumpf: &str) -> WatModul {
    WatModul::neu()
        .hooks(json!({"pre_setup": ["h"]}))
        .hook("h", rumpf)
}

#[test]
fn test_set_error_aus_wasm() {
    let wat = ein_hook("(drop (call $set_error (i32.const 16384) (i32.const 21))) (i32.const 0)")
        .text(16384, "os nicht unterstuetzt")
        .bauen();
    let (eintrag, _tmp) = laden(&wat);

    let mut kontext = HookKontext::neu(Stage::PreSetup);
    assert!(!hook_ausfuehren(&eintrag, &mut kontext).unwrap());
    assert_eq!(kontext.fehler.as_deref(), Some("os nicht unterstuetzt"));
}

#[test]
fn test_hook_trap_ist_fehler() {
    let (eintrag, _tmp) = laden(&ein_hook("unreachable").bauen());

    let mut kontext = HookKontext::neu(Stage::PreSetup);
    let err = hook_ausfuehren(&eintrag, &mut kontext).unwrap_err();
    assert!(matches!(err, PluginError::WasmAusfuehrung(_)));
    assert!(err.to_string().contains("wasm::h"));
}

#[test]
fn test_hook_trap_im_dispatcher() {
    let tmp = tempfile::tempdir().unwrap();
    plugin_anlegen(tmp.path(), "trap", &ein_hook("unreachable").bauen());

    let mut m = PluginManager::neu(ManagerKonfiguration::default()).unwrap();
    assert_eq!(m.alle_laden(&[tmp.path()]), 1);
    let (ok, kontext) = m.fertigstellen().stage_ausfuehren(Stage::PreSetup);
    assert!(!ok);
    assert_eq!(kontext.status, HookStatus::Fehlgeschlagen);
    assert!(kontext.fehler.is_some());
}

#[test]
fn test_kontext_lesen() {
    // Laenge des Kontext-JSON > 0 → Erfolg
    let wat = ein_hook("(i32.gt_s (call $context (i32.const 20000) (i32.const 4096)) (i32.const 0))").bauen();
    let (eintrag, _tmp) = laden(&wat);

    let mut kontext = HookKontext::neu(Stage::PreSetup).mit_rolle("docker");
    assert!(hook_ausfuehren(&eintrag, &mut kontext).unwrap());
}

#[test]
fn test_kontext_puffer_zu_klein() {
    // -3 = Puffer zu klein
    let wat = ein_hook("(i32.eq (call $context (i32.const 20000) (i32.const 4)) (i32.const -3))").bauen();
    let (eintrag, _tmp) = laden(&wat);

    let mut kontext = HookKontext::neu(Stage::PreSetup);
    assert!(hook_ausfuehren(&eintrag, &mut kontext).unwrap());
}

#[test]
fn test_metadaten_setzen() {
    let wat = ein_hook(
        "(drop (call $set_metadata (i32.const 16384) (i32.const 6) (i32.const 16400) (i32.const 2))) (i32.const 1)",
    )
    .text(16384, "anzahl")
    .text(16400, "42")
    .bauen();
    let (eintrag, _tmp) = laden(&wat);

    let mut kontext = HookKontext::neu(Stage::PreSetup);
    assert!(hook_ausfuehren(&eintrag, &mut kontext).unwrap());
    assert_eq!(kontext.metadaten["anzahl"], 42);
}

fn umgebungs_plugin(berechtigungen: serde_json::Value) -> (PluginRecord, tempfile::TempDir) {
    let wat = ein_hook(
        "(i32.ge_s (call $env_var (i32.const 16384) (i32.const 25) (i32.const 20000) (i32.const 256)) (i32.const 0))",
    )
    .text(16384, "DEVKIT_WASM_TEST_VARIABLE")
    .bauen();
    let tmp = tempfile::tempdir().unwrap();
    let mut manifest = test_manifest("umgebung", "1.0.0");
    manifest["permissions"] = berechtigungen;
    let pfad = plugin_mit_manifest(tmp.path(), "umgebung", &wat, manifest);
    let m = PluginManager::neu(ManagerKonfiguration::default()).unwrap();
    (m.laden(&pfad, "umgebung").expect("Plugin muss laden"), tmp)
}

#[test]
fn test_umgebungsvariable_nur_mit_berechtigung() {
    std::env::set_var("DEVKIT_WASM_TEST_VARIABLE", "1");

    let (mit, _tmp1) = umgebungs_plugin(json!(["environment"]));
    let mut kontext = HookKontext::neu(Stage::PreSetup);
    assert!(hook_ausfuehren(&mit, &mut kontext).unwrap());

    let (ohne, _tmp2) = umgebungs_plugin(json!(["network"]));
    let mut kontext = HookKontext::neu(Stage::PreSetup);
    assert!(!hook_ausfuehren(&ohne, &mut kontext).unwrap());
}

#[test]
fn test_speicherlimit_verhindert_wachstum() {
    // memory.grow liefert -1 wenn der Limiter ablehnt
    let wat = ein_hook("(i32.ne (memory.grow (i32.const 100)) (i32.const -1))").bauen();
    let tmp = tempfile::tempdir().unwrap();
    let pfad = plugin_anlegen(tmp.path(), "speicher", &wat);

    let konfiguration = ManagerKonfiguration {
        max_speicher_bytes: 1024 * 1024,
        ..Default::default()
    };
    let eintrag = PluginManager::neu(konfiguration).unwrap().laden(&pfad, "speicher").unwrap();
    let mut kontext = HookKontext::neu(Stage::PreSetup);
    assert!(!hook_ausfuehren(&eintrag, &mut kontext).unwrap());

    // Mit Standardlimit darf das Plugin wachsen
    let (eintrag, _tmp) = laden(&wat);
    assert!(hook_ausfuehren(&eintrag, &mut kontext).unwrap());
}

#[test]
fn test_jedes_plugin_eigener_store() {
    // Hook ist nur beim ersten Aufruf pro Instanz erfolgreich
    let wat = ein_hook(
        "(global.set $n (i32.add (global.get $n) (i32.const 1))) (i32.eq (global.get $n) (i32.const 1))",
    )
    .feld("(global $n (mut i32) (i32.const 0))")
    .bauen();
    let tmp = tempfile::tempdir().unwrap();
    plugin_anlegen(tmp.path(), "eins", &wat);
    plugin_anlegen(tmp.path(), "zwei", &wat);

    let mut m = PluginManager::neu(ManagerKonfiguration::default()).unwrap();
    assert_eq!(m.alle_laden(&[tmp.path()]), 2);
    let system = m.fertigstellen();

    // Beide Instanzen zaehlen getrennt
    assert!(system.stage_ausfuehren(Stage::PreSetup).0);
    assert!(!system.stage_ausfuehren(Stage::PreSetup).0);
}

#[test]
fn test_log_aus_initialisierung() {
    let wat = WatModul::neu()
        .text(16384, "initialisiert")
        .initialisierung("(call $log (i32.const 2) (i32.const 16384) (i32.const 13))")
        .bauen();
    let (eintrag, _tmp) = laden(&wat);
    assert_eq!(eintrag.name(), "wasm");
}

#[test]
fn test_kontext_ausserhalb_hook() {
    // context() in initialize liefert -5 (kein Hook aktiv)
    let wat = WatModul::neu()
        .initialisierung(
            "(if (i32.ne (call $context (i32.const 20000) (i32.const 64)) (i32.const -5)) (then unreachable))",
        )
        .bauen();
    let (eintrag, _tmp) = laden(&wat);
    assert!(eintrag.hooks().is_empty());
}

#[test]
fn test_rollen_kein_objekt() {
    let tmp = tempfile::tempdir().unwrap();
    let pfad = plugin_anlegen(tmp.path(), "liste", &WatModul::neu().rollen(json!(["docker"])).bauen());
    let err = PluginManager::neu(ManagerKonfiguration::default())
        .unwrap()
        .laden(&pfad, "liste")
        .unwrap_err();
    assert!(matches!(err, PluginError::WasmAusfuehrung(_)));
}
