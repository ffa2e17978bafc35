//! devkit-cli – Kommandos der Plugin-Verwaltung
//!
//! Jedes Kommando schreibt seine Ausgabe in einen uebergebenen Writer,
//! Logs gehen ueber tracing nach stderr.

pub mod config;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devkit_plugin::host::runtime::PluginEngine;
use devkit_plugin::{HookKontext, PluginManager, PluginManifest, PluginSystem, Stage, VerzeichnisValidator};

use config::DevkitConfig;

/// Laedt alle Plugins aus den zusaetzlichen und den konfigurierten Suchpfaden.
///
/// Zusaetzliche Pfade (Kommandozeile) kommen zuerst und gewinnen damit bei
/// gleichnamigen Plugins.
pub fn system_laden(config: &DevkitConfig, zusaetzliche_pfade: &[PathBuf]) -> Result<PluginSystem> {
    let mut manager = PluginManager::neu(config.manager_konfiguration())
        .context("Plugin-Engine konnte nicht erstellt werden")?;

    let mut pfade = zusaetzliche_pfade.to_vec();
    pfade.extend(config.suchpfade_aufloesen());
    manager.alle_laden(&pfade);

    Ok(manager.fertigstellen())
}

/// `list`: Namen in Ladereihenfolge
pub fn plugins_auflisten(system: &PluginSystem, aus: &mut dyn Write) -> Result<()> {
    let namen = system.plugins_auflisten();
    if namen.is_empty() {
        writeln!(aus, "Keine Plugins geladen")?;
        return Ok(());
    }
    for name in namen {
        if let Some(eintrag) = system.plugin(&name) {
            writeln!(aus, "{} {} – {}", eintrag.name(), eintrag.version(), eintrag.beschreibung())?;
        }
    }
    Ok(())
}

/// `info`: Metadaten aller Plugins als JSON
pub fn info_ausgeben(system: &PluginSystem, aus: &mut dyn Write) -> Result<()> {
    let json = serde_json::to_string_pretty(&system.plugin_info())?;
    writeln!(aus, "{json}")?;
    Ok(())
}

/// `roles`: Rollenname und Pfad, nach Name sortiert
pub fn rollen_ausgeben(system: &PluginSystem, aus: &mut dyn Write) -> Result<()> {
    let mut rollen: Vec<_> = system.plugin_rollen().into_iter().collect();
    rollen.sort();
    for (rolle, pfad) in rollen {
        writeln!(aus, "{rolle}\t{}", pfad.display())?;
    }
    Ok(())
}

/// `validate`: prueft jedes Plugin-Verzeichnis unter `wurzel` ohne es zu laden.
/// Gibt `true` zurueck wenn alle Plugins gueltig sind.
pub fn verzeichnis_validieren(wurzel: &Path, aus: &mut dyn Write) -> Result<bool> {
    let engine = PluginEngine::neu().context("Plugin-Engine konnte nicht erstellt werden")?;
    let validator = VerzeichnisValidator::neu(wurzel, engine);

    let ergebnisse = validator.alle_validieren();
    if ergebnisse.is_empty() {
        writeln!(aus, "Keine Plugins in {}", wurzel.display())?;
    }

    let mut alle_gueltig = true;
    for (name, ergebnis) in ergebnisse {
        match ergebnis {
            Ok(_) => writeln!(aus, "✓ {name}")?,
            Err(e) => {
                alle_gueltig = false;
                writeln!(aus, "✗ {name}: {e}")?;
            }
        }
    }
    Ok(alle_gueltig)
}

/// `checksum`: berechnet die Pruefsumme eines Manifests, optional zurueckgeschrieben
pub fn pruefsumme_ausgeben(manifest_pfad: &Path, schreiben: bool, aus: &mut dyn Write) -> Result<()> {
    let mut manifest = PluginManifest::aus_datei(manifest_pfad)?;

    let summe = if schreiben {
        let summe = manifest.pruefsumme_setzen()?;
        manifest.speichern(manifest_pfad)?;
        tracing::info!(pfad = %manifest_pfad.display(), "Pruefsumme eingetragen");
        summe
    } else {
        manifest.pruefsumme_berechnen()?
    };

    writeln!(aus, "{summe}")?;
    Ok(())
}

/// `hooks`: fuehrt eine Stage aus und gibt den Kontext als JSON aus
pub fn hooks_ausfuehren(
    system: &PluginSystem,
    stage: Stage,
    rolle: Option<String>,
    task: Option<String>,
    aus: &mut dyn Write,
) -> Result<bool> {
    let mut kontext = HookKontext::neu(stage);
    kontext.rolle = rolle;
    kontext.task = task;

    let ok = system.hooks_ausfuehren(stage, &mut kontext);
    writeln!(aus, "{}", serde_json::to_string_pretty(&kontext)?)?;
    Ok(ok)
}
