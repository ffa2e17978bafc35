//! Devkit-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass das Werkzeug ohne Konfigurationsdatei
//! lauffaehig ist.

use std::path::{Path, PathBuf};

use devkit_observability::{log_format_gueltig, log_level_gueltig};
use devkit_plugin::host::sandbox::STANDARD_INSTRUKTIONEN;
use devkit_plugin::ManagerKonfiguration;
use serde::{Deserialize, Serialize};

/// Vollstaendige Devkit-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevkitConfig {
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Plugin-Einstellungen
    pub plugins: PluginEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Plugin-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginEinstellungen {
    /// Suchpfade in Prioritaetsreihenfolge, `~` wird expandiert
    pub suchpfade: Vec<String>,
    /// Plugins ohne Pruefsumme ablehnen
    pub pruefsumme_erforderlich: bool,
    /// Speicherlimit pro Plugin in MiB
    pub max_speicher_mb: u64,
    /// Fuel pro Aufruf (0 = unbegrenzt)
    pub max_instruktionen: u64,
}

impl Default for PluginEinstellungen {
    fn default() -> Self {
        Self {
            suchpfade: vec!["~/.devkit/plugins".into(), "plugins".into()],
            pruefsumme_erforderlich: false,
            max_speicher_mb: 64,
            max_instruktionen: STANDARD_INSTRUKTIONEN,
        }
    }
}

impl DevkitConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Prueft Werte die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiges Log-Level: '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format: '{}'", self.logging.format);
        }
        if self.plugins.max_speicher_mb == 0 {
            anyhow::bail!("plugins.max_speicher_mb muss groesser als 0 sein");
        }
        Ok(())
    }

    /// Suchpfade mit expandiertem `~`
    pub fn suchpfade_aufloesen(&self) -> Vec<PathBuf> {
        self.plugins
            .suchpfade
            .iter()
            .map(|p| pfad_expandieren(p))
            .collect()
    }

    /// Konfiguration fuer den PluginManager
    pub fn manager_konfiguration(&self) -> ManagerKonfiguration {
        ManagerKonfiguration {
            pruefsumme_erforderlich: self.plugins.pruefsumme_erforderlich,
            max_speicher_bytes: self.plugins.max_speicher_mb.saturating_mul(1024 * 1024),
            max_instruktionen: self.plugins.max_instruktionen,
        }
    }
}

/// Expandiert ein fuehrendes `~` zum Home-Verzeichnis
pub fn pfad_expandieren(pfad: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (pfad, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
