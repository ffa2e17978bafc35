//! devkit-plugins – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und fuehrt das
//! gewaehlte Kommando aus.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use devkit_cli::config::{pfad_expandieren, DevkitConfig};
use devkit_plugin::Stage;

#[derive(Parser)]
#[command(name = "devkit-plugins")]
#[command(author, version, about = "Devkit Plugins verwalten und pruefen", long_about = None)]
struct Cli {
    /// Konfigurationsdatei (Standard: $DEVKIT_CONFIG oder devkit.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Zusaetzlicher Plugin-Suchpfad, vor den konfigurierten durchsucht
    #[arg(long = "plugin-path", global = true)]
    plugin_pfade: Vec<String>,

    #[command(subcommand)]
    kommando: Kommando,
}

#[derive(Subcommand)]
enum Kommando {
    /// Geladene Plugins auflisten
    List,

    /// Metadaten aller geladenen Plugins als JSON
    Info,

    /// Von Plugins bereitgestellte Rollen
    Roles,

    /// Plugin-Verzeichnisse pruefen ohne Plugins auszufuehren
    Validate {
        /// Plugin-Wurzel (Standard: alle konfigurierten Suchpfade)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Pruefsumme eines Manifests berechnen
    Checksum {
        /// Pfad zur manifest.json
        manifest: PathBuf,

        /// Pruefsumme ins Manifest schreiben
        #[arg(long)]
        write: bool,
    },

    /// Hooks einer Stage ausfuehren
    Hooks {
        /// pre_setup, post_setup, pre_role oder post_role
        stage: Stage,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        task: Option<String>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_pfad = cli.config.clone().unwrap_or_else(|| {
        std::env::var("DEVKIT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("devkit.toml"))
    });

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = DevkitConfig::laden(&config_pfad)?;
    config.validieren()?;

    devkit_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad.display(),
        "devkit-plugins gestartet"
    );

    let zusaetzliche: Vec<PathBuf> = cli.plugin_pfade.iter().map(|p| pfad_expandieren(p)).collect();
    let mut aus = std::io::stdout().lock();

    let erfolg = match cli.kommando {
        Kommando::List => {
            let system = devkit_cli::system_laden(&config, &zusaetzliche)?;
            devkit_cli::plugins_auflisten(&system, &mut aus)?;
            true
        }
        Kommando::Info => {
            let system = devkit_cli::system_laden(&config, &zusaetzliche)?;
            devkit_cli::info_ausgeben(&system, &mut aus)?;
            true
        }
        Kommando::Roles => {
            let system = devkit_cli::system_laden(&config, &zusaetzliche)?;
            devkit_cli::rollen_ausgeben(&system, &mut aus)?;
            true
        }
        Kommando::Validate { root } => {
            let wurzeln = match root {
                Some(root) => vec![root],
                None => {
                    let mut pfade = zusaetzliche.clone();
                    pfade.extend(config.suchpfade_aufloesen());
                    pfade.into_iter().filter(|p| p.is_dir()).collect()
                }
            };

            let mut alle_gueltig = true;
            for wurzel in &wurzeln {
                writeln!(aus, "{}:", wurzel.display())?;
                alle_gueltig &= devkit_cli::verzeichnis_validieren(wurzel, &mut aus)?;
            }
            alle_gueltig
        }
        Kommando::Checksum { manifest, write } => {
            devkit_cli::pruefsumme_ausgeben(&manifest, write, &mut aus)?;
            true
        }
        Kommando::Hooks { stage, role, task } => {
            let system = devkit_cli::system_laden(&config, &zusaetzliche)?;
            devkit_cli::hooks_ausfuehren(&system, stage, role, task, &mut aus)?
        }
    };

    aus.flush()?;
    Ok(if erfolg {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
