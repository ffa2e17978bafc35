//! Plugin-Manifest Parsing und Schema-Validierung (manifest.json)
//!
//! Das Manifest wird als rohes JSON-Objekt gehalten, damit Typverletzungen
//! feldgenau gemeldet werden koennen. Die Validierung sammelt alle Fehler,
//! statt beim ersten abzubrechen.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{PluginError, Result};
use crate::trust;
use crate::types::Berechtigung;

/// Name der Manifest-Datei in jedem Plugin-Verzeichnis
pub const MANIFEST_DATEI: &str = "manifest.json";

/// Feld das die Integritaets-Pruefsumme traegt
pub const PRUEFSUMME_FELD: &str = "checksum";

const PFLICHTFELDER: [&str; 4] = ["name", "version", "author", "description"];
const OPTIONALE_TEXTFELDER: [&str; 3] = ["homepage", "repository", "license"];

/// Einzelne Schema-Verletzung, benennt immer das betroffene Feld
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaFehler {
    FeldFehlt(String),
    FalscherTyp {
        feld: String,
        erwartet: &'static str,
        erhalten: &'static str,
    },
    UngueltigeVersion(String),
    UngueltigeBerechtigungen(Vec<String>),
    UngueltigeAbhaengigkeit {
        paket: String,
        erhalten: &'static str,
    },
}

impl std::fmt::Display for SchemaFehler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeldFehlt(feld) => write!(f, "Pflichtfeld fehlt: {feld}"),
            Self::FalscherTyp {
                feld,
                erwartet,
                erhalten,
            } => write!(
                f,
                "Ungueltiger Typ fuer {feld}: erwartet {erwartet}, erhalten {erhalten}"
            ),
            Self::UngueltigeVersion(v) => write!(
                f,
                "Ungueltiges Versionsformat fuer version: {v} (erwartet MAJOR.MINOR.PATCH[-pre][+build])"
            ),
            Self::UngueltigeBerechtigungen(namen) => {
                let erlaubt: Vec<&str> = Berechtigung::ALLE.iter().map(|b| b.als_str()).collect();
                write!(
                    f,
                    "Ungueltige permissions: {} (erlaubt: {})",
                    namen.join(", "),
                    erlaubt.join(", ")
                )
            }
            Self::UngueltigeAbhaengigkeit { paket, erhalten } => write!(
                f,
                "Abhaengigkeit '{paket}' in requires braucht eine Versionsbedingung als string, erhalten {erhalten}"
            ),
        }
    }
}

/// Plugin-Manifest wie es auf der Platte liegt
#[derive(Debug, Clone, PartialEq)]
pub struct PluginManifest {
    daten: Map<String, Value>,
}

impl PluginManifest {
    /// Laedt ein Manifest aus einer JSON-Datei
    ///
    /// Fehlende Datei und kaputtes JSON werden unterschiedlich gemeldet.
    pub fn aus_datei(pfad: &Path) -> Result<Self> {
        let inhalt = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => inhalt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PluginError::ManifestFehlt(pfad.display().to_string()));
            }
            Err(e) => {
                return Err(PluginError::ManifestUngueltig(format!(
                    "{}: {e}",
                    pfad.display()
                )));
            }
        };
        Self::parse(&inhalt)
            .map_err(|e| PluginError::ManifestUngueltig(format!("{}: {e}", pfad.display())))
    }

    /// Parst ein Manifest aus einem JSON-String (Top-Level muss ein Objekt sein)
    pub fn parse(inhalt: &str) -> Result<Self> {
        let wert: Value = serde_json::from_str(inhalt)
            .map_err(|e| PluginError::ManifestUngueltig(e.to_string()))?;
        Self::aus_wert(wert)
    }

    pub fn aus_wert(wert: Value) -> Result<Self> {
        match wert {
            Value::Object(daten) => Ok(Self { daten }),
            anderes => Err(PluginError::ManifestUngueltig(format!(
                "Top-Level muss ein Objekt sein, erhalten {}",
                json_typ(&anderes)
            ))),
        }
    }

    /// Validiert das Manifest gegen das Schema und sammelt alle Verletzungen
    pub fn validieren(&self) -> std::result::Result<(), Vec<SchemaFehler>> {
        let mut fehler = Vec::new();

        for feld in PFLICHTFELDER {
            match self.daten.get(feld) {
                None => fehler.push(SchemaFehler::FeldFehlt(feld.into())),
                Some(Value::String(_)) => {}
                Some(anderes) => fehler.push(falscher_typ(feld, "string", anderes)),
            }
        }

        // Versionsformat nur pruefen wenn es ueberhaupt ein String ist
        if let Some(Value::String(version)) = self.daten.get("version") {
            if !ist_semver(version) {
                fehler.push(SchemaFehler::UngueltigeVersion(version.clone()));
            }
        }

        for feld in OPTIONALE_TEXTFELDER.into_iter().chain([PRUEFSUMME_FELD]) {
            match self.daten.get(feld) {
                None | Some(Value::String(_)) => {}
                Some(anderes) => fehler.push(falscher_typ(feld, "string", anderes)),
            }
        }

        match self.daten.get("requires") {
            None => {}
            Some(Value::Object(abhaengigkeiten)) => {
                for (paket, bedingung) in abhaengigkeiten {
                    if !bedingung.is_string() {
                        fehler.push(SchemaFehler::UngueltigeAbhaengigkeit {
                            paket: paket.clone(),
                            erhalten: json_typ(bedingung),
                        });
                    }
                }
            }
            Some(anderes) => fehler.push(falscher_typ("requires", "object", anderes)),
        }

        match self.daten.get("permissions") {
            None => {}
            Some(Value::Array(eintraege)) => {
                let ungueltig: Vec<String> = eintraege
                    .iter()
                    .filter(|e| match e {
                        Value::String(s) => s.parse::<Berechtigung>().is_err(),
                        _ => true,
                    })
                    .map(|e| match e {
                        Value::String(s) => s.clone(),
                        anderes => anderes.to_string(),
                    })
                    .collect();
                if !ungueltig.is_empty() {
                    fehler.push(SchemaFehler::UngueltigeBerechtigungen(ungueltig));
                }
            }
            Some(anderes) => fehler.push(falscher_typ("permissions", "array", anderes)),
        }

        if fehler.is_empty() {
            Ok(())
        } else {
            Err(fehler)
        }
    }

    /// Prueft die gespeicherte Pruefsumme gegen die neu berechnete
    pub fn integritaet_pruefen(&self) -> Result<()> {
        let gespeichert = self
            .daten
            .get(PRUEFSUMME_FELD)
            .ok_or(PluginError::PruefsummeFehlt)?;
        let berechnet = self.pruefsumme_berechnen()?;

        match gespeichert {
            Value::String(erwartet) if *erwartet == berechnet => Ok(()),
            Value::String(erwartet) => Err(PluginError::IntegritaetVerletzt {
                erwartet: erwartet.clone(),
                berechnet,
            }),
            anderes => Err(PluginError::IntegritaetVerletzt {
                erwartet: anderes.to_string(),
                berechnet,
            }),
        }
    }

    /// Berechnet die Pruefsumme ueber alle Felder ausser `checksum`
    pub fn pruefsumme_berechnen(&self) -> Result<String> {
        let mut kopie = self.daten.clone();
        kopie.remove(PRUEFSUMME_FELD);
        trust::pruefsumme(&Value::Object(kopie))
    }

    /// Berechnet die Pruefsumme und traegt sie ins Manifest ein
    pub fn pruefsumme_setzen(&mut self) -> Result<String> {
        let summe = self.pruefsumme_berechnen()?;
        self.daten
            .insert(PRUEFSUMME_FELD.into(), Value::String(summe.clone()));
        Ok(summe)
    }

    /// Schreibt das Manifest als formatiertes JSON
    pub fn speichern(&self, pfad: &Path) -> Result<()> {
        let mut inhalt = serde_json::to_string_pretty(&self.daten)
            .map_err(|e| PluginError::Intern(format!("Manifest nicht serialisierbar: {e}")))?;
        inhalt.push('\n');
        std::fs::write(pfad, inhalt)?;
        Ok(())
    }

    pub fn hat_pruefsumme(&self) -> bool {
        self.daten.contains_key(PRUEFSUMME_FELD)
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    pub fn version(&self) -> Option<&str> {
        self.text("version")
    }

    pub fn autor(&self) -> Option<&str> {
        self.text("author")
    }

    pub fn beschreibung(&self) -> Option<&str> {
        self.text("description")
    }

    /// Deklarierte Berechtigungen, unbekannte Eintraege werden ignoriert
    pub fn berechtigungen(&self) -> BTreeSet<Berechtigung> {
        self.daten
            .get("permissions")
            .and_then(Value::as_array)
            .map(|eintraege| {
                eintraege
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| s.parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rohzugriff auf ein Feld
    pub fn feld(&self, name: &str) -> Option<&Value> {
        self.daten.get(name)
    }

    pub fn feld_setzen(&mut self, name: impl Into<String>, wert: Value) {
        self.daten.insert(name.into(), wert);
    }

    fn text(&self, feld: &str) -> Option<&str> {
        self.daten.get(feld).and_then(Value::as_str)
    }
}

/// Laedt und validiert eine einzelne Manifest-Datei (fuer Plugin-Autoren)
pub fn manifest_datei_validieren(pfad: &Path) -> Result<PluginManifest> {
    let manifest = PluginManifest::aus_datei(pfad)?;
    manifest.validieren().map_err(PluginError::ManifestSchema)?;
    Ok(manifest)
}

/// Pfad der Manifest-Datei in einem Plugin-Verzeichnis
pub fn manifest_pfad(verzeichnis: &Path) -> PathBuf {
    verzeichnis.join(MANIFEST_DATEI)
}

/// Prueft `MAJOR.MINOR.PATCH[-prerelease][+build]`
///
/// Kernteile sind Ziffernfolgen, Prerelease und Build bestehen aus
/// ASCII-Buchstaben, Ziffern und Punkten.
pub fn ist_semver(v: &str) -> bool {
    let (rest, build) = match v.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (v, None),
    };
    let (kern, pre) = match rest.split_once('-') {
        Some((kern, pre)) => (kern, Some(pre)),
        None => (rest, None),
    };

    let teile: Vec<&str> = kern.split('.').collect();
    if teile.len() != 3 {
        return false;
    }
    if !teile
        .iter()
        .all(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
    {
        return false;
    }

    [pre, build].into_iter().flatten().all(|segment| {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.')
    })
}

fn falscher_typ(feld: &str, erwartet: &'static str, wert: &Value) -> SchemaFehler {
    SchemaFehler::FalscherTyp {
        feld: feld.into(),
        erwartet,
        erhalten: json_typ(wert),
    }
}

fn json_typ(wert: &Value) -> &'static str {
    match wert {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
