//! Integritaets-Pruefsummen fuer Plugin-Manifeste
//!
//! Die Pruefsumme ist ein SHA-256 ueber die kanonische JSON-Form des Manifests
//! ohne das Feld `checksum`. Sie erkennt Beschaedigung und nachtraegliche
//! Aenderungen, ist aber kein Herkunftsnachweis (kein Schluessel im Spiel).
//!
//! Kanonische Form:
//! - Schluessel auf jeder Ebene sortiert
//! - Trennzeichen `", "` und `": "`
//! - Nicht-ASCII-Zeichen und DEL als `\uXXXX` (UTF-16, Kleinbuchstaben)
//! - Zahlen in der Schreibweise aus der Datei (`arbitrary_precision`), ganze
//!   Zahlen jenseits von u64 bleiben damit exakt

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{PluginError, Result};

/// Berechnet den SHA-256 Hash beliebiger Bytes als Hex-String
pub fn sha256_hex(daten: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(daten);
    format!("{:x}", hasher.finalize())
}

/// Serialisiert einen JSON-Wert in die kanonische Form
pub fn kanonisch_serialisieren(wert: &Value) -> Result<Vec<u8>> {
    let mut puffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut puffer, KanonischerFormatter);
    wert.serialize(&mut serializer)
        .map_err(|e| PluginError::Intern(format!("Kanonische Serialisierung fehlgeschlagen: {e}")))?;
    Ok(puffer)
}

/// Pruefsumme ueber die kanonische Form
pub fn pruefsumme(wert: &Value) -> Result<String> {
    Ok(sha256_hex(&kanonisch_serialisieren(wert)?))
}

struct KanonischerFormatter;

impl Formatter for KanonischerFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for zeichen in fragment.chars() {
            if zeichen.is_ascii() && zeichen != '\x7f' {
                let mut buf = [0u8; 1];
                writer.write_all(zeichen.encode_utf8(&mut buf).as_bytes())?;
            } else {
                let mut einheiten = [0u16; 2];
                for einheit in zeichen.encode_utf16(&mut einheiten) {
                    write!(writer, "\\u{:04x}", einheit)?;
                }
            }
        }
        Ok(())
    }
}
