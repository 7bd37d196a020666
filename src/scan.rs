use std::fmt;

use serde::{Deserialize, Serialize};

/// code families the scanner can report, stored as their symbology tag
/// strings so library files stay readable by other tooling
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(into = "String", from = "String")]
pub enum Symbology {
    Qr,
    Ean13,
    Ean8,
    Code128,
    Code39,
    Code93,
    UpcE,
    Pdf417,
    Aztec,
    DataMatrix,
    #[default]
    Other,
}

impl Symbology {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Qr => "org.iso.QRCode",
            Self::Ean13 => "org.gs1.EAN-13",
            Self::Ean8 => "org.gs1.EAN-8",
            Self::Code128 => "org.iso.Code128",
            Self::Code39 => "org.iso.Code39",
            Self::Code93 => "org.iso.Code93",
            Self::UpcE => "org.gs1.UPC-E",
            Self::Pdf417 => "org.iso.PDF417",
            Self::Aztec => "org.iso.Aztec",
            Self::DataMatrix => "org.iso.DataMatrix",
            Self::Other => "barcode",
        }
    }
}

impl From<Symbology> for String {
    fn from(symbology: Symbology) -> Self {
        symbology.tag().to_string()
    }
}

impl From<String> for Symbology {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "org.iso.QRCode" => Self::Qr,
            "org.gs1.EAN-13" => Self::Ean13,
            "org.gs1.EAN-8" => Self::Ean8,
            "org.iso.Code128" => Self::Code128,
            "org.iso.Code39" => Self::Code39,
            "org.iso.Code93" => Self::Code93,
            "org.gs1.UPC-E" => Self::UpcE,
            "org.iso.PDF417" => Self::Pdf417,
            "org.iso.Aztec" => Self::Aztec,
            "org.iso.DataMatrix" => Self::DataMatrix,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Qr => "QR code",
                Self::Ean13 => "EAN-13",
                Self::Ean8 => "EAN-8",
                Self::Code128 => "Code128",
                Self::Code39 => "Code39",
                Self::Code93 => "Code93",
                Self::UpcE => "UPC-E",
                Self::Pdf417 => "PDF417",
                Self::Aztec => "Aztec",
                Self::DataMatrix => "DataMatrix",
                Self::Other => "barcode",
            }
        )
    }
}

/// one decoded value from the camera feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedCode {
    pub value: String,
    pub symbology: Symbology,
}

impl ScannedCode {
    #[must_use]
    pub const fn new(value: String, symbology: Symbology) -> Self {
        Self { value, symbology }
    }
}

/// a restartable feed of decoded codes, at most one active decode at a time
pub trait CodeSource {
    /// the next decoded code, `None` once the feed is closed
    fn next_code(&mut self) -> Option<ScannedCode>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbology_display_names() {
        assert_eq!(Symbology::Qr.to_string(), "QR code");
        assert_eq!(Symbology::Ean13.to_string(), "EAN-13");
        assert_eq!(Symbology::Other.to_string(), "barcode");
    }

    #[test]
    fn symbology_round_trips_through_tags() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrap {
            symbology: Symbology,
        }
        let toml = toml::to_string(&Wrap {
            symbology: Symbology::Ean8,
        })
        .unwrap();
        assert!(toml.contains("org.gs1.EAN-8"));
        let back: Wrap = toml::from_str(&toml).unwrap();
        assert_eq!(back.symbology, Symbology::Ean8);
    }

    #[test]
    fn unknown_tag_falls_back_to_other() {
        #[derive(serde::Deserialize)]
        struct Wrap {
            symbology: Symbology,
        }
        let back: Wrap = toml::from_str("symbology = \"org.iso.MaxiCode\"").unwrap();
        assert_eq!(back.symbology, Symbology::Other);
    }
}
