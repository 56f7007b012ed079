use std::fmt;
use serde::{Serialize, Deserialize};

/// Project-wide Result type
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Kind of certificate an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Self-signed single-algorithm trust anchor
    TrustAnchor,
    /// KEM end entity issued by a trust anchor
    EndEntity,
    /// Catalyst hybrid trust anchor
    Catalyst,
    /// Composite hybrid trust anchor
    Composite,
    /// Chameleon (delta) hybrid trust anchor
    Chameleon,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::TrustAnchor => write!(f, "ta"),
            ArtifactKind::EndEntity => write!(f, "ee"),
            ArtifactKind::Catalyst => write!(f, "catalyst"),
            ArtifactKind::Composite => write!(f, "composite"),
            ArtifactKind::Chameleon => write!(f, "chameleon"),
        }
    }
}

/// Output encoding for emitted certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PEM armored DER
    Pem,
    /// Raw DER
    Der,
}

impl OutputFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pem => "pem",
            OutputFormat::Der => "der",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Pem
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pem" => Ok(OutputFormat::Pem),
            "der" => Ok(OutputFormat::Der),
            _ => Err(crate::error::Error::Config(format!("Unsupported output format: {}", s))),
        }
    }
}
