//! Hybrid trust anchors binding a classical and a post-quantum key

pub mod catalyst;
pub mod chameleon;
pub mod composite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;

use crate::cert::{verify_certificate, CertificateBuilder};
use crate::crypto::{Algorithm, KeyPair};
use crate::error::Error;
use crate::types::{ArtifactKind, Result};

pub use chameleon::{DeltaCertificateDescriptor, DeltaFields};
pub use composite::CompositeSigner;

/// Hybrid composition strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HybridStrategy {
    Catalyst,
    Composite,
    Chameleon,
}

impl HybridStrategy {
    pub const ALL: [HybridStrategy; 3] = [
        HybridStrategy::Catalyst,
        HybridStrategy::Composite,
        HybridStrategy::Chameleon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HybridStrategy::Catalyst => "catalyst",
            HybridStrategy::Composite => "composite",
            HybridStrategy::Chameleon => "chameleon",
        }
    }

    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            HybridStrategy::Catalyst => ArtifactKind::Catalyst,
            HybridStrategy::Composite => ArtifactKind::Composite,
            HybridStrategy::Chameleon => ArtifactKind::Chameleon,
        }
    }
}

impl fmt::Display for HybridStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HybridStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "catalyst" => Ok(HybridStrategy::Catalyst),
            "composite" => Ok(HybridStrategy::Composite),
            "chameleon" => Ok(HybridStrategy::Chameleon),
            _ => Err(Error::Config(format!("Unknown hybrid strategy: {}", s))),
        }
    }
}

/// A composed hybrid certificate and what each strategy produced alongside it
#[derive(Debug, Clone)]
pub enum HybridCertificate {
    Catalyst {
        certificate: Certificate,
        alt_algorithm: AlgorithmIdentifierOwned,
        alt_signature: Vec<u8>,
    },
    Composite {
        certificate: Certificate,
        components: Vec<Algorithm>,
    },
    Chameleon {
        certificate: Certificate,
        delta: Certificate,
        fields: DeltaFields,
    },
}

impl HybridCertificate {
    pub fn strategy(&self) -> HybridStrategy {
        match self {
            HybridCertificate::Catalyst { .. } => HybridStrategy::Catalyst,
            HybridCertificate::Composite { .. } => HybridStrategy::Composite,
            HybridCertificate::Chameleon { .. } => HybridStrategy::Chameleon,
        }
    }

    pub fn certificate(&self) -> &Certificate {
        match self {
            HybridCertificate::Catalyst { certificate, .. }
            | HybridCertificate::Composite { certificate, .. }
            | HybridCertificate::Chameleon { certificate, .. } => certificate,
        }
    }

    pub fn into_certificate(self) -> Certificate {
        match self {
            HybridCertificate::Catalyst { certificate, .. }
            | HybridCertificate::Composite { certificate, .. }
            | HybridCertificate::Chameleon { certificate, .. } => certificate,
        }
    }

    /// Check the strategy's verification rule.
    ///
    /// Catalyst: primary and alternative signatures. Composite: every
    /// component. Chameleon: the base signature, the delta signature and
    /// that the delta extracts unchanged.
    pub fn verify(&self) -> Result<bool> {
        let certificate = self.certificate();
        let own_key = &certificate.tbs_certificate.subject_public_key_info;
        if !verify_certificate(certificate, own_key)? {
            return Ok(false);
        }

        match self {
            HybridCertificate::Catalyst { .. } => catalyst::verify_alternative(certificate),
            HybridCertificate::Composite { .. } => Ok(true),
            HybridCertificate::Chameleon { delta, .. } => {
                let extracted = chameleon::extract(certificate)?;
                Ok(extracted == *delta
                    && verify_certificate(&extracted, &extracted.tbs_certificate.subject_public_key_info)?)
            }
        }
    }
}

/// Dispatches a strategy over a (primary, alternative) key pair
#[derive(Debug, Clone)]
pub struct HybridComposer {
    builder: CertificateBuilder,
    delta_fields: DeltaFields,
}

impl HybridComposer {
    pub fn new(builder: CertificateBuilder) -> Self {
        Self {
            builder,
            delta_fields: DeltaFields::default(),
        }
    }

    /// Field mask used for Chameleon descriptors
    pub fn with_delta_fields(mut self, fields: DeltaFields) -> Self {
        self.delta_fields = fields;
        self
    }

    /// Compose one hybrid trust anchor
    pub fn compose(
        &self,
        strategy: HybridStrategy,
        primary: &KeyPair,
        alternative: &KeyPair,
    ) -> Result<HybridCertificate> {
        if !primary.algorithm().is_signature() || !alternative.algorithm().is_signature() {
            return Err(Error::AlgorithmUnavailable(format!(
                "Hybrid {} needs two signature keys, got {} and {}",
                strategy,
                primary.algorithm(),
                alternative.algorithm()
            )));
        }

        match strategy {
            HybridStrategy::Catalyst => catalyst::build(&self.builder, primary, alternative),
            HybridStrategy::Composite => composite::build(&self.builder, primary, alternative),
            HybridStrategy::Chameleon => {
                chameleon::build(&self.builder, primary, alternative, self.delta_fields)
            }
        }
    }
}
