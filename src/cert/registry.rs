use std::collections::BTreeMap;

use tracing::debug;
use x509_cert::Certificate;

use crate::crypto::{Algorithm, KeyPair};
use crate::error::Error;
use crate::types::Result;

/// Self-signed certificate together with the key that signed it
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    key_pair: KeyPair,
    certificate: Certificate,
}

impl TrustAnchor {
    pub fn new(key_pair: KeyPair, certificate: Certificate) -> Self {
        Self {
            key_pair,
            certificate,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.key_pair.algorithm()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

/// Write side of the registry, used only while trust anchors are built
#[derive(Debug, Default)]
pub struct TrustAnchorRegistryBuilder {
    anchors: BTreeMap<Algorithm, TrustAnchor>,
}

impl TrustAnchorRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trust anchor; each algorithm may be registered once
    pub fn register(&mut self, anchor: TrustAnchor) -> Result<()> {
        let algorithm = anchor.algorithm();
        if self.anchors.contains_key(&algorithm) {
            return Err(Error::Certificate(format!(
                "Trust anchor for {} already registered",
                algorithm
            )));
        }

        debug!(algorithm = %algorithm, "Registered trust anchor");
        self.anchors.insert(algorithm, anchor);
        Ok(())
    }

    /// Finish registration; the result is read-only
    pub fn freeze(self) -> TrustAnchorRegistry {
        TrustAnchorRegistry {
            anchors: self.anchors,
        }
    }
}

/// Read-only trust anchor lookup, keyed by algorithm
#[derive(Debug)]
pub struct TrustAnchorRegistry {
    anchors: BTreeMap<Algorithm, TrustAnchor>,
}

impl TrustAnchorRegistry {
    pub fn get(&self, algorithm: Algorithm) -> Result<&TrustAnchor> {
        self.anchors
            .get(&algorithm)
            .ok_or_else(|| Error::Certificate(format!("No trust anchor registered for {}", algorithm)))
    }

    /// Look up by configuration name (e.g. `dilithium2`)
    pub fn get_by_name(&self, name: &str) -> Result<&TrustAnchor> {
        let algorithm: Algorithm = name.parse()?;
        self.get(algorithm)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrustAnchor> {
        self.anchors.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::{common_name, CertificateBuilder};
    use crate::crypto::{ContentSigner, SerialNumberAllocator};
    use std::sync::Arc;

    fn anchor(algorithm: Algorithm) -> TrustAnchor {
        let builder = CertificateBuilder::new(Arc::new(SerialNumberAllocator::new()));
        let keys = KeyPair::generate(algorithm).unwrap();
        let cert = builder
            .build_self_signed(common_name("Registry TA").unwrap(), &keys, Vec::new())
            .unwrap();
        TrustAnchor::new(keys, cert)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut builder = TrustAnchorRegistryBuilder::new();
        builder.register(anchor(Algorithm::Dilithium2)).unwrap();
        let registry = builder.freeze();

        assert_eq!(registry.len(), 1);
        let ta = registry.get_by_name("dilithium2").unwrap();
        assert_eq!(ta.algorithm(), Algorithm::Dilithium2);
        assert_eq!(
            ta.certificate().tbs_certificate.subject_public_key_info,
            ta.key_pair().subject_public_key_info().unwrap()
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = TrustAnchorRegistryBuilder::new();
        builder.register(anchor(Algorithm::Dilithium2)).unwrap();

        let err = builder.register(anchor(Algorithm::Dilithium2)).unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn test_missing_anchor() {
        let registry = TrustAnchorRegistryBuilder::new().freeze();
        assert!(registry.is_empty());
        assert!(matches!(registry.get(Algorithm::Dilithium5), Err(Error::Certificate(_))));
        assert!(matches!(registry.get_by_name("nope"), Err(Error::AlgorithmUnavailable(_))));
    }
}
