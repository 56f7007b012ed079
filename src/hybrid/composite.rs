//! Composite hybrids: two keys and two signatures acting as one algorithm

use const_oid::ObjectIdentifier;
use der::asn1::BitString;
use der::{Any, Decode, Encode};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::{debug, trace};

use crate::cert::extensions::{trust_anchor_extensions, HYBRID_TA_PATH_LEN};
use crate::cert::{names, verify_signature, CertificateBuilder};
use crate::crypto::{Algorithm, ContentSigner, KeyPair};
use crate::error::Error;
use crate::hybrid::HybridCertificate;
use crate::types::Result;

/// Public key algorithm of a composite SubjectPublicKeyInfo
pub const ID_COMPOSITE_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.18227.2.1");
/// Signature algorithm whose parameters list the component algorithms
pub const ID_ALG_COMPOSITE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113533.7.8");

/// Signs with every component key over the same message.
///
/// The composite private key is only ever this ordered list of borrowed
/// component key pairs.
pub struct CompositeSigner<'a> {
    components: Vec<&'a KeyPair>,
}

impl<'a> CompositeSigner<'a> {
    pub fn new(components: Vec<&'a KeyPair>) -> Result<Self> {
        if components.len() < 2 {
            return Err(Error::AlgorithmUnavailable(
                "Composite signer needs at least two components".to_string(),
            ));
        }
        Ok(Self { components })
    }

    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.components.iter().map(|kp| kp.algorithm()).collect()
    }
}

impl ContentSigner for CompositeSigner<'_> {
    fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let components = self
            .components
            .iter()
            .map(|kp| kp.algorithm_identifier())
            .collect::<Result<Vec<_>>>()?;

        Ok(AlgorithmIdentifierOwned {
            oid: ID_ALG_COMPOSITE,
            parameters: Some(Any::from_der(&components.to_der()?)?),
        })
    }

    fn subject_public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let keys = self
            .components
            .iter()
            .map(|kp| kp.subject_public_key_info())
            .collect::<Result<Vec<_>>>()?;

        Ok(SubjectPublicKeyInfoOwned {
            algorithm: AlgorithmIdentifierOwned {
                oid: ID_COMPOSITE_KEY,
                parameters: None,
            },
            subject_public_key: BitString::from_bytes(&keys.to_der()?)?,
        })
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signatures = self
            .components
            .iter()
            .map(|kp| BitString::from_bytes(&kp.sign(message)?).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(signatures.to_der()?)
    }
}

/// Build a composite trust anchor over (primary, alternative)
pub fn build(
    builder: &CertificateBuilder,
    primary: &KeyPair,
    alternative: &KeyPair,
) -> Result<HybridCertificate> {
    let signer = CompositeSigner::new(vec![primary, alternative])?;
    let spki = signer.subject_public_key_info()?;
    let extensions = trust_anchor_extensions(&spki, HYBRID_TA_PATH_LEN)?;
    let subject = names::hybrid_name(primary.algorithm(), alternative.algorithm())?;

    let certificate = builder.build_self_signed(subject, &signer, extensions)?;
    debug!(
        primary = %primary.algorithm(),
        alternative = %alternative.algorithm(),
        "Built composite certificate"
    );

    Ok(HybridCertificate::Composite {
        certificate,
        components: signer.algorithms(),
    })
}

/// Component public keys of a composite SubjectPublicKeyInfo
pub fn component_keys(spki: &SubjectPublicKeyInfoOwned) -> Result<Vec<SubjectPublicKeyInfoOwned>> {
    if spki.algorithm.oid != ID_COMPOSITE_KEY {
        return Err(Error::Certificate(format!(
            "Public key algorithm {} is not composite",
            spki.algorithm.oid
        )));
    }
    Ok(Vec::<SubjectPublicKeyInfoOwned>::from_der(spki.subject_public_key.raw_bytes())?)
}

/// Verify a composite signature; every component must verify
pub fn verify_composite_signature(
    algorithm: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<bool> {
    if spki.algorithm.oid != ID_COMPOSITE_KEY {
        return Ok(false);
    }

    let algorithms: Vec<AlgorithmIdentifierOwned> = algorithm
        .parameters
        .as_ref()
        .ok_or_else(|| Error::Encoding("Composite algorithm without parameters".to_string()))?
        .decode_as()?;
    let keys = component_keys(spki)?;
    let signatures = match Vec::<BitString>::from_der(signature) {
        Ok(signatures) => signatures,
        Err(_) => return Ok(false),
    };

    if algorithms.len() != keys.len() || signatures.len() != keys.len() {
        trace!(
            algorithms = algorithms.len(),
            keys = keys.len(),
            signatures = signatures.len(),
            "Composite component count mismatch"
        );
        return Ok(false);
    }

    for ((algorithm, key), signature) in algorithms.iter().zip(&keys).zip(&signatures) {
        if !verify_signature(algorithm, key, message, signature.raw_bytes())? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::verify_certificate;
    use crate::crypto::SerialNumberAllocator;
    use std::sync::Arc;
    use x509_cert::Certificate;

    struct Fixture {
        primary: KeyPair,
        alternative: KeyPair,
        certificate: Certificate,
    }

    fn fixture() -> Fixture {
        let builder = CertificateBuilder::new(Arc::new(SerialNumberAllocator::new()));
        let primary = KeyPair::generate(Algorithm::EcdsaP256Sha256).unwrap();
        let alternative = KeyPair::generate(Algorithm::Dilithium2).unwrap();
        let certificate = build(&builder, &primary, &alternative)
            .unwrap()
            .into_certificate();
        Fixture {
            primary,
            alternative,
            certificate,
        }
    }

    fn resign(cert: &mut Certificate, signatures: Vec<Vec<u8>>) {
        let parts = signatures
            .iter()
            .map(|sig| BitString::from_bytes(sig).unwrap())
            .collect::<Vec<_>>();
        cert.signature = BitString::from_bytes(&parts.to_der().unwrap()).unwrap();
    }

    #[test]
    fn test_composite_structure() {
        let fixture = fixture();
        let tbs = &fixture.certificate.tbs_certificate;

        assert_eq!(tbs.subject_public_key_info.algorithm.oid, ID_COMPOSITE_KEY);
        assert_eq!(tbs.signature.oid, ID_ALG_COMPOSITE);

        let keys = component_keys(&tbs.subject_public_key_info).unwrap();
        assert_eq!(keys[0], fixture.primary.subject_public_key_info().unwrap());
        assert_eq!(keys[1], fixture.alternative.subject_public_key_info().unwrap());

        let params: Vec<AlgorithmIdentifierOwned> =
            tbs.signature.parameters.as_ref().unwrap().decode_as().unwrap();
        assert_eq!(params[0].oid, Algorithm::EcdsaP256Sha256.oid());
        assert_eq!(params[1].oid, Algorithm::Dilithium2.oid());
    }

    #[test]
    fn test_composite_signature_verifies() {
        let fixture = fixture();
        let spki = &fixture.certificate.tbs_certificate.subject_public_key_info;
        assert!(verify_certificate(&fixture.certificate, spki).unwrap());
    }

    #[test]
    fn test_corrupting_either_component_fails() {
        let fixture = fixture();
        let spki = fixture.certificate.tbs_certificate.subject_public_key_info.clone();
        let tbs_der = fixture.certificate.tbs_certificate.to_der().unwrap();

        let primary_sig = fixture.primary.sign(&tbs_der).unwrap();
        let alt_sig = fixture.alternative.sign(&tbs_der).unwrap();
        let other = KeyPair::generate(Algorithm::Dilithium2).unwrap();

        // valid primary, alternative made by a foreign key
        let mut cert = fixture.certificate.clone();
        resign(&mut cert, vec![primary_sig.clone(), other.sign(&tbs_der).unwrap()]);
        assert!(!verify_certificate(&cert, &spki).unwrap());

        // valid alternative, primary signature over other bytes
        let mut cert = fixture.certificate.clone();
        resign(&mut cert, vec![fixture.primary.sign(b"something else").unwrap(), alt_sig.clone()]);
        assert!(!verify_certificate(&cert, &spki).unwrap());

        // both fresh and valid
        let mut cert = fixture.certificate.clone();
        resign(&mut cert, vec![primary_sig, alt_sig]);
        assert!(verify_certificate(&cert, &spki).unwrap());
    }

    #[test]
    fn test_single_component_rejected() {
        let keys = KeyPair::generate(Algorithm::Dilithium2).unwrap();
        assert!(CompositeSigner::new(vec![&keys]).is_err());
    }
}
