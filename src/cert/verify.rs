//! Signature checks for generated certificates

use der::Encode;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::trace;
use x509_cert::Certificate;

use crate::crypto::{provider, Algorithm};
use crate::hybrid::composite;
use crate::types::Result;

/// Verify `signature` over `message` for the given signature algorithm and
/// public key. Composite algorithms are unpacked and every component must
/// verify.
pub fn verify_signature(
    algorithm: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<bool> {
    if algorithm.oid == composite::ID_ALG_COMPOSITE {
        return composite::verify_composite_signature(algorithm, spki, message, signature);
    }

    let alg = Algorithm::from_signature_oid(&algorithm.oid)?;
    if spki.algorithm.oid != alg.info().key_oid {
        trace!(
            algorithm = %alg,
            key_oid = %spki.algorithm.oid,
            "Public key does not match signature algorithm"
        );
        return Ok(false);
    }

    provider::verify(alg, spki.subject_public_key.raw_bytes(), message, signature)
}

/// Verify the certificate signature under the issuer's public key
pub fn verify_certificate(cert: &Certificate, issuer_spki: &SubjectPublicKeyInfoOwned) -> Result<bool> {
    if cert.signature_algorithm != cert.tbs_certificate.signature {
        return Ok(false);
    }

    let tbs_der = cert.tbs_certificate.to_der()?;
    verify_signature(
        &cert.signature_algorithm,
        issuer_spki,
        &tbs_der,
        cert.signature.raw_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::{common_name, CertificateBuilder};
    use crate::crypto::{ContentSigner, KeyPair, SerialNumberAllocator};
    use der::asn1::BitString;
    use std::sync::Arc;

    fn self_signed(algorithm: Algorithm) -> Certificate {
        let builder = CertificateBuilder::new(Arc::new(SerialNumberAllocator::new()));
        let keys = KeyPair::generate(algorithm).unwrap();
        builder
            .build_self_signed(common_name("Verify TA").unwrap(), &keys, Vec::new())
            .unwrap()
    }

    #[test]
    fn test_wrong_key_does_not_verify() {
        let cert = self_signed(Algorithm::Dilithium2);
        let other = KeyPair::generate(Algorithm::Dilithium2).unwrap();

        assert!(!verify_certificate(&cert, &other.subject_public_key_info().unwrap()).unwrap());
    }

    #[test]
    fn test_mismatched_key_type_does_not_verify() {
        let cert = self_signed(Algorithm::EcdsaP256Sha256);
        let other = KeyPair::generate(Algorithm::Dilithium2).unwrap();

        assert!(!verify_certificate(&cert, &other.subject_public_key_info().unwrap()).unwrap());
    }

    #[test]
    fn test_tampered_signature_does_not_verify() {
        let mut cert = self_signed(Algorithm::EcdsaP384Sha384);
        let spki = cert.tbs_certificate.subject_public_key_info.clone();

        let mut bytes = cert.signature.raw_bytes().to_vec();
        let last = bytes.len() - 2;
        bytes[last] ^= 0xff;
        cert.signature = BitString::from_bytes(&bytes).unwrap();

        assert!(!verify_certificate(&cert, &spki).unwrap());
    }
}
