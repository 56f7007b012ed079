//! Key generation, signing and verification over the algorithm catalog.
//!
//! Every primitive is reached through three entry points so the certificate
//! code never touches a primitive crate directly. Keys travel as the exact
//! bytes that end up in a SubjectPublicKeyInfo (public) or as the crate's own
//! secret encoding (private).

use pqcrypto_traits::kem::{PublicKey as _, SecretKey as _};
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};
use rand::rngs::OsRng;
use tracing::trace;
use zeroize::Zeroizing;

use crate::crypto::algorithm::Algorithm;
use crate::error::Error;
use crate::types::Result;

/// RSA modulus size used for classical hybrid components
pub const RSA_KEY_BITS: usize = 3072;

/// Raw key material produced by the provider
pub struct RawKeyPair {
    /// SubjectPublicKeyInfo BIT STRING contents
    pub public_key: Vec<u8>,
    /// Provider-specific secret encoding
    pub secret_key: Zeroizing<Vec<u8>>,
}

macro_rules! pq_keypair {
    ($($m:ident)::+) => {{
        let (pk, sk) = $($m)::+::keypair();
        RawKeyPair {
            public_key: pk.as_bytes().to_vec(),
            secret_key: Zeroizing::new(sk.as_bytes().to_vec()),
        }
    }};
}

macro_rules! pq_sign {
    ($($m:ident)::+, $alg:expr, $secret:expr, $message:expr) => {{
        let sk = $($m)::+::SecretKey::from_bytes($secret).map_err(|_| {
            Error::SignatureFailure(format!("Invalid {} secret key", $alg))
        })?;
        $($m)::+::detached_sign($message, &sk).as_bytes().to_vec()
    }};
}

macro_rules! pq_verify {
    ($($m:ident)::+, $public:expr, $message:expr, $signature:expr) => {{
        let pk = match $($m)::+::PublicKey::from_bytes($public) {
            Ok(pk) => pk,
            Err(_) => return Ok(false),
        };
        let sig = match $($m)::+::DetachedSignature::from_bytes($signature) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        $($m)::+::verify_detached_signature(&sig, $message, &pk).is_ok()
    }};
}

/// Generate a fresh key pair for `algorithm`
pub fn generate_keypair(algorithm: Algorithm) -> Result<RawKeyPair> {
    trace!("Generating {} key pair", algorithm);

    let raw = match algorithm {
        Algorithm::Dilithium2 => pq_keypair!(pqcrypto_mldsa::mldsa44),
        Algorithm::Dilithium3 => pq_keypair!(pqcrypto_mldsa::mldsa65),
        Algorithm::Dilithium5 => pq_keypair!(pqcrypto_mldsa::mldsa87),
        Algorithm::Sphincs128fSha2 => pq_keypair!(pqcrypto_sphincsplus::sphincssha2128fsimple),
        Algorithm::Sphincs128sSha2 => pq_keypair!(pqcrypto_sphincsplus::sphincssha2128ssimple),
        Algorithm::Sphincs192fSha2 => pq_keypair!(pqcrypto_sphincsplus::sphincssha2192fsimple),
        Algorithm::Sphincs192sSha2 => pq_keypair!(pqcrypto_sphincsplus::sphincssha2192ssimple),
        Algorithm::Sphincs256fSha2 => pq_keypair!(pqcrypto_sphincsplus::sphincssha2256fsimple),
        Algorithm::Sphincs256sSha2 => pq_keypair!(pqcrypto_sphincsplus::sphincssha2256ssimple),
        Algorithm::Sphincs128fShake => pq_keypair!(pqcrypto_sphincsplus::sphincsshake128fsimple),
        Algorithm::Sphincs128sShake => pq_keypair!(pqcrypto_sphincsplus::sphincsshake128ssimple),
        Algorithm::Sphincs192fShake => pq_keypair!(pqcrypto_sphincsplus::sphincsshake192fsimple),
        Algorithm::Sphincs192sShake => pq_keypair!(pqcrypto_sphincsplus::sphincsshake192ssimple),
        Algorithm::Sphincs256fShake => pq_keypair!(pqcrypto_sphincsplus::sphincsshake256fsimple),
        Algorithm::Sphincs256sShake => pq_keypair!(pqcrypto_sphincsplus::sphincsshake256ssimple),
        Algorithm::Kyber512 => pq_keypair!(pqcrypto_mlkem::mlkem512),
        Algorithm::Kyber768 => pq_keypair!(pqcrypto_mlkem::mlkem768),
        Algorithm::Kyber1024 => pq_keypair!(pqcrypto_mlkem::mlkem1024),
        Algorithm::RsaSha256 => generate_rsa()?,
        Algorithm::EcdsaP256Sha256 => {
            let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
            RawKeyPair {
                public_key: signing_key.verifying_key().to_encoded_point(false).as_bytes().to_vec(),
                secret_key: Zeroizing::new(signing_key.to_bytes().to_vec()),
            }
        }
        Algorithm::EcdsaP384Sha384 => {
            let signing_key = p384::ecdsa::SigningKey::random(&mut OsRng);
            RawKeyPair {
                public_key: signing_key.verifying_key().to_encoded_point(false).as_bytes().to_vec(),
                secret_key: Zeroizing::new(signing_key.to_bytes().to_vec()),
            }
        }
        Algorithm::EcdsaP521Sha512 => {
            let signing_key = p521::ecdsa::SigningKey::random(&mut OsRng);
            RawKeyPair {
                public_key: p521::ecdsa::VerifyingKey::from(&signing_key).to_encoded_point(false).as_bytes().to_vec(),
                secret_key: Zeroizing::new(signing_key.to_bytes().to_vec()),
            }
        }
    };

    Ok(raw)
}

fn generate_rsa() -> Result<RawKeyPair> {
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};

    let private_key = rsa::RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| Error::AlgorithmUnavailable(format!("RSA key generation failed: {}", e)))?;
    let public_der = rsa::RsaPublicKey::from(&private_key)
        .to_pkcs1_der()
        .map_err(|e| Error::Encoding(format!("RSA public key: {}", e)))?;
    let secret_der = private_key
        .to_pkcs1_der()
        .map_err(|e| Error::Encoding(format!("RSA private key: {}", e)))?;

    Ok(RawKeyPair {
        public_key: public_der.as_bytes().to_vec(),
        secret_key: Zeroizing::new(secret_der.as_bytes().to_vec()),
    })
}

/// Sign `message` with a secret key produced by [`generate_keypair`]
pub fn sign(algorithm: Algorithm, secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let signature = match algorithm {
        Algorithm::Dilithium2 => pq_sign!(pqcrypto_mldsa::mldsa44, algorithm, secret_key, message),
        Algorithm::Dilithium3 => pq_sign!(pqcrypto_mldsa::mldsa65, algorithm, secret_key, message),
        Algorithm::Dilithium5 => pq_sign!(pqcrypto_mldsa::mldsa87, algorithm, secret_key, message),
        Algorithm::Sphincs128fSha2 => pq_sign!(pqcrypto_sphincsplus::sphincssha2128fsimple, algorithm, secret_key, message),
        Algorithm::Sphincs128sSha2 => pq_sign!(pqcrypto_sphincsplus::sphincssha2128ssimple, algorithm, secret_key, message),
        Algorithm::Sphincs192fSha2 => pq_sign!(pqcrypto_sphincsplus::sphincssha2192fsimple, algorithm, secret_key, message),
        Algorithm::Sphincs192sSha2 => pq_sign!(pqcrypto_sphincsplus::sphincssha2192ssimple, algorithm, secret_key, message),
        Algorithm::Sphincs256fSha2 => pq_sign!(pqcrypto_sphincsplus::sphincssha2256fsimple, algorithm, secret_key, message),
        Algorithm::Sphincs256sSha2 => pq_sign!(pqcrypto_sphincsplus::sphincssha2256ssimple, algorithm, secret_key, message),
        Algorithm::Sphincs128fShake => pq_sign!(pqcrypto_sphincsplus::sphincsshake128fsimple, algorithm, secret_key, message),
        Algorithm::Sphincs128sShake => pq_sign!(pqcrypto_sphincsplus::sphincsshake128ssimple, algorithm, secret_key, message),
        Algorithm::Sphincs192fShake => pq_sign!(pqcrypto_sphincsplus::sphincsshake192fsimple, algorithm, secret_key, message),
        Algorithm::Sphincs192sShake => pq_sign!(pqcrypto_sphincsplus::sphincsshake192ssimple, algorithm, secret_key, message),
        Algorithm::Sphincs256fShake => pq_sign!(pqcrypto_sphincsplus::sphincsshake256fsimple, algorithm, secret_key, message),
        Algorithm::Sphincs256sShake => pq_sign!(pqcrypto_sphincsplus::sphincsshake256ssimple, algorithm, secret_key, message),
        Algorithm::RsaSha256 => {
            use rsa::pkcs1::DecodeRsaPrivateKey;
            use rsa::signature::{SignatureEncoding, Signer};

            let private_key = rsa::RsaPrivateKey::from_pkcs1_der(secret_key)
                .map_err(|e| Error::SignatureFailure(format!("Invalid RSA secret key: {}", e)))?;
            let signing_key = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(private_key);
            signing_key
                .try_sign(message)
                .map_err(|e| Error::SignatureFailure(format!("RSA signing failed: {}", e)))?
                .to_vec()
        }
        Algorithm::EcdsaP256Sha256 => {
            use p256::ecdsa::signature::Signer;

            let signing_key = p256::ecdsa::SigningKey::from_slice(secret_key)
                .map_err(|e| Error::SignatureFailure(format!("Invalid P-256 secret key: {}", e)))?;
            let signature: p256::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| Error::SignatureFailure(format!("ECDSA signing failed: {}", e)))?;
            signature.to_der().as_bytes().to_vec()
        }
        Algorithm::EcdsaP384Sha384 => {
            use p384::ecdsa::signature::Signer;

            let signing_key = p384::ecdsa::SigningKey::from_slice(secret_key)
                .map_err(|e| Error::SignatureFailure(format!("Invalid P-384 secret key: {}", e)))?;
            let signature: p384::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| Error::SignatureFailure(format!("ECDSA signing failed: {}", e)))?;
            signature.to_der().as_bytes().to_vec()
        }
        Algorithm::EcdsaP521Sha512 => {
            use p521::ecdsa::signature::Signer;

            let signing_key = p521::ecdsa::SigningKey::from_slice(secret_key)
                .map_err(|e| Error::SignatureFailure(format!("Invalid P-521 secret key: {}", e)))?;
            let signature: p521::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| Error::SignatureFailure(format!("ECDSA signing failed: {}", e)))?;
            signature.to_der().as_bytes().to_vec()
        }
        Algorithm::Kyber512 | Algorithm::Kyber768 | Algorithm::Kyber1024 => {
            return Err(Error::AlgorithmUnavailable(format!("{} is a KEM and cannot sign", algorithm)));
        }
    };

    Ok(signature)
}

/// Check `signature` over `message` under `public_key`.
///
/// Malformed keys or signatures verify as `false`; only a request to verify
/// with a KEM is an error.
pub fn verify(algorithm: Algorithm, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool> {
    let valid = match algorithm {
        Algorithm::Dilithium2 => pq_verify!(pqcrypto_mldsa::mldsa44, public_key, message, signature),
        Algorithm::Dilithium3 => pq_verify!(pqcrypto_mldsa::mldsa65, public_key, message, signature),
        Algorithm::Dilithium5 => pq_verify!(pqcrypto_mldsa::mldsa87, public_key, message, signature),
        Algorithm::Sphincs128fSha2 => pq_verify!(pqcrypto_sphincsplus::sphincssha2128fsimple, public_key, message, signature),
        Algorithm::Sphincs128sSha2 => pq_verify!(pqcrypto_sphincsplus::sphincssha2128ssimple, public_key, message, signature),
        Algorithm::Sphincs192fSha2 => pq_verify!(pqcrypto_sphincsplus::sphincssha2192fsimple, public_key, message, signature),
        Algorithm::Sphincs192sSha2 => pq_verify!(pqcrypto_sphincsplus::sphincssha2192ssimple, public_key, message, signature),
        Algorithm::Sphincs256fSha2 => pq_verify!(pqcrypto_sphincsplus::sphincssha2256fsimple, public_key, message, signature),
        Algorithm::Sphincs256sSha2 => pq_verify!(pqcrypto_sphincsplus::sphincssha2256ssimple, public_key, message, signature),
        Algorithm::Sphincs128fShake => pq_verify!(pqcrypto_sphincsplus::sphincsshake128fsimple, public_key, message, signature),
        Algorithm::Sphincs128sShake => pq_verify!(pqcrypto_sphincsplus::sphincsshake128ssimple, public_key, message, signature),
        Algorithm::Sphincs192fShake => pq_verify!(pqcrypto_sphincsplus::sphincsshake192fsimple, public_key, message, signature),
        Algorithm::Sphincs192sShake => pq_verify!(pqcrypto_sphincsplus::sphincsshake192ssimple, public_key, message, signature),
        Algorithm::Sphincs256fShake => pq_verify!(pqcrypto_sphincsplus::sphincsshake256fsimple, public_key, message, signature),
        Algorithm::Sphincs256sShake => pq_verify!(pqcrypto_sphincsplus::sphincsshake256ssimple, public_key, message, signature),
        Algorithm::RsaSha256 => {
            use rsa::pkcs1::DecodeRsaPublicKey;
            use rsa::signature::Verifier;

            let public_key = match rsa::RsaPublicKey::from_pkcs1_der(public_key) {
                Ok(key) => key,
                Err(_) => return Ok(false),
            };
            let signature = match rsa::pkcs1v15::Signature::try_from(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(public_key)
                .verify(message, &signature)
                .is_ok()
        }
        Algorithm::EcdsaP256Sha256 => {
            use p256::ecdsa::signature::Verifier;

            let verifying_key = match p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) {
                Ok(key) => key,
                Err(_) => return Ok(false),
            };
            let signature = match p256::ecdsa::Signature::from_der(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            verifying_key.verify(message, &signature).is_ok()
        }
        Algorithm::EcdsaP384Sha384 => {
            use p384::ecdsa::signature::Verifier;

            let verifying_key = match p384::ecdsa::VerifyingKey::from_sec1_bytes(public_key) {
                Ok(key) => key,
                Err(_) => return Ok(false),
            };
            let signature = match p384::ecdsa::Signature::from_der(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            verifying_key.verify(message, &signature).is_ok()
        }
        Algorithm::EcdsaP521Sha512 => {
            use p521::ecdsa::signature::Verifier;

            let verifying_key = match p521::ecdsa::VerifyingKey::from_sec1_bytes(public_key) {
                Ok(key) => key,
                Err(_) => return Ok(false),
            };
            let signature = match p521::ecdsa::Signature::from_der(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            verifying_key.verify(message, &signature).is_ok()
        }
        Algorithm::Kyber512 | Algorithm::Kyber768 | Algorithm::Kyber1024 => {
            return Err(Error::AlgorithmUnavailable(format!("{} is a KEM and cannot verify", algorithm)));
        }
    };

    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = b"to-be-signed certificate bytes";

    #[test]
    fn test_signature_round_trip_for_every_signature_algorithm() {
        for algorithm in Algorithm::ALL.iter().copied().filter(|a| a.is_signature()) {
            let keys = generate_keypair(algorithm).unwrap();
            let signature = sign(algorithm, &keys.secret_key, MESSAGE).unwrap();

            assert!(
                verify(algorithm, &keys.public_key, MESSAGE, &signature).unwrap(),
                "{} signature did not verify",
                algorithm
            );
            assert!(
                !verify(algorithm, &keys.public_key, b"other message", &signature).unwrap(),
                "{} verified a different message",
                algorithm
            );
        }
    }

    #[test]
    fn test_p521_keys_and_signatures() {
        let keys = generate_keypair(Algorithm::EcdsaP521Sha512).unwrap();
        // uncompressed SEC1 point: 0x04 || X || Y with 66-byte coordinates
        assert_eq!(keys.public_key.len(), 133);
        assert_eq!(keys.public_key[0], 0x04);
        assert_eq!(keys.secret_key.len(), 66);

        let signature = sign(Algorithm::EcdsaP521Sha512, &keys.secret_key, MESSAGE).unwrap();
        assert!(verify(Algorithm::EcdsaP521Sha512, &keys.public_key, MESSAGE, &signature).unwrap());

        // a P-384 verifier must not accept a P-521 key
        assert!(!verify(Algorithm::EcdsaP384Sha384, &keys.public_key, MESSAGE, &signature).unwrap());
    }

    #[test]
    fn test_corrupted_signature_fails() {
        let keys = generate_keypair(Algorithm::Dilithium2).unwrap();
        let mut signature = sign(Algorithm::Dilithium2, &keys.secret_key, MESSAGE).unwrap();
        signature[10] ^= 0x01;

        assert!(!verify(Algorithm::Dilithium2, &keys.public_key, MESSAGE, &signature).unwrap());
    }

    #[test]
    fn test_truncated_inputs_verify_false() {
        let keys = generate_keypair(Algorithm::EcdsaP256Sha256).unwrap();
        let signature = sign(Algorithm::EcdsaP256Sha256, &keys.secret_key, MESSAGE).unwrap();

        assert!(!verify(Algorithm::EcdsaP256Sha256, &keys.public_key[..10], MESSAGE, &signature).unwrap());
        assert!(!verify(Algorithm::EcdsaP256Sha256, &keys.public_key, MESSAGE, &signature[..8]).unwrap());
    }

    #[test]
    fn test_kem_keys_generate_but_do_not_sign() {
        let keys = generate_keypair(Algorithm::Kyber512).unwrap();
        assert!(!keys.public_key.is_empty());

        let err = sign(Algorithm::Kyber512, &keys.secret_key, MESSAGE).unwrap_err();
        assert!(matches!(err, Error::AlgorithmUnavailable(_)));
    }
}
