use std::fmt;

use der::asn1::BitString;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use zeroize::Zeroizing;

use crate::crypto::algorithm::Algorithm;
use crate::crypto::provider;
use crate::error::Error;
use crate::types::Result;

/// Anything that can produce a signature over to-be-signed bytes
pub trait ContentSigner: Send + Sync {
    /// AlgorithmIdentifier describing the signatures this signer produces
    fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned>;

    /// SubjectPublicKeyInfo matching the signatures
    fn subject_public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned>;

    /// Sign `message`
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Key pair bound to a catalog algorithm
#[derive(Clone)]
pub struct KeyPair {
    algorithm: Algorithm,
    public_key: Vec<u8>,
    secret_key: Zeroizing<Vec<u8>>,
}

impl KeyPair {
    /// Generate a fresh key pair
    pub fn generate(algorithm: Algorithm) -> Result<Self> {
        let raw = provider::generate_keypair(algorithm)?;
        Ok(Self {
            algorithm,
            public_key: raw.public_key,
            secret_key: raw.secret_key,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Public key as carried in the SubjectPublicKeyInfo bit string
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Verify a signature made by this key pair
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool> {
        provider::verify(self.algorithm, &self.public_key, message, signature)
    }
}

impl ContentSigner for KeyPair {
    fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        self.algorithm.signature_algorithm_identifier()
    }

    fn subject_public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        Ok(SubjectPublicKeyInfoOwned {
            algorithm: self.algorithm.public_key_algorithm_identifier()?,
            subject_public_key: BitString::from_bytes(&self.public_key)?,
        })
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        if !self.algorithm.is_signature() {
            return Err(Error::AlgorithmUnavailable(format!(
                "{} key pair cannot sign",
                self.algorithm
            )));
        }
        provider::sign(self.algorithm, &self.secret_key, message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm)
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}
