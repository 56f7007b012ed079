use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::{Any, Decode, Encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use spki::AlgorithmIdentifierOwned;

use crate::error::Error;
use crate::types::Result;

/// Primitive category of an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmCategory {
    /// Digital signature
    Signature,
    /// Key encapsulation
    Kem,
}

/// Metadata attached to every catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmInfo {
    /// Configuration and registry name
    pub name: &'static str,
    /// Human readable name used in certificate subjects
    pub display_name: &'static str,
    /// Signature algorithm OID (for KEMs, the key OID)
    pub oid: ObjectIdentifier,
    /// SubjectPublicKeyInfo algorithm OID
    pub key_oid: ObjectIdentifier,
    /// Named curve for EC keys
    pub curve: Option<ObjectIdentifier>,
    /// Primitive category
    pub category: AlgorithmCategory,
    /// Whether the algorithm is post-quantum
    pub post_quantum: bool,
}

/// Every algorithm the generator knows how to key, sign and name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    /// ML-DSA-44
    Dilithium2,
    /// ML-DSA-65
    Dilithium3,
    /// ML-DSA-87
    Dilithium5,
    Sphincs128fSha2,
    Sphincs128sSha2,
    Sphincs192fSha2,
    Sphincs192sSha2,
    Sphincs256fSha2,
    Sphincs256sSha2,
    Sphincs128fShake,
    Sphincs128sShake,
    Sphincs192fShake,
    Sphincs192sShake,
    Sphincs256fShake,
    Sphincs256sShake,
    /// ML-KEM-512
    Kyber512,
    /// ML-KEM-768
    Kyber768,
    /// ML-KEM-1024
    Kyber1024,
    /// RSA-3072 with PKCS#1 v1.5 and SHA-256
    RsaSha256,
    /// ECDSA on P-256 with SHA-256
    EcdsaP256Sha256,
    /// ECDSA on P-384 with SHA-384
    EcdsaP384Sha384,
    /// ECDSA on P-521 with SHA-512
    EcdsaP521Sha512,
}

const ID_ML_DSA_44: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.17");
const ID_ML_DSA_65: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.18");
const ID_ML_DSA_87: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.19");

const ID_ML_KEM_512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.4.1");
const ID_ML_KEM_768: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.4.2");
const ID_ML_KEM_1024: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.4.3");

// Bouncy Castle arc for SPHINCS+ round 3.1 simple parameter sets
const SPHINCS_SHA2_128S: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.10");
const SPHINCS_SHA2_128F: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.11");
const SPHINCS_SHAKE_128S: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.12");
const SPHINCS_SHAKE_128F: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.13");
const SPHINCS_SHA2_192S: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.14");
const SPHINCS_SHA2_192F: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.15");
const SPHINCS_SHAKE_192S: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.16");
const SPHINCS_SHAKE_192F: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.17");
const SPHINCS_SHA2_256S: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.18");
const SPHINCS_SHA2_256F: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.19");
const SPHINCS_SHAKE_256S: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.20");
const SPHINCS_SHAKE_256F: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.22554.2.5.21");

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const SHA256_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// DER encoding of ASN.1 NULL
const DER_NULL: [u8; 2] = [0x05, 0x00];

const fn pq_signature(name: &'static str, display_name: &'static str, oid: ObjectIdentifier) -> AlgorithmInfo {
    AlgorithmInfo {
        name,
        display_name,
        oid,
        key_oid: oid,
        curve: None,
        category: AlgorithmCategory::Signature,
        post_quantum: true,
    }
}

const fn pq_kem(name: &'static str, display_name: &'static str, oid: ObjectIdentifier) -> AlgorithmInfo {
    AlgorithmInfo {
        name,
        display_name,
        oid,
        key_oid: oid,
        curve: None,
        category: AlgorithmCategory::Kem,
        post_quantum: true,
    }
}

impl Algorithm {
    /// Every catalog entry, in configuration order
    pub const ALL: [Algorithm; 22] = [
        Algorithm::Dilithium2,
        Algorithm::Dilithium3,
        Algorithm::Dilithium5,
        Algorithm::Sphincs128fSha2,
        Algorithm::Sphincs128sSha2,
        Algorithm::Sphincs192fSha2,
        Algorithm::Sphincs192sSha2,
        Algorithm::Sphincs256fSha2,
        Algorithm::Sphincs256sSha2,
        Algorithm::Sphincs128fShake,
        Algorithm::Sphincs128sShake,
        Algorithm::Sphincs192fShake,
        Algorithm::Sphincs192sShake,
        Algorithm::Sphincs256fShake,
        Algorithm::Sphincs256sShake,
        Algorithm::Kyber512,
        Algorithm::Kyber768,
        Algorithm::Kyber1024,
        Algorithm::RsaSha256,
        Algorithm::EcdsaP256Sha256,
        Algorithm::EcdsaP384Sha384,
        Algorithm::EcdsaP521Sha512,
    ];

    /// Catalog metadata
    pub const fn info(self) -> AlgorithmInfo {
        match self {
            Self::Dilithium2 => pq_signature("dilithium2", "Dilithium2", ID_ML_DSA_44),
            Self::Dilithium3 => pq_signature("dilithium3", "Dilithium3", ID_ML_DSA_65),
            Self::Dilithium5 => pq_signature("dilithium5", "Dilithium5", ID_ML_DSA_87),
            Self::Sphincs128fSha2 => pq_signature("sphincsplus-sha2-128f", "SPHINCS+-SHA2-128f", SPHINCS_SHA2_128F),
            Self::Sphincs128sSha2 => pq_signature("sphincsplus-sha2-128s", "SPHINCS+-SHA2-128s", SPHINCS_SHA2_128S),
            Self::Sphincs192fSha2 => pq_signature("sphincsplus-sha2-192f", "SPHINCS+-SHA2-192f", SPHINCS_SHA2_192F),
            Self::Sphincs192sSha2 => pq_signature("sphincsplus-sha2-192s", "SPHINCS+-SHA2-192s", SPHINCS_SHA2_192S),
            Self::Sphincs256fSha2 => pq_signature("sphincsplus-sha2-256f", "SPHINCS+-SHA2-256f", SPHINCS_SHA2_256F),
            Self::Sphincs256sSha2 => pq_signature("sphincsplus-sha2-256s", "SPHINCS+-SHA2-256s", SPHINCS_SHA2_256S),
            Self::Sphincs128fShake => pq_signature("sphincsplus-shake-128f", "SPHINCS+-SHAKE-128f", SPHINCS_SHAKE_128F),
            Self::Sphincs128sShake => pq_signature("sphincsplus-shake-128s", "SPHINCS+-SHAKE-128s", SPHINCS_SHAKE_128S),
            Self::Sphincs192fShake => pq_signature("sphincsplus-shake-192f", "SPHINCS+-SHAKE-192f", SPHINCS_SHAKE_192F),
            Self::Sphincs192sShake => pq_signature("sphincsplus-shake-192s", "SPHINCS+-SHAKE-192s", SPHINCS_SHAKE_192S),
            Self::Sphincs256fShake => pq_signature("sphincsplus-shake-256f", "SPHINCS+-SHAKE-256f", SPHINCS_SHAKE_256F),
            Self::Sphincs256sShake => pq_signature("sphincsplus-shake-256s", "SPHINCS+-SHAKE-256s", SPHINCS_SHAKE_256S),
            Self::Kyber512 => pq_kem("kyber512", "Kyber512", ID_ML_KEM_512),
            Self::Kyber768 => pq_kem("kyber768", "Kyber768", ID_ML_KEM_768),
            Self::Kyber1024 => pq_kem("kyber1024", "Kyber1024", ID_ML_KEM_1024),
            Self::RsaSha256 => AlgorithmInfo {
                name: "rsa3072-sha256",
                display_name: "SHA256withRSA",
                oid: SHA256_WITH_RSA_ENCRYPTION,
                key_oid: RSA_ENCRYPTION,
                curve: None,
                category: AlgorithmCategory::Signature,
                post_quantum: false,
            },
            Self::EcdsaP256Sha256 => AlgorithmInfo {
                name: "ecdsa-p256-sha256",
                display_name: "SHA256withECDSA",
                oid: ECDSA_WITH_SHA256,
                key_oid: ID_EC_PUBLIC_KEY,
                curve: Some(SECP256R1),
                category: AlgorithmCategory::Signature,
                post_quantum: false,
            },
            Self::EcdsaP384Sha384 => AlgorithmInfo {
                name: "ecdsa-p384-sha384",
                display_name: "SHA384withECDSA",
                oid: ECDSA_WITH_SHA384,
                key_oid: ID_EC_PUBLIC_KEY,
                curve: Some(SECP384R1),
                category: AlgorithmCategory::Signature,
                post_quantum: false,
            },
            Self::EcdsaP521Sha512 => AlgorithmInfo {
                name: "ecdsa-p521-sha512",
                display_name: "SHA512withECDSA",
                oid: ECDSA_WITH_SHA512,
                key_oid: ID_EC_PUBLIC_KEY,
                curve: Some(SECP521R1),
                category: AlgorithmCategory::Signature,
                post_quantum: false,
            },
        }
    }

    /// Configuration and registry name
    pub fn name(&self) -> &'static str {
        self.info().name
    }

    /// Name used in certificate subjects
    pub fn display_name(&self) -> &'static str {
        self.info().display_name
    }

    /// Signature (or KEM key) OID
    pub fn oid(&self) -> ObjectIdentifier {
        self.info().oid
    }

    pub fn category(&self) -> AlgorithmCategory {
        self.info().category
    }

    pub fn is_signature(&self) -> bool {
        self.category() == AlgorithmCategory::Signature
    }

    pub fn is_post_quantum(&self) -> bool {
        self.info().post_quantum
    }

    /// Look up the signature algorithm for a signature OID
    pub fn from_signature_oid(oid: &ObjectIdentifier) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.is_signature() && alg.oid() == *oid)
            .ok_or_else(|| Error::AlgorithmUnavailable(format!("No signature algorithm for OID {}", oid)))
    }

    /// AlgorithmIdentifier placed in `signature`/`signatureAlgorithm` fields
    pub fn signature_algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let info = self.info();
        if info.category != AlgorithmCategory::Signature {
            return Err(Error::AlgorithmUnavailable(format!("{} cannot sign", info.name)));
        }

        // RSA PKCS#1 v1.5 carries explicit NULL parameters, everything else omits them
        let parameters = match self {
            Self::RsaSha256 => Some(Any::from_der(&DER_NULL)?),
            _ => None,
        };

        Ok(AlgorithmIdentifierOwned {
            oid: info.oid,
            parameters,
        })
    }

    /// AlgorithmIdentifier placed in SubjectPublicKeyInfo
    pub fn public_key_algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let info = self.info();
        let parameters = match (self, info.curve) {
            (Self::RsaSha256, _) => Some(Any::from_der(&DER_NULL)?),
            (_, Some(curve)) => Some(Any::from_der(&curve.to_der()?)?),
            _ => None,
        };

        Ok(AlgorithmIdentifierOwned {
            oid: info.key_oid,
            parameters,
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.name() == wanted || alg.display_name().to_lowercase() == wanted)
            .ok_or_else(|| Error::AlgorithmUnavailable(format!("Unsupported algorithm: {}", s)))
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_and_oids_are_unique() {
        let names: HashSet<_> = Algorithm::ALL.iter().map(|a| a.name()).collect();
        let oids: HashSet<_> = Algorithm::ALL.iter().map(|a| a.oid()).collect();

        assert_eq!(names.len(), Algorithm::ALL.len());
        assert_eq!(oids.len(), Algorithm::ALL.len());
    }

    #[test]
    fn test_parse_by_name_and_display_name() {
        assert_eq!("dilithium2".parse::<Algorithm>().unwrap(), Algorithm::Dilithium2);
        assert_eq!("Dilithium2".parse::<Algorithm>().unwrap(), Algorithm::Dilithium2);
        assert_eq!("SHA256withECDSA".parse::<Algorithm>().unwrap(), Algorithm::EcdsaP256Sha256);
        assert_eq!("kyber512".parse::<Algorithm>().unwrap(), Algorithm::Kyber512);

        let err = "falcon-512".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, Error::AlgorithmUnavailable(_)));
    }

    #[test]
    fn test_categories() {
        assert!(Algorithm::Dilithium5.is_signature());
        assert!(Algorithm::Sphincs256sShake.is_post_quantum());
        assert_eq!(Algorithm::Kyber768.category(), AlgorithmCategory::Kem);
        assert!(!Algorithm::RsaSha256.is_post_quantum());
    }

    #[test]
    fn test_kem_has_no_signature_identifier() {
        let err = Algorithm::Kyber1024.signature_algorithm_identifier().unwrap_err();
        assert!(matches!(err, Error::AlgorithmUnavailable(_)));
    }

    #[test]
    fn test_algorithm_identifier_parameters() {
        let rsa = Algorithm::RsaSha256.signature_algorithm_identifier().unwrap();
        assert!(rsa.parameters.is_some());

        let ecdsa = Algorithm::EcdsaP256Sha256.signature_algorithm_identifier().unwrap();
        assert!(ecdsa.parameters.is_none());

        let ec_key = Algorithm::EcdsaP384Sha384.public_key_algorithm_identifier().unwrap();
        let curve = ec_key.parameters.unwrap().decode_as::<ObjectIdentifier>().unwrap();
        assert_eq!(curve, SECP384R1);

        let p521_key = Algorithm::EcdsaP521Sha512.public_key_algorithm_identifier().unwrap();
        let curve = p521_key.parameters.unwrap().decode_as::<ObjectIdentifier>().unwrap();
        assert_eq!(curve, SECP521R1);
        assert_eq!(Algorithm::EcdsaP521Sha512.oid().to_string(), "1.2.840.10045.4.3.4");

        let mldsa = Algorithm::Dilithium2.public_key_algorithm_identifier().unwrap();
        assert_eq!(mldsa.oid, ID_ML_DSA_44);
        assert!(mldsa.parameters.is_none());
    }

    #[test]
    fn test_from_signature_oid() {
        assert_eq!(
            Algorithm::from_signature_oid(&ECDSA_WITH_SHA384).unwrap(),
            Algorithm::EcdsaP384Sha384
        );
        assert_eq!(
            Algorithm::from_signature_oid(&ECDSA_WITH_SHA512).unwrap(),
            Algorithm::EcdsaP521Sha512
        );
        assert!(Algorithm::from_signature_oid(&ID_ML_KEM_512).is_err());
    }
}
