//! Chameleon hybrids: a delta certificate compressed into a Delta Certificate
//! Descriptor extension of a base certificate.

use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::BitString;
use der::Sequence;
use serde::{Deserialize, Serialize};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::debug;
use x509_cert::ext::{Extension, Extensions};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;
use x509_cert::{Certificate, TbsCertificate, Version};

use crate::cert::extensions::{decode_extension, encode_extension, trust_anchor_extensions, HYBRID_TA_PATH_LEN};
use crate::cert::{names, sign_tbs, CertificateBuilder};
use crate::crypto::{ContentSigner, KeyPair};
use crate::error::Error;
use crate::hybrid::HybridCertificate;
use crate::types::Result;

pub const ID_CE_DELTA_CERTIFICATE_DESCRIPTOR: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.114027.80.6.1");

/// ```text
/// DeltaCertificateDescriptor ::= SEQUENCE {
///   serialNumber          CertificateSerialNumber,
///   signature             [0] EXPLICIT AlgorithmIdentifier OPTIONAL,
///   issuer                [1] EXPLICIT Name OPTIONAL,
///   validity              [2] EXPLICIT Validity OPTIONAL,
///   subject               [3] EXPLICIT Name OPTIONAL,
///   subjectPublicKeyInfo  SubjectPublicKeyInfo,
///   extensions            [4] EXPLICIT Extensions OPTIONAL,
///   signatureValue        BIT STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DeltaCertificateDescriptor {
    pub serial_number: SerialNumber,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub signature: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub issuer: Option<Name>,
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    pub validity: Option<Validity>,
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", optional = "true")]
    pub subject: Option<Name>,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    #[asn1(context_specific = "4", tag_mode = "EXPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
    pub signature_value: BitString,
}

impl AssociatedOid for DeltaCertificateDescriptor {
    const OID: ObjectIdentifier = ID_CE_DELTA_CERTIFICATE_DESCRIPTOR;
}

/// Fields a delta certificate may differ from its base in.
///
/// Serial number, public key and signature value always travel in the
/// descriptor and are not part of the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaFields {
    pub signature: bool,
    pub issuer: bool,
    pub validity: bool,
    pub subject: bool,
    pub extensions: bool,
}

impl DeltaFields {
    pub const NONE: DeltaFields = DeltaFields {
        signature: false,
        issuer: false,
        validity: false,
        subject: false,
        extensions: false,
    };

    pub const ALL: DeltaFields = DeltaFields {
        signature: true,
        issuer: true,
        validity: true,
        subject: true,
        extensions: true,
    };
}

impl Default for DeltaFields {
    fn default() -> Self {
        DeltaFields {
            validity: false,
            ..DeltaFields::ALL
        }
    }
}

impl DeltaCertificateDescriptor {
    /// Mask implied by the fields present in the descriptor
    pub fn carried_fields(&self) -> DeltaFields {
        DeltaFields {
            signature: self.signature.is_some(),
            issuer: self.issuer.is_some(),
            validity: self.validity.is_some(),
            subject: self.subject.is_some(),
            extensions: self.extensions.is_some(),
        }
    }
}

/// Decide whether a field is carried: masked and different, or an error when
/// an unmasked field differs.
fn carry<T: Clone + PartialEq>(field: &str, allowed: bool, base: &T, delta: &T) -> Result<Option<T>> {
    if base == delta {
        return Ok(None);
    }
    if !allowed {
        return Err(Error::ReconstructionMismatch(format!(
            "Delta {} differs from base but is not in the field mask",
            field
        )));
    }
    Ok(Some(delta.clone()))
}

fn base_extensions(tbs: &TbsCertificate) -> Vec<Extension> {
    tbs.extensions
        .iter()
        .flatten()
        .filter(|ext| ext.extn_id != ID_CE_DELTA_CERTIFICATE_DESCRIPTOR)
        .cloned()
        .collect()
}

fn delta_extensions(base: &TbsCertificate, delta: &TbsCertificate, allowed: bool) -> Result<Option<Extensions>> {
    let base_exts = base_extensions(base);
    let delta_exts: Vec<Extension> = delta.extensions.iter().flatten().cloned().collect();

    if let Some(missing) = base_exts
        .iter()
        .find(|b| !delta_exts.iter().any(|d| d.extn_id == b.extn_id))
    {
        return Err(Error::ReconstructionMismatch(format!(
            "Delta lacks base extension {}",
            missing.extn_id
        )));
    }

    let differing: Vec<Extension> = delta_exts
        .into_iter()
        .filter(|d| !base_exts.contains(d))
        .collect();

    if differing.is_empty() {
        return Ok(None);
    }
    if !allowed {
        return Err(Error::ReconstructionMismatch(
            "Delta extensions differ from base but are not in the field mask".to_string(),
        ));
    }
    Ok(Some(differing))
}

/// Describe `delta` relative to `base`, carrying only masked fields that differ
pub fn embed(base: &TbsCertificate, delta: &Certificate, fields: DeltaFields) -> Result<DeltaCertificateDescriptor> {
    let d = &delta.tbs_certificate;

    Ok(DeltaCertificateDescriptor {
        serial_number: d.serial_number.clone(),
        signature: carry("signature", fields.signature, &base.signature, &d.signature)?,
        issuer: carry("issuer", fields.issuer, &base.issuer, &d.issuer)?,
        validity: carry("validity", fields.validity, &base.validity, &d.validity)?,
        subject: carry("subject", fields.subject, &base.subject, &d.subject)?,
        subject_public_key_info: d.subject_public_key_info.clone(),
        extensions: delta_extensions(base, d, fields.extensions)?,
        signature_value: delta.signature.clone(),
    })
}

/// Rebuild the delta certificate from a base TBS and its descriptor
pub fn reconstruct(base: &TbsCertificate, dcd: &DeltaCertificateDescriptor) -> Result<Certificate> {
    let mut extensions = base_extensions(base);
    for carried in dcd.extensions.iter().flatten() {
        match extensions.iter_mut().find(|ext| ext.extn_id == carried.extn_id) {
            Some(existing) => *existing = carried.clone(),
            None => extensions.push(carried.clone()),
        }
    }

    let signature = dcd.signature.clone().unwrap_or_else(|| base.signature.clone());
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: dcd.serial_number.clone(),
        signature: signature.clone(),
        issuer: dcd.issuer.clone().unwrap_or_else(|| base.issuer.clone()),
        validity: dcd.validity.unwrap_or(base.validity),
        subject: dcd.subject.clone().unwrap_or_else(|| base.subject.clone()),
        subject_public_key_info: dcd.subject_public_key_info.clone(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() { None } else { Some(extensions) },
    };

    Ok(Certificate {
        tbs_certificate: tbs,
        signature_algorithm: signature,
        signature: dcd.signature_value.clone(),
    })
}

/// Descriptor carried by a base certificate
pub fn descriptor(base: &Certificate) -> Result<DeltaCertificateDescriptor> {
    decode_extension::<DeltaCertificateDescriptor>(&base.tbs_certificate)?.ok_or_else(|| {
        Error::MalformedExtension("Certificate has no delta certificate descriptor".to_string())
    })
}

/// Recover the delta certificate embedded in `base`
pub fn extract(base: &Certificate) -> Result<Certificate> {
    reconstruct(&base.tbs_certificate, &descriptor(base)?)
}

/// Build a Chameleon trust anchor: a base under the primary key carrying a
/// delta under the alternative key.
pub fn build(
    builder: &CertificateBuilder,
    primary: &KeyPair,
    alternative: &KeyPair,
    fields: DeltaFields,
) -> Result<HybridCertificate> {
    let alt_spki = alternative.subject_public_key_info()?;
    let delta = builder.build_self_signed(
        names::chameleon_inner_name(alternative.algorithm())?,
        alternative,
        trust_anchor_extensions(&alt_spki, HYBRID_TA_PATH_LEN)?,
    )?;

    let outer = names::chameleon_outer_name(primary.algorithm())?;
    let primary_spki = primary.subject_public_key_info()?;
    let extensions = trust_anchor_extensions(&primary_spki, HYBRID_TA_PATH_LEN)?;
    let mut tbs = builder.tbs(
        outer.clone(),
        outer,
        primary.algorithm_identifier()?,
        primary_spki,
        extensions,
    )?;

    let dcd = embed(&tbs, &delta, fields)?;
    if reconstruct(&tbs, &dcd)? != delta {
        return Err(Error::ReconstructionMismatch(
            "Reconstructed delta certificate differs from the original".to_string(),
        ));
    }
    let carried = dcd.carried_fields();

    tbs.extensions
        .get_or_insert_with(Vec::new)
        .push(encode_extension(&dcd, false)?);
    let certificate = sign_tbs(tbs, primary)?;
    debug!(
        primary = %primary.algorithm(),
        alternative = %alternative.algorithm(),
        ?carried,
        "Built chameleon certificate"
    );

    Ok(HybridCertificate::Chameleon {
        certificate,
        delta,
        fields: carried,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::raw_extension;
    use crate::cert::verify_certificate;
    use crate::crypto::{Algorithm, SerialNumberAllocator};
    use der::Encode;
    use std::sync::Arc;

    fn builder() -> CertificateBuilder {
        CertificateBuilder::new(Arc::new(SerialNumberAllocator::new()))
    }

    fn chameleon(fields: DeltaFields) -> Result<(Certificate, Certificate, DeltaFields)> {
        let primary = KeyPair::generate(Algorithm::EcdsaP256Sha256)?;
        let alternative = KeyPair::generate(Algorithm::Dilithium2)?;
        match build(&builder(), &primary, &alternative, fields)? {
            HybridCertificate::Chameleon {
                certificate,
                delta,
                fields,
            } => Ok((certificate, delta, fields)),
            other => panic!("unexpected variant {:?}", other.strategy()),
        }
    }

    #[test]
    fn test_extract_reproduces_delta() {
        let (base, delta, carried) = chameleon(DeltaFields::default()).unwrap();
        let extracted = extract(&base).unwrap();

        assert_eq!(extracted, delta);
        assert_eq!(extracted.tbs_certificate.subject, delta.tbs_certificate.subject);
        assert_eq!(extracted.tbs_certificate.issuer, delta.tbs_certificate.issuer);
        assert_eq!(extracted.signature_algorithm.oid, Algorithm::Dilithium2.oid());

        // names, algorithm and the SKI extension differ; validity is shared
        assert_eq!(carried, DeltaFields::default());
    }

    #[test]
    fn test_base_and_extracted_delta_verify() {
        let (base, _, _) = chameleon(DeltaFields::default()).unwrap();
        assert!(verify_certificate(&base, &base.tbs_certificate.subject_public_key_info).unwrap());

        let delta = extract(&base).unwrap();
        assert!(verify_certificate(&delta, &delta.tbs_certificate.subject_public_key_info).unwrap());
    }

    #[test]
    fn test_unmasked_difference_is_rejected() {
        let fields = DeltaFields {
            subject: false,
            ..DeltaFields::default()
        };
        let err = chameleon(fields).unwrap_err();
        assert!(matches!(err, Error::ReconstructionMismatch(_)));
    }

    #[test]
    fn test_delta_missing_base_extension_is_rejected() {
        let builder = builder();
        let keys = KeyPair::generate(Algorithm::Dilithium2).unwrap();
        let delta = builder
            .build_self_signed(names::chameleon_inner_name(Algorithm::Dilithium2).unwrap(), &keys, Vec::new())
            .unwrap();

        let mut base = delta.tbs_certificate.clone();
        base.extensions = Some(vec![raw_extension(
            ObjectIdentifier::new_unwrap("1.2.3.4"),
            false,
            vec![0x05, 0x00],
        )
        .unwrap()]);

        let err = embed(&base, &delta, DeltaFields::ALL).unwrap_err();
        assert!(matches!(err, Error::ReconstructionMismatch(_)));
    }

    #[test]
    fn test_identical_fields_are_omitted() {
        let builder = builder();
        let keys = KeyPair::generate(Algorithm::Dilithium2).unwrap();
        let delta = builder
            .build_self_signed(names::chameleon_inner_name(Algorithm::Dilithium2).unwrap(), &keys, Vec::new())
            .unwrap();

        let dcd = embed(&delta.tbs_certificate, &delta, DeltaFields::ALL).unwrap();
        assert_eq!(dcd.carried_fields(), DeltaFields::NONE);
        assert_eq!(reconstruct(&delta.tbs_certificate, &dcd).unwrap(), delta);
    }

    #[test]
    fn test_corrupted_descriptor_yields_unverifiable_delta() {
        let (mut base, _, _) = chameleon(DeltaFields::default()).unwrap();
        let mut dcd = descriptor(&base).unwrap();

        let mut sig = dcd.signature_value.raw_bytes().to_vec();
        sig[0] ^= 0x01;
        dcd.signature_value = BitString::from_bytes(&sig).unwrap();

        let extensions = base.tbs_certificate.extensions.as_mut().unwrap();
        let position = extensions
            .iter()
            .position(|ext| ext.extn_id == ID_CE_DELTA_CERTIFICATE_DESCRIPTOR)
            .unwrap();
        extensions[position] = raw_extension(ID_CE_DELTA_CERTIFICATE_DESCRIPTOR, false, dcd.to_der().unwrap()).unwrap();

        let delta = extract(&base).unwrap();
        assert!(!verify_certificate(&delta, &delta.tbs_certificate.subject_public_key_info).unwrap());
    }

    #[test]
    fn test_missing_descriptor() {
        let builder = builder();
        let keys = KeyPair::generate(Algorithm::Dilithium2).unwrap();
        let plain = builder
            .build_self_signed(names::trust_anchor_name(Algorithm::Dilithium2).unwrap(), &keys, Vec::new())
            .unwrap();

        assert!(matches!(extract(&plain), Err(Error::MalformedExtension(_))));
    }
}
